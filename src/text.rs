//! Text normalisation and value cleanup for OCR-derived cell content.
//!
//! Everything the upstream vision model produces passes through here at some
//! point: HTML entity noise, stray whitespace, unit suffixes glued onto
//! numbers, thousands separators, and outline numbering on breakdown rows.
//! Each helper is a pure `&str → _` function so the callers in
//! `pipeline::fields` stay readable.

use once_cell::sync::Lazy;
use regex::Regex;

// ── Whitespace & markup ──────────────────────────────────────────────────

static RE_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());
static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Strip nested markup tags from a cell, decode the entities the upstream
/// model emits, collapse runs of whitespace and trim.
pub fn clean_cell(raw: &str) -> String {
    let no_tags = RE_TAG.replace_all(raw, " ");
    normalize_ws(&decode_entities(&no_tags))
}

/// Decode the handful of HTML entities that actually occur in model output.
pub fn decode_entities(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// Collapse internal whitespace to single spaces and trim the ends.
pub fn normalize_ws(s: &str) -> String {
    RE_WS.replace_all(s.trim(), " ").to_string()
}

/// Remove all whitespace. Used for the keyword match fallback: OCR loves to
/// scatter spaces inside CJK labels.
pub fn strip_ws(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Does `text` contain `keyword`, either verbatim or with all whitespace
/// removed from both sides?
pub fn contains_keyword(text: &str, keyword: &str) -> bool {
    text.contains(keyword) || strip_ws(text).contains(&strip_ws(keyword))
}

// ── Numeric cleanup ──────────────────────────────────────────────────────

/// Reduce a cell to the characters a number can be made of: digits, `.`, `-`.
pub fn clean_numeric(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect()
}

/// Monetary cleanup: shed unit suffixes and thousands separators before the
/// numeric pass. `"1,234.56万元"` → `"1234.56"`.
pub fn clean_amount(s: &str) -> String {
    let stripped = s
        .replace("万元", "")
        .replace('元', "")
        .replace(',', "")
        .replace('，', "");
    clean_numeric(&stripped)
}

/// Parse a cell as a number after cleanup. Returns `None` for anything that
/// is not a single well-formed number; the caller treats that as an empty
/// value rather than an error.
pub fn parse_number(s: &str) -> Option<f64> {
    let cleaned = clean_numeric(s);
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Mean of the parseable values among `values`, formatted for record output:
/// whole numbers carry no decimal point, everything else is rounded to three
/// decimals with trailing zeros removed. Returns `None` when nothing parses.
pub fn format_average<'a, I>(values: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let nums: Vec<f64> = values.into_iter().filter_map(parse_number).collect();
    if nums.is_empty() {
        return None;
    }
    let mean = nums.iter().sum::<f64>() / nums.len() as f64;
    if mean.fract() == 0.0 && mean.abs() < 1e15 {
        return Some(format!("{}", mean as i64));
    }
    let formatted = format!("{mean:.3}");
    Some(formatted.trim_end_matches('0').trim_end_matches('.').to_string())
}

// ── Outline levels ───────────────────────────────────────────────────────

static RE_LEVEL_CJK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[一二三四五六七八九十]+[、，,.．]").unwrap());
static RE_LEVEL_ARABIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+([、，,.．]|$)").unwrap());
static RE_LEVEL_PAREN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[（(]\d+[)）]").unwrap());

/// Derive the outline level of a breakdown row from its numbering text,
/// falling back to the name when the numbering cell is empty.
///
/// `0` — grand total row; `1` — full-width ordinal (`一、`); `2` — arabic
/// numbering (`1、` / bare `3`); `3` — parenthesised (`(1)`). `None` when
/// the numbering matches no known shape.
pub fn outline_level(no: &str, name: &str) -> Option<u8> {
    let no = no.trim();
    let name = name.trim();
    if no.contains("合计") || name.contains("合计") {
        return Some(0);
    }
    let key = if no.is_empty() { name } else { no };
    if RE_LEVEL_CJK.is_match(key) {
        return Some(1);
    }
    if RE_LEVEL_ARABIC.is_match(key) {
        return Some(2);
    }
    if RE_LEVEL_PAREN.is_match(key) {
        return Some(3);
    }
    None
}

// ── Value plausibility checks ────────────────────────────────────────────

static RE_CLOCK: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{1,2}[:：]\d{2}").unwrap());
static RE_DATE_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}[.\-/年]").unwrap());
static RE_HEIGHT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+(\.\d+)?\s*(m|米)?$").unwrap());
static RE_MONITOR_TIME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}[.\-/年]\s*\d{1,2}[.\-/月]\s*\d{1,2}").unwrap());

/// A measurement height is a bare number with an optional metre unit. Clock
/// times and dates bleeding in from a neighbouring column fail the check.
pub fn is_valid_height(value: &str) -> bool {
    let v = value.trim();
    if v.is_empty() || RE_CLOCK.is_match(v) || RE_DATE_PREFIX.is_match(v) {
        return false;
    }
    RE_HEIGHT.is_match(v)
}

/// A monitoring timestamp starts with a full date; a bare clock time means
/// the OCR grabbed the wrong column.
pub fn is_valid_monitor_time(value: &str) -> bool {
    RE_MONITOR_TIME.is_match(value.trim())
}
