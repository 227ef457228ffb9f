//! Priority-ordered regex matcher chains.
//!
//! Free-text panels (weather lines, auxiliary OCR dumps) carry the same fact
//! in several spellings. A [`MatcherChain`] holds the candidate patterns in
//! priority order and returns the first non-empty capture, replacing the
//! try/except regex fallthrough such code tends to grow into.

use regex::Regex;

use crate::error::Markup2JsonError;

/// An ordered list of patterns; [`MatcherChain::first_match`] returns the
/// first pattern whose capture group 1 is non-empty.
#[derive(Debug, Clone)]
pub struct MatcherChain {
    patterns: Vec<Regex>,
}

impl MatcherChain {
    /// Compile `patterns` in priority order. Every pattern must contain at
    /// least one capture group; compilation failure is a schema-authoring
    /// bug and therefore fatal.
    pub fn new<S: AsRef<str>>(schema: &str, patterns: &[S]) -> Result<Self, Markup2JsonError> {
        let mut compiled = Vec::with_capacity(patterns.len());
        for p in patterns {
            let re = Regex::new(p.as_ref()).map_err(|source| Markup2JsonError::InvalidPattern {
                schema: schema.to_string(),
                pattern: p.as_ref().to_string(),
                source,
            })?;
            compiled.push(re);
        }
        Ok(Self { patterns: compiled })
    }

    /// First non-empty capture group 1 across the chain, trimmed.
    pub fn first_match(&self, text: &str) -> Option<String> {
        for re in &self.patterns {
            if let Some(caps) = re.captures(text) {
                if let Some(m) = caps.get(1) {
                    let value = m.as_str().trim();
                    if !value.is_empty() {
                        return Some(value.to_string());
                    }
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn earlier_pattern_wins() {
        let chain = MatcherChain::new(
            "t",
            &[r"温度[：:]\s*([\d.]+)", r"(\d+(?:\.\d+)?)\s*℃"],
        )
        .unwrap();
        // Both patterns could match; the labelled one is listed first.
        assert_eq!(chain.first_match("温度: 23.5 ℃"), Some("23.5".into()));
    }

    #[test]
    fn falls_through_on_empty_capture() {
        let chain =
            MatcherChain::new("t", &[r"风向[：:](\S*)", r"(东南?风|西北?风)"]).unwrap();
        assert_eq!(chain.first_match("风向:东南风"), Some("东南风".into()));
        // First pattern matches with an empty group; second one rescues it.
        assert_eq!(chain.first_match("风向: 东南风"), Some("东南风".into()));
    }

    #[test]
    fn no_match_is_none() {
        let chain = MatcherChain::new("t", &[r"湿度[：:]\s*([\d.]+)"]).unwrap();
        assert_eq!(chain.first_match("天气：晴"), None);
    }

    #[test]
    fn bad_pattern_is_fatal() {
        let err = MatcherChain::new("noiseRec", &[r"(["]).unwrap_err();
        assert!(err.to_string().contains("noiseRec"));
    }
}
