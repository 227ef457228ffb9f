//! CLI binary for markup2json.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ExtractConfig` and prints the extracted JSON.

use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use markup2json::{extract_reconciled, ExtractConfig};
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract with automatic document-type detection (stdout)
  markup2json pages.html

  # Read markup from stdin
  ocr-dump scan.pdf | markup2json -

  # Force a document type (required for hint-only types)
  markup2json --doc-type settlementReport report.html

  # Fill gaps from fallback OCR passes, pretty-printed, to a file
  markup2json scan.html --aux crop1.html --aux crop2.html --pretty -o out.json

  # List the built-in document types
  markup2json --list-types

PAGES:
  The input is split into pages on a form-feed character (\x0C) by default;
  override with --page-delimiter. Tables whose body continues on the next
  page are spliced back together before extraction.

ENVIRONMENT VARIABLES:
  MARKUP2JSON_DOC_TYPE   Default for --doc-type
  RUST_LOG               Overrides the log filter (e.g. markup2json=debug)
"#;

/// Extract structured JSON from OCR-produced HTML table markup.
#[derive(Parser, Debug)]
#[command(
    name = "markup2json",
    version,
    about = "Extract structured JSON from OCR-produced HTML table markup",
    long_about = "Reconstruct dense cell grids from noisy OCR table markup (rowspan/colspan, \
page-break splits, label bleed) and extract typed records against built-in document-template \
schemas: inspection logs, investment estimates, settlement reports.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Markup file to extract, or `-` for stdin.
    #[arg(required_unless_present = "list_types")]
    input: Option<String>,

    /// Write JSON to this file instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Document-type hint; skips marker detection.
    #[arg(long, env = "MARKUP2JSON_DOC_TYPE")]
    doc_type: Option<String>,

    /// Auxiliary markup file from a fallback OCR pass; repeatable, used in
    /// order when the primary extraction is incomplete.
    #[arg(long)]
    aux: Vec<PathBuf>,

    /// Page delimiter in the input (default: form feed).
    #[arg(long)]
    page_delimiter: Option<String>,

    /// Disable cross-page table merging.
    #[arg(long)]
    no_merge: bool,

    /// Pretty-print the JSON output.
    #[arg(long)]
    pretty: bool,

    /// List the registered document types and exit.
    #[arg(long)]
    list_types: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = build_config(&cli)?;

    if cli.list_types {
        for doc_type in config.registry().doc_types() {
            println!("{doc_type}");
        }
        return Ok(());
    }

    // `input` is required unless --list-types, enforced by clap.
    let input = cli.input.as_deref().unwrap_or("-");
    let primary = read_input(input)?;
    let auxiliaries: Vec<String> = cli
        .aux
        .iter()
        .map(|path| {
            fs::read_to_string(path)
                .with_context(|| format!("Failed to read auxiliary markup {}", path.display()))
        })
        .collect::<Result<_>>()?;
    let aux_refs: Vec<&str> = auxiliaries.iter().map(String::as_str).collect();

    let output = extract_reconciled(&primary, &aux_refs, &config).context("Extraction failed")?;

    let json = if cli.pretty {
        output.to_json_pretty()
    } else {
        output.to_json()
    }
    .context("Failed to serialise output")?;

    match &cli.output {
        Some(path) => {
            fs::write(path, json.as_bytes())
                .with_context(|| format!("Failed to write {}", path.display()))?;
            if !cli.quiet {
                eprintln!("{} → {}", output.document_type, path.display());
            }
        }
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle.write_all(json.as_bytes()).context("Failed to write to stdout")?;
            handle.write_all(b"\n").ok();
        }
    }

    Ok(())
}

/// Map CLI args to `ExtractConfig`.
fn build_config(cli: &Cli) -> Result<ExtractConfig> {
    let mut builder = ExtractConfig::builder().merge_cross_page(!cli.no_merge);
    if let Some(doc_type) = &cli.doc_type {
        builder = builder.document_type(doc_type);
    }
    if let Some(delimiter) = &cli.page_delimiter {
        builder = builder.page_delimiter(delimiter);
    }
    builder.build().context("Invalid configuration")
}

fn read_input(input: &str) -> Result<String> {
    if input == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read markup from stdin")?;
        Ok(buf)
    } else {
        fs::read_to_string(input).with_context(|| format!("Failed to read {input}"))
    }
}
