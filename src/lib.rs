//! # markup2json
//!
//! Extract structured JSON records from OCR-produced HTML table markup.
//!
//! ## Why this crate?
//!
//! Vision models transcribe scanned bureaucratic forms (inspection logs,
//! investment estimates, settlement reports) into HTML tables — but the
//! markup is noisy: `rowspan`/`colspan` hide the real geometry, tables
//! split across page breaks, labels bleed into value cells, and the same
//! fact appears under several spellings. This crate reconstructs dense
//! cell grids from that markup and reads typed records out of them against
//! declarative per-template schemas, so downstream systems get one stable
//! JSON shape per document type.
//!
//! ## Pipeline Overview
//!
//! ```text
//! HTML markup (one blob per page)
//!  │
//!  ├─ 1. Grid       rowspan/colspan expansion → dense rectangular matrices
//!  ├─ 2. Classify   ordered keyword rules over each table's header region
//!  ├─ 3. Merge      splice header-only tables with their next-page body
//!  ├─ 4. Fields     schema-directed scalars, row sections and text panels
//!  ├─ 5. Reconcile  non-empty-wins merge with fallback extraction passes
//!  └─ 6. Output     {"document_type": …, "data": {…}}
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use markup2json::{extract, ExtractConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let markup = "<table><tr><td>项目名称</td><td>变电站扩建工程</td></tr></table>\
//!                   …污染源噪声检测原始记录表…";
//!     let output = extract(markup, &ExtractConfig::default())?;
//!     println!("{}", output.to_json_pretty()?);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `markup2json` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! markup2json = { version = "0.3", default-features = false }
//! ```
//!
//! ## Built-in document types
//!
//! | Type | Detection | Content |
//! |------|-----------|---------|
//! | `noiseRec` | title marker | noise inspection log: scalars, weather, measurement rows |
//! | `emRec` | title marker | EM field inspection log: scalars, weather, 16-column rows |
//! | `feasibilityApprovalInvestment` | marker groups | investment estimate with construction-scale columns |
//! | `feasibilityReviewInvestment` | marker groups | investment estimate, review variant |
//! | `preliminaryApprovalInvestment` | marker groups | investment estimate, preliminary-design variant |
//! | `settlementReport` | hint only | audit settlement summary rows |
//! | `designReview` | hint only | design-review estimate items |
//!
//! Custom templates plug in through [`SchemaRegistry`] on the config.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod extract;
pub mod matcher;
pub mod pipeline;
pub mod profiles;
pub mod record;
pub mod schema;
pub mod text;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExtractConfig, ExtractConfigBuilder};
pub use error::Markup2JsonError;
pub use extract::{
    extract, extract_pages, extract_reconciled, Breakdown, DocumentOutput,
    UNKNOWN_DOCUMENT_TYPE,
};
pub use record::{BreakdownNode, FieldValue, Record, ValueSource};
pub use schema::{
    ClassificationRule, DocumentSchema, FieldSpec, SchemaRegistry, SectionSchema,
};
