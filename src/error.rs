//! Error types for the markup2json library.
//!
//! The library distinguishes two failure worlds and only one of them is an
//! error type:
//!
//! * [`Markup2JsonError`] — **Fatal**: the caller violated the programming
//!   contract (a schema references a field that does not exist, a schema
//!   regex fails to compile, a configuration value is out of range, a
//!   document-type hint names an unregistered schema). Returned as
//!   `Err(Markup2JsonError)` from the top-level `extract*` functions.
//!
//! * Noisy-input failures — malformed markup, an unmatched table, a missing
//!   label, an unparseable number — are **never** errors. They degrade to
//!   empty grids, empty fields, or an `unknown` document type, and are
//!   reported through `tracing` events instead. OCR output is hostile by
//!   nature; a pipeline that aborts on it extracts nothing.

use thiserror::Error;

/// All fatal errors returned by the markup2json library.
///
/// Anything caused by the *input text* rather than the *caller's code*
/// degrades to empty output and never appears here.
#[derive(Debug, Error)]
pub enum Markup2JsonError {
    // ── Schema errors ─────────────────────────────────────────────────────
    /// A schema element references a field name that the schema never defines
    /// (a derivation sibling, a required scalar, a section key field, …).
    #[error("schema '{schema}' references undefined field '{field}' in {context}")]
    UndefinedField {
        schema: String,
        field: String,
        context: String,
    },

    /// A pattern supplied to a schema failed to compile.
    #[error("invalid pattern '{pattern}' in schema '{schema}': {source}")]
    InvalidPattern {
        schema: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// A document-type hint named a schema the registry does not hold.
    #[error("unknown document type '{doc_type}' (registered: {known})")]
    UnknownDocumentType { doc_type: String, known: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undefined_field_display() {
        let e = Markup2JsonError::UndefinedField {
            schema: "noiseRec".into(),
            field: "avgValue".into(),
            context: "derived average".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("noiseRec"), "got: {msg}");
        assert!(msg.contains("avgValue"), "got: {msg}");
    }

    #[test]
    fn unknown_document_type_display() {
        let e = Markup2JsonError::UnknownDocumentType {
            doc_type: "invoice".into(),
            known: "noiseRec, emRec".into(),
        };
        assert!(e.to_string().contains("invoice"));
        assert!(e.to_string().contains("noiseRec"));
    }

    #[test]
    fn invalid_config_display() {
        let e = Markup2JsonError::InvalidConfig("header_rows must be >= 1".into());
        assert!(e.to_string().contains("header_rows"));
    }
}
