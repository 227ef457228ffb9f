//! Configuration for a markup extraction run.
//!
//! All extraction behaviour is controlled through [`ExtractConfig`], built
//! via its [`ExtractConfigBuilder`]. Keeping every knob in one struct makes
//! it trivial to share configs across calls and diff two runs to understand
//! why their outputs differ.

use std::fmt;
use std::sync::Arc;

use crate::error::Markup2JsonError;
use crate::pipeline::MergePolicy;
use crate::profiles;
use crate::schema::SchemaRegistry;

/// Configuration for one extraction.
///
/// Built via [`ExtractConfig::builder()`] or [`ExtractConfig::default()`].
///
/// # Example
/// ```rust
/// use markup2json::ExtractConfig;
///
/// let config = ExtractConfig::builder()
///     .document_type("noiseRec")
///     .header_rows(2)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ExtractConfig {
    /// Document-type hint. When set, schema detection is skipped and the
    /// named schema is used directly; an unknown name is a fatal error.
    /// Required for the hint-only types (`settlementReport`, `designReview`),
    /// whose documents carry no reliable markers.
    pub document_type: Option<String>,

    /// Delimiter splitting the input into pages. Default: form feed (`\x0C`).
    ///
    /// Upstream OCR emits one markup blob per physical page joined by form
    /// feeds. Cross-page table merging only sees page boundaries through
    /// this delimiter, so a wrong value silently disables merging.
    pub page_delimiter: String,

    /// Rows of the header region scanned by classification rules. Default: 3.
    ///
    /// Multi-row headers (day/night column groups) put their distinguishing
    /// keywords on the second or third row. Scanning more rows risks
    /// classifying a table by its data instead of its header.
    pub header_rows: usize,

    /// A table with more than this many data rows under its header is never
    /// treated as a header-only stub for merging. Default: 1.
    pub min_data_rows: usize,

    /// Column-count difference tolerated when splicing a continuation table
    /// onto its header stub. Default: 1.
    ///
    /// Continuation fragments routinely lose or gain one column to OCR cell
    /// splits; anything further apart is a different table.
    pub column_tolerance: usize,

    /// Splice header-only tables with their next-page continuation. Default: true.
    pub merge_cross_page: bool,

    /// A continuation candidate whose first row hits this many header
    /// keywords is a fresh header, not a continuation. Default: 3.
    pub fresh_header_abort: usize,

    /// Schema registry to extract against. `None` uses the built-in profiles.
    pub registry: Option<Arc<SchemaRegistry>>,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            document_type: None,
            page_delimiter: "\u{0C}".to_string(),
            header_rows: 3,
            min_data_rows: 1,
            column_tolerance: 1,
            merge_cross_page: true,
            fresh_header_abort: 3,
            registry: None,
        }
    }
}

impl fmt::Debug for ExtractConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractConfig")
            .field("document_type", &self.document_type)
            .field("page_delimiter", &self.page_delimiter)
            .field("header_rows", &self.header_rows)
            .field("min_data_rows", &self.min_data_rows)
            .field("column_tolerance", &self.column_tolerance)
            .field("merge_cross_page", &self.merge_cross_page)
            .field("fresh_header_abort", &self.fresh_header_abort)
            .field(
                "registry",
                &self.registry.as_ref().map(|_| "<custom>").unwrap_or("<builtin>"),
            )
            .finish()
    }
}

impl ExtractConfig {
    /// Create a new builder for `ExtractConfig`.
    pub fn builder() -> ExtractConfigBuilder {
        ExtractConfigBuilder { config: Self::default() }
    }

    /// The registry this run extracts against.
    pub fn registry(&self) -> &SchemaRegistry {
        match &self.registry {
            Some(custom) => custom,
            None => profiles::builtin(),
        }
    }

    /// The merge-stage policy derived from this config.
    pub fn merge_policy(&self) -> MergePolicy {
        MergePolicy {
            header_rows: self.header_rows,
            min_data_rows: self.min_data_rows,
            column_tolerance: self.column_tolerance,
            fresh_header_abort: self.fresh_header_abort,
        }
    }
}

/// Builder for [`ExtractConfig`].
#[derive(Debug)]
pub struct ExtractConfigBuilder {
    config: ExtractConfig,
}

impl ExtractConfigBuilder {
    pub fn document_type(mut self, doc_type: impl Into<String>) -> Self {
        self.config.document_type = Some(doc_type.into());
        self
    }

    pub fn page_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.config.page_delimiter = delimiter.into();
        self
    }

    pub fn header_rows(mut self, n: usize) -> Self {
        self.config.header_rows = n.max(1);
        self
    }

    pub fn min_data_rows(mut self, n: usize) -> Self {
        self.config.min_data_rows = n;
        self
    }

    pub fn column_tolerance(mut self, n: usize) -> Self {
        self.config.column_tolerance = n;
        self
    }

    pub fn merge_cross_page(mut self, v: bool) -> Self {
        self.config.merge_cross_page = v;
        self
    }

    pub fn fresh_header_abort(mut self, n: usize) -> Self {
        self.config.fresh_header_abort = n.max(1);
        self
    }

    pub fn registry(mut self, registry: Arc<SchemaRegistry>) -> Self {
        self.config.registry = Some(registry);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractConfig, Markup2JsonError> {
        let c = &self.config;
        if c.page_delimiter.is_empty() {
            return Err(Markup2JsonError::InvalidConfig(
                "page delimiter must be non-empty".into(),
            ));
        }
        if c.header_rows == 0 {
            return Err(Markup2JsonError::InvalidConfig("header rows must be ≥ 1".into()));
        }
        Ok(self.config)
    }
}
