//! The five-stage extraction pipeline.
//!
//! ```text
//! raw markup (per page)
//!  │
//!  ├─ 1. grid       rowspan/colspan markup → dense rectangular matrices
//!  ├─ 2. classify   ordered keyword rules over the header region
//!  ├─ 3. merge      splice header-only tables with their next-page body
//!  ├─ 4. fields     schema-directed scalars, rows and free-text sections
//!  └─ 5. reconcile  non-empty-wins merge of primary + auxiliary records
//! ```
//!
//! Every stage is a pure synchronous function over immutable inputs; the
//! orchestration lives in [`crate::extract`].

pub mod classify;
pub mod fields;
pub mod grid;
pub mod merge;
pub mod reconcile;

pub use classify::ClassifiedTable;
pub use grid::Grid;
pub use merge::MergePolicy;
