//! evalgrid summary
//!
//! Turns the harness's nested per-task result JSON into flat metric records
//! and writes one deterministically ordered CSV table per model.

pub mod aggregate;
pub mod document;
pub mod error;
pub mod normalize;
pub mod writer;

pub use aggregate::{
    summarize_model, summarize_results, FileOutcome, FileReport, ModelReport,
    ModelSummaryOutcome, SummaryReport,
};
pub use document::RawResultDocument;
pub use error::{Result, SummaryError};
pub use normalize::{normalize_document, stderr_base, MetricRecord, STDERR_SUFFIX};
pub use writer::{render_csv, sort_records, write_summary_csv, CSV_HEADER, NOT_AVAILABLE};
