//! Evidence highlighting for PDF documents
//!
//! Given a span of text a model claims to have quoted from a page, this crate
//! finds where it sits on that page and adds highlight annotations to one
//! cumulative output PDF per source document.
//!
//! - [`locator`]: exact phrase search, then a fuzzy sliding-window search
//!   scored with [`similarity::partial_ratio`]
//! - [`pipeline`]: locate against the source, then annotate and commit
//! - [`persist`]: write-then-rename commits of the combined output
//! - [`session`]: batches with per-output locking and per-item timeouts

pub mod annotate;
pub mod cache;
pub mod config;
pub mod error;
pub mod geometry;
pub mod layout;
pub mod locator;
pub mod naming;
pub mod persist;
pub mod pipeline;
pub mod response;
pub mod session;
pub mod similarity;

pub use config::{HighlightConfig, HighlightStyle};
pub use error::{HighlightError, Result};
pub use geometry::Rect;
pub use layout::{PageIndex, WordToken};
pub use locator::{locate, Located, Locator, LocatorConfig, MatchPass};
pub use naming::{combined_output_name, combined_output_path, find_combined_outputs};
pub use pipeline::{
    apply_highlights, highlight_evidence, locate_evidence, EvidenceSpan, HighlightOutcome,
};
pub use response::{parse_model_response, EvidenceItem, ModelResponse};
pub use session::{BatchReport, EvidenceRequest, HighlightSession, ItemReport, ItemStatus};

/// Number of pages in the PDF at `path`.
pub fn page_count(path: &std::path::Path) -> Result<usize> {
    Ok(persist::open_document(path)?.get_pages().len())
}
