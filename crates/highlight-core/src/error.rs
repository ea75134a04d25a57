use std::path::PathBuf;
use thiserror::Error;

/// Failures local to a single evidence item.
///
/// Nothing here is process-fatal: a batch logs the error for the item and
/// moves on. An evidence span that cannot be located is not an error at all,
/// see [`crate::pipeline::HighlightOutcome::NoMatch`].
#[derive(Error, Debug)]
pub enum HighlightError {
    #[error("Failed to open PDF {path}: {reason}")]
    DocumentOpen { path: PathBuf, reason: String },

    #[error("Page {page} is out of range (document has {page_count} pages)")]
    PageOutOfRange { page: usize, page_count: usize },

    #[error("Failed to read text on page {page}: {reason}")]
    TextExtraction { page: usize, reason: String },

    #[error("Failed to persist {path}: {reason}")]
    Persist { path: PathBuf, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Could not parse model response: {0}")]
    ResponseParse(String),
}

impl HighlightError {
    pub(crate) fn open(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::DocumentOpen {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn persist(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Persist {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, HighlightError>;
