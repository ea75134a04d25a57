//! Word-level page layout
//!
//! A [`PageIndex`] is the ordered word grid of one page: every word token the
//! content stream draws, with its box in top-left page space, sorted
//! top-to-bottom then left-to-right.

mod extract;
mod search;

pub use extract::extract_words;

use crate::error::{HighlightError, Result};
use crate::geometry::Rect;
use lopdf::{Document, ObjectId};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One word drawn on a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordToken {
    pub bbox: Rect,
    pub text: String,
    /// Run of lines no more than 1.5 em apart
    pub block_index: usize,
    /// Baseline within the block
    pub line_index: usize,
    /// Position within the line
    pub word_index: usize,
}

impl WordToken {
    pub fn new(text: impl Into<String>, bbox: Rect) -> Self {
        Self {
            bbox,
            text: text.into(),
            block_index: 0,
            line_index: 0,
            word_index: 0,
        }
    }

    pub fn with_position(mut self, block_index: usize, line_index: usize, word_index: usize) -> Self {
        self.block_index = block_index;
        self.line_index = line_index;
        self.word_index = word_index;
        self
    }
}

/// Words of one page in reading order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageIndex {
    words: Vec<WordToken>,
}

impl PageIndex {
    /// Sort tokens by top edge, then left edge.
    ///
    /// The reader gives no ordering guarantee, so the order tokens arrive in
    /// is irrelevant. Ties keep their arrival order.
    pub fn new(mut words: Vec<WordToken>) -> Self {
        words.sort_by(|a, b| {
            a.bbox
                .y0
                .total_cmp(&b.bbox.y0)
                .then(a.bbox.x0.total_cmp(&b.bbox.x0))
        });
        Self { words }
    }

    /// Read a PDF from disk and build the index for one 0-based page.
    pub fn load(path: &Path, page_number: usize) -> Result<Self> {
        let doc = pdf_extract::Document::load(path).map_err(|e| HighlightError::open(path, e))?;
        Self::from_document(&doc, page_number)
    }

    /// Build the index for a 0-based page of a document already loaded
    /// through pdf-extract.
    pub fn from_document(doc: &pdf_extract::Document, page_number: usize) -> Result<Self> {
        Ok(Self::new(extract_words(doc, page_number)?))
    }

    pub fn words(&self) -> &[WordToken] {
        &self.words
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Page text as single-space-joined words.
    pub fn text(&self) -> String {
        self.join(0, self.words.len())
    }

    /// Tokens `[start, start + len)` joined with single spaces.
    pub fn join(&self, start: usize, len: usize) -> String {
        let end = (start + len).min(self.words.len());
        let mut out = String::new();
        for (i, word) in self.words[start.min(end)..end].iter().enumerate() {
            if i > 0 {
                out.push(' ');
            }
            out.push_str(&word.text);
        }
        out
    }

    /// Envelope of the boxes of tokens `[start, start + len)`.
    pub fn window_rect(&self, start: usize, len: usize) -> Option<Rect> {
        let end = (start + len).min(self.words.len());
        Rect::union_all(self.words[start.min(end)..end].iter().map(|w| &w.bbox))
    }

    /// Phrase search in the manner of a PDF viewer's find box.
    ///
    /// Case- and whitespace-insensitive. Returns one rectangle per text line
    /// touched by each hit, in hit order.
    pub fn search_exact(&self, needle: &str) -> Vec<Rect> {
        search::search_exact(&self.words, needle)
    }
}

/// Resolve a 0-based page number to its object id.
pub fn page_id(doc: &Document, page_number: usize) -> Result<ObjectId> {
    let pages = doc.get_pages();
    pages
        .values()
        .nth(page_number)
        .copied()
        .ok_or(HighlightError::PageOutOfRange {
            page: page_number,
            page_count: pages.len(),
        })
}
