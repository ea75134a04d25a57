//! Word tokens from pdf-extract's glyph stream
//!
//! pdf-extract interprets the content stream, resolves fonts and encodings,
//! and reports every glyph with its text rendering matrix and advance width.
//! This module only groups those glyphs into words, lines and blocks. Glyph
//! boxes span from 0.2 em below the baseline to 0.8 em above it; exact font
//! ascent/descent is not needed to match and highlight words.

use super::WordToken;
use crate::error::{HighlightError, Result};
use crate::geometry::{PageBox, Rect};
use pdf_extract::{Document, MediaBox, OutputDev, OutputError, Transform};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, warn};

const DESCENT: f64 = -0.2;
const ASCENT: f64 = 0.8;
/// Baseline drop, in em, that starts a new block instead of a new line
const BLOCK_GAP: f64 = 1.5;

/// Glyph-space point (in em) to user space.
fn apply(trm: &Transform, font_size: f64, x: f64, y: f64) -> (f64, f64) {
    let (x, y) = (x * font_size, y * font_size);
    (
        x * trm.m11 + y * trm.m21 + trm.m31,
        x * trm.m12 + y * trm.m22 + trm.m32,
    )
}

struct PendingWord {
    text: String,
    bbox: Rect,
}

/// Groups placed glyphs into words, lines and blocks.
struct WordBuilder {
    page_box: PageBox,
    words: Vec<WordToken>,
    current: Option<PendingWord>,
    block: usize,
    block_has_words: bool,
    line: usize,
    word_in_line: usize,
    baseline: Option<f64>,
    last_end_x: f64,
}

impl WordBuilder {
    fn new(page_box: PageBox) -> Self {
        Self {
            page_box,
            words: Vec::new(),
            current: None,
            block: 0,
            block_has_words: false,
            line: 0,
            word_in_line: 0,
            baseline: None,
            last_end_x: 0.0,
        }
    }

    /// Place one non-blank glyph. `origin` is the baseline start in user space.
    fn glyph(&mut self, text: &str, bbox: Rect, origin: (f64, f64), end_x: f64, size: f64) {
        let tolerance = size.abs().max(1.0);
        if let Some(baseline) = self.baseline {
            let drop = baseline - origin.1;
            if drop > BLOCK_GAP * tolerance || drop < -0.5 * tolerance {
                self.end_block();
            } else if drop.abs() > 0.5 * tolerance {
                self.flush();
                if self.block_has_words {
                    self.line += 1;
                    self.word_in_line = 0;
                }
            } else if self.current.is_some() {
                let gap = origin.0 - self.last_end_x;
                if gap > 0.25 * tolerance || gap < -0.5 * tolerance {
                    self.flush();
                }
            }
        }
        self.baseline = Some(origin.1);
        self.last_end_x = end_x;

        match &mut self.current {
            Some(word) => {
                word.text.push_str(text);
                word.bbox = word.bbox.union(&bbox);
            }
            None => {
                self.current = Some(PendingWord {
                    text: text.to_string(),
                    bbox,
                });
            }
        }
    }

    fn flush(&mut self) {
        let Some(word) = self.current.take() else {
            return;
        };
        self.words.push(
            WordToken::new(word.text, self.page_box.to_top_left(&word.bbox)).with_position(
                self.block,
                self.line,
                self.word_in_line,
            ),
        );
        self.word_in_line += 1;
        self.block_has_words = true;
    }

    fn end_block(&mut self) {
        self.flush();
        if self.block_has_words {
            self.block += 1;
        }
        self.block_has_words = false;
        self.line = 0;
        self.word_in_line = 0;
        self.baseline = None;
    }
}

/// Collects the words of one page out of a whole-document pass.
struct PageWords {
    target: u32,
    /// Inside the target page
    active: bool,
    builder: Option<WordBuilder>,
}

impl OutputDev for PageWords {
    fn begin_page(
        &mut self,
        page_num: u32,
        media_box: &MediaBox,
        _art_box: Option<(f64, f64, f64, f64)>,
    ) -> std::result::Result<(), OutputError> {
        self.active = page_num == self.target;
        if self.active {
            self.builder = Some(WordBuilder::new(PageBox {
                llx: media_box.llx.min(media_box.urx),
                lly: media_box.lly.min(media_box.ury),
                urx: media_box.llx.max(media_box.urx),
                ury: media_box.lly.max(media_box.ury),
            }));
        }
        Ok(())
    }

    fn end_page(&mut self) -> std::result::Result<(), OutputError> {
        if self.active {
            if let Some(builder) = self.builder.as_mut() {
                builder.end_block();
            }
        }
        self.active = false;
        Ok(())
    }

    fn output_character(
        &mut self,
        trm: &Transform,
        width: f64,
        _spacing: f64,
        font_size: f64,
        text: &str,
    ) -> std::result::Result<(), OutputError> {
        // Pages before and after the target still stream through here
        if !self.active {
            return Ok(());
        }
        let Some(builder) = self.builder.as_mut() else {
            return Ok(());
        };
        if text.chars().all(char::is_whitespace) {
            builder.flush();
            return Ok(());
        }

        let corners = [
            apply(trm, font_size, 0.0, DESCENT),
            apply(trm, font_size, width, DESCENT),
            apply(trm, font_size, 0.0, ASCENT),
            apply(trm, font_size, width, ASCENT),
        ];
        if let Some(bbox) = Rect::from_points(&corners) {
            let origin = apply(trm, font_size, 0.0, 0.0);
            let size = font_size * trm.m21.hypot(trm.m22);
            builder.glyph(text, bbox, origin, bbox.x1, size);
        }
        Ok(())
    }

    fn begin_word(&mut self) -> std::result::Result<(), OutputError> {
        Ok(())
    }

    fn end_word(&mut self) -> std::result::Result<(), OutputError> {
        Ok(())
    }

    fn end_line(&mut self) -> std::result::Result<(), OutputError> {
        Ok(())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "text extraction panicked".to_string())
}

/// Extract every word drawn on a 0-based page, in content-stream order.
///
/// Tokens are in top-left page space. Unsupported or malformed content is
/// reported as [`HighlightError::TextExtraction`], including panics inside
/// pdf-extract.
pub fn extract_words(doc: &Document, page_number: usize) -> Result<Vec<WordToken>> {
    let pages = doc.get_pages();
    let Some(&target) = pages.keys().nth(page_number) else {
        return Err(HighlightError::PageOutOfRange {
            page: page_number,
            page_count: pages.len(),
        });
    };

    let mut collector = PageWords {
        target,
        active: false,
        builder: None,
    };
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        pdf_extract::output_doc(doc, &mut collector)
    }));
    let reason = match outcome {
        Ok(Ok(())) => None,
        Ok(Err(e)) => Some(e.to_string()),
        Err(payload) => Some(panic_message(payload.as_ref())),
    };
    if let Some(reason) = reason {
        warn!(page = page_number, %reason, "Text extraction failed");
        return Err(HighlightError::TextExtraction {
            page: page_number,
            reason,
        });
    }

    let words = collector.builder.map(|b| b.words).unwrap_or_default();
    debug!(page = page_number, words = words.len(), "Extracted page words");
    Ok(words)
}
