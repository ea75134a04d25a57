//! Locate-and-annotate pipeline for one evidence item.
//!
//! The two halves are separate calls: [`locate_evidence`] only reads the
//! source, [`apply_highlights`] opens the base, annotates and commits.

use crate::annotate::add_highlight_annotation;
use crate::cache::PageIndexCache;
use crate::config::{HighlightConfig, HighlightStyle};
use crate::error::{HighlightError, Result};
use crate::geometry::Rect;
use crate::layout::{self, PageIndex};
use crate::locator::{Located, Locator, MatchPass};
use crate::persist;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument};

/// A quoted span and where it supposedly came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceSpan {
    pub text: String,
    pub source: PathBuf,
    /// 0-based
    pub page: usize,
}

/// What happened to one evidence span.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum HighlightOutcome {
    /// Rectangles were found and committed to the output.
    Highlighted { pass: MatchPass, rects: Vec<Rect> },
    /// Neither pass found the span; nothing was written.
    NoMatch,
}

impl HighlightOutcome {
    pub fn count(&self) -> usize {
        match self {
            HighlightOutcome::Highlighted { rects, .. } => rects.len(),
            HighlightOutcome::NoMatch => 0,
        }
    }
}

/// Locate `span` on its page and add the matches to `output`.
pub fn highlight_evidence(
    span: &EvidenceSpan,
    output: &Path,
    config: &HighlightConfig,
) -> Result<HighlightOutcome> {
    highlight_evidence_with_cache(span, output, config, None)
}

/// [`highlight_evidence`], reusing page indexes from `cache` when given.
pub fn highlight_evidence_with_cache(
    span: &EvidenceSpan,
    output: &Path,
    config: &HighlightConfig,
    cache: Option<&PageIndexCache>,
) -> Result<HighlightOutcome> {
    let located = locate_evidence(span, config, cache, None)?;
    let Some(pass) = located.pass() else {
        return Ok(HighlightOutcome::NoMatch);
    };
    let rects = located.rects();
    apply_highlights(&span.source, span.page, &rects, output, &config.style)?;
    info!(count = rects.len(), ?pass, output = %output.display(), "Highlighted evidence");
    Ok(HighlightOutcome::Highlighted { pass, rects })
}

/// Find `span` on its page without touching any output.
///
/// Words come from the source document; annotations never change them, so
/// one index serves every later commit. Past `deadline` the fuzzy pass gives
/// up with [`Located::Expired`].
#[instrument(
    skip(span, config, cache, deadline),
    fields(source = %span.source.display(), page = span.page)
)]
pub fn locate_evidence(
    span: &EvidenceSpan,
    config: &HighlightConfig,
    cache: Option<&PageIndexCache>,
    deadline: Option<Instant>,
) -> Result<Located> {
    let build = || PageIndex::load(&span.source, span.page);
    let index = match cache {
        Some(cache) => cache.get_or_build(&span.source, span.page, build)?,
        None => Arc::new(build()?),
    };

    let mut locator = Locator::new(config.into());
    if let Some(deadline) = deadline {
        locator = locator.with_deadline(deadline);
    }
    let located = locator.locate(&index, &span.text);
    match &located {
        Located::Fuzzy(windows) => {
            for w in windows {
                debug!(start = w.start, len = w.len, score = w.score, "Accepted window");
            }
        }
        Located::NotFound => debug!(words = index.len(), "Evidence not found on page"),
        Located::Expired => debug!(words = index.len(), "Locate abandoned at deadline"),
        Located::Exact(_) => {}
    }
    Ok(located)
}

/// Add `rects` (top-left page space) as highlights on a 0-based page.
///
/// The existing `output` is the base when present, so calls accumulate.
/// Returns the number of annotations written. An empty `rects` writes
/// nothing.
#[instrument(skip(rects, style), fields(count = rects.len()))]
pub fn apply_highlights(
    source: &Path,
    page_number: usize,
    rects: &[Rect],
    output: &Path,
    style: &HighlightStyle,
) -> Result<usize> {
    if rects.is_empty() {
        return Ok(0);
    }
    let mut base = persist::open_base(source, output)?;
    let page_id = layout::page_id(&base.doc, page_number)?;

    let page_count = base.doc.get_pages().len();
    for rect in rects {
        add_highlight_annotation(&mut base.doc, page_id, rect, style)?;
    }
    let after = base.doc.get_pages().len();
    if after != page_count {
        return Err(HighlightError::persist(
            output,
            format!("page count changed from {} to {}", page_count, after),
        ));
    }

    persist::save_atomic(&mut base.doc, output)?;
    Ok(rects.len())
}
