//! Evidence locator
//!
//! Finds where a model-quoted span sits on a page. A literal phrase search
//! runs first; only when it finds nothing does the fuzzy sliding-window
//! search run:
//!
//! 1. For each start index `i` in `0..=words - max_window`
//! 2. grow the window from the evidence word count up to `max_window`
//!    (`min(words, evidence words + buffer)`),
//! 3. accept the first window whose score reaches the threshold, record the
//!    envelope of its word boxes and move on to `i + 1`.
//!
//! Each start index contributes at most one window. Windows from nearby
//! start indices may overlap; they are reported as-is, in start order.
//!
//! A locator may carry a deadline. The fuzzy pass checks it before every
//! start index and gives up with [`Located::Expired`] once it has passed.

use crate::config::HighlightConfig;
use crate::geometry::Rect;
use crate::layout::PageIndex;
use crate::similarity::{PartialRatio, Scorer};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

/// Knobs for the fuzzy pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocatorConfig {
    /// Inclusive lower bound on an accepted score (0-100)
    pub threshold: f64,
    /// Extra words a window may have beyond the evidence word count
    pub buffer: usize,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            threshold: 90.0,
            buffer: 10,
        }
    }
}

impl From<&HighlightConfig> for LocatorConfig {
    fn from(config: &HighlightConfig) -> Self {
        Self {
            threshold: config.threshold,
            buffer: config.buffer,
        }
    }
}

/// Which search produced the rectangles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPass {
    Exact,
    Fuzzy,
}

/// An accepted fuzzy window `[start, start + len)` over the page index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchWindow {
    pub start: usize,
    pub len: usize,
    pub score: f64,
    pub rect: Rect,
}

/// Result of locating one evidence span on one page.
#[derive(Debug, Clone, PartialEq)]
pub enum Located {
    Exact(Vec<Rect>),
    Fuzzy(Vec<MatchWindow>),
    NotFound,
    /// The deadline passed before the fuzzy pass finished
    Expired,
}

impl Located {
    pub fn pass(&self) -> Option<MatchPass> {
        match self {
            Located::Exact(_) => Some(MatchPass::Exact),
            Located::Fuzzy(_) => Some(MatchPass::Fuzzy),
            Located::NotFound | Located::Expired => None,
        }
    }

    pub fn rects(&self) -> Vec<Rect> {
        match self {
            Located::Exact(rects) => rects.clone(),
            Located::Fuzzy(windows) => windows.iter().map(|w| w.rect).collect(),
            Located::NotFound | Located::Expired => Vec::new(),
        }
    }

    pub fn is_found(&self) -> bool {
        self.pass().is_some()
    }
}

/// Turn literal `\n` escapes into newlines and trim.
pub fn normalize_evidence(text: &str) -> String {
    text.replace("\\n", "\n").trim().to_string()
}

/// Locates evidence spans, scoring fuzzy windows with `S`.
#[derive(Debug, Clone)]
pub struct Locator<S = PartialRatio> {
    config: LocatorConfig,
    scorer: S,
    deadline: Option<Instant>,
}

impl Locator<PartialRatio> {
    pub fn new(config: LocatorConfig) -> Self {
        Self {
            config,
            scorer: PartialRatio,
            deadline: None,
        }
    }
}

impl Default for Locator<PartialRatio> {
    fn default() -> Self {
        Self::new(LocatorConfig::default())
    }
}

impl<S: Scorer> Locator<S> {
    pub fn with_scorer(config: LocatorConfig, scorer: S) -> Self {
        Self {
            config,
            scorer,
            deadline: None,
        }
    }

    /// Stop the fuzzy pass once `deadline` has passed.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn config(&self) -> &LocatorConfig {
        &self.config
    }

    /// Exact pass, then fuzzy fallback.
    pub fn locate(&self, page: &PageIndex, evidence: &str) -> Located {
        let target = normalize_evidence(evidence);
        if target.is_empty() || page.is_empty() {
            return Located::NotFound;
        }

        let exact = page.search_exact(&target);
        if !exact.is_empty() {
            debug!(hits = exact.len(), "Exact match");
            return Located::Exact(exact);
        }

        let Some(windows) = self.scan(page, &target) else {
            return Located::Expired;
        };
        if windows.is_empty() {
            debug!(words = page.len(), "No window reached the threshold");
            Located::NotFound
        } else {
            debug!(windows = windows.len(), "Fuzzy match");
            Located::Fuzzy(windows)
        }
    }

    /// The sliding-window search on its own. `target` must already be normalized.
    ///
    /// An expired deadline yields no windows.
    pub fn fuzzy_windows(&self, page: &PageIndex, target: &str) -> Vec<MatchWindow> {
        self.scan(page, target).unwrap_or_default()
    }

    /// `None` when the deadline passed mid-scan.
    fn scan(&self, page: &PageIndex, target: &str) -> Option<Vec<MatchWindow>> {
        let total = page.len();
        let target_words = target.split_whitespace().count();
        if total == 0 || target_words == 0 {
            return Some(Vec::new());
        }
        let max_window = total.min(target_words + self.config.buffer);

        let mut windows = Vec::new();
        for start in 0..=total - max_window {
            if self.deadline.is_some_and(|d| Instant::now() >= d) {
                debug!(start, words = total, "Fuzzy search deadline reached");
                return None;
            }
            for len in target_words..=max_window {
                let candidate = page.join(start, len);
                let score = self.scorer.score(&candidate, target);
                if score >= self.config.threshold {
                    if let Some(rect) = page.window_rect(start, len) {
                        windows.push(MatchWindow {
                            start,
                            len,
                            score,
                            rect,
                        });
                    }
                    break;
                }
            }
        }
        Some(windows)
    }
}

/// Locate with the default scorer and buffer, returning only rectangles.
pub fn locate(page: &PageIndex, evidence: &str, threshold: f64) -> Vec<Rect> {
    Locator::new(LocatorConfig {
        threshold,
        ..LocatorConfig::default()
    })
    .locate(page, evidence)
    .rects()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::WordToken;
    use crate::similarity::partial_ratio;
    use pretty_assertions::assert_eq;
    use std::cell::Cell;

    /// One line of words, 10pt per char with 5pt gaps.
    fn page(text: &str) -> PageIndex {
        let mut x = 0.0;
        let words = text
            .split_whitespace()
            .enumerate()
            .map(|(i, w)| {
                let width = 10.0 * w.chars().count() as f64;
                let token = WordToken::new(w, Rect::new(x, 0.0, x + width, 12.0))
                    .with_position(0, 0, i);
                x += width + 5.0;
                token
            })
            .collect();
        PageIndex::new(words)
    }

    const FOX: &str = "The quick brown fox jumps over the lazy dog";

    #[test]
    fn test_normalize_evidence() {
        assert_eq!(normalize_evidence("  brown fox\\njumps \n"), "brown fox\njumps");
        assert_eq!(normalize_evidence("\\n"), "");
    }

    #[test]
    fn test_exact_match_skips_fuzzy_pass() {
        let calls = Cell::new(0);
        let locator = Locator::with_scorer(LocatorConfig::default(), |a: &str, b: &str| {
            calls.set(calls.get() + 1);
            partial_ratio(a, b)
        });

        let located = locator.locate(&page(FOX), "the quick brown fox jumps");
        assert_eq!(calls.get(), 0);
        assert_eq!(located.pass(), Some(MatchPass::Exact));
        assert_eq!(located.rects(), vec![Rect::new(0.0, 0.0, 230.0, 12.0)]);
    }

    #[test]
    fn test_typo_falls_back_to_fuzzy() {
        let calls = Cell::new(0);
        let locator = Locator::with_scorer(LocatorConfig::default(), |a: &str, b: &str| {
            calls.set(calls.get() + 1);
            partial_ratio(a, b)
        });

        let located = locator.locate(&page(FOX), "the quikc brown fox jumps");
        assert!(calls.get() > 0);
        let Located::Fuzzy(windows) = located else {
            panic!("expected a fuzzy match, got {:?}", located);
        };
        assert_eq!(windows.len(), 1);
        assert_eq!((windows[0].start, windows[0].len), (0, 5));
        assert_eq!(windows[0].rect, Rect::new(0.0, 0.0, 230.0, 12.0));
    }

    #[test]
    fn test_threshold_is_inclusive() {
        // partial_ratio("abcdeXghij", "abcdefghij") == 90 exactly
        let index = page("abcdeXghij");
        let at = Locator::new(LocatorConfig {
            threshold: 90.0,
            buffer: 10,
        });
        let above = Locator::new(LocatorConfig {
            threshold: 91.0,
            buffer: 10,
        });
        assert_eq!(at.locate(&index, "abcdefghij").rects().len(), 1);
        assert_eq!(above.locate(&index, "abcdefghij"), Located::NotFound);
    }

    #[test]
    fn test_smallest_window_wins() {
        let index = page("alpha beta gamma delta");
        let windows = Locator::default().fuzzy_windows(&index, "alpha betx");
        assert_eq!(windows.len(), 1);
        assert_eq!((windows[0].start, windows[0].len), (0, 2));
        assert_eq!(windows[0].rect, index.window_rect(0, 2).unwrap());
    }

    #[test]
    fn test_overlapping_windows_are_kept_in_start_order() {
        let index = page(&["apple"; 14].join(" "));
        let windows = Locator::default().fuzzy_windows(&index, "apple apple applx");
        let starts: Vec<usize> = windows.iter().map(|w| w.start).collect();
        assert_eq!(starts, vec![0, 1]);
        assert!(windows[0].rect.intersects(&windows[1].rect));
    }

    #[test]
    fn test_scorer_sees_single_space_joined_windows() {
        let seen = std::cell::RefCell::new(Vec::new());
        let locator = Locator::with_scorer(
            LocatorConfig {
                threshold: 100.0,
                buffer: 1,
            },
            |a: &str, _: &str| {
                seen.borrow_mut().push(a.to_string());
                0.0
            },
        );
        locator.fuzzy_windows(&page("one two three"), "x y");
        assert_eq!(
            *seen.borrow(),
            vec!["one two", "one two three"]
        );
    }

    #[test]
    fn test_empty_page_and_empty_evidence() {
        assert_eq!(Locator::default().locate(&PageIndex::default(), "anything"), Located::NotFound);
        assert_eq!(Locator::default().locate(&page(FOX), "  \\n "), Located::NotFound);
    }

    #[test]
    fn test_page_shorter_than_evidence_forms_no_windows() {
        let index = page("quick brown");
        let windows = Locator::default().fuzzy_windows(&index, "the quick brown fox");
        assert!(windows.is_empty());
    }

    #[test]
    fn test_escaped_newline_evidence_matches_exactly() {
        let rects = locate(&page(FOX), "brown fox\\njumps", 90.0);
        assert_eq!(rects, vec![Rect::new(90.0, 0.0, 230.0, 12.0)]);
    }

    #[test]
    fn test_passed_deadline_stops_fuzzy_pass() {
        let calls = Cell::new(0);
        let locator = Locator::with_scorer(LocatorConfig::default(), |a: &str, b: &str| {
            calls.set(calls.get() + 1);
            partial_ratio(a, b)
        })
        .with_deadline(Instant::now());

        let located = locator.locate(&page(FOX), "the quikc brown fox jumps");
        assert_eq!(located, Located::Expired);
        assert_eq!(calls.get(), 0);
        assert!(!located.is_found());
        assert!(located.rects().is_empty());
    }

    #[test]
    fn test_deadline_does_not_affect_exact_pass() {
        let locator = Locator::default().with_deadline(Instant::now());
        let located = locator.locate(&page(FOX), "lazy dog");
        assert_eq!(located.pass(), Some(MatchPass::Exact));
    }

    #[test]
    fn test_future_deadline_finishes_normally() {
        let locator = Locator::default()
            .with_deadline(Instant::now() + std::time::Duration::from_secs(60));
        let located = locator.locate(&page(FOX), "the quikc brown fox jumps");
        assert_eq!(located.pass(), Some(MatchPass::Fuzzy));
    }

    #[test]
    fn test_unrelated_text_not_found() {
        assert!(locate(&page(FOX), "completely different sentence here", 90.0).is_empty());
    }
}
