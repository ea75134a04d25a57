//! Literal phrase search over a page's words

use super::WordToken;
use crate::geometry::Rect;
use std::collections::BTreeMap;

/// Lowercased page text, each char tagged with (word, char offset in word).
/// Word separators carry no tag.
fn haystack(words: &[WordToken]) -> Vec<(char, Option<(usize, usize)>)> {
    let mut hay = Vec::new();
    for (wi, word) in words.iter().enumerate() {
        if wi > 0 {
            hay.push((' ', None));
        }
        for (ci, ch) in word.text.chars().enumerate() {
            for lower in ch.to_lowercase() {
                hay.push((lower, Some((wi, ci))));
            }
        }
    }
    hay
}

fn normalize_needle(needle: &str) -> Vec<char> {
    needle
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .flat_map(char::to_lowercase)
        .collect()
}

/// Part of a word's box covering chars `first..=last`.
fn clip(word: &WordToken, first: usize, last: usize) -> Rect {
    let b = &word.bbox;
    let count = word.text.chars().count().max(1) as f64;
    let x0 = if first == 0 {
        b.x0
    } else {
        b.x0 + b.width() * first as f64 / count
    };
    let x1 = if (last + 1) as f64 >= count {
        b.x1
    } else {
        b.x0 + b.width() * (last + 1) as f64 / count
    };
    Rect::new(x0, b.y0, x1, b.y1)
}

pub(super) fn search_exact(words: &[WordToken], needle: &str) -> Vec<Rect> {
    let needle = normalize_needle(needle);
    if needle.is_empty() {
        return Vec::new();
    }
    let hay = haystack(words);

    let mut rects = Vec::new();
    let mut i = 0;
    while i + needle.len() <= hay.len() {
        let hit = hay[i..i + needle.len()]
            .iter()
            .zip(&needle)
            .all(|((h, _), n)| h == n);
        if !hit {
            i += 1;
            continue;
        }

        // word -> (first char, last char) covered by this hit
        let mut covered: BTreeMap<usize, (usize, usize)> = BTreeMap::new();
        for (_, tag) in &hay[i..i + needle.len()] {
            if let Some((wi, ci)) = *tag {
                let span = covered.entry(wi).or_insert((ci, ci));
                span.0 = span.0.min(ci);
                span.1 = span.1.max(ci);
            }
        }

        let mut line: Option<((usize, usize), Rect)> = None;
        for (wi, (first, last)) in covered {
            let word = &words[wi];
            let key = (word.block_index, word.line_index);
            let part = clip(word, first, last);
            line = match line {
                Some((k, r)) if k == key => Some((k, r.union(&part))),
                Some((_, r)) => {
                    rects.push(r);
                    Some((key, part))
                }
                None => Some((key, part)),
            };
        }
        if let Some((_, r)) = line {
            rects.push(r);
        }

        i += needle.len();
    }
    rects
}
