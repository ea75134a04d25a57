//! Edit-distance similarity scores on a 0-100 scale.
//!
//! `ratio` is the normalized Indel similarity `2 * LCS / (|a| + |b|)`;
//! `partial_ratio` is the best `ratio` of the shorter string against any
//! alignment of it inside the longer one, including alignments that hang
//! off either end. Both compare chars exactly (no case folding).

use std::collections::HashMap;

/// Scores a candidate window against the evidence text.
pub trait Scorer {
    fn score(&self, candidate: &str, target: &str) -> f64;
}

/// The default scorer: [`partial_ratio`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PartialRatio;

impl Scorer for PartialRatio {
    fn score(&self, candidate: &str, target: &str) -> f64 {
        partial_ratio(candidate, target)
    }
}

impl<F> Scorer for F
where
    F: Fn(&str, &str) -> f64,
{
    fn score(&self, candidate: &str, target: &str) -> f64 {
        self(candidate, target)
    }
}

/// Per-char match bitmasks of a pattern, one u64 per 64 pattern chars.
struct PatternMasks {
    len: usize,
    blocks: usize,
    ascii: Vec<u64>,
    other: HashMap<char, Vec<u64>>,
}

impl PatternMasks {
    fn new(pattern: &[char]) -> Self {
        let blocks = pattern.len().div_ceil(64).max(1);
        let mut ascii = vec![0u64; 128 * blocks];
        let mut other: HashMap<char, Vec<u64>> = HashMap::new();
        for (i, &ch) in pattern.iter().enumerate() {
            let (block, bit) = (i / 64, 1u64 << (i % 64));
            if ch.is_ascii() {
                ascii[ch as usize * blocks + block] |= bit;
            } else {
                other.entry(ch).or_insert_with(|| vec![0; blocks])[block] |= bit;
            }
        }
        Self {
            len: pattern.len(),
            blocks,
            ascii,
            other,
        }
    }

    fn mask(&self, ch: char, block: usize) -> u64 {
        if ch.is_ascii() {
            self.ascii[ch as usize * self.blocks + block]
        } else {
            self.other.get(&ch).map(|m| m[block]).unwrap_or(0)
        }
    }

    /// Length of the longest common subsequence with `text` (Hyyrö's bit-vector LCS).
    fn lcs(&self, text: &[char]) -> usize {
        if self.len == 0 || text.is_empty() {
            return 0;
        }
        let mut v = vec![u64::MAX; self.blocks];
        for &ch in text {
            let mut carry = 0u64;
            for (block, slot) in v.iter_mut().enumerate() {
                let matches = *slot & self.mask(ch, block);
                let (sum, c1) = slot.overflowing_add(matches);
                let (sum, c2) = sum.overflowing_add(carry);
                carry = u64::from(c1 || c2);
                *slot = sum | (*slot - matches);
            }
        }

        let mut lcs = 0;
        for (block, slot) in v.iter().enumerate() {
            let bits = (self.len - block * 64).min(64);
            let valid = if bits == 64 { u64::MAX } else { (1u64 << bits) - 1 };
            lcs += (!slot & valid).count_ones() as usize;
        }
        lcs
    }
}

fn scaled(lcs: usize, total: usize) -> f64 {
    if total == 0 {
        return 100.0;
    }
    100.0 * (2 * lcs) as f64 / total as f64
}

/// Normalized Indel similarity of two strings.
pub fn ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    scaled(PatternMasks::new(&a).lcs(&b), a.len() + b.len())
}

/// Best ratio of `short` against every alignment inside `long`.
fn best_alignment(short: &[char], long: &[char]) -> f64 {
    let masks = PatternMasks::new(short);
    let n = short.len();
    let m = long.len();
    let score = |window: &[char]| scaled(masks.lcs(window), n + window.len());

    let mut best: f64 = 0.0;
    // Alignments overhanging the left edge
    for end in 1..n {
        best = best.max(score(&long[..end]));
    }
    for start in 0..=m - n {
        best = best.max(score(&long[start..start + n]));
        if best >= 100.0 {
            return 100.0;
        }
    }
    // Alignments overhanging the right edge
    for start in m - n + 1..m {
        best = best.max(score(&long[start..]));
    }
    best
}

/// How well the shorter string matches as a substring of the longer one.
///
/// Symmetric in its arguments. Two empty strings score 100; one empty
/// string scores 0.
pub fn partial_ratio(s1: &str, s2: &str) -> f64 {
    let a: Vec<char> = s1.chars().collect();
    let b: Vec<char> = s2.chars().collect();
    match (a.is_empty(), b.is_empty()) {
        (true, true) => return 100.0,
        (true, false) | (false, true) => return 0.0,
        _ => {}
    }

    match a.len().cmp(&b.len()) {
        std::cmp::Ordering::Less => best_alignment(&a, &b),
        std::cmp::Ordering::Greater => best_alignment(&b, &a),
        std::cmp::Ordering::Equal => best_alignment(&a, &b).max(best_alignment(&b, &a)),
    }
}
