//! Edit-distance title similarity.

use crate::normalize::normalize_title;
use strsim::levenshtein;

/// Length difference below which a substring title counts as a truncated form.
const SUBSTRING_MAX_LEN_DIFF: usize = 10;
const MAX_ALLOWED_DISTANCE: usize = 15;
/// 15% of the longer title, rounded up.
const ALLOWED_DISTANCE_PERCENT: usize = 15;

/// Levenshtein distance between the normalized forms of `a` and `b`, in characters.
pub fn distance(a: &str, b: &str) -> usize {
    levenshtein(&normalize_title(a), &normalize_title(b))
}

/// Distance budget for two titles of the given character lengths.
pub fn allowed_distance(len_a: usize, len_b: usize) -> usize {
    let longest = len_a.max(len_b);
    let scaled = (ALLOWED_DISTANCE_PERCENT * longest).div_ceil(100);
    scaled.min(MAX_ALLOWED_DISTANCE)
}

/// Whether two titles name the same document for merge purposes.
pub fn are_similar(a: &str, b: &str) -> bool {
    let a = normalize_title(a);
    let b = normalize_title(b);
    if a == b {
        return true;
    }

    let len_a = a.chars().count();
    let len_b = b.chars().count();
    if (a.contains(&b) || b.contains(&a)) && len_a.abs_diff(len_b) < SUBSTRING_MAX_LEN_DIFF {
        return true;
    }

    levenshtein(&a, &b) <= allowed_distance(len_a, len_b)
}
