//! Approximate string similarity.
//!
//! The score is not an edit distance: characters are compared position by
//! position over the shared length and every extra character of the longer
//! string counts as one more mismatch. An insertion near the start of a name
//! therefore shifts everything after it and scores poorly. This is cheap and
//! good enough for short name strings, which is all it is used for.

/// Score in `[0, 1]` for two strings, compared case-sensitively.
///
/// - either string empty: `0.0`
/// - equal strings: `1.0`
/// - either shorter than three characters: `0.9` when one contains the other, else `0.0`
/// - otherwise `1 - mismatches / max_len`
pub fn similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }

    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let (len_a, len_b) = (a_chars.len(), b_chars.len());

    if len_a < 3 || len_b < 3 {
        return if a.contains(b) || b.contains(a) { 0.9 } else { 0.0 };
    }

    let positional = a_chars
        .iter()
        .zip(b_chars.iter())
        .filter(|(x, y)| x != y)
        .count();
    let mismatches = positional + len_a.abs_diff(len_b);

    1.0 - mismatches as f64 / len_a.max(len_b) as f64
}

/// Same as [`similarity`] after lower-casing both inputs. Name matching uses this one.
pub fn similarity_ignore_case(a: &str, b: &str) -> f64 {
    similarity(&a.to_lowercase(), &b.to_lowercase())
}
