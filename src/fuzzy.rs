//! Fuzzy string similarity used to rank and validate homepage candidates
//!
//! The similarity of two strings is their normalized indel similarity:
//! `1 - indel_distance / (len_a + len_b)`, where only insertions and deletions
//! are counted. This equals `2 * LCS / (len_a + len_b)` and is the measure
//! behind the classic "fuzz ratio" on a 0–100 scale.

/// Default cutoff for [`has_close_match`]
pub const CLOSE_MATCH_CUTOFF: f64 = 0.6;

/// Similarity of two strings in `[0.0, 1.0]`. Two empty strings are identical.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();

    if total == 0 {
        return 1.0;
    }

    1.0 - indel_distance(&a, &b) as f64 / total as f64
}

/// Similarity ratio on a 0–100 integer scale
pub fn ratio(a: &str, b: &str) -> u8 {
    (similarity(a, b) * 100.0).round() as u8
}

/// Whether any of `candidates` is at least `cutoff` similar to `word`.
///
/// An empty `word` never matches.
pub fn has_close_match<'a, I>(word: &str, candidates: I, cutoff: f64) -> bool
where
    I: IntoIterator<Item = &'a str>,
{
    if word.trim().is_empty() {
        return false;
    }
    candidates
        .into_iter()
        .any(|candidate| similarity(word, candidate) >= cutoff)
}

fn indel_distance(a: &[char], b: &[char]) -> usize {
    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];

    for i in 1..=a.len() {
        current[0] = i;
        for j in 1..=b.len() {
            current[j] = if a[i - 1] == b[j - 1] {
                previous[j - 1]
            } else {
                // deletion or insertion, substitution is not a single edit
                previous[j].min(current[j - 1]) + 1
            };
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[b.len()]
}
