//! String similarity ratio (Ratcliff/Obershelp).
//!
//! `ratio = 2·M / (|a| + |b|)` where `M` is the number of characters in
//! matching blocks found by recursively taking the longest common
//! substring and recursing on both sides of it.

/// Default threshold above which two names are considered the same entity.
pub const ENTITY_SIMILARITY_THRESHOLD: f64 = 0.8;

/// Similarity ratio in `[0, 1]` between two strings, compared by `char`.
pub fn sequence_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matching_chars(&a, &b) as f64 / total as f64
}

/// Case-insensitive similarity check: `ratio > threshold`.
pub fn is_similar(a: &str, b: &str, threshold: f64) -> bool {
    sequence_ratio(&a.to_lowercase(), &b.to_lowercase()) > threshold
}

fn matching_chars(a: &[char], b: &[char]) -> usize {
    let (start_a, start_b, len) = longest_common_block(a, b);
    if len == 0 {
        return 0;
    }
    len + matching_chars(&a[..start_a], &b[..start_b])
        + matching_chars(&a[start_a + len..], &b[start_b + len..])
}

/// Longest common substring; earliest in `a`, then earliest in `b`, on ties.
fn longest_common_block(a: &[char], b: &[char]) -> (usize, usize, usize) {
    let mut best = (0, 0, 0);
    // prev[j + 1] = length of the common suffix ending at a[i - 1], b[j]
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        for (j, cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb { prev[j] + 1 } else { 0 };
            let len = curr[j + 1];
            if len > best.2 {
                best = (i + 1 - len, j + 1 - len, len);
            }
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    best
}
