use std::collections::HashSet;

/// Tokens shorter than this are dropped.
pub const MIN_TOKEN_LEN: usize = 3;

/// Lowercases, treats anything outside `[a-z0-9]` as a separator and drops
/// tokens of two characters or fewer.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_ascii_lowercase() || c.is_ascii_digit()))
        .filter(|t| t.len() >= MIN_TOKEN_LEN)
        .map(str::to_string)
        .collect()
}

/// Distinct tokens in first-seen order.
pub fn unique_terms(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    tokenize(text).into_iter().filter(|t| seen.insert(t.clone())).collect()
}
