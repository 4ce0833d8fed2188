//! `[S#]` citation markers: validation, stripping and verbatim repair.

use regex::{Captures, Regex};
use std::sync::LazyLock;

use askdb_core::types::Source;

static CITATION_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[S(\d+)\]").expect("citation regex is valid"));
static SPACE_BEFORE_PUNCT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]+([.,;:!?])").expect("spacing regex is valid"));
static MULTI_SPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t]{2,}").expect("spacing regex is valid"));

/// Longest answer that may be repaired by finding it verbatim in a source.
pub const MAX_VERBATIM_REPAIR_CHARS: usize = 80;

/// Source numbers cited in `text`, in order of appearance.
pub fn cited_numbers(text: &str) -> Vec<usize> {
    CITATION_RE
        .captures_iter(text)
        .filter_map(|c| c.get(1).and_then(|m| m.as_str().parse().ok()))
        .collect()
}

pub fn is_valid_number(n: usize, source_count: usize) -> bool {
    (1..=source_count).contains(&n)
}

pub fn has_valid_citation(text: &str, source_count: usize) -> bool {
    cited_numbers(text).into_iter().any(|n| is_valid_number(n, source_count))
}

/// Removes markers that point past the source list and tidies the spacing
/// they leave behind.
pub fn strip_invalid_citations(text: &str, source_count: usize) -> String {
    let mut removed = false;
    let stripped = CITATION_RE.replace_all(text, |caps: &Captures<'_>| {
        let valid = caps
            .get(1)
            .and_then(|m| m.as_str().parse::<usize>().ok())
            .is_some_and(|n| is_valid_number(n, source_count));
        if valid {
            caps[0].to_string()
        } else {
            removed = true;
            String::new()
        }
    });
    if !removed {
        return text.to_string();
    }
    let tidy = SPACE_BEFORE_PUNCT_RE.replace_all(&stripped, "$1");
    MULTI_SPACE_RE.replace_all(&tidy, " ").trim().to_string()
}

/// For a short uncited answer that appears verbatim (ignoring case and
/// trailing punctuation) in a source, returns the answer with that source's
/// citation appended.
pub fn attach_verbatim_citation(answer: &str, sources: &[Source]) -> Option<String> {
    let trimmed = answer.trim();
    if trimmed.is_empty() || trimmed.chars().count() > MAX_VERBATIM_REPAIR_CHARS {
        return None;
    }
    let needle = trimmed.trim_end_matches(['.', '!', '?']).trim().to_lowercase();
    if needle.is_empty() {
        return None;
    }
    sources
        .iter()
        .find(|s| s.text().to_lowercase().contains(&needle))
        .map(|s| format!("{trimmed} {}", s.source_id.citation()))
}
