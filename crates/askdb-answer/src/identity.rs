//! Structural name extraction for identity questions ("name", "who is this").
//!
//! Names usually sit on one of the first lines of a document, so only sources
//! that open a document (or sit early on page 1) are scanned, the first chunk
//! of a document ahead of the others. Mid-document chunks are never scanned.

use regex::Regex;
use std::sync::LazyLock;

use askdb_core::types::Source;

static NAME_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\p{L}][\p{L} '\-]*$").expect("name regex is valid"));

/// Lines scanned per source.
pub const LINES_PER_SOURCE: usize = 5;

/// Header words that look like a name line but are not one.
const HEADER_WORDS: &[&str] = &[
    "resume", "résumé", "cv", "curriculum", "vitae", "summary", "profile", "objective", "experience",
    "education", "skills", "contact", "references", "projects", "about", "introduction", "contents",
    "abstract", "chapter", "table", "page", "section", "appendix", "overview",
];

/// 0 for a document's first chunk, 1 for an early page-1 chunk, `None` for
/// chunks that cannot hold a document's opening lines.
fn position_rank(source: &Source) -> Option<u8> {
    let metadata = source.metadata();
    if metadata.starts_document() {
        Some(0)
    } else if metadata.early_on_first_page() {
        Some(1)
    } else {
        None
    }
}

pub fn looks_like_name(line: &str) -> bool {
    let chars = line.chars().count();
    if !(3..=50).contains(&chars) || !NAME_LINE_RE.is_match(line) {
        return false;
    }
    let words: Vec<&str> = line.split_whitespace().collect();
    if words.is_empty() || words.len() > 4 {
        return false;
    }
    !words.iter().any(|w| {
        let lower = w.to_lowercase();
        HEADER_WORDS.contains(&lower.trim_matches(|c: char| !c.is_alphabetic()))
    })
}

/// First plausible name line, returned as `"<line> [S#]"`.
pub fn extract_name(sources: &[Source]) -> Option<String> {
    let mut ordered: Vec<(u8, &Source)> = sources.iter().filter_map(|s| Some((position_rank(s)?, s))).collect();
    ordered.sort_by_key(|(rank, _)| *rank);
    ordered.into_iter().find_map(|(_, source)| {
        source
            .text()
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .take(LINES_PER_SOURCE)
            .find(|l| looks_like_name(l))
            .map(|line| format!("{line} {}", source.source_id.citation()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use askdb_core::types::{label_sources, ChunkDraft, ChunkMetadata, ScoredCandidate};
    use std::sync::Arc;

    fn sources(chunks: &[(&str, ChunkMetadata)]) -> Vec<Source> {
        label_sources(
            chunks
                .iter()
                .enumerate()
                .map(|(i, (t, m))| {
                    ScoredCandidate::new(Arc::new(ChunkDraft::with_metadata(*t, *m).into_chunk("cv", i, vec![1.0])), 0.1)
                })
                .collect(),
        )
    }

    #[test]
    fn accepts_plain_names() {
        assert!(looks_like_name("Jane Doe"));
        assert!(looks_like_name("Mary-Kate O'Neil"));
        assert!(looks_like_name("José María García"));
    }

    #[test]
    fn rejects_headers_and_noise() {
        assert!(!looks_like_name("Resume"));
        assert!(!looks_like_name("Professional Summary"));
        assert!(!looks_like_name("jane@example.com"));
        assert!(!looks_like_name("Jo"));
        assert!(!looks_like_name("One Two Three Four Five"));
        assert!(!looks_like_name("Phone: 555 0100"));
    }

    #[test]
    fn scans_document_start_first() {
        let s = sources(&[
            ("Skills\nGardening\nCanning", ChunkMetadata::new(Some(2), Some(4))),
            ("Curriculum Vitae\nJane Doe\njane@example.com", ChunkMetadata::new(Some(1), Some(0))),
        ]);
        // S2 opens the document; S1 is mid-document and never scanned
        assert_eq!(extract_name(&s).as_deref(), Some("Jane Doe [S2]"));
    }

    #[test]
    fn mid_document_headings_are_not_names() {
        let s = sources(&[("Raised Beds\nBuild raised beds from untreated timber.", ChunkMetadata::new(Some(4), Some(17)))]);
        assert!(extract_name(&s).is_none());
    }

    #[test]
    fn second_chunk_of_page_one_is_scanned() {
        let s = sources(&[
            ("Garden Journal\nKept since spring.", ChunkMetadata::new(Some(3), Some(9))),
            ("Jane Doe\nKeeps the bees.", ChunkMetadata::new(Some(1), Some(1))),
        ]);
        assert_eq!(extract_name(&s).as_deref(), Some("Jane Doe [S2]"));
    }

    #[test]
    fn only_the_first_lines_are_scanned() {
        let text = "1.\n2.\n3.\n4.\n5.\nJane Doe";
        let s = sources(&[(text, ChunkMetadata::new(Some(1), Some(0)))]);
        assert!(extract_name(&s).is_none());
    }
}
