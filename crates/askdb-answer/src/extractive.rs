//! Extractive TF-IDF summary over source sentences.
//!
//! Every sentence of every source is scored against the query terms; the best
//! few that are not near-duplicates of each other are returned with their
//! citations.

use std::collections::{HashMap, HashSet};

use askdb_core::types::{Source, SourceId};
use askdb_text::{split_sentences, tokenize, unique_terms};

/// Sentences shorter than this are ignored.
pub const MIN_SENTENCE_CHARS: usize = 20;
/// Two sentences are near-duplicates above this token overlap ratio.
pub const DUPLICATE_OVERLAP: f32 = 0.6;

#[derive(Debug, Clone)]
struct Sentence {
    text: String,
    source_id: SourceId,
    tokens: Vec<String>,
}

/// Shared tokens over the size of the smaller token set.
#[allow(clippy::cast_precision_loss)]
fn overlap_ratio(a: &[String], b: &[String]) -> f32 {
    let a: HashSet<&String> = a.iter().collect();
    let b: HashSet<&String> = b.iter().collect();
    let smaller = a.len().min(b.len());
    if smaller == 0 {
        return 0.0;
    }
    a.intersection(&b).count() as f32 / smaller as f32
}

/// Up to `max_sentences` cited sentences joined by spaces, or `None` when no
/// sentence shares a term with the query.
#[allow(clippy::cast_precision_loss)]
pub fn summarize(raw_query: &str, sources: &[Source], max_sentences: usize) -> Option<String> {
    let query_terms = unique_terms(raw_query);
    if query_terms.is_empty() || max_sentences == 0 {
        return None;
    }

    let sentences: Vec<Sentence> = sources
        .iter()
        .flat_map(|source| {
            split_sentences(source.text())
                .into_iter()
                .filter(|s| s.chars().count() >= MIN_SENTENCE_CHARS)
                .map(|text| Sentence { tokens: tokenize(&text), text, source_id: source.source_id })
        })
        .collect();
    if sentences.is_empty() {
        return None;
    }

    let total = sentences.len() as f32;
    let mut doc_freq: HashMap<&str, usize> = HashMap::new();
    for sentence in &sentences {
        let distinct: HashSet<&str> = sentence.tokens.iter().map(String::as_str).collect();
        for term in &query_terms {
            if distinct.contains(term.as_str()) {
                *doc_freq.entry(term.as_str()).or_default() += 1;
            }
        }
    }
    let idf = |term: &str| {
        let df = doc_freq.get(term).copied().unwrap_or(0) as f32;
        ((total + 1.0) / (df + 1.0)).ln() + 1.0
    };
    let norm = (query_terms.len() as f32).sqrt();

    let mut scored: Vec<(f32, &Sentence)> = sentences
        .iter()
        .filter_map(|sentence| {
            let raw: f32 = query_terms
                .iter()
                .map(|term| {
                    let tf = sentence.tokens.iter().filter(|t| *t == term).count();
                    tf as f32 * idf(term)
                })
                .sum();
            (raw > 0.0).then_some((raw / norm, sentence))
        })
        .collect();
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));

    let mut kept: Vec<&Sentence> = Vec::new();
    for (_, sentence) in scored {
        if kept.len() == max_sentences {
            break;
        }
        if kept.iter().any(|k| overlap_ratio(&k.tokens, &sentence.tokens) > DUPLICATE_OVERLAP) {
            continue;
        }
        kept.push(sentence);
    }
    if kept.is_empty() {
        return None;
    }
    Some(
        kept.iter()
            .map(|s| format!("{} {}", s.text, s.source_id.citation()))
            .collect::<Vec<_>>()
            .join(" "),
    )
}
