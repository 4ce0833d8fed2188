//! Okapi BM25 over an explicit document set.
//!
//! Statistics are built from whatever documents the caller passes in, so the
//! same scorer serves both the candidate-subset and the whole-corpus scope.

use std::collections::{HashMap, HashSet};

use askdb_core::config::{DEFAULT_BM25_B, DEFAULT_BM25_K1};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bm25Params {
    pub k1: f32,
    pub b: f32,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: DEFAULT_BM25_K1, b: DEFAULT_BM25_B }
    }
}

/// Document frequencies and average length of a tokenized document set.
#[derive(Debug, Clone, Default)]
pub struct CorpusStats {
    doc_count: usize,
    doc_freq: HashMap<String, usize>,
    avg_len: f32,
}

impl CorpusStats {
    pub fn from_documents<'a, I>(documents: I) -> Self
    where
        I: IntoIterator<Item = &'a [String]>,
    {
        let mut doc_count = 0usize;
        let mut total_len = 0usize;
        let mut doc_freq: HashMap<String, usize> = HashMap::new();
        for tokens in documents {
            doc_count += 1;
            total_len += tokens.len();
            let distinct: HashSet<&String> = tokens.iter().collect();
            for term in distinct {
                *doc_freq.entry(term.clone()).or_default() += 1;
            }
        }
        #[allow(clippy::cast_precision_loss)]
        let avg_len = if doc_count == 0 { 0.0 } else { total_len as f32 / doc_count as f32 };
        Self { doc_count, doc_freq, avg_len }
    }

    pub fn doc_count(&self) -> usize {
        self.doc_count
    }

    /// `ln((N - n + 0.5) / (n + 0.5) + 1)`, or 0 for a term no document has.
    #[allow(clippy::cast_precision_loss)]
    pub fn idf(&self, term: &str) -> f32 {
        match self.doc_freq.get(term) {
            Some(&n) if n > 0 => {
                let n = n as f32;
                let total = self.doc_count as f32;
                ((total - n + 0.5) / (n + 0.5) + 1.0).ln()
            }
            _ => 0.0,
        }
    }
}

pub struct Bm25Scorer {
    params: Bm25Params,
    stats: CorpusStats,
}

impl Bm25Scorer {
    pub fn new(params: Bm25Params, stats: CorpusStats) -> Self {
        Self { params, stats }
    }

    pub fn stats(&self) -> &CorpusStats {
        &self.stats
    }

    /// Sums the BM25 contribution of each query term. `query_terms` is expected
    /// to hold distinct terms; duplicates are counted again.
    #[allow(clippy::cast_precision_loss)]
    pub fn score(&self, query_terms: &[String], doc_tokens: &[String]) -> f32 {
        if query_terms.is_empty() || doc_tokens.is_empty() {
            return 0.0;
        }
        let mut tf: HashMap<&str, usize> = HashMap::new();
        for token in doc_tokens {
            *tf.entry(token.as_str()).or_default() += 1;
        }
        let Bm25Params { k1, b } = self.params;
        let avg_len = if self.stats.avg_len > 0.0 { self.stats.avg_len } else { 1.0 };
        let len_norm = 1.0 - b + b * (doc_tokens.len() as f32 / avg_len);

        query_terms
            .iter()
            .filter_map(|term| tf.get(term.as_str()).map(|&f| (term, f as f32)))
            .map(|(term, f)| self.stats.idf(term) * (f * (k1 + 1.0)) / (f + k1 * len_norm))
            .sum()
    }
}
