//! Confidence gate: decides whether retrieval is strong enough to generate.

use askdb_core::config::GateSettings;
use askdb_core::types::Source;
use askdb_hybrid::word_count;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GateVerdict {
    pub top_score: f32,
    pub threshold: f32,
    pub word_count: usize,
    pub passed: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ConfidenceGate {
    settings: GateSettings,
}

impl ConfidenceGate {
    pub fn new(settings: GateSettings) -> Self {
        Self { settings }
    }

    /// Identity queries use the lowest bar, then short queries, then the rest.
    pub fn threshold(&self, is_identity: bool, words: usize) -> f32 {
        if is_identity {
            self.settings.identity_threshold
        } else if words <= self.settings.short_query_words {
            self.settings.short_query_threshold
        } else {
            self.settings.default_threshold
        }
    }

    /// Compares the combined score of `S1` against the threshold for this query.
    pub fn evaluate(&self, raw_query: &str, is_identity: bool, sources: &[Source]) -> GateVerdict {
        let top_score = sources.first().map_or(f32::NEG_INFINITY, |s| s.scores.combined);
        let words = word_count(raw_query);
        let threshold = self.threshold(is_identity, words);
        GateVerdict { top_score, threshold, word_count: words, passed: top_score >= threshold }
    }
}
