//! Retrieval orchestration over an in-memory chunk list.
//!
//! The steps are public so callers can observe each stage; [`HybridRetriever::retrieve`]
//! runs them all.

use std::sync::Arc;
use tracing::{debug, warn};

use askdb_core::config::{LexicalScope, RetrievalSettings};
use askdb_core::error::{Error, Result};
use askdb_core::types::{label_sources, Chunk, Query, ScoredCandidate, Source};
use askdb_text::{tokenize, unique_terms, Bm25Params, Bm25Scorer, CorpusStats};
use askdb_vector::checked_cosine;

use crate::diversity::maximal_marginal_relevance;
use crate::fusion::{reciprocal_rank_fusion, to_ranking};
use crate::intent::positional_boost;

#[derive(Debug, Clone, Default)]
pub struct HybridRetriever {
    settings: RetrievalSettings,
}

impl HybridRetriever {
    pub fn new(settings: RetrievalSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &RetrievalSettings {
        &self.settings
    }

    /// Cosine score (plus positional boost on identity queries) for every chunk
    /// whose width matches the query, sorted descending and cut to the
    /// candidate pool. Ties keep storage order.
    pub fn score_semantic(&self, query: &Query, chunks: &[Arc<Chunk>]) -> Vec<ScoredCandidate> {
        let mut skipped = 0usize;
        let mut scored: Vec<ScoredCandidate> = chunks
            .iter()
            .filter_map(|chunk| match checked_cosine(&query.vector, &chunk.embedding) {
                Ok(similarity) => {
                    let boost = if query.is_identity {
                        positional_boost(&chunk.metadata, self.settings.identity_boost)
                    } else {
                        0.0
                    };
                    Some(ScoredCandidate::new(Arc::clone(chunk), similarity + boost))
                }
                Err(err) => {
                    skipped += 1;
                    debug!(chunk = %chunk.id, error = %err, "skipping chunk");
                    None
                }
            })
            .collect();
        if skipped > 0 {
            warn!(skipped, expected = query.vector.len(), "skipped chunks with mismatched embedding dimension");
        }
        scored.sort_by(|a, b| b.scores.semantic.total_cmp(&a.scores.semantic));
        scored.truncate(self.settings.candidate_pool);
        scored
    }

    /// BM25 of the raw query against each candidate. Statistics come from the
    /// candidates themselves or, with [`LexicalScope::Corpus`], from `corpus`.
    pub fn score_lexical(&self, query: &Query, candidates: &mut [ScoredCandidate], corpus: &[Arc<Chunk>]) {
        let terms = unique_terms(&query.raw_text);
        let candidate_tokens: Vec<Vec<String>> = candidates.iter().map(|c| tokenize(&c.chunk.text)).collect();
        let stats = match self.settings.lexical_scope {
            LexicalScope::Subset => CorpusStats::from_documents(candidate_tokens.iter().map(Vec::as_slice)),
            LexicalScope::Corpus => {
                let corpus_tokens: Vec<Vec<String>> = corpus.iter().map(|c| tokenize(&c.text)).collect();
                CorpusStats::from_documents(corpus_tokens.iter().map(Vec::as_slice))
            }
        };
        let scorer = Bm25Scorer::new(Bm25Params { k1: self.settings.bm25_k1, b: self.settings.bm25_b }, stats);
        for (candidate, tokens) in candidates.iter_mut().zip(&candidate_tokens) {
            candidate.scores.bm25 = scorer.score(&terms, tokens);
        }
    }

    /// Fuses the semantic order with the BM25 order (only candidates with a
    /// positive BM25 score are ranked lexically), sets the combined score and
    /// sorts by it. Expects candidates in semantic order.
    pub fn fuse(&self, mut candidates: Vec<ScoredCandidate>) -> Vec<ScoredCandidate> {
        let semantic = to_ranking(0..candidates.len());
        let mut lexical_order: Vec<usize> = (0..candidates.len())
            .filter(|&i| candidates[i].scores.bm25 > 0.0)
            .collect();
        lexical_order.sort_by(|&a, &b| candidates[b].scores.bm25.total_cmp(&candidates[a].scores.bm25));
        let lexical = to_ranking(lexical_order);

        for (index, fused) in reciprocal_rank_fusion(&[semantic, lexical], self.settings.rrf_k) {
            let scores = &mut candidates[index].scores;
            scores.fused = fused;
            scores.combined = scores.semantic + self.settings.fusion_weight * fused;
        }
        candidates.sort_by(|a, b| b.scores.combined.total_cmp(&a.scores.combined));
        candidates
    }

    pub fn diversify(&self, candidates: Vec<ScoredCandidate>) -> Vec<ScoredCandidate> {
        maximal_marginal_relevance(candidates, self.settings.diversity_k, self.settings.mmr_lambda)
    }

    /// All stages end to end. `EmptyCorpus` when there is nothing to search and
    /// `DimensionMismatch` when no chunk matches the query width.
    pub fn retrieve(&self, query: &Query, chunks: &[Arc<Chunk>]) -> Result<Vec<Source>> {
        if chunks.is_empty() {
            return Err(Error::EmptyCorpus);
        }
        let mut candidates = self.score_semantic(query, chunks);
        if candidates.is_empty() {
            return Err(Error::DimensionMismatch {
                expected: query.vector.len(),
                actual: chunks[0].embedding.len(),
            });
        }
        self.score_lexical(query, &mut candidates, chunks);
        let fused = self.fuse(candidates);
        Ok(label_sources(self.diversify(fused)))
    }
}
