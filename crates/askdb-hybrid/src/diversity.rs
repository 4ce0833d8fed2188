//! Maximal Marginal Relevance.

use askdb_core::types::ScoredCandidate;
use askdb_vector::cosine;

pub use askdb_core::config::{DEFAULT_DIVERSITY_K, DEFAULT_MMR_LAMBDA};

pub trait Diversifiable {
    fn relevance(&self) -> f32;
    fn embedding(&self) -> &[f32];
}

impl Diversifiable for ScoredCandidate {
    fn relevance(&self) -> f32 {
        self.scores.combined
    }

    fn embedding(&self) -> &[f32] {
        &self.chunk.embedding
    }
}

/// Greedily picks up to `k` items maximizing
/// `lambda * relevance - (1 - lambda) * max_cos(item, selected)`.
///
/// Seeds with the most relevant item (the earliest on ties). Inputs of at most
/// `k` items come back unchanged.
pub fn maximal_marginal_relevance<T: Diversifiable>(items: Vec<T>, k: usize, lambda: f32) -> Vec<T> {
    if items.len() <= k {
        return items;
    }
    if k == 0 {
        return Vec::new();
    }

    let mut pool: Vec<Option<T>> = items.into_iter().map(Some).collect();
    let mut selected: Vec<T> = Vec::with_capacity(k);

    let seed = best_index(&pool, |item| item.relevance());
    if let Some(item) = seed.and_then(|i| pool[i].take()) {
        selected.push(item);
    }

    while selected.len() < k {
        let next = best_index(&pool, |item| {
            let redundancy = selected
                .iter()
                .map(|s| cosine(item.embedding(), s.embedding()))
                .fold(f32::NEG_INFINITY, f32::max);
            lambda * item.relevance() - (1.0 - lambda) * redundancy
        });
        match next.and_then(|i| pool[i].take()) {
            Some(item) => selected.push(item),
            None => break,
        }
    }
    selected
}

/// Index of the highest-scoring remaining item; the first one wins ties.
fn best_index<T>(pool: &[Option<T>], score: impl Fn(&T) -> f32) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, item) in pool.iter().enumerate() {
        let Some(item) = item else { continue };
        let s = score(item);
        let better = match best {
            None => true,
            Some((_, b)) => s > b,
        };
        if better {
            best = Some((i, s));
        }
    }
    best.map(|(i, _)| i)
}
