//! Reciprocal Rank Fusion.
//!
//! `score(id) = Σ 1 / (k + rank)` over every ranking the id appears in. Ranks
//! start at 1. Items are accumulated in first-seen order and the final sort is
//! stable, so equal scores keep that order.

use std::collections::HashMap;
use std::hash::Hash;

pub use askdb_core::config::DEFAULT_RRF_K;

/// `(id, rank)` pairs from one retrieval method, best first.
pub type Ranking<Id> = Vec<(Id, usize)>;

/// Ranks `ids` 1, 2, 3, ... in the order given.
pub fn to_ranking<Id>(ids: impl IntoIterator<Item = Id>) -> Ranking<Id> {
    ids.into_iter().enumerate().map(|(i, id)| (id, i + 1)).collect()
}

#[allow(clippy::cast_precision_loss)]
pub fn reciprocal_rank_fusion<Id>(rankings: &[Ranking<Id>], k: usize) -> Vec<(Id, f32)>
where
    Id: Clone + Eq + Hash,
{
    let mut position: HashMap<Id, usize> = HashMap::new();
    let mut fused: Vec<(Id, f32)> = Vec::new();
    for ranking in rankings {
        for (id, rank) in ranking {
            let contribution = 1.0 / (k as f32 + *rank as f32);
            match position.get(id) {
                Some(&slot) => fused[slot].1 += contribution,
                None => {
                    position.insert(id.clone(), fused.len());
                    fused.push((id.clone(), contribution));
                }
            }
        }
    }
    fused.sort_by(|a, b| b.1.total_cmp(&a.1));
    fused
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_ranking_scores_follow_rank() {
        let fused = reciprocal_rank_fusion(&[to_ranking(["a", "b"])], 60);
        assert_eq!(fused[0].0, "a");
        assert!((fused[0].1 - 1.0 / 61.0).abs() < 1e-7);
        assert!((fused[1].1 - 1.0 / 62.0).abs() < 1e-7);
    }

    #[test]
    fn agreement_beats_a_single_top_rank() {
        let semantic = to_ranking(["x", "shared"]);
        let lexical = to_ranking(["shared", "y"]);
        let fused = reciprocal_rank_fusion(&[semantic, lexical], 60);
        assert_eq!(fused[0].0, "shared");
        assert_eq!(fused.len(), 3);
    }

    #[test]
    fn ties_keep_first_seen_order() {
        let fused = reciprocal_rank_fusion(&[to_ranking(["a"]), to_ranking(["b"])], 60);
        assert_eq!(fused.iter().map(|(id, _)| *id).collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn empty_input_fuses_to_nothing() {
        let fused: Vec<(u32, f32)> = reciprocal_rank_fusion(&[], 60);
        assert!(fused.is_empty());
    }
}
