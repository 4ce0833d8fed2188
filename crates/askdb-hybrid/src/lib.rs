//! askdb-hybrid
//!
//! Turns a query and the stored chunks into a short, labeled source list:
//! semantic top-N, BM25 over the same N, reciprocal rank fusion, then MMR.
pub mod diversity;
pub mod fusion;
pub mod intent;
pub mod retriever;

pub use diversity::{maximal_marginal_relevance, Diversifiable};
pub use fusion::{reciprocal_rank_fusion, Ranking};
pub use intent::{expand_query, is_identity_query, prepare_query, word_count, PreparedQuery};
pub use retriever::HybridRetriever;
