//! askdb-answer
//!
//! Builds the final answer from labeled sources: confidence gate, identity
//! name heuristic, extractive TF-IDF fallback, and generation with citation
//! enforcement.
pub mod citation;
pub mod extractive;
pub mod gate;
pub mod identity;
pub mod synthesis;

pub use gate::{GateVerdict, ConfidenceGate};
pub use synthesis::{Answer, AnswerObserver, AnswerPath, AnswerSynthesizer};

/// The exact sentence returned when the sources do not hold the answer.
pub const ABSTENTION_MESSAGE: &str = "I could not find this information in the provided documents.";

/// Returned when there is nothing to search.
pub const NO_DOCUMENTS_MESSAGE: &str = "No documents found.";
