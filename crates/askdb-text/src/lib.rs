//! askdb-text
//!
//! Lexical side of retrieval: the shared tokenizer, BM25 scoring over an
//! arbitrary document set, and sentence splitting for extractive answers.
pub mod bm25;
pub mod sentence;
pub mod tokenize;

pub use bm25::{Bm25Params, Bm25Scorer, CorpusStats};
pub use sentence::split_sentences;
pub use tokenize::{tokenize, unique_terms};
