//! askdb-cli
//!
//! Document preparation and terminal rendering for the `askdb` binary.
pub mod data_processor;
pub mod render;

pub use data_processor::{ChunkingConfig, DataProcessor, FileFailure, ProcessedDirectory, SourceDocument};
