//! askdb-pipeline
//!
//! A single background worker that owns the chunk store and serves queries,
//! ingestions and removals one at a time, reporting through per-request
//! event channels.
pub mod cache;
pub mod protocol;
pub mod stream;
pub mod worker;

pub use cache::ChunkCache;
pub use protocol::{IngestEvent, QueryEvent, Request};
pub use stream::{AnswerStream, AnsweredQuery, IngestStream};
pub use worker::{Pipeline, PipelineHandle};
