//! Requests accepted by the worker and the events it reports back.

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};

use askdb_answer::AnswerPath;
use askdb_core::types::{ChunkDraft, Source};

/// Events of one query, in order: `SourcesReady`, any number of
/// `PartialAnswer`, then exactly one of `FinalAnswer` or `Error`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueryEvent {
    SourcesReady { sources: Vec<Source> },
    /// Cleaned cumulative text generated so far.
    PartialAnswer { text: String },
    FinalAnswer { text: String, sources: Vec<Source>, path: AnswerPath },
    Error { message: String },
}

impl QueryEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::FinalAnswer { .. } | Self::Error { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IngestEvent {
    Progress { percent: u8 },
    Done { doc_id: String, chunks: usize },
    Failed { doc_id: String, message: String },
}

impl IngestEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. } | Self::Failed { .. })
    }
}

#[derive(Debug)]
pub enum Request {
    Ask {
        query_id: u64,
        question: String,
        events: mpsc::UnboundedSender<QueryEvent>,
    },
    /// Replaces every stored chunk of `doc_id` with `chunks`.
    Ingest {
        doc_id: String,
        chunks: Vec<ChunkDraft>,
        events: mpsc::UnboundedSender<IngestEvent>,
    },
    Remove {
        doc_id: String,
        reply: oneshot::Sender<askdb_core::Result<usize>>,
    },
    Shutdown,
}
