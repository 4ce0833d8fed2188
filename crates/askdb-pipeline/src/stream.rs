//! Per-request event streams, usable as blocking iterators or as
//! `futures::Stream`s.

use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

use askdb_answer::AnswerPath;
use askdb_core::error::Error;
use askdb_core::types::Source;

use crate::protocol::{IngestEvent, QueryEvent};

/// Outcome of a query collected from its stream.
#[derive(Debug, Clone)]
pub struct AnsweredQuery {
    pub text: String,
    pub sources: Vec<Source>,
    pub path: AnswerPath,
    /// Every partial update in arrival order.
    pub partials: Vec<String>,
}

pub struct AnswerStream {
    query_id: u64,
    receiver: mpsc::UnboundedReceiver<QueryEvent>,
}

impl AnswerStream {
    pub(crate) fn new(query_id: u64, receiver: mpsc::UnboundedReceiver<QueryEvent>) -> Self {
        Self { query_id, receiver }
    }

    pub fn query_id(&self) -> u64 {
        self.query_id
    }

    /// Blocks until the query finishes. An `Error` event becomes an error
    /// carrying its message.
    pub fn wait(self) -> anyhow::Result<AnsweredQuery> {
        let mut partials = Vec::new();
        for event in self {
            match event {
                QueryEvent::SourcesReady { .. } => {}
                QueryEvent::PartialAnswer { text } => partials.push(text),
                QueryEvent::FinalAnswer { text, sources, path } => {
                    return Ok(AnsweredQuery { text, sources, path, partials });
                }
                QueryEvent::Error { message } => anyhow::bail!(message),
            }
        }
        Err(Error::WorkerStopped.into())
    }
}

impl Iterator for AnswerStream {
    type Item = QueryEvent;

    fn next(&mut self) -> Option<QueryEvent> {
        self.receiver.blocking_recv()
    }
}

impl Stream for AnswerStream {
    type Item = QueryEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<QueryEvent>> {
        self.receiver.poll_recv(cx)
    }
}

pub struct IngestStream {
    doc_id: String,
    receiver: mpsc::UnboundedReceiver<IngestEvent>,
}

impl IngestStream {
    pub(crate) fn new(doc_id: String, receiver: mpsc::UnboundedReceiver<IngestEvent>) -> Self {
        Self { doc_id, receiver }
    }

    pub fn doc_id(&self) -> &str {
        &self.doc_id
    }

    /// Blocks until ingestion ends, passing each progress percentage to
    /// `on_progress`. Returns the number of stored chunks.
    pub fn wait_with_progress(self, mut on_progress: impl FnMut(u8)) -> anyhow::Result<usize> {
        for event in self {
            match event {
                IngestEvent::Progress { percent } => on_progress(percent),
                IngestEvent::Done { chunks, .. } => return Ok(chunks),
                IngestEvent::Failed { message, .. } => anyhow::bail!(message),
            }
        }
        Err(Error::WorkerStopped.into())
    }

    pub fn wait(self) -> anyhow::Result<usize> {
        self.wait_with_progress(|_| {})
    }
}

impl Iterator for IngestStream {
    type Item = IngestEvent;

    fn next(&mut self) -> Option<IngestEvent> {
        self.receiver.blocking_recv()
    }
}

impl Stream for IngestStream {
    type Item = IngestEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<IngestEvent>> {
        self.receiver.poll_recv(cx)
    }
}
