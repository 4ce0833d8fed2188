//! The pipeline worker and the handle used to talk to it.
//!
//! A [`Pipeline`] owns the store, the chunk cache and the collaborators.
//! [`PipelineHandle::spawn`] moves it onto a dedicated thread that takes one
//! request at a time, so ingestion never interleaves with a query.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use askdb_answer::{AnswerObserver, AnswerPath, AnswerSynthesizer, NO_DOCUMENTS_MESSAGE};
use askdb_core::config::Settings;
use askdb_core::error::{Error, Result};
use askdb_core::traits::{ChunkStore, Embedder, Generator};
use askdb_core::types::{label_sources, Chunk, ChunkDraft, QueryStage};
use askdb_hybrid::{prepare_query, HybridRetriever};

use crate::cache::ChunkCache;
use crate::protocol::{IngestEvent, QueryEvent, Request};
use crate::stream::{AnswerStream, IngestStream};

/// Texts embedded per call during ingestion.
pub const INGEST_BATCH_SIZE: usize = 16;
/// Progress reported once every chunk is embedded; the write takes the rest.
const EMBEDDED_PERCENT: usize = 90;

fn log_stage(query_id: u64, stage: QueryStage) {
    debug!(query_id, stage = %stage, "query stage");
}

/// Forwards streamed text to the query's event channel.
struct EventObserver<'a> {
    query_id: u64,
    events: &'a mpsc::UnboundedSender<QueryEvent>,
}

impl AnswerObserver for EventObserver<'_> {
    fn on_stage(&mut self, stage: QueryStage) {
        log_stage(self.query_id, stage);
    }

    fn on_partial(&mut self, text: &str) {
        let _ = self.events.send(QueryEvent::PartialAnswer { text: text.to_string() });
    }
}

pub struct Pipeline {
    store: Box<dyn ChunkStore>,
    embedder: Arc<dyn Embedder>,
    retriever: HybridRetriever,
    synthesizer: AnswerSynthesizer,
    cache: ChunkCache,
}

impl Pipeline {
    pub fn new(
        store: Box<dyn ChunkStore>,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
        settings: &Settings,
    ) -> Self {
        Self {
            store,
            embedder,
            retriever: HybridRetriever::new(settings.retrieval.clone()),
            synthesizer: AnswerSynthesizer::new(generator, settings.gate.clone(), settings.synthesis.clone()),
            cache: ChunkCache::new(),
        }
    }

    /// Builds the configured embedder, generator and store.
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let embedder = askdb_embed::build_embedder(&settings.embedding)?;
        let generator = askdb_generate::build_generator(&settings.generation)?;
        let store = askdb_vector::open_store(&settings.store, embedder.dim())?;
        Ok(Self::new(store, embedder, generator, settings))
    }

    /// Serves one request. Returns `false` on shutdown.
    pub fn handle(&mut self, request: Request) -> bool {
        match request {
            Request::Ask { query_id, question, events } => {
                if events.is_closed() {
                    debug!(query_id, "receiver dropped, skipping query");
                    return true;
                }
                self.ask(query_id, &question, &events);
            }
            Request::Ingest { doc_id, chunks, events } => self.ingest(&doc_id, chunks, &events),
            Request::Remove { doc_id, reply } => {
                let _ = reply.send(self.remove(&doc_id));
            }
            Request::Shutdown => return false,
        }
        true
    }

    /// Runs one query and reports it on `events`. Every path ends with a
    /// `FinalAnswer` or an `Error`.
    pub fn ask(&mut self, query_id: u64, question: &str, events: &mpsc::UnboundedSender<QueryEvent>) {
        log_stage(query_id, QueryStage::Received);
        let terminal = match self.answer(query_id, question, events) {
            Ok(event) => {
                log_stage(query_id, QueryStage::Completed);
                event
            }
            Err(err) => {
                warn!(query_id, error = %err, "query failed");
                log_stage(query_id, QueryStage::Failed);
                QueryEvent::Error { message: err.to_string() }
            }
        };
        let _ = events.send(terminal);
    }

    fn answer(
        &mut self,
        query_id: u64,
        question: &str,
        events: &mpsc::UnboundedSender<QueryEvent>,
    ) -> Result<QueryEvent> {
        let prepared = prepare_query(question);
        if prepared.raw_text.is_empty() {
            return Err(Error::InvalidRequest("question is empty".into()));
        }
        let chunks: Vec<Arc<Chunk>> = self.cache.load(self.store.as_ref()).map_err(|e| Error::store(&e))?.to_vec();
        if chunks.is_empty() {
            return Ok(no_documents(events));
        }

        log_stage(query_id, QueryStage::Embedding);
        let vector = self.embedder.embed(&prepared.expanded_text).map_err(|e| Error::embedding(&e))?;
        let query = prepared.with_vector(vector);

        log_stage(query_id, QueryStage::ScoringCandidates);
        let mut candidates = self.retriever.score_semantic(&query, &chunks);
        if candidates.is_empty() {
            warn!(query_id, dim = query.vector.len(), "no stored chunk matches the query dimension");
            return Ok(no_documents(events));
        }
        self.retriever.score_lexical(&query, &mut candidates, &chunks);

        log_stage(query_id, QueryStage::Fusing);
        let fused = self.retriever.fuse(candidates);

        log_stage(query_id, QueryStage::Diversifying);
        let sources = label_sources(self.retriever.diversify(fused));
        let _ = events.send(QueryEvent::SourcesReady { sources: sources.clone() });

        let mut observer = EventObserver { query_id, events };
        let answer = self
            .synthesizer
            .answer(&query, &sources, &mut observer)
            .map_err(|e| Error::generation(&e))?;
        debug!(query_id, path = ?answer.path, sources = sources.len(), "answered");
        Ok(QueryEvent::FinalAnswer { text: answer.text, sources, path: answer.path })
    }

    /// Embeds every draft, then swaps the document's stored chunks in one
    /// store write. Any failure leaves the stored document untouched.
    pub fn ingest(&mut self, doc_id: &str, drafts: Vec<ChunkDraft>, events: &mpsc::UnboundedSender<IngestEvent>) {
        let event = match self.replace_document(doc_id, drafts, events) {
            Ok(count) => {
                info!(doc_id, chunks = count, "ingested document");
                IngestEvent::Done { doc_id: doc_id.to_string(), chunks: count }
            }
            Err(err) => {
                warn!(doc_id, error = %err, "ingestion failed");
                IngestEvent::Failed { doc_id: doc_id.to_string(), message: err.to_string() }
            }
        };
        let _ = events.send(event);
    }

    fn replace_document(
        &mut self,
        doc_id: &str,
        drafts: Vec<ChunkDraft>,
        events: &mpsc::UnboundedSender<IngestEvent>,
    ) -> Result<usize> {
        if doc_id.trim().is_empty() {
            return Err(Error::InvalidRequest("document id is empty".into()));
        }
        if drafts.is_empty() {
            return Err(Error::InvalidRequest(format!("document {doc_id} has no text")));
        }

        let total = drafts.len();
        let dim = self.embedder.dim();
        let mut embeddings = Vec::with_capacity(total);
        for batch in drafts.chunks(INGEST_BATCH_SIZE) {
            let texts: Vec<String> = batch.iter().map(|d| d.text.clone()).collect();
            let vectors = self.embedder.embed_batch(&texts).map_err(|e| Error::embedding(&e))?;
            if vectors.len() != texts.len() {
                return Err(Error::Embedding(format!("expected {} vectors, got {}", texts.len(), vectors.len())));
            }
            if let Some(bad) = vectors.iter().find(|v| v.len() != dim) {
                return Err(Error::DimensionMismatch { expected: dim, actual: bad.len() });
            }
            embeddings.extend(vectors);
            let percent = embeddings.len() * EMBEDDED_PERCENT / total;
            let _ = events.send(IngestEvent::Progress { percent: u8::try_from(percent).unwrap_or(100) });
        }

        let chunks: Vec<Chunk> = drafts
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(position, (draft, embedding))| draft.into_chunk(doc_id, position, embedding))
            .collect();
        let replaced = self.store.replace_document(doc_id, chunks).map_err(|e| Error::store(&e));
        self.cache.invalidate();
        let replaced = replaced?;
        debug!(doc_id, replaced, chunks = total, "wrote document");
        let _ = events.send(IngestEvent::Progress { percent: 100 });
        Ok(total)
    }

    /// Deletes a document's chunks and returns how many were removed.
    pub fn remove(&mut self, doc_id: &str) -> Result<usize> {
        let removed = self.store.delete_by_doc(doc_id).map_err(|e| Error::store(&e));
        self.cache.invalidate();
        let removed = removed?;
        info!(doc_id, removed, "removed document");
        Ok(removed)
    }
}

fn no_documents(events: &mpsc::UnboundedSender<QueryEvent>) -> QueryEvent {
    let _ = events.send(QueryEvent::SourcesReady { sources: Vec::new() });
    QueryEvent::FinalAnswer { text: NO_DOCUMENTS_MESSAGE.to_string(), sources: Vec::new(), path: AnswerPath::NoDocuments }
}

/// Owner of the worker thread. Dropping it stops the worker after the
/// request in flight.
///
/// The blocking methods must not be called from inside an async runtime; use
/// the returned streams as `futures::Stream`s there instead.
pub struct PipelineHandle {
    requests: mpsc::UnboundedSender<Request>,
    worker: Option<JoinHandle<()>>,
    next_query_id: AtomicU64,
}

impl PipelineHandle {
    pub fn spawn(mut pipeline: Pipeline) -> anyhow::Result<Self> {
        let (requests, mut inbox) = mpsc::unbounded_channel::<Request>();
        let worker = std::thread::Builder::new().name("askdb-pipeline".into()).spawn(move || {
            while let Some(request) = inbox.blocking_recv() {
                if !pipeline.handle(request) {
                    break;
                }
            }
            debug!("pipeline worker stopped");
        })?;
        Ok(Self { requests, worker: Some(worker), next_query_id: AtomicU64::new(1) })
    }

    fn send(&self, request: Request) -> Result<()> {
        self.requests.send(request).map_err(|_| Error::WorkerStopped)
    }

    /// Queues a question. Events arrive on the returned stream.
    pub fn ask(&self, question: impl Into<String>) -> Result<AnswerStream> {
        let query_id = self.next_query_id.fetch_add(1, Ordering::Relaxed);
        let (events, receiver) = mpsc::unbounded_channel();
        self.send(Request::Ask { query_id, question: question.into(), events })?;
        Ok(AnswerStream::new(query_id, receiver))
    }

    pub fn ingest(&self, doc_id: impl Into<String>, chunks: Vec<ChunkDraft>) -> Result<IngestStream> {
        let doc_id = doc_id.into();
        let (events, receiver) = mpsc::unbounded_channel();
        self.send(Request::Ingest { doc_id: doc_id.clone(), chunks, events })?;
        Ok(IngestStream::new(doc_id, receiver))
    }

    /// Blocks until the removal has run.
    pub fn remove(&self, doc_id: impl Into<String>) -> Result<usize> {
        let (reply, receiver) = oneshot::channel();
        self.send(Request::Remove { doc_id: doc_id.into(), reply })?;
        receiver.blocking_recv().map_err(|_| Error::WorkerStopped)?
    }

    /// Stops the worker once queued requests are done and waits for it.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let _ = self.requests.send(Request::Shutdown);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("pipeline worker panicked");
            }
        }
    }
}

impl Drop for PipelineHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
