use serde::ser::{Serialize, SerializeStruct, Serializer};
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;

pub type Embedding = Vec<f32>;

/// Location hints a chunker may attach to a chunk. Both are optional.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub page: Option<u32>,
    pub chunk_index: Option<u32>,
}

impl ChunkMetadata {
    pub fn new(page: Option<u32>, chunk_index: Option<u32>) -> Self {
        Self { page, chunk_index }
    }

    /// First chunk of its document.
    pub fn starts_document(&self) -> bool {
        self.chunk_index == Some(0)
    }

    /// One of the first two chunks and on page 1.
    pub fn early_on_first_page(&self) -> bool {
        self.page == Some(1) && self.chunk_index.is_some_and(|i| i <= 1)
    }
}

/// A stored unit of text with its embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub id: String,
    pub doc_id: String,
    pub text: String,
    pub metadata: ChunkMetadata,
    pub embedding: Embedding,
}

/// Chunk text produced by a splitter, before it is embedded and given an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkDraft {
    pub text: String,
    pub metadata: ChunkMetadata,
}

impl ChunkDraft {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), metadata: ChunkMetadata::default() }
    }

    pub fn with_metadata(text: impl Into<String>, metadata: ChunkMetadata) -> Self {
        Self { text: text.into(), metadata }
    }

    /// Attaches the embedding. Drafts without a chunk index take their position.
    pub fn into_chunk(self, doc_id: &str, position: usize, embedding: Embedding) -> Chunk {
        let index = self
            .metadata
            .chunk_index
            .or_else(|| u32::try_from(position).ok());
        let id = match index {
            Some(i) => format!("{doc_id}:{i}"),
            None => format!("{doc_id}:{position}"),
        };
        Chunk {
            id,
            doc_id: doc_id.to_string(),
            text: self.text,
            metadata: ChunkMetadata { page: self.metadata.page, chunk_index: index },
            embedding,
        }
    }
}

/// A user question after intent analysis and embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub raw_text: String,
    pub expanded_text: String,
    pub is_identity: bool,
    pub vector: Embedding,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize)]
pub struct Scores {
    /// Cosine similarity plus any positional boost.
    pub semantic: f32,
    pub bm25: f32,
    pub fused: f32,
    pub combined: f32,
}

#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    pub chunk: Arc<Chunk>,
    pub scores: Scores,
}

impl ScoredCandidate {
    pub fn new(chunk: Arc<Chunk>, semantic: f32) -> Self {
        Self { chunk, scores: Scores { semantic, ..Scores::default() } }
    }
}

/// 1-based label rendered as `S<n>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SourceId(pub usize);

impl SourceId {
    pub fn index(self) -> usize {
        self.0 - 1
    }

    /// Bracketed citation form, e.g. `[S2]`.
    pub fn citation(self) -> String {
        format!("[{self}]")
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{}", self.0)
    }
}

impl Serialize for SourceId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A candidate that survived diversification and carries its citation label.
#[derive(Debug, Clone)]
pub struct Source {
    pub source_id: SourceId,
    pub chunk: Arc<Chunk>,
    pub scores: Scores,
}

impl Source {
    pub fn text(&self) -> &str {
        &self.chunk.text
    }

    pub fn metadata(&self) -> ChunkMetadata {
        self.chunk.metadata
    }
}

impl Serialize for Source {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Source", 7)?;
        state.serialize_field("source_id", &self.source_id)?;
        state.serialize_field("chunk_id", &self.chunk.id)?;
        state.serialize_field("doc_id", &self.chunk.doc_id)?;
        state.serialize_field("page", &self.chunk.metadata.page)?;
        state.serialize_field("chunk_index", &self.chunk.metadata.chunk_index)?;
        state.serialize_field("text", &self.chunk.text)?;
        state.serialize_field("scores", &self.scores)?;
        state.end()
    }
}

/// Assigns `S1..Sn` in the order given.
pub fn label_sources(candidates: Vec<ScoredCandidate>) -> Vec<Source> {
    candidates
        .into_iter()
        .enumerate()
        .map(|(i, c)| Source { source_id: SourceId(i + 1), chunk: c.chunk, scores: c.scores })
        .collect()
}

/// Steps a query moves through. Terminal states are `Completed` and `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryStage {
    Received,
    Embedding,
    ScoringCandidates,
    Fusing,
    Diversifying,
    Gating,
    ExtractiveFallback,
    Generating,
    Completed,
    Failed,
}

impl fmt::Display for QueryStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Received => "received",
            Self::Embedding => "embedding",
            Self::ScoringCandidates => "scoring_candidates",
            Self::Fusing => "fusing",
            Self::Diversifying => "diversifying",
            Self::Gating => "gating",
            Self::ExtractiveFallback => "extractive_fallback",
            Self::Generating => "generating",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}
