//! Turns a directory of `.txt` files into per-document chunk drafts.
//!
//! Form feeds (`\x0c`) mark page breaks. Paragraphs are separated by a blank
//! line; a paragraph longer than the window is split into overlapping
//! word windows.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use askdb_core::types::{ChunkDraft, ChunkMetadata};

#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    pub max_words: usize,
    pub overlap_percent: f32,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { max_words: 300, overlap_percent: 0.2 }
    }
}

/// One file ready for ingestion.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub doc_id: String,
    pub path: PathBuf,
    pub chunks: Vec<ChunkDraft>,
}

/// A file that could not be read.
#[derive(Debug)]
pub struct FileFailure {
    pub doc_id: String,
    pub path: PathBuf,
    pub error: anyhow::Error,
}

/// Result of walking a directory: readable documents plus per-file failures.
#[derive(Debug, Default)]
pub struct ProcessedDirectory {
    pub documents: Vec<SourceDocument>,
    pub failures: Vec<FileFailure>,
}

#[derive(Debug, Default)]
pub struct DataProcessor {
    chunking_config: ChunkingConfig,
}

impl DataProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(chunking_config: ChunkingConfig) -> Self {
        Self { chunking_config }
    }

    /// Every `.txt` file under `data_dir`, sorted by path, at most `limit`.
    /// Document ids are paths relative to `data_dir` without the extension,
    /// so same-named files in different folders stay separate. A file that
    /// cannot be read is reported in `failures` and the walk continues.
    pub fn process_directory(&self, data_dir: &Path, limit: Option<usize>) -> Result<ProcessedDirectory> {
        let mut files = list_txt_files(data_dir);
        if files.is_empty() {
            warn!(dir = %data_dir.display(), "no .txt files found");
            return Ok(ProcessedDirectory::default());
        }
        if let Some(limit) = limit {
            files.truncate(limit);
        }
        let mut processed = ProcessedDirectory::default();
        for path in files {
            let doc_id = doc_id_for(data_dir, &path)?;
            match self.read_document(doc_id.clone(), &path) {
                Ok(document) => processed.documents.push(document),
                Err(error) => {
                    warn!(doc_id = %doc_id, path = %path.display(), error = %error, "skipping unreadable file");
                    processed.failures.push(FileFailure { doc_id, path, error });
                }
            }
        }
        info!(
            files = processed.documents.len(),
            failed = processed.failures.len(),
            chunks = processed.documents.iter().map(|d| d.chunks.len()).sum::<usize>(),
            "processed directory"
        );
        Ok(processed)
    }

    /// A single file, identified by its file stem.
    pub fn process_file(&self, path: &Path) -> Result<SourceDocument> {
        let stem = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .filter(|stem| !stem.is_empty())
            .with_context(|| format!("{} has no file name", path.display()))?;
        self.read_document(stem, path)
    }

    fn read_document(&self, doc_id: String, path: &Path) -> Result<SourceDocument> {
        let content = read_file_content(path)?;
        let chunks = self.chunk_content(&content);
        debug!(doc_id = %doc_id, chunks = chunks.len(), "chunked file");
        Ok(SourceDocument { doc_id, path: path.to_path_buf(), chunks })
    }

    /// Chunk drafts numbered from 0 across the whole document.
    pub fn chunk_content(&self, content: &str) -> Vec<ChunkDraft> {
        let mut drafts = Vec::new();
        let mut chunk_index = 0u32;
        for (page_index, page) in content.split('\x0c').enumerate() {
            let page_number = u32::try_from(page_index + 1).ok();
            for paragraph in page.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
                let word_count = paragraph.split_whitespace().count();
                let pieces = if word_count <= self.chunking_config.max_words {
                    vec![paragraph.to_string()]
                } else {
                    self.split_paragraph_with_overlap(paragraph)
                };
                for text in pieces {
                    drafts.push(ChunkDraft::with_metadata(text, ChunkMetadata::new(page_number, Some(chunk_index))));
                    chunk_index += 1;
                }
            }
        }
        drafts
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    fn split_paragraph_with_overlap(&self, paragraph: &str) -> Vec<String> {
        let words: Vec<&str> = paragraph.split_whitespace().collect();
        let window = self.chunking_config.max_words.max(1);
        let overlap = ((window as f32 * self.chunking_config.overlap_percent) as usize).min(window - 1);
        let mut chunks = Vec::new();
        let mut start = 0;
        while start < words.len() {
            let end = (start + window).min(words.len());
            chunks.push(words[start..end].join(" "));
            if end >= words.len() {
                break;
            }
            start = end - overlap;
        }
        chunks
    }
}

fn read_file_content(path: &Path) -> Result<String> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(content),
        Err(_) => {
            let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
            Ok(String::from_utf8_lossy(&bytes).to_string())
        }
    }
}

/// `path` relative to `root`, extension dropped, components joined by `/`.
pub fn doc_id_for(root: &Path, path: &Path) -> Result<String> {
    let relative = path.strip_prefix(root).unwrap_or(path).with_extension("");
    let doc_id = relative
        .components()
        .filter_map(|c| match c {
            std::path::Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/");
    if doc_id.is_empty() {
        anyhow::bail!("{} has no file name", path.display());
    }
    Ok(doc_id)
}

fn list_txt_files(root: &Path) -> Vec<PathBuf> {
    let mut txt_files: Vec<PathBuf> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|e| e.file_type().is_file() || e.path_is_symlink())
        .map(walkdir::DirEntry::into_path)
        .filter(|p| p.extension().and_then(|s| s.to_str()) == Some("txt"))
        .collect();
    txt_files.sort();
    txt_files
}
