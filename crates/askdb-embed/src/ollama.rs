//! Embeddings from a local Ollama server (`POST /api/embed`).

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use askdb_core::config::EmbeddingSettings;
use askdb_core::traits::Embedder;
use askdb_core::types::Embedding;

use crate::l2_normalize;

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

pub struct OllamaEmbedder {
    client: reqwest::blocking::Client,
    endpoint: String,
    model: String,
    dim: usize,
}

impl OllamaEmbedder {
    pub fn new(settings: &EmbeddingSettings) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .context("building http client")?;
        Ok(Self {
            client,
            endpoint: format!("{}/api/embed", settings.url.trim_end_matches('/')),
            model: settings.model.clone(),
            dim: settings.dim,
        })
    }
}

impl Embedder for OllamaEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let response = self
            .client
            .post(&self.endpoint)
            .json(&EmbedRequest { model: &self.model, input: texts })
            .send()
            .with_context(|| format!("Ollama request to {} failed", self.endpoint))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(anyhow!("Ollama returned {status}: {body}"));
        }
        let parsed: EmbedResponse = response.json().context("Ollama JSON parse error")?;
        if parsed.embeddings.len() != texts.len() {
            return Err(anyhow!(
                "Ollama returned {} embeddings for {} inputs",
                parsed.embeddings.len(),
                texts.len()
            ));
        }
        debug!(count = texts.len(), model = %self.model, "embedded batch");
        parsed
            .embeddings
            .into_iter()
            .map(|mut v| {
                if v.len() != self.dim {
                    return Err(anyhow!("model {} produced {} dimensions, expected {}", self.model, v.len(), self.dim));
                }
                l2_normalize(&mut v);
                Ok(v)
            })
            .collect()
    }
}
