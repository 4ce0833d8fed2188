//! Streaming completions from a local Ollama server (`POST /api/generate`).
//!
//! Ollama answers with newline-delimited JSON objects, each carrying the next
//! `response` fragment, until one arrives with `done: true`.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader};
use std::time::Duration;
use tracing::debug;

use askdb_core::config::GenerationSettings;
use askdb_core::traits::{Generator, SamplingConfig};

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<u32>,
    seed: u64,
}

#[derive(Deserialize)]
struct GenerateChunk {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

pub struct OllamaGenerator {
    client: reqwest::blocking::Client,
    endpoint: String,
    model: String,
}

impl OllamaGenerator {
    pub fn new(settings: &GenerationSettings) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .context("building http client")?;
        Ok(Self {
            client,
            endpoint: format!("{}/api/generate", settings.url.trim_end_matches('/')),
            model: settings.model.clone(),
        })
    }
}

impl Generator for OllamaGenerator {
    fn generate(
        &self,
        prompt: &str,
        sampling: &SamplingConfig,
        on_partial: Option<&mut dyn FnMut(&str)>,
    ) -> Result<String> {
        let mut on_partial = on_partial;
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: true,
            options: GenerateOptions {
                temperature: sampling.temperature,
                num_predict: sampling.max_tokens,
                top_k: sampling.greedy.then_some(1),
                seed: 0,
            },
        };
        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .with_context(|| format!("Ollama request to {} failed", self.endpoint))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(anyhow!("Ollama returned {status}: {body}"));
        }

        let mut text = String::new();
        for line in BufReader::new(response).lines() {
            let line = line.context("reading Ollama stream")?;
            if line.trim().is_empty() {
                continue;
            }
            let chunk: GenerateChunk = serde_json::from_str(&line).context("Ollama JSON parse error")?;
            if let Some(error) = chunk.error {
                return Err(anyhow!("Ollama error: {error}"));
            }
            if !chunk.response.is_empty() {
                text.push_str(&chunk.response);
                if let Some(callback) = on_partial.as_deref_mut() {
                    callback(&chunk.response);
                }
            }
            if chunk.done {
                break;
            }
        }
        debug!(chars = text.len(), model = %self.model, "generation finished");
        Ok(text)
    }
}
