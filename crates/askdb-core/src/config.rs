//! Configuration loader, typed settings and path helpers.
//!
//! Figment merges `config.toml` + `config.<env>.toml` + `APP_*` env vars
//! (`__` separates nested keys, e.g. `APP_RETRIEVAL__MMR_LAMBDA=0.5`).

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::Error;
use crate::traits::SamplingConfig;

/// Candidates kept after semantic scoring (N).
pub const DEFAULT_CANDIDATE_POOL: usize = 20;
/// Sources kept after diversity reranking (k).
pub const DEFAULT_DIVERSITY_K: usize = 8;
/// MMR trade-off between relevance (1.0) and novelty (0.0).
pub const DEFAULT_MMR_LAMBDA: f32 = 0.7;
/// RRF damping constant.
pub const DEFAULT_RRF_K: usize = 60;
pub const DEFAULT_FUSION_WEIGHT: f32 = 1.0;
pub const DEFAULT_BM25_K1: f32 = 1.5;
pub const DEFAULT_BM25_B: f32 = 0.75;
/// Added to the semantic score of a document's first chunk on identity queries.
/// Early page-1 chunks get half of it.
pub const DEFAULT_IDENTITY_BOOST: f32 = 0.15;

pub const DEFAULT_IDENTITY_THRESHOLD: f32 = 0.01;
pub const DEFAULT_SHORT_QUERY_THRESHOLD: f32 = 0.08;
pub const DEFAULT_THRESHOLD: f32 = 0.18;
pub const DEFAULT_SHORT_QUERY_WORDS: usize = 3;

pub const DEFAULT_CONTEXT_CHAR_BUDGET: usize = 2600;
pub const DEFAULT_TEMPERATURE: f32 = 0.1;
pub const DEFAULT_MAX_TOKENS: usize = 512;
pub const DEFAULT_MAX_EXTRACTIVE_SENTENCES: usize = 3;

pub struct Config {
    figment: Figment,
}

impl Config {
    /// Loads from the working directory, picking the env file from `RUST_ENV`.
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        Self::load_from(Path::new("."), &env_name)
    }

    pub fn load_from(dir: &Path, env_name: &str) -> anyhow::Result<Self> {
        let base = dir.join("config.toml");
        let overlay = match env_name {
            "dev" | "development" => Some(dir.join("config.dev.toml")),
            "prod" | "production" => Some(dir.join("config.prod.toml")),
            "test" | "testing" => Some(dir.join("config.test.toml")),
            _ => None,
        };
        debug!(
            env = env_name,
            base = %base.display(),
            base_found = base.is_file(),
            overlay = ?overlay.as_ref().filter(|p| p.is_file()),
            "loading config"
        );
        let mut figment = Figment::from(Serialized::defaults(Settings::default())).merge(Toml::file(&base));
        if let Some(overlay) = overlay {
            figment = figment.merge(Toml::file(overlay));
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.validate_for_env(env_name)?;
        Ok(config)
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// Extracts and validates every section.
    pub fn settings(&self) -> anyhow::Result<Settings> {
        let settings: Settings = self
            .figment
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to read settings: {e}"))?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate_for_env(&self, env: &str) -> anyhow::Result<()> {
        if matches!(env, "prod" | "production") {
            let backend: StoreBackend = self.get("store.backend")?;
            if backend == StoreBackend::Memory {
                return Err(Error::InvalidConfig(
                    "store.backend = \"memory\" loses every document on exit; use lancedb in production".into(),
                )
                .into());
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub retrieval: RetrievalSettings,
    pub gate: GateSettings,
    pub synthesis: SynthesisSettings,
    pub embedding: EmbeddingSettings,
    pub generation: GenerationSettings,
    pub store: StoreSettings,
    pub logging: LoggingSettings,
}

impl Settings {
    pub fn validate(&self) -> crate::Result<()> {
        let r = &self.retrieval;
        if r.candidate_pool == 0 {
            return Err(invalid("retrieval.candidate_pool must be at least 1"));
        }
        if r.diversity_k == 0 {
            return Err(invalid("retrieval.diversity_k must be at least 1"));
        }
        if !(0.0..=1.0).contains(&r.mmr_lambda) {
            return Err(invalid("retrieval.mmr_lambda must be within [0, 1]"));
        }
        if r.rrf_k == 0 {
            return Err(invalid("retrieval.rrf_k must be positive"));
        }
        if !r.fusion_weight.is_finite() || r.fusion_weight < 0.0 {
            return Err(invalid("retrieval.fusion_weight must be a non-negative number"));
        }
        if !r.bm25_k1.is_finite() || r.bm25_k1 < 0.0 {
            return Err(invalid("retrieval.bm25_k1 must be a non-negative number"));
        }
        if !(0.0..=1.0).contains(&r.bm25_b) {
            return Err(invalid("retrieval.bm25_b must be within [0, 1]"));
        }
        let g = &self.gate;
        for (name, value) in [
            ("gate.identity_threshold", g.identity_threshold),
            ("gate.short_query_threshold", g.short_query_threshold),
            ("gate.default_threshold", g.default_threshold),
        ] {
            if !value.is_finite() {
                return Err(invalid(&format!("{name} must be a finite number")));
            }
        }
        if self.synthesis.context_char_budget == 0 {
            return Err(invalid("synthesis.context_char_budget must be positive"));
        }
        if self.embedding.dim == 0 {
            return Err(invalid("embedding.dim must be positive"));
        }
        Ok(())
    }
}

fn invalid(message: &str) -> Error {
    Error::InvalidConfig(message.to_string())
}

/// Where BM25 document frequencies and average length come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LexicalScope {
    /// Only the top-N semantic candidates.
    #[default]
    Subset,
    /// Every stored chunk. Scores are still only produced for the candidates.
    Corpus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub candidate_pool: usize,
    pub diversity_k: usize,
    pub mmr_lambda: f32,
    pub rrf_k: usize,
    pub fusion_weight: f32,
    pub bm25_k1: f32,
    pub bm25_b: f32,
    pub lexical_scope: LexicalScope,
    pub identity_boost: f32,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            candidate_pool: DEFAULT_CANDIDATE_POOL,
            diversity_k: DEFAULT_DIVERSITY_K,
            mmr_lambda: DEFAULT_MMR_LAMBDA,
            rrf_k: DEFAULT_RRF_K,
            fusion_weight: DEFAULT_FUSION_WEIGHT,
            bm25_k1: DEFAULT_BM25_K1,
            bm25_b: DEFAULT_BM25_B,
            lexical_scope: LexicalScope::Subset,
            identity_boost: DEFAULT_IDENTITY_BOOST,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateSettings {
    pub identity_threshold: f32,
    pub short_query_threshold: f32,
    pub default_threshold: f32,
    /// Queries with at most this many words use `short_query_threshold`.
    pub short_query_words: usize,
}

impl Default for GateSettings {
    fn default() -> Self {
        Self {
            identity_threshold: DEFAULT_IDENTITY_THRESHOLD,
            short_query_threshold: DEFAULT_SHORT_QUERY_THRESHOLD,
            default_threshold: DEFAULT_THRESHOLD,
            short_query_words: DEFAULT_SHORT_QUERY_WORDS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisSettings {
    pub context_char_budget: usize,
    pub temperature: f32,
    pub max_tokens: usize,
    pub max_extractive_sentences: usize,
}

impl Default for SynthesisSettings {
    fn default() -> Self {
        Self {
            context_char_budget: DEFAULT_CONTEXT_CHAR_BUDGET,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            max_extractive_sentences: DEFAULT_MAX_EXTRACTIVE_SENTENCES,
        }
    }
}

impl SynthesisSettings {
    pub fn sampling(&self) -> SamplingConfig {
        SamplingConfig { temperature: self.temperature, max_tokens: self.max_tokens, greedy: true }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// Deterministic feature hashing, no model needed.
    #[default]
    Hash,
    Ollama,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub backend: EmbeddingBackend,
    pub model: String,
    pub dim: usize,
    pub url: String,
    pub timeout_secs: u64,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::Hash,
            model: "nomic-embed-text".to_string(),
            dim: 384,
            url: "http://localhost:11434".to_string(),
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    pub model: String,
    pub url: String,
    pub timeout_secs: u64,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            model: "llama3.2:3b".to_string(),
            url: "http://localhost:11434".to_string(),
            timeout_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    #[default]
    Lancedb,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub backend: StoreBackend,
    /// Expanded with [`expand_path`] before use.
    pub lancedb_dir: String,
    pub table: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Lancedb,
            lancedb_dir: "data/askdb/lancedb".to_string(),
            table: "chunks".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `EnvFilter` directive; `RUST_LOG` takes precedence.
    pub level: String,
    pub ansi: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self { level: "info".to_string(), ansi: true }
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() {
        p
    } else {
        base.join(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        Settings::default().validate().expect("defaults are valid");
    }

    #[test]
    fn rejects_lambda_out_of_range() {
        let mut settings = Settings::default();
        settings.retrieval.mmr_lambda = 1.5;
        assert!(matches!(settings.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn sampling_is_greedy() {
        let sampling = SynthesisSettings::default().sampling();
        assert!(sampling.greedy);
        assert!((sampling.temperature - 0.1).abs() < f32::EPSILON);
    }
}
