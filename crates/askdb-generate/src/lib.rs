//! askdb-generate
//!
//! Text generation behind `askdb_core::traits::Generator`.
pub mod ollama;

use std::sync::Arc;

use askdb_core::config::GenerationSettings;
use askdb_core::traits::Generator;

pub use ollama::OllamaGenerator;

pub fn build_generator(settings: &GenerationSettings) -> anyhow::Result<Arc<dyn Generator>> {
    Ok(Arc::new(OllamaGenerator::new(settings)?))
}
