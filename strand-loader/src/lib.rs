//! Strand loader: model directory config and reference weight parsing.

pub mod config;
pub mod weights;

use std::path::Path;

use strand_core::{ModelConfig, Result, StrandError};
use tracing::info;

pub use config::Gpt2Config;
pub use weights::BigramWeights;

pub const CONFIG_FILE: &str = "config.json";
pub const WEIGHTS_FILE: &str = "bigram.json";

/// A parsed model directory.
#[derive(Debug, Clone)]
pub struct ModelDir {
    pub config: ModelConfig,
    pub weights: BigramWeights,
}

impl ModelDir {
    pub fn open(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            return Err(StrandError::ModelLoad(format!(
                "{} is not a model directory",
                dir.display()
            )));
        }
        let config = Gpt2Config::from_file(&dir.join(CONFIG_FILE))?.to_model_config()?;
        let weights = BigramWeights::from_file(&dir.join(WEIGHTS_FILE))?;
        weights.validate(config.vocab_size)?;
        info!(
            dir = %dir.display(),
            vocab = config.vocab_size,
            layers = config.num_layers,
            heads = config.num_heads,
            head_dim = config.head_dim,
            "model directory loaded"
        );
        Ok(Self { config, weights })
    }
}

pub(crate) fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| StrandError::ModelLoad(format!("failed to read {}: {e}", path.display())))?;
    serde_json::from_str(&text)
        .map_err(|e| StrandError::ModelLoad(format!("failed to parse {}: {e}", path.display())))
}
