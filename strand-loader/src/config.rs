use std::path::Path;

use serde::Deserialize;
use strand_core::{ModelConfig, Result, StrandError};

/// The subset of a Hugging Face GPT-2 `config.json` the decode loop needs.
#[derive(Debug, Deserialize)]
pub struct Gpt2Config {
    pub vocab_size: usize,
    pub n_layer: usize,
    pub n_head: usize,
    pub n_embd: usize,
    #[serde(default = "default_n_positions")]
    pub n_positions: usize,
    #[serde(default)]
    pub head_dim: Option<usize>,
}

fn default_n_positions() -> usize {
    1024
}

impl Gpt2Config {
    pub fn from_file(path: &Path) -> Result<Self> {
        crate::read_json(path)
    }

    pub fn to_model_config(&self) -> Result<ModelConfig> {
        if self.n_head == 0 || self.n_layer == 0 || self.vocab_size == 0 {
            return Err(StrandError::ModelLoad(
                "vocab_size, n_layer and n_head must be non-zero".into(),
            ));
        }
        let head_dim = match self.head_dim {
            Some(d) => d,
            None if self.n_embd % self.n_head == 0 => self.n_embd / self.n_head,
            None => {
                return Err(StrandError::ModelLoad(format!(
                    "n_embd {} is not divisible by n_head {}",
                    self.n_embd, self.n_head
                )))
            }
        };
        Ok(ModelConfig {
            vocab_size: self.vocab_size,
            num_layers: self.n_layer,
            num_heads: self.n_head,
            head_dim,
            max_positions: self.n_positions,
        })
    }
}
