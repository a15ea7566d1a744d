use serde::{Deserialize, Serialize};

use crate::sampling::Candidate;

/// Vocabulary index of a token.
pub type Token = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DType {
    I64,
    F32,
}

impl DType {
    pub fn size_in_bytes(&self) -> usize {
        match self {
            DType::I64 => 8,
            DType::F32 => 4,
        }
    }
}

pub const INPUT_IDS: &str = "input_ids";
pub const POSITION_IDS: &str = "position_ids";
pub const ATTENTION_MASK: &str = "attention_mask";
pub const LOGITS: &str = "logits";

/// Name of the past key (or value) input for `layer`.
pub fn past_name(layer: usize, part: KvPart) -> String {
    format!("past_key_values.{layer}.{}", part.as_str())
}

/// Name of the present key (or value) output for `layer`.
pub fn present_name(layer: usize, part: KvPart) -> String {
    format!("present.{layer}.{}", part.as_str())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KvPart {
    Key,
    Value,
}

impl KvPart {
    pub fn as_str(&self) -> &'static str {
        match self {
            KvPart::Key => "key",
            KvPart::Value => "value",
        }
    }
}

/// Shape constants of a decoder-only model, as seen from the decode loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub vocab_size: usize,
    pub num_layers: usize,
    pub num_heads: usize,
    pub head_dim: usize,
    pub max_positions: usize,
}

impl ModelConfig {
    /// GPT-2 small.
    pub fn gpt2() -> Self {
        Self {
            vocab_size: 50257,
            num_layers: 12,
            num_heads: 12,
            head_dim: 64,
            max_positions: 1024,
        }
    }

    /// Number of named inputs a step binds: token, position, mask, then
    /// a key and a value per layer.
    pub fn num_inputs(&self) -> usize {
        3 + 2 * self.num_layers
    }

    /// Number of named outputs: logits, then a key and a value per layer.
    pub fn num_outputs(&self) -> usize {
        1 + 2 * self.num_layers
    }

    pub fn input_names(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(self.num_inputs());
        names.extend([INPUT_IDS, POSITION_IDS, ATTENTION_MASK].map(String::from));
        for layer in 0..self.num_layers {
            names.push(past_name(layer, KvPart::Key));
            names.push(past_name(layer, KvPart::Value));
        }
        names
    }

    pub fn output_names(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(self.num_outputs());
        names.push(LOGITS.to_string());
        for layer in 0..self.num_layers {
            names.push(present_name(layer, KvPart::Key));
            names.push(present_name(layer, KvPart::Value));
        }
        names
    }

    /// `[1, heads, cached_positions, head_dim]`
    pub fn cache_shape(&self, cached_positions: usize) -> [usize; 4] {
        [1, self.num_heads, cached_positions, self.head_dim]
    }

    /// `[1, 1, vocab]`
    pub fn logits_shape(&self) -> [usize; 3] {
        [1, 1, self.vocab_size]
    }
}

/// Options for a single generate call.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenerateOptions {
    /// Keep the logits of every step (prompt steps included).
    pub record_logits: bool,
}

/// Outcome of a generate call.
#[derive(Debug, Clone, Default)]
pub struct Generation {
    /// The last `steps` sampled tokens.
    pub tokens: Vec<Token>,
    /// Positions held by each layer of the cache when the loop finished.
    pub cached_positions: usize,
    /// Forward passes executed. Each one replaced the cache once.
    pub steps_run: usize,
    /// Ranked candidates of every sampling step, in order.
    pub candidates: Vec<Vec<Candidate>>,
    /// Logits of every step, when requested.
    pub logits: Option<Vec<Vec<f32>>>,
}
