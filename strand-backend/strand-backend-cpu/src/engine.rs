use std::path::Path;

use strand_core::types::{KvPart, ATTENTION_MASK, INPUT_IDS, LOGITS, POSITION_IDS};
use strand_core::{
    past_name, present_name, Device, Environment, InferenceEngine, IoBinding, ModelConfig,
    Result, Session, StrandError, TensorBuffer, Token,
};
use strand_loader::{BigramWeights, ModelDir};
use tracing::info;

/// Reference engine that runs a bigram logit table on the host.
///
/// It honours the full step contract (names, mask length, cache shapes) so
/// the decode loop can be exercised end to end without a real model.
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuEngine;

impl CpuEngine {
    pub fn new() -> Self {
        Self
    }
}

impl InferenceEngine for CpuEngine {
    type Session = CpuSession;

    fn name(&self) -> &str {
        "cpu"
    }

    fn load(&self, env: &Environment, model: &Path, device: Device) -> Result<CpuSession> {
        if device != Device::Cpu {
            return Err(StrandError::ModelLoad(format!(
                "cpu engine cannot run on {device}"
            )));
        }
        let ModelDir { config, weights } = ModelDir::open(model)?;
        info!(model = %model.display(), %device, "session created");
        Ok(CpuSession::from_parts(env.clone(), config, weights))
    }
}

/// A loaded bigram model. Keeps its environment alive while it exists.
#[derive(Debug)]
pub struct CpuSession {
    _env: Environment,
    config: ModelConfig,
    input_names: Vec<String>,
    output_names: Vec<String>,
    weights: BigramWeights,
}

impl CpuSession {
    pub fn from_parts(env: Environment, config: ModelConfig, weights: BigramWeights) -> Self {
        Self {
            _env: env,
            input_names: config.input_names(),
            output_names: config.output_names(),
            config,
            weights,
        }
    }
}

impl Session for CpuSession {
    fn config(&self) -> &ModelConfig {
        &self.config
    }

    fn input_names(&self) -> &[String] {
        &self.input_names
    }

    fn output_names(&self) -> &[String] {
        &self.output_names
    }

    fn run(&self, binding: &mut IoBinding) -> Result<()> {
        let token = read_scalar(binding, INPUT_IDS)?;
        let position = read_scalar(binding, POSITION_IDS)?;
        let token = Token::try_from(token)
            .ok()
            .filter(|&t| (t as usize) < self.config.vocab_size)
            .ok_or_else(|| StrandError::Engine(format!("input token {token} out of range")))?;
        let position = usize::try_from(position)
            .map_err(|_| StrandError::Engine(format!("negative position {position}")))?;

        let mask = required_input(binding, ATTENTION_MASK)?;
        engine_shape(mask, &[1, position + 1])?;
        if mask.as_i64()?.iter().any(|&m| m != 1) {
            return Err(StrandError::Engine("attention mask must be all ones".into()));
        }

        let logits = required_output(binding, LOGITS)?;
        engine_shape(logits, &self.config.logits_shape())?;
        self.weights.fill_logits(token, logits.as_f32_mut()?);

        let past_shape = self.config.cache_shape(position);
        let present_shape = self.config.cache_shape(position + 1);
        for layer in 0..self.config.num_layers {
            for (part, row_value) in [(KvPart::Key, token as f32), (KvPart::Value, position as f32)] {
                let past = required_input(binding, &past_name(layer, part))?;
                engine_shape(past, &past_shape)?;
                let past = past.as_f32()?.to_vec();

                let present = required_output(binding, &present_name(layer, part))?;
                engine_shape(present, &present_shape)?;
                append_row(
                    &past,
                    present.as_f32_mut()?,
                    self.config.num_heads,
                    position,
                    self.config.head_dim,
                    row_value,
                );
            }
        }
        Ok(())
    }
}

/// Copy `[heads, positions, head_dim]` into `[heads, positions + 1, head_dim]`
/// with the new row of each head filled with `value`.
fn append_row(
    past: &[f32],
    present: &mut [f32],
    num_heads: usize,
    positions: usize,
    head_dim: usize,
    value: f32,
) {
    let past_stride = positions * head_dim;
    let present_stride = (positions + 1) * head_dim;
    for h in 0..num_heads {
        let src = &past[h * past_stride..(h + 1) * past_stride];
        let dst = &mut present[h * present_stride..(h + 1) * present_stride];
        dst[..past_stride].copy_from_slice(src);
        dst[past_stride..].fill(value);
    }
}

fn required_input<'a>(binding: &'a IoBinding, name: &str) -> Result<&'a TensorBuffer> {
    binding
        .input(name)
        .ok_or_else(|| StrandError::Engine(format!("missing input '{name}'")))
}

fn required_output<'a>(binding: &'a mut IoBinding, name: &str) -> Result<&'a mut TensorBuffer> {
    binding
        .output_mut(name)
        .ok_or_else(|| StrandError::Engine(format!("missing output '{name}'")))
}

fn read_scalar(binding: &IoBinding, name: &str) -> Result<i64> {
    let buffer = required_input(binding, name)?;
    engine_shape(buffer, &[1, 1])?;
    Ok(buffer.as_i64()?[0])
}

fn engine_shape(buffer: &TensorBuffer, expected: &[usize]) -> Result<()> {
    buffer
        .expect_shape(expected)
        .map_err(|e| StrandError::Engine(e.to_string()))
}
