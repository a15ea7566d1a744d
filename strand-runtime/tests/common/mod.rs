#![allow(dead_code)]

use std::sync::Mutex;

use strand_core::types::{ATTENTION_MASK, INPUT_IDS, LOGITS, POSITION_IDS};
use strand_core::{
    past_name, Environment, EnvironmentConfig, IoBinding, KvPart, ModelConfig, Result, Session,
    StrandError,
};

pub fn env() -> Environment {
    Environment::init(EnvironmentConfig::default()).unwrap()
}

/// GPT-2 vocabulary with a small cache so tests stay cheap.
pub fn small_gpt2() -> ModelConfig {
    ModelConfig {
        num_layers: 2,
        num_heads: 2,
        head_dim: 4,
        ..ModelConfig::gpt2()
    }
}

pub fn tiny_config() -> ModelConfig {
    ModelConfig {
        vocab_size: 10,
        num_layers: 2,
        num_heads: 1,
        head_dim: 2,
        max_positions: 32,
    }
}

/// One observed forward pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Seen {
    pub token: i64,
    pub position: i64,
    pub mask_len: usize,
}

#[derive(Clone)]
pub enum Behavior {
    /// Always return these logits.
    Fixed(Vec<f32>),
    /// Peak the logits at `(token + 1) % vocab`.
    FollowToken,
    /// Peak at `(token + 1) % vocab`, fail at the given position.
    FailAt(i64),
    /// Fail with a non-engine error at the given position.
    ShapeErrorAt(i64),
}

/// Scripted session that checks the step contract and records what it saw.
pub struct StubSession {
    config: ModelConfig,
    input_names: Vec<String>,
    output_names: Vec<String>,
    behavior: Behavior,
    pub seen: Mutex<Vec<Seen>>,
}

impl StubSession {
    pub fn new(config: ModelConfig, behavior: Behavior) -> Self {
        Self {
            input_names: config.input_names(),
            output_names: config.output_names(),
            config,
            behavior,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn with_names(mut self, inputs: Vec<String>, outputs: Vec<String>) -> Self {
        self.input_names = inputs;
        self.output_names = outputs;
        self
    }

    pub fn seen(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }
}

impl Session for StubSession {
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
        assert_eq!(binding.num_inputs(), self.config.num_inputs());
        assert_eq!(binding.num_outputs(), self.config.num_outputs());

        let token = binding.input(INPUT_IDS).unwrap().as_i64()?[0];
        let position = binding.input(POSITION_IDS).unwrap().as_i64()?[0];
        let mask = binding.input(ATTENTION_MASK).unwrap().as_i64()?;
        assert!(mask.iter().all(|&m| m == 1));
        let mask_len = mask.len();
        let past = binding.input(&past_name(0, KvPart::Key)).unwrap();
        assert_eq!(past.shape(), &self.config.cache_shape(position as usize));
        self.seen.lock().unwrap().push(Seen {
            token,
            position,
            mask_len,
        });

        let vocab = self.config.vocab_size;
        let peak = |logits: &mut [f32]| {
            logits.fill(0.0);
            logits[(token as usize + 1) % vocab] = 10.0;
        };
        let logits = binding.output_mut(LOGITS).unwrap().as_f32_mut()?;
        match &self.behavior {
            Behavior::Fixed(values) => logits.copy_from_slice(values),
            Behavior::FollowToken => peak(logits),
            Behavior::FailAt(at) if *at == position => {
                return Err(StrandError::Engine(format!("forward pass failed at {at}")))
            }
            Behavior::ShapeErrorAt(at) if *at == position => {
                return Err(StrandError::ShapeMismatch {
                    expected: vec![1],
                    got: vec![2],
                })
            }
            Behavior::FailAt(_) | Behavior::ShapeErrorAt(_) => peak(logits),
        }
        Ok(())
    }
}

/// Logits over `vocab` entries whose single maximum is at `argmax`.
pub fn peaked_logits(vocab: usize, argmax: usize) -> Vec<f32> {
    let mut logits: Vec<f32> = (0..vocab).map(|i| (i % 97) as f32 * 0.01).collect();
    logits[argmax] = 25.0;
    logits
}
