//! Step executor: binds one forward pass worth of tensors and runs it.

use strand_core::{
    Environment, IoBinding, ModelConfig, Result, Session, StrandError, TensorBuffer, Token,
};
use strand_kvcache::KvCache;
use tracing::trace;

/// Outputs of one forward pass, owned by the caller.
#[derive(Debug)]
pub struct StepOutput {
    /// `[1, 1, vocab]`
    pub logits: TensorBuffer,
    /// The cache with one more position than the one passed in.
    pub cache: KvCache,
}

pub struct StepExecutor<S: Session> {
    env: Environment,
    session: S,
    config: ModelConfig,
}

impl<S: Session> StepExecutor<S> {
    /// Wrap a session, checking that its input and output names follow the
    /// naming contract derived from its model config.
    pub fn new(env: Environment, session: S) -> Result<Self> {
        let config = session.config().clone();
        check_names("input", session.input_names(), &config.input_names())?;
        check_names("output", session.output_names(), &config.output_names())?;
        Ok(Self {
            env,
            session,
            config,
        })
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    pub fn empty_cache(&self) -> Result<KvCache> {
        KvCache::empty(&self.env, &self.config)
    }

    /// Run the model over `token` at `position`.
    ///
    /// `cache` must hold exactly `position` entries. It is consumed: its
    /// buffers are bound as the past inputs and released once the pass has
    /// finished, whether or not it succeeded.
    pub fn step(&self, token: Token, position: usize, cache: KvCache) -> Result<StepOutput> {
        if cache.cached_positions() != position {
            return Err(StrandError::ShapeMismatch {
                expected: self.config.cache_shape(position).to_vec(),
                got: self.config.cache_shape(cache.cached_positions()).to_vec(),
            });
        }
        if token as usize >= self.config.vocab_size {
            return Err(StrandError::InvalidInput(format!(
                "token {token} outside vocabulary of {}",
                self.config.vocab_size
            )));
        }

        let mut inputs = self.init_inputs(token, position)?;
        inputs.extend(cache.into_buffers());
        let outputs = self.init_outputs(position)?;

        let input_names = self.session.input_names();
        let output_names = self.session.output_names();
        if inputs.len() != input_names.len() {
            return Err(StrandError::ShapeMismatch {
                expected: vec![input_names.len()],
                got: vec![inputs.len()],
            });
        }
        if outputs.len() != output_names.len() {
            return Err(StrandError::ShapeMismatch {
                expected: vec![output_names.len()],
                got: vec![outputs.len()],
            });
        }

        let mut binding = IoBinding::new();
        for (name, buffer) in input_names.iter().zip(inputs) {
            binding.bind_input(name.as_str(), buffer);
        }
        for (name, buffer) in output_names.iter().zip(outputs) {
            binding.bind_output(name.as_str(), buffer);
        }

        self.session.run(&mut binding).map_err(|e| match e {
            StrandError::Engine(_) => e,
            other => StrandError::Engine(other.to_string()),
        })?;
        trace!(position, token, "forward pass complete");

        let mut outputs = binding.into_outputs().into_iter();
        let logits = outputs
            .next()
            .ok_or_else(|| StrandError::Internal("binding returned no logits".into()))?;
        logits.expect_shape(&self.config.logits_shape())?;
        let cache = KvCache::from_present(&self.config, outputs.collect(), position + 1)?;

        Ok(StepOutput { logits, cache })
    }

    /// Token `[1, 1]`, position `[1, 1]` and an all-ones mask `[1, position + 1]`.
    fn init_inputs(&self, token: Token, position: usize) -> Result<Vec<TensorBuffer>> {
        let pos = i64::try_from(position)
            .map_err(|_| StrandError::InvalidInput(format!("position {position} overflows i64")))?;
        let tokens = self.env.from_i64(vec![i64::from(token)], &[1, 1])?;
        let positions = self.env.from_i64(vec![pos], &[1, 1])?;
        let mask = self
            .env
            .from_i64(vec![1; position + 1], &[1, position + 1])?;
        Ok(vec![tokens, positions, mask])
    }

    /// Logits slot plus a key and value slot per layer for `position + 1` entries.
    fn init_outputs(&self, position: usize) -> Result<Vec<TensorBuffer>> {
        let mut outputs = Vec::with_capacity(self.config.num_outputs());
        outputs.push(self.env.allocate_f32(&self.config.logits_shape())?);
        let shape = self.config.cache_shape(position + 1);
        for _ in 0..self.config.num_layers {
            outputs.push(self.env.allocate_f32(&shape)?);
            outputs.push(self.env.allocate_f32(&shape)?);
        }
        Ok(outputs)
    }
}

fn check_names(kind: &str, got: &[String], expected: &[String]) -> Result<()> {
    if got.len() != expected.len() {
        return Err(StrandError::ShapeMismatch {
            expected: vec![expected.len()],
            got: vec![got.len()],
        });
    }
    if let Some((g, e)) = got.iter().zip(expected).find(|(g, e)| g != e) {
        return Err(StrandError::InvalidInput(format!(
            "session {kind} '{g}' does not match expected '{e}'"
        )));
    }
    Ok(())
}
