//! Decode loop: primes the cache with the prompt, then extends it one
//! sampled token at a time.

use strand_core::{
    CausalLm, GenerateOptions, Generation, Result, Session, StrandError, Token,
};
use tracing::{debug, info, trace};

use crate::executor::{StepExecutor, StepOutput};
use crate::sampling::Sampler;

pub struct Decoder<S: Session> {
    executor: StepExecutor<S>,
    sampler: Sampler,
}

impl<S: Session> Decoder<S> {
    pub fn new(executor: StepExecutor<S>, sampler: Sampler) -> Self {
        Self { executor, sampler }
    }

    pub fn executor(&self) -> &StepExecutor<S> {
        &self.executor
    }

    pub fn sampler_mut(&mut self) -> &mut Sampler {
        &mut self.sampler
    }

    fn validate(&self, prompt: &[Token], steps: usize) -> Result<usize> {
        if prompt.is_empty() {
            return Err(StrandError::InvalidInput("empty prompt".into()));
        }
        let config = self.executor.config();
        if let Some(&bad) = prompt.iter().find(|&&t| t as usize >= config.vocab_size) {
            return Err(StrandError::InvalidInput(format!(
                "prompt token {bad} outside vocabulary of {}",
                config.vocab_size
            )));
        }
        let total = prompt
            .len()
            .checked_add(steps)
            .filter(|&total| total <= config.max_positions)
            .ok_or_else(|| {
                StrandError::InvalidInput(format!(
                    "prompt of {} tokens plus {steps} steps exceeds {} positions",
                    prompt.len(),
                    config.max_positions
                ))
            })?;
        Ok(total)
    }
}

impl<S: Session> CausalLm for Decoder<S> {
    /// Runs `prompt.len() + steps` forward passes.
    ///
    /// Positions before the last prompt token only warm the cache. From the
    /// last prompt position on, each step's logits are sampled and the
    /// selected token is the next step's input. Only tokens sampled at
    /// positions at or past `prompt.len()` are returned, so the output is the
    /// last `steps` samples.
    ///
    /// Any failure aborts the call. Every buffer held at that point,
    /// including the cache, is released before the error is returned.
    fn generate_with(
        &mut self,
        prompt: &[Token],
        steps: usize,
        options: GenerateOptions,
    ) -> Result<Generation> {
        let total = self.validate(prompt, steps)?;
        let context = prompt.len();
        info!(
            context,
            steps,
            policy = self.sampler.policy_name(),
            "generation started"
        );

        let mut generation = Generation {
            tokens: Vec::with_capacity(steps),
            logits: options.record_logits.then(|| Vec::with_capacity(total)),
            ..Default::default()
        };
        let mut cache = self.executor.empty_cache()?;
        let mut next = prompt[0];

        for position in 0..total {
            let token = if position < context {
                prompt[position]
            } else {
                next
            };
            debug!(position, token, cached = cache.cached_positions(), "step");

            let StepOutput { logits, cache: present } = self.executor.step(token, position, cache)?;
            cache = present;
            generation.steps_run += 1;

            let values = logits.as_f32()?;
            if let Some(history) = generation.logits.as_mut() {
                history.push(values.to_vec());
            }

            if position + 1 >= context {
                let sampled = self.sampler.sample(values)?;
                trace!(
                    position,
                    token = sampled.token,
                    logprob = sampled.logprob,
                    candidates = ?sampled.candidates,
                    "sampled"
                );
                next = sampled.token;
                generation.candidates.push(sampled.candidates);
                if position >= context {
                    generation.tokens.push(next);
                }
            }
            logits.release();
        }

        generation.cached_positions = cache.cached_positions();
        cache.release();
        info!(
            generated = generation.tokens.len(),
            cached_positions = generation.cached_positions,
            "generation finished"
        );
        Ok(generation)
    }
}
