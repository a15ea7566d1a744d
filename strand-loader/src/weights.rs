//! Sparse bigram logit table used by the reference CPU engine.
//!
//! `bigram.json` holds a `bias` map (token -> logit, applied at every step)
//! and a `transitions` map (previous token -> token -> logit). Tokens that
//! appear in neither map get a logit of `0.0`.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use strand_core::{Result, StrandError, Token};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BigramWeights {
    #[serde(default)]
    pub bias: HashMap<Token, f32>,
    #[serde(default)]
    pub transitions: HashMap<Token, HashMap<Token, f32>>,
}

impl BigramWeights {
    pub fn from_file(path: &Path) -> Result<Self> {
        crate::read_json(path)
    }

    /// Every token referenced must lie inside the vocabulary and every logit
    /// must be finite.
    pub fn validate(&self, vocab_size: usize) -> Result<()> {
        let entries = self.bias.iter().chain(
            self.transitions
                .values()
                .flat_map(|row| row.iter()),
        );
        for (&token, &logit) in entries {
            check_token(token, vocab_size)?;
            if !logit.is_finite() {
                return Err(StrandError::ModelLoad(format!(
                    "logit for token {token} is not finite"
                )));
            }
        }
        for &prev in self.transitions.keys() {
            check_token(prev, vocab_size)?;
        }
        Ok(())
    }

    /// Write the logits following `prev` into `out`, one entry per vocabulary token.
    pub fn fill_logits(&self, prev: Token, out: &mut [f32]) {
        out.fill(0.0);
        for (&token, &logit) in &self.bias {
            if let Some(slot) = out.get_mut(token as usize) {
                *slot += logit;
            }
        }
        if let Some(row) = self.transitions.get(&prev) {
            for (&token, &logit) in row {
                if let Some(slot) = out.get_mut(token as usize) {
                    *slot += logit;
                }
            }
        }
    }
}

fn check_token(token: Token, vocab_size: usize) -> Result<()> {
    if token as usize >= vocab_size {
        return Err(StrandError::ModelLoad(format!(
            "token {token} outside vocabulary of {vocab_size}"
        )));
    }
    Ok(())
}
