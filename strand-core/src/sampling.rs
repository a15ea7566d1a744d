use serde::Serialize;

use crate::{Result, Token};

/// A ranked next-token candidate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Candidate {
    pub token: Token,
    pub probability: f32,
}

pub struct SampleResult {
    pub token: Token,
    pub logprob: f32,
    /// Top-K candidates, highest probability first.
    pub candidates: Vec<Candidate>,
}

/// Chooses the next token from candidates ranked by descending probability.
pub trait SelectionPolicy: Send {
    fn name(&self) -> &str;

    fn select(&mut self, ranked: &[Candidate]) -> Result<Token>;
}
