use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use strand_core::{Candidate, Result, SampleResult, SelectionPolicy, StrandError, Token};

/// Candidates ranked per step when no other value is configured.
pub const DEFAULT_TOP_K: usize = 5;

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PolicyConfig {
    #[default]
    Greedy,
    Stochastic {
        temperature: f32,
        #[serde(default = "default_top_p")]
        top_p: f32,
        #[serde(default)]
        seed: Option<u64>,
    },
}

fn default_top_p() -> f32 {
    1.0
}

impl PolicyConfig {
    pub fn build(&self) -> Box<dyn SelectionPolicy> {
        match *self {
            PolicyConfig::Greedy => Box::new(Greedy),
            PolicyConfig::Stochastic {
                temperature,
                top_p,
                seed,
            } => Box::new(Stochastic::new(temperature, top_p, seed)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    pub top_k: usize,
    pub policy: PolicyConfig,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            policy: PolicyConfig::Greedy,
        }
    }
}

/// Always picks the highest ranked candidate.
#[derive(Debug, Clone, Copy, Default)]
pub struct Greedy;

impl SelectionPolicy for Greedy {
    fn name(&self) -> &str {
        "greedy"
    }

    fn select(&mut self, ranked: &[Candidate]) -> Result<Token> {
        ranked
            .first()
            .map(|c| c.token)
            .ok_or_else(|| StrandError::InvalidInput("no candidates to select from".into()))
    }
}

/// Temperature + nucleus sampling over the ranked candidates.
///
/// A temperature of zero or less falls back to greedy selection.
pub struct Stochastic {
    temperature: f32,
    top_p: f32,
    rng: StdRng,
}

impl Stochastic {
    pub fn new(temperature: f32, top_p: f32, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        Self {
            temperature,
            top_p,
            rng,
        }
    }
}

impl SelectionPolicy for Stochastic {
    fn name(&self) -> &str {
        "stochastic"
    }

    fn select(&mut self, ranked: &[Candidate]) -> Result<Token> {
        if self.temperature <= 0.0 {
            return Greedy.select(ranked);
        }
        if ranked.is_empty() {
            return Err(StrandError::InvalidInput("no candidates to select from".into()));
        }

        // Re-weight in the probability domain: p^(1/T) == softmax(logit / T) up to scale.
        let inv_t = 1.0 / self.temperature;
        let mut weights: Vec<f32> = ranked.iter().map(|c| c.probability.powf(inv_t)).collect();
        let total: f32 = weights.iter().sum();
        if total <= 0.0 || !total.is_finite() {
            return Greedy.select(ranked);
        }

        // Nucleus: keep the shortest ranked prefix whose mass reaches top_p.
        let mut cumulative = 0.0;
        let mut keep = weights.len();
        for (i, w) in weights.iter().enumerate() {
            cumulative += w / total;
            if cumulative >= self.top_p {
                keep = i + 1;
                break;
            }
        }
        weights.truncate(keep);

        let kept: f32 = weights.iter().sum();
        let r: f32 = self.rng.r#gen::<f32>() * kept;
        let mut cumulative = 0.0;
        for (candidate, w) in ranked.iter().zip(&weights) {
            cumulative += w;
            if r < cumulative {
                return Ok(candidate.token);
            }
        }
        // Rounding can leave r just above the last boundary.
        Ok(ranked[keep - 1].token)
    }
}

/// Softmax, top-K ranking and a pluggable selection policy.
pub struct Sampler {
    top_k: usize,
    policy: Box<dyn SelectionPolicy>,
}

impl Sampler {
    pub fn new(config: &SamplerConfig) -> Result<Self> {
        Self::with_policy(config.top_k, config.policy.build())
    }

    pub fn with_policy(top_k: usize, policy: Box<dyn SelectionPolicy>) -> Result<Self> {
        if top_k == 0 {
            return Err(StrandError::InvalidInput("top_k must be at least 1".into()));
        }
        Ok(Self { top_k, policy })
    }

    /// Greedy selection over the default top-K.
    pub fn greedy() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            policy: Box::new(Greedy),
        }
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub fn policy_name(&self) -> &str {
        self.policy.name()
    }

    pub fn sample(&mut self, logits: &[f32]) -> Result<SampleResult> {
        let probs = softmax(logits)?;
        let candidates = top_k(&probs, self.top_k);
        let token = self.policy.select(&candidates)?;
        let p = probs.get(token as usize).copied().ok_or_else(|| {
            StrandError::Internal(format!(
                "policy selected token {token} outside vocabulary of {}",
                probs.len()
            ))
        })?;
        let logprob = if p > 0.0 { p.ln() } else { f32::NEG_INFINITY };
        Ok(SampleResult {
            token,
            logprob,
            candidates,
        })
    }
}

impl Default for Sampler {
    fn default() -> Self {
        Self::greedy()
    }
}

/// Numerically stable softmax: the maximum logit is subtracted before
/// exponentiating.
pub fn softmax(logits: &[f32]) -> Result<Vec<f32>> {
    if logits.is_empty() {
        return Err(StrandError::InvalidInput("empty logits".into()));
    }
    if logits.iter().any(|v| v.is_nan()) {
        return Err(StrandError::InvalidInput("logits contain NaN".into()));
    }
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    if !max.is_finite() {
        return Err(StrandError::InvalidInput(format!(
            "logits have no finite maximum ({max})"
        )));
    }
    let exps: Vec<f32> = logits.iter().map(|&x| (x - max).exp()).collect();
    let sum: f64 = exps.iter().map(|&e| f64::from(e)).sum();
    Ok(exps.into_iter().map(|e| (f64::from(e) / sum) as f32).collect())
}

/// The `k` most probable tokens, highest first. Equal probabilities keep
/// vocabulary order. `k` larger than the vocabulary ranks all of it.
pub fn top_k(probs: &[f32], k: usize) -> Vec<Candidate> {
    let k = k.min(probs.len());
    if k == 0 {
        return Vec::new();
    }
    let order = |a: &usize, b: &usize| probs[*b].total_cmp(&probs[*a]).then(a.cmp(b));

    let mut idx: Vec<usize> = (0..probs.len()).collect();
    if k < idx.len() {
        idx.select_nth_unstable_by(k - 1, order);
        idx.truncate(k);
    }
    idx.sort_by(order);

    idx.into_iter()
        .map(|i| Candidate {
            token: i as Token,
            probability: probs[i],
        })
        .collect()
}
