//! Command-line driver for Strand: argument types and the commands behind them.

pub mod tokenizer;

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use strand_backend_cpu::{CpuEngine, CpuSession};
use strand_core::{
    CausalLm, Device, Environment, GenerateOptions, InferenceEngine, Session, Token,
};
use strand_runtime::{Decoder, PolicyConfig, Sampler, SamplerConfig, StepExecutor};
use tracing::{info, warn};

use crate::tokenizer::StrandTokenizer;

#[derive(Parser, Debug)]
#[command(name = "strand", about = "Autoregressive token generation with a KV cache")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate tokens after a prompt
    Generate(GenerateArgs),
    /// Print the logits of every step as JSON
    Logits(LogitsArgs),
}

#[derive(Args, Debug)]
pub struct ModelArgs {
    /// Path to the model directory (config.json + bigram.json)
    #[arg(long)]
    pub model_path: PathBuf,

    /// Device selector: cpu, cuda, cuda:N
    #[arg(long, default_value = "cpu")]
    pub device: String,

    /// Prompt token ids, comma separated
    #[arg(long, value_delimiter = ',')]
    pub prompt: Vec<Token>,

    /// Prompt text, encoded with --tokenizer
    #[arg(long, conflicts_with = "prompt", requires = "tokenizer")]
    pub text: Option<String>,

    /// Hugging Face tokenizer.json used for --text and for decoding output
    #[arg(long)]
    pub tokenizer: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct GenerateArgs {
    #[command(flatten)]
    pub model: ModelArgs,

    /// Number of tokens to generate
    #[arg(long, default_value = "5")]
    pub steps: usize,

    /// Candidates ranked per step
    #[arg(long, default_value = "5")]
    pub top_k: usize,

    /// Sampling temperature; greedy when omitted
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Nucleus threshold for temperature sampling
    #[arg(long, default_value = "1.0")]
    pub top_p: f32,

    /// Seed for temperature sampling
    #[arg(long)]
    pub seed: Option<u64>,
}

impl GenerateArgs {
    pub fn sampler_config(&self) -> SamplerConfig {
        let policy = match self.temperature {
            Some(temperature) => PolicyConfig::Stochastic {
                temperature,
                top_p: self.top_p,
                seed: self.seed,
            },
            None => PolicyConfig::Greedy,
        };
        SamplerConfig {
            top_k: self.top_k,
            policy,
        }
    }
}

#[derive(Args, Debug)]
pub struct LogitsArgs {
    #[command(flatten)]
    pub model: ModelArgs,

    /// Tokens to generate after the prompt
    #[arg(long, default_value = "0")]
    pub steps: usize,
}

#[derive(Debug, Serialize)]
pub struct GenerateReport {
    pub prompt: Vec<Token>,
    pub tokens: Vec<Token>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LogitsReport {
    pub prompt: Vec<Token>,
    pub logits: Vec<Vec<f32>>,
}

struct Loaded {
    decoder: Decoder<CpuSession>,
    prompt: Vec<Token>,
    tokenizer: Option<StrandTokenizer>,
}

fn load(env: &Environment, args: &ModelArgs, sampler: &SamplerConfig) -> anyhow::Result<Loaded> {
    let tokenizer = args
        .tokenizer
        .as_deref()
        .map(StrandTokenizer::from_file)
        .transpose()?;

    let prompt = match (&args.text, &tokenizer) {
        (Some(text), Some(tok)) => tok.encode(text)?,
        (Some(_), None) => bail!("--text requires --tokenizer"),
        (None, _) => args.prompt.clone(),
    };
    if prompt.is_empty() {
        bail!("no prompt given; pass --prompt or --text");
    }

    let device: Device = args.device.parse()?;
    let session = CpuEngine::new()
        .load(env, &args.model_path, device)
        .with_context(|| format!("loading {}", args.model_path.display()))?;
    if let Some(tok) = &tokenizer {
        let model_vocab = session.config().vocab_size;
        if tok.vocab_size() != model_vocab {
            warn!(
                tokenizer_vocab = tok.vocab_size(),
                model_vocab, "tokenizer and model vocabulary sizes differ"
            );
        }
    }
    let executor = StepExecutor::new(env.clone(), session)?;
    let decoder = Decoder::new(executor, Sampler::new(sampler)?);
    info!(prompt_len = prompt.len(), "model ready");

    Ok(Loaded {
        decoder,
        prompt,
        tokenizer,
    })
}

pub fn generate(env: &Environment, args: &GenerateArgs) -> anyhow::Result<GenerateReport> {
    let Loaded {
        mut decoder,
        prompt,
        tokenizer,
    } = load(env, &args.model, &args.sampler_config())?;

    let tokens = decoder.generate(&prompt, args.steps)?;
    let text = tokenizer.map(|t| t.decode(&tokens)).transpose()?;
    Ok(GenerateReport {
        prompt,
        tokens,
        text,
    })
}

pub fn logits(env: &Environment, args: &LogitsArgs) -> anyhow::Result<LogitsReport> {
    let Loaded {
        mut decoder,
        prompt,
        ..
    } = load(env, &args.model, &SamplerConfig::default())?;

    let generation =
        decoder.generate_with(&prompt, args.steps, GenerateOptions { record_logits: true })?;
    Ok(LogitsReport {
        prompt,
        logits: generation.logits.unwrap_or_default(),
    })
}
