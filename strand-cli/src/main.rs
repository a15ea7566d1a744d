//! Strand command-line entry point.

use clap::Parser;
use strand_cli::{Cli, Command};
use strand_core::{Environment, EnvironmentConfig};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // --- Init runtime environment ---
    let env = Environment::init(EnvironmentConfig::from_env())?;

    let output = match &cli.command {
        Command::Generate(args) => {
            let report = strand_cli::generate(&env, args)?;
            match &report.text {
                Some(text) => format!("{:?}\n{text}", report.tokens),
                None => format!("{:?}", report.tokens),
            }
        }
        Command::Logits(args) => serde_json::to_string(&strand_cli::logits(&env, args)?)?,
    };
    println!("{output}");

    // --- Teardown after every session is gone ---
    env.shutdown()?;
    Ok(())
}
