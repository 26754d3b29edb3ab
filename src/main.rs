use anyhow::Context;
use clap::Parser;
use scorewatch::Settings;
use scorewatch::cli::commands::{init, score, watch};
use scorewatch::cli::{Cli, Commands};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("{e:#}");
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let command = cli.resolved_command();

    // Init must work without a loadable configuration
    if let Commands::Init { force } = command {
        return init::run_init(force);
    }

    let settings = Settings::load(cli.config.as_deref()).context("Configuration error")?;

    match command {
        Commands::Watch => watch::run_watch(settings).await,
        Commands::Score { input } => score::run_score(settings, input).await,
        Commands::Config => init::run_config(&settings),
        Commands::Init { .. } => Ok(()),
    }
}
