// src/main.rs — mathsel entry point

use clap::Parser;

use mathsel::cli::run::run_experiment;
use mathsel::cli::Cli;
use mathsel::infra::config::Config;
use mathsel::infra::logger;

#[tokio::main]
async fn main() {
    // Initialize logging (respects RUST_LOG)
    logger::init_logging("info");

    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load config (falls back to defaults if no mathsel.toml)
    let mut config = if let Some(ref path) = cli.config {
        Config::load_from(path)?
    } else {
        Config::load()?
    };
    cli.apply(&mut config);

    let summary = run_experiment(&config).await?;
    if !summary.unfinished.is_empty() {
        eprintln!(
            "{} task(s) did not finish; see the unfinished log next to the results",
            summary.unfinished.len()
        );
    }
    Ok(())
}
