//! Stepwise terminal player entry point.

use std::error::Error;

use clap::Parser;
use stepwise_cli::config::Args;
use stepwise_cli::runner;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    // Logs go to stderr; stdout carries the step stream.
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr);
    if args.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    let config = args.into_config()?;
    tracing::info!(
        script = ?config.script,
        format = ?config.format,
        mode = ?config.mode,
        "Starting Stepwise player"
    );

    let source = tokio::fs::read_to_string(&config.script).await?;
    let mut stdout = std::io::stdout().lock();
    let summary = runner::run(&config, &source, &mut stdout).await?;

    tracing::info!(steps = summary.steps, "Playback finished");
    Ok(())
}
