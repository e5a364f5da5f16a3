//! Playwriter headless client entry point.

use std::error::Error;

use playwriter_cli::config::RunnerConfig;
use playwriter_cli::runner;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Logs go to stderr; stdout carries the transcript.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting Playwriter client");

    let config = RunnerConfig::from_env()?;
    tracing::info!(
        api_url = %config.client.base_url,
        drive = %config.drive,
        steps = config.steps,
        "Configuration loaded"
    );

    let summary = runner::run(config).await?;
    tracing::info!(
        world_id = %summary.world_id,
        entries = summary.entries,
        errors = summary.errors,
        completed = summary.completed,
        "Run finished"
    );

    Ok(())
}
