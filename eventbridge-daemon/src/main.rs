use anyhow::Result;
use clap::Parser;

use eventbridge_core::config::EventBridgeConfig;
use eventbridge_daemon::cli::DaemonCli;
use eventbridge_daemon::logging::init_tracing;
use eventbridge_daemon::orchestrator::Orchestrator;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();

    let mut config = EventBridgeConfig::load(&cli.config)
        .await
        .map_err(|e| anyhow::anyhow!("failed to load config {}: {}", cli.config.display(), e))?;
    cli.apply_overrides(&mut config);
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

    init_tracing(&config.general)?;

    if cli.validate {
        tracing::info!(config = %cli.config.display(), "configuration is valid");
        return Ok(());
    }

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "eventbridge-daemon starting");

    let mut orchestrator = Orchestrator::build_from_config(config).await?;
    let reason = orchestrator.run().await?;

    tracing::info!(reason = ?reason, "eventbridge-daemon shut down");
    Ok(())
}
