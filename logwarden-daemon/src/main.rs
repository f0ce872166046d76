use std::sync::Arc;

use anyhow::Result;
use clap::Parser;

use logwarden_daemon::cli::DaemonCli;
use logwarden_daemon::daemon::{Daemon, RunOutcome};
use logwarden_daemon::logging;
use logwarden_daemon::sink::StdoutSink;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();
    let config = cli.resolve_config().await?;

    if cli.validate {
        eprintln!("configuration OK: {}", cli.config.display());
        return Ok(());
    }

    logging::init_tracing(&config.general)?;
    tracing::info!(config = %cli.config.display(), "logwarden-daemon starting");

    let platform = cli
        .platform
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("--platform is required"))?;

    let daemon = Daemon::build(config, Arc::new(StdoutSink::stdout())).await?;
    match daemon.run(platform, cli.tag.as_deref()).await? {
        RunOutcome::Signal(_) => {}
        RunOutcome::SessionEnded => {
            tracing::info!("device tool exited, shutting down");
        }
    }

    Ok(())
}
