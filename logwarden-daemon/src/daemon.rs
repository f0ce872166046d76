//! Session runner.
//!
//! Owns the [`LogPipeline`], drives one collection session and shuts it
//! down on SIGTERM/SIGINT or when the device tool exits on its own.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use logwarden_core::{EventSink, LogwardenConfig};
use logwarden_log_pipeline::{LogPipeline, LogPipelineBuilder, PipelineConfig};

/// How often the runner checks whether the session ended by itself.
const SESSION_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Why [`Daemon::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// A shutdown signal arrived; carries the signal name.
    Signal(&'static str),
    /// The producer process exited and the pipeline went idle.
    SessionEnded,
}

pub struct Daemon {
    config: LogwardenConfig,
    pipeline: LogPipeline,
}

impl Daemon {
    /// Build the pipeline from a validated config and load behavior definitions.
    ///
    /// Load problems are reported through `sink` as diagnostics and the
    /// daemon continues with an empty behavior set.
    pub async fn build(config: LogwardenConfig, sink: Arc<dyn EventSink>) -> Result<Self> {
        logwarden_core::metrics::describe_all();

        let (pipeline, _) = LogPipelineBuilder::new()
            .config(PipelineConfig::from_core(&config))
            .sink(sink)
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build log pipeline: {}", e))?;

        pipeline.load_config().await;

        Ok(Self { config, pipeline })
    }

    pub fn config(&self) -> &LogwardenConfig {
        &self.config
    }

    pub fn pipeline(&self) -> &LogPipeline {
        &self.pipeline
    }

    /// Start a collection session.
    pub async fn start(&self, platform: &str, tag: Option<&str>) -> Result<()> {
        self.pipeline
            .start(platform, tag)
            .await
            .map_err(|e| anyhow::anyhow!("failed to start {} log collection: {}", platform, e))?;
        tracing::info!(platform, tag = tag.unwrap_or(""), "log collection started");
        Ok(())
    }

    /// Start a session and block until a signal arrives or the session ends.
    pub async fn run(&self, platform: &str, tag: Option<&str>) -> Result<RunOutcome> {
        self.start(platform, tag).await?;

        let outcome = tokio::select! {
            signal = wait_for_shutdown_signal() => RunOutcome::Signal(signal?),
            () = self.wait_for_session_end() => RunOutcome::SessionEnded,
        };

        match outcome {
            RunOutcome::Signal(signal) => {
                tracing::info!(signal, "shutdown signal received");
                self.shutdown().await;
            }
            RunOutcome::SessionEnded => {
                // Blocks until the natural-end cleanup releases the session slot.
                self.pipeline.stop().await;
                tracing::info!("log collection ended");
            }
        }

        Ok(outcome)
    }

    /// Stop the current session, if any.
    pub async fn shutdown(&self) {
        self.pipeline.stop().await;
        tracing::info!(health = ?self.pipeline.health_check().await, "logwarden-daemon shut down");
    }

    /// Resolve once the pipeline is no longer active.
    pub async fn wait_for_session_end(&self) {
        let mut interval = tokio::time::interval(SESSION_POLL_INTERVAL);
        loop {
            interval.tick().await;
            if !self.pipeline.is_active() {
                return;
            }
        }
    }
}

/// Wait for SIGTERM or SIGINT.
#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for Ctrl-C.
#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("failed to listen for ctrl-c: {}", e))?;
    Ok("CTRL_C")
}
