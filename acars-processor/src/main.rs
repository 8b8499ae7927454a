//! ACARS Processor - Main entry point
//!
//! Loads the configuration, starts ingestion and the worker pool, and runs
//! until interrupted (or until every ingestor has finished, e.g. stdin EOF).

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use acars_processor::{Config, Processor};

/// Time allowed for workers to finish in-flight items on shutdown
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Exit status when `--write-example` changed the file
const EXAMPLE_CHANGED_STATUS: u8 = 100;

#[derive(Parser, Debug)]
#[command(name = "acars-processor")]
#[command(about = "Filter, annotate and forward ACARS / VDL Mode 2 messages")]
#[command(version)]
struct Args {
    /// Configuration file
    #[arg(short, long, default_value = "config.toml", env = "ACARS_PROCESSOR_CONFIG")]
    config: PathBuf,

    /// Write a fully populated example configuration to this path and exit
    #[arg(short = 's', long, value_name = "PATH")]
    write_example: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    if let Some(path) = args.write_example {
        let changed = acars_common::config::write_toml_if_changed(&Config::example(), &path)
            .with_context(|| format!("Failed to write example config to {}", path.display()))?;
        println!(
            "{} {}",
            if changed { "Updated" } else { "Unchanged" },
            path.display()
        );
        return Ok(if changed {
            ExitCode::from(EXAMPLE_CHANGED_STATUS)
        } else {
            ExitCode::SUCCESS
        });
    }

    let config = Config::load(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level)))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        config = %args.config.display(),
        steps = config.steps.len(),
        "Starting ACARS processor"
    );

    let mut processor = Processor::start(&config)
        .await
        .context("Failed to start processor")?;

    tokio::select! {
        _ = shutdown_signal() => {},
        _ = processor.finished() => {
            info!("All ingestors finished and queue drained");
        },
    }

    processor.shutdown(SHUTDOWN_GRACE).await;
    info!("Shutdown complete");
    Ok(ExitCode::SUCCESS)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
