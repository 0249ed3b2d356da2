//! Main entry point for the statfin-ingest CLI

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;
use statfin_ingest::cli::{Cli, Commands};
use statfin_ingest::metrics::init_metrics;
use statfin_ingest::shutdown::ShutdownCoordinator;

/// Initialize tracing subscriber with optional JSON formatting.
/// Logs go to stderr so `--output-format json` keeps stdout parseable.
fn init_tracing() {
    let json_format = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("statfin_ingest=info"));

    if json_format {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

#[tokio::main]
async fn main() {
    // .env is optional; real environment variables win
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    let shutdown = ShutdownCoordinator::shared();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Ctrl+C received - finishing in-flight fetches...");
                shutdown.request_shutdown();
            }
        }
    });

    if let Some(addr) = cli.metrics_addr {
        if let Err(e) = init_metrics(addr) {
            error!("Failed to start metrics exporter on {}: {}", addr, e);
            std::process::exit(1);
        }
    }

    let result: anyhow::Result<()> = match cli.command {
        Commands::Browse(ref cmd) => cmd.execute(&cli).await.map_err(anyhow::Error::from),
        Commands::Fetch(ref args) => args
            .execute(&cli, shutdown.clone())
            .await
            .map_err(anyhow::Error::from),
        Commands::Worker(ref args) => args
            .execute(&cli, shutdown.clone())
            .await
            .map_err(anyhow::Error::from),
    };

    if let Err(e) = result {
        error!("Command failed: {:#}", e);
        std::process::exit(1);
    }
}
