//! Worker command: periodic fetching

use clap::Args;
use std::sync::Arc;
use tracing::info;

use super::fetch::output_human;
use super::{Cli, CliError, OutputFormat};
use crate::orchestrator::{Orchestrator, Scheduler};
use crate::shutdown::SharedShutdown;
use crate::store::FileStore;

/// Worker arguments
#[derive(Debug, Args)]
pub struct WorkerArgs {
    /// Run a single due batch and exit
    #[arg(long, default_value_t = false)]
    pub once: bool,
}

impl WorkerArgs {
    /// Execute the worker command
    pub async fn execute(&self, cli: &Cli, shutdown: SharedShutdown) -> Result<(), CliError> {
        let settings = cli.settings();
        let store = Arc::new(FileStore::open(&settings.state_dir)?);
        let orchestrator = Arc::new(
            Orchestrator::from_settings(&settings, store)?.with_shutdown(shutdown.clone()),
        );
        let scheduler = Scheduler::new(orchestrator, settings.fetch_interval(), shutdown.clone());

        if self.once {
            let summary = scheduler.run_once().await;
            match cli.output_format {
                OutputFormat::Json => println!("{}", serde_json::to_string(&summary)?),
                OutputFormat::Human => output_human(&summary),
            }
            return Ok(());
        }

        if !scheduler.start() {
            return Err(CliError::ConfigurationError(
                "scheduler could not be started".to_string(),
            ));
        }
        info!(
            interval_hours = settings.fetch_interval_hours,
            state_dir = %settings.state_dir.display(),
            "Worker running, press Ctrl+C to stop"
        );

        shutdown.wait_for_shutdown().await;
        scheduler.stop().await;
        info!(runs = scheduler.runs_completed(), "Worker stopped");
        Ok(())
    }
}
