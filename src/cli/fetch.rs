//! Fetch command

use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::Duration;

use super::{Cli, CliError, OutputFormat};
use crate::orchestrator::{BatchSummary, Orchestrator};
use crate::shutdown::SharedShutdown;
use crate::store::FileStore;

/// Fetch arguments
#[derive(Debug, Args)]
pub struct FetchArgs {
    /// Fetch only this source id
    #[arg(long)]
    pub source: Option<String>,

    /// Fetch every active source, due or not
    #[arg(long, default_value_t = false, conflicts_with = "source")]
    pub force: bool,
}

impl FetchArgs {
    /// Execute the fetch command
    pub async fn execute(&self, cli: &Cli, shutdown: SharedShutdown) -> Result<(), CliError> {
        let settings = cli.settings();
        let store = Arc::new(FileStore::open(&settings.state_dir)?);
        let orchestrator = Orchestrator::from_settings(&settings, store)?.with_shutdown(shutdown);

        let spinner = (cli.output_format == OutputFormat::Human).then(|| {
            create_spinner(match &self.source {
                Some(id) => format!("Fetching {id}"),
                None => "Fetching due sources".to_string(),
            })
        });

        let summary = match (&self.source, self.force) {
            (Some(id), _) => orchestrator.trigger(Some(id)).await,
            (None, true) => orchestrator.trigger(None).await,
            (None, false) => {
                let started_at = chrono::Utc::now();
                let results = orchestrator.fetch_due(false).await;
                BatchSummary::from_results(started_at, chrono::Utc::now(), results)
            }
        };

        if let Some(spinner) = spinner {
            spinner.finish_and_clear();
        }

        match cli.output_format {
            OutputFormat::Json => println!("{}", serde_json::to_string(&summary)?),
            OutputFormat::Human => output_human(&summary),
        }

        if summary.failed > 0 {
            return Err(CliError::FetchFailed {
                failed: summary.failed,
                attempted: summary.attempted,
            });
        }
        Ok(())
    }
}

/// Print results in human-readable form
pub(crate) fn output_human(summary: &BatchSummary) {
    if summary.attempted == 0 {
        println!("No sources due.");
        return;
    }
    for result in &summary.results {
        println!("{result}");
        for warning in &result.warnings {
            println!("    warning: {warning}");
        }
    }
    println!(
        "\n{} attempted, {} succeeded, {} failed, {} records inserted",
        summary.attempted, summary.successful, summary.failed, summary.total_records_inserted
    );
}

fn create_spinner(message: String) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner
}
