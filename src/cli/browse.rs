//! Catalog browsing commands

use clap::{Args, Subcommand};

use super::{Cli, CliError, OutputFormat};
use crate::catalog::{Catalog, TableMetadata, TableNode};
use crate::client::PxWebClient;

/// Browse subcommand
#[derive(Debug, Args)]
pub struct BrowseCommand {
    #[command(subcommand)]
    action: BrowseAction,
}

#[derive(Debug, Subcommand)]
enum BrowseAction {
    /// List folders and tables under a path
    List {
        /// Catalog path; the database root when omitted
        #[arg(default_value = "")]
        path: String,
    },
    /// Show the variables of a table
    Metadata {
        /// Table path, e.g. vaerak/statfin_vaerak_pxt_11ra.px
        table_path: String,
    },
}

impl BrowseCommand {
    /// Execute the browse command
    pub async fn execute(&self, cli: &Cli) -> Result<(), CliError> {
        let catalog = Catalog::new(PxWebClient::from_settings(&cli.settings())?);
        match &self.action {
            BrowseAction::List { path } => {
                let nodes = catalog.list(path).await?;
                match cli.output_format {
                    OutputFormat::Json => println!("{}", serde_json::to_string(&nodes)?),
                    OutputFormat::Human => print_nodes(&nodes),
                }
            }
            BrowseAction::Metadata { table_path } => {
                let metadata = catalog.metadata(table_path).await?;
                match cli.output_format {
                    OutputFormat::Json => println!("{}", serde_json::to_string(&metadata)?),
                    OutputFormat::Human => print_metadata(&metadata),
                }
            }
        }
        Ok(())
    }
}

fn print_nodes(nodes: &[TableNode]) {
    if nodes.is_empty() {
        println!("(empty)");
        return;
    }
    for node in nodes {
        let marker = if node.is_table() { "[T]" } else { "[+]" };
        println!("{marker} {:<40} {}", node.full_path(), node.text);
    }
}

fn print_metadata(metadata: &TableMetadata) {
    println!("{}", metadata.title);
    println!("Table: {}", metadata.table_id);
    if let Some(updated) = &metadata.updated {
        println!("Updated: {updated}");
    }
    for variable in &metadata.variables {
        let mut flags = Vec::new();
        if variable.time {
            flags.push("time");
        }
        if variable.elimination {
            flags.push("elimination");
        }
        let flags = if flags.is_empty() {
            String::new()
        } else {
            format!(" [{}]", flags.join(", "))
        };
        println!(
            "  {} ({}): {} values{flags}",
            variable.code,
            variable.text,
            variable.values.len()
        );
        for value in variable.values.iter().take(5) {
            println!("      {} = {}", value.code, value.text);
        }
        if variable.values.len() > 5 {
            println!("      ...");
        }
    }
}
