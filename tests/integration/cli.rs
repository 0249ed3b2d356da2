//! Integration tests for the command-line interface

use assert_cmd::Command;
use clap::Parser;
use std::path::PathBuf;
use tempfile::TempDir;
use statfin_ingest::cli::{Cli, Commands, OutputFormat};
use statfin_ingest::config::{DEFAULT_BASE_URL, DEFAULT_MAX_CONCURRENT_FETCHES, DEFAULT_MAX_RETRIES};

fn bin() -> Command {
    let mut cmd = Command::cargo_bin("statfin-ingest").unwrap();
    // keep developer environment out of the tests
    for var in [
        "STATFIN_BASE_URL",
        "STATFIN_TIMEOUT_SECS",
        "STATFIN_MAX_RETRIES",
        "STATFIN_MAX_CONCURRENT",
        "STATFIN_MIN_FETCH_DELAY_MS",
        "STATFIN_FETCH_INTERVAL_HOURS",
        "STATFIN_STATE_DIR",
        "STATFIN_METRICS_ADDR",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

#[test]
fn test_help_lists_commands() {
    let output = bin().arg("--help").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for command in ["browse", "fetch", "worker"] {
        assert!(stdout.contains(command), "help should mention {command}");
    }
}

#[test]
fn test_fetch_with_no_sources_succeeds() {
    let dir = TempDir::new().unwrap();
    let output = bin()
        .args(["--state-dir"])
        .arg(dir.path())
        .args(["--output-format", "json", "fetch"])
        .output()
        .unwrap();

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["attempted"], 0);
    assert!(dir.path().join("sources.json").exists());
}

#[test]
fn test_fetch_unknown_source_exits_nonzero() {
    let dir = TempDir::new().unwrap();
    bin()
        .args(["--state-dir"])
        .arg(dir.path())
        .args(["fetch", "--source", "nope"])
        .assert()
        .failure();
}

#[test]
fn test_defaults() {
    let cli = Cli::try_parse_from(["statfin-ingest", "worker"]).unwrap();
    assert_eq!(cli.base_url, DEFAULT_BASE_URL);
    assert_eq!(cli.max_retries, DEFAULT_MAX_RETRIES);
    assert_eq!(cli.max_concurrent, DEFAULT_MAX_CONCURRENT_FETCHES);
    assert_eq!(cli.output_format, OutputFormat::Human);
    assert!(cli.metrics_addr.is_none());
    assert!(matches!(cli.command, Commands::Worker(ref args) if !args.once));
}

#[test]
fn test_global_flags_after_subcommand() {
    let cli = Cli::try_parse_from([
        "statfin-ingest",
        "fetch",
        "--force",
        "--max-concurrent",
        "5",
        "--state-dir",
        "/var/lib/statfin",
    ])
    .unwrap();
    assert_eq!(cli.max_concurrent, 5);
    assert_eq!(cli.settings().state_dir, PathBuf::from("/var/lib/statfin"));
    assert!(matches!(cli.command, Commands::Fetch(ref args) if args.force));
}

#[test]
fn test_force_conflicts_with_source() {
    assert!(Cli::try_parse_from(["statfin-ingest", "fetch", "--force", "--source", "x"]).is_err());
}

#[test]
fn test_rejects_zero_concurrency() {
    assert!(Cli::try_parse_from(["statfin-ingest", "--max-concurrent", "0", "worker"]).is_err());
}
