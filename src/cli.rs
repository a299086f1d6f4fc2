use std::path::PathBuf;

use clap::Parser;

use crate::{
    options::{DEFAULT_BATCH_SIZE, DEFAULT_PROGRESS_INTERVAL},
    store::Backend,
};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Import GTFS feed files into a relational store with atomic table swaps",
    long_about = None
)]
pub struct Cli {
    /// Directory containing the GTFS feed files
    #[arg(long = "gtfs-dir", default_value = "gtfs_to_import")]
    pub gtfs_dir: PathBuf,
    /// Store backend (defaults to mysql when compiled in, sqlite otherwise)
    #[arg(long, value_enum)]
    pub backend: Option<Backend>,
    /// Store host
    #[arg(long, default_value = "localhost")]
    pub host: String,
    /// Store port
    #[arg(long, default_value_t = 3306)]
    pub port: u16,
    /// Store user
    #[arg(long, default_value = "lolados_bus")]
    pub user: String,
    /// Store password
    #[arg(long, default_value = "bus@2013", hide_default_value = true)]
    pub password: String,
    /// Database name (file path for the sqlite backend)
    #[arg(long, default_value = "lolados_bus")]
    pub database: String,
    /// Rows per multi-row INSERT
    #[arg(long = "batch-size", default_value_t = DEFAULT_BATCH_SIZE, value_parser = parse_batch_size)]
    pub batch_size: usize,
    /// Log a progress line every this many rows
    #[arg(
        long = "progress-interval",
        default_value_t = DEFAULT_PROGRESS_INTERVAL,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub progress_interval: u64,
    /// Retries for transient store errors during batch flushes and swaps (0 disables)
    #[arg(long, default_value_t = 3)]
    pub retries: u32,
    /// YAML dataset registry replacing the built-in GTFS table
    #[arg(long)]
    pub registry: Option<PathBuf>,
    /// Import only this dataset (repeatable)
    #[arg(long = "dataset", action = clap::ArgAction::Append)]
    pub datasets: Vec<String>,
    /// Character encoding of the feed files (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Print the planned schema of every dataset without touching the store
    #[arg(long)]
    pub plan: bool,
    /// Write the per-dataset outcome as JSON to this path
    #[arg(long = "summary-json")]
    pub summary_json: Option<PathBuf>,
    /// Exit with status 2 when any dataset fails to import
    #[arg(long = "fail-on-dataset-error")]
    pub fail_on_dataset_error: bool,
}

fn parse_batch_size(value: &str) -> Result<usize, String> {
    let parsed: usize = value
        .trim()
        .parse()
        .map_err(|_| format!("'{value}' is not a valid batch size"))?;
    if parsed == 0 {
        return Err("batch size must be at least 1".to_string());
    }
    Ok(parsed)
}
