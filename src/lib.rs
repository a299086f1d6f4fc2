pub mod cli;
pub mod error;
pub mod header;
pub mod identifier;
pub mod io_utils;
pub mod loader;
pub mod options;
pub mod orchestrator;
pub mod registry;
pub mod retry;
pub mod rows;
pub mod schema;
pub mod store;
pub mod swap;
pub mod table;

use std::{
    env,
    fs::File,
    io::{BufWriter, Write},
    path::Path,
    sync::OnceLock,
};

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::{Level, LevelFilter, info, warn};

use crate::{
    cli::Cli,
    identifier::parse_column_list,
    options::ImportOptions,
    orchestrator::{ImportRunResult, Importer},
    registry::Registry,
    retry::RetryPolicy,
    store::{Backend, ConnectionConfig},
    table::Column,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn level_label(level: Level) -> &'static str {
    match level {
        Level::Error => "ERROR",
        Level::Warn => "WARNING",
        Level::Info => "INFO",
        Level::Debug => "DEBUG",
        Level::Trace => "TRACE",
    }
}

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("gtfs_import", LevelFilter::Info);
        }
        let _ = builder
            .target(env_logger::Target::Stdout)
            .format(|buf, record| {
                writeln!(
                    buf,
                    "{} [{}] {}",
                    chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                    level_label(record.level()),
                    record.args()
                )
            })
            .try_init();
    });
}

/// Process-level result of a run that got past setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Success,
    /// The command line could not be parsed.
    InvalidArguments,
    /// Strict mode was requested and at least one dataset failed.
    DatasetFailures,
}

impl RunStatus {
    pub fn exit_code(self) -> i32 {
        match self {
            RunStatus::Success => 0,
            RunStatus::InvalidArguments => 1,
            RunStatus::DatasetFailures => 2,
        }
    }
}

pub fn run() -> Result<RunStatus> {
    init_logging();
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // clap would exit with 2, which is reserved for failed datasets.
            let _ = err.print();
            return Ok(if err.use_stderr() {
                RunStatus::InvalidArguments
            } else {
                RunStatus::Success
            });
        }
    };
    execute(&cli)
}

pub fn execute(cli: &Cli) -> Result<RunStatus> {
    let registry = match &cli.registry {
        Some(path) => Registry::load(path)
            .with_context(|| format!("Loading dataset registry from {path:?}"))?,
        None => Registry::gtfs_default(),
    };
    let registry = registry.select(&cli.datasets)?;
    let encoding = io_utils::resolve_encoding(cli.input_encoding.as_deref())?;

    if !cli.gtfs_dir.is_dir() {
        bail!("GTFS directory not found: {}", cli.gtfs_dir.display());
    }
    info!("GTFS directory: {}", cli.gtfs_dir.display());

    let options = ImportOptions {
        batch_size: cli.batch_size,
        progress_interval: cli.progress_interval,
        encoding,
        retry: RetryPolicy::default().with_max_retries(cli.retries),
        ..ImportOptions::default()
    };

    if cli.plan {
        print_plan(&registry, &cli.gtfs_dir, &options);
        return Ok(RunStatus::Success);
    }

    let backend = cli.backend.unwrap_or_else(Backend::default_for_build);
    let config = ConnectionConfig {
        host: cli.host.clone(),
        port: cli.port,
        user: cli.user.clone(),
        password: cli.password.clone(),
        database: cli.database.clone(),
    };
    let target = config.describe(backend);
    info!("Connecting to {target}");
    let mut store =
        store::connect(backend, &config).with_context(|| format!("Connecting to {target}"))?;
    info!("Connected to {} successfully", backend.as_str());

    let result = Importer::new(store.as_mut(), &registry, &options)
        .run(&cli.gtfs_dir)
        .context("Preparing the store for import")?;
    drop(store);
    info!("Connection closed");

    if let Some(path) = &cli.summary_json {
        write_summary(&result, path)
            .with_context(|| format!("Writing import summary to {path:?}"))?;
    }

    if cli.fail_on_dataset_error && result.has_failures() {
        warn!(
            "Failing run: {} dataset(s) did not import ({})",
            result.failed().len(),
            result.failed().join(", ")
        );
        return Ok(RunStatus::DatasetFailures);
    }
    Ok(RunStatus::Success)
}

fn write_summary(result: &ImportRunResult, path: &Path) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, result)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

fn print_plan(registry: &Registry, feed_dir: &Path, options: &ImportOptions) {
    let headers = [Column::right("#"), Column::left("column"), Column::left("type")];
    for dataset in registry.datasets() {
        let path = feed_dir.join(dataset.file_name());
        if !path.is_file() {
            warn!("File not found: {}", path.display());
            continue;
        }
        match header::read_header(&path, options.encoding) {
            Ok(names) => {
                let columns = schema::plan_columns(&names, dataset);
                println!("{} <- {}", dataset.name(), dataset.file_name());
                table::print_table(&headers, &schema::describe_columns(&columns));
                println!();
                if let Err(err) = parse_column_list(names.iter().map(String::as_str)) {
                    warn!("{} cannot be imported: {err}", dataset.name());
                }
            }
            Err(err) => warn!("{}: {err}", dataset.name()),
        }
    }
}
