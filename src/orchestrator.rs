//! Run orchestrator: drives every registered dataset through
//! header → plan → stage → swap inside its own transaction.
//!
//! A dataset's failure is captured as a [`DatasetOutcome::Failed`] value; the
//! transaction is rolled back, the staging table dropped, and the loop moves on
//! to the next dataset. Only setup errors (referential-integrity toggle)
//! abort the whole run.

use std::path::Path;

use log::{debug, error, info, warn};
use serde::Serialize;

use crate::{
    error::{FailureKind, LoadError, LoadResult},
    header::read_header,
    loader::{stage_dataset, staging_name},
    options::ImportOptions,
    registry::{DatasetSpec, Registry},
    schema::plan_columns,
    store::{Store, StoreResult},
    swap::{SwapOutcome, promote},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    ConnectionEstablished,
    DatasetStarted,
    DatasetTransacting,
    DatasetCommitted,
    DatasetRolledBack,
    RunComplete,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DatasetOutcome {
    Succeeded { rows: u64, replaced: bool },
    Failed { kind: FailureKind, reason: String },
}

impl DatasetOutcome {
    fn failed(err: &LoadError) -> Self {
        DatasetOutcome::Failed {
            kind: err.kind(),
            reason: err.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, DatasetOutcome::Succeeded { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatasetReport {
    pub dataset: String,
    pub file: String,
    #[serde(flatten)]
    pub outcome: DatasetOutcome,
}

/// Aggregate outcome of one run, in registry order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportRunResult {
    pub datasets: Vec<DatasetReport>,
}

impl ImportRunResult {
    pub fn succeeded(&self) -> Vec<&str> {
        self.names_where(true)
    }

    pub fn failed(&self) -> Vec<&str> {
        self.names_where(false)
    }

    fn names_where(&self, success: bool) -> Vec<&str> {
        self.datasets
            .iter()
            .filter(|report| report.outcome.is_success() == success)
            .map(|report| report.dataset.as_str())
            .collect()
    }

    pub fn has_failures(&self) -> bool {
        self.datasets.iter().any(|r| !r.outcome.is_success())
    }

    pub fn outcome(&self, dataset: &str) -> Option<&DatasetOutcome> {
        self.datasets
            .iter()
            .find(|report| report.dataset == dataset)
            .map(|report| &report.outcome)
    }

    pub fn summary(&self) -> String {
        format!(
            "Import completed: {} succeeded, {} failed",
            self.succeeded().len(),
            self.failed().len()
        )
    }
}

pub struct Importer<'a> {
    store: &'a mut dyn Store,
    registry: &'a Registry,
    options: &'a ImportOptions,
    state: RunState,
}

impl<'a> Importer<'a> {
    /// `store` must already be connected.
    pub fn new(store: &'a mut dyn Store, registry: &'a Registry, options: &'a ImportOptions) -> Self {
        let mut importer = Self {
            store,
            registry,
            options,
            state: RunState::Idle,
        };
        importer.transition(RunState::ConnectionEstablished);
        importer
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    fn transition(&mut self, next: RunState) {
        debug!("Run state {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    pub fn run(&mut self, feed_dir: &Path) -> StoreResult<ImportRunResult> {
        self.store.set_referential_integrity(false)?;

        let registry = self.registry;
        let mut result = ImportRunResult::default();
        for dataset in registry.datasets() {
            let path = feed_dir.join(dataset.file_name());
            let outcome = self.import_dataset(dataset, &path);
            result.datasets.push(DatasetReport {
                dataset: dataset.name().to_string(),
                file: dataset.file_name().to_string(),
                outcome,
            });
        }

        if let Err(err) = self.store.set_referential_integrity(true) {
            error!("Failed to re-enable referential integrity checks: {err}");
        }
        self.transition(RunState::RunComplete);
        info!("{}", result.summary());
        Ok(result)
    }

    fn import_dataset(&mut self, dataset: &DatasetSpec, path: &Path) -> DatasetOutcome {
        self.transition(RunState::DatasetStarted);
        if self.options.cancel.is_cancelled() {
            warn!("Skipping {}: import cancelled", dataset.name());
            return DatasetOutcome::failed(&LoadError::Cancelled);
        }
        info!("Importing {} -> {}", dataset.file_name(), dataset.name());

        if let Err(err) = self.store.begin() {
            error!("Error importing {}: {err}", dataset.file_name());
            return DatasetOutcome::failed(&LoadError::Store(err));
        }
        self.transition(RunState::DatasetTransacting);

        let loaded = self
            .load_dataset(dataset, path)
            .and_then(|loaded| self.store.commit().map(|_| loaded).map_err(LoadError::from));
        match loaded {
            Ok((rows, swap)) => {
                self.transition(RunState::DatasetCommitted);
                DatasetOutcome::Succeeded {
                    rows,
                    replaced: swap == SwapOutcome::Replaced,
                }
            }
            Err(err @ LoadError::SourceMissing { .. }) => {
                warn!("  {err}");
                self.rollback(dataset, false);
                DatasetOutcome::failed(&err)
            }
            Err(err) => {
                error!("Error importing {}: {err}", dataset.file_name());
                self.rollback(dataset, true);
                DatasetOutcome::failed(&err)
            }
        }
    }

    fn load_dataset(&mut self, dataset: &DatasetSpec, path: &Path) -> LoadResult<(u64, SwapOutcome)> {
        if !path.is_file() {
            return Err(LoadError::SourceMissing {
                path: path.to_path_buf(),
            });
        }
        let headers = read_header(path, self.options.encoding)?;
        info!("  Columns: {}", headers.join(", "));
        let columns = plan_columns(&headers, dataset);

        let (staging, rows) = stage_dataset(&mut *self.store, dataset, &columns, path, self.options)?;
        if self.options.cancel.is_cancelled() {
            return Err(LoadError::Cancelled);
        }
        let swap = promote(
            &mut *self.store,
            dataset.table(),
            &staging.name,
            &self.options.retry,
        )?;
        Ok((rows, swap))
    }

    fn rollback(&mut self, dataset: &DatasetSpec, drop_staging: bool) {
        if let Err(err) = self.store.rollback() {
            error!("Rollback failed for {}: {err}", dataset.name());
        }
        if drop_staging {
            // DDL is not transactional on every backend.
            match staging_name(dataset.table()) {
                Ok(staging) => {
                    if let Err(err) = self.store.drop_table_if_exists(&staging) {
                        error!("Failed to drop {staging}: {err}");
                    }
                }
                Err(err) => error!("{err}"),
            }
        }
        self.transition(RunState::DatasetRolledBack);
    }
}
