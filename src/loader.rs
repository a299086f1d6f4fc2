//! Staging loader: materializes `<dataset>_staging` and fills it in batches.
//!
//! Rows arrive from a [`RowStream`] one at a time and are grouped into
//! batches of `batch_size` rows (capped by the backend's bind-parameter
//! limit). Each batch becomes one parameterized multi-row `INSERT`, with every
//! value bound as text or NULL so the store applies its own type coercion.

use std::path::Path;

use itertools::Itertools;
use log::{debug, info};

use crate::{
    error::{LoadError, LoadResult},
    identifier::{Identifier, parse_column_list},
    options::ImportOptions,
    registry::DatasetSpec,
    rows::{Row, RowStream},
    schema::ColumnDefinition,
    store::Store,
};

pub const STAGING_SUFFIX: &str = "_staging";

pub fn staging_name(table: &Identifier) -> LoadResult<Identifier> {
    table.with_suffix(STAGING_SUFFIX)
}

/// An empty or partially filled staging table owned by one import.
#[derive(Debug, Clone)]
pub struct StagingTable {
    pub name: Identifier,
    pub columns: Vec<Identifier>,
}

/// Drops any stale staging table left by an aborted run and creates a fresh one.
pub fn create_staging(
    store: &mut dyn Store,
    dataset: &DatasetSpec,
    columns: &[ColumnDefinition],
) -> LoadResult<StagingTable> {
    let idents = parse_column_list(columns.iter().map(|c| c.name.as_str()))?;
    let name = staging_name(dataset.table())?;
    let definitions: Vec<(Identifier, _)> = idents
        .iter()
        .cloned()
        .zip(columns.iter().map(|c| c.storage_type))
        .collect();

    let staging_failed = |source| LoadError::StagingFailed {
        table: name.to_string(),
        source,
    };
    store.drop_table_if_exists(&name).map_err(staging_failed)?;
    store
        .create_table(&name, &definitions)
        .map_err(staging_failed)?;
    info!("Created staging table: {name}");
    Ok(StagingTable {
        name,
        columns: idents,
    })
}

/// Number of rows per `INSERT`, never exceeding the bind-parameter limit.
pub fn effective_batch_size(requested: usize, column_count: usize, max_params: usize) -> usize {
    let by_params = max_params / column_count.max(1);
    requested.max(1).min(by_params).max(1)
}

struct BatchWriter<'a> {
    store: &'a mut dyn Store,
    staging: &'a StagingTable,
    options: &'a ImportOptions,
    insert_prefix: String,
    row_placeholders: String,
    full_batch_sql: Option<String>,
    batch_size: usize,
}

impl<'a> BatchWriter<'a> {
    fn new(store: &'a mut dyn Store, staging: &'a StagingTable, options: &'a ImportOptions) -> Self {
        let column_sql = staging.columns.iter().map(|c| store.quote(c)).join(", ");
        let insert_prefix = format!(
            "INSERT INTO {} ({column_sql}) VALUES ",
            store.quote(&staging.name)
        );
        let row_placeholders = format!("({})", vec!["?"; staging.columns.len()].join(", "));
        let batch_size = effective_batch_size(
            options.batch_size,
            staging.columns.len(),
            store.max_bind_parameters(),
        );
        if batch_size < options.batch_size {
            debug!(
                "Batch size for {} capped at {batch_size} row(s) by the bind-parameter limit",
                staging.name
            );
        }
        Self {
            store,
            staging,
            options,
            insert_prefix,
            row_placeholders,
            full_batch_sql: None,
            batch_size,
        }
    }

    fn insert_sql(&mut self, rows: usize) -> String {
        let build = |prefix: &str, placeholders: &str| {
            let mut sql = String::with_capacity(prefix.len() + rows * (placeholders.len() + 2));
            sql.push_str(prefix);
            sql.push_str(&std::iter::repeat_n(placeholders, rows).join(", "));
            sql
        };
        if rows == self.batch_size {
            self.full_batch_sql
                .get_or_insert_with(|| build(&self.insert_prefix, &self.row_placeholders))
                .clone()
        } else {
            build(&self.insert_prefix, &self.row_placeholders)
        }
    }

    fn flush(&mut self, batch: &mut Vec<Row>) -> LoadResult<u64> {
        if batch.is_empty() {
            return Ok(0);
        }
        if self.options.cancel.is_cancelled() {
            return Err(LoadError::Cancelled);
        }
        let first_line = batch.first().map(|row| row.line).unwrap_or_default();
        let last_line = batch.last().map(|row| row.line).unwrap_or_default();
        let row_count = batch.len() as u64;
        let sql = self.insert_sql(batch.len());
        let params: Vec<Option<String>> = batch.drain(..).flat_map(|row| row.values).collect();

        let label = format!("batch insert into {}", self.staging.name);
        let store = &mut *self.store;
        self.options
            .retry
            .run(&label, || store.execute_with_params(&sql, &params))
            .map_err(|err| LoadError::RowBindingFailed {
                table: self.staging.name.to_string(),
                first_line,
                last_line,
                message: err.to_string(),
            })?;
        Ok(row_count)
    }
}

/// Streams `rows` into `staging` and returns the number of rows inserted.
pub fn load_rows<I>(
    store: &mut dyn Store,
    staging: &StagingTable,
    rows: I,
    options: &ImportOptions,
) -> LoadResult<u64>
where
    I: IntoIterator<Item = LoadResult<Row>>,
{
    let mut writer = BatchWriter::new(store, staging, options);
    let interval = options.progress_interval.max(1);
    let mut batch = Vec::with_capacity(writer.batch_size);
    let mut total = 0u64;

    for row in rows {
        batch.push(row?);
        if batch.len() >= writer.batch_size {
            let before = total;
            total += writer.flush(&mut batch)?;
            if total / interval > before / interval {
                info!("  Loaded {total} rows...");
            }
        }
    }
    total += writer.flush(&mut batch)?;

    info!("  Total rows loaded: {total}");
    Ok(total)
}

/// Creates the staging table for `dataset` and fills it from `path`.
pub fn stage_dataset(
    store: &mut dyn Store,
    dataset: &DatasetSpec,
    columns: &[ColumnDefinition],
    path: &Path,
    options: &ImportOptions,
) -> LoadResult<(StagingTable, u64)> {
    let staging = create_staging(store, dataset, columns)?;
    let rows = RowStream::open(path, columns.len(), options.encoding, staging.name.as_str())?;
    let loaded = load_rows(store, &staging, rows, options)?;
    Ok((staging, loaded))
}
