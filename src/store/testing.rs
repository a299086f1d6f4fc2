//! In-crate test double: a [`SqliteStore`] that records every trait call and
//! can fail the n-th call of one method with `SQLITE_BUSY`.

use super::{Backend, SqliteStore, Store, StoreError, StoreResult};
use crate::{identifier::Identifier, registry::StorageType};

pub(crate) fn busy() -> StoreError {
    StoreError::Sqlite(rusqlite::Error::SqliteFailure(
        rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
        None,
    ))
}

pub(crate) struct RecordingStore {
    pub inner: SqliteStore,
    pub calls: Vec<String>,
    fail: Option<(&'static str, usize)>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self {
            inner: SqliteStore::open_in_memory().unwrap(),
            calls: Vec::new(),
            fail: None,
        }
    }

    /// Fails the `nth` (1-based) call to `method` once with a busy error.
    pub fn fail_once(mut self, method: &'static str, nth: usize) -> Self {
        self.fail = Some((method, nth));
        self
    }

    fn record(&mut self, method: &'static str, call: String) -> StoreResult<()> {
        self.calls.push(call);
        if let Some((target, nth)) = self.fail {
            if target == method {
                let seen = self
                    .calls
                    .iter()
                    .filter(|c| c.starts_with(&format!("{method}(")))
                    .count();
                if seen == nth {
                    self.fail = None;
                    return Err(busy());
                }
            }
        }
        Ok(())
    }

    /// Recorded calls whose text starts with `prefix`.
    pub fn calls_to(&self, prefix: &str) -> Vec<&str> {
        self.calls
            .iter()
            .filter(|c| c.starts_with(prefix))
            .map(String::as_str)
            .collect()
    }
}

impl Store for RecordingStore {
    fn backend(&self) -> Backend {
        self.inner.backend()
    }

    fn quote(&self, ident: &Identifier) -> String {
        self.inner.quote(ident)
    }

    fn max_bind_parameters(&self) -> usize {
        self.inner.max_bind_parameters()
    }

    fn execute(&mut self, sql: &str) -> StoreResult<()> {
        self.record("execute", format!("execute({sql})"))?;
        self.inner.execute(sql)
    }

    fn execute_with_params(&mut self, sql: &str, params: &[Option<String>]) -> StoreResult<u64> {
        self.record("execute_with_params", "execute_with_params()".to_string())?;
        self.inner.execute_with_params(sql, params)
    }

    fn table_exists(&mut self, table: &Identifier) -> StoreResult<bool> {
        self.record("table_exists", format!("table_exists({table})"))?;
        self.inner.table_exists(table)
    }

    fn begin(&mut self) -> StoreResult<()> {
        self.record("begin", "begin()".to_string())?;
        self.inner.begin()
    }

    fn commit(&mut self) -> StoreResult<()> {
        self.record("commit", "commit()".to_string())?;
        self.inner.commit()
    }

    fn rollback(&mut self) -> StoreResult<()> {
        self.record("rollback", "rollback()".to_string())?;
        self.inner.rollback()
    }

    fn set_referential_integrity(&mut self, enabled: bool) -> StoreResult<()> {
        self.record(
            "set_referential_integrity",
            format!("set_referential_integrity({enabled})"),
        )?;
        self.inner.set_referential_integrity(enabled)
    }

    fn rename_tables(&mut self, renames: &[(Identifier, Identifier)]) -> StoreResult<()> {
        let pairs = renames
            .iter()
            .map(|(from, to)| format!("{from}->{to}"))
            .collect::<Vec<_>>()
            .join(", ");
        self.record("rename_tables", format!("rename_tables({pairs})"))?;
        self.inner.rename_tables(renames)
    }

    fn row_count(&mut self, table: &Identifier) -> StoreResult<u64> {
        self.inner.row_count(table)
    }

    fn drop_table_if_exists(&mut self, table: &Identifier) -> StoreResult<()> {
        self.record("drop_table_if_exists", format!("drop_table_if_exists({table})"))?;
        self.inner.drop_table_if_exists(table)
    }

    fn create_table(
        &mut self,
        table: &Identifier,
        columns: &[(Identifier, StorageType)],
    ) -> StoreResult<()> {
        self.record("create_table", format!("create_table({table})"))?;
        self.inner.create_table(table, columns)
    }
}
