//! Embedded SQLite backend.
//!
//! SQLite DDL is transactional, so renames issued inside the dataset
//! transaction become visible to other connections all at once on commit.
//! `legacy_alter_table` keeps views that name a primary table pointing at the
//! name rather than following it into the backup slot.

use std::{path::Path, time::Duration};

use log::debug;
use rusqlite::{Connection, params_from_iter};

use super::{Backend, Store, StoreResult};
use crate::identifier::{Identifier, quote_double};

/// Default `SQLITE_MAX_VARIABLE_NUMBER` of the bundled library.
const SQLITE_MAX_VARIABLES: usize = 32_766;
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &Path) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        debug!("Opened SQLite database {:?}", path);
        Self::configure(conn)
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        Self::configure(Connection::open_in_memory()?)
    }

    fn configure(conn: Connection) -> StoreResult<Self> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch("PRAGMA legacy_alter_table = ON")?;
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl Store for SqliteStore {
    fn backend(&self) -> Backend {
        Backend::Sqlite
    }

    fn quote(&self, ident: &Identifier) -> String {
        quote_double(ident)
    }

    fn max_bind_parameters(&self) -> usize {
        SQLITE_MAX_VARIABLES
    }

    fn execute(&mut self, sql: &str) -> StoreResult<()> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    fn execute_with_params(&mut self, sql: &str, params: &[Option<String>]) -> StoreResult<u64> {
        let mut stmt = self.conn.prepare_cached(sql)?;
        let affected = stmt.execute(params_from_iter(params.iter()))?;
        Ok(affected as u64)
    }

    fn table_exists(&mut self, table: &Identifier) -> StoreResult<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [table.as_str()],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn begin(&mut self) -> StoreResult<()> {
        self.conn.execute_batch("BEGIN")?;
        Ok(())
    }

    fn commit(&mut self) -> StoreResult<()> {
        self.conn.execute_batch("COMMIT")?;
        Ok(())
    }

    fn rollback(&mut self) -> StoreResult<()> {
        if !self.conn.is_autocommit() {
            self.conn.execute_batch("ROLLBACK")?;
        }
        Ok(())
    }

    fn set_referential_integrity(&mut self, enabled: bool) -> StoreResult<()> {
        let value = if enabled { "ON" } else { "OFF" };
        self.conn
            .execute_batch(&format!("PRAGMA foreign_keys = {value}"))?;
        Ok(())
    }

    fn rename_tables(&mut self, renames: &[(Identifier, Identifier)]) -> StoreResult<()> {
        // Sequential renames; callers hold the dataset transaction, which makes
        // the group atomic for every other connection.
        for (from, to) in renames {
            let sql = format!(
                "ALTER TABLE {} RENAME TO {}",
                quote_double(from),
                quote_double(to)
            );
            self.conn.execute_batch(&sql)?;
        }
        Ok(())
    }

    fn row_count(&mut self, table: &Identifier) -> StoreResult<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_double(table));
        let count: i64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count as u64)
    }
}
