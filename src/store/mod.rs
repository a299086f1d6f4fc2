//! Relational store abstraction used by the import pipeline.
//!
//! The pipeline is single-threaded and sequential, so [`Store`] is a plain
//! blocking trait over one connection. Backends only supply primitives
//! (statement execution, transactions, existence checks, renames); SQL
//! assembly for staging tables and inserts stays in the pipeline modules.
//!
//! Backends:
//!
//! - [`SqliteStore`]: embedded `rusqlite` database file, always available.
//! - `MySqlStore`: `mysql_async` driven by a current-thread runtime, behind the
//!   `mysql` cargo feature.

mod sqlite;
#[cfg(feature = "mysql")]
mod mysql;
#[cfg(test)]
pub(crate) mod testing;

use std::path::PathBuf;

use clap::ValueEnum;
use itertools::Itertools;
use thiserror::Error;

use crate::{identifier::Identifier, registry::StorageType};

pub use sqlite::SqliteStore;
#[cfg(feature = "mysql")]
pub use mysql::MySqlStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[cfg(feature = "mysql")]
    #[error("MySQL error: {0}")]
    MySql(#[from] mysql_async::Error),

    #[cfg(feature = "mysql")]
    #[error("Cannot start async runtime: {0}")]
    Runtime(#[source] std::io::Error),

    #[cfg(feature = "mysql")]
    #[error("Connection is closed")]
    Closed,

    #[error("{0}")]
    Unsupported(String),
}

impl StoreError {
    /// Whether retrying the same statement can reasonably succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Sqlite(rusqlite::Error::SqliteFailure(err, _)) => matches!(
                err.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ),
            #[cfg(feature = "mysql")]
            StoreError::MySql(err) => mysql::is_transient(err),
            _ => false,
        }
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// Embedded SQLite database file
    Sqlite,
    /// MySQL / MariaDB server
    #[value(name = "mysql")]
    MySql,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Sqlite => "sqlite",
            Backend::MySql => "mysql",
        }
    }

    /// `mysql` when compiled in, `sqlite` otherwise.
    pub fn default_for_build() -> Self {
        if cfg!(feature = "mysql") {
            Backend::MySql
        } else {
            Backend::Sqlite
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl ConnectionConfig {
    /// SQLite file for this config: `database` as a path, `.db` appended when
    /// it has no extension.
    pub fn sqlite_path(&self) -> PathBuf {
        let path = PathBuf::from(&self.database);
        if path.extension().is_some() {
            path
        } else {
            path.with_extension("db")
        }
    }

    /// Connection target without the credential, for logs.
    pub fn describe(&self, backend: Backend) -> String {
        match backend {
            Backend::Sqlite => format!("sqlite:{}", self.sqlite_path().display()),
            Backend::MySql => format!(
                "mysql:{}@{}:{}/{}",
                self.user, self.host, self.port, self.database
            ),
        }
    }
}

pub fn connect(backend: Backend, config: &ConnectionConfig) -> StoreResult<Box<dyn Store>> {
    match backend {
        Backend::Sqlite => Ok(Box::new(SqliteStore::open(&config.sqlite_path())?)),
        #[cfg(feature = "mysql")]
        Backend::MySql => Ok(Box::new(MySqlStore::connect(config)?)),
        #[cfg(not(feature = "mysql"))]
        Backend::MySql => Err(StoreError::Unsupported(
            "this build does not include the MySQL backend (rebuild with --features mysql)"
                .to_string(),
        )),
    }
}

pub trait Store {
    fn backend(&self) -> Backend;

    /// Quotes an already validated identifier for this dialect.
    fn quote(&self, ident: &Identifier) -> String;

    /// Largest number of bound parameters one statement may carry.
    fn max_bind_parameters(&self) -> usize;

    /// Trailing `CREATE TABLE` options (engine, charset).
    fn table_options(&self) -> &'static str {
        ""
    }

    fn execute(&mut self, sql: &str) -> StoreResult<()>;

    /// Runs `sql` with positional text/NULL parameters and returns affected rows.
    fn execute_with_params(&mut self, sql: &str, params: &[Option<String>]) -> StoreResult<u64>;

    fn table_exists(&mut self, table: &Identifier) -> StoreResult<bool>;

    fn begin(&mut self) -> StoreResult<()>;

    fn commit(&mut self) -> StoreResult<()>;

    fn rollback(&mut self) -> StoreResult<()>;

    fn set_referential_integrity(&mut self, enabled: bool) -> StoreResult<()>;

    /// Applies every `(from, to)` rename as one atomic step where the backend
    /// allows it.
    fn rename_tables(&mut self, renames: &[(Identifier, Identifier)]) -> StoreResult<()>;

    fn row_count(&mut self, table: &Identifier) -> StoreResult<u64>;

    fn drop_table_if_exists(&mut self, table: &Identifier) -> StoreResult<()> {
        let sql = format!("DROP TABLE IF EXISTS {}", self.quote(table));
        self.execute(&sql)
    }

    fn create_table(
        &mut self,
        table: &Identifier,
        columns: &[(Identifier, StorageType)],
    ) -> StoreResult<()> {
        let column_sql = columns
            .iter()
            .map(|(name, ty)| format!("{} {}", self.quote(name), ty.sql()))
            .join(", ");
        let options = self.table_options();
        let sql = if options.is_empty() {
            format!("CREATE TABLE {} ({column_sql})", self.quote(table))
        } else {
            format!("CREATE TABLE {} ({column_sql}) {options}", self.quote(table))
        };
        self.execute(&sql)
    }
}
