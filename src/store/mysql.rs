//! MySQL / MariaDB backend.
//!
//! The pipeline is blocking, so the async `mysql_async` connection is driven by
//! a private current-thread runtime. MySQL commits implicitly around DDL, which
//! is why the swap relies on one multi-table `RENAME TABLE` statement for
//! atomicity instead of on the dataset transaction.

use log::debug;
use mysql_async::prelude::*;
use mysql_async::{Conn, OptsBuilder, Value};
use tokio::runtime::{Builder, Runtime};

use super::{Backend, ConnectionConfig, Store, StoreError, StoreResult};
use crate::identifier::{Identifier, quote_backtick};

const MYSQL_MAX_PLACEHOLDERS: usize = 65_535;
const ER_LOCK_WAIT_TIMEOUT: u16 = 1205;
const ER_LOCK_DEADLOCK: u16 = 1213;

pub(super) fn is_transient(err: &mysql_async::Error) -> bool {
    match err {
        mysql_async::Error::Server(server) => {
            matches!(server.code, ER_LOCK_WAIT_TIMEOUT | ER_LOCK_DEADLOCK)
        }
        mysql_async::Error::Io(_) => true,
        _ => false,
    }
}

pub struct MySqlStore {
    runtime: Runtime,
    conn: Option<Conn>,
}

impl MySqlStore {
    pub fn connect(config: &ConnectionConfig) -> StoreResult<Self> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(StoreError::Runtime)?;
        let opts = OptsBuilder::default()
            .ip_or_hostname(config.host.clone())
            .tcp_port(config.port)
            .user(Some(config.user.clone()))
            .pass(Some(config.password.clone()))
            .db_name(Some(config.database.clone()))
            .init(vec!["SET NAMES utf8mb4"]);
        let conn = runtime.block_on(Conn::new(opts))?;
        debug!("MySQL session opened for {}", config.describe(Backend::MySql));
        Ok(Self {
            runtime,
            conn: Some(conn),
        })
    }

    fn query_drop(&mut self, sql: &str) -> StoreResult<()> {
        let conn = self.conn.as_mut().ok_or(StoreError::Closed)?;
        self.runtime.block_on(conn.query_drop(sql))?;
        Ok(())
    }
}

impl Drop for MySqlStore {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            if let Err(err) = self.runtime.block_on(conn.disconnect()) {
                debug!("MySQL disconnect failed: {err}");
            }
        }
    }
}

impl Store for MySqlStore {
    fn backend(&self) -> Backend {
        Backend::MySql
    }

    fn quote(&self, ident: &Identifier) -> String {
        quote_backtick(ident)
    }

    fn max_bind_parameters(&self) -> usize {
        MYSQL_MAX_PLACEHOLDERS
    }

    fn table_options(&self) -> &'static str {
        "ENGINE=InnoDB DEFAULT CHARSET=utf8mb4"
    }

    fn execute(&mut self, sql: &str) -> StoreResult<()> {
        self.query_drop(sql)
    }

    fn execute_with_params(&mut self, sql: &str, params: &[Option<String>]) -> StoreResult<u64> {
        let values: Vec<Value> = params
            .iter()
            .map(|param| match param {
                Some(text) => Value::Bytes(text.as_bytes().to_vec()),
                None => Value::NULL,
            })
            .collect();
        let conn = self.conn.as_mut().ok_or(StoreError::Closed)?;
        self.runtime.block_on(conn.exec_drop(sql, values))?;
        Ok(conn.affected_rows())
    }

    fn table_exists(&mut self, table: &Identifier) -> StoreResult<bool> {
        let conn = self.conn.as_mut().ok_or(StoreError::Closed)?;
        let count: Option<i64> = self.runtime.block_on(conn.exec_first(
            "SELECT COUNT(*) FROM information_schema.TABLES \
             WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?",
            (table.as_str(),),
        ))?;
        Ok(count.unwrap_or(0) > 0)
    }

    fn begin(&mut self) -> StoreResult<()> {
        self.query_drop("START TRANSACTION")
    }

    fn commit(&mut self) -> StoreResult<()> {
        self.query_drop("COMMIT")
    }

    fn rollback(&mut self) -> StoreResult<()> {
        self.query_drop("ROLLBACK")
    }

    fn set_referential_integrity(&mut self, enabled: bool) -> StoreResult<()> {
        let value = if enabled { 1 } else { 0 };
        self.query_drop(&format!("SET FOREIGN_KEY_CHECKS = {value}"))
    }

    fn rename_tables(&mut self, renames: &[(Identifier, Identifier)]) -> StoreResult<()> {
        if renames.is_empty() {
            return Ok(());
        }
        let pairs: Vec<String> = renames
            .iter()
            .map(|(from, to)| format!("{} TO {}", quote_backtick(from), quote_backtick(to)))
            .collect();
        self.query_drop(&format!("RENAME TABLE {}", pairs.join(", ")))
    }

    fn row_count(&mut self, table: &Identifier) -> StoreResult<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_backtick(table));
        let conn = self.conn.as_mut().ok_or(StoreError::Closed)?;
        let count: Option<u64> = self.runtime.block_on(conn.query_first(sql))?;
        Ok(count.unwrap_or(0))
    }
}
