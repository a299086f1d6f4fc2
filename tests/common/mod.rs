#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::{Connection, types::Value};
use tempfile::{TempDir, tempdir};

/// Scratch directory holding a feed directory and a SQLite database file.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a fresh scratch directory with an empty `feed/` inside.
    pub fn new() -> Self {
        let temp_dir = tempdir().expect("temp dir");
        fs::create_dir(temp_dir.path().join("feed")).expect("create feed dir");
        Self { temp_dir }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn feed_dir(&self) -> PathBuf {
        self.temp_dir.path().join("feed")
    }

    /// Database file used with `--backend sqlite --database <path>`.
    pub fn db_path(&self) -> PathBuf {
        self.temp_dir.path().join("gtfs.db")
    }

    /// Writes a feed file (e.g. `stops.txt`) and returns its path.
    pub fn write_feed(&self, name: &str, contents: &str) -> PathBuf {
        self.write_feed_bytes(name, contents.as_bytes())
    }

    pub fn write_feed_bytes(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.feed_dir().join(name);
        fs::write(&path, contents).expect("write feed file");
        path
    }

    pub fn remove_feed(&self, name: &str) {
        fs::remove_file(self.feed_dir().join(name)).expect("remove feed file");
    }

    /// Writes a file outside the feed directory (registries, summaries).
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        fs::write(&path, contents).expect("write temp file");
        path
    }

    pub fn open_db(&self) -> Connection {
        Connection::open(self.db_path()).expect("open sqlite db")
    }
}

/// Runs `sql` and returns every row as dynamically typed values.
pub fn query(conn: &Connection, sql: &str) -> Vec<Vec<Value>> {
    let mut stmt = conn.prepare(sql).expect("prepare query");
    let width = stmt.column_count();
    let rows = stmt
        .query_map([], |row| {
            (0..width)
                .map(|idx| row.get::<_, Value>(idx))
                .collect::<Result<Vec<_>, _>>()
        })
        .expect("run query")
        .collect::<Result<Vec<_>, _>>()
        .expect("read rows");
    rows
}

pub fn count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
        .expect("count rows")
}

pub fn table_exists(conn: &Connection, table: &str) -> bool {
    conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [table],
        |row| row.get::<_, i64>(0),
    )
    .expect("query sqlite_master")
        > 0
}

pub fn text(value: &str) -> Value {
    Value::Text(value.to_string())
}
