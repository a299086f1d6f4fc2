//! Forward-only data row stream with structural cleanup.
//!
//! [`RowStream`] reopens the feed file, skips the header record and yields one
//! normalized row at a time; memory use is bounded by a single record no
//! matter how large the file is. Restarting means opening a new stream.

use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use encoding_rs::Encoding;

use crate::{
    error::{LoadError, LoadResult},
    io_utils,
};

/// A normalized data row. `line` is the 1-based line the record starts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub line: u64,
    pub values: Vec<Option<String>>,
}

/// Returned when a record carries more non-empty fields than the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowOverflow {
    pub field_count: usize,
}

/// Cleans a raw record into exactly `width` values.
///
/// Fields that are empty after trimming become `None`. Short records are padded
/// with `None`. Surplus trailing fields are dropped when they are empty and
/// rejected otherwise.
pub fn normalize_row<'a, I>(fields: I, width: usize) -> Result<Vec<Option<String>>, RowOverflow>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut values = Vec::with_capacity(width);
    let mut field_count = 0usize;
    let mut overflow = false;
    for field in fields {
        field_count += 1;
        let cleaned = io_utils::clean_field(field);
        if values.len() < width {
            values.push((!cleaned.is_empty()).then(|| cleaned.to_string()));
        } else if !cleaned.is_empty() {
            overflow = true;
        }
    }
    if overflow {
        return Err(RowOverflow { field_count });
    }
    values.resize(width, None);
    Ok(values)
}

pub struct RowStream {
    reader: csv::Reader<BufReader<File>>,
    record: csv::ByteRecord,
    path: PathBuf,
    table: String,
    encoding: &'static Encoding,
    width: usize,
    done: bool,
}

impl RowStream {
    /// Opens `path` and positions the stream after the header record.
    ///
    /// `table` only labels overflow errors.
    pub fn open(
        path: &Path,
        width: usize,
        encoding: &'static Encoding,
        table: &str,
    ) -> LoadResult<Self> {
        let mut reader = io_utils::open_feed_reader(path)?;
        let mut record = csv::ByteRecord::new();
        let has_header = reader
            .read_byte_record(&mut record)
            .map_err(|err| LoadError::unreadable(path, err))?;
        if !has_header {
            return Err(LoadError::HeaderMissing {
                path: path.to_path_buf(),
            });
        }
        Ok(Self {
            reader,
            record,
            path: path.to_path_buf(),
            table: table.to_string(),
            encoding,
            width,
            done: false,
        })
    }

    fn next_row(&mut self) -> LoadResult<Option<Row>> {
        let found = self
            .reader
            .read_byte_record(&mut self.record)
            .map_err(|err| LoadError::unreadable(&self.path, err))?;
        if !found {
            return Ok(None);
        }
        let line = self
            .record
            .position()
            .map(|pos| pos.line())
            .unwrap_or_default();
        let decoded = io_utils::decode_record(&self.record, self.encoding, &self.path)?;
        let values = normalize_row(decoded.iter().map(String::as_str), self.width).map_err(
            |overflow| LoadError::RowBindingFailed {
                table: self.table.clone(),
                first_line: line,
                last_line: line,
                message: format!(
                    "row has {} fields but the header declares {}",
                    overflow.field_count, self.width
                ),
            },
        )?;
        Ok(Some(Row { line, values }))
    }
}

impl Iterator for RowStream {
    type Item = LoadResult<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_row() {
            Ok(Some(row)) => Some(Ok(row)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}
