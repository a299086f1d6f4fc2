//! Feed file reader construction and field decoding.
//!
//! Every feed read flows through this module. Readers are built with
//! `has_headers(false)` so the header is just the first record and the
//! header reader and row stream share one parsing path. `flexible(true)` lets
//! short rows through to normalization instead of failing in the parser.

use std::{fs::File, io::BufReader, path::Path};

use anyhow::{Result, anyhow};
use encoding_rs::{Encoding, UTF_8};

use crate::error::{LoadError, LoadResult};

pub const FEED_DELIMITER: u8 = b',';

const BYTE_ORDER_MARK: char = '\u{feff}';

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    if let Some(value) = label {
        Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
    } else {
        Ok(UTF_8)
    }
}

pub fn open_feed_reader(path: &Path) -> LoadResult<csv::Reader<BufReader<File>>> {
    let file = File::open(path).map_err(|err| LoadError::unreadable(path, err))?;
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(false)
        .delimiter(FEED_DELIMITER)
        .double_quote(true)
        .flexible(true);
    Ok(builder.from_reader(BufReader::new(file)))
}

/// Decodes one field with exactly `encoding`. A byte order mark is data here;
/// only the header's first field has one removed.
pub fn decode_field(bytes: &[u8], encoding: &'static Encoding) -> Option<String> {
    let (text, had_errors) = encoding.decode_without_bom_handling(bytes);
    if had_errors {
        None
    } else {
        Some(text.into_owned())
    }
}

pub fn decode_record(
    record: &csv::ByteRecord,
    encoding: &'static Encoding,
    path: &Path,
) -> LoadResult<Vec<String>> {
    record
        .iter()
        .map(|field| {
            decode_field(field, encoding).ok_or_else(|| {
                let line = record.position().map(|pos| pos.line()).unwrap_or_default();
                LoadError::unreadable(
                    path,
                    format!("line {line} is not valid {}", encoding.name()),
                )
            })
        })
        .collect()
}

/// Trims whitespace and stray quote characters around a field.
pub fn clean_field(value: &str) -> &str {
    value.trim_matches(|c| matches!(c, ' ' | '\t' | '\n' | '\r' | '\0' | '\x0B' | '"'))
}

pub fn strip_bom(value: &str) -> &str {
    value.strip_prefix(BYTE_ORDER_MARK).unwrap_or(value)
}
