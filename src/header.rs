//! Header reader: extracts and sanitizes the first record of a feed file.

use std::path::Path;

use encoding_rs::Encoding;

use crate::{
    error::{LoadError, LoadResult},
    io_utils,
};

/// Reads only the first record of `path` and returns its cleaned field names.
///
/// A leading byte-order mark is removed from the first field, and every field
/// is trimmed of whitespace and quote characters.
pub fn read_header(path: &Path, encoding: &'static Encoding) -> LoadResult<Vec<String>> {
    let mut reader = io_utils::open_feed_reader(path)?;
    let mut record = csv::ByteRecord::new();
    let found = reader
        .read_byte_record(&mut record)
        .map_err(|err| LoadError::unreadable(path, err))?;
    if !found {
        return Err(LoadError::HeaderMissing {
            path: path.to_path_buf(),
        });
    }
    let fields = io_utils::decode_record(&record, encoding, path)?;
    Ok(fields
        .iter()
        .enumerate()
        .map(|(idx, field)| {
            let field = if idx == 0 {
                io_utils::strip_bom(field)
            } else {
                field.as_str()
            };
            io_utils::clean_field(field).to_string()
        })
        .collect())
}
