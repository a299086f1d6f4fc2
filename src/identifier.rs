//! Identifier validation for dynamically built DDL.
//!
//! Table and column names come from feed headers and registry files, so they
//! cannot be trusted. Identifiers cannot be bound as statement parameters;
//! instead every name must pass [`Identifier::parse`] before a backend is
//! allowed to quote it into SQL text. The accepted alphabet is
//! `[A-Za-z_][A-Za-z0-9_]*`, at most [`MAX_IDENTIFIER_LENGTH`] bytes, and not a
//! reserved word in either supported dialect.

use std::{collections::HashSet, fmt, sync::OnceLock};

use regex::Regex;

use crate::error::{LoadError, LoadResult};

/// MySQL caps identifiers at 64 characters; SQLite has no limit.
pub const MAX_IDENTIFIER_LENGTH: usize = 64;

const RESERVED_WORDS: &[&str] = &[
    "add", "all", "alter", "and", "as", "asc", "between", "by", "case", "check", "column",
    "constraint", "create", "cross", "database", "default", "delete", "desc", "distinct", "drop",
    "else", "exists", "foreign", "from", "full", "grant", "group", "having", "in", "index",
    "inner", "insert", "into", "is", "join", "key", "left", "like", "limit", "not", "null", "on",
    "or", "order", "outer", "primary", "references", "rename", "replace", "right", "select",
    "set", "table", "then", "to", "union", "unique", "update", "using", "values", "when",
    "where", "with",
];

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid regex"))
}

fn reserved_words() -> &'static HashSet<&'static str> {
    static WORDS: OnceLock<HashSet<&'static str>> = OnceLock::new();
    WORDS.get_or_init(|| RESERVED_WORDS.iter().copied().collect())
}

/// A table or column name that is safe to embed in quoted DDL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identifier(String);

impl Identifier {
    pub fn parse(name: &str) -> LoadResult<Self> {
        if name.is_empty() {
            return Err(LoadError::invalid_identifier(name, "identifier is empty"));
        }
        if name.len() > MAX_IDENTIFIER_LENGTH {
            return Err(LoadError::invalid_identifier(
                name,
                format!(
                    "identifier exceeds {MAX_IDENTIFIER_LENGTH} bytes (got {})",
                    name.len()
                ),
            ));
        }
        if !identifier_pattern().is_match(name) {
            return Err(LoadError::invalid_identifier(
                name,
                "only ASCII letters, digits and '_' are allowed, and the first character may not be a digit",
            ));
        }
        if reserved_words().contains(name.to_ascii_lowercase().as_str()) {
            return Err(LoadError::invalid_identifier(name, "reserved SQL keyword"));
        }
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Appends `suffix` (e.g. `_staging`) and re-validates the result.
    pub fn with_suffix(&self, suffix: &str) -> LoadResult<Self> {
        Self::parse(&format!("{}{suffix}", self.0))
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Validates every column name and rejects duplicates (case-insensitive, as
/// MySQL compares column names).
pub fn parse_column_list<'a, I>(names: I) -> LoadResult<Vec<Identifier>>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = HashSet::new();
    let mut parsed = Vec::new();
    for name in names {
        let ident = Identifier::parse(name)?;
        if !seen.insert(name.to_ascii_lowercase()) {
            return Err(LoadError::invalid_identifier(name, "duplicate column name"));
        }
        parsed.push(ident);
    }
    Ok(parsed)
}

pub fn quote_backtick(ident: &Identifier) -> String {
    format!("`{}`", ident.as_str())
}

pub fn quote_double(ident: &Identifier) -> String {
    format!("\"{}\"", ident.as_str())
}
