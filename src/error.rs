//! Dataset-level error types.
//!
//! Every variant of [`LoadError`] is recoverable: the orchestrator catches it
//! at the dataset boundary, rolls the dataset back and moves on. Fatal errors
//! (feed directory, registry file, connection) never reach this type and are
//! reported through `anyhow` at the binary boundary instead.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("File not found: {}", path.display())]
    SourceMissing { path: PathBuf },

    #[error("Cannot read {}: {message}", path.display())]
    SourceUnreadable { path: PathBuf, message: String },

    #[error("Cannot read headers from {}", path.display())]
    HeaderMissing { path: PathBuf },

    #[error("Invalid identifier '{name}': {reason}")]
    InvalidIdentifier { name: String, reason: String },

    #[error("Failed to create staging table {table}: {source}")]
    StagingFailed {
        table: String,
        #[source]
        source: StoreError,
    },

    #[error("Failed to insert lines {first_line}-{last_line} into {table}: {message}")]
    RowBindingFailed {
        table: String,
        first_line: u64,
        last_line: u64,
        message: String,
    },

    #[error("Failed to swap {staging} into {table}: {source}")]
    SwapFailed {
        table: String,
        staging: String,
        #[source]
        source: StoreError,
    },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Import cancelled")]
    Cancelled,
}

/// Coarse classification of a dataset failure, stable enough for the JSON summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    SourceMissing,
    SourceUnreadable,
    HeaderMissing,
    InvalidIdentifier,
    StagingFailed,
    RowBindingFailed,
    SwapFailed,
    Store,
    Cancelled,
}

impl LoadError {
    pub fn kind(&self) -> FailureKind {
        match self {
            LoadError::SourceMissing { .. } => FailureKind::SourceMissing,
            LoadError::SourceUnreadable { .. } => FailureKind::SourceUnreadable,
            LoadError::HeaderMissing { .. } => FailureKind::HeaderMissing,
            LoadError::InvalidIdentifier { .. } => FailureKind::InvalidIdentifier,
            LoadError::StagingFailed { .. } => FailureKind::StagingFailed,
            LoadError::RowBindingFailed { .. } => FailureKind::RowBindingFailed,
            LoadError::SwapFailed { .. } => FailureKind::SwapFailed,
            LoadError::Store(_) => FailureKind::Store,
            LoadError::Cancelled => FailureKind::Cancelled,
        }
    }

    pub(crate) fn unreadable(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        LoadError::SourceUnreadable {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub(crate) fn invalid_identifier(name: impl Into<String>, reason: impl Into<String>) -> Self {
        LoadError::InvalidIdentifier {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

pub type LoadResult<T> = std::result::Result<T, LoadError>;
