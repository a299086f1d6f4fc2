//! Run-wide import settings, built once at startup and passed explicitly.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use encoding_rs::{Encoding, UTF_8};

use crate::retry::RetryPolicy;

pub const DEFAULT_BATCH_SIZE: usize = 1000;
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 10_000;

#[derive(Debug, Clone)]
pub struct ImportOptions {
    pub batch_size: usize,
    /// Emit a progress line every time this many more rows have been loaded.
    pub progress_interval: u64,
    pub encoding: &'static Encoding,
    pub retry: RetryPolicy,
    pub cancel: CancellationToken,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            encoding: UTF_8,
            retry: RetryPolicy::default(),
            cancel: CancellationToken::new(),
        }
    }
}

/// Cooperative cancellation flag checked between batches and between datasets.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
