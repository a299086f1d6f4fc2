//! Swap coordinator: promotes a populated staging table into primary position.
//!
//! Sequence for dataset `t`:
//!
//! 1. primary exists: drop stale `t_backup`, then rename `t → t_backup` and
//!    `t_staging → t` in one [`Store::rename_tables`] call;
//! 2. no primary yet: rename `t_staging → t`;
//! 3. drop `t_backup` if step 1 created it.
//!
//! Readers see either the old or the new complete table. On MySQL both
//! renames are one `RENAME TABLE` statement; on SQLite they run inside the
//! dataset transaction. Steps are retried individually on transient errors;
//! a persistent failure is surfaced, not repaired.

use log::info;

use crate::{
    error::{LoadError, LoadResult},
    identifier::Identifier,
    retry::RetryPolicy,
    store::{Store, StoreResult},
};

pub const BACKUP_SUFFIX: &str = "_backup";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapOutcome {
    /// No primary existed; staging was renamed into place.
    Created,
    /// A previous primary was replaced and its backup dropped.
    Replaced,
}

pub fn backup_name(table: &Identifier) -> LoadResult<Identifier> {
    table.with_suffix(BACKUP_SUFFIX)
}

/// Renames whatever part of the swap is still outstanding.
///
/// When `resuming` after a failed attempt, a missing staging table means the
/// renames already went through, and a missing primary means only
/// `staging -> primary` is left.
fn rename_into_place(
    store: &mut dyn Store,
    primary: &Identifier,
    staging: &Identifier,
    backup: &Identifier,
    resuming: bool,
) -> StoreResult<()> {
    if resuming && !store.table_exists(staging)? {
        return Ok(());
    }
    if store.table_exists(primary)? {
        store.rename_tables(&[
            (primary.clone(), backup.clone()),
            (staging.clone(), primary.clone()),
        ])
    } else {
        store.rename_tables(&[(staging.clone(), primary.clone())])
    }
}

pub fn promote(
    store: &mut dyn Store,
    primary: &Identifier,
    staging: &Identifier,
    retry: &RetryPolicy,
) -> LoadResult<SwapOutcome> {
    let backup = backup_name(primary)?;
    let swap_failed = |source| LoadError::SwapFailed {
        table: primary.to_string(),
        staging: staging.to_string(),
        source,
    };

    // Each step is retried on its own; no step repeats one that already succeeded.
    let replacing = retry
        .run(&format!("existence check of {primary}"), || {
            store.table_exists(primary)
        })
        .map_err(swap_failed)?;
    if replacing {
        retry
            .run(&format!("drop of stale {backup}"), || {
                store.drop_table_if_exists(&backup)
            })
            .map_err(swap_failed)?;
    }
    let mut attempted = false;
    retry
        .run(&format!("swap of {primary}"), || {
            let resuming = std::mem::replace(&mut attempted, true);
            rename_into_place(store, primary, staging, &backup, resuming)
        })
        .map_err(swap_failed)?;
    if replacing {
        retry
            .run(&format!("drop of {backup}"), || {
                store.drop_table_if_exists(&backup)
            })
            .map_err(swap_failed)?;
    }

    info!("Swapped tables: {staging} -> {primary}");
    Ok(if replacing {
        SwapOutcome::Replaced
    } else {
        SwapOutcome::Created
    })
}
