use crate::domain::layout;
use crate::domain::ports::Adapter;
use crate::utils::error::{Result, StorageError};
use chrono::Utc;

const MAX_SAME_STAMP_GENERATIONS: u32 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackupPolicy {
    pub enabled: bool,
    /// Generations kept per key; `None` keeps every generation.
    pub retention: Option<usize>,
}

impl BackupPolicy {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            retention: None,
        }
    }
}

/// Writes `previous`, the payload about to be replaced at `key`, to a fresh
/// backup key on the master.
pub(crate) async fn rotate(master: &dyn Adapter, key: &str, previous: &[u8]) -> Result<String> {
    let backup = free_backup_key(master, key).await?;
    master.write(&backup, previous).await?;
    tracing::debug!("Backed up {} to {}", key, backup);
    Ok(backup)
}

async fn free_backup_key(master: &dyn Adapter, key: &str) -> Result<String> {
    let at = Utc::now();
    let candidate = layout::backup_key(key, at);
    if !master.exists(&candidate).await? {
        return Ok(candidate);
    }

    for counter in 1..=MAX_SAME_STAMP_GENERATIONS {
        let candidate = layout::backup_key_with_counter(key, at, counter);
        if !master.exists(&candidate).await? {
            return Ok(candidate);
        }
    }

    Err(StorageError::BackupError {
        key: key.to_string(),
        message: "no free backup name for this timestamp".to_string(),
    })
}

/// Backup generations of `key` on the master, oldest first.
pub(crate) async fn list_backups(master: &dyn Adapter, key: &str) -> Result<Vec<String>> {
    let mut backups: Vec<String> = master
        .list(layout::parent_prefix(key))
        .await?
        .into_iter()
        .filter(|candidate| layout::is_backup_of(key, candidate))
        .collect();
    backups.sort_by(|a, b| {
        layout::backup_generation(key, a).cmp(&layout::backup_generation(key, b))
    });
    Ok(backups)
}

/// Deletes the oldest generations beyond `retention`. Returns the deleted keys
/// and the deletions that failed.
pub(crate) async fn prune(
    master: &dyn Adapter,
    key: &str,
    retention: usize,
) -> Result<(Vec<String>, Vec<StorageError>)> {
    let backups = list_backups(master, key).await?;
    let excess = backups.len().saturating_sub(retention);

    let mut deleted = Vec::new();
    let mut errors = Vec::new();
    for backup in backups.into_iter().take(excess) {
        match master.delete(&backup).await {
            Ok(()) => deleted.push(backup),
            Err(e) => errors.push(e),
        }
    }

    if !deleted.is_empty() {
        tracing::debug!("Pruned {} old backup(s) of {}", deleted.len(), key);
    }
    Ok((deleted, errors))
}
