//! Lazy creation of bare repositories on first access.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};

/// Serializes first-access initialization per repository path.
///
/// Within a process the per-path lock makes the check-then-create sequence
/// atomic. Across processes the repository is built in a staging directory
/// next to its final location and renamed into place, so a losing racer
/// discards its copy instead of touching the winner's.
#[derive(Debug, Default)]
pub struct RepoInitializer {
    locks: Mutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>,
}

impl RepoInitializer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a bare repository at `path` unless one exists.
    /// Returns `true` only for the call that created it.
    pub async fn ensure_initialized(&self, path: &Path) -> Result<bool> {
        if tokio::fs::try_exists(path).await.unwrap_or(false) {
            return Ok(false);
        }

        let lock = self.lock_for(path);
        let outcome = {
            let _guard = lock.lock().await;
            if tokio::fs::try_exists(path).await.unwrap_or(false) {
                Ok(false)
            } else {
                let target = path.to_path_buf();
                tokio::task::spawn_blocking(move || init_bare_atomically(&target))
                    .await
                    .context("repository init task panicked")
                    .and_then(|res| res)
            }
        };
        drop(lock);
        self.release(path);

        let created = outcome?;

        if created {
            tracing::info!(path = %path.display(), "initialized bare repository");
        }
        Ok(created)
    }

    fn lock_for(&self, path: &Path) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        locks.entry(path.to_path_buf()).or_default().clone()
    }

    fn release(&self, path: &Path) {
        let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        // Waiters still holding a clone re-check the path under their own guard.
        if let Some(lock) = locks.get(path) {
            if Arc::strong_count(lock) == 1 {
                locks.remove(path);
            }
        }
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.locks.lock().map(|l| l.len()).unwrap_or(0)
    }
}

fn init_bare_atomically(path: &Path) -> Result<bool> {
    let parent = path
        .parent()
        .with_context(|| format!("repository path has no parent: {}", path.display()))?;
    std::fs::create_dir_all(parent)
        .with_context(|| format!("failed to create {}", parent.display()))?;

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("invalid repository path: {}", path.display()))?;
    let staging = parent.join(format!(".{file_name}.init-{:016x}", rand::random::<u64>()));

    if let Err(err) = gix::init_bare(&staging) {
        let _ = std::fs::remove_dir_all(&staging);
        return Err(err).with_context(|| format!("git init --bare {}", staging.display()));
    }

    match std::fs::rename(&staging, path) {
        Ok(()) => Ok(true),
        Err(_) if path.exists() => {
            let _ = std::fs::remove_dir_all(&staging);
            Ok(false)
        }
        Err(err) => {
            let _ = std::fs::remove_dir_all(&staging);
            Err(err).with_context(|| format!("failed to move repository into {}", path.display()))
        }
    }
}
