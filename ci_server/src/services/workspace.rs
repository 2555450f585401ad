//! Working copies: one directory per repository, named by the SHA-256 of its full name.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use sha2::{Digest, Sha256};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Debug)]
pub struct WorkspaceManager {
    root: PathBuf,
    locks: Mutex<HashMap<PathBuf, Arc<AsyncMutex<()>>>>,
}

impl WorkspaceManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Working copy location for a repository full name.
    pub fn path_for(&self, repository_full_name: &str) -> PathBuf {
        let hash = Sha256::digest(repository_full_name.as_bytes());
        self.root.join(hex::encode(hash))
    }

    /// Exclusive access to a working copy for the duration of one pipeline run.
    ///
    /// Entries nobody holds or waits on are pruned, so the map only tracks
    /// working copies with a run in flight.
    pub async fn lock(&self, path: &Path) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry(path.to_path_buf()).or_default().clone()
        };
        lock.lock_owned().await
    }
}
