//! Histories and history groups
//!
//! Every history is a branch of the shared version store; snapshots are the
//! commits on it that carry the reserved snapshot subtree. A group ties the
//! histories together with the multi-snapshot branch and the synchronization
//! state branch.

pub mod group;
pub mod multi;
pub mod snapshot;

use crate::concurrency::{retry_on_tip_mismatch, BranchLockManager};
use crate::error::{StorageError, SyncError};
use crate::store::{StoredDirectory, VersionStore};
use crate::types::CommitId;
use std::sync::Arc;
use tracing::debug;

pub use group::HistoryGroup;
pub use multi::{MultiFileSystemSnapshot, MultiSnapshotStore};
pub use snapshot::{FileSystemHistory, Snapshot, SnapshotInfo};

/// Branch name prefix of per-history branches
pub const HISTORY_BRANCH_PREFIX: &str = "filesystemhistory/";

pub const MULTI_SNAPSHOT_BRANCH: &str = "multifilesystemsnapshot";

pub const SYNC_STATE_BRANCH: &str = "synchronizationstate";

/// Shared access to the store for everything that writes branches
#[derive(Clone)]
pub(crate) struct StoreHandle {
    pub store: Arc<dyn VersionStore>,
    pub locks: Arc<BranchLockManager>,
    pub max_commit_attempts: usize,
}

impl StoreHandle {
    /// Create `branch` with an empty root commit unless it exists
    pub fn ensure_branch(&self, branch: &str) -> Result<(), SyncError> {
        if self.store.has_branch(branch)? {
            return Ok(());
        }
        match self.store.create_branch(branch, None) {
            Ok(_) => {
                debug!(branch, "Created branch");
                Ok(())
            }
            // another writer created it first
            Err(StorageError::BranchExists(_)) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Run a whole read-modify-commit cycle on `branch` under its lock,
    /// rerunning it when the push loses a race with another process.
    pub fn write<T>(
        &self,
        branch: &str,
        operation: &'static str,
        attempt: impl FnMut(usize) -> Result<T, SyncError>,
    ) -> Result<T, SyncError> {
        let lock = self.locks.get_lock(branch);
        let _guard = lock.lock();
        retry_on_tip_mismatch(operation, self.max_commit_attempts, attempt)
    }

    /// Commit `root` on top of `tip` and publish it.
    ///
    /// Returns `None` without committing when the tip already holds `root`.
    pub fn commit_if_changed(
        &self,
        branch: &str,
        tip: &CommitId,
        root: &StoredDirectory,
        message: &str,
    ) -> Result<Option<CommitId>, SyncError> {
        let tree = self.store.write_tree(root)?;
        if self.store.commit_info(tip)?.tree == tree {
            return Ok(None);
        }
        let commit = self.store.commit(Some(tip), &tree, message)?;
        self.store.push(branch, Some(tip), &commit)?;
        Ok(Some(commit))
    }
}

/// History names become branch names; keep them to one path segment.
pub fn validate_history_name(name: &str) -> Result<(), SyncError> {
    if name.trim().is_empty() {
        return Err(SyncError::Validation("History name is empty".to_string()));
    }
    if name.contains('/') || name.chars().any(char::is_control) {
        return Err(SyncError::Validation(format!(
            "Invalid history name: {:?}",
            name
        )));
    }
    Ok(())
}
