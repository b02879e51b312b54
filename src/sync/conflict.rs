//! Sync conflicts
//!
//! A conflict exists while several histories hold different versions of a path
//! and no single one can be picked. A version of `None` means the file was
//! deleted in that history.

use crate::error::SyncError;
use crate::tree::{FileReference, TreePath};
use crate::types::MultiSnapshotId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncConflict {
    /// Multi-snapshot the conflict was last updated from
    pub snapshot_id: MultiSnapshotId,
    pub path: TreePath,
    pub conflicting_versions: Vec<Option<FileReference>>,
}

impl SyncConflict {
    /// Fails unless at least two distinct versions remain after deduplication.
    pub fn new(
        snapshot_id: MultiSnapshotId,
        path: TreePath,
        versions: impl IntoIterator<Item = Option<FileReference>>,
    ) -> Result<Self, SyncError> {
        let conflicting_versions = dedup(versions);
        if conflicting_versions.len() < 2 {
            return Err(SyncError::Validation(format!(
                "A conflict on {} needs at least two distinct versions",
                path
            )));
        }
        Ok(Self {
            snapshot_id,
            path,
            conflicting_versions,
        })
    }

    /// Fold newly observed versions into the conflict
    pub fn merge(
        &mut self,
        snapshot_id: MultiSnapshotId,
        versions: impl IntoIterator<Item = Option<FileReference>>,
    ) {
        self.snapshot_id = snapshot_id;
        for version in versions {
            if !self.conflicting_versions.contains(&version) {
                self.conflicting_versions.push(version);
            }
        }
    }
}

fn dedup(versions: impl IntoIterator<Item = Option<FileReference>>) -> Vec<Option<FileReference>> {
    let mut out: Vec<Option<FileReference>> = Vec::new();
    for version in versions {
        if !out.contains(&version) {
            out.push(version);
        }
    }
    out
}

/// Conflicts keyed by path
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConflictStore {
    by_path: BTreeMap<TreePath, SyncConflict>,
}

impl ConflictStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_path.is_empty()
    }

    pub fn add(&mut self, conflict: SyncConflict) -> Result<(), SyncError> {
        if self.by_path.contains_key(&conflict.path) {
            return Err(SyncError::duplicate("Sync conflict", &conflict.path));
        }
        self.by_path.insert(conflict.path.clone(), conflict);
        Ok(())
    }

    pub fn update(&mut self, conflict: SyncConflict) -> Result<(), SyncError> {
        match self.by_path.get_mut(&conflict.path) {
            Some(existing) => {
                *existing = conflict;
                Ok(())
            }
            None => Err(SyncError::not_found("Sync conflict", &conflict.path)),
        }
    }

    pub fn remove(&mut self, path: &TreePath) -> Option<SyncConflict> {
        self.by_path.remove(path)
    }

    pub fn get(&self, path: &TreePath) -> Option<&SyncConflict> {
        self.by_path.get(path)
    }

    pub fn get_mut(&mut self, path: &TreePath) -> Option<&mut SyncConflict> {
        self.by_path.get_mut(path)
    }

    pub fn items(&self) -> impl Iterator<Item = &SyncConflict> {
        self.by_path.values()
    }

    pub fn paths(&self) -> Vec<TreePath> {
        self.by_path.keys().cloned().collect()
    }
}
