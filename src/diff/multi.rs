//! Group-wide diffs
//!
//! Per-history diffs merged by path: each [`MultiFileSystemChangeList`] holds,
//! for one path, the change every history that touched it made.

use super::{Change, FileSystemDiff};
use crate::tree::{FileReference, TreePath};
use crate::types::MultiSnapshotId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The changes all histories made to one path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiFileSystemChangeList {
    pub path: TreePath,
    /// History name -> that history's change
    pub changes: BTreeMap<String, Change>,
}

impl MultiFileSystemChangeList {
    pub fn touched_histories(&self) -> impl Iterator<Item = &str> {
        self.changes.keys().map(String::as_str)
    }

    /// Distinct resulting versions, in history-name order; `None` is a deletion.
    pub fn distinct_targets(&self) -> Vec<Option<FileReference>> {
        let mut targets: Vec<Option<FileReference>> = Vec::new();
        for change in self.changes.values() {
            if !targets.contains(&change.to) {
                targets.push(change.to.clone());
            }
        }
        targets
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HistoryChangeKind {
    /// Tracked in the newer multi-snapshot only
    Added,
    /// Tracked in the older multi-snapshot only
    Removed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryChange {
    pub history: String,
    pub kind: HistoryChangeKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiFileSystemDiff {
    pub from: Option<MultiSnapshotId>,
    pub to: MultiSnapshotId,
    pub change_lists: Vec<MultiFileSystemChangeList>,
    pub history_changes: Vec<HistoryChange>,
}

impl MultiFileSystemDiff {
    pub fn is_empty(&self) -> bool {
        self.change_lists.is_empty() && self.history_changes.is_empty()
    }

    pub fn change_list(&self, path: &TreePath) -> Option<&MultiFileSystemChangeList> {
        self.change_lists.iter().find(|list| &list.path == path)
    }
}

/// Merge per-history diffs into one change list per path, ordered by path.
pub fn merge_diffs(diffs: Vec<FileSystemDiff>) -> Vec<MultiFileSystemChangeList> {
    let mut by_path: BTreeMap<TreePath, BTreeMap<String, Change>> = BTreeMap::new();
    for diff in diffs {
        for change in diff.changes {
            by_path
                .entry(change.path.clone())
                .or_default()
                .insert(diff.history.clone(), change);
        }
    }
    by_path
        .into_iter()
        .map(|(path, changes)| MultiFileSystemChangeList { path, changes })
        .collect()
}
