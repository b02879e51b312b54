//! Multi-snapshots
//!
//! A multi-snapshot pins one snapshot id per history so the whole group can be
//! diffed as of a consistent point. Each one is a commit on the
//! [`MULTI_SNAPSHOT_BRANCH`] whose root holds a single JSON record.

use super::{HistoryGroup, MULTI_SNAPSHOT_BRANCH};
use crate::error::SyncError;
use crate::store::{CommitInfo, StoredDirectory};
use crate::types::{MultiSnapshotId, SnapshotId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Marker file holding the snapshot map
pub const MULTI_SNAPSHOT_FILE: &str = "multisnapshot.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct MultiSnapshotRecord {
    histories: BTreeMap<String, SnapshotId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiFileSystemSnapshot {
    pub id: MultiSnapshotId,
    pub creation_time: DateTime<Utc>,
    /// History name -> snapshot id
    pub histories: BTreeMap<String, SnapshotId>,
}

impl MultiFileSystemSnapshot {
    /// Case-insensitive lookup of a history's snapshot
    pub fn snapshot_of(&self, history: &str) -> Option<&SnapshotId> {
        let wanted = history.to_lowercase();
        self.histories
            .iter()
            .find(|(name, _)| name.to_lowercase() == wanted)
            .map(|(_, id)| id)
    }
}

pub struct MultiSnapshotStore<'g> {
    group: &'g HistoryGroup,
}

impl<'g> MultiSnapshotStore<'g> {
    pub(crate) fn new(group: &'g HistoryGroup) -> Self {
        Self { group }
    }

    /// Pin the latest snapshot of every history that has one.
    ///
    /// Returns the current multi-snapshot unchanged when no history moved.
    pub fn create_snapshot(&self) -> Result<MultiFileSystemSnapshot, SyncError> {
        let mut histories = BTreeMap::new();
        for history in self.group.histories()? {
            if let Some(info) = history.snapshots()?.last() {
                histories.insert(history.name().to_string(), info.id);
            }
        }
        if histories.is_empty() {
            return Err(SyncError::Validation(
                "No history has a snapshot yet".to_string(),
            ));
        }

        let record = MultiSnapshotRecord { histories };
        let mut root = StoredDirectory::new();
        root.insert_file(MULTI_SNAPSHOT_FILE, serde_json::to_vec(&record)?);

        let handle = self.group.handle();
        handle.ensure_branch(MULTI_SNAPSHOT_BRANCH)?;
        handle.write(MULTI_SNAPSHOT_BRANCH, "create_multi_snapshot", |attempt| {
            let tip = handle.store.branch_tip(MULTI_SNAPSHOT_BRANCH)?;
            let commit = match handle.commit_if_changed(
                MULTI_SNAPSHOT_BRANCH,
                &tip,
                &root,
                "Multi-filesystem snapshot",
            )? {
                Some(commit) => {
                    info!(
                        multi_snapshot = %commit.short(),
                        histories = record.histories.len(),
                        attempt,
                        "Created multi-snapshot"
                    );
                    commit
                }
                None => {
                    debug!(multi_snapshot = %tip.short(), "No history moved, reusing multi-snapshot");
                    tip
                }
            };
            self.load(&handle.store.commit_info(&commit)?)
        })
    }

    pub fn get(&self, id: &MultiSnapshotId) -> Result<MultiFileSystemSnapshot, SyncError> {
        let commit = self
            .commits()?
            .into_iter()
            .find(|c| &c.id == id)
            .ok_or_else(|| SyncError::not_found("Multi-snapshot", id))?;
        self.load(&commit)
    }

    pub fn latest(&self) -> Result<Option<MultiFileSystemSnapshot>, SyncError> {
        match self.commits()?.last() {
            Some(commit) => self.load(commit).map(Some),
            None => Ok(None),
        }
    }

    /// All multi-snapshots, oldest first
    pub fn all(&self) -> Result<Vec<MultiFileSystemSnapshot>, SyncError> {
        self.commits()?.iter().map(|c| self.load(c)).collect()
    }

    fn commits(&self) -> Result<Vec<CommitInfo>, SyncError> {
        let store = &self.group.handle().store;
        if !store.has_branch(MULTI_SNAPSHOT_BRANCH)? {
            return Ok(Vec::new());
        }
        let mut out = Vec::new();
        for commit in store.commits_on(MULTI_SNAPSHOT_BRANCH)? {
            if store.contains_entry(&commit.id, MULTI_SNAPSHOT_FILE)? {
                out.push(commit);
            }
        }
        Ok(out)
    }

    fn load(&self, commit: &CommitInfo) -> Result<MultiFileSystemSnapshot, SyncError> {
        let tree = self.group.handle().store.read_tree(&commit.id)?;
        let file = tree
            .file(MULTI_SNAPSHOT_FILE)
            .ok_or_else(|| SyncError::not_found("Multi-snapshot", commit.id))?;
        let record: MultiSnapshotRecord = serde_json::from_slice(&file.content)?;
        Ok(MultiFileSystemSnapshot {
            id: commit.id,
            creation_time: commit.time,
            histories: record.histories,
        })
    }
}
