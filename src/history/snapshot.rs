//! Single-history snapshots
//!
//! A snapshot commit's root holds exactly one entry, the reserved
//! [`SNAPSHOT_DIRECTORY`] subtree with the meta-tree of the captured folder.
//! Other commits on the branch (the initial empty commit, for one) are not
//! snapshots and are skipped when listing.

use super::{StoreHandle, HISTORY_BRANCH_PREFIX};
use crate::diff::{diff_trees, FileSystemDiff};
use crate::error::SyncError;
use crate::store::{CommitInfo, StoredDirectory};
use crate::tree::meta::{self, SNAPSHOT_DIRECTORY};
use crate::tree::{DirectoryTree, FileReference, PathFilter, TreePath};
use crate::types::SnapshotId;
use chrono::{DateTime, Utc};
use tracing::{debug, info};

/// An immutable capture of a directory tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub id: SnapshotId,
    pub creation_time: DateTime<Utc>,
    pub root: DirectoryTree,
}

/// Snapshot identity without the tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SnapshotInfo {
    pub id: SnapshotId,
    pub creation_time: DateTime<Utc>,
}

impl From<&Snapshot> for SnapshotInfo {
    fn from(snapshot: &Snapshot) -> Self {
        Self {
            id: snapshot.id,
            creation_time: snapshot.creation_time,
        }
    }
}

/// Handle on one history's branch
#[derive(Clone)]
pub struct FileSystemHistory {
    name: String,
    branch: String,
    handle: StoreHandle,
}

impl FileSystemHistory {
    pub(crate) fn new(name: &str, handle: StoreHandle) -> Self {
        Self {
            name: name.to_string(),
            branch: format!("{}{}", HISTORY_BRANCH_PREFIX, name),
            handle,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    /// Record `tree` as the newest snapshot.
    ///
    /// When the tip already holds the same tree content, nothing is committed
    /// and the tip snapshot is returned.
    pub fn create_snapshot(&self, tree: &DirectoryTree) -> Result<Snapshot, SyncError> {
        let mut root = StoredDirectory::new();
        root.insert_directory(SNAPSHOT_DIRECTORY, meta::to_meta(tree)?);
        let message = format!("Snapshot of {}", self.name);

        self.handle.write(&self.branch, "create_snapshot", |attempt| {
            let tip = self.handle.store.branch_tip(&self.branch)?;
            match self
                .handle
                .commit_if_changed(&self.branch, &tip, &root, &message)?
            {
                Some(commit) => {
                    info!(history = %self.name, snapshot = %commit.short(), attempt, "Created snapshot");
                    self.load(&self.handle.store.commit_info(&commit)?)
                }
                None => {
                    debug!(history = %self.name, snapshot = %tip.short(), "Tree unchanged, reusing snapshot");
                    self.load(&self.handle.store.commit_info(&tip)?)
                }
            }
        })
    }

    pub fn get_snapshot(&self, id: &SnapshotId) -> Result<Snapshot, SyncError> {
        let commits = self.handle.store.commits_on(&self.branch)?;
        let info = commits
            .iter()
            .find(|c| &c.id == id)
            .ok_or_else(|| SyncError::not_found("Snapshot", id))?;
        if !self.handle.store.contains_entry(id, SNAPSHOT_DIRECTORY)? {
            return Err(SyncError::not_found("Snapshot", id));
        }
        self.load(info)
    }

    /// All snapshots, oldest first. Trees are loaded on demand with
    /// [`get_snapshot`](Self::get_snapshot).
    pub fn snapshots(&self) -> Result<Vec<SnapshotInfo>, SyncError> {
        let mut out = Vec::new();
        for commit in self.handle.store.commits_on(&self.branch)? {
            if self.handle.store.contains_entry(&commit.id, SNAPSHOT_DIRECTORY)? {
                out.push(SnapshotInfo {
                    id: commit.id,
                    creation_time: commit.time,
                });
            }
        }
        Ok(out)
    }

    pub fn latest_snapshot(&self) -> Result<Option<Snapshot>, SyncError> {
        let commits = self.handle.store.commits_on(&self.branch)?;
        for commit in commits.iter().rev() {
            if self.handle.store.contains_entry(&commit.id, SNAPSHOT_DIRECTORY)? {
                return self.load(commit).map(Some);
            }
        }
        Ok(None)
    }

    /// Changes between two snapshots of this history; `from = None` diffs
    /// against an empty tree.
    pub fn diff(
        &self,
        from: Option<&SnapshotId>,
        to: &SnapshotId,
        filter: Option<&PathFilter>,
    ) -> Result<FileSystemDiff, SyncError> {
        let before = from.map(|id| self.get_snapshot(id)).transpose()?;
        let after = self.get_snapshot(to)?;
        let changes = diff_trees(before.as_ref().map(|s| &s.root), &after.root, filter)?;
        debug!(
            history = %self.name,
            from = ?from.map(|id| id.short()),
            to = %to.short(),
            changes = changes.len(),
            "Computed diff"
        );
        Ok(FileSystemDiff {
            history: self.name.clone(),
            from: from.copied(),
            to: *to,
            changes,
        })
    }

    /// The file at `path` in every snapshot, oldest first
    pub fn file_versions(
        &self,
        path: &TreePath,
    ) -> Result<Vec<(SnapshotInfo, Option<FileReference>)>, SyncError> {
        let mut out = Vec::new();
        for info in self.snapshots()? {
            let snapshot = self.get_snapshot(&info.id)?;
            out.push((info, snapshot.root.file_reference(path)));
        }
        Ok(out)
    }

    fn load(&self, commit: &CommitInfo) -> Result<Snapshot, SyncError> {
        let stored = self.handle.store.read_tree(&commit.id)?;
        let meta_root = stored
            .directory(SNAPSHOT_DIRECTORY)
            .ok_or_else(|| SyncError::not_found("Snapshot", commit.id))?;
        Ok(Snapshot {
            id: commit.id,
            creation_time: commit.time,
            root: meta::from_meta(meta_root, &self.name)?,
        })
    }
}
