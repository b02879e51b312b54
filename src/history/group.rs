//! History groups
//!
//! The entry point of the crate: a [`HistoryGroup`] owns the store handle and
//! hands out histories, the multi-snapshot store, group-wide diffs, the
//! synchronization state and the synchronizer.

use super::multi::MultiSnapshotStore;
use super::snapshot::FileSystemHistory;
use super::{validate_history_name, StoreHandle, HISTORY_BRANCH_PREFIX};
use crate::concurrency::BranchLockManager;
use crate::config::{EngineConfig, FoldsyncConfig};
use crate::diff::multi::merge_diffs;
use crate::diff::{
    HistoryChange, HistoryChangeKind, MultiFileSystemChangeList, MultiFileSystemDiff,
};
use crate::error::SyncError;
use crate::graph::Graph;
use crate::store::{SledVersionStore, VersionStore};
use crate::sync::resolver::resolver_by_name;
use crate::sync::{SyncStateService, Synchronizer};
use crate::tree::{FileReference, PathFilter, TreePath};
use crate::types::{MultiSnapshotId, SnapshotId};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

pub struct HistoryGroup {
    handle: StoreHandle,
    config: EngineConfig,
}

impl HistoryGroup {
    pub fn new(store: Arc<dyn VersionStore>, config: EngineConfig) -> Self {
        let handle = StoreHandle {
            store,
            locks: Arc::new(BranchLockManager::new()),
            max_commit_attempts: config.max_commit_attempts,
        };
        Self { handle, config }
    }

    /// Open the sled store configured for `workspace_root`
    pub fn open(workspace_root: &Path, config: &FoldsyncConfig) -> Result<Self, SyncError> {
        let store_path = config.storage.resolve_store_path(workspace_root);
        std::fs::create_dir_all(&store_path)?;
        let store = SledVersionStore::open(&store_path)?;
        info!(store = %store_path.display(), "Opened history group");
        Ok(Self::new(Arc::new(store), config.engine.clone()))
    }

    pub fn store(&self) -> &Arc<dyn VersionStore> {
        &self.handle.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub(crate) fn handle(&self) -> &StoreHandle {
        &self.handle
    }

    pub fn create_history(&self, name: &str) -> Result<FileSystemHistory, SyncError> {
        validate_history_name(name)?;
        if self.find_history_name(name)?.is_some() {
            return Err(SyncError::duplicate("History", name));
        }
        let history = FileSystemHistory::new(name, self.handle.clone());
        self.handle.store.create_branch(history.branch(), None)?;
        info!(history = %name, "Created history");
        Ok(history)
    }

    /// Look a history up by case-insensitive name
    pub fn history(&self, name: &str) -> Result<FileSystemHistory, SyncError> {
        let stored = self
            .find_history_name(name)?
            .ok_or_else(|| SyncError::not_found("History", name))?;
        Ok(FileSystemHistory::new(&stored, self.handle.clone()))
    }

    pub fn histories(&self) -> Result<Vec<FileSystemHistory>, SyncError> {
        Ok(self
            .history_names()?
            .iter()
            .map(|name| FileSystemHistory::new(name, self.handle.clone()))
            .collect())
    }

    pub fn multi_snapshots(&self) -> MultiSnapshotStore<'_> {
        MultiSnapshotStore::new(self)
    }

    /// Diff two multi-snapshots. A missing `from` diffs every history
    /// against nothing.
    ///
    /// Histories only in `to` are diffed from nothing and reported as added;
    /// histories only in `from` are reported as removed and not diffed.
    pub fn multi_diff(
        &self,
        from: Option<&MultiSnapshotId>,
        to: &MultiSnapshotId,
        filter: Option<&PathFilter>,
    ) -> Result<MultiFileSystemDiff, SyncError> {
        let multi = self.multi_snapshots();
        let after = multi.get(to)?;
        let before = from.map(|id| multi.get(id)).transpose()?;

        let mut history_changes = Vec::new();
        let mut from_ids: BTreeMap<String, Option<SnapshotId>> = BTreeMap::new();
        for name in after.histories.keys() {
            let previous = before.as_ref().and_then(|b| b.snapshot_of(name)).copied();
            if before.is_some() && previous.is_none() {
                history_changes.push(HistoryChange {
                    history: name.clone(),
                    kind: HistoryChangeKind::Added,
                });
            }
            from_ids.insert(name.clone(), previous);
        }
        if let Some(before) = &before {
            for name in before.histories.keys() {
                if after.snapshot_of(name).is_none() {
                    history_changes.push(HistoryChange {
                        history: name.clone(),
                        kind: HistoryChangeKind::Removed,
                    });
                }
            }
        }

        let change_lists = self.multi_diff_ids(&from_ids, &after.histories, filter)?;
        info!(
            from = ?from.map(|id| id.short()),
            to = %to.short(),
            paths = change_lists.len(),
            history_changes = history_changes.len(),
            "Computed multi-diff"
        );
        Ok(MultiFileSystemDiff {
            from: from.copied(),
            to: *to,
            change_lists,
            history_changes,
        })
    }

    /// Diff per-history snapshot ids and merge the results by path.
    ///
    /// Both maps must name the same histories (case-insensitively); a `None`
    /// from-id means the history had no snapshot yet.
    pub fn multi_diff_ids(
        &self,
        from: &BTreeMap<String, Option<SnapshotId>>,
        to: &BTreeMap<String, SnapshotId>,
        filter: Option<&PathFilter>,
    ) -> Result<Vec<MultiFileSystemChangeList>, SyncError> {
        if to.is_empty() {
            return Err(SyncError::Validation(
                "No snapshot ids to diff".to_string(),
            ));
        }
        let from_names: BTreeSet<String> = from.keys().map(|n| n.to_lowercase()).collect();
        let to_names: BTreeSet<String> = to.keys().map(|n| n.to_lowercase()).collect();
        if to_names.len() != to.len() || from_names.len() != from.len() {
            return Err(SyncError::Validation(
                "History names must be unique ignoring case".to_string(),
            ));
        }
        if from_names != to_names {
            return Err(SyncError::Validation(format!(
                "Snapshot sets name different histories: {:?} vs {:?}",
                from_names, to_names
            )));
        }

        let mut diffs = Vec::with_capacity(to.len());
        for (name, to_id) in to {
            let from_id = from
                .iter()
                .find(|(n, _)| n.to_lowercase() == name.to_lowercase())
                .and_then(|(_, id)| *id);
            let history = self.history(name)?;
            diffs.push(history.diff(from_id.as_ref(), to_id, filter)?);
        }
        Ok(merge_diffs(diffs))
    }

    pub fn sync_state(&self) -> SyncStateService<'_> {
        SyncStateService::new(self)
    }

    /// A synchronizer using the configured conflict resolver
    pub fn synchronizer(&self) -> Result<Synchronizer<'_>, SyncError> {
        let resolver = resolver_by_name(&self.config.conflict_resolver)?;
        Ok(Synchronizer::new(self, resolver))
    }

    /// The versions `path` went through in every history.
    ///
    /// Nodes are versions (`None` is a deletion); the first appearance of the
    /// file in a history hangs off the start node. Equal versions seen in
    /// several histories share a node.
    pub fn file_change_graph(
        &self,
        path: &TreePath,
    ) -> Result<Graph<Option<FileReference>>, SyncError> {
        let mut graph = Graph::new();
        for history in self.histories()? {
            let mut current: Option<Option<FileReference>> = None;
            for (_, version) in history.file_versions(path)? {
                match current.take() {
                    None if version.is_none() => {}
                    None => {
                        graph.add_edge_from_start(version.clone());
                        current = Some(version);
                    }
                    Some(previous) => {
                        if previous != version {
                            graph.add_edge(previous, version.clone());
                        }
                        current = Some(version);
                    }
                }
            }
        }
        debug!(path = %path, nodes = graph.len(), "Built file change graph");
        Ok(graph)
    }

    fn history_names(&self) -> Result<Vec<String>, SyncError> {
        Ok(self
            .handle
            .store
            .branches()?
            .into_iter()
            .filter_map(|b| b.strip_prefix(HISTORY_BRANCH_PREFIX).map(str::to_string))
            .collect())
    }

    fn find_history_name(&self, name: &str) -> Result<Option<String>, SyncError> {
        let wanted = name.to_lowercase();
        Ok(self
            .history_names()?
            .into_iter()
            .find(|n| n.to_lowercase() == wanted))
    }
}
