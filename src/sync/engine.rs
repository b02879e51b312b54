//! The synchronizer
//!
//! One run turns everything that happened between the last sync point and the
//! newest multi-snapshot into queued actions and conflicts, retries every open
//! conflict, and commits the new state together with the advanced sync point
//! as a single commit. A run that loses the push race starts over from the new
//! tip.

use super::action::SyncAction;
use super::conflict::SyncConflict;
use super::resolver::{ConflictResolver, LiveVersions, Resolution};
use super::state::{load_for_update, save_state, SyncPoint, SyncState};
use crate::diff::MultiFileSystemChangeList;
use crate::error::SyncError;
use crate::history::{HistoryGroup, MultiFileSystemSnapshot, SYNC_STATE_BRANCH};
use crate::tree::{DirectoryTree, FileReference, TreePath};
use crate::types::MultiSnapshotId;
use tracing::{debug, info};

/// Outcome of one [`Synchronizer::synchronize`] call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Latest sync point after the run
    pub sync_point: Option<SyncPoint>,
    /// Nothing new since the last run; no commit was made
    pub up_to_date: bool,
    pub actions_added: usize,
    pub actions_superseded: usize,
    pub conflicts_added: usize,
    pub conflicts_updated: usize,
    pub conflicts_resolved: usize,
    /// Runs needed, including ones that lost a push race
    pub attempts: usize,
}

pub struct Synchronizer<'g> {
    group: &'g HistoryGroup,
    resolver: Box<dyn ConflictResolver>,
}

impl<'g> Synchronizer<'g> {
    pub fn new(group: &'g HistoryGroup, resolver: Box<dyn ConflictResolver>) -> Self {
        Self { group, resolver }
    }

    pub fn resolver(&self) -> &dyn ConflictResolver {
        self.resolver.as_ref()
    }

    pub fn synchronize(&self) -> Result<SyncReport, SyncError> {
        self.group
            .handle()
            .write(SYNC_STATE_BRANCH, "synchronize", |attempt| self.run(attempt))
    }

    fn run(&self, attempt: usize) -> Result<SyncReport, SyncError> {
        let mut report = SyncReport {
            attempts: attempt,
            ..SyncReport::default()
        };
        let Some(to) = self.group.multi_snapshots().latest()? else {
            debug!("No multi-snapshot yet, nothing to synchronize");
            report.up_to_date = true;
            return Ok(report);
        };

        let handle = self.group.handle();
        let (tip, mut state) = load_for_update(handle)?;
        let from = state
            .latest_sync_point()
            .map(|p| p.multi_file_system_snapshot_id);
        if from == Some(to.id) {
            debug!(multi_snapshot = %to.id.short(), "Already synchronized");
            report.up_to_date = true;
            report.sync_point = state.latest_sync_point().copied();
            return Ok(report);
        }

        let diff = self.group.multi_diff(from.as_ref(), &to.id, None)?;
        for list in &diff.change_lists {
            apply_change_list(&mut state, &to.id, list, &mut report)?;
        }
        if !state.conflicts.is_empty() {
            let live = SnapshotVersions::load(self.group, &to)?;
            self.resolve_conflicts(&mut state, &to.id, &live, &mut report)?;
        }

        let point = state.advance(to.id);
        let message = format!(
            "Synchronize to {} (sync point {})",
            to.id.short(),
            point.id
        );
        save_state(handle, &tip, &state, &message)?;
        report.sync_point = Some(point);

        info!(
            sync_point = point.id,
            multi_snapshot = %to.id.short(),
            actions_added = report.actions_added,
            actions_superseded = report.actions_superseded,
            conflicts_added = report.conflicts_added,
            conflicts_updated = report.conflicts_updated,
            conflicts_resolved = report.conflicts_resolved,
            attempt,
            "Synchronized"
        );
        Ok(report)
    }

    fn resolve_conflicts(
        &self,
        state: &mut SyncState,
        to: &MultiSnapshotId,
        live: &dyn LiveVersions,
        report: &mut SyncReport,
    ) -> Result<(), SyncError> {
        for path in state.conflicts.paths() {
            let Some(conflict) = state.conflicts.get(&path) else {
                continue;
            };
            let Resolution::Resolved(survivor) = self.resolver.try_resolve(conflict, live)? else {
                continue;
            };
            state.conflicts.remove(&path);
            report.conflicts_resolved += 1;
            debug!(path = %path, resolver = self.resolver.name(), "Resolved conflict");

            // deleted everywhere: nothing left to copy
            let Some(version) = survivor else { continue };
            let present_everywhere = live
                .live_versions(&path)
                .iter()
                .all(|(_, v)| v.is_some());
            let from_version = present_everywhere.then(|| FileReference::wildcard(path.clone()));
            report.actions_superseded += state.actions.remove_pending(&path).len();
            state
                .actions
                .add(SyncAction::new(*to, path.clone(), from_version, Some(version)))?;
            report.actions_added += 1;
        }
        Ok(())
    }
}

fn apply_change_list(
    state: &mut SyncState,
    to: &MultiSnapshotId,
    list: &MultiFileSystemChangeList,
    report: &mut SyncReport,
) -> Result<(), SyncError> {
    let path = &list.path;
    let targets = list.distinct_targets();

    if let Some(conflict) = state.conflicts.get_mut(path) {
        conflict.merge(*to, targets);
        report.actions_superseded += state.actions.remove_pending(path).len();
        report.conflicts_updated += 1;
        debug!(path = %path, "Updated conflict");
        return Ok(());
    }

    report.actions_superseded += state.actions.remove_pending(path).len();
    if targets.len() == 1 {
        let to_version = targets.into_iter().next().flatten();
        let action = SyncAction::new(*to, path.clone(), common_from(list), to_version);
        debug!(path = %path, action = %action.id, kind = ?action.kind(), "Queued action");
        state.actions.add(action)?;
        report.actions_added += 1;
    } else {
        debug!(path = %path, versions = targets.len(), "Histories disagree, recording conflict");
        state
            .conflicts
            .add(SyncConflict::new(*to, path.clone(), targets)?)?;
        report.conflicts_added += 1;
    }
    Ok(())
}

/// The version the touched histories started from; a wildcard when they
/// started from different ones.
fn common_from(list: &MultiFileSystemChangeList) -> Option<FileReference> {
    let first = list.changes.values().next().and_then(|c| c.from.clone());
    if list.changes.values().all(|c| c.from == first) {
        first
    } else {
        Some(FileReference::wildcard(list.path.clone()))
    }
}

/// Live versions as of one multi-snapshot
struct SnapshotVersions {
    trees: Vec<(String, DirectoryTree)>,
}

impl SnapshotVersions {
    fn load(group: &HistoryGroup, multi: &MultiFileSystemSnapshot) -> Result<Self, SyncError> {
        let mut trees = Vec::with_capacity(multi.histories.len());
        for (name, id) in &multi.histories {
            let snapshot = group.history(name)?.get_snapshot(id)?;
            trees.push((name.clone(), snapshot.root));
        }
        Ok(Self { trees })
    }
}

impl LiveVersions for SnapshotVersions {
    fn live_versions(&self, path: &TreePath) -> Vec<(String, Option<FileReference>)> {
        self.trees
            .iter()
            .map(|(name, tree)| (name.clone(), tree.file_reference(path)))
            .collect()
    }
}
