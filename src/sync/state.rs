//! Persisted synchronization state
//!
//! The whole state of a group lives in the tip tree of the
//! [`SYNC_STATE_BRANCH`](crate::history::SYNC_STATE_BRANCH):
//!
//! ```text
//! SyncPoints/<id>.SyncPoint.json
//! Actions/<sync point id>.SyncActions.json     actions created by that run
//! Conflicts/<escaped path>.SyncConflict.json
//! ```
//!
//! Record names are derived from record content, so the directories can be
//! listed and matched without an index. Every run rewrites the whole tree, so
//! a record that cannot be read or does not match its name fails the load
//! instead of being dropped on the next commit.

use super::action::{ActionQueue, SyncAction};
use super::conflict::{ConflictStore, SyncConflict};
use crate::error::{StorageError, SyncError};
use crate::history::{StoreHandle, SYNC_STATE_BRANCH};
use crate::store::{StoredDirectory, StoredEntry};
use crate::tree::TreePath;
use crate::types::{CommitId, MultiSnapshotId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

pub const SYNC_POINTS_DIRECTORY: &str = "SyncPoints";
pub const ACTIONS_DIRECTORY: &str = "Actions";
pub const CONFLICTS_DIRECTORY: &str = "Conflicts";

const SYNC_POINT_SUFFIX: &str = ".SyncPoint.json";
const ACTIONS_SUFFIX: &str = ".SyncActions.json";
const CONFLICT_SUFFIX: &str = ".SyncConflict.json";

/// How far synchronization has progressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncPoint {
    pub id: u64,
    pub multi_file_system_snapshot_id: MultiSnapshotId,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncState {
    sync_points: BTreeMap<u64, SyncPoint>,
    pub actions: ActionQueue,
    pub conflicts: ConflictStore,
}

impl SyncState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest_sync_point(&self) -> Option<&SyncPoint> {
        self.sync_points.values().next_back()
    }

    /// Sync points, oldest first
    pub fn sync_points(&self) -> impl Iterator<Item = &SyncPoint> {
        self.sync_points.values()
    }

    /// Append a sync point with the next id
    pub fn advance(&mut self, multi_snapshot: MultiSnapshotId) -> SyncPoint {
        let id = self.latest_sync_point().map_or(1, |p| p.id + 1);
        let point = SyncPoint {
            id,
            multi_file_system_snapshot_id: multi_snapshot,
        };
        self.sync_points.insert(id, point);
        point
    }

    pub(crate) fn from_tree(root: &StoredDirectory) -> Result<Self, SyncError> {
        let mut state = SyncState::new();

        for (name, content) in record_files(root, SYNC_POINTS_DIRECTORY)? {
            let point: SyncPoint = decode(name, content)?;
            if name != sync_point_file_name(point.id) {
                return Err(corrupt(name, "name does not match the sync point id"));
            }
            state.sync_points.insert(point.id, point);
        }

        let mut groups = Vec::new();
        for (name, content) in record_files(root, ACTIONS_DIRECTORY)? {
            let id = name
                .strip_suffix(ACTIONS_SUFFIX)
                .and_then(|id| id.parse::<u64>().ok())
                .ok_or_else(|| corrupt(name, "not an action record"))?;
            groups.push((id, name, content));
        }
        // ids sort numerically, names would not
        groups.sort_by_key(|(id, _, _)| *id);
        for (id, name, content) in groups {
            let point = state
                .sync_points
                .get(&id)
                .copied()
                .ok_or_else(|| corrupt(name, "no such sync point"))?;
            let actions: Vec<SyncAction> = decode(name, content)?;
            for action in actions {
                if action.snapshot_id != point.multi_file_system_snapshot_id {
                    return Err(corrupt(name, "action belongs to another multi-snapshot"));
                }
                state.actions.add(action)?;
            }
        }

        for (name, content) in record_files(root, CONFLICTS_DIRECTORY)? {
            let conflict: SyncConflict = decode(name, content)?;
            if name != conflict_file_name(&conflict.path) {
                return Err(corrupt(name, "name does not match the conflict path"));
            }
            if conflict.conflicting_versions.len() < 2 {
                return Err(corrupt(name, "fewer than two conflicting versions"));
            }
            state.conflicts.add(conflict)?;
        }

        Ok(state)
    }

    pub(crate) fn to_tree(&self) -> Result<StoredDirectory, SyncError> {
        let mut points = StoredDirectory::new();
        let mut point_of: HashMap<MultiSnapshotId, u64> = HashMap::new();
        for point in self.sync_points.values() {
            points.insert_file(sync_point_file_name(point.id), serde_json::to_vec(point)?);
            point_of
                .entry(point.multi_file_system_snapshot_id)
                .or_insert(point.id);
        }

        let mut by_point: BTreeMap<u64, Vec<&SyncAction>> = BTreeMap::new();
        for action in self.actions.all() {
            let id = point_of.get(&action.snapshot_id).ok_or_else(|| {
                SyncError::Validation(format!(
                    "Action {} was derived from multi-snapshot {} which has no sync point",
                    action.id, action.snapshot_id
                ))
            })?;
            by_point.entry(*id).or_default().push(action);
        }
        let mut actions = StoredDirectory::new();
        for (id, list) in by_point {
            actions.insert_file(actions_file_name(id), serde_json::to_vec(&list)?);
        }

        let mut conflicts = StoredDirectory::new();
        for conflict in self.conflicts.items() {
            conflicts.insert_file(
                conflict_file_name(&conflict.path),
                serde_json::to_vec(conflict)?,
            );
        }

        let mut root = StoredDirectory::new();
        root.insert_directory(SYNC_POINTS_DIRECTORY, points);
        root.insert_directory(ACTIONS_DIRECTORY, actions);
        root.insert_directory(CONFLICTS_DIRECTORY, conflicts);
        Ok(root)
    }
}

/// Escape a path into a single file-name segment
pub fn escape_path(path: &TreePath) -> String {
    path.key().replace('%', "%25").replace('/', "%2F")
}

fn sync_point_file_name(id: u64) -> String {
    format!("{}{}", id, SYNC_POINT_SUFFIX)
}

fn actions_file_name(sync_point: u64) -> String {
    format!("{}{}", sync_point, ACTIONS_SUFFIX)
}

fn conflict_file_name(path: &TreePath) -> String {
    format!("{}{}", escape_path(path), CONFLICT_SUFFIX)
}

fn corrupt(record: &str, reason: &str) -> SyncError {
    StorageError::Corrupt(format!("sync state record {}: {}", record, reason)).into()
}

fn record_files<'a>(
    root: &'a StoredDirectory,
    directory: &str,
) -> Result<Vec<(&'a str, &'a [u8])>, SyncError> {
    let Some(dir) = root.directory(directory) else {
        return Ok(Vec::new());
    };
    dir.entries
        .iter()
        .map(|(name, entry)| match entry {
            StoredEntry::File(file) => Ok((name.as_str(), file.content.as_slice())),
            StoredEntry::Directory(_) => Err(corrupt(name, "unexpected directory")),
        })
        .collect()
}

fn decode<T: serde::de::DeserializeOwned>(name: &str, content: &[u8]) -> Result<T, SyncError> {
    serde_json::from_slice(content).map_err(|e| corrupt(name, &e.to_string()))
}

/// Current state without creating the branch
pub(crate) fn read_state(handle: &StoreHandle) -> Result<SyncState, SyncError> {
    if !handle.store.has_branch(SYNC_STATE_BRANCH)? {
        return Ok(SyncState::new());
    }
    let tip = handle.store.branch_tip(SYNC_STATE_BRANCH)?;
    SyncState::from_tree(&handle.store.read_tree(&tip)?)
}

/// Tip and state, for a writer about to commit a new state
pub(crate) fn load_for_update(handle: &StoreHandle) -> Result<(CommitId, SyncState), SyncError> {
    handle.ensure_branch(SYNC_STATE_BRANCH)?;
    let tip = handle.store.branch_tip(SYNC_STATE_BRANCH)?;
    let state = SyncState::from_tree(&handle.store.read_tree(&tip)?)?;
    Ok((tip, state))
}

pub(crate) fn save_state(
    handle: &StoreHandle,
    tip: &CommitId,
    state: &SyncState,
    message: &str,
) -> Result<Option<CommitId>, SyncError> {
    handle.commit_if_changed(SYNC_STATE_BRANCH, tip, &state.to_tree()?, message)
}
