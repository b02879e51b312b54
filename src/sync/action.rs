//! Sync actions
//!
//! An action tells the copier to bring one path to a given version. Actions are
//! created `Queued` by the engine and moved along by whoever performs the copy:
//!
//! ```text
//! Queued -> Active -> Completed
//! Queued -> Cancelled
//! Active -> Cancelled
//! ```

use crate::error::SyncError;
use crate::tree::{FileReference, TreePath};
use crate::types::MultiSnapshotId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SyncActionState {
    Queued,
    Active,
    Completed,
    Cancelled,
}

impl SyncActionState {
    pub fn can_transition_to(self, next: SyncActionState) -> bool {
        use SyncActionState::*;
        matches!(
            (self, next),
            (Queued, Active) | (Queued, Cancelled) | (Active, Completed) | (Active, Cancelled)
        )
    }

    /// Queued or active
    pub fn is_pending(self) -> bool {
        matches!(self, SyncActionState::Queued | SyncActionState::Active)
    }
}

impl fmt::Display for SyncActionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SyncActionState::Queued => "Queued",
            SyncActionState::Active => "Active",
            SyncActionState::Completed => "Completed",
            SyncActionState::Cancelled => "Cancelled",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncActionKind {
    Add,
    Delete,
    Modify,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncAction {
    pub id: String,
    /// Multi-snapshot the action was derived from
    pub snapshot_id: MultiSnapshotId,
    pub path: TreePath,
    pub from_version: Option<FileReference>,
    pub to_version: Option<FileReference>,
    pub state: SyncActionState,
}

impl SyncAction {
    /// A new queued action; the id is derived from its content.
    pub fn new(
        snapshot_id: MultiSnapshotId,
        path: TreePath,
        from_version: Option<FileReference>,
        to_version: Option<FileReference>,
    ) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(snapshot_id.as_bytes());
        for part in [
            path.key().to_string(),
            describe(&from_version),
            describe(&to_version),
        ] {
            hasher.update(&(part.len() as u64).to_le_bytes());
            hasher.update(part.as_bytes());
        }
        Self {
            id: hex::encode(&hasher.finalize().as_bytes()[..16]),
            snapshot_id,
            path,
            from_version,
            to_version,
            state: SyncActionState::Queued,
        }
    }

    pub fn kind(&self) -> SyncActionKind {
        match (&self.from_version, &self.to_version) {
            (None, _) => SyncActionKind::Add,
            (_, None) => SyncActionKind::Delete,
            _ => SyncActionKind::Modify,
        }
    }
}

fn describe(version: &Option<FileReference>) -> String {
    version
        .as_ref()
        .map(|v| v.to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// Actions grouped by path, in creation order within a path
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionQueue {
    by_path: BTreeMap<TreePath, Vec<SyncAction>>,
}

impl ActionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_path.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_path.is_empty()
    }

    pub fn add(&mut self, action: SyncAction) -> Result<(), SyncError> {
        if self.get(&action.id).is_some() {
            return Err(SyncError::duplicate("Sync action", &action.id));
        }
        self.by_path
            .entry(action.path.clone())
            .or_default()
            .push(action);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&SyncAction> {
        self.all().find(|a| a.id == id)
    }

    pub fn all(&self) -> impl Iterator<Item = &SyncAction> {
        self.by_path.values().flatten()
    }

    pub fn for_path(&self, path: &TreePath) -> &[SyncAction] {
        self.by_path.get(path).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Paths that have at least one action
    pub fn paths(&self) -> impl Iterator<Item = &TreePath> {
        self.by_path.keys()
    }

    pub fn by_state(&self, state: SyncActionState) -> Vec<&SyncAction> {
        self.all().filter(|a| a.state == state).collect()
    }

    pub fn pending_for_path(&self, path: &TreePath) -> Vec<&SyncAction> {
        self.for_path(path)
            .iter()
            .filter(|a| a.state.is_pending())
            .collect()
    }

    /// Drop the queued and active actions of `path`, returning them
    pub fn remove_pending(&mut self, path: &TreePath) -> Vec<SyncAction> {
        let Some(actions) = self.by_path.remove(path) else {
            return Vec::new();
        };
        let (removed, kept): (Vec<_>, Vec<_>) =
            actions.into_iter().partition(|a| a.state.is_pending());
        if !kept.is_empty() {
            self.by_path.insert(path.clone(), kept);
        }
        removed
    }

    pub fn transition(
        &mut self,
        id: &str,
        next: SyncActionState,
    ) -> Result<&SyncAction, SyncError> {
        let action = self
            .by_path
            .values_mut()
            .flatten()
            .find(|a| a.id == id)
            .ok_or_else(|| SyncError::not_found("Sync action", id))?;
        if !action.state.can_transition_to(next) {
            return Err(SyncError::InvalidTransition {
                id: id.to_string(),
                from: action.state.to_string(),
                to: next.to_string(),
            });
        }
        action.state = next;
        Ok(action)
    }

    /// Replace all actions of one path; used when loading persisted records.
    pub(crate) fn insert_path(&mut self, path: TreePath, actions: Vec<SyncAction>) {
        if actions.is_empty() {
            self.by_path.remove(&path);
        } else {
            self.by_path.insert(path, actions);
        }
    }

    pub(crate) fn iter_paths(&self) -> impl Iterator<Item = (&TreePath, &Vec<SyncAction>)> {
        self.by_path.iter()
    }
}
