//! Read access to the synchronization state, plus action state changes for
//! whatever performs the copies.

use super::action::{SyncAction, SyncActionState};
use super::conflict::SyncConflict;
use super::state::{load_for_update, read_state, save_state, SyncPoint, SyncState};
use crate::error::SyncError;
use crate::history::{HistoryGroup, SYNC_STATE_BRANCH};
use crate::tree::TreePath;
use tracing::info;

pub struct SyncStateService<'g> {
    group: &'g HistoryGroup,
}

impl<'g> SyncStateService<'g> {
    pub(crate) fn new(group: &'g HistoryGroup) -> Self {
        Self { group }
    }

    /// The whole state as of the branch tip
    pub fn state(&self) -> Result<SyncState, SyncError> {
        read_state(self.group.handle())
    }

    pub fn sync_points(&self) -> Result<Vec<SyncPoint>, SyncError> {
        Ok(self.state()?.sync_points().copied().collect())
    }

    pub fn latest_sync_point(&self) -> Result<Option<SyncPoint>, SyncError> {
        Ok(self.state()?.latest_sync_point().copied())
    }

    pub fn actions(&self) -> Result<Vec<SyncAction>, SyncError> {
        Ok(self.state()?.actions.all().cloned().collect())
    }

    pub fn actions_in_state(&self, state: SyncActionState) -> Result<Vec<SyncAction>, SyncError> {
        Ok(self
            .state()?
            .actions
            .by_state(state)
            .into_iter()
            .cloned()
            .collect())
    }

    pub fn action(&self, id: &str) -> Result<SyncAction, SyncError> {
        self.state()?
            .actions
            .get(id)
            .cloned()
            .ok_or_else(|| SyncError::not_found("Sync action", id))
    }

    pub fn conflicts(&self) -> Result<Vec<SyncConflict>, SyncError> {
        Ok(self.state()?.conflicts.items().cloned().collect())
    }

    pub fn conflict(&self, path: &TreePath) -> Result<SyncConflict, SyncError> {
        self.state()?
            .conflicts
            .get(path)
            .cloned()
            .ok_or_else(|| SyncError::not_found("Sync conflict", path))
    }

    /// Move an action to `next` and commit the change
    pub fn transition_action(
        &self,
        id: &str,
        next: SyncActionState,
    ) -> Result<SyncAction, SyncError> {
        let handle = self.group.handle();
        handle.write(SYNC_STATE_BRANCH, "transition_action", |attempt| {
            let (tip, mut state) = load_for_update(handle)?;
            let updated = state.actions.transition(id, next)?.clone();
            save_state(
                handle,
                &tip,
                &state,
                &format!("Action {} -> {}", id, next),
            )?;
            info!(action = %id, state = %next, attempt, "Action state changed");
            Ok(updated)
        })
    }
}
