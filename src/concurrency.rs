//! Writer serialization for shared branches
//!
//! Reads never lock: commits are immutable. Every writer of a branch takes the
//! branch's lock for the whole read-modify-commit-push cycle, so two writers in
//! the same process never race. Writers in other processes are caught by the
//! store's compare-and-swap on the branch tip, and [`retry_on_tip_mismatch`]
//! reruns the cycle against the new tip.

use crate::error::SyncError;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// Per-branch lock manager
///
/// Branch names are compared case-insensitively.
pub struct BranchLockManager {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl BranchLockManager {
    pub fn new() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Get or create the lock guarding `branch`
    pub fn get_lock(&self, branch: &str) -> Arc<Mutex<()>> {
        let mut map = self.locks.lock();
        map.entry(branch.to_lowercase())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

impl Default for BranchLockManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Run `attempt` until it succeeds, fails for a reason other than a moved
/// branch tip, or `max_attempts` runs have all lost the race.
pub fn retry_on_tip_mismatch<T>(
    operation: &'static str,
    max_attempts: usize,
    mut attempt: impl FnMut(usize) -> Result<T, SyncError>,
) -> Result<T, SyncError> {
    let max_attempts = max_attempts.max(1);
    for n in 1..=max_attempts {
        match attempt(n) {
            Err(e) if e.is_tip_mismatch() => {
                warn!(operation, attempt = n, max_attempts, error = %e, "Branch moved, retrying");
            }
            other => return other,
        }
    }
    Err(SyncError::ConcurrentModification {
        operation,
        attempts: max_attempts,
    })
}
