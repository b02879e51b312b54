//! Branch Heads
//!
//! Provides O(1) access to the current tip commit of every branch, with
//! compare-and-swap updates so concurrent writers cannot silently overwrite
//! each other.

use crate::types::CommitId;
use std::collections::HashMap;

/// Head index: branch name -> tip CommitId
#[derive(Debug, Default)]
pub struct BranchHeads {
    pub(crate) heads: HashMap<String, CommitId>,
}

impl BranchHeads {
    pub fn new() -> Self {
        BranchHeads {
            heads: HashMap::new(),
        }
    }

    pub fn get_head(&self, branch: &str) -> Option<CommitId> {
        self.heads.get(branch).copied()
    }

    /// Move `branch` from `expected` to `new`.
    ///
    /// Returns the head actually found when it differs from `expected`.
    pub fn compare_and_swap(
        &mut self,
        branch: &str,
        expected: Option<&CommitId>,
        new: &CommitId,
    ) -> Result<(), Option<CommitId>> {
        let current = self.get_head(branch);
        if current.as_ref() != expected {
            return Err(current);
        }
        self.heads.insert(branch.to_string(), *new);
        Ok(())
    }

    /// All branch names that have a head
    pub fn branch_names(&self) -> Vec<String> {
        self.heads.keys().cloned().collect()
    }
}
