//! Conflict resolution strategies

use super::conflict::SyncConflict;
use crate::error::SyncError;
use crate::tree::{FileReference, TreePath};

/// Current versions of a path, one per history; `None` where it is absent.
pub trait LiveVersions {
    fn live_versions(&self, path: &TreePath) -> Vec<(String, Option<FileReference>)>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Unresolved,
    /// The surviving version; `None` when the file is gone everywhere
    Resolved(Option<FileReference>),
}

pub trait ConflictResolver: Send + Sync {
    fn name(&self) -> &'static str;

    fn try_resolve(
        &self,
        conflict: &SyncConflict,
        live: &dyn LiveVersions,
    ) -> Result<Resolution, SyncError>;
}

/// Resolves a conflict once every history holds the same version.
///
/// Live versions are re-read from the histories; a history without the file
/// contributes a deletion like any other version. A conflict whose live
/// versions are still the ones it recorded stays open.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleConflictResolver;

impl ConflictResolver for SimpleConflictResolver {
    fn name(&self) -> &'static str {
        "simple"
    }

    fn try_resolve(
        &self,
        conflict: &SyncConflict,
        live: &dyn LiveVersions,
    ) -> Result<Resolution, SyncError> {
        let mut distinct: Vec<Option<FileReference>> = Vec::new();
        for (_, version) in live.live_versions(&conflict.path) {
            if !distinct.contains(&version) {
                distinct.push(version);
            }
        }
        let unchanged = distinct.len() == conflict.conflicting_versions.len()
            && distinct
                .iter()
                .all(|v| conflict.conflicting_versions.contains(v));
        if unchanged || distinct.len() != 1 {
            return Ok(Resolution::Unresolved);
        }
        Ok(Resolution::Resolved(distinct.pop().flatten()))
    }
}

/// Look a resolver up by its configured name
pub fn resolver_by_name(name: &str) -> Result<Box<dyn ConflictResolver>, SyncError> {
    match name.to_lowercase().as_str() {
        "simple" => Ok(Box::new(SimpleConflictResolver)),
        other => Err(SyncError::Config(format!(
            "Unknown conflict resolver: {}",
            other
        ))),
    }
}
