//! Snapshot diffs
//!
//! A diff walks two directory trees side by side, matching children by
//! case-folded name, and reports one [`Change`] per file path whose
//! [`FileReference`] differs. A file replaced by a directory (or the other way
//! round) shows up as the file's deletion or addition plus the changes inside
//! the directory.

pub mod multi;

use crate::error::SyncError;
use crate::tree::{
    DirectoryTree, FileEntry, FileReference, NodeIndex, PathFilter, TreeNode, TreePath,
};
use crate::types::SnapshotId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub use multi::{
    HistoryChange, HistoryChangeKind, MultiFileSystemChangeList, MultiFileSystemDiff,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeKind {
    Added,
    Deleted,
    Modified,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChangeKind::Added => "added",
            ChangeKind::Deleted => "deleted",
            ChangeKind::Modified => "modified",
        };
        f.write_str(s)
    }
}

/// One file's difference between two snapshots
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    pub path: TreePath,
    pub from: Option<FileReference>,
    pub to: Option<FileReference>,
}

impl Change {
    pub fn kind(&self) -> ChangeKind {
        match (&self.from, &self.to) {
            (None, _) => ChangeKind::Added,
            (_, None) => ChangeKind::Deleted,
            _ => ChangeKind::Modified,
        }
    }
}

/// Changes of one history between two of its snapshots
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSystemDiff {
    pub history: String,
    /// `None` when the history had no snapshot yet
    pub from: Option<SnapshotId>,
    pub to: SnapshotId,
    pub changes: Vec<Change>,
}

impl FileSystemDiff {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Compare two trees. A missing `from` tree diffs as empty.
///
/// With a filter, only changes at paths under one of its prefixes are kept and
/// directories that cannot contain such paths are not descended into.
pub fn diff_trees(
    from: Option<&DirectoryTree>,
    to: &DirectoryTree,
    filter: Option<&PathFilter>,
) -> Result<Vec<Change>, SyncError> {
    let mut walker = TreeWalker {
        from,
        to,
        filter,
        changes: Vec::new(),
    };
    walker.walk(
        &TreePath::root(),
        from.map(|_| DirectoryTree::ROOT),
        Some(DirectoryTree::ROOT),
    )?;
    Ok(walker.changes)
}

struct TreeWalker<'a> {
    from: Option<&'a DirectoryTree>,
    to: &'a DirectoryTree,
    filter: Option<&'a PathFilter>,
    changes: Vec<Change>,
}

/// What one side holds at a given name
struct Side<'a> {
    file: Option<&'a FileEntry>,
    directory: Option<NodeIndex>,
}

impl<'a> TreeWalker<'a> {
    fn walk(
        &mut self,
        path: &TreePath,
        from_dir: Option<NodeIndex>,
        to_dir: Option<NodeIndex>,
    ) -> Result<(), SyncError> {
        if let Some(filter) = self.filter {
            if !filter.may_contain(path) {
                return Ok(());
            }
        }

        // case-folded name -> (from child, to child)
        let mut children: BTreeMap<String, (Option<NodeIndex>, Option<NodeIndex>)> =
            BTreeMap::new();
        if let (Some(tree), Some(dir)) = (self.from, from_dir) {
            for &child in tree.children(dir) {
                if let Some(node) = tree.node(child) {
                    children.entry(node.name().to_lowercase()).or_default().0 = Some(child);
                }
            }
        }
        if let Some(dir) = to_dir {
            for &child in self.to.children(dir) {
                if let Some(node) = self.to.node(child) {
                    children.entry(node.name().to_lowercase()).or_default().1 = Some(child);
                }
            }
        }

        for (from_child, to_child) in children.into_values() {
            let before = side(self.from, from_child);
            let after = side(Some(self.to), to_child);
            // the newer spelling wins
            let node = match (to_child, from_child) {
                (Some(i), _) => self.to.node(i),
                (None, Some(i)) => self.from.and_then(|tree| tree.node(i)),
                (None, None) => None,
            };
            let name = node
                .map(|n| n.name().to_string())
                .ok_or_else(|| SyncError::not_found("Tree node", path))?;
            let child_path = path.join(&name)?;

            let from_ref = before
                .file
                .map(|f| FileReference::new(child_path.clone(), f.last_write_time, f.length));
            let to_ref = after
                .file
                .map(|f| FileReference::new(child_path.clone(), f.last_write_time, f.length));
            if from_ref != to_ref && self.filter.map_or(true, |f| f.matches(&child_path)) {
                self.changes.push(Change {
                    path: child_path.clone(),
                    from: from_ref,
                    to: to_ref,
                });
            }

            if before.directory.is_some() || after.directory.is_some() {
                self.walk(&child_path, before.directory, after.directory)?;
            }
        }
        Ok(())
    }
}

fn side<'a>(tree: Option<&'a DirectoryTree>, index: Option<NodeIndex>) -> Side<'a> {
    match (tree, index) {
        (Some(tree), Some(index)) => match tree.node(index) {
            Some(TreeNode::File(file)) => Side {
                file: Some(file),
                directory: None,
            },
            Some(TreeNode::Directory(_)) => Side {
                file: None,
                directory: Some(index),
            },
            None => Side {
                file: None,
                directory: None,
            },
        },
        _ => Side {
            file: None,
            directory: None,
        },
    }
}
