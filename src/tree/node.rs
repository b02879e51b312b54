//! Directory tree node types
//!
//! A [`DirectoryTree`] is an immutable arena: nodes are addressed by
//! [`NodeIndex`], children are stored as index lists sorted by case-folded
//! name, and parent links live in a separate table so nodes never point back
//! at their owners.

use super::path::{validate_name, TreePath};
use crate::error::SyncError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Index of a node inside a [`DirectoryTree`]
pub type NodeIndex = usize;

/// File node representation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub name: String,
    pub last_write_time: DateTime<Utc>,
    pub length: u64,
}

/// Directory node representation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub name: String,
    children: Vec<NodeIndex>,
}

impl DirectoryEntry {
    pub fn children(&self) -> &[NodeIndex] {
        &self.children
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeNode {
    File(FileEntry),
    Directory(DirectoryEntry),
}

impl TreeNode {
    pub fn name(&self) -> &str {
        match self {
            TreeNode::File(file) => &file.name,
            TreeNode::Directory(dir) => &dir.name,
        }
    }
}

/// Immutable directory tree; node 0 is the root directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryTree {
    nodes: Vec<TreeNode>,
    parents: Vec<Option<NodeIndex>>,
}

impl DirectoryTree {
    pub const ROOT: NodeIndex = 0;

    /// A tree with nothing but a root directory
    pub fn empty(root_name: &str) -> Result<Self, SyncError> {
        Ok(DirectoryBuilder::new(root_name)?.build())
    }

    pub fn root_name(&self) -> &str {
        self.nodes[Self::ROOT].name()
    }

    pub fn node(&self, index: NodeIndex) -> Option<&TreeNode> {
        self.nodes.get(index)
    }

    pub fn parent(&self, index: NodeIndex) -> Option<NodeIndex> {
        self.parents.get(index).copied().flatten()
    }

    pub fn children(&self, index: NodeIndex) -> &[NodeIndex] {
        match self.nodes.get(index) {
            Some(TreeNode::Directory(dir)) => &dir.children,
            _ => &[],
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// Case-insensitive child lookup
    pub fn child_by_name(&self, directory: NodeIndex, name: &str) -> Option<NodeIndex> {
        let wanted = name.to_lowercase();
        self.children(directory)
            .iter()
            .copied()
            .find(|&child| self.nodes[child].name().to_lowercase() == wanted)
    }

    pub fn lookup(&self, path: &TreePath) -> Option<NodeIndex> {
        let mut current = Self::ROOT;
        for segment in path.segments() {
            current = self.child_by_name(current, segment)?;
        }
        Some(current)
    }

    /// Reconstruct the path of a node from the parent table
    pub fn path_of(&self, index: NodeIndex) -> Result<TreePath, SyncError> {
        let mut names = Vec::new();
        let mut current = index;
        while let Some(parent) = self.parent(current) {
            names.push(self.nodes[current].name());
            current = parent;
        }
        let mut path = TreePath::root();
        for name in names.into_iter().rev() {
            path = path.join(name)?;
        }
        Ok(path)
    }

    pub fn get_file(&self, path: &TreePath) -> Option<&FileEntry> {
        match self.lookup(path).and_then(|i| self.nodes.get(i)) {
            Some(TreeNode::File(file)) => Some(file),
            _ => None,
        }
    }

    pub fn is_directory(&self, path: &TreePath) -> bool {
        matches!(
            self.lookup(path).and_then(|i| self.nodes.get(i)),
            Some(TreeNode::Directory(_))
        )
    }

    pub fn file_reference(&self, path: &TreePath) -> Option<FileReference> {
        self.get_file(path)
            .map(|file| FileReference::new(path.clone(), file.last_write_time, file.length))
    }

    /// All files with their paths, in case-folded path order
    pub fn files(&self) -> Result<Vec<(TreePath, &FileEntry)>, SyncError> {
        let mut out = Vec::new();
        self.collect_files(Self::ROOT, &TreePath::root(), &mut out)?;
        Ok(out)
    }

    fn collect_files<'a>(
        &'a self,
        directory: NodeIndex,
        path: &TreePath,
        out: &mut Vec<(TreePath, &'a FileEntry)>,
    ) -> Result<(), SyncError> {
        for &child in self.children(directory) {
            match &self.nodes[child] {
                TreeNode::File(file) => out.push((path.join(&file.name)?, file)),
                TreeNode::Directory(dir) => {
                    self.collect_files(child, &path.join(&dir.name)?, out)?
                }
            }
        }
        Ok(())
    }
}

enum PendingChild {
    File(FileEntry),
    Directory(DirectoryBuilder),
}

/// Mutable builder producing a [`DirectoryTree`]
#[derive(Debug, Clone)]
pub struct DirectoryBuilder {
    name: String,
    files: BTreeMap<String, FileEntry>,
    directories: BTreeMap<String, DirectoryBuilder>,
}

impl DirectoryBuilder {
    pub fn new(name: &str) -> Result<Self, SyncError> {
        validate_name(name)?;
        Ok(Self {
            name: name.to_string(),
            files: BTreeMap::new(),
            directories: BTreeMap::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: &str) -> Result<(), SyncError> {
        validate_name(name)?;
        self.name = name.to_string();
        Ok(())
    }

    /// Insert a file directly below this directory
    pub fn insert_file(&mut self, file: FileEntry) -> Result<(), SyncError> {
        validate_name(&file.name)?;
        let key = file.name.to_lowercase();
        if self.directories.contains_key(&key) {
            return Err(SyncError::Validation(format!(
                "{:?} is already a directory",
                file.name
            )));
        }
        self.files.insert(key, file);
        Ok(())
    }

    /// Get or create a direct subdirectory
    pub fn directory_mut(&mut self, name: &str) -> Result<&mut DirectoryBuilder, SyncError> {
        let key = name.to_lowercase();
        if self.files.contains_key(&key) {
            return Err(SyncError::Validation(format!("{:?} is already a file", name)));
        }
        if !self.directories.contains_key(&key) {
            self.directories
                .insert(key.clone(), DirectoryBuilder::new(name)?);
        }
        self.directories
            .get_mut(&key)
            .ok_or_else(|| SyncError::not_found("Directory", name))
    }

    pub fn insert_directory(&mut self, directory: DirectoryBuilder) -> Result<(), SyncError> {
        let key = directory.name.to_lowercase();
        if self.files.contains_key(&key) {
            return Err(SyncError::Validation(format!(
                "{:?} is already a file",
                directory.name
            )));
        }
        self.directories.insert(key, directory);
        Ok(())
    }

    /// Add a directory (and its missing ancestors) at `path`
    pub fn add_directory(&mut self, path: &TreePath) -> Result<(), SyncError> {
        let mut current = self;
        for segment in path.segments() {
            current = current.directory_mut(segment)?;
        }
        Ok(())
    }

    /// Add a file at `path`, creating missing parent directories
    pub fn add_file(
        &mut self,
        path: &TreePath,
        last_write_time: DateTime<Utc>,
        length: u64,
    ) -> Result<(), SyncError> {
        let entry = FileEntry {
            name: path.name().to_string(),
            last_write_time,
            length,
        };
        self.insert_file_at(path, entry)
    }

    /// Insert a prepared entry at `path`, creating missing parents
    pub fn insert_file_at(&mut self, path: &TreePath, entry: FileEntry) -> Result<(), SyncError> {
        let parent = path
            .parent()
            .ok_or_else(|| SyncError::Validation("The root cannot be a file".to_string()))?;
        let mut current = self;
        for segment in parent.segments() {
            current = current.directory_mut(segment)?;
        }
        current.insert_file(entry)
    }

    pub fn build(self) -> DirectoryTree {
        let mut tree = DirectoryTree {
            nodes: Vec::new(),
            parents: Vec::new(),
        };
        self.build_into(None, &mut tree);
        tree
    }

    fn build_into(self, parent: Option<NodeIndex>, tree: &mut DirectoryTree) -> NodeIndex {
        let index = tree.nodes.len();
        tree.nodes.push(TreeNode::Directory(DirectoryEntry {
            name: self.name,
            children: Vec::new(),
        }));
        tree.parents.push(parent);

        let mut pending: BTreeMap<String, PendingChild> = BTreeMap::new();
        for (key, file) in self.files {
            pending.insert(key, PendingChild::File(file));
        }
        for (key, dir) in self.directories {
            pending.insert(key, PendingChild::Directory(dir));
        }

        let mut children = Vec::with_capacity(pending.len());
        for (_, child) in pending {
            match child {
                PendingChild::File(file) => {
                    children.push(tree.nodes.len());
                    tree.nodes.push(TreeNode::File(file));
                    tree.parents.push(Some(index));
                }
                PendingChild::Directory(dir) => children.push(dir.build_into(Some(index), tree)),
            }
        }
        if let TreeNode::Directory(entry) = &mut tree.nodes[index] {
            entry.children = children;
        }
        index
    }
}

/// An observed state of a file.
///
/// Two references are the same version when path (case-insensitively), write
/// time and length all match. A reference without time and length is a
/// wildcard that [`matches`](FileReference::matches) any file at its path.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileReference {
    pub path: TreePath,
    pub last_write_time: Option<DateTime<Utc>>,
    pub length: Option<u64>,
}

impl FileReference {
    pub fn new(path: TreePath, last_write_time: DateTime<Utc>, length: u64) -> Self {
        Self {
            path,
            last_write_time: Some(last_write_time),
            length: Some(length),
        }
    }

    pub fn wildcard(path: TreePath) -> Self {
        Self {
            path,
            last_write_time: None,
            length: None,
        }
    }

    pub fn is_wildcard(&self) -> bool {
        self.last_write_time.is_none() && self.length.is_none()
    }

    /// Whether `other` is a version this reference accepts
    pub fn matches(&self, other: &FileReference) -> bool {
        self.path == other.path
            && self
                .last_write_time
                .map_or(true, |t| other.last_write_time == Some(t))
            && self.length.map_or(true, |l| other.length == Some(l))
    }
}

impl PartialEq for FileReference {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
            && self.last_write_time == other.last_write_time
            && self.length == other.length
    }
}

impl Eq for FileReference {}

impl Hash for FileReference {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.path.hash(state);
        self.last_write_time.hash(state);
        self.length.hash(state);
    }
}

impl fmt::Display for FileReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.last_write_time, self.length) {
            (None, None) => write!(f, "{}@*", self.path),
            (time, length) => write!(
                f,
                "{}@{}:{}",
                self.path,
                time.map(|t| t.to_rfc3339()).unwrap_or_else(|| "*".to_string()),
                length.map(|l| l.to_string()).unwrap_or_else(|| "*".to_string())
            ),
        }
    }
}
