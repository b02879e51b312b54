//! Versioned Store
//!
//! The storage collaborator every history, multi-snapshot and sync-state branch
//! is written to: a content-addressed, branch-based object store. Commits are
//! built by staging a whole tree, committing it on top of a parent, then
//! publishing it with a compare-and-swap on the branch tip.

pub mod memory;
pub mod object;
pub mod persistence;

use crate::error::StorageError;
use crate::types::{CommitId, TreeId};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::io::Cursor;

pub use memory::{MemoryBackend, MemoryVersionStore};
pub use object::{ObjectBackend, ObjectVersionStore};
pub use persistence::{SledBackend, SledVersionStore};

/// A stored file: raw content plus the timestamp the store reports for it.
///
/// The timestamp is never part of the content address; stores fill it in on
/// read (with the commit time) the way a checkout stamps files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredFile {
    pub content: Vec<u8>,
    pub last_write_time: Option<DateTime<Utc>>,
}

impl StoredFile {
    pub fn new(content: Vec<u8>) -> Self {
        Self {
            content,
            last_write_time: None,
        }
    }

    /// Byte-stream view of the content
    pub fn open(&self) -> Cursor<&[u8]> {
        Cursor::new(self.content.as_slice())
    }
}

/// Entry of a stored directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredEntry {
    File(StoredFile),
    Directory(StoredDirectory),
}

/// A directory as the store sees it: name -> entry, sorted by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredDirectory {
    pub entries: BTreeMap<String, StoredEntry>,
}

impl StoredDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_file(&mut self, name: impl Into<String>, content: Vec<u8>) {
        self.entries
            .insert(name.into(), StoredEntry::File(StoredFile::new(content)));
    }

    pub fn insert_directory(&mut self, name: impl Into<String>, directory: StoredDirectory) {
        self.entries
            .insert(name.into(), StoredEntry::Directory(directory));
    }

    pub fn file(&self, name: &str) -> Option<&StoredFile> {
        match self.entries.get(name) {
            Some(StoredEntry::File(file)) => Some(file),
            _ => None,
        }
    }

    pub fn directory(&self, name: &str) -> Option<&StoredDirectory> {
        match self.entries.get(name) {
            Some(StoredEntry::Directory(dir)) => Some(dir),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Commit metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    pub id: CommitId,
    pub parent: Option<CommitId>,
    pub tree: TreeId,
    pub message: String,
    pub time: DateTime<Utc>,
}

/// Versioned, branch-based content store interface
pub trait VersionStore: Send + Sync {
    /// Create a branch pointing at `from`, or at a fresh empty root commit.
    fn create_branch(&self, name: &str, from: Option<&CommitId>) -> Result<CommitId, StorageError>;

    fn has_branch(&self, name: &str) -> Result<bool, StorageError>;

    fn branches(&self) -> Result<Vec<String>, StorageError>;

    fn branch_tip(&self, name: &str) -> Result<CommitId, StorageError>;

    /// Commits reachable from the branch tip through first parents, oldest first.
    fn commits_on(&self, name: &str) -> Result<Vec<CommitInfo>, StorageError>;

    fn commit_info(&self, id: &CommitId) -> Result<CommitInfo, StorageError>;

    /// Whether the commit's root tree has a top-level entry called `name`.
    fn contains_entry(&self, commit: &CommitId, name: &str) -> Result<bool, StorageError>;

    fn read_tree(&self, commit: &CommitId) -> Result<StoredDirectory, StorageError>;

    /// Stage a whole tree; returns its content address.
    fn write_tree(&self, tree: &StoredDirectory) -> Result<TreeId, StorageError>;

    fn commit(
        &self,
        parent: Option<&CommitId>,
        tree: &TreeId,
        message: &str,
    ) -> Result<CommitId, StorageError>;

    /// Publish `commit` as the new tip of `branch` if the tip is still `expected_tip`.
    ///
    /// Fails with [`StorageError::TipMismatch`] when another writer got there first.
    fn push(
        &self,
        branch: &str,
        expected_tip: Option<&CommitId>,
        commit: &CommitId,
    ) -> Result<(), StorageError>;
}
