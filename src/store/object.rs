//! Content-addressed object model shared by every store backend.
//!
//! Objects are bincode-encoded and addressed by the blake3 hash of that
//! encoding. Backends only need to persist opaque bytes by id and keep a table
//! of branch refs with compare-and-swap.

use super::{CommitInfo, StoredDirectory, StoredEntry, StoredFile, VersionStore};
use crate::error::StorageError;
use crate::types::{CommitId, ObjectId, TreeId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Persistence port for objects and branch refs
pub trait ObjectBackend: Send + Sync {
    fn get_object(&self, id: &ObjectId) -> Result<Option<Vec<u8>>, StorageError>;

    /// Store encoded object bytes; storing an existing id is a no-op.
    fn put_object(&self, id: &ObjectId, bytes: &[u8]) -> Result<(), StorageError>;

    fn get_ref(&self, name: &str) -> Result<Option<ObjectId>, StorageError>;

    fn list_refs(&self) -> Result<Vec<String>, StorageError>;

    /// Swap a ref from `expected` to `new`. On failure the inner error carries
    /// the value actually found.
    fn compare_and_swap_ref(
        &self,
        name: &str,
        expected: Option<&ObjectId>,
        new: &ObjectId,
    ) -> Result<Result<(), Option<ObjectId>>, StorageError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) enum EntryKind {
    Blob,
    Tree,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct TreeRecord {
    pub name: String,
    pub kind: EntryKind,
    pub id: ObjectId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct CommitRecord {
    pub parent: Option<CommitId>,
    pub tree: TreeId,
    pub message: String,
    pub time: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) enum StoredObject {
    Blob(Vec<u8>),
    Tree(Vec<TreeRecord>),
    Commit(CommitRecord),
}

/// Encode an object and compute its id
pub(crate) fn encode_object(object: &StoredObject) -> Result<(ObjectId, Vec<u8>), StorageError> {
    let bytes = bincode::serialize(object)?;
    let id = ObjectId::from_bytes(*blake3::hash(&bytes).as_bytes());
    Ok((id, bytes))
}

/// [`VersionStore`] implemented over any [`ObjectBackend`]
pub struct ObjectVersionStore<B: ObjectBackend> {
    backend: B,
}

impl<B: ObjectBackend> ObjectVersionStore<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn put(&self, object: &StoredObject) -> Result<ObjectId, StorageError> {
        let (id, bytes) = encode_object(object)?;
        self.backend.put_object(&id, &bytes)?;
        Ok(id)
    }

    fn get(&self, id: &ObjectId) -> Result<StoredObject, StorageError> {
        let bytes = self
            .backend
            .get_object(id)?
            .ok_or(StorageError::ObjectNotFound(*id))?;
        Ok(bincode::deserialize(&bytes)?)
    }

    fn get_commit(&self, id: &CommitId) -> Result<CommitRecord, StorageError> {
        match self.get(id)? {
            StoredObject::Commit(record) => Ok(record),
            _ => Err(StorageError::UnexpectedObject {
                id: *id,
                expected: "commit",
            }),
        }
    }

    fn get_tree(&self, id: &TreeId) -> Result<Vec<TreeRecord>, StorageError> {
        match self.get(id)? {
            StoredObject::Tree(records) => Ok(records),
            _ => Err(StorageError::UnexpectedObject {
                id: *id,
                expected: "tree",
            }),
        }
    }

    fn load_directory(
        &self,
        id: &TreeId,
        time: DateTime<Utc>,
    ) -> Result<StoredDirectory, StorageError> {
        let mut directory = StoredDirectory::new();
        for record in self.get_tree(id)? {
            let entry = match record.kind {
                EntryKind::Blob => match self.get(&record.id)? {
                    StoredObject::Blob(content) => StoredEntry::File(StoredFile {
                        content,
                        last_write_time: Some(time),
                    }),
                    _ => {
                        return Err(StorageError::UnexpectedObject {
                            id: record.id,
                            expected: "blob",
                        })
                    }
                },
                EntryKind::Tree => StoredEntry::Directory(self.load_directory(&record.id, time)?),
            };
            directory.entries.insert(record.name, entry);
        }
        Ok(directory)
    }

    fn info(&self, id: CommitId, record: CommitRecord) -> CommitInfo {
        CommitInfo {
            id,
            parent: record.parent,
            tree: record.tree,
            message: record.message,
            time: record.time,
        }
    }
}

impl<B: ObjectBackend> VersionStore for ObjectVersionStore<B> {
    fn create_branch(&self, name: &str, from: Option<&CommitId>) -> Result<CommitId, StorageError> {
        if self.backend.get_ref(name)?.is_some() {
            return Err(StorageError::BranchExists(name.to_string()));
        }
        let start = match from {
            Some(id) => {
                self.get_commit(id)?;
                *id
            }
            None => {
                let tree = self.write_tree(&StoredDirectory::new())?;
                self.commit(None, &tree, &format!("Initialize branch {}", name))?
            }
        };
        match self.backend.compare_and_swap_ref(name, None, &start)? {
            Ok(()) => {
                debug!(branch = %name, tip = %start.short(), "Created branch");
                Ok(start)
            }
            Err(_) => Err(StorageError::BranchExists(name.to_string())),
        }
    }

    fn has_branch(&self, name: &str) -> Result<bool, StorageError> {
        Ok(self.backend.get_ref(name)?.is_some())
    }

    fn branches(&self) -> Result<Vec<String>, StorageError> {
        let mut refs = self.backend.list_refs()?;
        refs.sort();
        Ok(refs)
    }

    fn branch_tip(&self, name: &str) -> Result<CommitId, StorageError> {
        self.backend
            .get_ref(name)?
            .ok_or_else(|| StorageError::BranchNotFound(name.to_string()))
    }

    fn commits_on(&self, name: &str) -> Result<Vec<CommitInfo>, StorageError> {
        let mut commits = Vec::new();
        let mut next = Some(self.branch_tip(name)?);
        while let Some(id) = next {
            let record = self.get_commit(&id)?;
            next = record.parent;
            commits.push(self.info(id, record));
        }
        commits.reverse();
        Ok(commits)
    }

    fn commit_info(&self, id: &CommitId) -> Result<CommitInfo, StorageError> {
        let record = self.get_commit(id)?;
        Ok(self.info(*id, record))
    }

    fn contains_entry(&self, commit: &CommitId, name: &str) -> Result<bool, StorageError> {
        let record = self.get_commit(commit)?;
        Ok(self
            .get_tree(&record.tree)?
            .iter()
            .any(|entry| entry.name == name))
    }

    fn read_tree(&self, commit: &CommitId) -> Result<StoredDirectory, StorageError> {
        let record = self.get_commit(commit)?;
        self.load_directory(&record.tree, record.time)
    }

    fn write_tree(&self, tree: &StoredDirectory) -> Result<TreeId, StorageError> {
        let mut records = Vec::with_capacity(tree.entries.len());
        for (name, entry) in &tree.entries {
            let (kind, id) = match entry {
                StoredEntry::File(file) => {
                    (EntryKind::Blob, self.put(&StoredObject::Blob(file.content.clone()))?)
                }
                StoredEntry::Directory(dir) => (EntryKind::Tree, self.write_tree(dir)?),
            };
            records.push(TreeRecord {
                name: name.clone(),
                kind,
                id,
            });
        }
        self.put(&StoredObject::Tree(records))
    }

    fn commit(
        &self,
        parent: Option<&CommitId>,
        tree: &TreeId,
        message: &str,
    ) -> Result<CommitId, StorageError> {
        if let Some(parent) = parent {
            self.get_commit(parent)?;
        }
        self.get_tree(tree)?;
        self.put(&StoredObject::Commit(CommitRecord {
            parent: parent.copied(),
            tree: *tree,
            message: message.to_string(),
            time: Utc::now(),
        }))
    }

    fn push(
        &self,
        branch: &str,
        expected_tip: Option<&CommitId>,
        commit: &CommitId,
    ) -> Result<(), StorageError> {
        self.get_commit(commit)?;
        match self
            .backend
            .compare_and_swap_ref(branch, expected_tip, commit)?
        {
            Ok(()) => {
                debug!(branch = %branch, tip = %commit.short(), "Pushed commit");
                Ok(())
            }
            Err(actual) => Err(StorageError::TipMismatch {
                branch: branch.to_string(),
                expected: expected_tip.copied(),
                actual,
            }),
        }
    }
}
