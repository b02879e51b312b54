//! In-memory object backend.

use super::object::{ObjectBackend, ObjectVersionStore};
use crate::error::StorageError;
use crate::heads::BranchHeads;
use crate::types::ObjectId;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Version store kept entirely in memory
pub type MemoryVersionStore = ObjectVersionStore<MemoryBackend>;

impl MemoryVersionStore {
    pub fn in_memory() -> Self {
        ObjectVersionStore::new(MemoryBackend::new())
    }
}

#[derive(Default)]
pub struct MemoryBackend {
    objects: RwLock<HashMap<ObjectId, Vec<u8>>>,
    heads: RwLock<BranchHeads>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn object_count(&self) -> usize {
        self.objects.read().len()
    }
}

impl ObjectBackend for MemoryBackend {
    fn get_object(&self, id: &ObjectId) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.objects.read().get(id).cloned())
    }

    fn put_object(&self, id: &ObjectId, bytes: &[u8]) -> Result<(), StorageError> {
        self.objects
            .write()
            .entry(*id)
            .or_insert_with(|| bytes.to_vec());
        Ok(())
    }

    fn get_ref(&self, name: &str) -> Result<Option<ObjectId>, StorageError> {
        Ok(self.heads.read().get_head(name))
    }

    fn list_refs(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.heads.read().branch_names())
    }

    fn compare_and_swap_ref(
        &self,
        name: &str,
        expected: Option<&ObjectId>,
        new: &ObjectId,
    ) -> Result<Result<(), Option<ObjectId>>, StorageError> {
        Ok(self.heads.write().compare_and_swap(name, expected, new))
    }
}
