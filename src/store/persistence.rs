//! Sled-backed object persistence.
//!
//! Two sled trees: `objects` (ObjectId bytes -> encoded object) and `refs`
//! (branch name -> tip ObjectId bytes). Ref updates go through sled's
//! compare-and-swap so concurrent pushes to one branch serialize correctly.

use super::object::{ObjectBackend, ObjectVersionStore};
use crate::error::StorageError;
use crate::types::ObjectId;
use std::path::Path;
use tracing::debug;

/// Durable version store on top of sled
pub type SledVersionStore = ObjectVersionStore<SledBackend>;

impl SledVersionStore {
    /// Open (or create) a store at the given directory
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        Ok(ObjectVersionStore::new(SledBackend::open(path)?))
    }
}

pub struct SledBackend {
    db: sled::Db,
    objects: sled::Tree,
    refs: sled::Tree,
}

impl SledBackend {
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        let db = sled::open(path)?;
        let objects = db.open_tree("objects")?;
        let refs = db.open_tree("refs")?;
        debug!(path = %path.display(), "Opened sled store");
        Ok(Self { db, objects, refs })
    }

    /// Flush pending writes to disk
    pub fn flush(&self) -> Result<(), StorageError> {
        self.db.flush()?;
        Ok(())
    }
}

fn decode_id(bytes: &[u8]) -> Result<ObjectId, StorageError> {
    let hash: [u8; 32] = bytes
        .try_into()
        .map_err(|_| StorageError::Corrupt(format!("ref value has {} bytes", bytes.len())))?;
    Ok(ObjectId::from_bytes(hash))
}

impl ObjectBackend for SledBackend {
    fn get_object(&self, id: &ObjectId) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.objects.get(id.as_bytes())?.map(|v| v.to_vec()))
    }

    fn put_object(&self, id: &ObjectId, bytes: &[u8]) -> Result<(), StorageError> {
        if !self.objects.contains_key(id.as_bytes())? {
            self.objects.insert(id.as_bytes(), bytes)?;
        }
        Ok(())
    }

    fn get_ref(&self, name: &str) -> Result<Option<ObjectId>, StorageError> {
        match self.refs.get(name.as_bytes())? {
            Some(value) => Ok(Some(decode_id(&value)?)),
            None => Ok(None),
        }
    }

    fn list_refs(&self) -> Result<Vec<String>, StorageError> {
        let mut names = Vec::new();
        for key in self.refs.iter().keys() {
            let key = key?;
            let name = String::from_utf8(key.to_vec())
                .map_err(|e| StorageError::Corrupt(format!("non UTF8 ref name: {}", e)))?;
            names.push(name);
        }
        Ok(names)
    }

    fn compare_and_swap_ref(
        &self,
        name: &str,
        expected: Option<&ObjectId>,
        new: &ObjectId,
    ) -> Result<Result<(), Option<ObjectId>>, StorageError> {
        let outcome = self.refs.compare_and_swap(
            name.as_bytes(),
            expected.map(|id| &id.as_bytes()[..]),
            Some(&new.as_bytes()[..]),
        )?;
        match outcome {
            Ok(()) => {
                self.refs.flush()?;
                Ok(Ok(()))
            }
            Err(conflict) => {
                let actual = match conflict.current {
                    Some(value) => Some(decode_id(&value)?),
                    None => None,
                };
                Ok(Err(actual))
            }
        }
    }
}
