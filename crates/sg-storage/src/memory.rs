//! In-memory object store.

use crate::{ObjectLocation, ObjectStore, StorageError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Clones share the same objects.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    objects: Arc<RwLock<HashMap<(String, String), StoredObject>>>,
}

fn poisoned<T>(_: T) -> StorageError {
    StorageError::Backend("lock poisoned".into())
}

fn key_of(location: &ObjectLocation) -> (String, String) {
    (location.bucket.clone(), location.key.clone())
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, location: &ObjectLocation) -> Option<StoredObject> {
        self.objects.read().ok()?.get(&key_of(location)).cloned()
    }

    pub fn len(&self) -> usize {
        self.objects.read().map(|o| o.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn exists(&self, location: &ObjectLocation) -> Result<bool, StorageError> {
        let objects = self.objects.read().map_err(poisoned)?;
        Ok(objects.contains_key(&key_of(location)))
    }

    async fn delete(&self, location: &ObjectLocation) -> Result<(), StorageError> {
        let mut objects = self.objects.write().map_err(poisoned)?;
        objects.remove(&key_of(location));
        Ok(())
    }

    async fn put(
        &self,
        location: &ObjectLocation,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let mut objects = self.objects.write().map_err(poisoned)?;
        objects.insert(
            key_of(location),
            StoredObject {
                bytes,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }
}
