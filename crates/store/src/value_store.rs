//! Provides the interface [`ValueStore`] that tables, roots and commits use
//! to persist themselves as immutable, content-addressed objects.
//!
//! Objects are referred to by their [`Hash`],
//! which is defined through BLAKE3 on the bytes of the object.
//! Putting the same bytes twice is a no-op returning the same hash,
//! and objects are never deleted.

use crate::Result;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use strata_sats::{hash_bytes, Hash};

/// A content-addressed store of immutable byte objects.
pub trait ValueStore: Send + Sync {
    /// Insert `bytes` into the store.
    ///
    /// Returns the content address of `bytes`,
    /// which can be used in [`ValueStore::get`] to fetch them.
    fn put(&self, bytes: &[u8]) -> Result<Hash>;

    /// Returns the bytes stored at the content address `hash`, if any.
    fn get(&self, hash: &Hash) -> Result<Option<Arc<[u8]>>>;

    /// Returns whether an object is stored at `hash`.
    fn contains(&self, hash: &Hash) -> Result<bool>;
}

impl<S: ValueStore + ?Sized> ValueStore for Arc<S> {
    fn put(&self, bytes: &[u8]) -> Result<Hash> {
        (**self).put(bytes)
    }

    fn get(&self, hash: &Hash) -> Result<Option<Arc<[u8]>>> {
        (**self).get(hash)
    }

    fn contains(&self, hash: &Hash) -> Result<bool> {
        (**self).contains(hash)
    }
}

/// A value store backed by a hash map.
/// Used for tests and for databases that are never persisted.
#[derive(Default)]
pub struct MemoryValueStore {
    map: RwLock<HashMap<Hash, Arc<[u8]>>>,
}

impl MemoryValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The number of distinct objects stored.
    pub fn len(&self) -> usize {
        self.map.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ValueStore for MemoryValueStore {
    fn put(&self, bytes: &[u8]) -> Result<Hash> {
        let hash = hash_bytes(bytes);
        if !self.map.read().contains_key(&hash) {
            self.map.write().entry(hash).or_insert_with(|| bytes.into());
        }
        Ok(hash)
    }

    fn get(&self, hash: &Hash) -> Result<Option<Arc<[u8]>>> {
        Ok(self.map.read().get(hash).cloned())
    }

    fn contains(&self, hash: &Hash) -> Result<bool> {
        Ok(self.map.read().contains_key(hash))
    }
}
