use crate::error::DatastoreError;
use crate::Result;
use parking_lot::RwLock;
use std::sync::Arc;
use strata_sats::Hash;
use strata_store::{MemoryValueStore, ValueStore};
use strata_table::RootValue;

/// A database: a value store and the current working root.
///
/// The current root is the only mutable state. Readers take a snapshot with [`Database::root`]
/// and keep a consistent view for as long as they hold it.
/// Writers derive a new root from a snapshot and publish it.
pub struct Database {
    store: Arc<dyn ValueStore>,
    root: RwLock<RootValue>,
}

impl Database {
    pub fn new(store: Arc<dyn ValueStore>, root: RootValue) -> Self {
        Self {
            store,
            root: RwLock::new(root),
        }
    }

    /// An empty database backed by a [`MemoryValueStore`].
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryValueStore::new()), RootValue::new())
    }

    pub fn store(&self) -> &Arc<dyn ValueStore> {
        &self.store
    }

    /// A snapshot of the current root.
    pub fn root(&self) -> RootValue {
        self.root.read().clone()
    }

    /// Publishes `root` unconditionally. The last writer wins.
    pub fn set_root(&self, root: RootValue) {
        log_published(&root);
        *self.root.write() = root;
    }

    /// Publishes `root` only if the current root still hashes to `expected`.
    pub fn compare_and_set_root(&self, expected: Hash, root: RootValue) -> Result<()> {
        let mut current = self.root.write();
        let found = current.hash();
        if found != expected {
            return Err(DatastoreError::RootConflict { expected, found });
        }
        log_published(&root);
        *current = root;
        Ok(())
    }

    /// Derives a new root from the current one with `f` and publishes it,
    /// holding off other writers meanwhile.
    ///
    /// If `f` fails, nothing is published.
    pub fn update_root<T>(&self, f: impl FnOnce(&RootValue) -> Result<(RootValue, T)>) -> Result<T> {
        let mut current = self.root.write();
        let (root, out) = f(&current)?;
        log_published(&root);
        *current = root;
        Ok(out)
    }

    /// Persists the current root, returning its hash.
    pub fn write_root(&self) -> Result<Hash> {
        Ok(self.root().write_to(&*self.store)?)
    }
}

fn log_published(root: &RootValue) {
    if log::log_enabled!(log::Level::Trace) {
        log::trace!("ROOT PUBLISHED: {}", root.hash());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_sats::TypeInfo;
    use strata_schema::{Column, Schema};

    fn schema() -> Schema {
        Schema::new(vec![Column::primary_key(1u64, "id", TypeInfo::Int)]).unwrap()
    }

    #[test]
    fn failed_updates_publish_nothing() {
        let db = Database::in_memory();
        let before = db.root().hash();
        let err = db
            .update_root(|root| Ok((root.create_table("bad name", schema())?, ())))
            .unwrap_err();
        assert!(matches!(err, DatastoreError::Table(_)));
        assert_eq!(db.root().hash(), before);

        db.update_root(|root| Ok((root.create_table("t", schema())?, ()))).unwrap();
        assert!(db.root().has_table("t"));
    }

    #[test]
    fn compare_and_set_fences_on_the_expected_root() {
        let db = Database::in_memory();
        let snapshot = db.root();
        let expected = snapshot.hash();
        db.set_root(snapshot.create_table("a", schema()).unwrap());

        let err = db
            .compare_and_set_root(expected, snapshot.create_table("b", schema()).unwrap())
            .unwrap_err();
        assert!(matches!(err, DatastoreError::RootConflict { .. }));
        assert!(db.root().has_table("a"));

        let current = db.root();
        db.compare_and_set_root(current.hash(), current.create_table("b", schema()).unwrap())
            .unwrap();
        assert!(db.root().has_table("a") && db.root().has_table("b"));
    }
}
