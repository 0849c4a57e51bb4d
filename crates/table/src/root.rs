use crate::error::TableError;
use crate::foreign_key::ForeignKeyCollection;
use crate::table::Table;
use crate::Result;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use strata_sats::{codec, hash_bytes, Hash, ValueKind};
use strata_schema::identifier::validate_identifier;
use strata_schema::{tag, Schema, Tag};
use strata_store::{StoreError, ValueStore};

/// The top-level immutable snapshot of a database: its tables and its foreign keys.
///
/// Every operation deriving a new root shares all unchanged tables with `self`.
/// Besides the tables, a root remembers every tag each table name has ever used,
/// so that generated tags never reuse the identity of a dropped column.
#[derive(Debug, Clone, Default)]
pub struct RootValue {
    tables: Arc<BTreeMap<Box<str>, Arc<Table>>>,
    foreign_keys: Arc<ForeignKeyCollection>,
    tag_history: Arc<BTreeMap<Box<str>, BTreeSet<Tag>>>,
}

/// The stored form of a root.
type RootRecord = (BTreeMap<Box<str>, Hash>, ForeignKeyCollection, BTreeMap<Box<str>, BTreeSet<Tag>>);

impl RootValue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.tables.keys().map(|name| &**name)
    }

    pub fn has_table(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    pub fn get_table(&self, name: &str) -> Option<&Arc<Table>> {
        self.tables.get(name)
    }

    /// Looks up a table ignoring case, returning its canonical name.
    /// An exact match wins over a case-insensitive one.
    pub fn get_table_insensitive(&self, name: &str) -> Option<(&str, &Arc<Table>)> {
        if let Some((name, table)) = self.tables.get_key_value(name) {
            return Some((&**name, table));
        }
        self.tables
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(n, t)| (&**n, t))
    }

    /// Like [`RootValue::get_table`], failing with [`TableError::TableNotFound`].
    pub fn table(&self, name: &str) -> Result<&Arc<Table>> {
        self.get_table(name).ok_or_else(|| TableError::table_not_found(name))
    }

    /// Returns a root where `name` maps to `table`.
    pub fn put_table(&self, name: &str, table: Table) -> RootValue {
        let mut root = self.clone();
        let history = Arc::make_mut(&mut root.tag_history).entry(name.into()).or_default();
        history.extend(table.schema().columns().tags());
        Arc::make_mut(&mut root.tables).insert(name.into(), Arc::new(table));
        root
    }

    /// Adds an empty table. Table names are unique ignoring case.
    pub fn create_table(&self, name: &str, schema: Schema) -> Result<RootValue> {
        validate_identifier("table", name)?;
        if let Some((existing, _)) = self.get_table_insensitive(name) {
            return Err(TableError::TableAlreadyExists { name: existing.into() });
        }
        log::trace!("TABLE CREATED: {name}");
        Ok(self.put_table(name, Table::new(schema)))
    }

    /// Removes table `name` and the foreign keys it declares.
    ///
    /// Fails while another table references it.
    pub fn drop_table(&self, name: &str) -> Result<RootValue> {
        self.table(name)?;
        if let Some(fk) = self
            .foreign_keys
            .referencing(name)
            .find(|fk| !fk.is_self_referential())
        {
            return Err(TableError::ForeignKeyDependency {
                what: format!("table `{name}`").into(),
                fk: fk.name.clone(),
            });
        }
        log::trace!("TABLE DROPPED: {name}");
        Ok(self.remove_table(name))
    }

    /// Removes table `name` and the foreign keys it declares, without any checks.
    pub fn remove_table(&self, name: &str) -> RootValue {
        let mut root = self.clone();
        Arc::make_mut(&mut root.tables).remove(name);
        Arc::make_mut(&mut root.foreign_keys).remove_declared_by(name);
        root
    }

    /// Returns this root with the tables `names`, and the foreign keys they declare,
    /// taken from `from`. Tables missing from `from` are removed.
    pub fn with_tables_from(&self, from: &RootValue, names: &[&str]) -> RootValue {
        let mut root = self.clone();
        for &name in names {
            match from.get_table(name) {
                Some(table) => {
                    let history = Arc::make_mut(&mut root.tag_history).entry(name.into()).or_default();
                    history.extend(table.schema().columns().tags());
                    Arc::make_mut(&mut root.tables).insert(name.into(), table.clone());
                }
                None => {
                    Arc::make_mut(&mut root.tables).remove(name);
                }
            }
            let keys = Arc::make_mut(&mut root.foreign_keys);
            keys.remove_declared_by(name);
            for fk in from.foreign_keys.declared_by(name) {
                keys.insert_key(fk.clone());
            }
        }
        root
    }

    pub fn foreign_key_collection(&self) -> &ForeignKeyCollection {
        &self.foreign_keys
    }

    pub fn put_foreign_key_collection(&self, keys: ForeignKeyCollection) -> RootValue {
        RootValue {
            foreign_keys: Arc::new(keys),
            ..self.clone()
        }
    }

    /// Every tag table `name` has ever used in this root's lineage.
    pub fn tag_history(&self, name: &str) -> Option<&BTreeSet<Tag>> {
        self.tag_history.get(name)
    }

    /// Generates tags for new columns of table `name`,
    /// avoiding every tag the table has used and every tag of its current columns.
    pub fn generate_tags_for_new_columns(&self, name: &str, new_cols: &[(&str, ValueKind)]) -> Vec<Tag> {
        let mut used = self.tag_history(name).cloned().unwrap_or_default();
        let existing_kinds = match self.get_table(name) {
            Some(table) => {
                used.extend(table.schema().columns().tags());
                table.schema().columns().iter().map(|c| c.ty.value_kind()).collect()
            }
            None => Vec::new(),
        };
        tag::generate_tags(name, &existing_kinds, new_cols, &used)
    }

    fn record(&self) -> RootRecord {
        let tables = self
            .tables
            .iter()
            .map(|(name, table)| (name.clone(), table.hash()))
            .collect();
        (tables, (*self.foreign_keys).clone(), (*self.tag_history).clone())
    }

    /// The content hash of this root, identical to the hash [`RootValue::write_to`] returns.
    pub fn hash(&self) -> Hash {
        hash_bytes(codec::to_vec(&self.record()))
    }

    /// Persists every table and the root record.
    pub fn write_to(&self, store: &dyn ValueStore) -> Result<Hash> {
        for table in self.tables.values() {
            table.write_to(store)?;
        }
        let hash = store.put(&codec::to_vec(&self.record()))?;
        log::trace!("ROOT WRITTEN: {hash}");
        Ok(hash)
    }

    pub fn read_from(store: &dyn ValueStore, hash: &Hash) -> Result<RootValue> {
        let bytes = store.get(hash)?.ok_or(StoreError::Missing(*hash))?;
        let (tables, foreign_keys, tag_history) = codec::from_slice::<RootRecord>(&bytes)?;
        let tables = tables
            .iter()
            .map(|(name, hash)| -> Result<_> { Ok((name.clone(), Arc::new(Table::read_from(store, hash)?))) })
            .collect::<Result<BTreeMap<_, _>>>()?;
        Ok(RootValue {
            tables: Arc::new(tables),
            foreign_keys: Arc::new(foreign_keys),
            tag_history: Arc::new(tag_history),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row::Row;
    use pretty_assertions::assert_eq;
    use strata_sats::TypeInfo;
    use strata_schema::Column;
    use strata_store::MemoryValueStore;

    fn schema() -> Schema {
        Schema::new(vec![
            Column::primary_key(1u64, "id", TypeInfo::Int),
            Column::new(2u64, "name", TypeInfo::Text),
        ])
        .unwrap()
    }

    #[test]
    fn tables_are_shared_between_roots() {
        let root = RootValue::new().create_table("people", schema()).unwrap();
        let root = root.create_table("pets", schema()).unwrap();
        let people = root.table("people").unwrap().insert_row(&Row::new().with(1u64, 1i64)).unwrap();
        let next = root.put_table("people", people);

        assert!(Arc::ptr_eq(root.table("pets").unwrap(), next.table("pets").unwrap()));
        assert_eq!(root.table("people").unwrap().row_count(), 0);
        assert_eq!(next.table("people").unwrap().row_count(), 1);
        assert_ne!(root.hash(), next.hash());
    }

    #[test]
    fn names_are_unique_ignoring_case() {
        let root = RootValue::new().create_table("People", schema()).unwrap();
        assert!(matches!(
            root.create_table("people", schema()),
            Err(TableError::TableAlreadyExists { .. })
        ));
        assert!(root.get_table("people").is_none());
        assert_eq!(root.get_table_insensitive("PEOPLE").map(|(n, _)| n), Some("People"));
        assert!(matches!(root.table("people"), Err(TableError::TableNotFound { .. })));
        assert!(root.create_table("bad name", schema()).unwrap_err().is_validation());
    }

    #[test]
    fn generated_tags_avoid_history() {
        let root = RootValue::new().create_table("t", schema()).unwrap();
        let tags = root.generate_tags_for_new_columns("t", &[("a", ValueKind::Int), ("b", ValueKind::Int)]);
        assert_eq!(tags.len(), 2);
        assert_ne!(tags[0], tags[1]);
        assert!(tags.iter().all(|t| !root.tag_history("t").unwrap().contains(t)));
        assert_eq!(
            tags,
            root.generate_tags_for_new_columns("t", &[("a", ValueKind::Int), ("b", ValueKind::Int)])
        );
    }

    #[test]
    fn tables_copy_between_roots() {
        let base = RootValue::new().create_table("a", schema()).unwrap();
        let edited = base
            .put_table("a", base.table("a").unwrap().insert_row(&Row::new().with(1u64, 1i64)).unwrap())
            .create_table("b", schema())
            .unwrap();
        let copied = base.with_tables_from(&edited, &["a", "b"]);
        assert_eq!(copied.hash(), edited.hash());
        let reverted = edited.with_tables_from(&base, &["a", "b"]);
        assert!(!reverted.has_table("b"));
        assert_eq!(reverted.table("a").unwrap().hash(), base.table("a").unwrap().hash());
        // The lineage of a removed table is remembered.
        assert!(reverted.tag_history("b").is_some());
    }

    #[test]
    fn write_then_read() {
        let store = MemoryValueStore::new();
        let root = RootValue::new().create_table("t", schema()).unwrap();
        let t = root.table("t").unwrap().insert_row(&Row::new().with(1u64, 7i64).with(2u64, "x")).unwrap();
        let root = root.put_table("t", t);

        let hash = root.write_to(&store).unwrap();
        assert_eq!(hash, root.hash());
        let read = RootValue::read_from(&store, &hash).unwrap();
        assert_eq!(read.hash(), hash);
        assert_eq!(read.tag_history("t"), root.tag_history("t"));
        assert!(matches!(
            RootValue::read_from(&store, &Hash::ZERO),
            Err(TableError::Store(StoreError::Missing(_)))
        ));
    }
}
