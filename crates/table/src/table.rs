use crate::error::TableError;
use crate::row::{DisplayValues, Row};
use crate::Result;
use itertools::Itertools;
use std::collections::BTreeMap;
use std::sync::Arc;
use strata_sats::{codec, hash_bytes, key, Hash, Value};
use strata_schema::{Index, Schema, SchemaError};
use strata_store::{ProllyMap, StoreError, ValueStore};

/// The name under which the primary key is reported alongside secondary indexes.
pub const PRIMARY_INDEX: &str = "PRIMARY";

/// An immutable table: a schema, the primary row data, and one row data map per secondary index.
///
/// Row data maps an encoded primary key to an encoded row body.
/// Index data maps the encoded indexed columns followed by the primary key
/// to the encoded primary key.
///
/// Every operation returning a `Table` leaves `self` untouched;
/// the new table shares all unchanged structure with the old one.
#[derive(Debug, Clone)]
pub struct Table {
    schema: Arc<Schema>,
    rows: ProllyMap,
    index_data: BTreeMap<Box<str>, ProllyMap>,
}

/// The stored form of a table: the hashes of its schema, row data and index data.
type TableRecord = (Hash, Hash, BTreeMap<Box<str>, Hash>);

impl Table {
    /// Returns an empty table with `schema`.
    pub fn new(schema: Schema) -> Self {
        let index_data = schema
            .indexes()
            .iter()
            .map(|index| (index.name().into(), ProllyMap::new()))
            .collect();
        Self {
            schema: Arc::new(schema),
            rows: ProllyMap::new(),
            index_data,
        }
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn row_data(&self) -> &ProllyMap {
        &self.rows
    }

    pub fn index_row_data(&self, name: &str) -> Result<&ProllyMap> {
        self.index_data
            .get(name)
            .ok_or_else(|| SchemaError::IndexNotFound { name: name.into() }.into())
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns this table with `schema` and the same data.
    ///
    /// The caller keeps the data consistent with the new schema.
    pub fn update_schema(&self, schema: Schema) -> Table {
        Table {
            schema: Arc::new(schema),
            ..self.clone()
        }
    }

    pub(crate) fn with_row_data(&self, rows: ProllyMap) -> Table {
        Table { rows, ..self.clone() }
    }

    pub fn set_index_row_data(&self, name: &str, data: ProllyMap) -> Table {
        let mut table = self.clone();
        table.index_data.insert(name.into(), data);
        table
    }

    pub fn delete_index_row_data(&self, name: &str) -> Table {
        let mut table = self.clone();
        table.index_data.remove(name);
        table
    }

    /// Builds the row data of index `name` by scanning every row.
    ///
    /// Fails with [`TableError::UniqueConstraintViolation`] if the index is unique
    /// and two rows share a non-null key.
    pub fn rebuild_index_row_data(&self, name: &str) -> Result<ProllyMap> {
        let index = self
            .schema
            .get_index(name)
            .ok_or_else(|| SchemaError::IndexNotFound { name: name.into() })?;
        let mut data = ProllyMap::new();
        for (pk, body) in &self.rows {
            let row = Row::decode(&self.schema, pk, body)?;
            let values = row.project(index.tags());
            if index.is_unique() && !values.iter().any(Value::is_null) {
                let prefix = key::encode_key(&values);
                if data.prefix_iter(&prefix).next().is_some() {
                    return Err(self.unique_violation(index, &values));
                }
            }
            data.insert(index_key(&values, pk), pk);
        }
        log::debug!("INDEX REBUILT: {name}, {} entries", data.len());
        Ok(data)
    }

    /// Rebuilds the data of every index.
    pub(crate) fn rebuild_all_indexes(&self) -> Result<Table> {
        let mut table = self.clone();
        for index in self.schema.indexes().iter() {
            let data = self.rebuild_index_row_data(index.name())?;
            table.index_data.insert(index.name().into(), data);
        }
        Ok(table)
    }

    /// Iterates the rows in primary key order.
    pub fn rows(&self) -> impl Iterator<Item = Result<Row>> + '_ {
        self.rows
            .iter()
            .map(|(pk, body)| Row::decode(&self.schema, pk, body).map_err(Into::into))
    }

    /// Encodes the primary key `pk`, converting each value to its column's type.
    pub fn key_for(&self, pk: &[Value]) -> Result<Box<[u8]>> {
        let pk_cols = self.schema.pk_tags();
        if pk.len() != pk_cols.len() {
            return Err(TableError::PrimaryKeyArity {
                expected: pk_cols.len(),
                found: pk.len(),
            });
        }
        let values = self
            .schema
            .pk_columns()
            .zip(pk)
            .map(|(col, value)| {
                col.ty.convert(value).map_err(|source| TableError::ValueType {
                    column: col.name.clone(),
                    value: value.to_string().into(),
                    source,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(key::encode_key(&values))
    }

    pub fn get_row(&self, pk: &[Value]) -> Result<Option<Row>> {
        self.get_row_by_key(&self.key_for(pk)?)
    }

    /// Reads the row stored under the encoded primary key `key`.
    pub fn get_row_by_key(&self, key: &[u8]) -> Result<Option<Row>> {
        self.rows
            .get(key)
            .map(|body| Row::decode(&self.schema, key, body))
            .transpose()
            .map_err(Into::into)
    }

    /// Validates `row` against the schema, converting its values to their column types.
    /// Missing values are filled from column defaults when `fill_defaults` is set.
    pub(crate) fn prepare_row(&self, row: &Row, fill_defaults: bool) -> Result<Row> {
        if let Some((tag, _)) = row.iter().find(|(t, _)| !self.schema.columns().contains_tag(*t)) {
            return Err(TableError::UnknownRowTag { tag });
        }
        let mut prepared = Row::new();
        for col in self.schema.columns() {
            let mut value = row.value(col.tag).clone();
            if value.is_null() && fill_defaults {
                value = col.default_value();
            }
            if value.is_null() {
                if !col.nullable {
                    return Err(TableError::NullValue {
                        column: col.name.clone(),
                    });
                }
                continue;
            }
            let value = col.ty.convert(&value).map_err(|source| TableError::ValueType {
                column: col.name.clone(),
                value: value.to_string().into(),
                source,
            })?;
            prepared.set(col.tag, value);
        }
        Ok(prepared)
    }

    fn unique_violation(&self, index: &Index, values: &[Value]) -> TableError {
        let columns = index
            .tags()
            .iter()
            .map(|&t| self.schema.get_by_tag(t).map_or("?", |c| &*c.name))
            .join(",");
        TableError::UniqueConstraintViolation {
            index: index.name().into(),
            columns: columns.into(),
            key: DisplayValues(values).to_string().into(),
        }
    }

    fn check_unique(&self, index: &Index, values: &[Value], pk: &[u8]) -> Result<()> {
        if !index.is_unique() || values.iter().any(Value::is_null) {
            return Ok(());
        }
        let data = self.index_row_data(index.name())?;
        let prefix = key::encode_key(values);
        if data.prefix_iter(&prefix).any(|(_, other)| other != pk) {
            return Err(self.unique_violation(index, values));
        }
        Ok(())
    }

    /// Adds a prepared row to the row data and every index, in place.
    fn insert_entry(&mut self, row: &Row) -> Result<()> {
        let pk = row.key(&self.schema);
        if self.rows.contains_key(&pk) {
            return Err(TableError::DuplicatePrimaryKey {
                key: DisplayValues(&row.project(self.schema.pk_tags())).to_string().into(),
            });
        }
        let schema = self.schema.clone();
        for index in schema.indexes().iter() {
            let values = row.project(index.tags());
            self.check_unique(index, &values, &pk)?;
            let data = self
                .index_data
                .get_mut(index.name())
                .ok_or_else(|| TableError::Invariant(format!("index `{}` has no data", index.name()).into()))?;
            data.insert(index_key(&values, &pk), &*pk);
        }
        self.rows.insert(pk, row.body(&schema));
        Ok(())
    }

    /// Removes the row with key `pk` from the row data and every index, in place.
    fn remove_entry(&mut self, pk: &[u8]) -> Result<Row> {
        let row = self.get_row_by_key(pk)?.ok_or_else(|| TableError::RowNotFound {
            key: key::decode_key(pk)
                .map(|values| DisplayValues(&values).to_string())
                .unwrap_or_else(|_| format!("{pk:x?}"))
                .into(),
        })?;
        self.rows.remove(pk);
        for index in self.schema.indexes().iter() {
            if let Some(data) = self.index_data.get_mut(index.name()) {
                data.remove(&index_key(&row.project(index.tags()), pk));
            }
        }
        Ok(row)
    }

    /// Inserts `row`, filling unset columns from their defaults.
    pub fn insert_row(&self, row: &Row) -> Result<Table> {
        let row = self.prepare_row(row, true)?;
        let mut table = self.clone();
        table.insert_entry(&row)?;
        Ok(table)
    }

    /// Replaces the stored row `old` by `new`, which may have a different primary key.
    pub fn update_row(&self, old: &Row, new: &Row) -> Result<Table> {
        let new = self.prepare_row(new, false)?;
        let mut table = self.clone();
        table.remove_entry(&old.key(&self.schema))?;
        table.insert_entry(&new)?;
        Ok(table)
    }

    /// Deletes the row with primary key `pk`, returning the new table and the deleted row.
    pub fn delete_row(&self, pk: &[Value]) -> Result<(Table, Row)> {
        self.delete_row_by_key(&self.key_for(pk)?)
    }

    pub(crate) fn delete_row_by_key(&self, key: &[u8]) -> Result<(Table, Row)> {
        let mut table = self.clone();
        let row = table.remove_entry(key)?;
        Ok((table, row))
    }

    /// Inserts `row`, first deleting any row with the same primary key, which is returned.
    pub fn replace_row(&self, row: &Row) -> Result<(Table, Option<Row>)> {
        let row = self.prepare_row(row, true)?;
        let mut table = self.clone();
        let pk = row.key(&self.schema);
        let old = match self.rows.contains_key(&pk) {
            true => Some(table.remove_entry(&pk)?),
            false => None,
        };
        table.insert_entry(&row)?;
        Ok((table, old))
    }

    fn record(&self) -> TableRecord {
        let indexes = self
            .index_data
            .iter()
            .map(|(name, data)| (name.clone(), data.hash()))
            .collect();
        (self.schema.hash(), self.rows.hash(), indexes)
    }

    /// The content hash of this table, identical to the hash [`Table::write_to`] returns.
    pub fn hash(&self) -> Hash {
        hash_bytes(codec::to_vec(&self.record()))
    }

    /// Persists this table's schema, row data and index data.
    pub fn write_to(&self, store: &dyn ValueStore) -> Result<Hash> {
        store.put(&codec::to_vec(&*self.schema))?;
        self.rows.write_to(store)?;
        for data in self.index_data.values() {
            data.write_to(store)?;
        }
        Ok(store.put(&codec::to_vec(&self.record()))?)
    }

    pub fn read_from(store: &dyn ValueStore, hash: &Hash) -> Result<Table> {
        let get = |hash: &Hash| store.get(hash)?.ok_or(StoreError::Missing(*hash));
        let (schema_hash, rows_hash, index_hashes) = codec::from_slice::<TableRecord>(&get(hash)?)?;
        let schema = Schema::from_bytes(&get(&schema_hash)?)?;
        let rows = ProllyMap::read_from(store, &rows_hash)?;
        let index_data = index_hashes
            .iter()
            .map(|(name, hash)| -> Result<_> { Ok((name.clone(), ProllyMap::read_from(store, hash)?)) })
            .collect::<Result<BTreeMap<_, _>>>()?;
        if let Some(index) = schema.indexes().iter().find(|i| !index_data.contains_key(i.name())) {
            return Err(TableError::Invariant(
                format!("table {hash} has no data for index `{}`", index.name()).into(),
            ));
        }
        Ok(Table {
            schema: Arc::new(schema),
            rows,
            index_data,
        })
    }
}

fn index_key(values: &[Value], pk: &[u8]) -> Vec<u8> {
    let mut key = key::encode_key(values).into_vec();
    key.extend_from_slice(pk);
    key
}
