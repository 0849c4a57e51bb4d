use crate::column::{Column, ColumnCollection, ColumnOrder};
use crate::error::SchemaError;
use crate::index::{Index, IndexCollection, IndexProperties};
use crate::Result;
use strata_primitives::{Tag, TagList};
use strata_sats::{codec, hash_bytes, Hash};

/// The schema of a table: its columns, primary key and secondary indexes.
///
/// Invariants:
/// - the primary key is non-empty, and every primary key tag names a non-nullable column
///   flagged [`Column::is_part_of_pk`];
/// - no two columns share a tag or, ignoring case, a name;
/// - every index covers only tags of existing columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    columns: ColumnCollection,
    pk_tags: TagList,
    indexes: IndexCollection,
}

impl Schema {
    /// Returns a schema over `columns`, whose primary key is the flagged columns in declaration order.
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        let pk_tags = columns.iter().filter(|c| c.is_part_of_pk).map(|c| c.tag).collect();
        Self::from_parts(columns, pk_tags, IndexCollection::default())
    }

    pub(crate) fn from_parts(columns: Vec<Column>, pk_tags: TagList, indexes: IndexCollection) -> Result<Self> {
        let columns = ColumnCollection::new(columns)?;
        if pk_tags.is_empty() {
            return Err(SchemaError::EmptyPrimaryKey);
        }
        for &tag in pk_tags.iter() {
            let col = columns
                .get_by_tag(tag)
                .filter(|c| c.is_part_of_pk)
                .ok_or(SchemaError::UnknownPrimaryKeyTag { tag })?;
            if col.nullable {
                return Err(SchemaError::NullablePrimaryKey { column: col.name.clone() });
            }
        }
        if let Some(col) = columns.iter().find(|c| c.is_part_of_pk && !pk_tags.contains(&c.tag)) {
            return Err(SchemaError::UnknownPrimaryKeyTag { tag: col.tag });
        }
        for index in indexes.iter() {
            if let Some(&tag) = index.tags().iter().find(|&&t| !columns.contains_tag(t)) {
                return Err(SchemaError::UnknownTag { tag });
            }
        }
        Ok(Self {
            columns,
            pk_tags,
            indexes,
        })
    }

    pub fn columns(&self) -> &ColumnCollection {
        &self.columns
    }

    /// The primary key tags, in key order.
    pub fn pk_tags(&self) -> &TagList {
        &self.pk_tags
    }

    pub fn pk_columns(&self) -> impl Iterator<Item = &Column> + '_ {
        self.pk_tags.iter().filter_map(|&t| self.columns.get_by_tag(t))
    }

    pub fn non_pk_columns(&self) -> impl Iterator<Item = &Column> + '_ {
        self.columns.iter().filter(|c| !c.is_part_of_pk)
    }

    pub fn indexes(&self) -> &IndexCollection {
        &self.indexes
    }

    pub fn get_by_tag(&self, tag: Tag) -> Option<&Column> {
        self.columns.get_by_tag(tag)
    }

    /// Looks up a column by name, ignoring case.
    pub fn get_by_name(&self, name: &str) -> Option<&Column> {
        self.columns.get_by_name_insensitive(name)
    }

    fn column_or_err(&self, name: &str) -> Result<&Column> {
        self.get_by_name(name)
            .ok_or_else(|| SchemaError::UnknownColumn { name: name.into() })
    }

    /// Maps `tags` to column names.
    pub fn names_of(&self, tags: &[Tag]) -> Result<Vec<Box<str>>> {
        tags.iter()
            .map(|&tag| {
                self.get_by_tag(tag)
                    .map(|c| c.name.clone())
                    .ok_or(SchemaError::UnknownTag { tag })
            })
            .collect()
    }

    /// Adds the non-key column `col` at the position described by `order`.
    pub fn add_column(&mut self, col: Column, order: Option<&ColumnOrder>) -> Result<()> {
        if col.is_part_of_pk {
            return Err(SchemaError::PrimaryKeyNotSupported { column: col.name });
        }
        self.columns.insert(col, order)
    }

    /// Drops the column `name`.
    ///
    /// Primary key columns cannot be dropped,
    /// and the indexes covering a column must be removed before the column.
    pub fn drop_column(&mut self, name: &str) -> Result<Column> {
        let col = self.column_or_err(name)?;
        if col.is_part_of_pk {
            return Err(SchemaError::DropPrimaryKeyColumn { column: col.name.clone() });
        }
        if let Some(index) = self.indexes.indexes_with_tag(col.tag).next() {
            return Err(SchemaError::ColumnInIndex {
                column: col.name.clone(),
                index: index.name.clone(),
            });
        }
        let tag = col.tag;
        self.columns.remove(tag)
    }

    /// Replaces the column with tag `col.tag` by `col`, returning the old definition.
    ///
    /// Primary key membership is a property of the table and is carried over from the old column.
    pub fn modify_column(&mut self, mut col: Column, order: Option<&ColumnOrder>) -> Result<Column> {
        let existing = self.get_by_tag(col.tag).ok_or(SchemaError::UnknownTag { tag: col.tag })?;
        col.is_part_of_pk = existing.is_part_of_pk;
        if col.is_part_of_pk && col.nullable {
            return Err(SchemaError::NullablePrimaryKey { column: col.name });
        }
        self.columns.replace(col, order)
    }

    /// Lazily scans for every index covering the column `name`.
    pub fn indexes_with_column(&self, name: &str) -> Result<impl Iterator<Item = &Index> + '_> {
        let tag = self.column_or_err(name)?.tag;
        Ok(self.indexes.indexes_with_tag(tag))
    }

    pub fn get_index(&self, name: &str) -> Option<&Index> {
        self.indexes.get(name)
    }

    pub fn get_index_by_tags(&self, tags: &[Tag]) -> Option<&Index> {
        self.indexes.get_index_by_tags(tags)
    }

    /// Registers an index over `tags`, which must all name columns.
    pub fn add_index(&mut self, name: &str, tags: TagList, props: IndexProperties) -> Result<Index> {
        if let Some(&tag) = tags.iter().find(|&&t| !self.columns.contains_tag(t)) {
            return Err(SchemaError::UnknownTag { tag });
        }
        self.indexes.add_index(name, tags, props).cloned()
    }

    /// Registers an index over the columns named `col_names`, resolved ignoring case.
    pub fn add_index_by_col_names(&mut self, name: &str, col_names: &[&str], props: IndexProperties) -> Result<Index> {
        self.indexes
            .add_index_by_col_names(&self.columns, name, col_names, props)
            .cloned()
    }

    pub fn remove_index(&mut self, name: &str) -> Result<Index> {
        self.indexes.remove_index(name)
    }

    pub fn rename_index(&mut self, from: &str, to: &str) -> Result<Index> {
        self.indexes.rename_index(from, to).cloned()
    }

    /// The content hash of this schema's canonical encoding.
    pub fn hash(&self) -> Hash {
        hash_bytes(codec::to_vec(self))
    }
}
