use crate::column::ColumnCollection;
use crate::error::SchemaError;
use crate::identifier::validate_identifier;
use crate::Result;
use std::collections::BTreeMap;
use strata_primitives::{Tag, TagList};

/// A named secondary index over an ordered sequence of column tags.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Index {
    pub(crate) name: Box<str>,
    pub(crate) tags: TagList,
    pub(crate) unique: bool,
    pub(crate) comment: Box<str>,
}

impl Index {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The indexed column tags, in key order.
    pub fn tags(&self) -> &TagList {
        &self.tags
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexProperties {
    pub unique: bool,
    pub comment: Box<str>,
}

impl IndexProperties {
    pub fn unique() -> Self {
        Self {
            unique: true,
            ..Self::default()
        }
    }
}

/// The constraint requested by `CREATE INDEX`.
/// Only [`IndexConstraint::None`] and [`IndexConstraint::Unique`] are supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexConstraint {
    None,
    Unique,
    Fulltext,
    Spatial,
}

/// The secondary indexes of a schema, keyed by case-sensitive name.
///
/// No two indexes cover the same ordered tag sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct IndexCollection {
    indexes: BTreeMap<Box<str>, Index>,
}

impl IndexCollection {
    pub fn len(&self) -> usize {
        self.indexes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }

    /// Iterates the indexes sorted by name.
    pub fn iter(&self) -> impl Iterator<Item = &Index> + '_ {
        self.indexes.values()
    }

    pub fn get(&self, name: &str) -> Option<&Index> {
        self.indexes.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.indexes.contains_key(name)
    }

    /// Returns the index covering exactly `tags`, in that order.
    pub fn get_index_by_tags(&self, tags: &[Tag]) -> Option<&Index> {
        self.indexes.values().find(|idx| &*idx.tags == tags)
    }

    /// Lazily scans for every index covering `tag`.
    pub fn indexes_with_tag(&self, tag: Tag) -> impl Iterator<Item = &Index> + '_ {
        self.indexes.values().filter(move |idx| idx.tags.contains(&tag))
    }

    /// Registers a new index over `tags`.
    pub fn add_index(&mut self, name: &str, tags: TagList, props: IndexProperties) -> Result<&Index> {
        validate_identifier("index", name)?;
        if self.contains(name) {
            return Err(SchemaError::IndexNameCollision { name: name.into() });
        }
        if tags.is_empty() {
            return Err(SchemaError::EmptyIndex { name: name.into() });
        }
        if let Some(existing) = self.get_index_by_tags(&tags) {
            return Err(SchemaError::IndexColumnSetDuplicate {
                name: name.into(),
                existing: existing.name.clone(),
                tags,
            });
        }
        let index = Index {
            name: name.into(),
            tags,
            unique: props.unique,
            comment: props.comment,
        };
        Ok(self.indexes.entry(name.into()).or_insert(index))
    }

    /// Registers a new index over the columns named `col_names`,
    /// which are resolved against `cols` ignoring case.
    pub fn add_index_by_col_names(
        &mut self,
        cols: &ColumnCollection,
        name: &str,
        col_names: &[&str],
        props: IndexProperties,
    ) -> Result<&Index> {
        let tags = col_names
            .iter()
            .map(|col_name| {
                cols.get_by_name_insensitive(col_name)
                    .map(|c| c.tag)
                    .ok_or_else(|| SchemaError::UnknownColumn {
                        name: (*col_name).into(),
                    })
            })
            .collect::<Result<TagList>>()?;
        self.add_index(name, tags, props)
    }

    /// Unregisters the index `name`.
    ///
    /// The caller is responsible for deleting the index's row data.
    pub fn remove_index(&mut self, name: &str) -> Result<Index> {
        self.indexes
            .remove(name)
            .ok_or_else(|| SchemaError::IndexNotFound { name: name.into() })
    }

    /// Renames the index `from` to `to`, keeping its columns and data.
    pub fn rename_index(&mut self, from: &str, to: &str) -> Result<&Index> {
        if !self.contains(from) {
            return Err(SchemaError::IndexNotFound { name: from.into() });
        }
        if from == to {
            return Ok(&self.indexes[from]);
        }
        validate_identifier("index", to)?;
        if self.contains(to) {
            return Err(SchemaError::IndexNameCollision { name: to.into() });
        }
        let mut index = self.remove_index(from)?;
        index.name = to.into();
        Ok(self.indexes.entry(to.into()).or_insert(index))
    }

    pub(crate) fn from_indexes(indexes: impl IntoIterator<Item = Index>) -> Self {
        Self {
            indexes: indexes.into_iter().map(|idx| (idx.name.clone(), idx)).collect(),
        }
    }
}
