//! Foreign keys: their definitions, the per-root collection, and referential integrity checks.
//!
//! A foreign key names its columns by tag, and both of its sides by index name.
//! The child side is always a secondary index over exactly the child columns.
//! The parent side is a unique secondary index over exactly the referenced columns,
//! or [`PRIMARY_INDEX`] when the referenced columns are the parent's primary key.

use crate::error::TableError;
use crate::root::RootValue;
use crate::row::DisplayValues;
use crate::table::{Table, PRIMARY_INDEX};
use crate::Result;
use std::collections::BTreeMap;
use std::fmt;
use strata_sats::buffer::{BufReader, BufWriter, DecodeError};
use strata_sats::codec::{self, Decode, Encode};
use strata_sats::{hash_bytes, key, Hash};
use strata_schema::identifier::validate_identifier;
use strata_schema::{IndexConstraint, SchemaError, Tag, TagList};

/// The action taken on child rows when their parent row is updated or deleted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ReferenceOption {
    /// No action was declared, which behaves as [`ReferenceOption::Restrict`].
    #[default]
    DefaultAction,
    Cascade,
    NoAction,
    Restrict,
    SetNull,
}

impl ReferenceOption {
    fn to_u8(self) -> u8 {
        match self {
            Self::DefaultAction => 0,
            Self::Cascade => 1,
            Self::NoAction => 2,
            Self::Restrict => 3,
            Self::SetNull => 4,
        }
    }
}

impl fmt::Display for ReferenceOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::DefaultAction => "DEFAULT",
            Self::Cascade => "CASCADE",
            Self::NoAction => "NO ACTION",
            Self::Restrict => "RESTRICT",
            Self::SetNull => "SET NULL",
        })
    }
}

/// A declared foreign key, as stored in a root.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ForeignKey {
    pub name: Box<str>,
    pub table_name: Box<str>,
    pub table_index: Box<str>,
    pub table_columns: TagList,
    pub referenced_table_name: Box<str>,
    pub referenced_table_index: Box<str>,
    pub referenced_table_columns: TagList,
    pub on_update: ReferenceOption,
    pub on_delete: ReferenceOption,
}

impl ForeignKey {
    pub fn is_self_referential(&self) -> bool {
        self.table_name == self.referenced_table_name
    }

    /// Whether either action nulls the child columns.
    pub fn uses_set_null(&self) -> bool {
        self.on_update == ReferenceOption::SetNull || self.on_delete == ReferenceOption::SetNull
    }

    /// Whether this key involves column `tag` of table `table`, on either side.
    pub fn uses_column(&self, table: &str, tag: Tag) -> bool {
        (*self.table_name == *table && self.table_columns.contains(&tag))
            || (*self.referenced_table_name == *table && self.referenced_table_columns.contains(&tag))
    }

    /// Whether this key is backed by index `index` of table `table`, on either side.
    pub fn uses_index(&self, table: &str, index: &str) -> bool {
        (*self.table_name == *table && *self.table_index == *index)
            || (*self.referenced_table_name == *table && *self.referenced_table_index == *index)
    }
}

/// The foreign keys of a root, keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForeignKeyCollection {
    keys: BTreeMap<Box<str>, ForeignKey>,
}

impl ForeignKeyCollection {
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ForeignKey> + '_ {
        self.keys.values()
    }

    pub fn get(&self, name: &str) -> Option<&ForeignKey> {
        self.keys.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.keys.contains_key(name)
    }

    /// Every key declared by `table`, including self-references.
    pub fn declared_by<'a>(&'a self, table: &'a str) -> impl Iterator<Item = &'a ForeignKey> + 'a {
        self.iter().filter(move |fk| *fk.table_name == *table)
    }

    /// Every key referencing `table`, including self-references.
    pub fn referencing<'a>(&'a self, table: &'a str) -> impl Iterator<Item = &'a ForeignKey> + 'a {
        self.iter().filter(move |fk| *fk.referenced_table_name == *table)
    }

    /// Returns the keys declared by `table` and the keys referencing it.
    pub fn keys_for_table<'a>(&'a self, table: &'a str) -> (Vec<&'a ForeignKey>, Vec<&'a ForeignKey>) {
        (self.declared_by(table).collect(), self.referencing(table).collect())
    }

    /// The first unused name of the form `{table}_ibfk_{n}`.
    pub fn next_name(&self, table: &str) -> Box<str> {
        (1..)
            .map(|n| format!("{table}_ibfk_{n}"))
            .find(|name| !self.contains(name))
            .unwrap_or_default()
            .into()
    }

    /// Adds `keys`, naming every unnamed key after its table.
    pub fn add_keys(&mut self, keys: impl IntoIterator<Item = ForeignKey>) -> Result<()> {
        for mut fk in keys {
            if fk.name.is_empty() {
                fk.name = self.next_name(&fk.table_name);
            }
            if self.contains(&fk.name) {
                return Err(TableError::ForeignKeyNameCollision { name: fk.name });
            }
            self.keys.insert(fk.name.clone(), fk);
        }
        Ok(())
    }

    pub fn remove_key_by_name(&mut self, name: &str) -> Result<ForeignKey> {
        self.keys
            .remove(name)
            .ok_or_else(|| TableError::ForeignKeyNotFound { name: name.into() })
    }

    /// Removes every key declared by `table`.
    pub fn remove_declared_by(&mut self, table: &str) {
        self.keys.retain(|_, fk| *fk.table_name != *table);
    }

    /// Adds `fk`, replacing any key of the same name.
    pub(crate) fn insert_key(&mut self, fk: ForeignKey) {
        self.keys.insert(fk.name.clone(), fk);
    }

    /// Follows the rename of index `from` to `to` on `table`.
    pub(crate) fn rename_index(&mut self, table: &str, from: &str, to: &str) {
        for fk in self.keys.values_mut() {
            if *fk.table_name == *table && *fk.table_index == *from {
                fk.table_index = to.into();
            }
            if *fk.referenced_table_name == *table && *fk.referenced_table_index == *from {
                fk.referenced_table_index = to.into();
            }
        }
    }

    pub fn hash(&self) -> Hash {
        hash_bytes(codec::to_vec(self))
    }
}

impl Encode for ReferenceOption {
    fn encode(&self, w: &mut impl BufWriter) {
        w.put_u8(self.to_u8());
    }
}

impl<'de> Decode<'de> for ReferenceOption {
    fn decode(r: &mut impl BufReader<'de>) -> std::result::Result<Self, DecodeError> {
        Ok(match r.get_u8()? {
            0 => Self::DefaultAction,
            1 => Self::Cascade,
            2 => Self::NoAction,
            3 => Self::Restrict,
            4 => Self::SetNull,
            tag => return Err(DecodeError::InvalidTag { what: "reference option", tag }),
        })
    }
}

impl Encode for ForeignKey {
    fn encode(&self, w: &mut impl BufWriter) {
        self.name.encode(w);
        self.table_name.encode(w);
        self.table_index.encode(w);
        self.table_columns.encode(w);
        self.referenced_table_name.encode(w);
        self.referenced_table_index.encode(w);
        self.referenced_table_columns.encode(w);
        self.on_update.encode(w);
        self.on_delete.encode(w);
    }
}

impl<'de> Decode<'de> for ForeignKey {
    fn decode(r: &mut impl BufReader<'de>) -> std::result::Result<Self, DecodeError> {
        Ok(Self {
            name: Decode::decode(r)?,
            table_name: Decode::decode(r)?,
            table_index: Decode::decode(r)?,
            table_columns: Decode::decode(r)?,
            referenced_table_name: Decode::decode(r)?,
            referenced_table_index: Decode::decode(r)?,
            referenced_table_columns: Decode::decode(r)?,
            on_update: Decode::decode(r)?,
            on_delete: Decode::decode(r)?,
        })
    }
}

impl Encode for ForeignKeyCollection {
    fn encode(&self, w: &mut impl BufWriter) {
        codec::put_len(w, self.keys.len());
        for fk in self.keys.values() {
            fk.encode(w);
        }
    }
}

impl<'de> Decode<'de> for ForeignKeyCollection {
    fn decode(r: &mut impl BufReader<'de>) -> std::result::Result<Self, DecodeError> {
        let keys = Vec::<ForeignKey>::decode(r)?;
        Ok(Self {
            keys: keys.into_iter().map(|fk| (fk.name.clone(), fk)).collect(),
        })
    }
}

/// Whether the parent side of `fk` holds `key`, the encoded referenced column values.
pub(crate) fn parent_has_key(fk: &ForeignKey, parent: &Table, key: &[u8]) -> Result<bool> {
    let data = match &*fk.referenced_table_index {
        PRIMARY_INDEX => parent.row_data(),
        name => parent.index_row_data(name)?,
    };
    Ok(data.prefix_iter(key).next().is_some())
}

/// The primary keys of the child rows of `fk` whose columns encode to `key`.
pub(crate) fn child_keys(fk: &ForeignKey, child: &Table, key: &[u8]) -> Result<Vec<Box<[u8]>>> {
    let data = child.index_row_data(&fk.table_index)?;
    Ok(data.prefix_iter(key).map(|(_, pk)| Box::from(pk)).collect())
}

/// Checks that every child key of `fk` with no null component exists in the parent.
pub fn constraint_is_satisfied(fk: &ForeignKey, child: &Table, parent: &Table) -> Result<()> {
    let n = fk.table_columns.len();
    for (index_key, _) in child.index_row_data(&fk.table_index)? {
        if key::has_null_prefix(index_key, n)? {
            continue;
        }
        let (prefix, _) = key::split_key(index_key, n)?;
        if !parent_has_key(fk, parent, prefix)? {
            let values = key::decode_key(prefix)?;
            return Err(TableError::ForeignKeyViolation {
                fk: fk.name.clone(),
                table: fk.table_name.clone(),
                action: "add foreign key to",
                key: DisplayValues(&values).to_string().into(),
            });
        }
    }
    Ok(())
}

/// A request to create a foreign key, naming columns and tables as a user would.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForeignKeyDefinition {
    /// The key's name; empty to have one generated.
    pub name: Box<str>,
    pub columns: Vec<Box<str>>,
    pub referenced_table: Box<str>,
    pub referenced_columns: Vec<Box<str>>,
    pub on_update: ReferenceOption,
    pub on_delete: ReferenceOption,
}

/// A foreign key with its tags resolved to current column names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyConstraint {
    pub name: Box<str>,
    pub table: Box<str>,
    pub columns: Vec<Box<str>>,
    pub referenced_table: Box<str>,
    pub referenced_columns: Vec<Box<str>>,
    pub on_update: ReferenceOption,
    pub on_delete: ReferenceOption,
}

fn resolve_columns(table: &Table, names: &[Box<str>]) -> Result<TagList> {
    names
        .iter()
        .map(|name| {
            table
                .schema()
                .get_by_name(name)
                .map(|c| c.tag)
                .ok_or_else(|| TableError::from(SchemaError::UnknownColumn { name: name.clone() }))
        })
        .collect()
}

impl RootValue {
    /// Declares a foreign key on `table`, creating the child index it needs.
    ///
    /// The child index, the key and the integrity scan all land in the one returned root.
    pub fn create_foreign_key(&self, table: &str, def: &ForeignKeyDefinition) -> Result<(RootValue, ForeignKey)> {
        if !def.name.is_empty() {
            validate_identifier("foreign key", &def.name)?;
        }
        if def.columns.is_empty() || def.columns.len() != def.referenced_columns.len() {
            return Err(TableError::ForeignKeyColumnCountMismatch);
        }
        let child = self.table(table)?;
        let child_tags = resolve_columns(child, &def.columns)?;
        let set_null = def.on_update == ReferenceOption::SetNull || def.on_delete == ReferenceOption::SetNull;
        for &tag in child_tags.iter() {
            let col = child.schema().get_by_tag(tag).ok_or(SchemaError::UnknownTag { tag })?;
            if set_null && !col.nullable {
                return Err(TableError::SetNullOnNonNullable { column: col.name.clone() });
            }
        }

        let (parent_name, parent) = self
            .get_table_insensitive(&def.referenced_table)
            .ok_or_else(|| TableError::ReferencedTableNotFound {
                name: def.referenced_table.clone(),
            })?;
        let parent_name: Box<str> = parent_name.into();
        let parent_tags = resolve_columns(parent, &def.referenced_columns)?;
        for (&tag, &parent_tag) in child_tags.iter().zip(parent_tags.iter()) {
            let col = child.schema().get_by_tag(tag).ok_or(SchemaError::UnknownTag { tag })?;
            let parent_col = parent
                .schema()
                .get_by_tag(parent_tag)
                .ok_or(SchemaError::UnknownTag { tag: parent_tag })?;
            if col.ty != parent_col.ty {
                return Err(TableError::ForeignKeyTypeMismatch {
                    column: col.name.clone(),
                    referenced_column: parent_col.name.clone(),
                });
            }
            if col.ty.is_text_or_blob() {
                return Err(TableError::ForeignKeyTextBlob { column: col.name.clone() });
            }
        }

        let name = match def.name.is_empty() {
            true => self.foreign_key_collection().next_name(table),
            false => def.name.clone(),
        };
        if self.foreign_key_collection().contains(&name) {
            return Err(TableError::ForeignKeyNameCollision { name });
        }

        // Find or create the child index, then re-read both sides from the candidate root.
        let mut root = self.clone();
        let table_index: Box<str> = match child.schema().get_index_by_tags(&child_tags) {
            Some(index) => index.name().into(),
            None => {
                let names = child.schema().names_of(&child_tags)?;
                let default_name = names.concat();
                let index_name = match child.schema().get_index(&default_name) {
                    None => default_name,
                    Some(_) => name.to_string(),
                };
                let cols = names.iter().map(|n| &**n).collect::<Vec<_>>();
                let (new_root, _) = root.create_index(table, Some(index_name.as_str()), &cols, IndexConstraint::None, "")?;
                root = new_root;
                index_name.into()
            }
        };
        let child = root.table(table)?;
        let parent = root.table(&parent_name)?;

        let referenced_table_index: Box<str> = if **parent.schema().pk_tags() == *parent_tags {
            PRIMARY_INDEX.into()
        } else {
            match parent.schema().get_index_by_tags(&parent_tags) {
                Some(index) if index.is_unique() => index.name().into(),
                _ => {
                    return Err(TableError::MissingParentIndex {
                        fk: name,
                        table: parent_name,
                    })
                }
            }
        };

        let fk = ForeignKey {
            name,
            table_name: table.into(),
            table_index,
            table_columns: child_tags,
            referenced_table_name: parent_name,
            referenced_table_index,
            referenced_table_columns: parent_tags,
            on_update: def.on_update,
            on_delete: def.on_delete,
        };
        constraint_is_satisfied(&fk, child, parent)?;

        let mut keys = root.foreign_key_collection().clone();
        keys.add_keys([fk.clone()])?;
        log::trace!("FOREIGN KEY CREATED: {}, on {}", fk.name, fk.table_name);
        Ok((root.put_foreign_key_collection(keys), fk))
    }

    /// Removes the foreign key `name`, keeping its supporting indexes.
    pub fn drop_foreign_key(&self, name: &str) -> Result<RootValue> {
        let mut keys = self.foreign_key_collection().clone();
        let fk = keys.remove_key_by_name(name)?;
        log::trace!("FOREIGN KEY DROPPED: {}, on {}", fk.name, fk.table_name);
        Ok(self.put_foreign_key_collection(keys))
    }

    /// The foreign keys declared by `table`, with tags resolved against the current schemas.
    pub fn get_foreign_keys(&self, table: &str) -> Result<Vec<ForeignKeyConstraint>> {
        let child = self.table(table)?;
        self.foreign_key_collection()
            .declared_by(table)
            .map(|fk| -> Result<ForeignKeyConstraint> {
                let dangling = |detail: String| TableError::DanglingForeignKey {
                    fk: fk.name.clone(),
                    detail: detail.into(),
                };
                let parent = self.get_table(&fk.referenced_table_name).ok_or_else(|| {
                    dangling(format!("referenced table `{}` does not exist", fk.referenced_table_name))
                })?;
                let columns = child
                    .schema()
                    .names_of(&fk.table_columns)
                    .map_err(|e| dangling(format!("in table `{table}`: {e}")))?;
                let referenced_columns = parent
                    .schema()
                    .names_of(&fk.referenced_table_columns)
                    .map_err(|e| dangling(format!("in table `{}`: {e}", fk.referenced_table_name)))?;
                Ok(ForeignKeyConstraint {
                    name: fk.name.clone(),
                    table: table.into(),
                    columns,
                    referenced_table: fk.referenced_table_name.clone(),
                    referenced_columns,
                    on_update: fk.on_update,
                    on_delete: fk.on_delete,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn fk(name: &str, table: &str, parent: &str) -> ForeignKey {
        ForeignKey {
            name: name.into(),
            table_name: table.into(),
            table_index: "parent_id".into(),
            table_columns: [2].into(),
            referenced_table_name: parent.into(),
            referenced_table_index: PRIMARY_INDEX.into(),
            referenced_table_columns: [1].into(),
            on_update: ReferenceOption::Cascade,
            on_delete: ReferenceOption::SetNull,
        }
    }

    #[test]
    fn unnamed_keys_are_numbered() {
        let mut keys = ForeignKeyCollection::default();
        keys.add_keys([fk("", "child", "parent"), fk("", "child", "parent")]).unwrap();
        keys.add_keys([fk("", "other", "parent")]).unwrap();
        let names = keys.iter().map(|k| &*k.name).collect::<Vec<_>>();
        assert_eq!(names, ["child_ibfk_1", "child_ibfk_2", "other_ibfk_1"]);

        let err = keys.add_keys([fk("child_ibfk_1", "x", "y")]).unwrap_err();
        assert!(matches!(err, TableError::ForeignKeyNameCollision { .. }));
    }

    #[test]
    fn lookups_by_table() {
        let mut keys = ForeignKeyCollection::default();
        keys.add_keys([fk("a", "child", "parent"), fk("b", "parent", "parent")]).unwrap();
        let (declared, referencing) = keys.keys_for_table("parent");
        assert_eq!(declared.iter().map(|k| &*k.name).collect::<Vec<_>>(), ["b"]);
        assert_eq!(referencing.iter().map(|k| &*k.name).collect::<Vec<_>>(), ["a", "b"]);
        assert!(keys.get("b").unwrap().is_self_referential());

        keys.rename_index("child", "parent_id", "by_parent");
        assert_eq!(&*keys.get("a").unwrap().table_index, "by_parent");
        assert_eq!(&*keys.get("b").unwrap().table_index, "parent_id");

        assert!(matches!(keys.remove_key_by_name("zzz"), Err(TableError::ForeignKeyNotFound { .. })));
        keys.remove_key_by_name("a").unwrap();
        assert_eq!(keys.len(), 1);
    }

    #[test]
    fn collection_codec() {
        let mut keys = ForeignKeyCollection::default();
        keys.add_keys([fk("a", "child", "parent"), fk("", "t", "parent")]).unwrap();
        let bytes = codec::to_vec(&keys);
        assert_eq!(codec::from_slice::<ForeignKeyCollection>(&bytes).unwrap(), keys);
        assert_ne!(keys.hash(), ForeignKeyCollection::default().hash());
    }
}
