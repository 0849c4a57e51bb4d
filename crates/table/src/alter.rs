//! Schema alteration: column add/drop/modify and index create/drop/rename.
//!
//! The [`Table`] methods rewrite one table's schema and data.
//! The [`RootValue`] methods wrap them with the checks that need the whole root,
//! such as foreign key dependencies, and return the new root.

use crate::error::TableError;
use crate::root::RootValue;
use crate::row::Row;
use crate::table::Table;
use crate::Result;
use strata_sats::Value;
use strata_schema::{Column, ColumnOrder, Index, IndexConstraint, IndexProperties, SchemaError, Tag};
use strata_store::ProllyMap;

/// Indexes whose names start with this prefix are internal and may not be dropped by users.
pub const INTERNAL_INDEX_PREFIX: &str = "dolt_";

/// Converts the default of `col` to its type. A null default is no default.
fn convert_default(col: &mut Column) -> Result<()> {
    col.default = match col.default.take() {
        None | Some(Value::Null) => None,
        Some(value) => Some(
            col.ty
                .convert(&value)
                .map_err(|source| TableError::DefaultValueConversion {
                    column: col.name.clone(),
                    source,
                })?,
        ),
    };
    Ok(())
}

fn unknown_column(name: &str) -> TableError {
    SchemaError::UnknownColumn { name: name.into() }.into()
}

impl Table {
    /// Adds the non-key column `col`, writing its default into every existing row.
    pub fn add_column(&self, mut col: Column, order: Option<&ColumnOrder>) -> Result<Table> {
        convert_default(&mut col)?;
        if !col.nullable && col.default.is_none() && !self.is_empty() {
            return Err(TableError::NotNullWithoutDefault { column: col.name });
        }
        let mut schema = (**self.schema()).clone();
        schema.add_column(col.clone(), order)?;
        let table = self.update_schema(schema);

        let table = match &col.default {
            // Nulls are not stored, so the rows are already right.
            None => table,
            Some(default) => {
                let mut rows = table.row_data().clone();
                for (pk, body) in self.row_data() {
                    let mut row = Row::decode(table.schema(), pk, body)?;
                    row.set(col.tag, default.clone());
                    rows.insert(pk, row.body(table.schema()));
                }
                log::debug!("TABLE REWRITTEN: default of {} set in {} rows", col.name, rows.len());
                table.with_row_data(rows)
            }
        };
        log::trace!("COLUMN ADDED: {}, tag: {}", col.name, col.tag);
        Ok(table)
    }

    /// Drops the column `name` along with every index covering it.
    pub fn drop_column(&self, name: &str) -> Result<Table> {
        let col = self.schema().get_by_name(name).ok_or_else(|| unknown_column(name))?.clone();
        let mut schema = (**self.schema()).clone();
        let dropped = schema
            .indexes_with_column(&col.name)?
            .map(|index| Box::<str>::from(index.name()))
            .collect::<Vec<_>>();
        for index in &dropped {
            schema.remove_index(index)?;
        }
        schema.drop_column(&col.name)?;

        let mut table = self.update_schema(schema);
        for index in &dropped {
            table = table.delete_index_row_data(index);
            log::trace!("INDEX DROPPED: {index}, with column {}", col.name);
        }
        let mut rows = table.row_data().clone();
        for (pk, body) in self.row_data() {
            let row = Row::decode(self.schema(), pk, body)?;
            if !row.is_null(col.tag) {
                rows.insert(pk, row.body(table.schema()));
            }
        }
        log::trace!("COLUMN DROPPED: {}, tag: {}", col.name, col.tag);
        Ok(table.with_row_data(rows))
    }

    /// Replaces the definition of column `existing` by `col`.
    ///
    /// `col` keeps the existing tag; an invalid tag stands for "unchanged".
    /// If the type changes or the column becomes non-nullable, every row is rewritten
    /// and every index rebuilt.
    pub fn modify_column(&self, existing: &str, mut col: Column, order: Option<&ColumnOrder>) -> Result<Table> {
        let old = self
            .schema()
            .get_by_name(existing)
            .ok_or_else(|| unknown_column(existing))?
            .clone();
        if !col.tag.is_valid() {
            col.tag = old.tag;
        } else if col.tag != old.tag {
            return Err(TableError::TagImmutable {
                column: old.name,
                existing: old.tag,
                requested: col.tag,
            });
        }
        convert_default(&mut col)?;
        let mut schema = (**self.schema()).clone();
        schema.modify_column(col, order)?;
        let col = schema.get_by_tag(old.tag).ok_or(SchemaError::UnknownTag { tag: old.tag })?.clone();
        let table = self.update_schema(schema);

        if old.ty == col.ty && (col.nullable || !old.nullable) {
            log::trace!("COLUMN MODIFIED: {}, tag: {}", col.name, col.tag);
            return Ok(table);
        }

        let mut rows = ProllyMap::new();
        for (pk, body) in self.row_data() {
            let mut row = Row::decode(self.schema(), pk, body)?;
            let value = row.remove(col.tag);
            if value.is_null() {
                if !col.nullable {
                    return Err(TableError::NullValue { column: col.name });
                }
            } else {
                let value = col.ty.convert(&value).map_err(|source| TableError::TypeConversion {
                    column: col.name.clone(),
                    source,
                })?;
                row.set(col.tag, value);
            }
            let key = row.key(table.schema());
            if rows.insert(key, row.body(table.schema())).is_some() {
                return Err(TableError::DuplicatePrimaryKey {
                    key: crate::row::DisplayValues(&row.project(table.schema().pk_tags()))
                        .to_string()
                        .into(),
                });
            }
        }
        let table = table.with_row_data(rows).rebuild_all_indexes()?;
        log::debug!("TABLE REBUILT: column {} modified, {} rows", col.name, table.row_count());
        log::trace!("COLUMN MODIFIED: {}, tag: {}", col.name, col.tag);
        Ok(table)
    }

    /// Creates an index over `columns`, resolved ignoring case, and builds its data.
    ///
    /// Without a name, the index is named after its columns.
    pub fn create_index(
        &self,
        name: Option<&str>,
        columns: &[&str],
        constraint: IndexConstraint,
        comment: &str,
    ) -> Result<(Table, Index)> {
        let unique = match constraint {
            IndexConstraint::None => false,
            IndexConstraint::Unique => true,
            constraint => return Err(TableError::UnsupportedIndexConstraint { constraint }),
        };
        let names = columns
            .iter()
            .map(|&c| {
                self.schema()
                    .get_by_name(c)
                    .map(|col| col.name.clone())
                    .ok_or_else(|| unknown_column(c))
            })
            .collect::<Result<Vec<_>>>()?;
        let name = match name {
            Some(name) if !name.is_empty() => name.to_owned(),
            _ => names.concat(),
        };
        log::trace!("INDEX CREATING: {name} on ({}), unique: {unique}", names.join(", "));

        let mut schema = (**self.schema()).clone();
        let cols = names.iter().map(|n| &**n).collect::<Vec<_>>();
        let props = IndexProperties {
            unique,
            comment: comment.into(),
        };
        let index = schema.add_index_by_col_names(&name, &cols, props)?;
        let table = self.update_schema(schema);
        let data = table.rebuild_index_row_data(&name)?;
        log::trace!("INDEX CREATED: {name}, {} entries", data.len());
        Ok((table.set_index_row_data(&name, data), index))
    }

    /// Drops the index `name` and its data.
    pub fn drop_index(&self, name: &str) -> Result<Table> {
        if name.to_ascii_lowercase().starts_with(INTERNAL_INDEX_PREFIX) {
            return Err(TableError::ProtectedIndex { name: name.into() });
        }
        log::trace!("INDEX DROPPING: {name}");
        let mut schema = (**self.schema()).clone();
        schema.remove_index(name)?;
        log::trace!("INDEX DROPPED: {name}");
        Ok(self.update_schema(schema).delete_index_row_data(name))
    }

    /// Renames the index `from` to `to`. Its data moves along unchanged.
    pub fn rename_index(&self, from: &str, to: &str) -> Result<Table> {
        let mut schema = (**self.schema()).clone();
        schema.rename_index(from, to)?;
        if from == to {
            return Ok(self.clone());
        }
        let data = self.index_row_data(from)?.clone();
        Ok(self
            .update_schema(schema)
            .delete_index_row_data(from)
            .set_index_row_data(to, data))
    }
}

impl RootValue {
    fn alter_table(&self, name: &str, alter: impl FnOnce(&Table) -> Result<Table>) -> Result<RootValue> {
        let table = alter(self.table(name)?)?;
        Ok(self.put_table(name, table))
    }

    /// The name of the column paired with `tag` by a foreign key,
    /// whose other side covers `other_tags` of `other_table`.
    fn counterpart_name(&self, tags: &[Tag], other_table: &str, other_tags: &[Tag], tag: Tag) -> Box<str> {
        tags.iter()
            .position(|&t| t == tag)
            .and_then(|i| other_tags.get(i))
            .and_then(|&t| self.get_table(other_table)?.schema().get_by_tag(t))
            .map_or_else(|| "?".into(), |c| c.name.clone())
    }

    /// Adds column `col` to `table`, generating its tag if `col.tag` is invalid.
    pub fn add_column(&self, table: &str, mut col: Column, order: Option<&ColumnOrder>) -> Result<RootValue> {
        if !col.tag.is_valid() {
            let tags = self.generate_tags_for_new_columns(table, &[(&*col.name, col.ty.value_kind())]);
            col.tag = tags[0];
        }
        self.alter_table(table, |t| t.add_column(col, order))
    }

    /// Drops column `name` of `table`, unless a foreign key uses it.
    pub fn drop_column(&self, table: &str, name: &str) -> Result<RootValue> {
        let col = self
            .table(table)?
            .schema()
            .get_by_name(name)
            .ok_or_else(|| unknown_column(name))?;
        if let Some(fk) = self.foreign_key_collection().iter().find(|fk| fk.uses_column(table, col.tag)) {
            return Err(TableError::ForeignKeyDependency {
                what: format!("column `{}`", col.name).into(),
                fk: fk.name.clone(),
            });
        }
        self.alter_table(table, |t| t.drop_column(name))
    }

    /// Modifies column `existing` of `table`.
    ///
    /// Columns used by a foreign key keep their type,
    /// and child columns of a SET NULL key stay nullable.
    pub fn modify_column(
        &self,
        table: &str,
        existing: &str,
        col: Column,
        order: Option<&ColumnOrder>,
    ) -> Result<RootValue> {
        let old = self
            .table(table)?
            .schema()
            .get_by_name(existing)
            .ok_or_else(|| unknown_column(existing))?;
        for fk in self.foreign_key_collection().iter().filter(|fk| fk.uses_column(table, old.tag)) {
            if col.ty != old.ty {
                let referenced_column = match *fk.table_name == *table && fk.table_columns.contains(&old.tag) {
                    true => self.counterpart_name(
                        &fk.table_columns,
                        &fk.referenced_table_name,
                        &fk.referenced_table_columns,
                        old.tag,
                    ),
                    false => self.counterpart_name(
                        &fk.referenced_table_columns,
                        &fk.table_name,
                        &fk.table_columns,
                        old.tag,
                    ),
                };
                return Err(TableError::ForeignKeyTypeMismatch {
                    column: col.name,
                    referenced_column,
                });
            }
            if *fk.table_name == *table && fk.table_columns.contains(&old.tag) && fk.uses_set_null() && !col.nullable {
                return Err(TableError::ForeignKeyNullabilityConflict {
                    fk: fk.name.clone(),
                    column: old.name.clone(),
                });
            }
        }
        self.alter_table(table, |t| t.modify_column(existing, col, order))
    }

    pub fn create_index(
        &self,
        table: &str,
        name: Option<&str>,
        columns: &[&str],
        constraint: IndexConstraint,
        comment: &str,
    ) -> Result<(RootValue, Index)> {
        let (new_table, index) = self.table(table)?.create_index(name, columns, constraint, comment)?;
        Ok((self.put_table(table, new_table), index))
    }

    /// Drops index `name` of `table`, unless it backs a foreign key.
    pub fn drop_index(&self, table: &str, name: &str) -> Result<RootValue> {
        if let Some(fk) = self.foreign_key_collection().iter().find(|fk| fk.uses_index(table, name)) {
            return Err(TableError::ForeignKeyDependency {
                what: format!("index `{name}`").into(),
                fk: fk.name.clone(),
            });
        }
        self.alter_table(table, |t| t.drop_index(name))
    }

    /// Renames index `from` of `table`, following the rename in every foreign key using it.
    pub fn rename_index(&self, table: &str, from: &str, to: &str) -> Result<RootValue> {
        let root = self.alter_table(table, |t| t.rename_index(from, to))?;
        if !root.foreign_key_collection().iter().any(|fk| fk.uses_index(table, from)) {
            return Ok(root);
        }
        let mut keys = root.foreign_key_collection().clone();
        keys.rename_index(table, from, to);
        Ok(root.put_foreign_key_collection(keys))
    }
}
