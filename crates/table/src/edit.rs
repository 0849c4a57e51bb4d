//! Row edits on a root.
//!
//! Foreign keys span tables, so row edits that must honor them are root operations:
//! a child row needs its parent, and changing a parent row applies the key's
//! referential action to its children, recursively.

use crate::error::TableError;
use crate::foreign_key::{child_keys, parent_has_key, ForeignKey, ReferenceOption};
use crate::root::RootValue;
use crate::row::{DisplayValues, Row};
use crate::Result;
use strata_sats::{key, Value};

/// How deep cascading actions may recurse.
pub const MAX_CASCADE_DEPTH: usize = 15;

impl RootValue {
    /// Inserts `row` into `table`. Every foreign key declared by `table` must find its parent.
    pub fn insert_row(&self, table: &str, row: &Row) -> Result<RootValue> {
        let mut root = self.clone();
        root.insert_in_place(table, row)?;
        Ok(root)
    }

    /// Replaces the stored row of `table` with the primary key of `old` by `new`.
    pub fn update_row(&self, table: &str, old: &Row, new: &Row) -> Result<RootValue> {
        let t = self.table(table)?;
        let key = t.key_for(&old.project(t.schema().pk_tags()))?;
        let stored = t.get_row_by_key(&key)?.ok_or_else(|| TableError::RowNotFound {
            key: DisplayValues(&old.project(t.schema().pk_tags())).to_string().into(),
        })?;
        let mut root = self.clone();
        root.update_in_place(table, &stored, new, 0)?;
        Ok(root)
    }

    /// Deletes the row of `table` with primary key `pk`.
    pub fn delete_row(&self, table: &str, pk: &[Value]) -> Result<RootValue> {
        let key = self.table(table)?.key_for(pk)?;
        let mut root = self.clone();
        root.delete_in_place(table, &key, 0)?;
        Ok(root)
    }

    /// Deletes the row of `table` sharing the primary key of `row`, if any, then inserts `row`.
    pub fn replace_row(&self, table: &str, row: &Row) -> Result<RootValue> {
        let t = self.table(table)?;
        let row = t.prepare_row(row, true)?;
        let key = row.key(t.schema());
        let exists = t.row_data().contains_key(&key);
        let mut root = self.clone();
        if exists {
            root.delete_in_place(table, &key, 0)?;
        }
        root.insert_in_place(table, &row)?;
        Ok(root)
    }

    fn insert_in_place(&mut self, table: &str, row: &Row) -> Result<()> {
        let t = self.table(table)?;
        let row = t.prepare_row(row, true)?;
        let next = t.insert_row(&row)?;
        *self = self.put_table(table, next);
        self.check_parents(table, &row, None, "insert into")
    }

    fn update_in_place(&mut self, table: &str, old: &Row, new: &Row, depth: usize) -> Result<()> {
        let t = self.table(table)?;
        let new = t.prepare_row(new, false)?;
        let next = t.update_row(old, &new)?;
        *self = self.put_table(table, next);
        self.check_parents(table, &new, Some(old), "update")?;
        self.apply_referential_actions(table, old, Some(&new), depth)
    }

    fn delete_in_place(&mut self, table: &str, key: &[u8], depth: usize) -> Result<()> {
        let (next, old) = self.table(table)?.delete_row_by_key(key)?;
        *self = self.put_table(table, next);
        self.apply_referential_actions(table, &old, None, depth)
    }

    /// Checks that every foreign key declared by `table` finds the parent of `row`.
    /// Keys with a null component, or whose columns are unchanged from `old`, are skipped.
    fn check_parents(&self, table: &str, row: &Row, old: Option<&Row>, action: &'static str) -> Result<()> {
        for fk in self.foreign_key_collection().declared_by(table) {
            let values = row.project(&fk.table_columns);
            if values.iter().any(Value::is_null) || old.is_some_and(|old| old.project(&fk.table_columns) == values) {
                continue;
            }
            let parent = self.table(&fk.referenced_table_name)?;
            if !parent_has_key(fk, parent, &key::encode_key(&values))? {
                return Err(TableError::ForeignKeyViolation {
                    fk: fk.name.clone(),
                    table: table.into(),
                    action,
                    key: DisplayValues(&values).to_string().into(),
                });
            }
        }
        Ok(())
    }

    /// Applies the actions of every key referencing `table` to the children of `old`,
    /// which was deleted or, given `new`, updated.
    fn apply_referential_actions(&mut self, table: &str, old: &Row, new: Option<&Row>, depth: usize) -> Result<()> {
        let keys = self
            .foreign_key_collection()
            .referencing(table)
            .cloned()
            .collect::<Vec<ForeignKey>>();
        for fk in keys {
            let old_values = old.project(&fk.referenced_table_columns);
            let new_values = new.map(|new| new.project(&fk.referenced_table_columns));
            if old_values.iter().any(Value::is_null) || new_values.as_ref() == Some(&old_values) {
                continue;
            }
            let children = child_keys(&fk, self.table(&fk.table_name)?, &key::encode_key(&old_values))?;
            if children.is_empty() {
                continue;
            }
            let (option, action) = match new {
                None => (fk.on_delete, "delete from"),
                Some(_) => (fk.on_update, "update"),
            };
            if !matches!(option, ReferenceOption::Cascade | ReferenceOption::SetNull) {
                return Err(TableError::ForeignKeyViolation {
                    fk: fk.name,
                    table: table.into(),
                    action,
                    key: DisplayValues(&old_values).to_string().into(),
                });
            }
            if depth >= MAX_CASCADE_DEPTH {
                return Err(TableError::CascadeDepthExceeded { fk: fk.name });
            }
            log::trace!("FOREIGN KEY {option}: {}, {} child rows", fk.name, children.len());
            for child_key in children {
                // An earlier action in this loop may have removed the row already.
                let Some(child) = self.table(&fk.table_name)?.get_row_by_key(&child_key)? else {
                    continue;
                };
                match (option, &new_values) {
                    (ReferenceOption::Cascade, None) => self.delete_in_place(&fk.table_name, &child_key, depth + 1)?,
                    (ReferenceOption::Cascade, Some(values)) => {
                        let mut updated = child.clone();
                        for (&tag, value) in fk.table_columns.iter().zip(values) {
                            updated.set(tag, value.clone());
                        }
                        self.update_in_place(&fk.table_name, &child, &updated, depth + 1)?;
                    }
                    _ => {
                        let mut updated = child.clone();
                        for &tag in fk.table_columns.iter() {
                            updated.remove(tag);
                        }
                        self.update_in_place(&fk.table_name, &child, &updated, depth + 1)?;
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foreign_key::ForeignKeyDefinition;
    use pretty_assertions::assert_eq;
    use strata_sats::TypeInfo;
    use strata_schema::{Column, Schema, Tag};

    fn customers_and_orders(on_delete: ReferenceOption, on_update: ReferenceOption) -> RootValue {
        let customers = Schema::new(vec![
            Column::primary_key(1u64, "id", TypeInfo::Int),
            Column::new(2u64, "name", TypeInfo::Text),
        ])
        .unwrap();
        let orders = Schema::new(vec![
            Column::primary_key(10u64, "id", TypeInfo::Int),
            Column::new(11u64, "customer_id", TypeInfo::Int),
        ])
        .unwrap();
        let root = RootValue::new()
            .create_table("customers", customers)
            .unwrap()
            .create_table("orders", orders)
            .unwrap()
            .insert_row("customers", &Row::new().with(1u64, 1i64).with(2u64, "ann"))
            .unwrap()
            .insert_row("customers", &Row::new().with(1u64, 2i64).with(2u64, "bob"))
            .unwrap();
        let def = ForeignKeyDefinition {
            columns: vec!["customer_id".into()],
            referenced_table: "customers".into(),
            referenced_columns: vec!["id".into()],
            on_delete,
            on_update,
            ..Default::default()
        };
        let (root, _) = root.create_foreign_key("orders", &def).unwrap();
        [(100, 1), (101, 1), (102, 2)].into_iter().fold(root, |root, (id, customer)| {
            root.insert_row("orders", &Row::new().with(10u64, id as i64).with(11u64, customer as i64))
                .unwrap()
        })
    }

    fn customer_ids(root: &RootValue) -> Vec<Value> {
        root.table("orders")
            .unwrap()
            .rows()
            .map(|row| row.unwrap().value(Tag(11)).clone())
            .collect()
    }

    #[test]
    fn children_need_a_parent() {
        let root = customers_and_orders(ReferenceOption::Restrict, ReferenceOption::Restrict);
        let err = root
            .insert_row("orders", &Row::new().with(10u64, 200i64).with(11u64, 9i64))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "cannot insert into table `orders`: foreign key `orders_ibfk_1` violated by [9]"
        );
        // A null reference needs no parent.
        root.insert_row("orders", &Row::new().with(10u64, 200i64)).unwrap();
    }

    #[test]
    fn restrict_keeps_referenced_parents() {
        let root = customers_and_orders(ReferenceOption::DefaultAction, ReferenceOption::NoAction);
        let err = root.delete_row("customers", &[Value::Int(1)]).unwrap_err();
        assert!(matches!(err, TableError::ForeignKeyViolation { action: "delete from", .. }));

        let ann = Row::new().with(1u64, 1i64).with(2u64, "ann");
        let err = root
            .update_row("customers", &ann, &Row::new().with(1u64, 5i64).with(2u64, "ann"))
            .unwrap_err();
        assert!(matches!(err, TableError::ForeignKeyViolation { action: "update", .. }));
        // Changing other columns is fine.
        root.update_row("customers", &ann, &Row::new().with(1u64, 1i64).with(2u64, "anne"))
            .unwrap();
    }

    #[test]
    fn cascades_follow_the_parent() {
        let root = customers_and_orders(ReferenceOption::Cascade, ReferenceOption::Cascade);
        let ann = Row::new().with(1u64, 1i64).with(2u64, "ann");
        let moved = root
            .update_row("customers", &ann, &Row::new().with(1u64, 7i64).with(2u64, "ann"))
            .unwrap();
        assert_eq!(customer_ids(&moved), [Value::Int(7), Value::Int(7), Value::Int(2)]);

        let deleted = root.delete_row("customers", &[Value::Int(1)]).unwrap();
        assert_eq!(customer_ids(&deleted), [Value::Int(2)]);
    }

    #[test]
    fn set_null_orphans_children() {
        let root = customers_and_orders(ReferenceOption::SetNull, ReferenceOption::Restrict);
        let root = root.delete_row("customers", &[Value::Int(1)]).unwrap();
        assert_eq!(customer_ids(&root), [Value::Null, Value::Null, Value::Int(2)]);
    }

    #[test]
    fn replace_deletes_first() {
        let root = customers_and_orders(ReferenceOption::Cascade, ReferenceOption::Cascade);
        let root = root
            .replace_row("customers", &Row::new().with(1u64, 1i64).with(2u64, "anne"))
            .unwrap();
        assert_eq!(customer_ids(&root), [Value::Int(2)]);
        assert_eq!(root.table("customers").unwrap().row_count(), 2);
    }

    #[test]
    fn cascades_are_bounded() {
        let schema = Schema::new(vec![
            Column::primary_key(1u64, "id", TypeInfo::Int),
            Column::new(2u64, "parent", TypeInfo::Int),
        ])
        .unwrap();
        let root = RootValue::new().create_table("tree", schema).unwrap();
        let def = ForeignKeyDefinition {
            name: "up".into(),
            columns: vec!["parent".into()],
            referenced_table: "tree".into(),
            referenced_columns: vec!["id".into()],
            on_delete: ReferenceOption::Cascade,
            ..Default::default()
        };
        let (root, fk) = root.create_foreign_key("tree", &def).unwrap();
        assert!(fk.is_self_referential());
        let chain = |len: i64| {
            (0..len).fold(root.clone(), |root, id| {
                let row = Row::new().with(1u64, id).with(2u64, (id > 0).then(|| id - 1));
                root.insert_row("tree", &row).unwrap()
            })
        };

        let short = chain(10).delete_row("tree", &[Value::Int(0)]).unwrap();
        assert!(short.table("tree").unwrap().is_empty());
        let err = chain(20).delete_row("tree", &[Value::Int(0)]).unwrap_err();
        assert!(matches!(err, TableError::CascadeDepthExceeded { .. }));
    }
}
