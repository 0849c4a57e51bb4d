//! The contract between strata tables and a SQL engine.
//!
//! Capabilities are separate traits, all implemented by [`StrataTable`]:
//! reading ([`SqlTable`]), row edits ([`WritableTable`]), column changes ([`AlterableTable`]),
//! index changes ([`IndexAlterableTable`]) and foreign keys ([`ForeignKeyTable`],
//! [`ForeignKeyAlterableTable`]).
//! Every alteration derives one new root from the current one and publishes it once.

use crate::database::Database;
use crate::table_editor::{BatchMode, TableEditor};
use crate::Result;
use std::ops::Bound;
use std::sync::Arc;
use strata_schema::{Column, ColumnOrder, IndexConstraint, Schema};
use strata_table::{
    ForeignKeyConstraint, ForeignKeyDefinition, ReferenceOption, RootValue, Row, Table, TableError, PRIMARY_INDEX,
};

/// The key of the only partition of every table.
pub const SINGLE_PARTITION_KEY: &[u8] = b"single";

/// A slice of a table's rows that can be scanned on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partition {
    key: &'static [u8],
}

impl Partition {
    pub fn key(&self) -> &[u8] {
        self.key
    }
}

/// Yields the partitions of a table: always exactly one, keyed [`SINGLE_PARTITION_KEY`].
#[derive(Debug, Default)]
pub struct PartitionIter {
    done: bool,
}

impl Iterator for PartitionIter {
    type Item = Partition;

    fn next(&mut self) -> Option<Partition> {
        if self.done {
            return None;
        }
        self.done = true;
        Some(Partition {
            key: SINGLE_PARTITION_KEY,
        })
    }
}

/// Yields the rows of a table snapshot in primary key order.
///
/// The iterator owns its snapshot, so edits published meanwhile are not seen.
pub struct RowIter {
    table: Arc<Table>,
    last: Option<Box<[u8]>>,
}

impl RowIter {
    fn new(table: Arc<Table>) -> Self {
        Self { table, last: None }
    }
}

impl Iterator for RowIter {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        let lower = match &self.last {
            Some(last) => Bound::Excluded(&**last),
            None => Bound::Unbounded,
        };
        let (key, _) = self.table.row_data().range((lower, Bound::Unbounded)).next()?;
        let key: Box<[u8]> = key.into();
        let row = row_at(&self.table, &key);
        self.last = Some(key);
        Some(row)
    }
}

/// Reads the row under `key`, which the table's own row data just yielded.
fn row_at(table: &Table, key: &[u8]) -> Result<Row> {
    table.get_row_by_key(key)?.ok_or_else(|| {
        TableError::Invariant(format!("row data yielded key {key:02x?} with no row").into()).into()
    })
}

/// An index as reported to a SQL engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexInfo {
    pub name: Box<str>,
    pub columns: Vec<Box<str>>,
    pub unique: bool,
    pub comment: Box<str>,
}

/// The referential actions a SQL statement can name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SqlReferenceOption {
    #[default]
    DefaultAction,
    Cascade,
    NoAction,
    Restrict,
    SetNull,
    SetDefault,
}

impl TryFrom<SqlReferenceOption> for ReferenceOption {
    type Error = TableError;

    fn try_from(option: SqlReferenceOption) -> std::result::Result<Self, TableError> {
        Ok(match option {
            SqlReferenceOption::DefaultAction => ReferenceOption::DefaultAction,
            SqlReferenceOption::Cascade => ReferenceOption::Cascade,
            SqlReferenceOption::NoAction => ReferenceOption::NoAction,
            SqlReferenceOption::Restrict => ReferenceOption::Restrict,
            SqlReferenceOption::SetNull => ReferenceOption::SetNull,
            SqlReferenceOption::SetDefault => {
                return Err(TableError::UnsupportedReferenceOption {
                    option: "SET DEFAULT".into(),
                })
            }
        })
    }
}

/// A `FOREIGN KEY` clause.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SqlForeignKey {
    pub name: Box<str>,
    pub columns: Vec<Box<str>>,
    pub referenced_table: Box<str>,
    pub referenced_columns: Vec<Box<str>>,
    pub on_update: SqlReferenceOption,
    pub on_delete: SqlReferenceOption,
}

pub trait SqlTable {
    fn name(&self) -> &str;

    fn schema(&self) -> Result<Arc<Schema>>;

    fn partitions(&self) -> PartitionIter {
        PartitionIter::default()
    }

    /// Scans `partition`, which must come from [`SqlTable::partitions`].
    fn partition_rows(&self, partition: &Partition) -> Result<RowIter>;

    /// The primary key, reported as [`PRIMARY_INDEX`], followed by every secondary index.
    fn get_indexes(&self) -> Result<Vec<IndexInfo>>;
}

pub trait WritableTable: SqlTable {
    fn editor(&self) -> TableEditor<'_>;

    fn flush(&self, editor: &mut TableEditor<'_>) -> Result<()> {
        editor.flush()
    }
}

pub trait AlterableTable: SqlTable {
    fn add_column(&self, col: Column, order: Option<&ColumnOrder>) -> Result<()>;

    fn drop_column(&self, name: &str) -> Result<()>;

    fn modify_column(&self, existing: &str, col: Column, order: Option<&ColumnOrder>) -> Result<()>;
}

pub trait IndexAlterableTable: SqlTable {
    fn create_index(&self, name: Option<&str>, columns: &[&str], constraint: IndexConstraint, comment: &str)
        -> Result<()>;

    fn drop_index(&self, name: &str) -> Result<()>;

    fn rename_index(&self, from: &str, to: &str) -> Result<()>;
}

pub trait ForeignKeyTable: SqlTable {
    fn get_foreign_keys(&self) -> Result<Vec<ForeignKeyConstraint>>;
}

pub trait ForeignKeyAlterableTable: ForeignKeyTable {
    fn create_foreign_key(&self, fk: &SqlForeignKey) -> Result<()>;

    fn drop_foreign_key(&self, name: &str) -> Result<()>;
}

/// A named table of a [`Database`], read from the current root on every call.
pub struct StrataTable {
    db: Arc<Database>,
    name: Box<str>,
    batch_mode: BatchMode,
}

impl StrataTable {
    /// Binds to table `name`, which must exist in the current root.
    pub fn new(db: Arc<Database>, name: &str, batch_mode: BatchMode) -> Result<Self> {
        db.root().table(name)?;
        Ok(Self {
            db,
            name: name.into(),
            batch_mode,
        })
    }

    fn table(&self) -> Result<Arc<Table>> {
        Ok(self.db.root().table(&self.name)?.clone())
    }

    fn alter(&self, f: impl FnOnce(&RootValue, &str) -> strata_table::Result<RootValue>) -> Result<()> {
        self.db.update_root(|root| Ok((f(root, &self.name)?, ())))
    }
}

impl SqlTable for StrataTable {
    fn name(&self) -> &str {
        &self.name
    }

    fn schema(&self) -> Result<Arc<Schema>> {
        Ok(self.table()?.schema().clone())
    }

    fn partition_rows(&self, partition: &Partition) -> Result<RowIter> {
        debug_assert_eq!(partition.key(), SINGLE_PARTITION_KEY);
        Ok(RowIter::new(self.table()?))
    }

    fn get_indexes(&self) -> Result<Vec<IndexInfo>> {
        let schema = self.schema()?;
        let primary = IndexInfo {
            name: PRIMARY_INDEX.into(),
            columns: schema.pk_columns().map(|c| c.name.clone()).collect(),
            unique: true,
            comment: "".into(),
        };
        let secondary = schema.indexes().iter().map(|index| -> Result<IndexInfo> {
            Ok(IndexInfo {
                name: index.name().into(),
                columns: schema.names_of(index.tags()).map_err(TableError::from)?,
                unique: index.is_unique(),
                comment: index.comment().into(),
            })
        });
        std::iter::once(Ok(primary)).chain(secondary).collect()
    }
}

impl WritableTable for StrataTable {
    fn editor(&self) -> TableEditor<'_> {
        TableEditor::new(&self.db, &self.name, self.batch_mode)
    }
}

impl AlterableTable for StrataTable {
    fn add_column(&self, col: Column, order: Option<&ColumnOrder>) -> Result<()> {
        self.alter(|root, table| root.add_column(table, col, order))
    }

    fn drop_column(&self, name: &str) -> Result<()> {
        self.alter(|root, table| root.drop_column(table, name))
    }

    fn modify_column(&self, existing: &str, col: Column, order: Option<&ColumnOrder>) -> Result<()> {
        self.alter(|root, table| root.modify_column(table, existing, col, order))
    }
}

impl IndexAlterableTable for StrataTable {
    fn create_index(
        &self,
        name: Option<&str>,
        columns: &[&str],
        constraint: IndexConstraint,
        comment: &str,
    ) -> Result<()> {
        self.alter(|root, table| Ok(root.create_index(table, name, columns, constraint, comment)?.0))
    }

    fn drop_index(&self, name: &str) -> Result<()> {
        self.alter(|root, table| root.drop_index(table, name))
    }

    fn rename_index(&self, from: &str, to: &str) -> Result<()> {
        self.alter(|root, table| root.rename_index(table, from, to))
    }
}

impl ForeignKeyTable for StrataTable {
    fn get_foreign_keys(&self) -> Result<Vec<ForeignKeyConstraint>> {
        Ok(self.db.root().get_foreign_keys(&self.name)?)
    }
}

impl ForeignKeyAlterableTable for StrataTable {
    fn create_foreign_key(&self, fk: &SqlForeignKey) -> Result<()> {
        let def = ForeignKeyDefinition {
            name: fk.name.clone(),
            columns: fk.columns.clone(),
            referenced_table: fk.referenced_table.clone(),
            referenced_columns: fk.referenced_columns.clone(),
            on_update: fk.on_update.try_into()?,
            on_delete: fk.on_delete.try_into()?,
        };
        self.alter(|root, table| Ok(root.create_foreign_key(table, &def)?.0))
    }

    fn drop_foreign_key(&self, name: &str) -> Result<()> {
        self.alter(|root, _| root.drop_foreign_key(name))
    }
}
