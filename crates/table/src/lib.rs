//! Versioned tables and the roots that hold them.
//!
//! A [`Table`] combines a schema with content-addressed row and index data.
//! A [`RootValue`] maps table names to tables and owns the foreign keys between them.
//! Both are immutable: every operation returns a new value sharing all unchanged structure,
//! so a failed operation leaves the value it started from untouched.

pub mod alter;
pub mod edit;
pub mod error;
pub mod foreign_key;
pub mod root;
pub mod row;
pub mod table;

pub use error::TableError;
pub use foreign_key::{ForeignKey, ForeignKeyCollection, ForeignKeyConstraint, ForeignKeyDefinition, ReferenceOption};
pub use root::RootValue;
pub use row::Row;
pub use table::{Table, PRIMARY_INDEX};

pub type Result<T> = core::result::Result<T, TableError>;
