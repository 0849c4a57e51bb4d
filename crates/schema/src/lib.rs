//! The schema model of a strata table.
//!
//! A [`Schema`] is a pure value: an ordered [`ColumnCollection`], the ordered primary-key tags,
//! and an [`IndexCollection`] of named secondary indexes.
//! Columns are identified by their [`Tag`], which survives renames,
//! so indexes and foreign keys refer to columns by tag and never by name or position.

mod codec;
pub mod column;
pub mod error;
pub mod identifier;
pub mod index;
pub mod schema;
pub mod tag;

pub use column::{Column, ColumnCollection, ColumnOrder};
pub use error::SchemaError;
pub use index::{Index, IndexCollection, IndexConstraint, IndexProperties};
pub use schema::Schema;
pub use strata_primitives::{Tag, TagList};

pub type Result<T> = core::result::Result<T, SchemaError>;
