//! The strata database and repository.
//!
//! - [`Database`] holds the current working root, the one mutable cell of the system.
//! - [`sql_table`] adapts tables to what a query engine needs: partitions, row iteration,
//!   row edits through a [`TableEditor`], and schema alteration.
//! - [`Repo`] versions roots as commits, tracks the staged and working roots,
//!   and implements [`reset`].

pub mod config;
pub mod database;
pub mod error;
pub mod repo;
pub mod reset;
pub mod sql_table;
pub mod table_editor;

pub use config::Config;
pub use database::Database;
pub use error::DatastoreError;
pub use repo::{Commit, CommitMeta, DeltaKind, Repo, Status, TableDelta};
pub use reset::{reset, ResetArgs, ResetError};
pub use sql_table::StrataTable;
pub use table_editor::{BatchMode, TableEditor};

pub type Result<T> = core::result::Result<T, DatastoreError>;
