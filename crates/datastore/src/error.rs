use enum_as_inner::EnumAsInner;
use std::io;
use std::path::PathBuf;
use strata_sats::buffer::DecodeError;
use strata_sats::Hash;
use strata_store::StoreError;
use strata_table::TableError;
use thiserror::Error;

#[derive(Error, Debug, EnumAsInner)]
pub enum DatastoreError {
    #[error(transparent)]
    Table(#[from] TableError),
    #[error("the current root changed underneath this operation: expected {expected}, found {found}")]
    RootConflict { expected: Hash, found: Hash },
    #[error("`{}` is not a strata repository", .0.display())]
    NotARepository(PathBuf),
    #[error("a strata repository already exists at `{}`", .0.display())]
    AlreadyInitialized(PathBuf),
    #[error("invalid revision `{0}`")]
    InvalidRevision(Box<str>),
    #[error("revision `{0}` is ambiguous")]
    AmbiguousRevision(Box<str>),
    #[error("branch `{0}` not found")]
    BranchNotFound(Box<str>),
    #[error("table(s) not found: {}", .0.join(", "))]
    TablesNotFound(Vec<String>),
    #[error("nothing to commit, staged tables match HEAD")]
    NothingToCommit,
    #[error("invalid config `{}`: {source}", path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid repository state `{}`: {source}", path.display())]
    RepoState {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error(transparent)]
    SerializeState(#[from] toml::ser::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Io(#[from] io::Error),
}
