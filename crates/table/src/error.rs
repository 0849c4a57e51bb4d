use enum_as_inner::EnumAsInner;
use strata_sats::buffer::DecodeError;
use strata_sats::ConversionError;
use strata_schema::{IndexConstraint, SchemaError, Tag};
use strata_store::StoreError;
use thiserror::Error;

/// Everything that can go wrong while reading or deriving tables and roots.
///
/// A failed operation never produces a root,
/// so any error leaves the state it was applied to untouched.
#[derive(Error, Debug, EnumAsInner)]
pub enum TableError {
    // Validation errors.
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("table `{name}` already exists")]
    TableAlreadyExists { name: Box<str> },
    #[error("index constraint {constraint:?} is not yet supported")]
    UnsupportedIndexConstraint { constraint: IndexConstraint },
    #[error("internal index `{name}` may not be dropped")]
    ProtectedIndex { name: Box<str> },
    #[error("cannot change the tag of existing column `{column}` from {existing} to {requested}")]
    TagImmutable {
        column: Box<str>,
        existing: Tag,
        requested: Tag,
    },
    #[error("invalid default for column `{column}`: {source}")]
    DefaultValueConversion {
        column: Box<str>,
        #[source]
        source: ConversionError,
    },
    #[error("cannot convert column `{column}`: {source}")]
    TypeConversion {
        column: Box<str>,
        #[source]
        source: ConversionError,
    },
    #[error("cannot add non-nullable column `{column}` without a default to a table with rows")]
    NotNullWithoutDefault { column: Box<str> },
    #[error("the foreign key must reference an equivalent number of columns")]
    ForeignKeyColumnCountMismatch,
    #[error("column type mismatch on `{column}` and `{referenced_column}`")]
    ForeignKeyTypeMismatch {
        column: Box<str>,
        referenced_column: Box<str>,
    },
    #[error("TEXT/BLOB are not valid types for foreign keys: `{column}`")]
    ForeignKeyTextBlob { column: Box<str> },
    #[error("cannot use SET NULL as column `{column}` is non-nullable")]
    SetNullOnNonNullable { column: Box<str> },
    #[error("\"{option}\" is not supported")]
    UnsupportedReferenceOption { option: Box<str> },
    #[error("foreign key `{fk}` has SET NULL thus column `{column}` cannot be altered to be non-nullable")]
    ForeignKeyNullabilityConflict { fk: Box<str>, column: Box<str> },
    #[error("foreign key `{name}` already exists")]
    ForeignKeyNameCollision { name: Box<str> },
    #[error("value {value} does not fit column `{column}`: {source}")]
    ValueType {
        column: Box<str>,
        value: Box<str>,
        #[source]
        source: ConversionError,
    },
    #[error("row has a value for tag {tag}, which is not a column of the table")]
    UnknownRowTag { tag: Tag },
    #[error("expected {expected} primary key values but got {found}")]
    PrimaryKeyArity { expected: usize, found: usize },

    // Integrity errors.
    #[error("duplicate unique key given: {key} for index `{index}` on column(s) ({columns})")]
    UniqueConstraintViolation {
        index: Box<str>,
        columns: Box<str>,
        key: Box<str>,
    },
    #[error("duplicate primary key given: {key}")]
    DuplicatePrimaryKey { key: Box<str> },
    #[error("cannot {action} table `{table}`: foreign key `{fk}` violated by {key}")]
    ForeignKeyViolation {
        fk: Box<str>,
        table: Box<str>,
        action: &'static str,
        key: Box<str>,
    },
    #[error("cannot drop {what} as it is used by foreign key `{fk}`")]
    ForeignKeyDependency { what: Box<str>, fk: Box<str> },
    #[error("missing index for constraint `{fk}` in the referenced table `{table}`")]
    MissingParentIndex { fk: Box<str>, table: Box<str> },
    #[error("column `{column}` cannot be null")]
    NullValue { column: Box<str> },
    #[error("foreign key cascade depth exceeded at `{fk}`")]
    CascadeDepthExceeded { fk: Box<str> },
    #[error("foreign key `{fk}` is dangling: {detail}")]
    DanglingForeignKey { fk: Box<str>, detail: Box<str> },

    // Not-found errors.
    #[error("table `{name}` not found")]
    TableNotFound { name: Box<str> },
    #[error("referenced table `{name}` does not exist")]
    ReferencedTableNotFound { name: Box<str> },
    #[error("no row with key {key}")]
    RowNotFound { key: Box<str> },
    #[error("foreign key `{name}` does not exist")]
    ForeignKeyNotFound { name: Box<str> },

    /// A broken internal invariant; this is a bug, never a user error.
    #[error("invariant violated: {0}")]
    Invariant(Box<str>),

    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

impl TableError {
    /// Errors rejected before any data is looked at.
    pub fn is_validation(&self) -> bool {
        match self {
            Self::Schema(e) => !matches!(
                e,
                SchemaError::UnknownColumn { .. } | SchemaError::UnknownTag { .. } | SchemaError::IndexNotFound { .. }
            ),
            Self::TableAlreadyExists { .. }
            | Self::UnsupportedIndexConstraint { .. }
            | Self::ProtectedIndex { .. }
            | Self::TagImmutable { .. }
            | Self::DefaultValueConversion { .. }
            | Self::TypeConversion { .. }
            | Self::NotNullWithoutDefault { .. }
            | Self::ForeignKeyColumnCountMismatch
            | Self::ForeignKeyTypeMismatch { .. }
            | Self::ForeignKeyTextBlob { .. }
            | Self::SetNullOnNonNullable { .. }
            | Self::UnsupportedReferenceOption { .. }
            | Self::ForeignKeyNullabilityConflict { .. }
            | Self::ForeignKeyNameCollision { .. }
            | Self::ValueType { .. }
            | Self::UnknownRowTag { .. }
            | Self::PrimaryKeyArity { .. } => true,
            _ => false,
        }
    }

    /// Errors found by scanning data: the attempted root is discarded.
    pub fn is_integrity(&self) -> bool {
        matches!(
            self,
            Self::UniqueConstraintViolation { .. }
                | Self::DuplicatePrimaryKey { .. }
                | Self::ForeignKeyViolation { .. }
                | Self::ForeignKeyDependency { .. }
                | Self::MissingParentIndex { .. }
                | Self::NullValue { .. }
                | Self::CascadeDepthExceeded { .. }
                | Self::DanglingForeignKey { .. }
        )
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Schema(e) => matches!(
                e,
                SchemaError::UnknownColumn { .. } | SchemaError::UnknownTag { .. } | SchemaError::IndexNotFound { .. }
            ),
            Self::TableNotFound { .. }
            | Self::ReferencedTableNotFound { .. }
            | Self::RowNotFound { .. }
            | Self::ForeignKeyNotFound { .. } => true,
            _ => false,
        }
    }

    pub(crate) fn table_not_found(name: &str) -> Self {
        Self::TableNotFound { name: name.into() }
    }
}
