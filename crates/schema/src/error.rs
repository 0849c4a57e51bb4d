use crate::identifier::IDENTIFIER_REGEX_STR;
use strata_primitives::{Tag, TagList};
use strata_sats::buffer::DecodeError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("invalid {kind} name `{name}` as it must match the regular expression {}", IDENTIFIER_REGEX_STR)]
    InvalidIdentifier { kind: &'static str, name: Box<str> },
    #[error("a table must have at least one primary key column")]
    EmptyPrimaryKey,
    #[error("primary key column `{column}` cannot be nullable")]
    NullablePrimaryKey { column: Box<str> },
    #[error("primary key tag {tag} does not name a column")]
    UnknownPrimaryKeyTag { tag: Tag },
    #[error("column `{name}` is defined more than once")]
    DuplicateColumnName { name: Box<str> },
    #[error("tag {tag} is used by more than one column")]
    DuplicateTag { tag: Tag },
    #[error("cannot create column `{column}` with tag {tag}, the tag is already used by `{existing}`")]
    TagCollision {
        column: Box<str>,
        tag: Tag,
        existing: Box<str>,
    },
    #[error("column `{name}` does not exist")]
    UnknownColumn { name: Box<str> },
    #[error("column with tag {tag} does not exist")]
    UnknownTag { tag: Tag },
    #[error("adding primary keys is not supported: `{column}`")]
    PrimaryKeyNotSupported { column: Box<str> },
    #[error("cannot drop primary key column `{column}`")]
    DropPrimaryKeyColumn { column: Box<str> },
    #[error("cannot drop column `{column}` as it is used by index `{index}`")]
    ColumnInIndex { column: Box<str>, index: Box<str> },
    #[error("cannot place a column after `{column}`, which does not exist")]
    InvalidOrderTarget { column: Box<str> },
    #[error("index `{name}` already exists")]
    IndexNameCollision { name: Box<str> },
    #[error("cannot create index `{name}`: index `{existing}` already covers the columns {tags}")]
    IndexColumnSetDuplicate {
        name: Box<str>,
        existing: Box<str>,
        tags: TagList,
    },
    #[error("an index must cover at least one column: `{name}`")]
    EmptyIndex { name: Box<str> },
    #[error("index `{name}` does not exist")]
    IndexNotFound { name: Box<str> },
    #[error(transparent)]
    Decode(#[from] DecodeError),
}
