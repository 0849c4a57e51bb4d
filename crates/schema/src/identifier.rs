use crate::error::SchemaError;
use regex::Regex;

/// The grammar shared by table, index and foreign key names.
pub const IDENTIFIER_REGEX_STR: &str = "^[a-zA-Z]{1}$|^[a-zA-Z_]+[-_0-9a-zA-Z]*[0-9a-zA-Z]+$";

lazy_static::lazy_static! {
    static ref IDENTIFIER_REGEX: Regex = Regex::new(IDENTIFIER_REGEX_STR).unwrap();
}

/// Returns whether `name` is a valid table, index or foreign key name.
pub fn is_valid_identifier(name: &str) -> bool {
    IDENTIFIER_REGEX.is_match(name)
}

/// Validates that `name` may be used to name a `kind` entity.
pub fn validate_identifier(kind: &'static str, name: &str) -> Result<(), SchemaError> {
    if is_valid_identifier(name) {
        Ok(())
    } else {
        Err(SchemaError::InvalidIdentifier { kind, name: name.into() })
    }
}
