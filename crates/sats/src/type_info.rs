use crate::convert::{self, ConversionError};
use crate::Value;
use core::fmt;

/// The kind of a [`Value`], independent of any length or width refinements of its [`TypeInfo`].
///
/// The discriminants are part of both on-disk encodings and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum ValueKind {
    Null = 0,
    Bool = 1,
    Int = 2,
    Uint = 3,
    Float = 4,
    String = 5,
    Bytes = 6,
}

impl ValueKind {
    pub fn from_u8(tag: u8) -> Option<Self> {
        Some(match tag {
            0 => Self::Null,
            1 => Self::Bool,
            2 => Self::Int,
            3 => Self::Uint,
            4 => Self::Float,
            5 => Self::String,
            6 => Self::Bytes,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Uint => "uint",
            Self::Float => "float",
            Self::String => "string",
            Self::Bytes => "bytes",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The declared type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeInfo {
    Bool,
    /// A signed 64-bit integer.
    Int,
    /// An unsigned 64-bit integer.
    Uint,
    /// A 64-bit float.
    Float,
    /// A string of at most `max_len` characters.
    Varchar { max_len: u32 },
    /// An unbounded string.
    Text,
    /// An unbounded byte string.
    Blob,
}

impl TypeInfo {
    /// The kind of every non-null value of this type.
    pub const fn value_kind(&self) -> ValueKind {
        match self {
            Self::Bool => ValueKind::Bool,
            Self::Int => ValueKind::Int,
            Self::Uint => ValueKind::Uint,
            Self::Float => ValueKind::Float,
            Self::Varchar { .. } | Self::Text => ValueKind::String,
            Self::Blob => ValueKind::Bytes,
        }
    }

    /// TEXT and BLOB columns cannot take part in foreign keys.
    pub const fn is_text_or_blob(&self) -> bool {
        matches!(self, Self::Text | Self::Blob)
    }

    /// Returns whether `value` is already a valid, stored representation of this type.
    /// `NULL` is accepted by every type; nullability is a property of the column.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (Self::Varchar { max_len }, Value::String(s)) => s.chars().count() <= *max_len as usize,
            _ => value.kind() == self.value_kind(),
        }
    }

    /// Losslessly converts `value` into the representation of this type.
    pub fn convert(&self, value: &Value) -> Result<Value, ConversionError> {
        convert::convert(*self, value)
    }
}

impl fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool => f.write_str("BOOLEAN"),
            Self::Int => f.write_str("BIGINT"),
            Self::Uint => f.write_str("BIGINT UNSIGNED"),
            Self::Float => f.write_str("DOUBLE"),
            Self::Varchar { max_len } => write!(f, "VARCHAR({max_len})"),
            Self::Text => f.write_str("TEXT"),
            Self::Blob => f.write_str("BLOB"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_round_trip_through_tags() {
        for tag in 0..=6 {
            let kind = ValueKind::from_u8(tag).unwrap();
            assert_eq!(kind as u8, tag);
        }
        assert_eq!(ValueKind::from_u8(7), None);
    }

    #[test]
    fn varchar_enforces_length() {
        let ty = TypeInfo::Varchar { max_len: 3 };
        assert!(ty.accepts(&Value::from("abc")));
        assert!(!ty.accepts(&Value::from("abcd")));
        assert!(ty.accepts(&Value::Null));
        assert!(!ty.accepts(&Value::Int(1)));
    }
}
