use crate::ValueKind;
use core::fmt;
use enum_as_inner::EnumAsInner;
use thiserror::Error;

/// A totally ordered `f64`.
///
/// All NaNs compare equal to each other and greater than every other float,
/// and `-0.0 == 0.0`.
pub type F64 = decorum::Total<f64>;

/// A single cell value.
///
/// Values are type erased; the column's [`crate::TypeInfo`] says how to interpret them.
/// The derived order is the order used for keys:
/// `Null` sorts before everything, and values of different kinds order by kind.
#[derive(EnumAsInner, Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(F64),
    String(Box<str>),
    Bytes(Box<[u8]>),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Null => ValueKind::Null,
            Self::Bool(_) => ValueKind::Bool,
            Self::Int(_) => ValueKind::Int,
            Self::Uint(_) => ValueKind::Uint,
            Self::Float(_) => ValueKind::Float,
            Self::String(_) => ValueKind::String,
            Self::Bytes(_) => ValueKind::Bytes,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Uint(u) => write!(f, "{u}"),
            Self::Float(x) => write!(f, "{}", f64::from(*x)),
            Self::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Self::Bytes(b) => write!(f, "x'{}'", hex::encode(b)),
        }
    }
}

macro_rules! impl_from {
    ($($ty:ty => |$v:ident| $e:expr;)*) => {
        $(impl From<$ty> for Value {
            fn from($v: $ty) -> Self {
                $e
            }
        })*
    };
}

impl_from! {
    bool => |v| Value::Bool(v);
    i64 => |v| Value::Int(v);
    i32 => |v| Value::Int(v.into());
    u64 => |v| Value::Uint(v);
    u32 => |v| Value::Uint(v.into());
    f64 => |v| Value::Float(v.into());
    &str => |v| Value::String(v.into());
    String => |v| Value::String(v.into());
    Box<str> => |v| Value::String(v);
    &[u8] => |v| Value::Bytes(v.into());
    Vec<u8> => |v| Value::Bytes(v.into());
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

/// A typed read of a [`Value`] found a value of a different kind.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("expected a {expected} value but found {found}")]
pub struct ValueTypeError {
    pub expected: ValueKind,
    pub found: ValueKind,
}

macro_rules! impl_try_from {
    ($($ty:ty, $kind:ident => |$v:ident| $e:expr;)*) => {
        $(impl<'a> TryFrom<&'a Value> for $ty {
            type Error = ValueTypeError;

            fn try_from(value: &'a Value) -> Result<Self, Self::Error> {
                match value {
                    Value::$kind($v) => Ok($e),
                    other => Err(ValueTypeError {
                        expected: ValueKind::$kind,
                        found: other.kind(),
                    }),
                }
            }
        })*
    };
}

impl_try_from! {
    bool, Bool => |v| *v;
    i64, Int => |v| *v;
    u64, Uint => |v| *v;
    f64, Float => |v| f64::from(*v);
    &'a str, String => |v| v;
    &'a [u8], Bytes => |v| v;
}
