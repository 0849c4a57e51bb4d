//! Lossless conversion of values between column types.
//!
//! Conversions never round, truncate or wrap.
//! A value that cannot be represented exactly in the target type is an error.

use crate::{TypeInfo, Value};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot convert {value} to {ty}: {reason}")]
pub struct ConversionError {
    pub value: Value,
    pub ty: TypeInfo,
    pub reason: &'static str,
}

// Exclusive upper bound of the integers representable by `i64`, as an `f64`.
const I64_END: f64 = 9_223_372_036_854_775_808.0;
const U64_END: f64 = 18_446_744_073_709_551_616.0;

pub(crate) fn convert(ty: TypeInfo, value: &Value) -> Result<Value, ConversionError> {
    let err = |reason| ConversionError {
        value: value.clone(),
        ty,
        reason,
    };
    let converted = match (ty, value) {
        (_, Value::Null) => Value::Null,

        (TypeInfo::Bool, Value::Bool(b)) => Value::Bool(*b),
        (TypeInfo::Bool, Value::Int(0) | Value::Uint(0)) => Value::Bool(false),
        (TypeInfo::Bool, Value::Int(1) | Value::Uint(1)) => Value::Bool(true),
        (TypeInfo::Bool, Value::String(s)) => match &*s.to_ascii_lowercase() {
            "true" | "1" => Value::Bool(true),
            "false" | "0" => Value::Bool(false),
            _ => return Err(err("not a boolean literal")),
        },
        (TypeInfo::Bool, _) => return Err(err("only 0 and 1 are booleans")),

        (TypeInfo::Int, Value::Int(i)) => Value::Int(*i),
        (TypeInfo::Int, Value::Uint(u)) => Value::Int(i64::try_from(*u).map_err(|_| err("out of range"))?),
        (TypeInfo::Int, Value::Bool(b)) => Value::Int(*b as i64),
        (TypeInfo::Int, Value::Float(x)) => {
            let x = f64::from(*x);
            if !is_integral(x) || !(-I64_END..I64_END).contains(&x) {
                return Err(err("not an integer in range"));
            }
            Value::Int(x as i64)
        }
        (TypeInfo::Int, Value::String(s)) => Value::Int(s.trim().parse().map_err(|_| err("not an integer"))?),

        (TypeInfo::Uint, Value::Uint(u)) => Value::Uint(*u),
        (TypeInfo::Uint, Value::Int(i)) => Value::Uint(u64::try_from(*i).map_err(|_| err("negative"))?),
        (TypeInfo::Uint, Value::Bool(b)) => Value::Uint(*b as u64),
        (TypeInfo::Uint, Value::Float(x)) => {
            let x = f64::from(*x);
            if !is_integral(x) || !(0.0..U64_END).contains(&x) {
                return Err(err("not an unsigned integer in range"));
            }
            Value::Uint(x as u64)
        }
        (TypeInfo::Uint, Value::String(s)) => {
            Value::Uint(s.trim().parse().map_err(|_| err("not an unsigned integer"))?)
        }

        (TypeInfo::Float, Value::Float(x)) => Value::Float(*x),
        (TypeInfo::Float, Value::Int(i)) => {
            let x = *i as f64;
            if x as i128 != *i as i128 {
                return Err(err("not exactly representable"));
            }
            Value::from(x)
        }
        (TypeInfo::Float, Value::Uint(u)) => {
            let x = *u as f64;
            if x as i128 != *u as i128 {
                return Err(err("not exactly representable"));
            }
            Value::from(x)
        }
        (TypeInfo::Float, Value::Bool(b)) => Value::from(*b as u8 as f64),
        (TypeInfo::Float, Value::String(s)) => Value::from(s.trim().parse::<f64>().map_err(|_| err("not a number"))?),

        (TypeInfo::Int | TypeInfo::Uint | TypeInfo::Float, Value::Bytes(_)) => {
            return Err(err("bytes do not convert to numbers"));
        }

        (TypeInfo::Varchar { .. } | TypeInfo::Text, v) => {
            let s = match v {
                Value::String(s) => s.clone(),
                Value::Bytes(b) => core::str::from_utf8(b).map_err(|_| err("invalid utf-8"))?.into(),
                Value::Bool(b) => (*b as u8).to_string().into(),
                Value::Int(i) => i.to_string().into(),
                Value::Uint(u) => u.to_string().into(),
                Value::Float(x) => f64::from(*x).to_string().into(),
                Value::Null => unreachable!("handled above"),
            };
            if let TypeInfo::Varchar { max_len } = ty
                && s.chars().count() > max_len as usize
            {
                return Err(err("too long"));
            }
            Value::String(s)
        }

        (TypeInfo::Blob, Value::Bytes(b)) => Value::Bytes(b.clone()),
        (TypeInfo::Blob, Value::String(s)) => Value::Bytes(s.as_bytes().into()),
        (TypeInfo::Blob, _) => return Err(err("only strings convert to bytes")),
    };
    Ok(converted)
}

fn is_integral(x: f64) -> bool {
    x.is_finite() && x.fract() == 0.0
}
