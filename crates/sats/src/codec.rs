//! A compact binary encoding for row bodies and metadata.
//!
//! Fields are written sequentially with no self-description,
//! so a decoder reads them back in the same order, checking every tag it meets.
//! Integers are little-endian, and lengths are `u32` prefixes.
//! Maps are written in key order, so equal values always encode to equal bytes.

use crate::buffer::{BufReader, BufWriter, DecodeError};
use crate::{Hash, TypeInfo, Value, ValueKind};
use std::collections::{BTreeMap, BTreeSet};
use strata_primitives::{Tag, TagList};

pub trait Encode {
    fn encode(&self, w: &mut impl BufWriter);
}

pub trait Decode<'de>: Sized {
    fn decode(r: &mut impl BufReader<'de>) -> Result<Self, DecodeError>;
}

/// Encodes `value` into a fresh buffer.
pub fn to_vec<T: Encode + ?Sized>(value: &T) -> Vec<u8> {
    let mut buf = Vec::new();
    value.encode(&mut buf);
    buf
}

/// Decodes a `T` that must span all of `bytes`.
pub fn from_slice<'de, T: Decode<'de>>(mut bytes: &'de [u8]) -> Result<T, DecodeError> {
    let value = T::decode(&mut bytes)?;
    match bytes.len() {
        0 => Ok(value),
        n => Err(DecodeError::TrailingBytes(n)),
    }
}

pub fn put_len(w: &mut impl BufWriter, len: usize) {
    let len = u32::try_from(len).unwrap_or_else(|_| panic!("length {len} does not fit in a u32"));
    w.put_u32(len);
}

pub fn get_len<'de>(r: &mut impl BufReader<'de>) -> Result<usize, DecodeError> {
    Ok(r.get_u32()? as usize)
}

impl<T: Encode + ?Sized> Encode for &T {
    fn encode(&self, w: &mut impl BufWriter) {
        (**self).encode(w)
    }
}

impl Encode for bool {
    fn encode(&self, w: &mut impl BufWriter) {
        w.put_u8(*self as u8)
    }
}

impl<'de> Decode<'de> for bool {
    fn decode(r: &mut impl BufReader<'de>) -> Result<Self, DecodeError> {
        match r.get_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            tag => Err(DecodeError::InvalidTag { what: "bool", tag }),
        }
    }
}

macro_rules! impl_int {
    ($($ty:ty => $put:ident, $get:ident;)*) => {
        $(
            impl Encode for $ty {
                fn encode(&self, w: &mut impl BufWriter) {
                    w.$put(*self as _)
                }
            }

            impl<'de> Decode<'de> for $ty {
                fn decode(r: &mut impl BufReader<'de>) -> Result<Self, DecodeError> {
                    r.$get().map(|v| v as $ty)
                }
            }
        )*
    };
}

impl_int! {
    u8 => put_u8, get_u8;
    u32 => put_u32, get_u32;
    u64 => put_u64, get_u64;
    i64 => put_u64, get_u64;
}

impl Encode for str {
    fn encode(&self, w: &mut impl BufWriter) {
        put_len(w, self.len());
        w.put_slice(self.as_bytes());
    }
}

impl Encode for String {
    fn encode(&self, w: &mut impl BufWriter) {
        self.as_str().encode(w)
    }
}

impl Encode for Box<str> {
    fn encode(&self, w: &mut impl BufWriter) {
        (**self).encode(w)
    }
}

impl<'de> Decode<'de> for &'de str {
    fn decode(r: &mut impl BufReader<'de>) -> Result<Self, DecodeError> {
        core::str::from_utf8(<&[u8]>::decode(r)?).map_err(|_| DecodeError::InvalidUtf8)
    }
}

impl<'de> Decode<'de> for String {
    fn decode(r: &mut impl BufReader<'de>) -> Result<Self, DecodeError> {
        <&str>::decode(r).map(Into::into)
    }
}

impl<'de> Decode<'de> for Box<str> {
    fn decode(r: &mut impl BufReader<'de>) -> Result<Self, DecodeError> {
        <&str>::decode(r).map(Into::into)
    }
}

// Byte strings share the layout of `[u8]` but are written in one go.
impl Encode for Box<[u8]> {
    fn encode(&self, w: &mut impl BufWriter) {
        put_len(w, self.len());
        w.put_slice(self);
    }
}

impl<'de> Decode<'de> for &'de [u8] {
    fn decode(r: &mut impl BufReader<'de>) -> Result<Self, DecodeError> {
        let len = get_len(r)?;
        r.get_slice(len)
    }
}

impl<'de> Decode<'de> for Box<[u8]> {
    fn decode(r: &mut impl BufReader<'de>) -> Result<Self, DecodeError> {
        <&[u8]>::decode(r).map(Into::into)
    }
}

impl<T: Encode> Encode for Option<T> {
    fn encode(&self, w: &mut impl BufWriter) {
        match self {
            None => w.put_u8(0),
            Some(v) => {
                w.put_u8(1);
                v.encode(w);
            }
        }
    }
}

impl<'de, T: Decode<'de>> Decode<'de> for Option<T> {
    fn decode(r: &mut impl BufReader<'de>) -> Result<Self, DecodeError> {
        match r.get_u8()? {
            0 => Ok(None),
            1 => T::decode(r).map(Some),
            tag => Err(DecodeError::InvalidTag { what: "option", tag }),
        }
    }
}

impl<T: Encode> Encode for [T] {
    fn encode(&self, w: &mut impl BufWriter) {
        put_len(w, self.len());
        for elem in self {
            elem.encode(w);
        }
    }
}

impl<T: Encode> Encode for Vec<T> {
    fn encode(&self, w: &mut impl BufWriter) {
        self.as_slice().encode(w)
    }
}

impl<'de, T: Decode<'de>> Decode<'de> for Vec<T> {
    fn decode(r: &mut impl BufReader<'de>) -> Result<Self, DecodeError> {
        let len = get_len(r)?;
        // Don't trust the length for the allocation.
        let mut vec = Vec::with_capacity(len.min(r.remaining()));
        for _ in 0..len {
            vec.push(T::decode(r)?);
        }
        Ok(vec)
    }
}

impl<K: Encode, V: Encode> Encode for BTreeMap<K, V> {
    fn encode(&self, w: &mut impl BufWriter) {
        put_len(w, self.len());
        for (k, v) in self {
            k.encode(w);
            v.encode(w);
        }
    }
}

impl<'de, K: Decode<'de> + Ord, V: Decode<'de>> Decode<'de> for BTreeMap<K, V> {
    fn decode(r: &mut impl BufReader<'de>) -> Result<Self, DecodeError> {
        let len = get_len(r)?;
        let mut map = BTreeMap::new();
        for _ in 0..len {
            let k = K::decode(r)?;
            map.insert(k, V::decode(r)?);
        }
        Ok(map)
    }
}

impl<T: Encode> Encode for BTreeSet<T> {
    fn encode(&self, w: &mut impl BufWriter) {
        put_len(w, self.len());
        for elem in self {
            elem.encode(w);
        }
    }
}

impl<'de, T: Decode<'de> + Ord> Decode<'de> for BTreeSet<T> {
    fn decode(r: &mut impl BufReader<'de>) -> Result<Self, DecodeError> {
        Vec::<T>::decode(r).map(|v| v.into_iter().collect())
    }
}

macro_rules! impl_tuple {
    ($($name:ident),+) => {
        impl<$($name: Encode),+> Encode for ($($name,)+) {
            #[allow(non_snake_case)]
            fn encode(&self, w: &mut impl BufWriter) {
                let ($($name,)+) = self;
                $($name.encode(w);)+
            }
        }

        impl<'de, $($name: Decode<'de>),+> Decode<'de> for ($($name,)+) {
            fn decode(r: &mut impl BufReader<'de>) -> Result<Self, DecodeError> {
                Ok(($($name::decode(r)?,)+))
            }
        }
    };
}

impl_tuple!(A, B);
impl_tuple!(A, B, C);
impl_tuple!(A, B, C, D);

impl Encode for Value {
    fn encode(&self, w: &mut impl BufWriter) {
        w.put_u8(self.kind() as u8);
        match self {
            Value::Null => {}
            Value::Bool(b) => b.encode(w),
            Value::Int(i) => i.encode(w),
            Value::Uint(u) => u.encode(w),
            Value::Float(x) => w.put_u64(f64::from(*x).to_bits()),
            Value::String(s) => s.encode(w),
            Value::Bytes(b) => b.encode(w),
        }
    }
}

impl<'de> Decode<'de> for Value {
    fn decode(r: &mut impl BufReader<'de>) -> Result<Self, DecodeError> {
        let tag = r.get_u8()?;
        let kind = ValueKind::from_u8(tag).ok_or(DecodeError::InvalidTag { what: "value", tag })?;
        Ok(match kind {
            ValueKind::Null => Value::Null,
            ValueKind::Bool => Value::Bool(bool::decode(r)?),
            ValueKind::Int => Value::Int(i64::decode(r)?),
            ValueKind::Uint => Value::Uint(u64::decode(r)?),
            ValueKind::Float => Value::from(f64::from_bits(r.get_u64()?)),
            ValueKind::String => Value::String(Box::<str>::decode(r)?),
            ValueKind::Bytes => Value::Bytes(Box::<[u8]>::decode(r)?),
        })
    }
}

impl Encode for TypeInfo {
    fn encode(&self, w: &mut impl BufWriter) {
        let tag = match self {
            TypeInfo::Bool => 0,
            TypeInfo::Int => 1,
            TypeInfo::Uint => 2,
            TypeInfo::Float => 3,
            TypeInfo::Varchar { .. } => 4,
            TypeInfo::Text => 5,
            TypeInfo::Blob => 6,
        };
        w.put_u8(tag);
        if let TypeInfo::Varchar { max_len } = self {
            w.put_u32(*max_len);
        }
    }
}

impl<'de> Decode<'de> for TypeInfo {
    fn decode(r: &mut impl BufReader<'de>) -> Result<Self, DecodeError> {
        Ok(match r.get_u8()? {
            0 => TypeInfo::Bool,
            1 => TypeInfo::Int,
            2 => TypeInfo::Uint,
            3 => TypeInfo::Float,
            4 => TypeInfo::Varchar { max_len: r.get_u32()? },
            5 => TypeInfo::Text,
            6 => TypeInfo::Blob,
            tag => return Err(DecodeError::InvalidTag { what: "type", tag }),
        })
    }
}

impl Encode for Hash {
    fn encode(&self, w: &mut impl BufWriter) {
        w.put_slice(&self.data)
    }
}

impl<'de> Decode<'de> for Hash {
    fn decode(r: &mut impl BufReader<'de>) -> Result<Self, DecodeError> {
        r.get_array().map(Hash::from_byte_array)
    }
}

impl Encode for Tag {
    fn encode(&self, w: &mut impl BufWriter) {
        w.put_u64(self.0)
    }
}

impl<'de> Decode<'de> for Tag {
    fn decode(r: &mut impl BufReader<'de>) -> Result<Self, DecodeError> {
        r.get_u64().map(Tag)
    }
}

impl Encode for TagList {
    fn encode(&self, w: &mut impl BufWriter) {
        (**self).encode(w)
    }
}

impl<'de> Decode<'de> for TagList {
    fn decode(r: &mut impl BufReader<'de>) -> Result<Self, DecodeError> {
        Vec::<Tag>::decode(r).map(TagList::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn values_decode_sequentially() {
        let values = vec![
            Value::Null,
            Value::Bool(true),
            Value::Int(-9),
            Value::Uint(9),
            Value::from(1.5),
            Value::from("text"),
            Value::from(vec![0u8, 1, 2]),
        ];
        let bytes = to_vec(&values);
        assert_eq!(from_slice::<Vec<Value>>(&bytes).unwrap(), values);
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut bytes = to_vec(&7u32);
        bytes.push(0);
        assert_eq!(from_slice::<u32>(&bytes), Err(DecodeError::TrailingBytes(1)));
    }

    #[test]
    fn invalid_tags_are_rejected() {
        assert_eq!(
            from_slice::<Value>(&[42]),
            Err(DecodeError::InvalidTag { what: "value", tag: 42 })
        );
        assert_eq!(
            from_slice::<Option<u8>>(&[2]),
            Err(DecodeError::InvalidTag { what: "option", tag: 2 })
        );
    }

    #[test]
    fn maps_encode_in_key_order() {
        let mut a = BTreeMap::new();
        a.insert(Tag(2), Value::Int(2));
        a.insert(Tag(1), Value::Int(1));
        let mut b = BTreeMap::new();
        b.insert(Tag(1), Value::Int(1));
        b.insert(Tag(2), Value::Int(2));
        assert_eq!(to_vec(&a), to_vec(&b));
        assert_eq!(from_slice::<BTreeMap<Tag, Value>>(&to_vec(&a)).unwrap(), a);
    }

    #[test]
    fn type_info_keeps_varchar_length() {
        let ty = TypeInfo::Varchar { max_len: 255 };
        assert_eq!(from_slice::<TypeInfo>(&to_vec(&ty)).unwrap(), ty);
    }
}
