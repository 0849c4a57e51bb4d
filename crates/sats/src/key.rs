//! An order-preserving encoding of value tuples.
//!
//! For any two tuples `a` and `b`, `encode_key(a).cmp(&encode_key(b)) == a.cmp(b)`,
//! and the encoding of a tuple prefix is a byte prefix of the encoding of the tuple.
//! Each field is a [`ValueKind`] byte followed by a payload:
//!
//! | kind | payload |
//! |---|---|
//! | null | none |
//! | bool | one byte |
//! | int | big-endian with the sign bit flipped |
//! | uint | big-endian |
//! | float | big-endian bits, flipped so that the unsigned order is the total order |
//! | string, bytes | `0x00` escaped as `00 ff`, terminated by `00 01` |

use crate::buffer::DecodeError;
use crate::{Value, ValueKind};

const SIGN_BIT: u64 = 1 << 63;
const ESCAPE: [u8; 2] = [0x00, 0xff];
const TERMINATOR: [u8; 2] = [0x00, 0x01];

/// Encodes `values` as a memcomparable key.
pub fn encode_key(values: &[Value]) -> Box<[u8]> {
    let mut buf = Vec::with_capacity(values.len() * 9);
    for value in values {
        encode_value_into(value, &mut buf);
    }
    buf.into()
}

/// Appends the key encoding of a single field to `buf`.
pub fn encode_value_into(value: &Value, buf: &mut Vec<u8>) {
    buf.push(value.kind() as u8);
    match value {
        Value::Null => {}
        Value::Bool(b) => buf.push(*b as u8),
        Value::Int(i) => buf.extend_from_slice(&(*i as u64 ^ SIGN_BIT).to_be_bytes()),
        Value::Uint(u) => buf.extend_from_slice(&u.to_be_bytes()),
        Value::Float(x) => buf.extend_from_slice(&float_to_ordered(f64::from(*x)).to_be_bytes()),
        Value::String(s) => encode_escaped(s.as_bytes(), buf),
        Value::Bytes(b) => encode_escaped(b, buf),
    }
}

fn float_to_ordered(x: f64) -> u64 {
    // Collapse the values that compare equal under the total order.
    let x = if x.is_nan() {
        f64::NAN
    } else if x == 0.0 {
        0.0
    } else {
        x
    };
    let bits = x.to_bits();
    if bits & SIGN_BIT != 0 { !bits } else { bits | SIGN_BIT }
}

fn float_from_ordered(bits: u64) -> f64 {
    let bits = if bits & SIGN_BIT != 0 { bits & !SIGN_BIT } else { !bits };
    f64::from_bits(bits)
}

fn encode_escaped(bytes: &[u8], buf: &mut Vec<u8>) {
    for &b in bytes {
        if b == 0 {
            buf.extend_from_slice(&ESCAPE);
        } else {
            buf.push(b);
        }
    }
    buf.extend_from_slice(&TERMINATOR);
}

/// Decodes every field of a key produced by [`encode_key`].
pub fn decode_key(mut bytes: &[u8]) -> Result<Vec<Value>, DecodeError> {
    let mut values = Vec::new();
    while !bytes.is_empty() {
        let (value, len) = decode_field(bytes)?;
        values.push(value);
        bytes = &bytes[len..];
    }
    Ok(values)
}

/// Splits `key` after its first `n` fields.
///
/// Index keys are the indexed columns followed by the primary key,
/// so splitting at the number of indexed columns separates the two.
pub fn split_key(key: &[u8], n: usize) -> Result<(&[u8], &[u8]), DecodeError> {
    let mut at = 0;
    for found in 0..n {
        if at == key.len() {
            return Err(DecodeError::ShortKey { expected: n, found });
        }
        at += field_len(&key[at..])?;
    }
    Ok(key.split_at(at))
}

/// Returns whether any of the first `n` fields of `key` is null.
pub fn has_null_prefix(key: &[u8], n: usize) -> Result<bool, DecodeError> {
    let mut rest = key;
    for found in 0..n {
        let Some(&kind) = rest.first() else {
            return Err(DecodeError::ShortKey { expected: n, found });
        };
        if kind == ValueKind::Null as u8 {
            return Ok(true);
        }
        rest = &rest[field_len(rest)?..];
    }
    Ok(false)
}

fn field_len(bytes: &[u8]) -> Result<usize, DecodeError> {
    let kind = kind_of(bytes)?;
    let payload = match kind {
        ValueKind::Null => 0,
        ValueKind::Bool => 1,
        ValueKind::Int | ValueKind::Uint | ValueKind::Float => 8,
        ValueKind::String | ValueKind::Bytes => return escaped_len(&bytes[1..]).map(|n| n + 1),
    };
    ensure_len(bytes, 1 + payload)?;
    Ok(1 + payload)
}

fn kind_of(bytes: &[u8]) -> Result<ValueKind, DecodeError> {
    let tag = *bytes.first().ok_or(DecodeError::BufferLength {
        needed: 1,
        remaining: 0,
    })?;
    ValueKind::from_u8(tag).ok_or(DecodeError::InvalidTag { what: "key field", tag })
}

fn ensure_len(bytes: &[u8], needed: usize) -> Result<(), DecodeError> {
    if bytes.len() < needed {
        return Err(DecodeError::BufferLength {
            needed,
            remaining: bytes.len(),
        });
    }
    Ok(())
}

// Length of an escaped payload including its terminator.
fn escaped_len(bytes: &[u8]) -> Result<usize, DecodeError> {
    let mut i = 0;
    loop {
        match bytes.get(i..i + 2) {
            Some(pair) if pair == TERMINATOR => return Ok(i + 2),
            Some(pair) if pair == ESCAPE => i += 2,
            Some([0x00, tag]) => {
                return Err(DecodeError::InvalidTag {
                    what: "key escape",
                    tag: *tag,
                });
            }
            Some(_) => i += 1,
            None => return Err(DecodeError::Unterminated),
        }
    }
}

fn unescape(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len());
    let mut iter = bytes.iter();
    while let Some(&b) = iter.next() {
        out.push(b);
        if b == 0 {
            // Skip the escape marker.
            iter.next();
        }
    }
    out
}

fn decode_field(bytes: &[u8]) -> Result<(Value, usize), DecodeError> {
    let len = field_len(bytes)?;
    let payload = &bytes[1..len];
    let fixed = || -> [u8; 8] {
        let mut buf = [0; 8];
        buf.copy_from_slice(payload);
        buf
    };
    let value = match kind_of(bytes)? {
        ValueKind::Null => Value::Null,
        ValueKind::Bool => match payload[0] {
            0 => Value::Bool(false),
            1 => Value::Bool(true),
            tag => return Err(DecodeError::InvalidTag { what: "bool", tag }),
        },
        ValueKind::Int => Value::Int((u64::from_be_bytes(fixed()) ^ SIGN_BIT) as i64),
        ValueKind::Uint => Value::Uint(u64::from_be_bytes(fixed())),
        ValueKind::Float => Value::from(float_from_ordered(u64::from_be_bytes(fixed()))),
        ValueKind::String => {
            let raw = unescape(&payload[..payload.len() - 2]);
            Value::from(String::from_utf8(raw).map_err(|_| DecodeError::InvalidUtf8)?)
        }
        ValueKind::Bytes => Value::from(unescape(&payload[..payload.len() - 2])),
    };
    Ok((value, len))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn arb_value() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::Int),
            any::<u64>().prop_map(Value::Uint),
            any::<f64>().prop_map(Value::from),
            ".*".prop_map(Value::from),
            proptest::collection::vec(prop_oneof![Just(0u8), Just(1u8), any::<u8>()], 0..8).prop_map(Value::from),
        ]
    }

    fn arb_tuple() -> impl Strategy<Value = Vec<Value>> {
        proptest::collection::vec(arb_value(), 0..4)
    }

    proptest! {
        #[test]
        fn key_order_is_value_order(a in arb_tuple(), b in arb_tuple()) {
            prop_assert_eq!(encode_key(&a).cmp(&encode_key(&b)), a.cmp(&b));
        }

        #[test]
        fn keys_decode(a in arb_tuple()) {
            prop_assert_eq!(decode_key(&encode_key(&a)).unwrap(), a);
        }

        #[test]
        fn split_separates_prefix(a in arb_tuple(), b in arb_tuple()) {
            let whole = encode_key(&[a.clone(), b.clone()].concat());
            let (prefix, rest) = split_key(&whole, a.len()).unwrap();
            prop_assert_eq!(prefix, &*encode_key(&a));
            prop_assert_eq!(rest, &*encode_key(&b));
        }
    }

    #[test]
    fn negative_zero_and_nans_collapse() {
        assert_eq!(encode_key(&[Value::from(-0.0)]), encode_key(&[Value::from(0.0)]));
        let other_nan = f64::from_bits(f64::NAN.to_bits() | 1);
        assert_eq!(encode_key(&[Value::from(other_nan)]), encode_key(&[Value::from(f64::NAN)]));
    }

    #[test]
    fn short_keys_are_reported() {
        let key = encode_key(&[Value::Int(1)]);
        assert_eq!(split_key(&key, 2), Err(DecodeError::ShortKey { expected: 2, found: 1 }));
    }

    #[test]
    fn null_prefix() {
        let key = encode_key(&[Value::Int(1), Value::Null, Value::Int(2)]);
        assert!(!has_null_prefix(&key, 1).unwrap());
        assert!(has_null_prefix(&key, 2).unwrap());
    }
}
