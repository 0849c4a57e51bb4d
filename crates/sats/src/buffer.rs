//! Minimal utilities for reading & writing the primitive pieces of strata's encodings,
//! without relying on third party libraries like `bytes::Bytes`.

use thiserror::Error;

/// An error that occurred while decoding bytes produced by [`crate::codec`] or [`crate::key`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("buffer too short: needed {needed} bytes but only {remaining} remain")]
    BufferLength { needed: usize, remaining: usize },
    #[error("invalid {what} tag {tag:#04x}")]
    InvalidTag { what: &'static str, tag: u8 },
    #[error("invalid utf-8 in encoded string")]
    InvalidUtf8,
    #[error("unterminated byte string in key")]
    Unterminated,
    #[error("{0} trailing bytes after decoding")]
    TrailingBytes(usize),
    #[error("key has {found} fields, expected at least {expected}")]
    ShortKey { expected: usize, found: usize },
}

pub trait BufWriter {
    fn put_slice(&mut self, slice: &[u8]);
    fn put_u8(&mut self, val: u8);
    fn put_u32(&mut self, val: u32);
    fn put_u64(&mut self, val: u64);
}

macro_rules! impl_slice_write {
    ($f_name:ident, $int:ident) => {
        fn $f_name(&mut self, val: $int) {
            self.extend_from_slice(&val.to_le_bytes()[..]);
        }
    };
}

impl BufWriter for Vec<u8> {
    fn put_slice(&mut self, slice: &[u8]) {
        self.extend_from_slice(slice);
    }

    impl_slice_write!(put_u8, u8);
    impl_slice_write!(put_u32, u32);
    impl_slice_write!(put_u64, u64);
}

/// A reader over borrowed bytes.
///
/// Slices handed out by [`BufReader::get_slice`] borrow from the underlying buffer,
/// not from the reader, so decoders can hold on to them.
pub trait BufReader<'de> {
    fn get_slice(&mut self, size: usize) -> Result<&'de [u8], DecodeError>;

    fn remaining(&self) -> usize;

    fn get_array<const C: usize>(&mut self) -> Result<[u8; C], DecodeError> {
        let mut buf = [0; C];
        buf.copy_from_slice(self.get_slice(C)?);
        Ok(buf)
    }

    fn get_u8(&mut self) -> Result<u8, DecodeError> {
        self.get_array().map(u8::from_le_bytes)
    }

    fn get_u32(&mut self) -> Result<u32, DecodeError> {
        self.get_array().map(u32::from_le_bytes)
    }

    fn get_u64(&mut self) -> Result<u64, DecodeError> {
        self.get_array().map(u64::from_le_bytes)
    }
}

impl<'de> BufReader<'de> for &'de [u8] {
    fn get_slice(&mut self, size: usize) -> Result<&'de [u8], DecodeError> {
        if self.len() < size {
            return Err(DecodeError::BufferLength {
                needed: size,
                remaining: self.len(),
            });
        }
        let (taken, rest) = self.split_at(size);
        *self = rest;
        Ok(taken)
    }

    fn remaining(&self) -> usize {
        self.len()
    }
}
