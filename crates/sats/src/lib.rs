//! The strata value and type system.
//!
//! Every cell stored in a table is a [`Value`] typed at some [`TypeInfo`].
//! Values have two encodings:
//! - [`key`], a memcomparable tuple encoding whose byte order is the value order.
//!   Primary keys and index keys are stored in this form,
//!   so that the ordered maps holding row and index data sort rows by key.
//! - [`codec`], a compact length-prefixed encoding used for row bodies and for metadata
//!   such as schemas, foreign keys and commits.
//!
//! Content addresses are [`Hash`]es, BLAKE3 digests of encoded bytes.

pub mod buffer;
pub mod codec;
pub mod convert;
pub mod hash;
pub mod key;
mod type_info;
mod value;

pub use convert::ConversionError;
pub use hash::{hash_bytes, Hash};
pub use type_info::{TypeInfo, ValueKind};
pub use value::{Value, ValueTypeError, F64};
