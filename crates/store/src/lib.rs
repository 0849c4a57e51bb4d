//! Storage for strata's immutable data.
//!
//! - [`ValueStore`] is the content-addressed get/put service everything is persisted through,
//!   with an in-memory implementation and an on-disk [`DirTrieValueStore`].
//! - [`ProllyMap`] is the persistent ordered map holding row data and index data.
//!   Its shape, and therefore its hash, depends only on its contents.

mod dir_trie;
mod error;
pub mod prolly;
mod value_store;

pub use dir_trie::DirTrieValueStore;
pub use error::StoreError;
pub use prolly::ProllyMap;
pub use value_store::{MemoryValueStore, ValueStore};

pub type Result<T> = core::result::Result<T, StoreError>;
