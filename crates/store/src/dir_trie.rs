//! A [`ValueStore`] persisted as a shallow byte-partitioned directory trie.
//!
//! This is the same on-disk layout as the git object store.
//! An object's location is computed from the (64 character) hexadecimal encoding of its hash:
//! the leading 2 digits name the directory, and the remaining 62 digits name the file.

use crate::value_store::ValueStore;
use crate::{Result, StoreError};
use std::fs::{create_dir_all, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use strata_sats::{hash_bytes, Hash};

/// The number of leading hex chars taken from a hash as the subdirectory name.
const DIR_HEX_CHARS: usize = 2;

pub struct DirTrieValueStore {
    /// The directory at which the trie is stored.
    root: PathBuf,
}

impl DirTrieValueStore {
    /// Open the store at `root`, creating the directory if it doesn't exist.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn file_path(&self, hash: &Hash) -> PathBuf {
        let hex = hash.to_hex();
        // `root/xx/yyyy...`
        let mut path = self.root.join(&hex[..DIR_HEX_CHARS]);
        path.push(&hex[DIR_HEX_CHARS..]);
        path
    }
}

impl ValueStore for DirTrieValueStore {
    fn put(&self, bytes: &[u8]) -> Result<Hash> {
        let hash = hash_bytes(bytes);
        let path = self.file_path(&hash);
        if path.is_file() {
            return Ok(hash);
        }
        if let Some(dir) = path.parent() {
            create_dir_all(dir)?;
        }
        // Objects are immutable, so never overwrite one that already exists.
        let mut options = OpenOptions::new();
        options.create_new(true).write(true);
        match options.open(&path) {
            Ok(mut file) => {
                file.write_all(bytes)?;
                file.sync_data()?;
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
            Err(e) => return Err(e.into()),
        }
        Ok(hash)
    }

    fn get(&self, hash: &Hash) -> Result<Option<Arc<[u8]>>> {
        let bytes = match std::fs::read(self.file_path(hash)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let actual = hash_bytes(&bytes);
        if actual != *hash {
            return Err(StoreError::Corrupt { expected: *hash, actual });
        }
        Ok(Some(bytes.into()))
    }

    fn contains(&self, hash: &Hash) -> Result<bool> {
        Ok(self.file_path(hash).is_file())
    }
}
