use std::io;
use strata_sats::buffer::DecodeError;
use strata_sats::Hash;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("no object with hash {0} in the value store")]
    Missing(Hash),
    #[error("object {expected} is corrupt: its contents hash to {actual}")]
    Corrupt { expected: Hash, actual: Hash },
    #[error("failed to decode object {hash}: {source}")]
    Decode {
        hash: Hash,
        #[source]
        source: DecodeError,
    },
    #[error(transparent)]
    Io(#[from] io::Error),
}
