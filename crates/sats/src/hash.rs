use core::fmt;
use core::str::FromStr;

pub const HASH_SIZE: usize = 32;

/// The content address of an encoded value.
///
/// Uses BLAKE3, which fits in 32 bytes.
/// Two values with the same logical content always encode to the same bytes
/// and therefore share a `Hash`.
#[derive(Eq, PartialEq, PartialOrd, Ord, Clone, Copy, Hash)]
pub struct Hash {
    pub data: [u8; HASH_SIZE],
}

impl Hash {
    pub const ZERO: Self = Self::from_byte_array([0; HASH_SIZE]);

    /// The number of hex characters shown by [`Hash::abbreviate`].
    pub const ABBREV_LEN: usize = 8;

    pub const fn from_byte_array(data: [u8; HASH_SIZE]) -> Self {
        Self { data }
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.data)
    }

    /// Returns the leading hex characters of the hash, as shown in logs and status output.
    pub fn abbreviate(&self) -> String {
        let mut hex = self.to_hex();
        hex.truncate(Self::ABBREV_LEN);
        hex
    }

    pub fn from_hex(hex: impl AsRef<[u8]>) -> Result<Self, hex::FromHexError> {
        let mut data = [0; HASH_SIZE];
        hex::decode_to_slice(hex, &mut data)?;
        Ok(Self { data })
    }
}

/// Returns the content address of `bytes`.
pub fn hash_bytes(bytes: impl AsRef<[u8]>) -> Hash {
    Hash::from_byte_array(blake3::hash(bytes.as_ref()).into())
}

impl From<blake3::Hash> for Hash {
    fn from(hash: blake3::Hash) -> Self {
        Self::from_byte_array(hash.into())
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.to_hex())
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Hash").field(&format_args!("{self}")).finish()
    }
}

impl FromStr for Hash {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Hash {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Hash {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex = <String as serde::Deserialize>::deserialize(deserializer)?;
        Hash::from_hex(hex).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_round_trips() {
        let hash = hash_bytes(b"strata");
        let hex = hash.to_string();
        assert_eq!(hex.len(), HASH_SIZE * 2);
        assert_eq!(hex.parse::<Hash>().unwrap(), hash);
        assert!(hex.starts_with(&hash.abbreviate()));
    }

    #[test]
    fn equal_content_equal_hash() {
        assert_eq!(hash_bytes(b"abc"), hash_bytes(b"abc"));
        assert_ne!(hash_bytes(b"abc"), hash_bytes(b"abd"));
    }
}
