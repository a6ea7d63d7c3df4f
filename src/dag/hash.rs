//! Content addressing for puffs.
//!
//! A puff's sig is a 64-byte SHA3-512 digest. Everything a sig is written
//! to (payload parents, persisted puffs, filter specs) is JSON, so sigs
//! always serialize as 128 hex characters.

use crate::error::{PuffError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha3::{Digest, Sha3_512};
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

/// Length of a sig in bytes.
pub const HASH_LEN: usize = 64;

/// A 64-byte content hash using SHA3-512.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash([u8; HASH_LEN]);

impl Serialize for ContentHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ContentHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        ContentHash::from_hex(&text).map_err(serde::de::Error::custom)
    }
}

impl ContentHash {
    /// Hashes raw bytes.
    pub fn of_bytes(data: &[u8]) -> Self {
        let mut arr = [0u8; HASH_LEN];
        arr.copy_from_slice(&Sha3_512::digest(data));
        Self(arr)
    }

    /// Hashes the JSON encoding of `data`.
    ///
    /// `serde_json::Map` keeps insertion order, so equal values built the
    /// same way hash the same.
    pub fn compute<T: Serialize>(data: &T) -> Result<Self> {
        let serialized = serde_json::to_vec(data).map_err(|e| {
            PuffError::serialization(format!("Failed to serialize for hash: {}", e))
        })?;
        Ok(Self::of_bytes(&serialized))
    }

    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parses a sig from its 128-character hex form.
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s)
            .map_err(|_| PuffError::validation(format!("Sig is not valid hex: {:?}", s)))?;
        let arr: [u8; HASH_LEN] = bytes.try_into().map_err(|bytes: Vec<u8>| {
            PuffError::validation(format!(
                "Sig must be {} bytes, got {}",
                HASH_LEN,
                bytes.len()
            ))
        })?;
        Ok(Self(arr))
    }

    /// First 16 hex characters, for logs and listings.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..8])
    }
}

impl FromStr for ContentHash {
    type Err = PuffError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sig({})", self.short())
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.short())
    }
}

/// Milliseconds since the Unix epoch; 0 if the clock is before it.
pub fn current_timestamp_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_hash_compute() {
        let hash1 = ContentHash::compute(&"test data").unwrap();
        let hash2 = ContentHash::compute(&"test data").unwrap();
        assert_eq!(hash1, hash2, "Same data should produce same hash");

        let hash3 = ContentHash::compute(&"other data").unwrap();
        assert_ne!(hash1, hash3);
    }

    #[test]
    fn test_content_hash_hex() {
        let hash = ContentHash::of_bytes(b"puff");
        let hex = hash.to_hex();
        assert_eq!(hex.len(), 128);
        assert_eq!(ContentHash::from_hex(&hex).unwrap(), hash);
        assert_eq!(hash.short(), &hex[..16]);
    }

    #[test]
    fn test_content_hash_invalid_hex() {
        assert!(ContentHash::from_hex("zz").is_err());
        assert!(ContentHash::from_hex("abcd").is_err());
        assert!("not a sig".parse::<ContentHash>().is_err());
        assert!(serde_json::from_str::<ContentHash>("\"abcd\"").is_err());
    }

    #[test]
    fn test_content_hash_json_is_hex() {
        let hash = ContentHash::of_bytes(b"json");
        let json = serde_json::to_string(&hash).unwrap();
        assert_eq!(json, format!("\"{}\"", hash.to_hex()));

        let restored: ContentHash = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, hash);
    }
}
