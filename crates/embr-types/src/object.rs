use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Length of a full object hash in hex characters.
pub const HASH_HEX_LEN: usize = 64;

/// Shortest hash prefix accepted for resolution.
pub const MIN_PREFIX_LEN: usize = 4;

/// Content-addressed identifier for any stored object.
///
/// An `ObjectId` is the BLAKE3 hash of an object's *uncompressed* payload.
/// Identical content always produces the same `ObjectId`, so the name of an
/// object file can be re-derived from what it decodes to.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId([u8; 32]);

impl ObjectId {
    /// Compute an `ObjectId` from raw bytes.
    pub fn from_bytes(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Create an `ObjectId` from a pre-computed hash.
    pub fn from_hash(hash: [u8; 32]) -> Self {
        Self(hash)
    }

    /// The raw 32-byte hash.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Hex-encoded string representation.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short hex representation (first 8 characters).
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }

    /// Whether the hex form of this id starts with `prefix` (case-insensitive).
    pub fn matches_prefix(&self, prefix: &str) -> bool {
        self.to_hex().starts_with(&prefix.to_ascii_lowercase())
    }

    /// Parse from a 64-character hex string.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        if bytes.len() != 32 {
            return Err(TypeError::InvalidLength {
                expected: 32,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    /// Validate a user-supplied hash prefix and return it lowercased.
    ///
    /// A prefix must be between [`MIN_PREFIX_LEN`] and [`HASH_HEX_LEN`]
    /// characters and consist only of hex digits.
    pub fn validate_prefix(prefix: &str) -> Result<String, TypeError> {
        let invalid = |reason: &str| TypeError::InvalidPrefix {
            prefix: prefix.to_string(),
            reason: reason.to_string(),
        };
        if prefix.len() < MIN_PREFIX_LEN {
            return Err(invalid("shorter than 4 characters"));
        }
        if prefix.len() > HASH_HEX_LEN {
            return Err(invalid("longer than 64 characters"));
        }
        if !prefix.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid("not a hex string"));
        }
        Ok(prefix.to_ascii_lowercase())
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.short_hex())
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for ObjectId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl From<[u8; 32]> for ObjectId {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl From<ObjectId> for [u8; 32] {
    fn from(id: ObjectId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn from_bytes_is_deterministic() {
        let data = b"embedding bytes";
        assert_eq!(ObjectId::from_bytes(data), ObjectId::from_bytes(data));
    }

    #[test]
    fn different_data_produces_different_ids() {
        assert_ne!(ObjectId::from_bytes(b"a"), ObjectId::from_bytes(b"b"));
    }

    #[test]
    fn hex_roundtrip() {
        let id = ObjectId::from_bytes(b"test");
        let parsed: ObjectId = id.to_hex().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn from_hex_rejects_wrong_length() {
        let err = ObjectId::from_hex("abcd").unwrap_err();
        assert_eq!(
            err,
            TypeError::InvalidLength {
                expected: 32,
                actual: 2
            }
        );
    }

    #[test]
    fn short_hex_is_8_chars() {
        assert_eq!(ObjectId::from_bytes(b"x").short_hex().len(), 8);
    }

    #[test]
    fn display_is_full_hex() {
        let id = ObjectId::from_bytes(b"test");
        let display = format!("{id}");
        assert_eq!(display.len(), HASH_HEX_LEN);
        assert_eq!(display, id.to_hex());
    }

    #[test]
    fn serde_roundtrip() {
        let id = ObjectId::from_bytes(b"serde test");
        let json = serde_json::to_string(&id).unwrap();
        let parsed: ObjectId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, parsed);
    }

    // ----- Prefix validation -----

    #[test]
    fn prefix_too_short() {
        assert!(matches!(
            ObjectId::validate_prefix("abc"),
            Err(TypeError::InvalidPrefix { .. })
        ));
    }

    #[test]
    fn prefix_too_long() {
        let long = "a".repeat(65);
        assert!(ObjectId::validate_prefix(&long).is_err());
    }

    #[test]
    fn prefix_must_be_hex() {
        assert!(ObjectId::validate_prefix("abcz").is_err());
    }

    #[test]
    fn prefix_is_lowercased() {
        assert_eq!(ObjectId::validate_prefix("ABCD12").unwrap(), "abcd12");
    }

    #[test]
    fn matches_prefix_ignores_case() {
        let id = ObjectId::from_bytes(b"prefix");
        let upper = id.to_hex()[..10].to_ascii_uppercase();
        assert!(id.matches_prefix(&upper));
    }

    proptest! {
        #[test]
        fn every_prefix_of_own_hex_matches(data in proptest::collection::vec(any::<u8>(), 0..64), len in 4usize..=64) {
            let id = ObjectId::from_bytes(&data);
            let hex = id.to_hex();
            let prefix = ObjectId::validate_prefix(&hex[..len]).unwrap();
            prop_assert!(id.matches_prefix(&prefix));
        }
    }
}
