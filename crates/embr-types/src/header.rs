//! Packed binary header stored in front of every structured object file.
//!
//! On-disk format (little-endian, no padding, 52 bytes):
//! ```text
//! [4 bytes: magic "EBVS" (0x53564245)]
//! [4 bytes: version]
//! [4 bytes: object type (1 = vector, 2 = metadata)]
//! [4 bytes: flags (bit 0 = payload is zstd-compressed)]
//! [4 bytes: uncompressed payload size]
//! [32 bytes: content hash of the uncompressed payload]
//! ```

use crate::error::TypeError;
use crate::object::ObjectId;

/// Header magic, `"EBVS"` read as a little-endian `u32`.
pub const HEADER_MAGIC: u32 = 0x5356_4245;

/// Current header version.
pub const HEADER_VERSION: u32 = 1;

/// Flag bit: the payload following the header is zstd-compressed.
pub const FLAG_COMPRESSED: u32 = 0x1;

/// Encoded header length in bytes.
pub const HEADER_LEN: usize = 52;

/// Kind of payload an object holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObjectType {
    /// Embedding vector data.
    Vector,
    /// Free-form metadata.
    Metadata,
}

impl ObjectType {
    pub fn as_u32(self) -> u32 {
        match self {
            Self::Vector => 1,
            Self::Metadata => 2,
        }
    }

    pub fn from_u32(value: u32) -> Result<Self, TypeError> {
        match value {
            1 => Ok(Self::Vector),
            2 => Ok(Self::Metadata),
            other => Err(TypeError::UnknownObjectType(other)),
        }
    }
}

/// Decoded object header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectHeader {
    pub version: u32,
    pub obj_type: ObjectType,
    pub flags: u32,
    /// Size of the uncompressed payload.
    pub size: u32,
    pub hash: ObjectId,
}

impl ObjectHeader {
    /// Build a current-version header for a payload.
    pub fn new(obj_type: ObjectType, size: u32, hash: ObjectId, compressed: bool) -> Self {
        Self {
            version: HEADER_VERSION,
            obj_type,
            flags: if compressed { FLAG_COMPRESSED } else { 0 },
            size,
            hash,
        }
    }

    pub fn is_compressed(&self) -> bool {
        self.flags & FLAG_COMPRESSED != 0
    }

    /// Encode to the packed 52-byte form.
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[0..4].copy_from_slice(&HEADER_MAGIC.to_le_bytes());
        out[4..8].copy_from_slice(&self.version.to_le_bytes());
        out[8..12].copy_from_slice(&self.obj_type.as_u32().to_le_bytes());
        out[12..16].copy_from_slice(&self.flags.to_le_bytes());
        out[16..20].copy_from_slice(&self.size.to_le_bytes());
        out[20..52].copy_from_slice(self.hash.as_bytes());
        out
    }

    /// Decode from the start of `data`.
    ///
    /// Rejects short input, a foreign magic, any version other than
    /// [`HEADER_VERSION`], and unknown object types.
    pub fn from_bytes(data: &[u8]) -> Result<Self, TypeError> {
        if data.len() < HEADER_LEN {
            return Err(TypeError::InvalidLength {
                expected: HEADER_LEN,
                actual: data.len(),
            });
        }
        let word = |at: usize| u32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]]);

        let magic = word(0);
        if magic != HEADER_MAGIC {
            return Err(TypeError::BadMagic(magic));
        }
        let version = word(4);
        if version != HEADER_VERSION {
            return Err(TypeError::UnsupportedVersion(version));
        }
        let obj_type = ObjectType::from_u32(word(8))?;

        let mut hash = [0u8; 32];
        hash.copy_from_slice(&data[20..52]);

        Ok(Self {
            version,
            obj_type,
            flags: word(12),
            size: word(16),
            hash: ObjectId::from_hash(hash),
        })
    }
}
