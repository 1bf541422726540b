//! Structured object envelope: a packed [`ObjectHeader`] followed by the
//! payload, zstd-compressed for vector objects.

use embr_types::{ObjectHeader, ObjectId, ObjectType, HEADER_LEN, HEADER_MAGIC};

use crate::error::{StoreError, StoreResult};

/// zstd level used for vector payloads.
pub const VECTOR_COMPRESSION_LEVEL: i32 = 9;

/// First four bytes of every zstd frame.
pub const ZSTD_MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];

/// A payload recovered from a structured object file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedObject {
    pub header: ObjectHeader,
    pub payload: Vec<u8>,
}

/// Returns `true` if `data` begins with a zstd frame magic.
pub fn is_zstd(data: &[u8]) -> bool {
    data.len() >= 4 && data[..4] == ZSTD_MAGIC
}

/// Returns `true` if `data` begins with the structured header magic.
///
/// Such files are never handed to the legacy readers: a damaged body must
/// surface as an error, not as a guessed payload.
pub fn has_header_magic(data: &[u8]) -> bool {
    data.len() >= 4 && data[..4] == HEADER_MAGIC.to_le_bytes()
}

/// Build the on-disk bytes for a payload and return them with its ID.
pub fn encode_object(data: &[u8], obj_type: ObjectType) -> StoreResult<(ObjectId, Vec<u8>)> {
    let size = u32::try_from(data.len()).map_err(|_| {
        StoreError::InvalidParameter(format!("object of {} bytes exceeds 4 GiB", data.len()))
    })?;
    let id = ObjectId::from_bytes(data);

    let compressed = obj_type == ObjectType::Vector;
    let body = if compressed {
        zstd::encode_all(data, VECTOR_COMPRESSION_LEVEL)
            .map_err(|e| StoreError::Compression(e.to_string()))?
    } else {
        data.to_vec()
    };

    let header = ObjectHeader::new(obj_type, size, id, compressed);
    let mut out = Vec::with_capacity(HEADER_LEN + body.len());
    out.extend_from_slice(&header.to_bytes());
    out.extend_from_slice(&body);
    Ok((id, out))
}

/// Decode a structured object file.
///
/// Fails with [`StoreError::InvalidData`] when the header is missing or
/// malformed or the body does not decompress to the declared size. A vector whose
/// payload does not hash to the header's hash fails with
/// [`StoreError::HashMismatch`].
pub fn decode_object(name: &str, file: &[u8]) -> StoreResult<DecodedObject> {
    let invalid = |reason: String| StoreError::InvalidData {
        id: name.to_string(),
        reason,
    };
    let header = ObjectHeader::from_bytes(file).map_err(|e| invalid(e.to_string()))?;
    let body = &file[HEADER_LEN..];

    let payload = if header.is_compressed() {
        zstd::decode_all(body).map_err(|e| invalid(format!("zstd: {e}")))?
    } else {
        body.to_vec()
    };
    if payload.len() != header.size as usize {
        return Err(invalid(format!(
            "header declares {} bytes, payload has {}",
            header.size,
            payload.len()
        )));
    }
    if header.obj_type == ObjectType::Vector {
        let computed = ObjectId::from_bytes(&payload);
        if computed != header.hash {
            return Err(StoreError::HashMismatch {
                id: header.hash,
                computed,
            });
        }
    }
    Ok(DecodedObject { header, payload })
}
