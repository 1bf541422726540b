//! Readers for object files written before the structured header existed.
//!
//! Tried in order once the structured read fails: a NumPy `.npy` file, a
//! payload prefixed by a little-endian dimension count, a bare zstd frame,
//! and finally raw float32 bytes. The dimension-prefix reader is a
//! heuristic: a leading `u32` is only trusted when it is a plausible
//! embedding width and the remainder is exactly that many floats.

use embr_types::npy;
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::object::is_zstd;

/// Which legacy reader produced a payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LegacyFormat {
    Npy,
    DimensionPrefixed,
    Zstd,
    RawFloats,
}

/// Width most commonly emitted by hosted embedding APIs.
const COMMON_DIMENSION: u32 = 1536;

/// Whether a leading `u32` looks like an embedding dimension count.
pub fn is_plausible_dimension(dims: u32) -> bool {
    dims == COMMON_DIMENSION || (dims > 100 && dims < 10_000)
}

/// Decode a legacy object file into raw float32 bytes.
pub fn decode_legacy(name: &str, bytes: &[u8]) -> StoreResult<(LegacyFormat, Vec<u8>)> {
    if let Some(view) = npy::parse_npy(bytes)? {
        debug!(object = name, shape = ?view.shape, "read legacy .npy object");
        return Ok((LegacyFormat::Npy, view.data.to_vec()));
    }

    if let Some(payload) = dimension_prefixed(bytes) {
        debug!(object = name, "read legacy dimension-prefixed object");
        return Ok((LegacyFormat::DimensionPrefixed, payload.to_vec()));
    }

    if is_zstd(bytes) {
        let payload = zstd::decode_all(bytes).map_err(|e| StoreError::InvalidData {
            id: name.to_string(),
            reason: format!("zstd: {e}"),
        })?;
        return Ok((LegacyFormat::Zstd, payload));
    }

    if !bytes.is_empty() && bytes.len() % 4 == 0 {
        return Ok((LegacyFormat::RawFloats, bytes.to_vec()));
    }

    Err(StoreError::InvalidData {
        id: name.to_string(),
        reason: format!("{} bytes match no known object layout", bytes.len()),
    })
}

fn dimension_prefixed(bytes: &[u8]) -> Option<&[u8]> {
    if bytes.len() < 4 {
        return None;
    }
    let dims = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    if !is_plausible_dimension(dims) {
        return None;
    }
    let rest = &bytes[4..];
    (rest.len() == dims as usize * 4).then_some(rest)
}
