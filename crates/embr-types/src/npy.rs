//! Minimal reader/writer for NumPy `.npy` files holding float32 vectors.
//!
//! Only little-endian `f4` arrays in C order are accepted; that is what
//! embedding providers emit and what the store and transformers consume.

use crate::error::TypeError;

/// The six magic bytes every `.npy` file starts with.
pub const NPY_MAGIC: &[u8; 6] = b"\x93NUMPY";

/// A parsed `.npy` file borrowing its payload from the input.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NpyView<'a> {
    pub shape: Vec<usize>,
    /// Raw little-endian f32 bytes.
    pub data: &'a [u8],
}

impl NpyView<'_> {
    /// Number of float elements described by the shape.
    pub fn element_count(&self) -> usize {
        self.shape.iter().product()
    }
}

/// Returns `true` if `bytes` starts with the `.npy` magic.
pub fn is_npy(bytes: &[u8]) -> bool {
    bytes.len() >= NPY_MAGIC.len() && &bytes[..NPY_MAGIC.len()] == NPY_MAGIC
}

/// Parse a `.npy` file.
///
/// Returns `Ok(None)` if the magic is absent so callers can try other
/// decoders.
pub fn parse_npy(bytes: &[u8]) -> Result<Option<NpyView<'_>>, TypeError> {
    if !is_npy(bytes) {
        return Ok(None);
    }
    if bytes.len() < 10 {
        return Err(TypeError::InvalidNpy("truncated preamble".into()));
    }
    let major = bytes[6];
    let (header_len, header_start) = match major {
        1 => (u16::from_le_bytes([bytes[8], bytes[9]]) as usize, 10),
        2 | 3 => {
            if bytes.len() < 12 {
                return Err(TypeError::InvalidNpy("truncated preamble".into()));
            }
            (
                u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize,
                12,
            )
        }
        other => return Err(TypeError::InvalidNpy(format!("unsupported version {other}"))),
    };
    let data_start = header_start + header_len;
    if bytes.len() < data_start {
        return Err(TypeError::InvalidNpy("header extends past end of file".into()));
    }
    let header = std::str::from_utf8(&bytes[header_start..data_start])
        .map_err(|_| TypeError::InvalidNpy("header is not ASCII".into()))?;

    let descr = dict_value(header, "descr")
        .ok_or_else(|| TypeError::InvalidNpy("missing descr".into()))?;
    let descr = descr.trim_matches(|c| c == '\'' || c == '"');
    if descr != "<f4" && descr != "|f4" {
        return Err(TypeError::InvalidNpy(format!("unsupported dtype {descr}")));
    }
    if dict_value(header, "fortran_order").is_some_and(|v| v.starts_with("True")) {
        return Err(TypeError::InvalidNpy("fortran order is not supported".into()));
    }
    let shape = parse_shape(header)?;

    let data = &bytes[data_start..];
    let view = NpyView { shape, data };
    let expected = view.element_count() * 4;
    if data.len() != expected {
        return Err(TypeError::NpyShapeMismatch {
            expected: view.element_count(),
            actual: data.len() / 4,
        });
    }
    Ok(Some(view))
}

/// Encode a one-dimensional float32 array as a version 1.0 `.npy` file.
pub fn encode_npy(values: &[f32]) -> Vec<u8> {
    let mut header = format!(
        "{{'descr': '<f4', 'fortran_order': False, 'shape': ({},), }}",
        values.len()
    );
    // Preamble + header + newline must be a multiple of 64.
    let unpadded = 10 + header.len() + 1;
    let padding = (64 - unpadded % 64) % 64;
    header.push_str(&" ".repeat(padding));
    header.push('\n');

    let mut out = Vec::with_capacity(10 + header.len() + values.len() * 4);
    out.extend_from_slice(NPY_MAGIC);
    out.extend_from_slice(&[1, 0]);
    out.extend_from_slice(&(header.len() as u16).to_le_bytes());
    out.extend_from_slice(header.as_bytes());
    for v in values {
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}

fn dict_value<'h>(header: &'h str, key: &str) -> Option<&'h str> {
    let quoted = format!("'{key}'");
    let at = header.find(&quoted)? + quoted.len();
    let rest = header[at..].trim_start().strip_prefix(':')?;
    Some(rest.trim_start())
}

fn parse_shape(header: &str) -> Result<Vec<usize>, TypeError> {
    let value = dict_value(header, "shape")
        .ok_or_else(|| TypeError::InvalidNpy("missing shape".into()))?;
    let inner = value
        .strip_prefix('(')
        .and_then(|v| v.split(')').next())
        .ok_or_else(|| TypeError::InvalidNpy("malformed shape".into()))?;
    inner
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<usize>()
                .map_err(|_| TypeError::InvalidNpy(format!("bad shape component {s:?}")))
        })
        .collect()
}
