use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid byte length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("invalid hash prefix {prefix:?}: {reason}")]
    InvalidPrefix { prefix: String, reason: String },

    #[error("invalid object header magic: 0x{0:08x}")]
    BadMagic(u32),

    #[error("unsupported object header version: {0}")]
    UnsupportedVersion(u32),

    #[error("unknown object type: {0}")]
    UnknownObjectType(u32),

    #[error("invalid .npy file: {0}")]
    InvalidNpy(String),

    #[error(".npy shape mismatch: shape declares {expected} values, payload holds {actual}")]
    NpyShapeMismatch { expected: usize, actual: usize },
}
