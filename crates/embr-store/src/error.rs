use std::path::PathBuf;

use embr_types::{ObjectId, Status, TypeError};

/// Errors from object store and repository operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A caller-supplied argument was rejected before touching disk.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// No object (or file) matches the requested hash or prefix.
    #[error("object not found: {0}")]
    NotFound(String),

    /// More than one object matches a hash prefix.
    #[error("ambiguous hash prefix {prefix}: matches {}", .candidates.join(", "))]
    HashAmbiguous {
        prefix: String,
        candidates: Vec<String>,
    },

    /// Content hash mismatch on read (data corruption).
    #[error("hash mismatch for {id}: content hashes to {computed}")]
    HashMismatch { id: ObjectId, computed: ObjectId },

    /// A vector's declared dimension count disagrees with its payload.
    #[error("dimension mismatch: expected {expected}, found {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The object data is malformed or cannot be decoded by any reader.
    #[error("invalid object data for {id}: {reason}")]
    InvalidData { id: String, reason: String },

    /// A line in a log, index, ref, or metadata file failed to parse.
    #[error("{}:{line}: {reason}", .path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    /// A set or model name failed validation.
    #[error("invalid name {name:?}: {reason}")]
    InvalidName { name: String, reason: String },

    /// No `.eb` directory was found at or above the start path.
    #[error("not an EB repository (or any parent up to /): {}", .0.display())]
    InvalidRepository(PathBuf),

    /// Another process holds a repository lock.
    #[error("{} is held by another process", .0.display())]
    Locked(PathBuf),

    /// zstd compression or decompression failed.
    #[error("compression error: {0}")]
    Compression(String),

    /// I/O error from the underlying filesystem.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// The shared status code for this error.
    pub fn status(&self) -> Status {
        match self {
            Self::InvalidParameter(_) | Self::InvalidName { .. } => Status::InvalidParameter,
            Self::NotFound(_) => Status::NotFound,
            Self::HashAmbiguous { .. } => Status::HashAmbiguous,
            Self::HashMismatch { .. } => Status::HashMismatch,
            Self::DimensionMismatch { .. } => Status::DimensionMismatch,
            Self::InvalidData { .. } | Self::Parse { .. } | Self::Compression(_) => {
                Status::InvalidData
            }
            Self::InvalidRepository(_) => Status::InvalidRepository,
            Self::Io(_) | Self::Locked(_) => Status::Io,
        }
    }
}

impl From<TypeError> for StoreError {
    fn from(err: TypeError) -> Self {
        match err {
            TypeError::NpyShapeMismatch { expected, actual } => {
                Self::DimensionMismatch { expected, actual }
            }
            TypeError::InvalidHex(_)
            | TypeError::InvalidLength { .. }
            | TypeError::InvalidPrefix { .. } => Self::InvalidParameter(err.to_string()),
            other => Self::InvalidData {
                id: String::new(),
                reason: other.to_string(),
            },
        }
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
