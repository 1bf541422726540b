use embr_store::StoreError;
use embr_transform::TransformError;
use embr_transport::TransportError;
use embr_types::Status;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("no such remote: {0}")]
    UnknownRemote(String),

    #[error("remote already exists: {0}")]
    RemoteExists(String),

    #[error("set not found: {0}")]
    SetNotFound(String),

    #[error("{0}")]
    Unsupported(String),

    #[error("invalid remote metadata: {0}")]
    InvalidMetadata(String),

    #[error("invalid config {path}: {reason}")]
    Config { path: String, reason: String },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("transform failed: {0}")]
    Transform(#[from] TransformError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SyncError {
    pub fn status(&self) -> Status {
        match self {
            Self::UnknownRemote(_) | Self::SetNotFound(_) => Status::NotFound,
            Self::RemoteExists(_) => Status::InvalidParameter,
            Self::Unsupported(_) => Status::Unsupported,
            Self::Config { .. } | Self::InvalidMetadata(_) => Status::InvalidData,
            Self::Transport(e) => e.status(),
            Self::Store(e) => e.status(),
            Self::Transform(e) => e.status(),
            Self::Io(_) => Status::Io,
        }
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
