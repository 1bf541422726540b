use embr_store::StoreError;
use embr_transform::TransformError;
use embr_types::Status;

/// Errors from transport handles and their backends.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The URL scheme maps to no transport.
    #[error("{0}")]
    Unsupported(String),

    /// The backend does not provide this operation.
    #[error("{0}")]
    NotImplemented(String),

    #[error("transport is not connected")]
    NotConnected,

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    InvalidRepository(String),

    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("{0}")]
    Authentication(String),

    #[error("{0}")]
    Initialization(String),

    /// A deadline expired before the backend answered.
    #[error("{0}")]
    Timeout(String),

    /// The in-flight operation was aborted through its cancellation token.
    #[error("operation cancelled")]
    Cancelled,

    #[error("{0}")]
    InvalidData(String),

    /// The remote service rejected the request.
    #[error("remote error {code}: {message}")]
    Remote { code: String, message: String },

    #[error("transform failed: {0}")]
    Transform(#[from] TransformError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// The shared status code for this error.
    pub fn status(&self) -> Status {
        match self {
            Self::InvalidParameter(_) => Status::InvalidParameter,
            Self::Unsupported(_) => Status::Unsupported,
            Self::NotImplemented(_) => Status::NotImplemented,
            Self::NotConnected => Status::NotConnected,
            Self::NotFound(_) => Status::NotFound,
            Self::InvalidRepository(_) => Status::InvalidRepository,
            Self::ConnectionFailed(_) => Status::ConnectionFailed,
            Self::Authentication(_) => Status::Authentication,
            Self::Initialization(_) => Status::Initialization,
            Self::Timeout(_) | Self::Cancelled => Status::Timeout,
            Self::InvalidData(_) => Status::InvalidData,
            Self::Remote { .. } => Status::Remote,
            Self::Transform(_) => Status::Transform,
            Self::Store(e) => e.status(),
            Self::Io(_) => Status::Io,
        }
    }

    /// Error for an operation a backend leaves unimplemented.
    pub fn not_implemented(operation: &str) -> Self {
        Self::NotImplemented(format!(
            "{operation} operation not implemented for this transport"
        ))
    }
}

/// Result alias for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_is_a_timeout_class_failure() {
        assert_eq!(TransportError::Cancelled.status(), Status::Timeout);
        assert_eq!(TransportError::Cancelled.to_string(), "operation cancelled");
    }

    #[test]
    fn not_implemented_message() {
        let err = TransportError::not_implemented("Connect");
        assert_eq!(err.to_string(), "Connect operation not implemented for this transport");
        assert_eq!(err.status(), Status::NotImplemented);
    }

    #[test]
    fn store_errors_keep_their_status() {
        let err = TransportError::from(StoreError::NotFound("abcd".into()));
        assert_eq!(err.status(), Status::NotFound);
    }
}
