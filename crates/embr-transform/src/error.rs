use embr_types::Status;

/// Errors from format transformers and the registry.
#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    #[error("invalid transformer input: {0}")]
    InvalidInput(String),

    #[error("no transformer registered for format {0:?}")]
    UnknownFormat(String),

    /// Decoded float count disagrees with the recorded dimension count.
    #[error("dimension mismatch: file declares {expected}, column holds {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The Parquet file has a layout this transformer does not write.
    #[error("unsupported parquet layout: {0}")]
    UnsupportedLayout(String),

    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("arrow error: {0}")]
    Arrow(#[from] arrow_schema::ArrowError),
}

impl TransformError {
    /// The shared status code for this error.
    pub fn status(&self) -> Status {
        match self {
            Self::InvalidInput(_) => Status::InvalidParameter,
            Self::UnknownFormat(_) => Status::NotFound,
            Self::DimensionMismatch { .. } => Status::DimensionMismatch,
            Self::UnsupportedLayout(_) => Status::InvalidData,
            Self::Parquet(_) | Self::Arrow(_) => Status::Transform,
        }
    }
}

/// Result alias for transformer operations.
pub type TransformResult<T> = Result<T, TransformError>;
