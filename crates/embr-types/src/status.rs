use std::fmt;

/// Status taxonomy shared by every EmbeddingBridge crate.
///
/// Each crate's error enum maps onto one of these codes via a `status()`
/// method, so callers can branch on the class of failure without matching
/// crate-specific variants. [`Status::description`] gives the fixed text a
/// transport reports when no richer message was recorded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Status {
    Success,
    InvalidParameter,
    Memory,
    Io,
    Timeout,
    NotConnected,
    ConnectionFailed,
    Authentication,
    Initialization,
    Unsupported,
    InvalidRepository,
    InvalidData,
    HashMismatch,
    DimensionMismatch,
    HashAmbiguous,
    NotFound,
    NotImplemented,
    Transform,
    Remote,
}

impl Status {
    pub fn description(self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::InvalidParameter => "Invalid parameter",
            Self::Memory => "Memory allocation failed",
            Self::Io => "I/O error",
            Self::Timeout => "Operation timed out",
            Self::NotConnected => "Transport not connected",
            Self::ConnectionFailed => "Connection failed",
            Self::Authentication => "Authentication failed",
            Self::Initialization => "Transport not initialized",
            Self::Unsupported => "Unsupported operation or protocol",
            Self::InvalidRepository => "Not a valid EB repository",
            Self::InvalidData => "Invalid data",
            Self::HashMismatch => "Hash mismatch",
            Self::DimensionMismatch => "Dimension mismatch",
            Self::HashAmbiguous => "Ambiguous hash prefix",
            Self::NotFound => "Not found",
            Self::NotImplemented => "Operation not implemented",
            Self::Transform => "Format transformation failed",
            Self::Remote => "Remote reported an error",
        }
    }

    pub fn is_success(self) -> bool {
        self == Self::Success
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}
