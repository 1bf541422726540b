use tokio_util::sync::CancellationToken;

use crate::error::{TransportError, TransportResult};
use crate::url::TransportKind;

/// Per-handle transfer options passed to every backend call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TransferOptions {
    /// Remote path the next transfer refers to, e.g. `sets/main` or
    /// `documents/<hash>.parquet`.
    pub target_path: Option<String>,
    /// Payloads are already encoded; skip the format transformer.
    pub precompressed: bool,
}

/// One transport implementation, selected by URL scheme.
///
/// Callers go through [`crate::Transport`], which validates arguments,
/// connects on demand, and records failures. Operations a backend does not
/// provide fall back to [`TransportError::NotImplemented`].
pub trait Backend: Send {
    fn kind(&self) -> TransportKind;

    fn connect(&mut self) -> TransportResult<()> {
        Err(TransportError::not_implemented("Connect"))
    }

    fn disconnect(&mut self) -> TransportResult<()> {
        Ok(())
    }

    fn send_data(
        &mut self,
        _data: &[u8],
        _hash: &str,
        _opts: &TransferOptions,
    ) -> TransportResult<()> {
        Err(TransportError::not_implemented("Send"))
    }

    /// Fill `buf` with the next chunk of incoming data. `Ok(0)` means
    /// nothing is left.
    fn receive_data(&mut self, _buf: &mut [u8], _opts: &TransferOptions) -> TransportResult<usize> {
        Err(TransportError::not_implemented("Receive"))
    }

    fn list_refs(&mut self, _opts: &TransferOptions) -> TransportResult<Vec<String>> {
        Err(TransportError::not_implemented("List refs"))
    }

    fn delete_refs(&mut self, _refs: &[String], _opts: &TransferOptions) -> TransportResult<()> {
        Err(TransportError::not_implemented("Delete refs"))
    }

    /// Token that aborts this backend's in-flight operation, if it has one.
    fn cancellation_token(&self) -> Option<CancellationToken> {
        None
    }
}
