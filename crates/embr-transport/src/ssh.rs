use tracing::debug;

use crate::backend::{Backend, TransferOptions};
use crate::error::{TransportError, TransportResult};
use crate::url::TransportKind;

const UNSUPPORTED: &str = "SSH transport is not supported in this build";

/// Placeholder for `ssh://` and `user@host` remotes.
///
/// Every data operation fails with [`TransportError::NotImplemented`];
/// disconnecting always succeeds.
#[derive(Debug)]
pub struct SshTransport {
    url: String,
}

impl SshTransport {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
        }
    }

    fn unsupported(&self) -> TransportError {
        debug!(url = %self.url, "ssh transport requested");
        TransportError::NotImplemented(UNSUPPORTED.into())
    }
}

impl Backend for SshTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Ssh
    }

    fn connect(&mut self) -> TransportResult<()> {
        Err(self.unsupported())
    }

    fn send_data(&mut self, _: &[u8], _: &str, _: &TransferOptions) -> TransportResult<()> {
        Err(self.unsupported())
    }

    fn receive_data(&mut self, _: &mut [u8], _: &TransferOptions) -> TransportResult<usize> {
        Err(self.unsupported())
    }

    fn list_refs(&mut self, _: &TransferOptions) -> TransportResult<Vec<String>> {
        Err(self.unsupported())
    }

    fn delete_refs(&mut self, _: &[String], _: &TransferOptions) -> TransportResult<()> {
        Err(self.unsupported())
    }
}
