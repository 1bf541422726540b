use crate::backend::{Backend, TransferOptions};
use crate::error::{TransportError, TransportResult};
use crate::url::TransportKind;

const UNSUPPORTED: &str = "HTTP transport is not supported in this build";

/// Placeholder for `http://` and `https://` remotes.
#[derive(Debug)]
pub struct HttpTransport {
    url: String,
}

impl HttpTransport {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

fn unsupported<T>() -> TransportResult<T> {
    Err(TransportError::NotImplemented(UNSUPPORTED.into()))
}

impl Backend for HttpTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Http
    }

    fn connect(&mut self) -> TransportResult<()> {
        unsupported()
    }

    fn send_data(&mut self, _: &[u8], _: &str, _: &TransferOptions) -> TransportResult<()> {
        unsupported()
    }

    fn receive_data(&mut self, _: &mut [u8], _: &TransferOptions) -> TransportResult<usize> {
        unsupported()
    }

    fn list_refs(&mut self, _: &TransferOptions) -> TransportResult<Vec<String>> {
        unsupported()
    }

    fn delete_refs(&mut self, _: &[String], _: &TransferOptions) -> TransportResult<()> {
        unsupported()
    }
}
