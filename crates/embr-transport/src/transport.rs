use std::sync::Arc;

use embr_store::RepoContext;
use embr_transform::{SharedTransformer, TransformerRegistry};
use embr_types::Status;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::backend::{Backend, TransferOptions};
use crate::error::{TransportError, TransportResult};
use crate::http::HttpTransport;
use crate::local::LocalTransport;
use crate::s3::{ObjectClient, S3Config, S3Transport};
use crate::ssh::SshTransport;
use crate::url::TransportKind;

/// Everything a backend may need beyond its URL.
#[derive(Clone, Default)]
pub struct TransportSettings {
    pub s3: S3Config,
    /// Overrides the transformer named by `s3.transformer`.
    pub transformer: Option<SharedTransformer>,
    /// Local repository whose set bookkeeping S3 pushes describe.
    pub repo: Option<RepoContext>,
    /// Pre-built S3 client, bypassing credential lookup.
    pub object_client: Option<Arc<dyn ObjectClient>>,
}

impl std::fmt::Debug for TransportSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportSettings")
            .field("s3", &self.s3)
            .field("transformer", &self.transformer.as_ref().map(|t| t.name().to_string()))
            .field("repo", &self.repo)
            .field("object_client", &self.object_client.is_some())
            .finish()
    }
}

/// A handle to one remote, chosen by URL scheme.
///
/// Data operations validate their arguments, connect on first use, and on
/// failure keep the status and message for [`Transport::get_error`].
pub struct Transport {
    url: String,
    kind: TransportKind,
    backend: Box<dyn Backend>,
    connected: bool,
    options: TransferOptions,
    last_status: Status,
    last_message: Option<String>,
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("url", &self.url)
            .field("kind", &self.kind)
            .field("connected", &self.connected)
            .field("options", &self.options)
            .field("last_status", &self.last_status)
            .finish()
    }
}

impl Transport {
    /// Open a disconnected handle with default settings.
    pub fn open(url: &str) -> TransportResult<Self> {
        Self::open_with(url, TransportSettings::default())
    }

    pub fn open_with(url: &str, settings: TransportSettings) -> TransportResult<Self> {
        if url.is_empty() {
            return Err(TransportError::InvalidParameter("URL is empty".into()));
        }
        let kind = TransportKind::classify(url)
            .ok_or_else(|| TransportError::Unsupported(format!("Unsupported transport URL: {url}")))?;

        let backend: Box<dyn Backend> = match kind {
            TransportKind::Local => Box::new(LocalTransport::new(url)),
            TransportKind::Ssh => Box::new(SshTransport::new(url)),
            TransportKind::Http => Box::new(HttpTransport::new(url)),
            TransportKind::S3 => {
                let transformer = match settings.transformer {
                    Some(t) => t,
                    None => TransformerRegistry::with_builtins().require(&settings.s3.transformer)?,
                };
                let mut s3 = S3Transport::new(url, settings.s3, transformer, settings.repo)?;
                if let Some(client) = settings.object_client {
                    s3 = s3.with_client(client);
                }
                Box::new(s3)
            }
        };
        debug!(url, kind = %kind, "opened transport");

        Ok(Self {
            url: url.to_string(),
            kind,
            backend,
            connected: false,
            options: TransferOptions::default(),
            last_status: Status::Success,
            last_message: None,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn kind(&self) -> TransportKind {
        self.kind
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Keep `err` on the handle, then hand it back.
    fn record(&mut self, err: TransportError) -> TransportError {
        warn!(url = %self.url, status = ?err.status(), error = %err, "transport operation failed");
        self.last_status = err.status();
        self.last_message = Some(err.to_string());
        err
    }

    fn check<T>(&mut self, result: TransportResult<T>) -> TransportResult<T> {
        result.map_err(|e| self.record(e))
    }

    fn invalid<T>(&mut self, message: &str) -> TransportResult<T> {
        Err(self.record(TransportError::InvalidParameter(message.into())))
    }

    pub fn connect(&mut self) -> TransportResult<()> {
        if self.connected {
            return Ok(());
        }
        let result = self.backend.connect();
        self.check(result)?;
        self.connected = true;
        Ok(())
    }

    pub fn disconnect(&mut self) -> TransportResult<()> {
        if !self.connected {
            return Ok(());
        }
        let result = self.backend.disconnect();
        self.connected = false;
        self.check(result)
    }

    pub fn send_data(&mut self, data: &[u8], hash: &str) -> TransportResult<()> {
        if data.is_empty() {
            return self.invalid("no data to send");
        }
        if hash.is_empty() {
            return self.invalid("object hash is required");
        }
        self.connect()?;
        let result = self.backend.send_data(data, hash, &self.options);
        self.check(result)
    }

    /// Fill `buf` with incoming bytes; `Ok(0)` when the current object is
    /// exhausted.
    pub fn receive_data(&mut self, buf: &mut [u8]) -> TransportResult<usize> {
        if buf.is_empty() {
            return self.invalid("receive buffer is empty");
        }
        self.connect()?;
        let result = self.backend.receive_data(buf, &self.options);
        self.check(result)
    }

    /// Read the current object to its end.
    pub fn receive_all(&mut self) -> TransportResult<Vec<u8>> {
        let mut out = Vec::new();
        let mut buf = vec![0u8; 64 * 1024];
        loop {
            let n = self.receive_data(&mut buf)?;
            if n == 0 {
                return Ok(out);
            }
            out.extend_from_slice(&buf[..n]);
        }
    }

    pub fn list_refs(&mut self) -> TransportResult<Vec<String>> {
        self.connect()?;
        let result = self.backend.list_refs(&self.options);
        self.check(result)
    }

    pub fn delete_refs(&mut self, refs: &[String]) -> TransportResult<()> {
        if refs.is_empty() {
            return self.invalid("no refs to delete");
        }
        self.connect()?;
        let result = self.backend.delete_refs(refs, &self.options);
        self.check(result)
    }

    /// Message of the last failure, or the description of the last status.
    pub fn get_error(&self) -> String {
        self.last_message
            .clone()
            .unwrap_or_else(|| self.last_status.description().to_string())
    }

    pub fn last_status(&self) -> Status {
        self.last_status
    }

    pub fn set_target_path(&mut self, path: Option<&str>) {
        self.options.target_path = path.map(str::to_string);
    }

    pub fn target_path(&self) -> Option<&str> {
        self.options.target_path.as_deref()
    }

    pub fn set_precompressed(&mut self, precompressed: bool) {
        self.options.precompressed = precompressed;
    }

    /// Token that aborts the in-flight operation from another thread.
    ///
    /// A token is spent once it has cancelled an operation; the backend
    /// issues a new one, so fetch the token again afterwards.
    pub fn cancellation_token(&self) -> Option<CancellationToken> {
        self.backend.cancellation_token()
    }

    /// Abort the in-flight operation, or the next one when idle, if the
    /// backend supports it.
    pub fn cancel(&self) -> bool {
        match self.backend.cancellation_token() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Disconnect and release the handle.
    pub fn close(mut self) -> TransportResult<()> {
        self.disconnect()
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        if self.connected {
            if let Err(e) = self.backend.disconnect() {
                debug!(url = %self.url, error = %e, "disconnect on drop failed");
            }
            self.connected = false;
        }
    }
}
