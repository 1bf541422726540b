//! S3 backend.
//!
//! Each pushed object becomes one document under
//! `<prefix>/sets/<set>/documents/`, encoded by the configured transformer,
//! and every push rewrites `<prefix>/sets/<set>/metadata.json` from the local
//! set. Network I/O runs on a private runtime started by `connect`; calls
//! block the caller until the operation finishes, its deadline passes, or
//! the handle's cancellation token fires.

pub mod client;
pub mod config;
pub mod credentials;
pub mod deadline;
pub mod keys;
pub mod memory;
pub mod metadata;

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use embr_store::{is_zstd, RepoContext, Repository};
use embr_transform::columnar::looks_like_json;
use embr_transform::SharedTransformer;
use tempfile::NamedTempFile;
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backend::{Backend, TransferOptions};
use crate::error::{TransportError, TransportResult};
use crate::url::{S3Location, TransportKind};

pub use client::{AwsObjectClient, ListPage, ObjectClient};
pub use config::S3Config;
pub use deadline::with_deadline;
pub use keys::KeyLayout;
pub use memory::MemoryObjectClient;
pub use metadata::{RemoteIndexEntry, RemoteMetadata, RemoteObject};

const DEFAULT_REGION: &str = "us-east-1";

/// Object fetched by `receive_data`, handed out in chunks.
struct Download {
    key: String,
    data: Bytes,
    pos: usize,
}

/// Transport to an `s3://` bucket prefix.
pub struct S3Transport {
    location: S3Location,
    config: S3Config,
    transformer: SharedTransformer,
    repo: Option<RepoContext>,
    runtime: Option<Runtime>,
    client: Option<Arc<dyn ObjectClient>>,
    preset_client: Option<Arc<dyn ObjectClient>>,
    cancel: CancellationToken,
    download: Option<Download>,
    /// Document format of every hash uploaded through this handle.
    formats: HashMap<String, String>,
}

impl fmt::Debug for S3Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Transport")
            .field("location", &self.location)
            .field("transformer", &self.transformer.name())
            .field("connected", &self.client.is_some())
            .finish()
    }
}

impl S3Transport {
    /// A disconnected transport for `url`.
    ///
    /// `repo` supplies the set bookkeeping written to the remote metadata;
    /// without it pushes describe only the object just sent.
    pub fn new(
        url: &str,
        config: S3Config,
        transformer: SharedTransformer,
        repo: Option<RepoContext>,
    ) -> TransportResult<Self> {
        Ok(Self {
            location: S3Location::parse(url)?,
            config,
            transformer,
            repo,
            runtime: None,
            client: None,
            preset_client: None,
            cancel: CancellationToken::new(),
            download: None,
            formats: HashMap::new(),
        })
    }

    /// Use `client` instead of building an AWS client on connect.
    pub fn with_client(mut self, client: Arc<dyn ObjectClient>) -> Self {
        self.preset_client = Some(client);
        self
    }

    pub fn location(&self) -> &S3Location {
        &self.location
    }

    pub fn config(&self) -> &S3Config {
        &self.config
    }

    /// Region from the URL, then the config, then `AWS_REGION`.
    fn region(&self) -> String {
        self.location
            .region
            .clone()
            .or_else(|| self.config.region.clone())
            .or_else(|| std::env::var("AWS_REGION").ok().filter(|r| !r.is_empty()))
            .unwrap_or_else(|| DEFAULT_REGION.to_string())
    }

    fn keys(&self, opts: &TransferOptions) -> KeyLayout {
        KeyLayout::new(&self.location.prefix, opts.target_path.as_deref())
    }

    /// Block on `op` under `deadline` and the cancellation token.
    ///
    /// A cancelled token is replaced once the operation has returned
    /// `Cancelled`, so one `cancel()` aborts at most one operation.
    fn run<T, F, Fut>(&mut self, operation: &str, deadline: Duration, op: F) -> TransportResult<T>
    where
        T: Send,
        F: FnOnce(Arc<dyn ObjectClient>) -> Fut,
        Fut: Future<Output = TransportResult<T>> + Send,
    {
        let runtime = self.runtime.as_ref().ok_or(TransportError::NotConnected)?;
        let client = self.client.clone().ok_or(TransportError::NotConnected)?;
        let result = block_on(runtime, with_deadline(operation, deadline, &self.cancel, op(client)));
        if matches!(result, Err(TransportError::Cancelled)) {
            debug!(operation, "operation cancelled, issuing a fresh token");
            self.cancel = CancellationToken::new();
        }
        result
    }

    /// Resolve credentials and build the SDK client on `runtime`.
    fn build_client(&self, runtime: &Runtime) -> TransportResult<AwsObjectClient> {
        let region = self.region();
        let endpoint = self
            .location
            .endpoint
            .clone()
            .or_else(|| self.config.endpoint_url.clone());
        let bucket = &self.location.bucket;
        let config = &self.config;
        block_on(runtime, async {
            let chain = credentials::default_chain();
            let creds = credentials::resolve(&chain).await?;
            Ok::<_, TransportError>(
                AwsObjectClient::connect(bucket, &region, endpoint.as_deref(), creds, config).await,
            )
        })
    }

    /// Encode a payload for upload; returns the bytes and their format.
    fn encode<'a>(&self, data: &'a [u8], precompressed: bool) -> TransportResult<(Cow<'a, [u8]>, String)> {
        if precompressed {
            if !is_zstd(data) {
                debug!(len = data.len(), "precompressed payload has no zstd magic, sending as is");
            }
            return Ok((Cow::Borrowed(data), "raw".into()));
        }
        if looks_like_json(data) {
            return Ok((Cow::Borrowed(data), "json".into()));
        }
        let encoded = self.transformer.transform(data)?;
        Ok((Cow::Owned(encoded), self.transformer.format_name().to_string()))
    }

    fn metadata_for(&self, set: &str, hash: &str, size: u64, format: &str) -> TransportResult<RemoteMetadata> {
        if let Some(ctx) = &self.repo {
            let repo = Repository::open(ctx.clone())?;
            let files = repo.set(set)?;
            if files.exists() {
                return Ok(RemoteMetadata::from_set(&files, &repo.head()?, size, format)?);
            }
        }
        warn!(set, "no local set found, metadata lists only the pushed object");
        Ok(RemoteMetadata::single(set, hash, size, format))
    }

    /// Key for a ref given to `delete_refs`: either a full key under the
    /// set, or a path relative to it.
    fn ref_key(keys: &KeyLayout, name: &str) -> TransportResult<String> {
        let name = name.trim_matches('/');
        if name.is_empty() {
            return Err(TransportError::InvalidParameter("empty ref name".into()));
        }
        if name.starts_with(&format!("{}/", keys.base())) {
            Ok(name.to_string())
        } else {
            Ok(format!("{}/{name}", keys.base()))
        }
    }
}

/// Drive `fut` to completion on `runtime` from synchronous code.
///
/// `Runtime::block_on` panics on a thread that is already inside a runtime,
/// so such callers are served from a short-lived scoped thread instead.
fn block_on<T, Fut>(runtime: &Runtime, fut: Fut) -> TransportResult<T>
where
    T: Send,
    Fut: Future<Output = TransportResult<T>> + Send,
{
    if tokio::runtime::Handle::try_current().is_err() {
        return runtime.block_on(fut);
    }
    std::thread::scope(|scope| {
        scope
            .spawn(|| runtime.block_on(fut))
            .join()
            .unwrap_or_else(|_| Err(TransportError::Initialization("S3 worker thread panicked".into())))
    })
}

impl Backend for S3Transport {
    fn kind(&self) -> TransportKind {
        TransportKind::S3
    }

    fn connect(&mut self) -> TransportResult<()> {
        if self.client.is_some() {
            return Ok(());
        }
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(self.config.worker_threads.max(1))
            .thread_name("embr-s3")
            .enable_all()
            .build()
            .map_err(|e| TransportError::Initialization(format!("failed to start S3 runtime: {e}")))?;

        let client: Arc<dyn ObjectClient> = match &self.preset_client {
            Some(client) => Arc::clone(client),
            None => match self.build_client(&runtime) {
                Ok(client) => Arc::new(client),
                Err(e) => {
                    // Dropping a runtime inside another one panics.
                    runtime.shutdown_background();
                    return Err(e);
                }
            },
        };

        if self.cancel.is_cancelled() {
            self.cancel = CancellationToken::new();
        }
        info!(bucket = %self.location.bucket, prefix = %self.location.prefix, "connected to S3");
        self.runtime = Some(runtime);
        self.client = Some(client);
        Ok(())
    }

    fn disconnect(&mut self) -> TransportResult<()> {
        self.client = None;
        self.download = None;
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
            debug!(bucket = %self.location.bucket, "disconnected from S3");
        }
        Ok(())
    }

    fn send_data(&mut self, data: &[u8], hash: &str, opts: &TransferOptions) -> TransportResult<()> {
        if data.is_empty() {
            return Err(TransportError::InvalidParameter("no data to send".into()));
        }
        if hash.is_empty() {
            return Err(TransportError::InvalidParameter("object hash is required".into()));
        }
        if self.client.is_none() {
            return Err(TransportError::NotConnected);
        }

        let keys = self.keys(opts);
        let (payload, format) = self.encode(data, opts.precompressed)?;
        let size = payload.len() as u64;

        let mut staged = NamedTempFile::new()?;
        staged.write_all(&payload)?;
        staged.flush()?;

        let key = keys.document_key(hash, &format);
        let upload_key = key.clone();
        let path = staged.path().to_path_buf();
        self.run("data upload", self.config.upload_timeout(), |client| async move {
            client.put_file(&upload_key, &path, size).await
        })?;
        info!(key = %key, size, format = %format, "uploaded document");
        self.formats.insert(hash.to_string(), format.clone());

        let mut doc = self.metadata_for(keys.set(), hash, size, &format)?;
        doc.ensure_object(hash);
        doc.record_formats(&self.formats);
        let body = Bytes::from(doc.to_json()?);
        let metadata_key = keys.metadata_key();
        self.run("metadata upload", self.config.upload_timeout(), |client| async move {
            client.put_bytes(&metadata_key, body, "application/json").await
        })?;
        debug!(set = keys.set(), objects = doc.objects.len(), "rewrote remote metadata");
        Ok(())
    }

    /// Each call hands out the next chunk of the object named by the
    /// target path (the set metadata when it names only a set). `Ok(0)`
    /// ends the object; the call after that downloads it again.
    fn receive_data(&mut self, buf: &mut [u8], opts: &TransferOptions) -> TransportResult<usize> {
        if buf.is_empty() {
            return Err(TransportError::InvalidParameter("receive buffer is empty".into()));
        }
        let keys = self.keys(opts);
        let key = keys.download_key(opts.target_path.as_deref());

        if self.download.as_ref().map_or(true, |d| d.key != key) {
            let fetch_key = key.clone();
            let data = self.run("download", self.config.download_timeout(), |client| async move {
                client.get(&fetch_key).await
            })?;
            if key == keys.metadata_key() && data.iter().all(u8::is_ascii_whitespace) {
                return Err(TransportError::InvalidData("Downloaded metadata is empty".into()));
            }
            debug!(key = %key, len = data.len(), "downloaded object");
            self.download = Some(Download { key, data, pos: 0 });
        }

        let Some(download) = self.download.as_mut() else {
            return Ok(0);
        };
        let n = (download.data.len() - download.pos).min(buf.len());
        buf[..n].copy_from_slice(&download.data[download.pos..download.pos + n]);
        download.pos += n;
        if n == 0 {
            self.download = None;
        }
        Ok(n)
    }

    /// Document keys of the set plus its metadata key, if present.
    fn list_refs(&mut self, opts: &TransferOptions) -> TransportResult<Vec<String>> {
        let keys = self.keys(opts);
        let prefixes = [keys.documents_prefix(), keys.metadata_key()];
        let refs = self.run("list", self.config.list_timeout(), |client| async move {
            let mut found = Vec::new();
            for prefix in &prefixes {
                let mut token = None;
                loop {
                    let page = client.list_page(prefix, token.take()).await?;
                    found.extend(page.keys.into_iter().filter(|k| !k.ends_with('/')));
                    match page.next_token {
                        Some(next) => token = Some(next),
                        None => break,
                    }
                }
            }
            Ok(found)
        })?;
        debug!(set = keys.set(), count = refs.len(), "listed remote refs");
        Ok(refs)
    }

    /// Delete in order, stopping at the first failure.
    fn delete_refs(&mut self, refs: &[String], opts: &TransferOptions) -> TransportResult<()> {
        let keys = self.keys(opts);
        for name in refs {
            let key = Self::ref_key(&keys, name)?;
            let delete_key = key.clone();
            self.run("delete", self.config.delete_timeout(), |client| async move {
                client.delete(&delete_key).await
            })?;
            info!(key = %key, "deleted remote object");
        }
        Ok(())
    }

    fn cancellation_token(&self) -> Option<CancellationToken> {
        Some(self.cancel.clone())
    }
}

impl Drop for S3Transport {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use embr_store::DEFAULT_SET;
    use embr_transform::{NativeTransformer, ParquetTransformer};
    use embr_types::Status;
    use std::collections::BTreeMap;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Instant;
    use tempfile::TempDir;

    // ----- Mock client -----

    #[derive(Default)]
    struct MockClient {
        calls: AtomicUsize,
        objects: Mutex<BTreeMap<String, Vec<u8>>>,
        hang_puts: bool,
        fail_delete: Option<String>,
        page_size: usize,
    }

    impl MockClient {
        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn insert(&self, key: &str, data: &[u8]) {
            self.objects.lock().unwrap().insert(key.to_string(), data.to_vec());
        }

        fn object(&self, key: &str) -> Option<Vec<u8>> {
            self.objects.lock().unwrap().get(key).cloned()
        }

        fn keys(&self) -> Vec<String> {
            self.objects.lock().unwrap().keys().cloned().collect()
        }
    }

    #[async_trait]
    impl ObjectClient for MockClient {
        async fn put_file(&self, key: &str, path: &Path, _len: u64) -> TransportResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.hang_puts {
                std::future::pending::<()>().await;
            }
            let data = std::fs::read(path)?;
            self.insert(key, &data);
            Ok(())
        }

        async fn put_bytes(&self, key: &str, body: Bytes, _content_type: &str) -> TransportResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.insert(key, &body);
            Ok(())
        }

        async fn get(&self, key: &str) -> TransportResult<Bytes> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.object(key)
                .map(Bytes::from)
                .ok_or_else(|| TransportError::NotFound(format!("S3 object not found: {key}")))
        }

        async fn list_page(&self, prefix: &str, token: Option<String>) -> TransportResult<ListPage> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let matching: Vec<String> = self
                .keys()
                .into_iter()
                .filter(|k| k.starts_with(prefix) && !k[prefix.len()..].contains('/'))
                .collect();
            let start: usize = token.map_or(0, |t| t.parse().unwrap());
            let size = if self.page_size == 0 { 1000 } else { self.page_size };
            let end = (start + size).min(matching.len());
            Ok(ListPage {
                keys: matching[start..end].to_vec(),
                next_token: (end < matching.len()).then(|| end.to_string()),
            })
        }

        async fn delete(&self, key: &str) -> TransportResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_delete.as_deref() == Some(key) {
                return Err(TransportError::Remote {
                    code: "AccessDenied".into(),
                    message: format!("delete {key}: denied"),
                });
            }
            self.objects.lock().unwrap().remove(key);
            Ok(())
        }
    }

    fn transport(mock: &Arc<MockClient>, config: S3Config, repo: Option<RepoContext>) -> S3Transport {
        let client: Arc<dyn ObjectClient> = mock.clone();
        S3Transport::new("s3://bucket/team", config, Arc::new(ParquetTransformer::new()), repo)
            .unwrap()
            .with_client(client)
    }

    fn connected(mock: &Arc<MockClient>) -> S3Transport {
        let mut s3 = transport(mock, S3Config::default(), None);
        s3.connect().unwrap();
        s3
    }

    fn floats(values: &[f32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    fn target(path: &str) -> TransferOptions {
        TransferOptions {
            target_path: Some(path.into()),
            precompressed: false,
        }
    }

    // ----- Argument checks -----

    #[test]
    fn empty_data_makes_no_calls() {
        let mock = Arc::new(MockClient::default());
        let mut s3 = connected(&mock);
        let err = s3.send_data(&[], "abc", &TransferOptions::default()).unwrap_err();
        assert_eq!(err.status(), Status::InvalidParameter);
        assert_eq!(mock.calls(), 0);
    }

    #[test]
    fn empty_hash_makes_no_calls() {
        let mock = Arc::new(MockClient::default());
        let mut s3 = connected(&mock);
        let err = s3.send_data(b"data", "", &TransferOptions::default()).unwrap_err();
        assert_eq!(err.status(), Status::InvalidParameter);
        assert_eq!(mock.calls(), 0);
    }

    #[test]
    fn operations_before_connect_fail() {
        let mock = Arc::new(MockClient::default());
        let mut s3 = transport(&mock, S3Config::default(), None);
        let err = s3.list_refs(&TransferOptions::default()).unwrap_err();
        assert_eq!(err.status(), Status::NotConnected);
    }

    // ----- Upload -----

    #[test]
    fn upload_writes_document_and_metadata() {
        let mock = Arc::new(MockClient::default());
        let mut s3 = connected(&mock);
        let data = floats(&[1.0, 2.0, 3.0]);
        s3.send_data(&data, "abc123", &target("sets/main")).unwrap();

        let doc = mock.object("team/sets/main/documents/abc123.parquet").unwrap();
        assert!(embr_transform::is_parquet(&doc));
        let meta = RemoteMetadata::from_json(&mock.object("team/sets/main/metadata.json").unwrap()).unwrap();
        assert_eq!(meta.set, DEFAULT_SET);
        assert_eq!(meta.format, "parquet");
        assert_eq!(meta.size, doc.len() as u64);
        assert_eq!(meta.objects[0].hash, "abc123");
        assert_eq!(mock.calls(), 2);
    }

    #[test]
    fn precompressed_payload_is_sent_unchanged() {
        let mock = Arc::new(MockClient::default());
        let mut s3 = connected(&mock);
        let payload = [0x28, 0xB5, 0x2F, 0xFD, 1, 2, 3];
        let opts = TransferOptions {
            target_path: Some("sets/main".into()),
            precompressed: true,
        };
        s3.send_data(&payload, "feed", &opts).unwrap();
        assert_eq!(mock.object("team/sets/main/documents/feed.raw").unwrap(), payload);
    }

    #[test]
    fn json_payload_keeps_json_extension() {
        let mock = Arc::new(MockClient::default());
        let mut s3 = connected(&mock);
        s3.send_data(br#"{"k":1}"#, "beef", &target("sets/main")).unwrap();
        assert!(mock.object("team/sets/main/documents/beef.json").is_some());
    }

    #[test]
    fn floats_framed_like_json_are_transformed() {
        let mock = Arc::new(MockClient::default());
        let mut s3 = connected(&mock);
        let data = floats(&[f32::from_bits(0x3F80_007B), 0.5, f32::from_bits(0x5D00_0000)]);
        assert_eq!((data[0], data[data.len() - 1]), (b'{', b']'));
        s3.send_data(&data, "5c5f", &target("sets/main")).unwrap();
        assert!(mock.object("team/sets/main/documents/5c5f.parquet").is_some());
        assert!(mock.object("team/sets/main/documents/5c5f.json").is_none());
    }

    #[test]
    fn metadata_records_each_document_format() {
        let dir = TempDir::new().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        let vector = repo.store_embedding(&floats(&[0.5, 0.25]), "a.txt", "mini").unwrap();
        let doc = br#"{"note":"kept as json!"}"#;
        let json = repo.store_embedding(doc, "b.json", "mini").unwrap();

        let mock = Arc::new(MockClient::default());
        let mut s3 = transport(&mock, S3Config::default(), Some(repo.context().clone()));
        s3.connect().unwrap();
        for id in [json.id, vector.id] {
            let payload = repo.read(&id).unwrap();
            s3.send_data(&payload, &id.to_hex(), &target("sets/main")).unwrap();
        }

        let meta = RemoteMetadata::from_json(&mock.object("team/sets/main/metadata.json").unwrap()).unwrap();
        assert_eq!(meta.format, "parquet");
        let format_of = |hash: String| {
            let object = meta.objects.iter().find(|o| o.hash == hash).unwrap();
            meta.format_of(object).to_string()
        };
        assert_eq!(format_of(json.id.to_hex()), "json");
        assert_eq!(format_of(vector.id.to_hex()), "parquet");
        assert!(mock.object(&format!("team/sets/main/documents/{}.json", json.id.to_hex())).is_some());
    }

    #[test]
    fn metadata_describes_the_local_set() {
        let dir = TempDir::new().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        let stored = repo.store_embedding(&floats(&[0.5, 0.25]), "a.txt", "mini").unwrap();

        let mock = Arc::new(MockClient::default());
        let mut s3 = transport(&mock, S3Config::default(), Some(repo.context().clone()));
        s3.connect().unwrap();
        let payload = repo.read(&stored.id).unwrap();
        s3.send_data(&payload, &stored.id.to_hex(), &target("sets/main")).unwrap();

        let meta = RemoteMetadata::from_json(&mock.object("team/sets/main/metadata.json").unwrap()).unwrap();
        assert_eq!(meta.objects.len(), 1);
        assert_eq!(meta.objects[0].path, "a.txt");
        assert_eq!(meta.objects[0].model.as_deref(), Some("mini"));
        assert_eq!(meta.refs["mini"], stored.id.to_hex());
        assert_eq!(meta.head, "main");
    }

    #[test]
    fn every_push_rewrites_metadata() {
        let mock = Arc::new(MockClient::default());
        let mut s3 = connected(&mock);
        s3.send_data(&floats(&[1.0]), "aaaa", &target("sets/main")).unwrap();
        s3.send_data(&floats(&[2.0]), "bbbb", &target("sets/main")).unwrap();
        let meta = RemoteMetadata::from_json(&mock.object("team/sets/main/metadata.json").unwrap()).unwrap();
        let hashes: Vec<&str> = meta.objects.iter().map(|o| o.hash.as_str()).collect();
        assert_eq!(hashes, ["bbbb"]);
    }

    // ----- Deadlines -----

    #[test]
    fn upload_times_out_at_deadline() {
        let mock = Arc::new(MockClient {
            hang_puts: true,
            ..Default::default()
        });
        let config = S3Config {
            upload_timeout_ms: 100,
            ..Default::default()
        };
        let mut s3 = transport(&mock, config, None);
        s3.connect().unwrap();

        let start = Instant::now();
        let err = s3.send_data(&floats(&[1.0]), "abcd", &target("sets/main")).unwrap_err();
        assert!(start.elapsed() >= Duration::from_millis(100));
        assert_eq!(err.status(), Status::Timeout);
        assert_eq!(err.to_string(), "S3 data upload operation timed out");
    }

    #[test]
    fn cancel_aborts_only_the_next_operation() {
        let mock = Arc::new(MockClient::default());
        let mut s3 = connected(&mock);
        s3.cancellation_token().unwrap().cancel();
        let err = s3.list_refs(&TransferOptions::default()).unwrap_err();
        assert!(matches!(err, TransportError::Cancelled));
        assert_eq!(mock.calls(), 0);

        assert!(!s3.cancellation_token().unwrap().is_cancelled());
        assert!(s3.list_refs(&TransferOptions::default()).unwrap().is_empty());
        assert!(s3.list_refs(&TransferOptions::default()).unwrap().is_empty());
    }

    #[test]
    fn reconnect_also_clears_a_pending_cancel() {
        let mock = Arc::new(MockClient::default());
        let mut s3 = connected(&mock);
        s3.cancellation_token().unwrap().cancel();
        s3.disconnect().unwrap();
        s3.connect().unwrap();
        assert!(s3.list_refs(&TransferOptions::default()).unwrap().is_empty());
    }

    #[tokio::test]
    async fn blocking_calls_work_inside_a_runtime() {
        let mock = Arc::new(MockClient::default());
        let mut s3 = connected(&mock);
        s3.send_data(&floats(&[1.0, 2.0]), "abcd", &target("sets/main")).unwrap();
        let refs = s3.list_refs(&target("sets/main")).unwrap();
        assert_eq!(refs.len(), 2);
        s3.disconnect().unwrap();
    }

    // ----- Download -----

    #[test]
    fn receive_drains_metadata_in_chunks() {
        let mock = Arc::new(MockClient::default());
        let doc = RemoteMetadata::single("main", "abcd", 4, "parquet").to_json().unwrap();
        mock.insert("team/sets/main/metadata.json", &doc);
        let mut s3 = connected(&mock);

        let opts = target("sets/main");
        let mut received = Vec::new();
        let mut buf = [0u8; 16];
        loop {
            let n = s3.receive_data(&mut buf, &opts).unwrap();
            if n == 0 {
                break;
            }
            received.extend_from_slice(&buf[..n]);
        }
        assert_eq!(received, doc);
        assert_eq!(mock.calls(), 1);
    }

    #[test]
    fn receive_document_by_relative_path() {
        let mock = Arc::new(MockClient::default());
        mock.insert("team/sets/main/documents/abcd.parquet", b"PAR1xxPAR1");
        let mut s3 = connected(&mock);
        let mut buf = [0u8; 64];
        let n = s3.receive_data(&mut buf, &target("documents/abcd.parquet")).unwrap();
        assert_eq!(&buf[..n], b"PAR1xxPAR1");
    }

    #[test]
    fn empty_metadata_is_invalid_data() {
        let mock = Arc::new(MockClient::default());
        mock.insert("team/sets/main/metadata.json", b"");
        let mut s3 = connected(&mock);
        let err = s3.receive_data(&mut [0u8; 8], &target("sets/main")).unwrap_err();
        assert_eq!(err.status(), Status::InvalidData);
        assert_eq!(err.to_string(), "Downloaded metadata is empty");
    }

    #[test]
    fn missing_object_is_not_found() {
        let mock = Arc::new(MockClient::default());
        let mut s3 = connected(&mock);
        let err = s3.receive_data(&mut [0u8; 8], &target("sets/main")).unwrap_err();
        assert_eq!(err.status(), Status::NotFound);
    }

    // ----- Listing and deletion -----

    #[test]
    fn list_follows_pagination() {
        let mock = Arc::new(MockClient {
            page_size: 2,
            ..Default::default()
        });
        for hash in ["a1", "b2", "c3", "d4", "e5"] {
            mock.insert(&format!("team/sets/main/documents/{hash}.parquet"), b"x");
        }
        mock.insert("team/sets/main/metadata.json", b"{}");
        mock.insert("team/sets/other/metadata.json", b"{}");
        let mut s3 = connected(&mock);

        let refs = s3.list_refs(&target("sets/main")).unwrap();
        assert_eq!(refs.len(), 6);
        assert!(refs.contains(&"team/sets/main/metadata.json".to_string()));
        assert!(!refs.iter().any(|r| r.contains("other")));
    }

    #[test]
    fn delete_stops_at_first_failure() {
        let mock = Arc::new(MockClient {
            fail_delete: Some("team/sets/main/documents/b.parquet".into()),
            ..Default::default()
        });
        for name in ["a", "b", "c"] {
            mock.insert(&format!("team/sets/main/documents/{name}.parquet"), b"x");
        }
        let mut s3 = connected(&mock);
        let refs: Vec<String> = ["a", "b", "c"]
            .iter()
            .map(|n| format!("documents/{n}.parquet"))
            .collect();

        let err = s3.delete_refs(&refs, &target("sets/main")).unwrap_err();
        assert_eq!(err.status(), Status::Remote);
        assert_eq!(mock.calls(), 2);
        assert!(mock.object("team/sets/main/documents/a.parquet").is_none());
        assert!(mock.object("team/sets/main/documents/c.parquet").is_some());
    }

    #[test]
    fn delete_accepts_full_keys() {
        let mock = Arc::new(MockClient::default());
        mock.insert("team/sets/main/documents/a.parquet", b"x");
        let mut s3 = connected(&mock);
        s3.delete_refs(&["team/sets/main/documents/a.parquet".into()], &target("sets/main"))
            .unwrap();
        assert!(mock.keys().is_empty());
    }

    #[test]
    fn native_transformer_sets_extension() {
        let mock = Arc::new(MockClient::default());
        let client: Arc<dyn ObjectClient> = mock.clone();
        let mut s3 = S3Transport::new("s3://bucket", S3Config::default(), Arc::new(NativeTransformer), None)
            .unwrap()
            .with_client(client);
        s3.connect().unwrap();
        s3.send_data(&floats(&[1.0]), "abcd", &TransferOptions::default()).unwrap();
        assert!(mock.object("sets/main/documents/abcd.native").is_some());
    }
}
