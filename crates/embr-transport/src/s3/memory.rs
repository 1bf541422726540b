use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use bytes::Bytes;

use super::client::{ListPage, ObjectClient};
use crate::error::{TransportError, TransportResult};

const DEFAULT_PAGE_SIZE: usize = 1000;

/// [`ObjectClient`] over a `BTreeMap`, for tests and offline use.
///
/// Listing honours the `/` delimiter and pages like S3 does.
#[derive(Debug)]
pub struct MemoryObjectClient {
    objects: RwLock<BTreeMap<String, Bytes>>,
    requests: AtomicUsize,
    page_size: usize,
}

impl Default for MemoryObjectClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryObjectClient {
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            objects: RwLock::new(BTreeMap::new()),
            requests: AtomicUsize::new(0),
            page_size: page_size.max(1),
        }
    }

    /// Requests served so far.
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn insert(&self, key: &str, data: impl Into<Bytes>) {
        self.objects
            .write()
            .expect("lock poisoned")
            .insert(key.to_string(), data.into());
    }

    pub fn object(&self, key: &str) -> Option<Bytes> {
        self.objects.read().expect("lock poisoned").get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.read().expect("lock poisoned").keys().cloned().collect()
    }

    fn count(&self) {
        self.requests.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ObjectClient for MemoryObjectClient {
    async fn put_file(&self, key: &str, path: &Path, _len: u64) -> TransportResult<()> {
        self.count();
        let data = tokio::fs::read(path).await?;
        self.insert(key, data);
        Ok(())
    }

    async fn put_bytes(&self, key: &str, body: Bytes, _content_type: &str) -> TransportResult<()> {
        self.count();
        self.insert(key, body);
        Ok(())
    }

    async fn get(&self, key: &str) -> TransportResult<Bytes> {
        self.count();
        self.object(key)
            .ok_or_else(|| TransportError::NotFound(format!("S3 object not found: {key}")))
    }

    async fn list_page(&self, prefix: &str, token: Option<String>) -> TransportResult<ListPage> {
        self.count();
        let start = match token {
            Some(t) => t
                .parse::<usize>()
                .map_err(|_| TransportError::InvalidParameter(format!("bad continuation token {t:?}")))?,
            None => 0,
        };
        let matching: Vec<String> = self
            .objects
            .read()
            .expect("lock poisoned")
            .keys()
            .filter(|k| k.strip_prefix(prefix).is_some_and(|rest| !rest.contains('/')))
            .cloned()
            .collect();
        let start = start.min(matching.len());
        let end = (start + self.page_size).min(matching.len());
        Ok(ListPage {
            keys: matching[start..end].to_vec(),
            next_token: (end < matching.len()).then(|| end.to_string()),
        })
    }

    async fn delete(&self, key: &str) -> TransportResult<()> {
        self.count();
        self.objects.write().expect("lock poisoned").remove(key);
        Ok(())
    }
}
