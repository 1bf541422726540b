use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const MIB: u64 = 1024 * 1024;

/// Tunables for the S3 backend.
///
/// Region and endpoint given in the URL take precedence over the values
/// here; `region` in turn takes precedence over `AWS_REGION`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct S3Config {
    pub region: Option<String>,
    /// Custom endpoint for S3-compatible services; implies path-style
    /// addressing.
    pub endpoint_url: Option<String>,
    pub force_path_style: bool,

    pub upload_timeout_ms: u64,
    pub download_timeout_ms: u64,
    pub list_timeout_ms: u64,
    pub delete_timeout_ms: u64,
    pub connect_timeout_ms: u64,

    /// Payloads larger than this go through multipart upload.
    pub multipart_threshold: u64,
    pub part_size: u64,
    pub max_part_size: u64,

    /// Worker threads of the runtime that drives S3 I/O.
    pub worker_threads: usize,

    /// Transformer applied to payloads before upload.
    pub transformer: String,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            region: None,
            endpoint_url: None,
            force_path_style: false,
            upload_timeout_ms: 60_000,
            download_timeout_ms: 30_000,
            list_timeout_ms: 30_000,
            delete_timeout_ms: 30_000,
            connect_timeout_ms: 10_000,
            multipart_threshold: 8 * MIB,
            part_size: 5 * MIB,
            max_part_size: 128 * MIB,
            worker_threads: 8,
            transformer: "parquet".into(),
        }
    }
}

impl S3Config {
    pub fn upload_timeout(&self) -> Duration {
        Duration::from_millis(self.upload_timeout_ms)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_millis(self.download_timeout_ms)
    }

    pub fn list_timeout(&self) -> Duration {
        Duration::from_millis(self.list_timeout_ms)
    }

    pub fn delete_timeout(&self) -> Duration {
        Duration::from_millis(self.delete_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Set every operation deadline at once.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        let ms = deadline.as_millis() as u64;
        self.upload_timeout_ms = ms;
        self.download_timeout_ms = ms;
        self.list_timeout_ms = ms;
        self.delete_timeout_ms = ms;
        self
    }

    /// Part size for a multipart upload of `len` bytes, keeping within the
    /// 10,000 part limit. `None` if even the largest part is too small.
    pub fn part_size_for(&self, len: u64) -> Option<u64> {
        const MAX_PARTS: u64 = 10_000;
        let needed = len.div_ceil(MAX_PARTS);
        let size = self.part_size.max(needed);
        (size <= self.max_part_size).then_some(size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_deadlines() {
        let config = S3Config::default();
        assert_eq!(config.upload_timeout(), Duration::from_secs(60));
        assert_eq!(config.download_timeout(), Duration::from_secs(30));
        assert_eq!(config.list_timeout(), Duration::from_secs(30));
        assert_eq!(config.delete_timeout(), Duration::from_secs(30));
        assert_eq!(config.connect_timeout(), Duration::from_secs(10));
        assert_eq!(config.worker_threads, 8);
    }

    #[test]
    fn part_size_grows_for_huge_uploads() {
        let config = S3Config::default();
        assert_eq!(config.part_size_for(20 * MIB), Some(5 * MIB));
        assert_eq!(config.part_size_for(100_000 * MIB), Some(10 * MIB));
        assert_eq!(config.part_size_for(2_000_000 * MIB), None);
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let config: S3Config = toml::from_str("region = \"eu-west-1\"\nupload_timeout_ms = 5\n").unwrap();
        assert_eq!(config.region.as_deref(), Some("eu-west-1"));
        assert_eq!(config.upload_timeout(), Duration::from_millis(5));
        assert_eq!(config.download_timeout(), Duration::from_secs(30));
    }
}
