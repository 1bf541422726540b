//! S3 object operations behind a trait, with the AWS SDK implementation.

use std::path::Path;

use async_trait::async_trait;
use aws_config::timeout::TimeoutConfig;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use aws_sdk_s3::Client;
use bytes::Bytes;
use tokio::io::AsyncReadExt;
use tracing::{debug, warn};

use super::config::S3Config;
use crate::error::{TransportError, TransportResult};

/// One page of a listing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListPage {
    pub keys: Vec<String>,
    pub next_token: Option<String>,
}

/// The object operations the S3 backend needs.
#[async_trait]
pub trait ObjectClient: Send + Sync {
    /// Upload the file at `path` (`len` bytes) to `key`.
    async fn put_file(&self, key: &str, path: &Path, len: u64) -> TransportResult<()>;

    async fn put_bytes(&self, key: &str, body: Bytes, content_type: &str) -> TransportResult<()>;

    async fn get(&self, key: &str) -> TransportResult<Bytes>;

    /// One page of keys under `prefix`, grouped at `/`.
    async fn list_page(&self, prefix: &str, token: Option<String>) -> TransportResult<ListPage>;

    async fn delete(&self, key: &str) -> TransportResult<()>;
}

/// Map an SDK failure onto a transport error.
///
/// Service errors keep the code and message the remote sent; missing keys
/// become [`TransportError::NotFound`].
fn sdk_error<E, R>(operation: &str, key: &str, err: SdkError<E, R>) -> TransportError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug,
{
    match &err {
        SdkError::ServiceError(ctx) => {
            let service = ctx.err();
            let code = service.code().unwrap_or("Unknown").to_string();
            let message = service
                .message()
                .map(str::to_string)
                .unwrap_or_else(|| service.to_string());
            if matches!(code.as_str(), "NoSuchKey" | "NotFound") {
                TransportError::NotFound(format!("S3 object not found: {key}"))
            } else {
                TransportError::Remote {
                    code,
                    message: format!("{operation} {key}: {message}"),
                }
            }
        }
        SdkError::TimeoutError(_) => {
            TransportError::Timeout(format!("S3 {operation} of {key} timed out in the SDK"))
        }
        _ => TransportError::ConnectionFailed(format!(
            "S3 {operation} of {key}: {}",
            DisplayErrorContext(&err)
        )),
    }
}

/// [`ObjectClient`] over the AWS SDK.
#[derive(Clone, Debug)]
pub struct AwsObjectClient {
    client: Client,
    bucket: String,
    config: S3Config,
}

impl AwsObjectClient {
    /// Build a client around credentials already resolved by the caller.
    ///
    /// `region` and `endpoint` are already resolved by the caller; a custom
    /// endpoint switches to path-style addressing.
    pub async fn connect(
        bucket: &str,
        region: &str,
        endpoint: Option<&str>,
        credentials: Credentials,
        config: &S3Config,
    ) -> Self {
        let timeouts = TimeoutConfig::builder()
            .connect_timeout(config.connect_timeout())
            .build();
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .credentials_provider(credentials)
            .timeout_config(timeouts)
            .load()
            .await;

        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config);
        if let Some(endpoint) = endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        } else if config.force_path_style {
            builder = builder.force_path_style(true);
        }
        debug!(bucket, region, endpoint = ?endpoint, "built S3 client");

        Self {
            client: Client::from_conf(builder.build()),
            bucket: bucket.to_string(),
            config: config.clone(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn put_multipart(&self, key: &str, path: &Path, len: u64) -> TransportResult<()> {
        let part_size = self.config.part_size_for(len).ok_or_else(|| {
            TransportError::InvalidParameter(format!("{len} bytes exceeds the multipart size limit"))
        })?;
        let created = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| sdk_error("multipart create", key, e))?;
        let upload_id = created
            .upload_id()
            .ok_or_else(|| TransportError::InvalidData("multipart upload returned no id".into()))?
            .to_string();

        match self.upload_parts(key, &upload_id, path, part_size).await {
            Ok(parts) => {
                let completed = CompletedMultipartUpload::builder()
                    .set_parts(Some(parts))
                    .build();
                self.client
                    .complete_multipart_upload()
                    .bucket(&self.bucket)
                    .key(key)
                    .upload_id(&upload_id)
                    .multipart_upload(completed)
                    .send()
                    .await
                    .map_err(|e| sdk_error("multipart complete", key, e))?;
                debug!(key, len, part_size, "multipart upload complete");
                Ok(())
            }
            Err(err) => {
                if let Err(abort) = self
                    .client
                    .abort_multipart_upload()
                    .bucket(&self.bucket)
                    .key(key)
                    .upload_id(&upload_id)
                    .send()
                    .await
                {
                    warn!(key, error = %DisplayErrorContext(&abort), "failed to abort multipart upload");
                }
                Err(err)
            }
        }
    }

    async fn upload_parts(
        &self,
        key: &str,
        upload_id: &str,
        path: &Path,
        part_size: u64,
    ) -> TransportResult<Vec<CompletedPart>> {
        let mut file = tokio::fs::File::open(path).await?;
        let mut parts = Vec::new();
        let mut part_number = 1i32;
        loop {
            let mut buf = Vec::with_capacity(part_size as usize);
            let read = (&mut file).take(part_size).read_to_end(&mut buf).await?;
            if read == 0 {
                break;
            }
            let uploaded = self
                .client
                .upload_part()
                .bucket(&self.bucket)
                .key(key)
                .upload_id(upload_id)
                .part_number(part_number)
                .body(ByteStream::from(buf))
                .send()
                .await
                .map_err(|e| sdk_error("multipart part upload", key, e))?;
            parts.push(
                CompletedPart::builder()
                    .set_e_tag(uploaded.e_tag().map(str::to_string))
                    .part_number(part_number)
                    .build(),
            );
            part_number += 1;
        }
        Ok(parts)
    }
}

#[async_trait]
impl ObjectClient for AwsObjectClient {
    async fn put_file(&self, key: &str, path: &Path, len: u64) -> TransportResult<()> {
        if len > self.config.multipart_threshold {
            return self.put_multipart(key, path, len).await;
        }
        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| TransportError::Io(std::io::Error::other(e)))?;
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_length(len as i64)
            .body(body)
            .send()
            .await
            .map_err(|e| sdk_error("upload", key, e))?;
        Ok(())
    }

    async fn put_bytes(&self, key: &str, body: Bytes, content_type: &str) -> TransportResult<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| sdk_error("upload", key, e))?;
        Ok(())
    }

    async fn get(&self, key: &str) -> TransportResult<Bytes> {
        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| sdk_error("download", key, e))?;
        let data = resp
            .body
            .collect()
            .await
            .map_err(|e| TransportError::ConnectionFailed(format!("reading body of {key}: {e}")))?
            .into_bytes();
        Ok(data)
    }

    async fn list_page(&self, prefix: &str, token: Option<String>) -> TransportResult<ListPage> {
        let resp = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .delimiter("/")
            .set_continuation_token(token)
            .send()
            .await
            .map_err(|e| sdk_error("list", prefix, e))?;
        Ok(ListPage {
            keys: resp
                .contents()
                .iter()
                .filter_map(|o| o.key())
                .map(str::to_string)
                .collect(),
            next_token: resp.next_continuation_token().map(str::to_string),
        })
    }

    async fn delete(&self, key: &str) -> TransportResult<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| sdk_error("delete", key, e))?;
        Ok(())
    }
}
