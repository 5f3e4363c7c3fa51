//! S3 client implementation
//!
//! Wraps aws-sdk-s3 and implements the ObjectStore trait from ak-core.
//! Each call is one request: uploads are single-part, listings return the
//! first page only and downloads are buffered whole.

use ak_core::{
    CancellationToken, ClientConfig, Error, ObjectStore, ObjectSummary, ResolvedEndpoint, Result,
    Service, UploadResult, with_cancellation,
};
use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_smithy_types::DateTime;
use tracing::{Instrument, Span};

use crate::sdk::{describe_failure, load_sdk_config};

/// S3 client bound to one bucket
pub struct S3Client {
    inner: aws_sdk_s3::Client,
    bucket: String,
    endpoint: ResolvedEndpoint,
    span: Span,
}

impl S3Client {
    /// Create a new S3 client for `config.resource` (the bucket name).
    ///
    /// With an override endpoint the client uses path-style addressing
    /// (`endpoint/bucket/key`), which local emulators require.
    pub async fn new(config: ClientConfig) -> Result<Self> {
        let loaded = load_sdk_config(&config, Service::Storage).await?;

        let s3_config = aws_sdk_s3::config::Builder::from(&loaded.sdk)
            .force_path_style(loaded.endpoint.path_style)
            .build();

        let span = tracing::info_span!(
            "s3_client",
            bucket = %config.resource,
            region = %config.region,
            endpoint = %loaded.endpoint.url,
        );
        span.in_scope(|| {
            tracing::info!(
                source = ?loaded.endpoint.source,
                path_style = loaded.endpoint.path_style,
                "S3 client initialized"
            );
        });

        Ok(Self {
            inner: aws_sdk_s3::Client::from_conf(s3_config),
            bucket: config.resource,
            endpoint: loaded.endpoint,
            span,
        })
    }

    /// Get the underlying aws-sdk-s3 client
    pub fn inner(&self) -> &aws_sdk_s3::Client {
        &self.inner
    }

    /// Endpoint decision this client was built with
    pub fn endpoint(&self) -> &ResolvedEndpoint {
        &self.endpoint
    }

    fn resource(&self, key: &str) -> String {
        format!("{}/{}", self.bucket, key)
    }

    async fn put_object(&self, key: &str, data: Vec<u8>, location: &str) -> Result<UploadResult> {
        let size = data.len();
        tracing::debug!(key, size, "uploading object");

        let mut request = self
            .inner
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data));

        if let Some(content_type) = mime_guess::from_path(key).first_raw() {
            request = request.content_type(content_type);
        }

        let response = request
            .send()
            .await
            .map_err(|e| storage_failure("upload", location, &e))?;

        let result = UploadResult {
            location: location.to_string(),
            etag: response.e_tag().map(trim_etag),
            version_id: response.version_id().map(str::to_string),
        };

        tracing::info!(key, size, etag = ?result.etag, "upload complete");
        Ok(result)
    }

    async fn list_page(&self, prefix: Option<&str>) -> Result<Vec<ObjectSummary>> {
        tracing::debug!(prefix, "listing objects");

        let mut request = self.inner.list_objects_v2().bucket(&self.bucket);
        if let Some(p) = prefix {
            request = request.prefix(p);
        }

        let response = request
            .send()
            .await
            .map_err(|e| storage_failure("list", &self.bucket, &e))?;

        let objects: Vec<ObjectSummary> = response
            .contents()
            .iter()
            .map(|object| ObjectSummary {
                key: object.key().unwrap_or_default().to_string(),
                size: object.size().unwrap_or(0).max(0) as u64,
                last_modified: object.last_modified().and_then(to_timestamp),
                etag: object.e_tag().map(trim_etag),
            })
            .collect();

        if response.is_truncated().unwrap_or(false) {
            tracing::warn!(
                prefix,
                returned = objects.len(),
                "listing truncated, only the first page is returned"
            );
        }

        tracing::info!(prefix, count = objects.len(), "listing complete");
        Ok(objects)
    }

    async fn get_object(&self, key: &str, resource: &str) -> Result<Vec<u8>> {
        tracing::debug!(key, "downloading object");

        let response = self
            .inner
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| storage_failure("get", resource, &e))?;

        let data = response
            .body
            .collect()
            .await
            .map_err(|e| {
                let err = Error::storage("get", resource, e.to_string(), None);
                tracing::error!(error = %err, "failed to read object body");
                err
            })?
            .into_bytes()
            .to_vec();

        tracing::info!(key, size = data.len(), "download complete");
        Ok(data)
    }
}

#[async_trait]
impl ObjectStore for S3Client {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn upload(
        &self,
        key: &str,
        data: Vec<u8>,
        cancel: &CancellationToken,
    ) -> Result<UploadResult> {
        let location = self.resource(key);
        with_cancellation(cancel, "upload", &location, self.put_object(key, data, &location))
            .instrument(self.span.clone())
            .await
    }

    async fn list_all(&self, cancel: &CancellationToken) -> Result<Vec<ObjectSummary>> {
        with_cancellation(cancel, "list", &self.bucket, self.list_page(None))
            .instrument(self.span.clone())
            .await
    }

    async fn list_by_prefix(
        &self,
        prefix: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<ObjectSummary>> {
        with_cancellation(cancel, "list", &self.bucket, self.list_page(Some(prefix)))
            .instrument(self.span.clone())
            .await
    }

    async fn get(&self, key: &str, cancel: &CancellationToken) -> Result<Vec<u8>> {
        let resource = self.resource(key);
        with_cancellation(cancel, "get", &resource, self.get_object(key, &resource))
            .instrument(self.span.clone())
            .await
    }
}

fn storage_failure<E>(operation: &'static str, resource: &str, err: &E) -> Error
where
    E: aws_smithy_types::error::metadata::ProvideErrorMetadata + std::error::Error,
{
    let (message, code) = describe_failure(err);
    let err = Error::storage(operation, resource, message, code);
    tracing::error!(error = %err, "S3 request failed");
    err
}

fn trim_etag(etag: &str) -> String {
    etag.trim_matches('"').to_string()
}

fn to_timestamp(time: &DateTime) -> Option<jiff::Timestamp> {
    jiff::Timestamp::new(time.secs(), time.subsec_nanos() as i32).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn localstack_config() -> ClientConfig {
        ClientConfig::new("test-bucket", "us-east-1")
            .with_endpoint_url("http://localhost:4566")
            .with_credentials("test", "test")
    }

    #[test]
    fn test_trim_etag() {
        assert_eq!(trim_etag("\"5d41402abc4b2a76\""), "5d41402abc4b2a76");
        assert_eq!(trim_etag("plain"), "plain");
    }

    #[test]
    fn test_to_timestamp() {
        let time = DateTime::from_secs_and_nanos(1_700_000_000, 500);
        let ts = to_timestamp(&time).unwrap();
        assert_eq!(ts.as_second(), 1_700_000_000);
        assert_eq!(ts.subsec_nanosecond(), 500);
    }

    #[tokio::test]
    async fn test_new_with_override_uses_path_style() {
        let client = S3Client::new(localstack_config()).await.unwrap();
        assert_eq!(client.bucket(), "test-bucket");
        assert!(client.endpoint().is_custom());
        assert!(client.endpoint().path_style);
        assert_eq!(client.endpoint().url, "http://localhost:4566");
    }

    #[tokio::test]
    async fn test_override_sends_signed_path_style_requests() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        // Capture one request head and answer with a fixed body
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut head = Vec::new();
            let mut buf = [0u8; 1024];
            while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                head.extend_from_slice(&buf[..n]);
            }
            socket
                .write_all(
                    b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\nConnection: close\r\n\r\nhello",
                )
                .await
                .unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&head).to_string()
        });

        let config = ClientConfig::new("test-bucket", "us-east-1")
            .with_endpoint_url(format!("http://{addr}"))
            .with_credentials("test", "test");
        let client = S3Client::new(config).await.unwrap();

        let data = client
            .get("dir/file.txt", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(data, b"hello");

        let head = server.await.unwrap();
        let request_line = head.lines().next().unwrap_or_default();
        assert!(
            request_line.starts_with("GET /test-bucket/dir/file.txt"),
            "request line: {request_line}"
        );
        assert!(
            head.to_ascii_lowercase().contains(&format!("host: {addr}")),
            "request head: {head}"
        );
        assert!(
            head.contains("AWS4-HMAC-SHA256 Credential=test/"),
            "request head: {head}"
        );
    }

    #[tokio::test]
    async fn test_new_without_override_uses_default_chain() {
        let config = ClientConfig::new("test-bucket", "eu-west-1");
        let client = S3Client::new(config).await.unwrap();
        assert!(!client.endpoint().is_custom());
        assert!(!client.endpoint().path_style);
    }

    #[tokio::test]
    async fn test_new_rejects_partial_credentials() {
        let mut config = localstack_config();
        config.secret_key = None;
        let result = S3Client::new(config).await;
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[tokio::test]
    async fn test_cancelled_before_request() {
        let client = S3Client::new(localstack_config()).await.unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = client.get("dir/file.txt", &cancel).await.unwrap_err();
        match err {
            Error::Cancelled {
                operation,
                resource,
            } => {
                assert_eq!(operation, "get");
                assert_eq!(resource, "test-bucket/dir/file.txt");
            }
            other => panic!("expected cancellation, got {other:?}"),
        }
    }
}
