use crate::app::ports::{ObjectStorePort, StoredObject};
use crate::config::StorageSettings;
use crate::error::{IngestError, Result};
use async_trait::async_trait;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path;
use object_store::{ClientOptions, ObjectStore, RetryConfig};
use std::time::Duration;
use tracing::{debug, info};

/// S3-compatible bucket (MinIO in development) with SigV4-signed,
/// path-style requests.
///
/// `exists` is a `HEAD`; only a missing key reads as absent. Failures are
/// not retried here, the caller reports them per id.
pub struct S3ObjectStore {
    bucket: AmazonS3,
    bucket_url: String,
}

impl S3ObjectStore {
    pub fn new(settings: &StorageSettings) -> Result<Self> {
        let endpoint = super::endpoint_url(&settings.endpoint, settings.secure);
        let access_key = settings
            .user
            .as_deref()
            .ok_or_else(|| IngestError::Config("store user is not set".into()))?;
        let secret_key = settings
            .password
            .as_deref()
            .ok_or_else(|| IngestError::Config("store password is not set".into()))?;

        let bucket = AmazonS3Builder::new()
            .with_endpoint(endpoint.as_str())
            .with_bucket_name(settings.bucket_name.as_str())
            .with_region(settings.region.as_str())
            .with_access_key_id(access_key)
            .with_secret_access_key(secret_key)
            .with_virtual_hosted_style_request(false)
            .with_allow_http(endpoint.starts_with("http://"))
            .with_client_options(
                ClientOptions::new().with_timeout(Duration::from_secs(settings.request_timeout_secs)),
            )
            .with_retry(RetryConfig {
                max_retries: 0,
                ..RetryConfig::default()
            })
            .build()
            .map_err(|e| IngestError::Config(format!("invalid s3 store settings: {}", e)))?;

        Ok(Self {
            bucket,
            bucket_url: format!("{}/{}", endpoint, settings.bucket_name),
        })
    }

    fn unavailable(&self, operation: &'static str, detail: String) -> IngestError {
        crate::metrics::store::error(self.backend_name(), operation);
        IngestError::StorageUnavailable(detail)
    }
}

fn object_path(key: &str) -> Result<Path> {
    if key.is_empty() || key.split('/').any(|s| s.is_empty() || s == "." || s == "..") {
        return Err(IngestError::InvalidInput(format!("object key '{}' is not a clean path", key)));
    }
    Ok(Path::from_iter(key.split('/')))
}

#[async_trait]
impl ObjectStorePort for S3ObjectStore {
    async fn exists(&self, key: &str) -> Result<bool> {
        let path = object_path(key)?;
        match self.bucket.head(&path).await {
            Ok(meta) => {
                debug!(key, size = meta.size, "stat object");
                Ok(true)
            }
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(self.unavailable("exists", format!("stat {}/{}: {}", self.bucket_url, key, e))),
        }
    }

    async fn store(&self, object: &StoredObject) -> Result<()> {
        let path = object_path(&object.key)?;
        self.bucket
            .put(&path, object.payload.clone().into())
            .await
            .map_err(|e| self.unavailable("store", format!("put {}/{}: {}", self.bucket_url, object.key, e)))?;

        crate::metrics::store::write(self.backend_name(), object.size());
        info!(
            bucket_url = %self.bucket_url,
            key = %object.key,
            byte_count = object.size(),
            sha256 = %object.sha256_hex(),
            "stored object"
        );
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "s3"
    }
}
