use crate::app::ports::{ObjectStorePort, StoredObject};
use crate::config::StorageSettings;
use crate::error::{IngestError, Result};
use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use std::time::Duration;
use tracing::{debug, info};

/// Path-style bucket over HTTP: `HEAD` answers existence, `PUT` overwrites.
///
/// Config comes from [`StorageSettings`]:
/// - `endpoint` host[:port] (scheme picked by `secure`) or a full URL
/// - `bucket_name`
/// - `user` / `password` sent as bearer credentials
pub struct HttpObjectStore {
    http: reqwest::Client,
    bucket_url: Url,
    access_key: String,
    secret_key: String,
}

impl HttpObjectStore {
    pub fn new(settings: &StorageSettings) -> Result<Self> {
        let base = super::endpoint_url(&settings.endpoint, settings.secure);
        let mut bucket_url = Url::parse(&base)
            .map_err(|e| IngestError::Config(format!("invalid store endpoint '{}': {}", base, e)))?;
        bucket_url
            .path_segments_mut()
            .map_err(|_| IngestError::Config(format!("store endpoint '{}' cannot carry a path", base)))?
            .pop_if_empty()
            .push(&settings.bucket_name);

        let access_key = settings
            .user
            .clone()
            .ok_or_else(|| IngestError::Config("store user is not set".into()))?;
        let secret_key = settings
            .password
            .clone()
            .ok_or_else(|| IngestError::Config("store password is not set".into()))?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()?;

        Ok(Self {
            http,
            bucket_url,
            access_key,
            secret_key,
        })
    }

    fn object_url(&self, key: &str) -> Result<Url> {
        if key.is_empty() || key.split('/').any(|s| s.is_empty() || s == "." || s == "..") {
            return Err(IngestError::InvalidInput(format!("object key '{}' is not a clean path", key)));
        }
        let mut url = self.bucket_url.clone();
        url.path_segments_mut()
            .map_err(|_| IngestError::Config("bucket url cannot carry a path".into()))?
            .extend(key.split('/'));
        Ok(url)
    }

    fn authorized(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.header("Authorization", format!("Bearer {}", self.secret_key))
            .header("apikey", &self.access_key)
    }

    fn unavailable(&self, operation: &'static str, detail: String) -> IngestError {
        crate::metrics::store::error(self.backend_name(), operation);
        IngestError::StorageUnavailable(detail)
    }
}

#[async_trait]
impl ObjectStorePort for HttpObjectStore {
    async fn exists(&self, key: &str) -> Result<bool> {
        let url = self.object_url(key)?;
        let resp = self
            .authorized(self.http.head(url.clone()))
            .send()
            .await
            .map_err(|e| self.unavailable("exists", format!("HEAD {}: {}", url, e)))?;
        let status = resp.status();
        debug!(key, status = status.as_u16(), "stat object");
        match status {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            other => Err(self.unavailable("exists", format!("HEAD {} answered {}", url, other))),
        }
    }

    async fn store(&self, object: &StoredObject) -> Result<()> {
        let url = self.object_url(&object.key)?;
        let checksum = object.sha256_hex();
        let resp = self
            .authorized(self.http.put(url.clone()))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header("x-content-sha256", &checksum)
            .body(object.payload.clone())
            .send()
            .await
            .map_err(|e| self.unavailable("store", format!("PUT {}: {}", url, e)))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(self.unavailable(
                "store",
                format!("PUT {} answered {} - {}", url, status, body.chars().take(200).collect::<String>()),
            ));
        }

        crate::metrics::store::write(self.backend_name(), object.size());
        info!(
            bucket_url = %self.bucket_url,
            key = %object.key,
            byte_count = object.size(),
            sha256 = %checksum,
            "stored object"
        );
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "http"
    }
}
