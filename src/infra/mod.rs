pub mod riot_client;
pub mod fs_store;
pub mod http_store;
pub mod memory_store;
pub mod s3_store;

use crate::app::ingest_use_case::IngestUseCase;
use crate::app::ports::{ObjectStorePort, RateLimiterPort};
use crate::app::retry_gate::RetryingGate;
use crate::config::{Settings, StorageSettings, StoreBackend};
use crate::error::Result;
use crate::rate_limiter::RateLimiter;
use std::sync::Arc;

pub fn store_for(settings: &StorageSettings) -> Result<Arc<dyn ObjectStorePort>> {
    Ok(match settings.backend {
        StoreBackend::Fs => Arc::new(fs_store::FsObjectStore::new(&settings.root, &settings.bucket_name)),
        StoreBackend::Http => Arc::new(http_store::HttpObjectStore::new(settings)?),
        StoreBackend::S3 => Arc::new(s3_store::S3ObjectStore::new(settings)?),
        StoreBackend::Memory => Arc::new(memory_store::InMemoryObjectStore::new()),
    })
}

/// `endpoint` as a URL; bare `host[:port]` gets a scheme from `secure`.
pub(crate) fn endpoint_url(endpoint: &str, secure: bool) -> String {
    if endpoint.contains("://") {
        endpoint.trim_end_matches('/').to_string()
    } else {
        let scheme = if secure { "https" } else { "http" };
        format!("{}://{}", scheme, endpoint)
    }
}

/// Wires limiter, gate, client and store from `settings`.
pub fn build_ingest_use_case(settings: &Settings, limiter: Arc<RateLimiter>) -> Result<IngestUseCase> {
    let limiter: Arc<dyn RateLimiterPort> = limiter;
    let gate = RetryingGate::new(
        limiter,
        settings.rate_limits.limit_set(),
        settings.rate_limits.bucket.clone(),
        settings.rate_limits.retry_policy(),
    );
    let client = riot_client::RiotClient::new(&settings.riot, gate)?;
    let store = store_for(&settings.storage)?;
    Ok(IngestUseCase::new(Arc::new(client), store, settings.ingest.concurrency))
}
