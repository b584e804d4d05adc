use crate::cancel::CancelToken;
use crate::error::Result;
use crate::rate_limiter::LimitSet;
use crate::types::{Fetched, MatchData, Summoner};
use async_trait::async_trait;
use sha2::{Digest, Sha256};

pub trait RateLimiterPort: Send + Sync {
    fn hit(&self, limits: &LimitSet, bucket: &str) -> bool;
}

// Upstream-side port
#[async_trait]
pub trait RiotApiPort: Send + Sync {
    async fn fetch_summoner(&self, name: &str, cancel: &CancelToken) -> Result<Fetched<Summoner>>;

    async fn fetch_match_ids(
        &self,
        puuid: &str,
        offset: u32,
        count: u32,
        cancel: &CancelToken,
    ) -> Result<Fetched<Vec<String>>>;

    async fn fetch_match(&self, match_id: &str, cancel: &CancelToken) -> Result<Fetched<MatchData>>;
}

// Storage-side port
#[async_trait]
pub trait ObjectStorePort: Send + Sync {
    /// `Ok(false)` only when the backend says the key does not exist.
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Unconditional overwrite.
    async fn store(&self, object: &StoredObject) -> Result<()>;

    fn backend_name(&self) -> &'static str;
}

#[derive(Clone, Debug)]
pub struct StoredObject {
    pub key: String,
    pub payload: Vec<u8>,
}

impl StoredObject {
    pub fn new(key: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            key: key.into(),
            payload,
        }
    }

    pub fn size(&self) -> usize {
        self.payload.len()
    }

    pub fn sha256_hex(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.payload);
        hex::encode(hasher.finalize())
    }
}
