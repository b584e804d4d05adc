use crate::constants::*;
use crate::error::{IngestError, Result};
use crate::rate_limiter::{LimitSet, RateWindow};
use crate::app::retry_gate::RetryPolicy;
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub riot: RiotSettings,
    pub rate_limits: RateLimitSettings,
    pub storage: StorageSettings,
    pub ingest: IngestSettings,
}

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct RiotSettings {
    pub api_key: String,
    pub platform_url: String,
    pub routing_url: String,
    pub request_timeout_secs: u64,
}

impl Default for RiotSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            platform_url: DEFAULT_PLATFORM_URL.to_string(),
            routing_url: DEFAULT_ROUTING_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl fmt::Debug for RiotSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RiotSettings")
            .field("api_key", &"<redacted>")
            .field("platform_url", &self.platform_url)
            .field("routing_url", &self.routing_url)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl RiotSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Periods are in seconds.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    pub short_hit_limit_count: u32,
    pub short_hit_limit_period: u64,
    pub long_hit_limit_count: u32,
    pub long_hit_limit_period: u64,
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    pub bucket: String,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            short_hit_limit_count: DEFAULT_SHORT_HIT_LIMIT_COUNT,
            short_hit_limit_period: DEFAULT_SHORT_HIT_LIMIT_PERIOD_SECS,
            long_hit_limit_count: DEFAULT_LONG_HIT_LIMIT_COUNT,
            long_hit_limit_period: DEFAULT_LONG_HIT_LIMIT_PERIOD_SECS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_base_ms: DEFAULT_BACKOFF_BASE_MS,
            bucket: DEFAULT_RATE_BUCKET.to_string(),
        }
    }
}

impl RateLimitSettings {
    pub fn limit_set(&self) -> LimitSet {
        LimitSet::new(
            RIOT_LIMIT_SET,
            vec![
                RateWindow::new(
                    self.short_hit_limit_count,
                    Duration::from_secs(self.short_hit_limit_period),
                    "short",
                ),
                RateWindow::new(
                    self.long_hit_limit_count,
                    Duration::from_secs(self.long_hit_limit_period),
                    "long",
                ),
            ],
        )
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            backoff_base: Duration::from_millis(self.backoff_base_ms),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Fs,
    /// Bearer-token object API (`HEAD`/`PUT` with `Authorization` and `apikey`)
    Http,
    /// S3 protocol with SigV4, e.g. MinIO
    S3,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "fs" | "file" => Ok(StoreBackend::Fs),
            "http" => Ok(StoreBackend::Http),
            "s3" | "minio" => Ok(StoreBackend::S3),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(IngestError::Config(format!("unknown store backend '{}'", other))),
        }
    }
}

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub backend: StoreBackend,
    pub endpoint: String,
    pub bucket_name: String,
    pub user: Option<String>,
    pub password: Option<String>,
    pub secure: bool,
    pub region: String,
    pub root: String,
    pub request_timeout_secs: u64,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Fs,
            endpoint: DEFAULT_STORE_ENDPOINT.to_string(),
            bucket_name: DEFAULT_STORE_BUCKET.to_string(),
            user: None,
            password: None,
            secure: false,
            region: DEFAULT_STORE_REGION.to_string(),
            root: DEFAULT_STORE_ROOT.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl fmt::Debug for StorageSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageSettings")
            .field("backend", &self.backend)
            .field("endpoint", &self.endpoint)
            .field("bucket_name", &self.bucket_name)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("secure", &self.secure)
            .field("region", &self.region)
            .field("root", &self.root)
            .finish()
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct IngestSettings {
    pub force_download: bool,
    pub concurrency: usize,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            force_download: false,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl Settings {
    /// dotenv files, then the TOML file (explicit path, or `dyel.toml` when
    /// present), then process environment. Not validated: callers apply their
    /// own overrides first and then call [`Settings::validate`].
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        dotenv::dotenv().ok();
        if Path::new(SECRETS_ENV_FILE).exists() {
            dotenv::from_filename(SECRETS_ENV_FILE).ok();
        }

        let mut settings = match config_path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Settings::default(),
        };
        settings.apply_env(|name| std::env::var(name).ok())?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            IngestError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| IngestError::Config(format!("invalid config: {}", e)))
    }

    /// Overrides fields from `lookup`, which maps a variable name to its value.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(ENV_API_KEY) {
            self.riot.api_key = v;
        }
        if let Some(v) = lookup(ENV_PLATFORM_URL) {
            self.riot.platform_url = v;
        }
        if let Some(v) = lookup(ENV_ROUTING_URL) {
            self.riot.routing_url = v;
        }
        set_parsed(&lookup, ENV_REQUEST_TIMEOUT, &mut self.riot.request_timeout_secs)?;

        let limits = &mut self.rate_limits;
        set_parsed(&lookup, ENV_SHORT_COUNT, &mut limits.short_hit_limit_count)?;
        set_parsed(&lookup, ENV_SHORT_PERIOD, &mut limits.short_hit_limit_period)?;
        set_parsed(&lookup, ENV_LONG_COUNT, &mut limits.long_hit_limit_count)?;
        set_parsed(&lookup, ENV_LONG_PERIOD, &mut limits.long_hit_limit_period)?;
        set_parsed(&lookup, ENV_MAX_ATTEMPTS, &mut limits.max_attempts)?;
        set_parsed(&lookup, ENV_BACKOFF_BASE_MS, &mut limits.backoff_base_ms)?;
        if let Some(v) = lookup(ENV_RATE_BUCKET) {
            limits.bucket = v;
        }

        let storage = &mut self.storage;
        if let Some(v) = lookup(ENV_STORE_BACKEND) {
            storage.backend = v.parse()?;
        }
        if let Some(v) = lookup(ENV_STORE_ENDPOINT) {
            storage.endpoint = v;
        }
        if let Some(v) = lookup(ENV_STORE_BUCKET) {
            storage.bucket_name = v;
        }
        if let Some(v) = lookup(ENV_STORE_USER) {
            storage.user = Some(v);
        }
        if let Some(v) = lookup(ENV_STORE_PASSWORD) {
            storage.password = Some(v);
        }
        if let Some(v) = lookup(ENV_STORE_SECURE) {
            storage.secure = parse_bool(ENV_STORE_SECURE, &v)?;
        }
        if let Some(v) = lookup(ENV_STORE_REGION) {
            storage.region = v;
        }
        if let Some(v) = lookup(ENV_STORE_ROOT) {
            storage.root = v;
        }

        if let Some(v) = lookup(ENV_FORCE_DOWNLOAD) {
            self.ingest.force_download = parse_bool(ENV_FORCE_DOWNLOAD, &v)?;
        }
        set_parsed(&lookup, ENV_CONCURRENCY, &mut self.ingest.concurrency)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.riot.api_key.trim().is_empty() {
            return Err(IngestError::Config(format!("{} is not set", ENV_API_KEY)));
        }
        if self.riot.request_timeout_secs == 0 {
            return Err(IngestError::Config("request timeout must be positive".into()));
        }
        let limits = &self.rate_limits;
        if limits.short_hit_limit_count == 0 || limits.long_hit_limit_count == 0 {
            return Err(IngestError::Config("rate window capacity must be positive".into()));
        }
        if limits.short_hit_limit_period == 0 || limits.long_hit_limit_period == 0 {
            return Err(IngestError::Config("rate window period must be positive".into()));
        }
        if limits.max_attempts == 0 {
            return Err(IngestError::Config("max attempts must be at least 1".into()));
        }
        if self.ingest.concurrency == 0 {
            return Err(IngestError::Config("concurrency must be at least 1".into()));
        }
        let remote = matches!(self.storage.backend, StoreBackend::Http | StoreBackend::S3);
        if remote && (self.storage.user.is_none() || self.storage.password.is_none()) {
            return Err(IngestError::Config(format!(
                "{:?} store requires {} and {}",
                self.storage.backend, ENV_STORE_USER, ENV_STORE_PASSWORD
            )));
        }
        Ok(())
    }
}

fn set_parsed<F, T>(lookup: &F, name: &str, target: &mut T) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    if let Some(raw) = lookup(name) {
        *target = raw
            .trim()
            .parse()
            .map_err(|_| IngestError::Config(format!("{} has an invalid value '{}'", name, raw)))?;
    }
    Ok(())
}

fn parse_bool(name: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(IngestError::Config(format!("{} has an invalid value '{}'", name, raw))),
    }
}
