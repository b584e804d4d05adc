/// Upstream API and storage constants shared across the codebase

// Upstream endpoints
pub const DEFAULT_PLATFORM_URL: &str = "https://br1.api.riotgames.com";
pub const DEFAULT_ROUTING_URL: &str = "https://americas.api.riotgames.com";
pub const RIOT_TOKEN_HEADER: &str = "X-Riot-Token";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

// Rate limits of a development API key: 20 requests every 1s, 100 every 2min
pub const DEFAULT_SHORT_HIT_LIMIT_COUNT: u32 = 20;
pub const DEFAULT_SHORT_HIT_LIMIT_PERIOD_SECS: u64 = 1;
pub const DEFAULT_LONG_HIT_LIMIT_COUNT: u32 = 100;
pub const DEFAULT_LONG_HIT_LIMIT_PERIOD_SECS: u64 = 120;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BACKOFF_BASE_MS: u64 = 1000;
pub const RIOT_LIMIT_SET: &str = "riot_app";
pub const DEFAULT_RATE_BUCKET: &str = "normal_query";

// Object store
pub const DEFAULT_STORE_ENDPOINT: &str = "dyel-minio:9000";
pub const DEFAULT_STORE_BUCKET: &str = "dev-bucket";
pub const DEFAULT_STORE_ROOT: &str = "data";
pub const DEFAULT_STORE_REGION: &str = "us-east-1";

// Object key namespaces
pub const SUMMONERS_PREFIX: &str = "summoners";
pub const MATCHES_PREFIX: &str = "matches";
pub const MATCH_IDS_PREFIX: &str = "match_ids";

// Ingest defaults
pub const DEFAULT_CONCURRENCY: usize = 4;
pub const DEFAULT_MATCH_ID_COUNT: u32 = 20;
pub const DEFAULT_CONFIG_FILE: &str = "dyel.toml";
pub const SECRETS_ENV_FILE: &str = "secrets/secrets.env";

// Environment variable names
pub const ENV_API_KEY: &str = "RIOT_API_KEY";
pub const ENV_PLATFORM_URL: &str = "RIOT_COUNTRY_URL";
pub const ENV_ROUTING_URL: &str = "RIOT_REGION_URL";
pub const ENV_REQUEST_TIMEOUT: &str = "RIOT_API_TIMEOUT_SECS";
pub const ENV_SHORT_COUNT: &str = "RIOT_API_SHORT_HIT_LIMIT_COUNT";
pub const ENV_SHORT_PERIOD: &str = "RIOT_API_SHORT_HIT_LIMIT_PERIOD";
pub const ENV_LONG_COUNT: &str = "RIOT_API_LONG_HIT_LIMIT_COUNT";
pub const ENV_LONG_PERIOD: &str = "RIOT_API_LONG_HIT_LIMIT_PERIOD";
pub const ENV_MAX_ATTEMPTS: &str = "RIOT_API_MAX_ATTEMPTS";
pub const ENV_BACKOFF_BASE_MS: &str = "RIOT_API_BACKOFF_BASE_MS";
pub const ENV_RATE_BUCKET: &str = "RIOT_API_RATE_BUCKET";
pub const ENV_STORE_BACKEND: &str = "DYEL_STORE_BACKEND";
pub const ENV_STORE_ENDPOINT: &str = "MINIO_ENDPOINT";
pub const ENV_STORE_BUCKET: &str = "MINIO_BUCKET";
pub const ENV_STORE_USER: &str = "MINIO_ROOT_USER";
pub const ENV_STORE_PASSWORD: &str = "MINIO_ROOT_PASSWORD";
pub const ENV_STORE_SECURE: &str = "MINIO_SECURE";
pub const ENV_STORE_ROOT: &str = "DYEL_STORE_ROOT";
pub const ENV_STORE_REGION: &str = "MINIO_REGION";
pub const ENV_FORCE_DOWNLOAD: &str = "DYEL_FORCE_DOWNLOAD";
pub const ENV_CONCURRENCY: &str = "DYEL_CONCURRENCY";
