use crate::app::ports::RiotApiPort;
use crate::app::retry_gate::RetryingGate;
use crate::cancel::CancelToken;
use crate::config::RiotSettings;
use crate::constants::RIOT_TOKEN_HEADER;
use crate::error::{IngestError, Result};
use crate::types::{Fetched, MatchData, Summoner};
use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Riot Games API client. Every request passes the local rate gate first.
pub struct RiotClient {
    http: reqwest::Client,
    api_key: String,
    platform_url: Url,
    routing_url: Url,
    gate: RetryingGate,
    // Set from the last 429 Retry-After; no request leaves before it.
    cooldown_until: Mutex<Option<Instant>>,
}

impl RiotClient {
    pub fn new(settings: &RiotSettings, gate: RetryingGate) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(settings.request_timeout())
            .build()?;
        Ok(Self {
            http,
            api_key: settings.api_key.clone(),
            platform_url: parse_base(&settings.platform_url)?,
            routing_url: parse_base(&settings.routing_url)?,
            gate,
            cooldown_until: Mutex::new(None),
        })
    }

    async fn wait_for_cooldown(&self, cancel: &CancelToken) -> Result<()> {
        let until = *self
            .cooldown_until
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(until) = until {
            if until > Instant::now() {
                debug!(wait_ms = (until - Instant::now()).as_millis() as u64, "waiting out upstream Retry-After");
                cancel
                    .run(async {
                        tokio::time::sleep_until(until).await;
                        Ok(())
                    })
                    .await?;
            }
        }
        Ok(())
    }

    fn extend_cooldown(&self, retry_after: Duration) {
        let candidate = Instant::now() + retry_after;
        let mut guard = self
            .cooldown_until
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if guard.map_or(true, |current| current < candidate) {
            *guard = Some(candidate);
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        entity: &str,
        url: Url,
        cancel: &CancelToken,
    ) -> Result<Fetched<T>> {
        self.wait_for_cooldown(cancel).await?;
        self.gate.acquire(cancel).await?;

        info!(operation, entity = %entity, "calling riot api");
        let started = std::time::Instant::now();
        let result = cancel.run(self.send(operation, entity, url)).await;
        let outcome = match &result {
            Ok(_) => "ok",
            Err(e) => e.kind(),
        };
        crate::metrics::api::request(operation, outcome, started.elapsed().as_secs_f64());
        result
    }

    async fn send<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        entity: &str,
        url: Url,
    ) -> Result<Fetched<T>> {
        let resp = self
            .http
            .get(url)
            .header(RIOT_TOKEN_HEADER, &self.api_key)
            .send()
            .await?;
        let status = resp.status();
        let retry_after = parse_retry_after(resp.headers().get(RETRY_AFTER));
        let bytes = resp.bytes().await?.to_vec();
        debug!(operation, entity = %entity, status = status.as_u16(), bytes = bytes.len(), "riot api answered");

        if !status.is_success() {
            if status == StatusCode::TOO_MANY_REQUESTS {
                warn!(operation, entity = %entity, ?retry_after, "upstream rate limited");
                if let Some(delay) = retry_after {
                    self.extend_cooldown(delay);
                }
            }
            let body = String::from_utf8_lossy(&bytes);
            return Err(classify_status(status, retry_after, &format!("{} {}", operation, entity), &body));
        }

        let record = serde_json::from_slice::<T>(&bytes)
            .map_err(|e| IngestError::MalformedResponse(format!("{} {}: {}", operation, entity, e)))?;
        Ok(Fetched::new(record, bytes))
    }
}

#[async_trait]
impl RiotApiPort for RiotClient {
    async fn fetch_summoner(&self, name: &str, cancel: &CancelToken) -> Result<Fetched<Summoner>> {
        let url = endpoint(
            &self.platform_url,
            &["lol", "summoner", "v4", "summoners", "by-name", name],
        )?;
        self.get_json("fetch_summoner", name, url, cancel).await
    }

    async fn fetch_match_ids(
        &self,
        puuid: &str,
        offset: u32,
        count: u32,
        cancel: &CancelToken,
    ) -> Result<Fetched<Vec<String>>> {
        let mut url = endpoint(
            &self.routing_url,
            &["lol", "match", "v5", "matches", "by-puuid", puuid, "ids"],
        )?;
        url.query_pairs_mut()
            .append_pair("start", &offset.to_string())
            .append_pair("count", &count.to_string());
        self.get_json("fetch_match_ids", puuid, url, cancel).await
    }

    async fn fetch_match(&self, match_id: &str, cancel: &CancelToken) -> Result<Fetched<MatchData>> {
        let url = endpoint(&self.routing_url, &["lol", "match", "v5", "matches", match_id])?;
        self.get_json("fetch_match", match_id, url, cancel).await
    }
}

fn parse_base(raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|e| IngestError::Config(format!("invalid base url '{}': {}", raw, e)))
}

/// Appends percent-encoded path segments to `base`.
pub(crate) fn endpoint(base: &Url, segments: &[&str]) -> Result<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| IngestError::Config(format!("base url '{}' cannot carry a path", base)))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

fn parse_retry_after(value: Option<&reqwest::header::HeaderValue>) -> Option<Duration> {
    value
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

pub(crate) fn classify_status(
    status: StatusCode,
    retry_after: Option<Duration>,
    resource: &str,
    body: &str,
) -> IngestError {
    match status {
        StatusCode::NOT_FOUND => IngestError::NotFound {
            resource: resource.to_string(),
        },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => IngestError::Unauthorized {
            status: status.as_u16(),
        },
        StatusCode::TOO_MANY_REQUESTS => IngestError::UpstreamRateLimited { retry_after },
        _ => IngestError::UpstreamError {
            status: status.as_u16(),
            message: body.chars().take(200).collect(),
        },
    }
}
