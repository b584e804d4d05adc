#![allow(dead_code)]

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, head};
use axum::Router;
use dyel::app::retry_gate::{RetryPolicy, RetryingGate};
use dyel::config::Settings;
use dyel::infra::riot_client::RiotClient;
use dyel::rate_limiter::{LimitSet, RateLimiter, RateWindow};
use serde_json::json;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const API_KEY: &str = "RGAPI-test-key";

/// Fake Riot API. Ids select behavior:
/// `missing*` 404, `broken*` undecodable 200, `busy*` 429 with Retry-After 1,
/// `down*` 503, `slow*` sleeps 30s; anything else succeeds.
#[derive(Default)]
pub struct FakeUpstream {
    pub hits: AtomicUsize,
    pub seen: Mutex<Vec<String>>,
}

impl FakeUpstream {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

pub async fn spawn(app: Router) -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.set_nonblocking(true).unwrap();
    let addr = listener.local_addr().unwrap();
    let server = axum::Server::from_tcp(listener)
        .unwrap()
        .serve(app.into_make_service());
    tokio::spawn(server);
    addr
}

pub async fn spawn_upstream() -> (SocketAddr, Arc<FakeUpstream>) {
    let state = Arc::new(FakeUpstream::default());
    let app = Router::new()
        .route("/lol/summoner/v4/summoners/by-name/:name", get(summoner))
        .route("/lol/match/v5/matches/by-puuid/:puuid/ids", get(match_ids))
        .route("/lol/match/v5/matches/:match_id", get(match_by_id))
        .with_state(state.clone());
    (spawn(app).await, state)
}

async fn canned(state: &FakeUpstream, headers: &HeaderMap, id: &str, ok_body: serde_json::Value) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);
    state.seen.lock().unwrap().push(id.to_string());

    if headers.get("x-riot-token").and_then(|v| v.to_str().ok()) != Some(API_KEY) {
        return (StatusCode::FORBIDDEN, "Forbidden").into_response();
    }
    if id.starts_with("missing") {
        return (StatusCode::NOT_FOUND, "Data not found").into_response();
    }
    if id.starts_with("broken") {
        return (StatusCode::OK, "{\"unexpected\": true}").into_response();
    }
    if id.starts_with("busy") {
        return (StatusCode::TOO_MANY_REQUESTS, [("retry-after", "1")], "Rate limit exceeded").into_response();
    }
    if id.starts_with("down") {
        return (StatusCode::SERVICE_UNAVAILABLE, "Service unavailable").into_response();
    }
    if id.starts_with("slow") {
        tokio::time::sleep(Duration::from_secs(30)).await;
    }
    (StatusCode::OK, axum::Json(ok_body)).into_response()
}

async fn summoner(State(state): State<Arc<FakeUpstream>>, Path(name): Path<String>, headers: HeaderMap) -> Response {
    let body = json!({
        "id": "whn4axlxBaWmkCaakVFfJds6Rn52PQo2M8X8e1BFbGvP",
        "accountId": "NSpquHoF_vBQYLZ4ZG7nGoRK8-2fhxUDOKxAc14PTjg",
        "puuid": format!("puuid-{}", name),
        "name": name,
        "profileIconId": 4568,
        "revisionDate": 1645995498000i64,
        "summonerLevel": 42
    });
    canned(&state, &headers, &name, body).await
}

async fn match_ids(
    State(state): State<Arc<FakeUpstream>>,
    Path(puuid): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let start: u32 = params.get("start").and_then(|s| s.parse().ok()).unwrap_or(0);
    let count: u32 = params.get("count").and_then(|s| s.parse().ok()).unwrap_or(20);
    let ids: Vec<String> = (start..start + count).map(|i| format!("BR1_{}", i)).collect();
    canned(&state, &headers, &puuid, json!(ids)).await
}

async fn match_by_id(State(state): State<Arc<FakeUpstream>>, Path(match_id): Path<String>, headers: HeaderMap) -> Response {
    canned(&state, &headers, &match_id, match_body(&match_id)).await
}

pub fn match_body(match_id: &str) -> serde_json::Value {
    let objective = json!({ "first": false, "kills": 0 });
    json!({
        "metadata": { "dataVersion": "2", "matchId": match_id, "participants": ["puuid-a"] },
        "info": {
            "gameCreation": 1645995498000i64,
            "gameDuration": 1820,
            "gameId": 2679279998i64,
            "gameMode": "CLASSIC",
            "gameType": "MATCHED_GAME",
            "gameVersion": "12.4.425.1200",
            "mapId": 11,
            "platformId": "BR1",
            "queueId": 420,
            "participants": [{
                "participantId": 1, "puuid": "puuid-a", "summonerId": "s-a",
                "summonerName": "Mephy", "summonerLevel": 42, "teamId": 100,
                "championId": 99, "championName": "Lux", "champLevel": 16,
                "individualPosition": "MIDDLE", "teamPosition": "MIDDLE",
                "lane": "MIDDLE", "role": "SOLO", "kills": 7, "deaths": 2,
                "assists": 11, "goldEarned": 12000, "goldSpent": 11500,
                "totalMinionsKilled": 180, "neutralMinionsKilled": 4,
                "totalDamageDealtToChampions": 25000, "totalDamageTaken": 14000,
                "visionScore": 30, "wardsPlaced": 10, "wardsKilled": 3,
                "timeCCingOthers": 25, "totalTimeCCDealt": 140,
                "timePlayed": 1820, "win": true
            }],
            "teams": [{
                "teamId": 100, "win": true,
                "bans": [{ "championId": 157, "pickTurn": 1 }],
                "objectives": {
                    "baron": objective, "champion": objective, "dragon": objective,
                    "inhibitor": objective, "riftHerald": objective, "tower": objective
                }
            }]
        }
    })
}

/// Fake path-style bucket: `HEAD`/`PUT /<bucket>/<key>`.
#[derive(Default)]
pub struct FakeBucket {
    pub objects: Mutex<HashMap<String, Vec<u8>>>,
    pub fail_stat: std::sync::atomic::AtomicBool,
}

pub async fn spawn_bucket() -> (SocketAddr, Arc<FakeBucket>) {
    let state = Arc::new(FakeBucket::default());
    let app = Router::new()
        .route("/:bucket/*key", head(stat_object).put(put_object))
        .with_state(state.clone());
    (spawn(app).await, state)
}

fn bucket_authorized(headers: &HeaderMap) -> bool {
    headers.get("authorization").and_then(|v| v.to_str().ok()) == Some("Bearer secret")
}

async fn stat_object(
    State(state): State<Arc<FakeBucket>>,
    Path((bucket, key)): Path<(String, String)>,
    headers: HeaderMap,
) -> StatusCode {
    if !bucket_authorized(&headers) {
        return StatusCode::FORBIDDEN;
    }
    if state.fail_stat.load(Ordering::SeqCst) {
        return StatusCode::INTERNAL_SERVER_ERROR;
    }
    let path = format!("{}/{}", bucket, key.trim_start_matches('/'));
    if state.objects.lock().unwrap().contains_key(&path) {
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    }
}

async fn put_object(
    State(state): State<Arc<FakeBucket>>,
    Path((bucket, key)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    if !bucket_authorized(&headers) {
        return StatusCode::FORBIDDEN;
    }
    let path = format!("{}/{}", bucket, key.trim_start_matches('/'));
    state.objects.lock().unwrap().insert(path, body.to_vec());
    StatusCode::OK
}

/// Fake S3 bucket: accepts only SigV4-signed requests and answers with the
/// headers S3 clients read (`ETag`, `Last-Modified`, `Content-Length`).
pub async fn spawn_s3_bucket() -> (SocketAddr, Arc<FakeBucket>) {
    let state = Arc::new(FakeBucket::default());
    let app = Router::new()
        .route("/:bucket/*key", head(stat_s3_object).put(put_s3_object))
        .with_state(state.clone());
    (spawn(app).await, state)
}

fn sigv4_signed(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map_or(false, |v| v.starts_with("AWS4-HMAC-SHA256 Credential=minio/"))
}

async fn stat_s3_object(
    State(state): State<Arc<FakeBucket>>,
    Path((bucket, key)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    if !sigv4_signed(&headers) {
        return StatusCode::FORBIDDEN.into_response();
    }
    if state.fail_stat.load(Ordering::SeqCst) {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    let path = format!("{}/{}", bucket, key.trim_start_matches('/'));
    match state.objects.lock().unwrap().get(&path) {
        Some(body) => (
            StatusCode::OK,
            [
                ("content-length", body.len().to_string()),
                ("last-modified", "Wed, 02 Mar 2022 12:00:00 GMT".to_string()),
                ("etag", "\"0123456789abcdef\"".to_string()),
            ],
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn put_s3_object(
    State(state): State<Arc<FakeBucket>>,
    Path((bucket, key)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if !sigv4_signed(&headers) {
        return StatusCode::FORBIDDEN.into_response();
    }
    let path = format!("{}/{}", bucket, key.trim_start_matches('/'));
    state.objects.lock().unwrap().insert(path, body.to_vec());
    (StatusCode::OK, [("etag", "\"0123456789abcdef\"")]).into_response()
}

pub fn settings_for(addr: SocketAddr) -> Settings {
    let mut settings = Settings::default();
    settings.riot.api_key = API_KEY.to_string();
    settings.riot.platform_url = format!("http://{}", addr);
    settings.riot.routing_url = format!("http://{}", addr);
    settings.rate_limits.backoff_base_ms = 10;
    settings
}

pub fn client_with_limits(settings: &Settings, limits: LimitSet, policy: RetryPolicy) -> RiotClient {
    let gate = RetryingGate::new(Arc::new(RateLimiter::new()), limits, "normal_query", policy);
    RiotClient::new(&settings.riot, gate).unwrap()
}

pub fn client(settings: &Settings) -> RiotClient {
    client_with_limits(
        settings,
        settings.rate_limits.limit_set(),
        settings.rate_limits.retry_policy(),
    )
}

pub fn tight_limits(capacity: u32) -> LimitSet {
    LimitSet::new(
        "test",
        vec![RateWindow::new(capacity, Duration::from_secs(3600), "hourly")],
    )
}
