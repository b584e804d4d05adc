#![recursion_limit = "256"]

mod common;

use anyhow::Result;
use common::{client, client_with_limits, settings_for, spawn_upstream, tight_limits};
use dyel::app::ports::RiotApiPort;
use dyel::app::retry_gate::RetryPolicy;
use dyel::{cancel_pair, CancelToken, IngestError};
use std::time::{Duration, Instant};

#[tokio::test]
async fn test_fetch_summoner_keeps_raw_body() -> Result<()> {
    let (addr, upstream) = spawn_upstream().await;
    let api = client(&settings_for(addr));

    let fetched = api.fetch_summoner("Mephy", &CancelToken::never()).await?;
    assert_eq!(fetched.record.puuid, "puuid-Mephy");
    assert_eq!(fetched.record.summoner_level, 42);

    let raw: serde_json::Value = serde_json::from_slice(&fetched.raw)?;
    assert_eq!(raw["accountId"], "NSpquHoF_vBQYLZ4ZG7nGoRK8-2fhxUDOKxAc14PTjg");
    assert_eq!(upstream.hits(), 1);
    Ok(())
}

#[tokio::test]
async fn test_summoner_name_with_space_is_path_encoded() -> Result<()> {
    let (addr, upstream) = spawn_upstream().await;
    let api = client(&settings_for(addr));

    let fetched = api.fetch_summoner("Faker Jr", &CancelToken::never()).await?;
    assert_eq!(fetched.record.name, "Faker Jr");
    assert_eq!(upstream.seen(), vec!["Faker Jr"]);
    Ok(())
}

#[tokio::test]
async fn test_fetch_match_ids_sends_paging() -> Result<()> {
    let (addr, _upstream) = spawn_upstream().await;
    let api = client(&settings_for(addr));

    let fetched = api.fetch_match_ids("puuid-1", 40, 3, &CancelToken::never()).await?;
    assert_eq!(fetched.record, vec!["BR1_40", "BR1_41", "BR1_42"]);
    Ok(())
}

#[tokio::test]
async fn test_fetch_match_decodes_participants() -> Result<()> {
    let (addr, _upstream) = spawn_upstream().await;
    let api = client(&settings_for(addr));

    let fetched = api.fetch_match("BR1_2679279998", &CancelToken::never()).await?;
    assert_eq!(fetched.record.metadata.match_id, "BR1_2679279998");
    assert_eq!(fetched.record.info.participants.len(), 1);
    assert_eq!(fetched.record.info.participants[0].champion_name, "Lux");
    Ok(())
}

#[tokio::test]
async fn test_upstream_statuses_map_to_error_kinds() -> Result<()> {
    let (addr, _upstream) = spawn_upstream().await;
    let api = client(&settings_for(addr));
    let cancel = CancelToken::never();

    let err = api.fetch_match("missing_1", &cancel).await.unwrap_err();
    assert!(matches!(err, IngestError::NotFound { .. }), "{:?}", err);

    let err = api.fetch_match("broken_1", &cancel).await.unwrap_err();
    assert!(matches!(err, IngestError::MalformedResponse(_)), "{:?}", err);

    let err = api.fetch_match("down_1", &cancel).await.unwrap_err();
    assert!(matches!(err, IngestError::UpstreamError { status: 503, .. }), "{:?}", err);
    assert!(err.is_retryable());
    Ok(())
}

#[tokio::test]
async fn test_wrong_api_key_is_unauthorized() -> Result<()> {
    let (addr, _upstream) = spawn_upstream().await;
    let mut settings = settings_for(addr);
    settings.riot.api_key = "RGAPI-expired".to_string();
    let api = client(&settings);

    let err = api.fetch_summoner("Mephy", &CancelToken::never()).await.unwrap_err();
    assert!(matches!(err, IngestError::Unauthorized { status: 403 }), "{:?}", err);
    assert!(!err.is_retryable());
    Ok(())
}

#[tokio::test]
async fn test_retry_after_delays_next_request() -> Result<()> {
    let (addr, upstream) = spawn_upstream().await;
    let api = client(&settings_for(addr));
    let cancel = CancelToken::never();

    let err = api.fetch_match("busy_1", &cancel).await.unwrap_err();
    match err {
        IngestError::UpstreamRateLimited { retry_after } => {
            assert_eq!(retry_after, Some(Duration::from_secs(1)));
        }
        other => panic!("expected upstream rate limit, got {:?}", other),
    }

    let started = Instant::now();
    api.fetch_match("BR1_1", &cancel).await?;
    assert!(started.elapsed() >= Duration::from_millis(900));
    assert_eq!(upstream.hits(), 2);
    Ok(())
}

#[tokio::test]
async fn test_exhausted_limiter_never_reaches_upstream() -> Result<()> {
    let (addr, upstream) = spawn_upstream().await;
    let policy = RetryPolicy {
        max_attempts: 2,
        backoff_base: Duration::from_millis(5),
    };
    let api = client_with_limits(&settings_for(addr), tight_limits(1), policy);
    let cancel = CancelToken::never();

    api.fetch_summoner("Mephy", &cancel).await?;
    let err = api.fetch_summoner("Anaab", &cancel).await.unwrap_err();

    assert!(matches!(err, IngestError::RateLimitExceeded { attempts: 2, .. }), "{:?}", err);
    assert_eq!(upstream.seen(), vec!["Mephy"]);
    Ok(())
}

#[tokio::test]
async fn test_cancel_aborts_in_flight_request() -> Result<()> {
    let (addr, _upstream) = spawn_upstream().await;
    let api = client(&settings_for(addr));
    let (handle, cancel) = cancel_pair();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.cancel();
    });

    let started = Instant::now();
    let err = api.fetch_match("slow_1", &cancel).await.unwrap_err();
    assert!(matches!(err, IngestError::Cancelled), "{:?}", err);
    assert!(started.elapsed() < Duration::from_secs(5));
    Ok(())
}

#[tokio::test]
async fn test_request_timeout_is_a_transport_error() -> Result<()> {
    let (addr, _upstream) = spawn_upstream().await;
    let mut settings = settings_for(addr);
    settings.riot.request_timeout_secs = 1;
    let api = client(&settings);

    let err = api.fetch_match("slow_2", &CancelToken::never()).await.unwrap_err();
    assert!(matches!(err, IngestError::Http(_)), "{:?}", err);
    assert!(err.is_retryable());
    Ok(())
}
