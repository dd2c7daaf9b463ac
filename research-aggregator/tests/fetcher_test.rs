mod common;

use common::{HttpStub, StubResponse};
use research_aggregator::{FetchConfig, Fetcher, ResearchError};
use std::sync::{Arc, Once};
use std::time::Duration;
use tokio::time::Instant;

static INIT: Once = Once::new();

fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .try_init()
            .ok();
    });
}

fn quick_config() -> FetchConfig {
    FetchConfig {
        timeout_seconds: 5,
        max_retries: 2,
        retry_delay_ms: 20,
        min_host_interval_ms: 0,
        ..FetchConfig::default()
    }
}

fn status(code: u16) -> ResearchError {
    ResearchError::HttpStatus {
        url: "https://feeds.example.com/rss".to_string(),
        status: code,
    }
}

#[test]
fn test_transient_errors() {
    assert!(status(429).is_transient());
    assert!(status(500).is_transient());
    assert!(status(503).is_transient());
    assert!(!status(404).is_transient());
    assert!(!status(403).is_transient());
    assert!(!ResearchError::Parse("bad xml".to_string()).is_transient());
    assert!(!ResearchError::BodyTooLarge {
        url: "https://feeds.example.com/rss".to_string(),
        size_mb: 12,
    }
    .is_transient());
}

#[tokio::test]
async fn test_server_errors_are_retried() {
    init_tracing();

    let stub = HttpStub::start(vec![
        StubResponse::new(503, "busy"),
        StubResponse::new(429, "slow down"),
        StubResponse::new(200, "<rss/>"),
    ])
    .await;
    let fetcher = Fetcher::new(quick_config()).unwrap();

    let body = fetcher.fetch_text(&stub.url("/feed")).await.unwrap();
    assert_eq!(body, "<rss/>");
    assert_eq!(stub.hits(), 3);
}

#[tokio::test]
async fn test_retries_stop_at_max_retries() {
    init_tracing();

    let stub = HttpStub::start(vec![StubResponse::new(500, "down")]).await;
    let fetcher = Fetcher::new(quick_config()).unwrap();

    let result = fetcher.fetch_text(&stub.url("/feed")).await;
    assert!(matches!(result, Err(ResearchError::HttpStatus { status: 500, .. })));
    assert_eq!(stub.hits(), 3);
}

#[tokio::test]
async fn test_client_errors_fail_immediately() {
    init_tracing();

    let stub = HttpStub::start(vec![StubResponse::new(404, "missing"), StubResponse::new(200, "late")]).await;
    let fetcher = Fetcher::new(quick_config()).unwrap();

    let result = fetcher.fetch_text(&stub.url("/gone")).await;
    assert!(matches!(result, Err(ResearchError::HttpStatus { status: 404, .. })));
    assert_eq!(stub.hits(), 1);
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    init_tracing();

    let stub = HttpStub::start(vec![StubResponse::new(200, "x".repeat(2 * 1024 * 1024 + 10))]).await;
    let config = FetchConfig {
        max_body_size_mb: 1,
        ..quick_config()
    };
    let fetcher = Fetcher::new(config).unwrap();

    let result = fetcher.fetch_text(&stub.url("/huge")).await;
    assert!(matches!(result, Err(ResearchError::BodyTooLarge { size_mb: 2, .. })));
    assert_eq!(stub.hits(), 1);
}

#[tokio::test]
async fn test_json_with_headers() {
    init_tracing();

    let stub = HttpStub::start(vec![StubResponse::new(200, r#"{"items": [{"id": "abc"}]}"#)]).await;
    let fetcher = Fetcher::new(quick_config()).unwrap();

    let value: serde_json::Value = fetcher
        .fetch_json_with_headers(&stub.url("/search?q=ai"), &[("X-Goog-Api-Key", "test-key")])
        .await
        .unwrap();
    assert_eq!(value["items"][0]["id"], "abc");

    let requests = stub.requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].starts_with("GET /search?q=ai HTTP/1.1"));
    assert!(requests[0].to_lowercase().contains("x-goog-api-key: test-key"));

    let broken = HttpStub::start(vec![StubResponse::new(200, "not json")]).await;
    let result: Result<serde_json::Value, _> = fetcher.fetch_json(&broken.url("/search")).await;
    assert!(matches!(result, Err(ResearchError::Serialization(_))));
}

#[tokio::test]
async fn test_requests_to_one_host_are_spaced() {
    init_tracing();

    let stub = HttpStub::start(vec![StubResponse::new(200, "ok")]).await;
    let config = FetchConfig {
        min_host_interval_ms: 300,
        ..quick_config()
    };
    let fetcher = Fetcher::new(config).unwrap();

    for _ in 0..3 {
        fetcher.fetch_text(&stub.url("/feed")).await.unwrap();
    }

    let arrivals = stub.arrivals();
    assert_eq!(arrivals.len(), 3);
    for pair in arrivals.windows(2) {
        let gap = pair[1] - pair[0];
        assert!(gap >= Duration::from_millis(250), "requests only {:?} apart", gap);
    }
}

#[tokio::test]
async fn test_waiting_on_one_host_does_not_block_another() {
    init_tracing();

    let stub = HttpStub::start(vec![StubResponse::new(200, "ok")]).await;
    let config = FetchConfig {
        min_host_interval_ms: 1000,
        ..quick_config()
    };
    let fetcher = Arc::new(Fetcher::new(config).unwrap());
    fetcher.fetch_text(&stub.url("/first")).await.unwrap();

    let started = Instant::now();
    let same_host = {
        let fetcher = fetcher.clone();
        let url = stub.url("/second");
        tokio::spawn(async move {
            fetcher.fetch_text(&url).await.unwrap();
            started.elapsed()
        })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let other_host = format!("http://localhost:{}/other", stub.port);
    fetcher.fetch_text(&other_host).await.unwrap();
    let other_elapsed = started.elapsed();

    let same_elapsed = same_host.await.unwrap();
    assert!(other_elapsed < Duration::from_millis(800), "other host waited {:?}", other_elapsed);
    assert!(same_elapsed >= Duration::from_millis(900), "same host waited only {:?}", same_elapsed);
}
