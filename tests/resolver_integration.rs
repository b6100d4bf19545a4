//! Integration tests for the two-backend resolver across multiple songs.
//!
//! The unit tests cover each backend in isolation; these exercise the
//! process-wide behavior that matters across a whole batch: quota
//! exhaustion is sticky, the scrape fallback carries the rest of the run,
//! and search usage metering records every completed search call.

use std::sync::Arc;
use std::time::Duration;

use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use songfetch_core::UsageCounter;
use songfetch_core::resolver::{ResolverConfig, SourceKind, TitleResolver};

/// A results page embedding one plausible player payload.
fn results_page(video_id: &str) -> String {
    format!(r#"<html><script>var ytInitialData = {{"videoId":"{video_id}"}};</script></html>"#)
}

fn config(api: &MockServer, scrape: &MockServer) -> ResolverConfig {
    ResolverConfig {
        api_key: Some("integration-test-key".to_string()),
        api_base_url: Some(api.uri()),
        scrape_base_url: Some(scrape.uri()),
        retry_pause: Some(Duration::ZERO),
        ..ResolverConfig::default()
    }
}

// ---- Quota exhaustion is sticky across the whole resolver lifetime ----

#[tokio::test]
async fn test_quota_exhaustion_stops_primary_calls_for_good() {
    let api = MockServer::start().await;
    // One 403 is all the resolver should ever ask for.
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&api)
        .await;

    let scrape = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/results"))
        .respond_with(ResponseTemplate::new(200).set_body_string(results_page("dQw4w9WgXcQ")))
        .mount(&scrape)
        .await;

    let resolver = TitleResolver::new(config(&api, &scrape)).unwrap();
    assert!(!resolver.quota_exhausted());

    let first = resolver.resolve("First Song").await.unwrap();
    assert_eq!(first.source, SourceKind::FallbackScrape);
    assert!(resolver.quota_exhausted());

    // Subsequent songs go straight to the fallback; the api mock's
    // expect(1) verifies no further primary traffic on drop.
    for name in ["Second Song", "Third Song", "Fourth Song"] {
        let media = resolver.resolve(name).await.unwrap();
        assert_eq!(media.source, SourceKind::FallbackScrape);
        assert_eq!(media.video_id, "dQw4w9WgXcQ");
    }
}

// ---- Usage metering counts primary calls, successful or not ----

#[tokio::test]
async fn test_usage_counter_records_each_primary_call() {
    let api = MockServer::start().await;
    let body = serde_json::json!({
        "items": [{ "id": { "videoId": "kJQP7kiw5Fk" } }]
    });
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&api)
        .await;

    let scrape = MockServer::start().await;

    let usage = Arc::new(UsageCounter::new_in_memory().await.unwrap());
    let resolver = TitleResolver::new(ResolverConfig {
        usage: Some(Arc::clone(&usage)),
        ..config(&api, &scrape)
    })
    .unwrap();

    for name in ["One", "Two", "Three"] {
        let media = resolver.resolve(name).await.unwrap();
        assert_eq!(media.source, SourceKind::PrimaryApi);
    }

    assert_eq!(usage.used().await.unwrap(), 3);
}

// ---- Usage metering covers fallback searches too ----

#[tokio::test]
async fn test_usage_counter_records_fallback_searches() {
    let scrape = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/results"))
        .respond_with(ResponseTemplate::new(200).set_body_string(results_page("dQw4w9WgXcQ")))
        .mount(&scrape)
        .await;

    let usage = Arc::new(UsageCounter::new_in_memory().await.unwrap());
    // No API key: every search goes through the scrape backend.
    let resolver = TitleResolver::new(ResolverConfig {
        scrape_base_url: Some(scrape.uri()),
        retry_pause: Some(Duration::ZERO),
        usage: Some(Arc::clone(&usage)),
        ..ResolverConfig::default()
    })
    .unwrap();

    let media = resolver.resolve("Some Song").await.unwrap();
    assert_eq!(media.source, SourceKind::FallbackScrape);
    assert_eq!(usage.used().await.unwrap(), 1);
}

#[tokio::test]
async fn test_usage_counter_records_both_calls_when_primary_fails_over() {
    // A non-quota primary failure falls through to the scrape backend;
    // both completed calls count against usage.
    let api = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&api)
        .await;

    let scrape = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/results"))
        .respond_with(ResponseTemplate::new(200).set_body_string(results_page("kJQP7kiw5Fk")))
        .mount(&scrape)
        .await;

    let usage = Arc::new(UsageCounter::new_in_memory().await.unwrap());
    let resolver = TitleResolver::new(ResolverConfig {
        usage: Some(Arc::clone(&usage)),
        ..config(&api, &scrape)
    })
    .unwrap();

    let media = resolver.resolve("Some Song").await.unwrap();
    assert_eq!(media.source, SourceKind::FallbackScrape);
    assert_eq!(usage.used().await.unwrap(), 2);
}

// ---- The primary backend is preferred while quota remains ----

#[tokio::test]
async fn test_primary_result_wins_over_fallback() {
    let api = MockServer::start().await;
    let body = serde_json::json!({
        "items": [{ "id": { "videoId": "9bZkp7q19f0" } }]
    });
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("key", "integration-test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&api)
        .await;

    // A live fallback that must never be consulted.
    let scrape = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/results"))
        .respond_with(ResponseTemplate::new(200).set_body_string(results_page("dQw4w9WgXcQ")))
        .expect(0)
        .mount(&scrape)
        .await;

    let resolver = TitleResolver::new(config(&api, &scrape)).unwrap();
    let media = resolver.resolve("Some Song").await.unwrap();

    assert_eq!(media.source, SourceKind::PrimaryApi);
    assert_eq!(media.video_id, "9bZkp7q19f0");
    assert!(!resolver.quota_exhausted());
}
