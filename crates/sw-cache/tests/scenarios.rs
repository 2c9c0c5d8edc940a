mod common;

use common::{body, get, url, worker};
use std::time::Duration;
use sw_cache::clock::Clock;
use sw_cache::control::{ControlCommand, ControlReply};
use sw_cache::executor::ServedFrom;
use sw_cache::fallback::FALLBACK_HEADER;
use sw_cache::fetch::Destination;
use sw_cache::store::{Cache, CacheStorage};
use sw_cache::worker::FetchOutcome;
use sw_cache::SW_CACHE_DATE;

const STYLES: &str = "/assets/css/styles.css";

#[tokio::test]
async fn scenario_a_first_request_populates_cache() {
    let t = worker();
    t.fetcher.route(url(STYLES).as_str(), 200, "body{}");

    let served = t.worker.handle_fetch(get(STYLES)).await;
    assert_eq!(served.outcome, FetchOutcome::Served(ServedFrom::Network));
    assert_eq!(served.rule.as_deref(), Some("static"));
    assert_eq!(body(&served.response), "body{}");

    let entry = t
        .storage
        .open("drinkware-static-v1")
        .get(&format!("GET {}", url(STYLES)))
        .expect("stylesheet cached");
    assert!(entry.header(SW_CACHE_DATE).is_some());
    assert_eq!(entry.stored_at(), Some(t.clock.now()));
}

#[tokio::test]
async fn scenario_b_repeat_is_a_hit() {
    let t = worker();
    t.fetcher.route(url(STYLES).as_str(), 200, "body{}");
    t.worker.handle_fetch(get(STYLES)).await;

    t.clock.advance(Duration::from_secs(1));
    let served = t.worker.handle_fetch(get(STYLES)).await;

    assert_eq!(served.outcome, FetchOutcome::Served(ServedFrom::Cache));
    assert_eq!(t.fetcher.call_count(), 1);
    assert_eq!(t.worker.metrics_snapshot().cache_hits, 1);
}

#[tokio::test]
async fn scenario_c_offline_page_with_and_without_cached_copy() {
    let t = worker();
    t.fetcher.route(url("/pages/about.html").as_str(), 200, "about us");
    t.worker.handle_fetch(get("/pages/about.html")).await;

    t.fetcher.set_offline(true);
    let cached = t.worker.handle_fetch(get("/pages/about.html")).await;
    assert!(matches!(cached.outcome, FetchOutcome::Served(_)));
    assert_eq!(body(&cached.response), "about us");

    let missing = t
        .worker
        .handle_fetch(get("/pages/warranty.html").with_destination(Destination::Document))
        .await;
    assert_eq!(missing.outcome, FetchOutcome::Fallback);
    assert_eq!(missing.response.status, 200);
    assert_eq!(missing.response.header(FALLBACK_HEADER), Some("offline"));
    assert!(body(&missing.response).contains("<!DOCTYPE html>"));
}

#[tokio::test]
async fn scenario_c_uses_installed_offline_page() {
    let t = worker();
    t.worker.install().await.unwrap();
    t.worker.activate().unwrap();
    t.fetcher.set_offline(true);

    let served = t.worker.handle_fetch(get("/pages/warranty.html")).await;
    assert_eq!(served.outcome, FetchOutcome::Fallback);
    assert!(served.response.header(SW_CACHE_DATE).is_some());
}

#[tokio::test]
async fn scenario_d_clear_cache_resets_everything() {
    let t = worker();
    t.worker.install().await.unwrap();
    t.worker.activate().unwrap();
    t.fetcher.route(url(STYLES).as_str(), 200, "body{}");
    t.worker.handle_fetch(get(STYLES)).await;
    t.worker.handle_fetch(get("/api/products")).await;
    assert!(t.worker.metrics_snapshot().cache_hits > 0);

    let reply = t.worker.handle_message(ControlCommand::ClearCache);
    assert_eq!(
        reply,
        ControlReply::Ack {
            command: "CLEAR_CACHE".into()
        }
    );

    match t.worker.handle_message(ControlCommand::GetPerformanceMetrics) {
        ControlReply::PerformanceMetrics { metrics } => {
            assert_eq!(metrics.cache_hits, 0);
            assert_eq!(metrics.cache_misses, 0);
            assert_eq!(metrics.network_requests, 0);
            assert_eq!(metrics.offline_requests, 0);
            assert_eq!(metrics.cache_size_bytes, 0);
        }
        other => panic!("unexpected reply: {other:?}"),
    }
    assert!(t.storage.keys().is_empty());
}

#[tokio::test]
async fn metrics_reply_matches_wire_shape() {
    let t = worker();
    let reply = t.worker.handle_message(ControlCommand::GetPerformanceMetrics);
    let json = serde_json::to_value(&reply).unwrap();
    assert_eq!(json["type"], "PERFORMANCE_METRICS");
    assert_eq!(json["metrics"]["cacheHits"], 0);
    assert!(json["metrics"]["lastUpdated"].is_string());
}
