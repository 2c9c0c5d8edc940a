mod common;

use common::{get, url, worker, worker_with};
use std::sync::Arc;
use sw_cache::config::WorkerConfig;
use sw_cache::control::{ControlCommand, ControlReply};
use sw_cache::fallback::OFFLINE_URL;
use sw_cache::lifecycle::LifecycleState;
use sw_cache::memory::MemoryStorage;
use sw_cache::store::{Cache, CacheStorage};
use sw_cache::worker::FetchOutcome;
use sw_cache::{CachedResponse, LifecycleError};

fn snapshot(storage: &MemoryStorage) -> Vec<(String, Vec<(String, Vec<u8>)>)> {
    storage
        .keys()
        .into_iter()
        .map(|name| {
            let cache = storage.open(&name);
            let entries = cache
                .keys()
                .into_iter()
                .map(|k| {
                    let body = cache.get(&k).unwrap().body.to_vec();
                    (k, body)
                })
                .collect();
            (name, entries)
        })
        .collect()
}

#[tokio::test]
async fn activation_leaves_exactly_current_caches() {
    let storage = Arc::new(MemoryStorage::new());
    for old in [
        "drinkware-static-v0",
        "drinkware-dynamic-v0",
        "drinkware-images-v0",
        "some-other-cache",
    ] {
        storage
            .open(old)
            .put("GET /x".into(), CachedResponse::new(200, vec![], "old"));
    }

    let t = worker_with(WorkerConfig::default(), storage);
    t.worker.install().await.unwrap();
    let mut deleted = t.worker.activate().unwrap();
    deleted.sort();

    assert_eq!(deleted.len(), 4);
    assert_eq!(
        t.storage.keys(),
        vec![
            "drinkware-dynamic-v1",
            "drinkware-images-v1",
            "drinkware-static-v1",
        ]
    );
    assert_eq!(t.worker.state(), LifecycleState::Active);
    assert!(t.worker.clients_claimed());
}

#[tokio::test]
async fn version_bump_retires_previous_caches() {
    let storage = Arc::new(MemoryStorage::new());

    let v1 = worker_with(WorkerConfig::default(), storage.clone());
    v1.worker.install().await.unwrap();
    v1.worker.activate().unwrap();

    let v2_config = WorkerConfig {
        version: "v2".into(),
        ..WorkerConfig::default()
    };
    let v2 = worker_with(v2_config, storage.clone());
    v2.worker.install().await.unwrap();
    let deleted = v2.worker.activate().unwrap();

    assert_eq!(deleted.len(), 3);
    assert!(storage.keys().iter().all(|name| name.ends_with("-v2")));
}

#[tokio::test]
async fn install_twice_is_idempotent() {
    let t = worker();
    let first_count = t.worker.install().await.unwrap();
    let first = snapshot(&t.storage);

    let second_count = t.worker.install().await.unwrap();
    let second = snapshot(&t.storage);

    assert_eq!(first_count, second_count);
    assert_eq!(first, second);
    let shell = WorkerConfig::default().shell.len();
    assert_eq!(first_count, shell + 1);
    assert_eq!(t.storage.open("drinkware-static-v1").len(), shell + 1);
}

#[tokio::test]
async fn failed_install_writes_nothing() {
    let t = worker();
    t.fetcher
        .route(url("/assets/js/main.js").as_str(), 404, "missing");

    let err = t.worker.install().await.unwrap_err();
    match err {
        LifecycleError::InstallFailed { failed } => {
            assert_eq!(failed, vec![url("/assets/js/main.js").to_string()]);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(t.worker.state(), LifecycleState::Redundant);
    assert!(t.storage.open("drinkware-static-v1").is_empty());
}

#[tokio::test]
async fn install_stores_offline_page() {
    let t = worker();
    t.worker.install().await.unwrap();
    let key = format!("GET {}", url(OFFLINE_URL));
    let page = t.storage.lookup(&key).unwrap();
    assert!(page.stored_at().is_some());
    assert_eq!(page.header("content-type"), Some("text/html; charset=utf-8"));
}

#[tokio::test]
async fn skip_waiting_message_activates() {
    let config = WorkerConfig {
        skip_waiting: false,
        ..WorkerConfig::default()
    };
    let t = worker_with(config, Arc::new(MemoryStorage::new()));
    t.worker.install().await.unwrap();
    assert_eq!(t.worker.state(), LifecycleState::Waiting);

    let reply = t.worker.handle_message(ControlCommand::SkipWaiting);
    assert_eq!(
        reply,
        ControlReply::Ack {
            command: "SKIP_WAITING".into()
        }
    );
    assert_eq!(t.worker.state(), LifecycleState::Active);

    // already active: still acknowledged, nothing changes
    let reply = t.worker.handle_message(ControlCommand::SkipWaiting);
    assert!(matches!(reply, ControlReply::Ack { .. }));
}

#[tokio::test]
async fn sweep_evicts_entries_past_default_age() {
    let t = worker();
    t.worker.install().await.unwrap();
    t.worker.activate().unwrap();

    t.clock.advance(std::time::Duration::from_secs(25 * 60 * 60));
    t.fetcher.route(url("/api/products").as_str(), 200, "[]");
    t.worker.handle_fetch(get("/api/products")).await;

    let evicted = t.worker.sweep();
    assert_eq!(evicted, WorkerConfig::default().shell.len() + 1);
    assert_eq!(t.storage.open("drinkware-static-v1").len(), 0);
    assert_eq!(t.storage.open("drinkware-dynamic-v1").len(), 1);
}

#[tokio::test]
async fn shell_is_served_offline_after_install() {
    let t = worker();
    t.worker.install().await.unwrap();
    t.worker.activate().unwrap();
    t.fetcher.set_offline(true);

    let served = t.worker.handle_fetch(get("/pages/contact.html")).await;
    assert!(matches!(served.outcome, FetchOutcome::Served(_)));
    assert_eq!(common::body(&served.response), "/pages/contact.html");
}
