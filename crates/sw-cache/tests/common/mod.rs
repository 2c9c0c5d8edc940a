#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use sw_cache::clock::ManualClock;
use sw_cache::config::WorkerConfig;
use sw_cache::fetch::{Fetcher, RequestInfo};
use sw_cache::memory::MemoryStorage;
use sw_cache::{CachedResponse, FetchError, ServiceWorker};
use tokio::sync::Semaphore;
use url::Url;

pub const ORIGIN: &str = "http://localhost:8080";

/// Fake network: fixed routes, an offline switch, a call log, and a gate that
/// can hold fetches until released.
pub struct ScriptedFetcher {
    routes: Mutex<HashMap<String, CachedResponse>>,
    offline: AtomicBool,
    held: AtomicBool,
    gate: Semaphore,
    calls: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            routes: Mutex::new(HashMap::new()),
            offline: AtomicBool::new(false),
            held: AtomicBool::new(false),
            gate: Semaphore::new(0),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn route(&self, url: &str, status: u16, body: &str) {
        self.routes.lock().insert(
            url.to_string(),
            CachedResponse::new(status, vec![], body.to_string()),
        );
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Make every subsequent fetch wait until `release`.
    pub fn hold(&self) {
        self.held.store(true, Ordering::SeqCst);
    }

    pub fn release(&self) {
        self.held.store(false, Ordering::SeqCst);
        self.gate.add_permits(1024);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, req: &RequestInfo) -> Result<CachedResponse, FetchError> {
        self.calls.lock().push(req.url.to_string());

        if self.held.load(Ordering::SeqCst) {
            if let Ok(permit) = self.gate.acquire().await {
                permit.forget();
            }
        }

        if self.offline.load(Ordering::SeqCst) {
            return Err(FetchError::Network("offline".into()));
        }

        let routes = self.routes.lock();
        Ok(routes
            .get(req.url.as_str())
            .cloned()
            .unwrap_or_else(|| CachedResponse::new(404, vec![], "not found")))
    }
}

pub struct TestWorker {
    pub worker: ServiceWorker,
    pub fetcher: Arc<ScriptedFetcher>,
    pub storage: Arc<MemoryStorage>,
    pub clock: Arc<ManualClock>,
}

pub fn url(path: &str) -> Url {
    Url::parse(ORIGIN).unwrap().join(path).unwrap()
}

pub fn get(path: &str) -> RequestInfo {
    RequestInfo::get(url(path))
}

pub fn body(resp: &CachedResponse) -> &str {
    std::str::from_utf8(&resp.body).unwrap()
}

/// Worker with the default rules, every shell asset routed, and a fresh store.
pub fn worker() -> TestWorker {
    worker_with(WorkerConfig::default(), Arc::new(MemoryStorage::new()))
}

pub fn worker_with(config: WorkerConfig, storage: Arc<MemoryStorage>) -> TestWorker {
    let fetcher = ScriptedFetcher::new();
    for shell_url in config.shell_urls().unwrap() {
        fetcher.route(shell_url.as_str(), 200, shell_url.path());
    }
    let clock = Arc::new(ManualClock::new(
        Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
    ));
    let worker = ServiceWorker::new(config, storage.clone(), fetcher.clone(), clock.clone())
        .unwrap();
    TestWorker {
        worker,
        fetcher,
        storage,
        clock,
    }
}
