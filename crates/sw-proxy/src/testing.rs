//! Test doubles shared by the router tests.

use crate::proxy::AppState;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use sw_cache::clock::SystemClock;
use sw_cache::config::WorkerConfig;
use sw_cache::fetch::{Fetcher, RequestInfo};
use sw_cache::memory::MemoryStorage;
use sw_cache::{CachedResponse, FetchError, ServiceWorker};
use url::Url;

#[derive(Default)]
pub struct FakeNetwork {
    routes: Mutex<HashMap<String, String>>,
    offline: AtomicBool,
    calls: AtomicUsize,
    last_body: Mutex<Option<String>>,
}

impl FakeNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn route(&self, url: &str, body: &str) {
        self.routes.lock().insert(url.to_string(), body.to_string());
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_body(&self) -> Option<String> {
        self.last_body.lock().clone()
    }
}

#[async_trait]
impl Fetcher for FakeNetwork {
    async fn fetch(&self, req: &RequestInfo) -> Result<CachedResponse, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_body.lock() = Some(String::from_utf8_lossy(&req.body).into_owned());

        if self.offline.load(Ordering::SeqCst) {
            return Err(FetchError::Network("offline".into()));
        }
        let routes = self.routes.lock();
        Ok(match routes.get(req.url.as_str()) {
            Some(body) => CachedResponse::new(
                200,
                vec![("content-type".into(), "text/plain".into())],
                body.clone(),
            ),
            None => CachedResponse::new(404, vec![], "not found"),
        })
    }
}

pub fn test_state(network: Arc<FakeNetwork>) -> Arc<AppState> {
    let config = WorkerConfig::default();
    let origin = Url::parse(&config.origin).unwrap();
    let worker = ServiceWorker::new(
        config,
        Arc::new(MemoryStorage::new()),
        network,
        Arc::new(SystemClock),
    )
    .unwrap();
    Arc::new(AppState { worker, origin })
}
