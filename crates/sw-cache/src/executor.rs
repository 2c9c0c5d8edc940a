use crate::clock::Clock;
use crate::config::CacheNames;
use crate::entry::CachedResponse;
use crate::error::StrategyError;
use crate::fetch::{Fetcher, RequestInfo};
use crate::metrics::{MetricKind, PerformanceMetrics};
use crate::revalidate::RevalidationRegistry;
use crate::rules::{StrategyKind, StrategyRule};
use crate::store::{cache_key, Cache, CacheStorage};
use std::sync::Arc;

/// Where a served response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServedFrom {
    /// Cached and within the rule's max age.
    Cache,
    /// Cached but past its max age (or undated).
    StaleCache,
    Network,
}

impl ServedFrom {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServedFrom::Cache => "HIT",
            ServedFrom::StaleCache => "STALE",
            ServedFrom::Network => "MISS",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Served {
    pub response: CachedResponse,
    pub source: ServedFrom,
}

impl Served {
    fn from_cache(entry: &CachedResponse, source: ServedFrom) -> Self {
        Self {
            response: entry.clone(),
            source,
        }
    }

    fn from_network(response: CachedResponse) -> Self {
        Self {
            response,
            source: ServedFrom::Network,
        }
    }
}

/// Runs the three caching strategies against a store and the network.
#[derive(Clone)]
pub struct StrategyExecutor {
    storage: Arc<dyn CacheStorage>,
    fetcher: Arc<dyn Fetcher>,
    metrics: Arc<PerformanceMetrics>,
    clock: Arc<dyn Clock>,
    names: CacheNames,
    revalidations: Arc<RevalidationRegistry>,
}

impl StrategyExecutor {
    pub fn new(
        storage: Arc<dyn CacheStorage>,
        fetcher: Arc<dyn Fetcher>,
        metrics: Arc<PerformanceMetrics>,
        clock: Arc<dyn Clock>,
        names: CacheNames,
    ) -> Self {
        Self {
            storage,
            fetcher,
            metrics,
            clock,
            names,
            revalidations: Arc::new(RevalidationRegistry::new()),
        }
    }

    pub fn revalidations(&self) -> &RevalidationRegistry {
        &self.revalidations
    }

    pub async fn execute(
        &self,
        req: &RequestInfo,
        rule: &StrategyRule,
    ) -> Result<Served, StrategyError> {
        let key = cache_key(&req.method, &req.url);
        let cache = self.storage.open(self.names.for_category(rule.category));

        tracing::debug!(
            key = %key,
            rule = %rule.name,
            strategy = %rule.kind,
            "executing strategy"
        );

        match rule.kind {
            StrategyKind::CacheFirst => self.cache_first(req, rule, key, cache).await,
            StrategyKind::NetworkFirst => self.network_first(req, rule, key, cache).await,
            StrategyKind::StaleWhileRevalidate => {
                self.stale_while_revalidate(req, key, cache).await
            }
        }
    }

    async fn cache_first(
        &self,
        req: &RequestInfo,
        rule: &StrategyRule,
        key: String,
        cache: Arc<dyn Cache>,
    ) -> Result<Served, StrategyError> {
        let cached = self.lookup(cache.as_ref(), &key);

        match &cached {
            Some(entry) if !entry.is_expired(self.clock.now(), rule.max_age) => {
                self.metrics.record(MetricKind::CacheHit);
                return Ok(Served::from_cache(entry, ServedFrom::Cache));
            }
            Some(_) => tracing::debug!(key = %key, "cached entry expired, refreshing"),
            None => self.metrics.record(MetricKind::CacheMiss),
        }

        match self.fetcher.fetch(req).await {
            Ok(response) => {
                self.metrics.record(MetricKind::NetworkRequest);
                self.store(cache.as_ref(), key, &response);
                Ok(Served::from_network(response))
            }
            Err(e) => match cached {
                Some(stale) => {
                    tracing::debug!(key = %key, error = %e, "network failed, serving stale entry");
                    self.metrics.record(MetricKind::CacheHit);
                    Ok(Served::from_cache(&stale, ServedFrom::StaleCache))
                }
                None => {
                    tracing::debug!(key = %key, error = %e, "network failed, nothing cached");
                    Err(StrategyError::NoCachedResponse {
                        url: req.url.to_string(),
                    })
                }
            },
        }
    }

    async fn network_first(
        &self,
        req: &RequestInfo,
        rule: &StrategyRule,
        key: String,
        cache: Arc<dyn Cache>,
    ) -> Result<Served, StrategyError> {
        let error = match self.fetcher.fetch(req).await {
            Ok(response) => {
                self.metrics.record(MetricKind::NetworkRequest);
                self.store(cache.as_ref(), key, &response);
                return Ok(Served::from_network(response));
            }
            Err(e) => e,
        };

        match self.lookup(cache.as_ref(), &key) {
            Some(entry) => {
                tracing::debug!(key = %key, error = %error, "network failed, serving cached entry");
                self.metrics.record(MetricKind::CacheHit);
                let source = if entry.is_expired(self.clock.now(), rule.max_age) {
                    ServedFrom::StaleCache
                } else {
                    ServedFrom::Cache
                };
                Ok(Served::from_cache(&entry, source))
            }
            None => {
                tracing::debug!(key = %key, error = %error, "offline with nothing cached");
                self.metrics.record(MetricKind::CacheMiss);
                self.metrics.record(MetricKind::OfflineRequest);
                Err(StrategyError::NoResponseAvailable {
                    url: req.url.to_string(),
                })
            }
        }
    }

    async fn stale_while_revalidate(
        &self,
        req: &RequestInfo,
        key: String,
        cache: Arc<dyn Cache>,
    ) -> Result<Served, StrategyError> {
        if let Some(entry) = self.lookup(cache.as_ref(), &key) {
            self.metrics.record(MetricKind::CacheHit);
            self.spawn_revalidation(req, key, cache);
            return Ok(Served::from_cache(&entry, ServedFrom::Cache));
        }

        self.metrics.record(MetricKind::CacheMiss);
        match self.fetcher.fetch(req).await {
            Ok(response) => {
                self.metrics.record(MetricKind::NetworkRequest);
                self.store(cache.as_ref(), key, &response);
                Ok(Served::from_network(response))
            }
            Err(e) => {
                tracing::debug!(key = %key, error = %e, "offline with nothing cached");
                self.metrics.record(MetricKind::OfflineRequest);
                Err(StrategyError::NoResponseAvailable {
                    url: req.url.to_string(),
                })
            }
        }
    }

    /// Refresh `key` in the background. Errors are logged, never surfaced.
    fn spawn_revalidation(&self, req: &RequestInfo, key: String, cache: Arc<dyn Cache>) {
        let fetcher = Arc::clone(&self.fetcher);
        let clock = Arc::clone(&self.clock);
        let metrics = Arc::clone(&self.metrics);
        let req = req.clone();
        let task_key = key.clone();

        self.revalidations.spawn(&key, async move {
            match fetcher.fetch(&req).await {
                Ok(response) if response.is_ok() => {
                    metrics.record(MetricKind::NetworkRequest);
                    cache.put(task_key.clone(), response.stamped(clock.now()));
                    tracing::debug!(key = %task_key, "background revalidation stored fresh copy");
                }
                Ok(response) => {
                    metrics.record(MetricKind::NetworkRequest);
                    tracing::debug!(
                        key = %task_key,
                        status = response.status,
                        "background revalidation got non-ok status, keeping cached copy"
                    );
                }
                Err(e) => {
                    tracing::warn!(key = %task_key, error = %e, "background revalidation failed");
                }
            }
        });
    }

    /// The rule's own cache first, then any cache (the shell lives in the
    /// static cache whatever rule later matches it).
    fn lookup(&self, cache: &dyn Cache, key: &str) -> Option<Arc<CachedResponse>> {
        cache.get(key).or_else(|| self.storage.lookup(key))
    }

    /// Write-through for ok responses only, stamped with the capture time.
    fn store(&self, cache: &dyn Cache, key: String, response: &CachedResponse) {
        if response.is_ok() {
            cache.put(key, response.stamped(self.clock.now()));
        } else {
            tracing::debug!(key = %key, status = response.status, "not caching non-ok response");
        }
    }
}
