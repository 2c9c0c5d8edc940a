use crate::store::CacheStorage;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    CacheHit,
    CacheMiss,
    NetworkRequest,
    /// Network and cache both came up empty.
    OfflineRequest,
}

impl MetricKind {
    fn counter_name(&self) -> &'static str {
        match self {
            MetricKind::CacheHit => "sw_cache_hits_total",
            MetricKind::CacheMiss => "sw_cache_misses_total",
            MetricKind::NetworkRequest => "sw_network_requests_total",
            MetricKind::OfflineRequest => "sw_offline_requests_total",
        }
    }
}

/// Advisory request counters for one worker.
///
/// Relaxed atomics: counts may be reordered between concurrent requests but
/// never lost.
#[derive(Debug, Default)]
pub struct PerformanceMetrics {
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    network_requests: AtomicU64,
    offline_requests: AtomicU64,
}

/// Point-in-time copy of the counters, as sent to pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub network_requests: u64,
    pub offline_requests: u64,
    pub cache_size_bytes: u64,
    pub last_updated: DateTime<Utc>,
}

impl MetricsSnapshot {
    pub fn hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total > 0 {
            self.cache_hits as f64 / total as f64
        } else {
            0.0
        }
    }
}

impl PerformanceMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, kind: MetricKind) -> &AtomicU64 {
        match kind {
            MetricKind::CacheHit => &self.cache_hits,
            MetricKind::CacheMiss => &self.cache_misses,
            MetricKind::NetworkRequest => &self.network_requests,
            MetricKind::OfflineRequest => &self.offline_requests,
        }
    }

    pub fn record(&self, kind: MetricKind) {
        self.slot(kind).fetch_add(1, Ordering::Relaxed);
        ::metrics::counter!(kind.counter_name()).increment(1);
    }

    pub fn get(&self, kind: MetricKind) -> u64 {
        self.slot(kind).load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        for kind in [
            MetricKind::CacheHit,
            MetricKind::CacheMiss,
            MetricKind::NetworkRequest,
            MetricKind::OfflineRequest,
        ] {
            self.slot(kind).store(0, Ordering::Relaxed);
        }
    }

    /// Copy the counters and total up every cached body.
    pub fn snapshot(&self, storage: &dyn CacheStorage, now: DateTime<Utc>) -> MetricsSnapshot {
        MetricsSnapshot {
            cache_hits: self.get(MetricKind::CacheHit),
            cache_misses: self.get(MetricKind::CacheMiss),
            network_requests: self.get(MetricKind::NetworkRequest),
            offline_requests: self.get(MetricKind::OfflineRequest),
            cache_size_bytes: storage.total_bytes(),
            last_updated: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::CachedResponse;
    use crate::memory::MemoryStorage;

    #[test]
    fn record_and_reset() {
        let metrics = PerformanceMetrics::new();
        metrics.record(MetricKind::CacheHit);
        metrics.record(MetricKind::CacheHit);
        metrics.record(MetricKind::OfflineRequest);
        assert_eq!(metrics.get(MetricKind::CacheHit), 2);
        assert_eq!(metrics.get(MetricKind::OfflineRequest), 1);

        metrics.reset();
        assert_eq!(metrics.get(MetricKind::CacheHit), 0);
        assert_eq!(metrics.get(MetricKind::OfflineRequest), 0);
    }

    #[test]
    fn snapshot_sums_cache_sizes() {
        let storage = MemoryStorage::new();
        storage
            .open("a")
            .put("k1".into(), CachedResponse::new(200, vec![], "12345"));
        storage
            .open("b")
            .put("k2".into(), CachedResponse::new(200, vec![], "123"));

        let metrics = PerformanceMetrics::new();
        metrics.record(MetricKind::CacheHit);
        metrics.record(MetricKind::CacheMiss);
        let now = Utc::now();
        let snap = metrics.snapshot(&storage, now);

        assert_eq!(snap.cache_size_bytes, 8);
        assert_eq!(snap.last_updated, now);
        assert!((snap.hit_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn snapshot_serializes_camel_case() {
        let snap = PerformanceMetrics::new().snapshot(&MemoryStorage::new(), Utc::now());
        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["cacheHits"], 0);
        assert_eq!(json["offlineRequests"], 0);
        assert!(json["lastUpdated"].is_string());
    }
}
