//! Offline-first HTTP cache worker.
//!
//! Every GET request is classified by the [`rules::StrategyRegistry`] and run
//! through one of three strategies by the [`executor::StrategyExecutor`]:
//!
//! - **cache-first**: serve a fresh cached copy, refresh from the network when expired
//! - **network-first**: go to the network, fall back to the cache when offline
//! - **stale-while-revalidate**: serve the cached copy now, refresh it in the background
//!
//! When every strategy is exhausted the [`worker::ServiceWorker`] substitutes an
//! offline page, a placeholder image or a 408 text response, so callers always
//! get something to render.

pub mod clock;
pub mod config;
pub mod control;
pub mod entry;
pub mod error;
pub mod executor;
pub mod fallback;
pub mod fetch;
pub mod lifecycle;
pub mod memory;
pub mod metrics;
pub mod revalidate;
pub mod rules;
pub mod store;
pub mod worker;

pub use entry::{CachedResponse, SW_CACHE_DATE};
pub use error::{ConfigError, FetchError, LifecycleError, StrategyError};
pub use worker::ServiceWorker;
