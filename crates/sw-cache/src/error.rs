use thiserror::Error;

/// Terminal outcome of a strategy that produced nothing to serve.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StrategyError {
    /// Cache-first found no entry and the network failed.
    #[error("no cached response for {url}")]
    NoCachedResponse { url: String },

    /// Network-first or stale-while-revalidate exhausted network and cache.
    #[error("no response available for {url}")]
    NoResponseAvailable { url: String },
}

/// A request that never produced an HTTP response.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("network unreachable: {0}")]
    Network(String),

    #[error("request timed out after {0} ms")]
    Timeout(u64),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("install failed, {} shell asset(s) could not be cached: {}", .failed.len(), .failed.join(", "))]
    InstallFailed { failed: Vec<String> },

    #[error("cannot {action} while {state}")]
    InvalidTransition { action: &'static str, state: String },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("rule '{rule}' has an invalid pattern: {source}")]
    InvalidPattern {
        rule: String,
        #[source]
        source: regex::Error,
    },

    #[error("rule '{0}' needs either a pattern or cross_origin = true")]
    MissingMatcher(String),

    #[error("invalid origin '{origin}': {source}")]
    InvalidOrigin {
        origin: String,
        #[source]
        source: url::ParseError,
    },
}
