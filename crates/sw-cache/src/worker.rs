use crate::clock::Clock;
use crate::config::{CacheNames, SweepConfig, WorkerConfig};
use crate::control::{ControlCommand, ControlReply};
use crate::entry::CachedResponse;
use crate::error::{ConfigError, LifecycleError};
use crate::executor::{ServedFrom, StrategyExecutor};
use crate::fallback;
use crate::fetch::{Fetcher, RequestInfo};
use crate::lifecycle::{LifecycleManager, LifecycleState};
use crate::metrics::{MetricsSnapshot, PerformanceMetrics};
use crate::rules::StrategyRegistry;
use crate::store::CacheStorage;
use arc_swap::ArcSwap;
use http::Method;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// How a request was answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Non-GET, passed straight through.
    Bypass,
    Served(ServedFrom),
    /// Every strategy failed; a synthesized response was returned.
    Fallback,
}

impl FetchOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchOutcome::Bypass => "BYPASS",
            FetchOutcome::Served(from) => from.as_str(),
            FetchOutcome::Fallback => "FALLBACK",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Handled {
    pub response: CachedResponse,
    pub outcome: FetchOutcome,
    /// Name of the rule that classified the request (`None` for bypass).
    pub rule: Option<String>,
}

/// Composition root: owns the registry, executor, lifecycle and metrics of
/// one worker version. Nothing is global; the store, network and clock are
/// handed in.
pub struct ServiceWorker {
    storage: Arc<dyn CacheStorage>,
    fetcher: Arc<dyn Fetcher>,
    clock: Arc<dyn Clock>,
    metrics: Arc<PerformanceMetrics>,
    names: CacheNames,
    shell: Vec<Url>,
    registry: ArcSwap<StrategyRegistry>,
    sweep: ArcSwap<SweepConfig>,
    executor: StrategyExecutor,
    lifecycle: LifecycleManager,
}

impl ServiceWorker {
    pub fn new(
        config: WorkerConfig,
        storage: Arc<dyn CacheStorage>,
        fetcher: Arc<dyn Fetcher>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        let registry = StrategyRegistry::from_config(&config)?;
        let shell = config.shell_urls()?;
        let origin = config.origin_url()?;
        let offline_url = origin
            .join(fallback::OFFLINE_URL)
            .map_err(|source| ConfigError::InvalidOrigin {
                origin: config.origin.clone(),
                source,
            })?;
        let names = config.cache_names();
        let metrics = Arc::new(PerformanceMetrics::new());

        let executor = StrategyExecutor::new(
            Arc::clone(&storage),
            Arc::clone(&fetcher),
            Arc::clone(&metrics),
            Arc::clone(&clock),
            names.clone(),
        );
        let lifecycle = LifecycleManager::new(
            Arc::clone(&storage),
            Arc::clone(&fetcher),
            Arc::clone(&clock),
            names.clone(),
            offline_url,
            config.skip_waiting,
        );

        tracing::info!(
            version = %config.version,
            static_cache = %names.static_cache,
            rules = registry.rules().len(),
            shell_assets = shell.len(),
            "service worker created"
        );

        Ok(Self {
            storage,
            fetcher,
            clock,
            metrics,
            names,
            shell,
            registry: ArcSwap::from_pointee(registry),
            sweep: ArcSwap::from_pointee(config.sweep),
            executor,
            lifecycle,
        })
    }

    /// Answer an intercepted request. Never fails: exhausted strategies are
    /// turned into an offline page, a placeholder image or a 408.
    pub async fn handle_fetch(&self, req: RequestInfo) -> Handled {
        if req.method != Method::GET {
            return self.bypass(req).await;
        }

        let registry = self.registry.load_full();
        let rule = registry.classify(&req);

        match self.executor.execute(&req, rule).await {
            Ok(served) => Handled {
                response: served.response,
                outcome: FetchOutcome::Served(served.source),
                rule: Some(rule.name.clone()),
            },
            Err(e) => {
                tracing::info!(url = %req.url, rule = %rule.name, error = %e, "serving fallback");
                let cached_offline = self.storage.lookup(&self.lifecycle.offline_key());
                Handled {
                    response: fallback::for_request(&req, cached_offline.as_deref()),
                    outcome: FetchOutcome::Fallback,
                    rule: Some(rule.name.clone()),
                }
            }
        }
    }

    async fn bypass(&self, req: RequestInfo) -> Handled {
        let response = match self.fetcher.fetch(&req).await {
            Ok(resp) => resp,
            Err(e) => {
                tracing::info!(method = %req.method, url = %req.url, error = %e, "pass-through request failed");
                fallback::network_error()
            }
        };
        Handled {
            response,
            outcome: FetchOutcome::Bypass,
            rule: None,
        }
    }

    pub async fn install(&self) -> Result<usize, LifecycleError> {
        self.lifecycle.install(&self.shell).await
    }

    pub fn activate(&self) -> Result<Vec<String>, LifecycleError> {
        self.lifecycle.activate()
    }

    /// One expiry sweep with the configured max age.
    pub fn sweep(&self) -> usize {
        let max_age = Duration::from_secs(self.sweep.load().max_age_seconds);
        self.lifecycle.sweep(max_age)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep.load().interval_seconds)
    }

    pub fn handle_message(&self, cmd: ControlCommand) -> ControlReply {
        tracing::debug!(command = cmd.name(), "control message");
        match cmd {
            ControlCommand::GetPerformanceMetrics => ControlReply::PerformanceMetrics {
                metrics: self.metrics_snapshot(),
            },
            ControlCommand::SkipWaiting => {
                if !self.lifecycle.skip_waiting() {
                    return ack(cmd);
                }
                match self.lifecycle.activate() {
                    Ok(_) => ack(cmd),
                    Err(e) => ControlReply::Error {
                        command: cmd.name().to_string(),
                        message: e.to_string(),
                    },
                }
            }
            ControlCommand::ClearCache => {
                self.lifecycle.clear_all();
                self.metrics.reset();
                ack(cmd)
            }
        }
    }

    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics
            .snapshot(self.storage.as_ref(), self.clock.now())
    }

    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    pub fn clients_claimed(&self) -> bool {
        self.lifecycle.clients_claimed()
    }

    pub fn cache_names(&self) -> &CacheNames {
        &self.names
    }

    pub fn storage(&self) -> &Arc<dyn CacheStorage> {
        &self.storage
    }

    /// Swap in a new rule set; requests already in flight keep the old one.
    pub fn set_rules(&self, registry: StrategyRegistry) {
        self.registry.store(Arc::new(registry));
    }

    pub fn set_sweep(&self, sweep: SweepConfig) {
        self.sweep.store(Arc::new(sweep));
    }

    /// Wait for background revalidations started so far.
    pub async fn settle(&self) {
        self.executor.revalidations().drain().await;
    }
}

fn ack(cmd: ControlCommand) -> ControlReply {
    ControlReply::Ack {
        command: cmd.name().to_string(),
    }
}
