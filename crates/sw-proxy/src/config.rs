use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use sw_cache::config::WorkerConfig;
use sw_cache::rules::StrategyRegistry;
use sw_cache::ServiceWorker;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    #[serde(default = "default_control_addr")]
    pub control_addr: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UpstreamConfig {
    pub url: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    pub fn default_config() -> Self {
        Config {
            server: ServerConfig::default(),
            upstream: UpstreamConfig {
                url: "http://127.0.0.1:3000".to_string(),
                timeout_ms: default_timeout_ms(),
            },
            worker: WorkerConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            control_addr: default_control_addr(),
        }
    }
}

/// Compare old and new config, apply safe changes, reject unsafe ones.
///
/// - Rules changed → recompiled and swapped in (cached entries kept)
/// - Sweep settings changed → applied from the next sweep on
/// - Version, cache prefix, origin or shell changed → WARN log, ignore (restart required)
/// - Listen addresses or upstream changed → WARN log, ignore (restart required)
pub fn diff_and_apply(old: &Config, new: &Config, worker: &ServiceWorker) {
    if old.worker.rules != new.worker.rules {
        match StrategyRegistry::from_config(&new.worker) {
            Ok(registry) => {
                let rules = registry.rules().len();
                worker.set_rules(registry);
                tracing::info!(rules, "config reloaded: strategy rules replaced");
            }
            Err(e) => {
                tracing::error!(error = %e, "config reload rejected: keeping previous rules");
            }
        }
    }

    if old.worker.sweep != new.worker.sweep {
        worker.set_sweep(new.worker.sweep.clone());
        tracing::info!(
            interval_seconds = new.worker.sweep.interval_seconds,
            max_age_seconds = new.worker.sweep.max_age_seconds,
            "config reloaded: sweep settings changed"
        );
    }

    if old.worker.version != new.worker.version
        || old.worker.cache_prefix != new.worker.cache_prefix
        || old.worker.origin != new.worker.origin
        || old.worker.shell != new.worker.shell
    {
        tracing::warn!(
            old_version = %old.worker.version,
            new_version = %new.worker.version,
            "worker identity change detected, ignoring. Restart to install the new version"
        );
    }

    if old.server != new.server || old.upstream != new.upstream {
        tracing::warn!("server or upstream change detected, ignoring. Restart to apply");
    }
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}
fn default_control_addr() -> String {
    "0.0.0.0:9090".to_string()
}
fn default_timeout_ms() -> u64 {
    5000
}
