use crate::error::ConfigError;
use crate::rules::{CacheCategory, StrategyKind};
use serde::Deserialize;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WorkerConfig {
    /// Version tag baked into every cache name. Bumping it retires old caches
    /// on the next activation.
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "default_cache_prefix")]
    pub cache_prefix: String,
    /// Origin of the controlled pages; anything else is cross-origin.
    #[serde(default = "default_origin")]
    pub origin: String,
    #[serde(default = "default_skip_waiting")]
    pub skip_waiting: bool,
    #[serde(default)]
    pub sweep: SweepConfig,
    /// Shell assets cached at install, as paths relative to `origin`.
    #[serde(default = "default_shell")]
    pub shell: Vec<String>,
    /// Strategy rules in priority order.
    #[serde(default = "default_rules")]
    pub rules: Vec<RuleConfig>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SweepConfig {
    #[serde(default = "default_sweep_interval")]
    pub interval_seconds: u64,
    #[serde(default = "default_sweep_max_age")]
    pub max_age_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RuleConfig {
    pub name: String,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub cross_origin: bool,
    pub strategy: StrategyKind,
    pub max_age_seconds: u64,
    pub cache: CacheCategory,
}

/// The three current, version-tagged cache names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheNames {
    pub static_cache: String,
    pub dynamic: String,
    pub images: String,
}

impl CacheNames {
    pub fn new(prefix: &str, version: &str) -> Self {
        Self {
            static_cache: format!("{prefix}-static-{version}"),
            dynamic: format!("{prefix}-dynamic-{version}"),
            images: format!("{prefix}-images-{version}"),
        }
    }

    pub fn for_category(&self, category: CacheCategory) -> &str {
        match category {
            CacheCategory::Static => &self.static_cache,
            CacheCategory::Dynamic => &self.dynamic,
            CacheCategory::Images => &self.images,
        }
    }

    pub fn is_current(&self, name: &str) -> bool {
        CacheCategory::ALL
            .iter()
            .any(|c| self.for_category(*c) == name)
    }
}

impl WorkerConfig {
    pub fn cache_names(&self) -> CacheNames {
        CacheNames::new(&self.cache_prefix, &self.version)
    }

    pub fn origin_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.origin).map_err(|source| ConfigError::InvalidOrigin {
            origin: self.origin.clone(),
            source,
        })
    }

    /// Shell manifest resolved against the origin.
    pub fn shell_urls(&self) -> Result<Vec<Url>, ConfigError> {
        let origin = self.origin_url()?;
        self.shell
            .iter()
            .map(|path| {
                origin.join(path).map_err(|source| ConfigError::InvalidOrigin {
                    origin: path.clone(),
                    source,
                })
            })
            .collect()
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep.interval_seconds)
    }

    pub fn sweep_max_age(&self) -> Duration {
        Duration::from_secs(self.sweep.max_age_seconds)
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            cache_prefix: default_cache_prefix(),
            origin: default_origin(),
            skip_waiting: default_skip_waiting(),
            sweep: SweepConfig::default(),
            shell: default_shell(),
            rules: default_rules(),
        }
    }
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_sweep_interval(),
            max_age_seconds: default_sweep_max_age(),
        }
    }
}

const HOUR: u64 = 60 * 60;
const DAY: u64 = 24 * HOUR;

fn default_version() -> String {
    "v1".to_string()
}
fn default_cache_prefix() -> String {
    "drinkware".to_string()
}
fn default_origin() -> String {
    "http://localhost:8080".to_string()
}
fn default_skip_waiting() -> bool {
    true
}
fn default_sweep_interval() -> u64 {
    HOUR
}
fn default_sweep_max_age() -> u64 {
    DAY
}

fn default_shell() -> Vec<String> {
    [
        "/",
        "/index.html",
        "/assets/css/styles.css",
        "/assets/js/main.js",
        "/assets/js/animations.js",
        "/manifest.json",
        "/assets/icons/icon-192.png",
        "/assets/icons/icon-512.png",
        "/pages/about.html",
        "/pages/products.html",
        "/pages/contact.html",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn rule(
    name: &str,
    pattern: Option<&str>,
    strategy: StrategyKind,
    max_age_seconds: u64,
    cache: CacheCategory,
) -> RuleConfig {
    RuleConfig {
        name: name.to_string(),
        pattern: pattern.map(str::to_string),
        cross_origin: pattern.is_none(),
        strategy,
        max_age_seconds,
        cache,
    }
}

pub fn default_rules() -> Vec<RuleConfig> {
    vec![
        rule(
            "static",
            Some(r"\.(css|js|woff2?|ttf|eot)$"),
            StrategyKind::CacheFirst,
            7 * DAY,
            CacheCategory::Static,
        ),
        rule(
            "images",
            Some(r"\.(png|jpe?g|gif|svg|webp|avif|ico)$"),
            StrategyKind::CacheFirst,
            30 * DAY,
            CacheCategory::Images,
        ),
        rule(
            "pages",
            Some(r"(\.html|/)$"),
            StrategyKind::NetworkFirst,
            DAY,
            CacheCategory::Dynamic,
        ),
        rule(
            "api",
            Some(r"/api/"),
            StrategyKind::NetworkFirst,
            5 * 60,
            CacheCategory::Dynamic,
        ),
        rule(
            "external",
            None,
            StrategyKind::StaleWhileRevalidate,
            DAY,
            CacheCategory::Dynamic,
        ),
    ]
}
