use crate::config::{RuleConfig, WorkerConfig};
use crate::error::ConfigError;
use crate::fetch::RequestInfo;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    CacheFirst,
    NetworkFirst,
    StaleWhileRevalidate,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StrategyKind::CacheFirst => "cache-first",
            StrategyKind::NetworkFirst => "network-first",
            StrategyKind::StaleWhileRevalidate => "stale-while-revalidate",
        })
    }
}

/// Which of the three version-tagged caches a rule reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheCategory {
    Static,
    Dynamic,
    Images,
}

impl CacheCategory {
    pub const ALL: [CacheCategory; 3] = [
        CacheCategory::Static,
        CacheCategory::Dynamic,
        CacheCategory::Images,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CacheCategory::Static => "static",
            CacheCategory::Dynamic => "dynamic",
            CacheCategory::Images => "images",
        }
    }
}

#[derive(Debug, Clone)]
pub enum RuleMatcher {
    /// Regex over the request URL with query and fragment removed.
    Pattern(Regex),
    /// Any request whose origin differs from the worker's.
    CrossOrigin,
    /// Everything.
    Always,
}

#[derive(Debug, Clone)]
pub struct StrategyRule {
    pub name: String,
    pub matcher: RuleMatcher,
    pub kind: StrategyKind,
    pub max_age: Duration,
    pub category: CacheCategory,
}

impl StrategyRule {
    pub fn from_config(rule: &RuleConfig) -> Result<Self, ConfigError> {
        let matcher = match (&rule.pattern, rule.cross_origin) {
            (Some(pattern), _) => {
                let re = Regex::new(pattern).map_err(|source| ConfigError::InvalidPattern {
                    rule: rule.name.clone(),
                    source,
                })?;
                RuleMatcher::Pattern(re)
            }
            (None, true) => RuleMatcher::CrossOrigin,
            (None, false) => return Err(ConfigError::MissingMatcher(rule.name.clone())),
        };

        Ok(Self {
            name: rule.name.clone(),
            matcher,
            kind: rule.strategy,
            max_age: Duration::from_secs(rule.max_age_seconds),
            category: rule.cache,
        })
    }

    fn matches(&self, target: &str, cross_origin: bool) -> bool {
        match &self.matcher {
            RuleMatcher::Pattern(re) => re.is_match(target),
            RuleMatcher::CrossOrigin => cross_origin,
            RuleMatcher::Always => true,
        }
    }
}

/// Ordered rule list. First match wins; no match yields the default rule.
#[derive(Debug, Clone)]
pub struct StrategyRegistry {
    rules: Vec<StrategyRule>,
    default_rule: StrategyRule,
    origin: Url,
}

impl StrategyRegistry {
    pub fn new(rules: Vec<StrategyRule>, origin: Url) -> Self {
        Self {
            rules,
            default_rule: StrategyRule {
                name: "default".to_string(),
                matcher: RuleMatcher::Always,
                kind: StrategyKind::NetworkFirst,
                max_age: Duration::from_secs(60 * 60),
                category: CacheCategory::Dynamic,
            },
            origin,
        }
    }

    pub fn from_config(config: &WorkerConfig) -> Result<Self, ConfigError> {
        let origin = config.origin_url()?;
        let rules = config
            .rules
            .iter()
            .map(StrategyRule::from_config)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(rules, origin))
    }

    /// Pick the rule for a GET request.
    pub fn classify(&self, req: &RequestInfo) -> &StrategyRule {
        let mut target = req.url.clone();
        target.set_query(None);
        target.set_fragment(None);
        let cross_origin = req.url.origin() != self.origin.origin();

        self.rules
            .iter()
            .find(|rule| rule.matches(target.as_str(), cross_origin))
            .unwrap_or(&self.default_rule)
    }

    pub fn default_rule(&self) -> &StrategyRule {
        &self.default_rule
    }

    pub fn rules(&self) -> &[StrategyRule] {
        &self.rules
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }
}
