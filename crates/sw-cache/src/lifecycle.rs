use crate::clock::Clock;
use crate::config::CacheNames;
use crate::error::LifecycleError;
use crate::fallback;
use crate::fetch::{Fetcher, RequestInfo};
use crate::rules::CacheCategory;
use crate::store::{cache_key, CacheStorage};
use futures::future::join_all;
use http::Method;
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    Parsed,
    Installing,
    /// Installed and free to activate.
    Installed,
    /// Installed, held back until `SKIP_WAITING`.
    Waiting,
    Activating,
    Active,
    /// Install failed.
    Redundant,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LifecycleState::Parsed => "parsed",
            LifecycleState::Installing => "installing",
            LifecycleState::Installed => "installed",
            LifecycleState::Waiting => "waiting",
            LifecycleState::Activating => "activating",
            LifecycleState::Active => "active",
            LifecycleState::Redundant => "redundant",
        };
        f.write_str(s)
    }
}

/// Install / activate / sweep work. The host decides when each runs.
pub struct LifecycleManager {
    storage: Arc<dyn CacheStorage>,
    fetcher: Arc<dyn Fetcher>,
    clock: Arc<dyn Clock>,
    names: CacheNames,
    offline_url: Url,
    skip_waiting: bool,
    state: Mutex<LifecycleState>,
    clients_claimed: AtomicBool,
}

impl LifecycleManager {
    pub fn new(
        storage: Arc<dyn CacheStorage>,
        fetcher: Arc<dyn Fetcher>,
        clock: Arc<dyn Clock>,
        names: CacheNames,
        offline_url: Url,
        skip_waiting: bool,
    ) -> Self {
        Self {
            storage,
            fetcher,
            clock,
            names,
            offline_url,
            skip_waiting,
            state: Mutex::new(LifecycleState::Parsed),
            clients_claimed: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.lock()
    }

    fn set_state(&self, state: LifecycleState) {
        let mut current = self.state.lock();
        tracing::info!(from = %*current, to = %state, "lifecycle transition");
        *current = state;
    }

    pub fn clients_claimed(&self) -> bool {
        self.clients_claimed.load(Ordering::Relaxed)
    }

    pub fn offline_key(&self) -> String {
        cache_key(&Method::GET, &self.offline_url)
    }

    /// Pre-cache the shell and the offline page.
    ///
    /// All shell assets are fetched first; the static cache is only written
    /// once every one of them came back ok, so a failed install leaves no
    /// partial state behind. Returns the number of entries written.
    pub async fn install(&self, manifest: &[Url]) -> Result<usize, LifecycleError> {
        self.set_state(LifecycleState::Installing);

        let fetches = manifest.iter().map(|url| {
            let req = RequestInfo::get(url.clone());
            async move { (req.url.clone(), self.fetcher.fetch(&req).await) }
        });
        let results = join_all(fetches).await;

        let mut fetched = Vec::with_capacity(results.len());
        let mut failed = Vec::new();
        for (url, result) in results {
            match result {
                Ok(resp) if resp.is_ok() => fetched.push((url, resp)),
                Ok(resp) => {
                    tracing::warn!(url = %url, status = resp.status, "shell asset returned non-ok status");
                    failed.push(url.to_string());
                }
                Err(e) => {
                    tracing::warn!(url = %url, error = %e, "shell asset fetch failed");
                    failed.push(url.to_string());
                }
            }
        }

        if !failed.is_empty() {
            self.set_state(LifecycleState::Redundant);
            return Err(LifecycleError::InstallFailed { failed });
        }

        let now = self.clock.now();
        let cache = self.storage.open(&self.names.static_cache);
        let written = fetched.len() + 1;
        for (url, resp) in fetched {
            cache.put(cache_key(&Method::GET, &url), resp.stamped(now));
        }
        cache.put(self.offline_key(), fallback::offline_page().stamped(now));

        tracing::info!(
            cache = %self.names.static_cache,
            entries = written,
            "shell cached"
        );

        self.set_state(if self.skip_waiting {
            LifecycleState::Installed
        } else {
            LifecycleState::Waiting
        });
        Ok(written)
    }

    /// Move a waiting install on so it can activate. Returns whether anything
    /// changed.
    pub fn skip_waiting(&self) -> bool {
        let mut state = self.state.lock();
        if *state == LifecycleState::Waiting {
            tracing::info!("skip waiting requested");
            *state = LifecycleState::Installed;
            true
        } else {
            false
        }
    }

    /// Delete every cache that is not one of the current version's three,
    /// make sure those three exist, then claim open clients. Returns the
    /// deleted cache names.
    pub fn activate(&self) -> Result<Vec<String>, LifecycleError> {
        {
            let mut state = self.state.lock();
            if *state != LifecycleState::Installed {
                return Err(LifecycleError::InvalidTransition {
                    action: "activate",
                    state: state.to_string(),
                });
            }
            *state = LifecycleState::Activating;
        }

        let deleted: Vec<String> = self
            .storage
            .keys()
            .into_iter()
            .filter(|name| !self.names.is_current(name))
            .filter(|name| self.storage.delete(name))
            .collect();

        for name in &deleted {
            tracing::info!(cache = %name, "deleted cache from previous version");
        }
        for category in CacheCategory::ALL {
            self.storage.open(self.names.for_category(category));
        }

        self.set_state(LifecycleState::Active);
        self.clients_claimed.store(true, Ordering::Relaxed);
        Ok(deleted)
    }

    /// Evict every dated entry older than `max_age`, whatever wrote it.
    /// Undated entries are left alone. Returns the number evicted.
    pub fn sweep(&self, max_age: Duration) -> usize {
        let now = self.clock.now();
        let mut evicted = 0;

        for name in self.storage.keys() {
            let cache = self.storage.open(&name);
            for key in cache.keys() {
                let Some(entry) = cache.get(&key) else {
                    continue;
                };
                if entry.stored_at().is_some()
                    && entry.is_expired(now, max_age)
                    && cache.delete(&key)
                {
                    evicted += 1;
                }
            }
        }

        tracing::info!(evicted, max_age_secs = max_age.as_secs(), "cache sweep finished");
        evicted
    }

    /// Drop every cache. Returns how many there were.
    pub fn clear_all(&self) -> usize {
        let names = self.storage.keys();
        let count = names
            .iter()
            .filter(|name| self.storage.delete(name))
            .count();
        tracing::info!(caches = count, "all caches cleared");
        count
    }
}
