use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use tokio::task::JoinHandle;

/// Background revalidations in flight, keyed by cache key.
///
/// A second revalidation for a key that is still running is coalesced into
/// the first. Finished handles are pruned on every `spawn`, so the map holds
/// at most the running tasks plus those finished since the last call.
#[derive(Default)]
pub struct RevalidationRegistry {
    tasks: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl RevalidationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start `task` in the background unless one is already running for `key`.
    /// Returns whether a new task was started.
    pub fn spawn<F>(&self, key: &str, task: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut tasks = self.tasks.lock();
        tasks.retain(|_, handle| !handle.is_finished());
        if let Some(existing) = tasks.get(key) {
            if !existing.is_finished() {
                tracing::debug!(key, "revalidation already in flight, coalescing");
                return false;
            }
        }
        tasks.insert(key.to_string(), tokio::spawn(task));
        true
    }

    /// Number of revalidations still running.
    pub fn in_flight(&self) -> usize {
        self.tasks
            .lock()
            .values()
            .filter(|h| !h.is_finished())
            .count()
    }

    /// Number of handles still held, running or not.
    pub fn tracked(&self) -> usize {
        self.tasks.lock().len()
    }

    /// Wait for every tracked revalidation to finish.
    pub async fn drain(&self) {
        loop {
            let handles: Vec<JoinHandle<()>> = {
                let mut tasks = self.tasks.lock();
                tasks.drain().map(|(_, h)| h).collect()
            };
            if handles.is_empty() {
                break;
            }
            for handle in handles {
                if let Err(e) = handle.await {
                    tracing::warn!(error = %e, "revalidation task panicked");
                }
            }
        }
    }
}
