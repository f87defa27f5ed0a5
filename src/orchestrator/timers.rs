use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

struct ScheduledTimer {
    generation: u64,
    handle: JoinHandle<()>,
}

/// Cancellable one-shot timers keyed by name, at most one per key.
///
/// Starting a timer for a key that already has one is a no-op. Cancelling
/// removes the entry before aborting the task, and a firing task only runs
/// its action if its own entry is still registered, so a cancelled timer can
/// never fire late.
#[derive(Default)]
pub struct TimerRegistry {
    timers: Arc<Mutex<HashMap<String, ScheduledTimer>>>,
    next_generation: Arc<AtomicU64>,
}

impl TimerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `action` after `after`. Returns `false` if `key` already has
    /// an outstanding timer.
    pub fn start<F>(&self, key: &str, after: Duration, action: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        let mut timers = self.timers.lock().unwrap_or_else(|e| e.into_inner());
        if timers.contains_key(key) {
            tracing::debug!("Timer {} already running", key);
            return false;
        }

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let registry = Arc::clone(&self.timers);
        let owned_key = key.to_string();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(after).await;

            let still_current = {
                let mut timers = registry.lock().unwrap_or_else(|e| e.into_inner());
                match timers.get(&owned_key) {
                    Some(timer) if timer.generation == generation => {
                        timers.remove(&owned_key);
                        true
                    }
                    _ => false,
                }
            };

            if still_current {
                tracing::info!("Timer {} expired", owned_key);
                action();
            }
        });

        timers.insert(key.to_string(), ScheduledTimer { generation, handle });
        tracing::info!("Timer {} started ({}s)", key, after.as_secs());
        true
    }

    /// Cancel the timer for `key`. Returns `true` if one was outstanding.
    pub fn cancel(&self, key: &str) -> bool {
        let removed = self
            .timers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key);

        match removed {
            Some(timer) => {
                timer.handle.abort();
                tracing::info!("Timer {} cancelled", key);
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&self) {
        let drained: Vec<_> = self
            .timers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain()
            .collect();

        for (key, timer) in drained {
            timer.handle.abort();
            tracing::info!("Timer {} cancelled", key);
        }
    }

    pub fn is_active(&self, key: &str) -> bool {
        self.timers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(key)
    }

    pub fn active_count(&self) -> usize {
        self.timers.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl Clone for TimerRegistry {
    fn clone(&self) -> Self {
        Self {
            timers: Arc::clone(&self.timers),
            next_generation: Arc::clone(&self.next_generation),
        }
    }
}
