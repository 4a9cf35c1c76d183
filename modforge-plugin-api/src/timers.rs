//! Host-bound timers
//!
//! Plugins never get ambient timer primitives; they get a [`Timers`] handle
//! whose tasks run on the host runtime and are all cancelled when the host
//! unloads the plugin.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Identifier returned by `set_timeout`/`set_interval`.
pub type TimerId = u64;

#[derive(Default)]
struct TimerTable {
    active: HashMap<TimerId, CancellationToken>,
}

/// Timer handle bound to the host runtime.
///
/// Cloning shares the underlying table, so the host keeps one clone per
/// plugin and can cancel everything on unload.
#[derive(Clone)]
pub struct Timers {
    next_id: Arc<AtomicU64>,
    table: Arc<Mutex<TimerTable>>,
}

impl Timers {
    /// Create an empty timer table.
    pub fn new() -> Self {
        Self {
            next_id: Arc::new(AtomicU64::new(1)),
            table: Arc::new(Mutex::new(TimerTable::default())),
        }
    }

    fn register(&self) -> (TimerId, CancellationToken) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        if let Ok(mut table) = self.table.lock() {
            table.active.insert(id, token.clone());
        }
        (id, token)
    }

    fn deregister(table: &Arc<Mutex<TimerTable>>, id: TimerId) {
        if let Ok(mut table) = table.lock() {
            table.active.remove(&id);
        }
    }

    /// Run `f` once after `delay`.
    pub fn set_timeout<F>(&self, delay: Duration, f: F) -> TimerId
    where
        F: FnOnce() + Send + 'static,
    {
        let (id, token) = self.register();
        let table = self.table.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => f(),
            }
            Self::deregister(&table, id);
        });
        id
    }

    /// Cancel a pending timeout. No-op if it already fired or was cancelled.
    pub fn clear_timeout(&self, id: TimerId) {
        self.cancel(id);
    }

    /// Run `f` every `period` until cleared.
    pub fn set_interval<F>(&self, period: Duration, f: F) -> TimerId
    where
        F: Fn() + Send + Sync + 'static,
    {
        let (id, token) = self.register();
        let table = self.table.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // the first tick of tokio's interval fires immediately
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => f(),
                }
            }
            Self::deregister(&table, id);
        });
        id
    }

    /// Cancel a running interval.
    pub fn clear_interval(&self, id: TimerId) {
        self.cancel(id);
    }

    fn cancel(&self, id: TimerId) {
        if let Ok(table) = self.table.lock() {
            if let Some(token) = table.active.get(&id) {
                token.cancel();
            }
        }
    }

    /// Cancel every timer owned by this handle. Called by the host on unload.
    pub fn cancel_all(&self) {
        if let Ok(mut table) = self.table.lock() {
            for (_, token) in table.active.drain() {
                token.cancel();
            }
        }
    }

    /// Number of timers currently scheduled.
    pub fn active_count(&self) -> usize {
        self.table.lock().map(|t| t.active.len()).unwrap_or(0)
    }
}

impl Default for Timers {
    fn default() -> Self {
        Self::new()
    }
}
