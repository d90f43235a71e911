//! Run-scoped call counters.
//!
//! Some tools cap how often they may be called within one run (the web
//! search tool, for example). Instead of a process-wide static, each cap is a
//! [`CallCounter`] handed out by a [`RunCounters`] set. The agent owns the set
//! and resets it when a run ends; the terminate tool resets it too.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

/// A shared counter with an optional per-run limit.
///
/// Clones share the same underlying count.
#[derive(Debug, Clone)]
pub struct CallCounter {
    count: Arc<AtomicU32>,
    limit: Option<u32>,
}

impl CallCounter {
    pub fn new(limit: Option<u32>) -> Self {
        Self {
            count: Arc::new(AtomicU32::new(0)),
            limit,
        }
    }

    /// Record one call. Returns the new count, or `Err(limit)` when the
    /// limit is already reached (the count is left unchanged).
    pub fn try_acquire(&self) -> Result<u32, u32> {
        let result = self
            .count
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| match self.limit {
                Some(limit) if current >= limit => None,
                _ => Some(current + 1),
            });
        match result {
            Ok(previous) => Ok(previous + 1),
            Err(_) => Err(self.limit.unwrap_or(u32::MAX)),
        }
    }

    pub fn count(&self) -> u32 {
        self.count.load(Ordering::SeqCst)
    }

    pub fn limit(&self) -> Option<u32> {
        self.limit
    }

    pub fn reset(&self) {
        self.count.store(0, Ordering::SeqCst);
    }
}

/// A named set of counters that are reset together at run boundaries.
#[derive(Debug, Clone, Default)]
pub struct RunCounters {
    counters: Arc<Mutex<BTreeMap<String, CallCounter>>>,
}

impl RunCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the counter registered under `name`, creating it with `limit`
    /// if it does not exist yet.
    pub fn counter(&self, name: &str, limit: Option<u32>) -> CallCounter {
        let mut counters = self
            .counters
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        counters
            .entry(name.to_string())
            .or_insert_with(|| CallCounter::new(limit))
            .clone()
    }

    /// Current count for `name`, if registered.
    pub fn count(&self, name: &str) -> Option<u32> {
        let counters = self
            .counters
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        counters.get(name).map(CallCounter::count)
    }

    /// Reset every counter in the set to zero.
    pub fn reset_all(&self) {
        let counters = self
            .counters
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        for counter in counters.values() {
            counter.reset();
        }
        tracing::debug!(counters = counters.len(), "Reset run-scoped call counters");
    }
}
