//! Single-slot in-memory cache with a fixed freshness window
//!
//! Holds the most recently served value so repeated requests within the
//! window skip storage. The cache is per process: each instance keeps its
//! own copy and stale reads across processes are acceptable.
//!
//! Expiry is lazy. Nothing runs in the background; an expired entry is
//! dropped the first time `get` sees it.

use crate::cache::clock::{Clock, SystemClock};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

/// How long a cached value stays fresh
pub const FRESHNESS_WINDOW_HOURS: i64 = 24;

#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub data: T,
    /// When the entry was written
    pub timestamp: DateTime<Utc>,
}

/// Snapshot of the cache state for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheInfo {
    pub cached: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age_in_minutes: Option<i64>,
}

#[derive(Debug)]
pub struct EphemeralCache<T, C = SystemClock> {
    slot: Mutex<Option<CacheEntry<T>>>,
    window: Duration,
    clock: C,
}

impl<T: Clone> EphemeralCache<T, SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl<T: Clone> Default for EphemeralCache<T, SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone, C: Clock> EphemeralCache<T, C> {
    pub fn with_clock(clock: C) -> Self {
        Self {
            slot: Mutex::new(None),
            window: Duration::hours(FRESHNESS_WINDOW_HOURS),
            clock,
        }
    }

    /// Override the freshness window
    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    fn slot(&self) -> MutexGuard<'_, Option<CacheEntry<T>>> {
        // A panic while holding the lock cannot leave a half-written entry,
        // every write replaces the whole Option.
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Return the cached value if there is one and it is still fresh.
    ///
    /// An entry older than the window is cleared as a side effect.
    pub fn get(&self) -> Option<T> {
        let mut slot = self.slot();

        let Some(entry) = slot.as_ref() else {
            debug!("Cache empty");
            return None;
        };

        let age = self.clock.now() - entry.timestamp;
        let age_in_minutes = age.num_minutes().max(0);

        if age > self.window {
            info!(age_in_minutes, "Cached entry expired, clearing");
            *slot = None;
            return None;
        }

        debug!(age_in_minutes, "Returning cached entry");
        Some(entry.data.clone())
    }

    /// Store `value`, replacing whatever was there.
    pub fn set(&self, value: T) {
        let timestamp = self.clock.now();
        *self.slot() = Some(CacheEntry {
            data: value,
            timestamp,
        });

        let expires_at = (timestamp + self.window).to_rfc3339();
        info!(
            expires_at = %expires_at,
            window_hours = self.window.num_hours(),
            "Entry cached"
        );
    }

    pub fn clear(&self) {
        *self.slot() = None;
        info!("Cache cleared");
    }

    /// Report whether an entry is held and how old it is.
    ///
    /// Unlike `get`, this never evicts, so an expired entry that has not
    /// been read yet still shows up as cached.
    pub fn info(&self) -> CacheInfo {
        match self.slot().as_ref() {
            None => CacheInfo {
                cached: false,
                age_in_minutes: None,
            },
            Some(entry) => {
                let age = self.clock.now() - entry.timestamp;
                CacheInfo {
                    cached: true,
                    age_in_minutes: Some(age.num_minutes().max(0)),
                }
            }
        }
    }
}
