//! Fixed-window admission control keyed by client identity.
//!
//! Counters live in a bounded map; once `max_tracked_identities` is reached the
//! least-recently-seen identity is evicted to make room.

use parking_lot::Mutex;
use std::{
    collections::{BTreeMap, HashMap},
    time::{Duration, Instant},
};

use crate::config::RateLimitSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    Rejected { retry_after: Duration },
}

#[derive(Debug, Clone, Copy)]
struct RateLimitWindow {
    count: u32,
    window_start: Instant,
    last_seen: u64,
}

#[derive(Debug, Default)]
struct Windows {
    by_identity: HashMap<String, RateLimitWindow>,
    /// Recency index: `last_seen` tick -> identity. Oldest tick is the eviction victim.
    recency: BTreeMap<u64, String>,
    tick: u64,
}

impl Windows {
    fn touch(&mut self, identity: &str) -> u64 {
        self.tick += 1;
        if let Some(window) = self.by_identity.get_mut(identity) {
            self.recency.remove(&window.last_seen);
            window.last_seen = self.tick;
        }
        self.recency.insert(self.tick, identity.to_string());
        self.tick
    }

    fn evict_oldest(&mut self) {
        if let Some((_, identity)) = self.recency.pop_first() {
            self.by_identity.remove(&identity);
            tracing::debug!(%identity, "evicted rate-limit window");
        }
    }
}

#[derive(Debug)]
pub struct RateLimiter {
    window: Duration,
    max_requests: u32,
    capacity: usize,
    windows: Mutex<Windows>,
}

impl RateLimiter {
    pub fn new(settings: &RateLimitSettings) -> Self {
        Self {
            window: Duration::from_secs(settings.window_secs),
            max_requests: settings.max_requests,
            capacity: settings.max_tracked_identities.max(1),
            windows: Mutex::new(Windows::default()),
        }
    }

    pub fn with_limits(window: Duration, max_requests: u32, capacity: usize) -> Self {
        Self {
            window,
            max_requests,
            capacity: capacity.max(1),
            windows: Mutex::new(Windows::default()),
        }
    }

    pub fn admit(&self, identity: &str) -> Admission {
        self.admit_at(identity, Instant::now())
    }

    /// Admission decision as of `now`. The whole read-modify-write happens under one
    /// lock, so concurrent callers for the same identity cannot exceed the quota.
    pub fn admit_at(&self, identity: &str, now: Instant) -> Admission {
        let mut windows = self.windows.lock();

        if !windows.by_identity.contains_key(identity) && windows.by_identity.len() >= self.capacity {
            windows.evict_oldest();
        }

        let tick = windows.touch(identity);
        let window = windows
            .by_identity
            .entry(identity.to_string())
            .or_insert(RateLimitWindow {
                count: 0,
                window_start: now,
                last_seen: tick,
            });

        let elapsed = now.saturating_duration_since(window.window_start);
        if elapsed >= self.window {
            window.count = 0;
            window.window_start = now;
        }

        window.count = window.count.saturating_add(1);
        if window.count > self.max_requests {
            let retry_after = self
                .window
                .saturating_sub(now.saturating_duration_since(window.window_start));
            Admission::Rejected { retry_after }
        } else {
            Admission::Allowed
        }
    }

    pub fn tracked_identities(&self) -> usize {
        self.windows.lock().by_identity.len()
    }
}
