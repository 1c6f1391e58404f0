//! Per-client request rate limiting.
//!
//! Each client IP owns a `{count, window_start}` counter. A counter whose
//! window has elapsed is treated as reset, never incremented. Stale entries
//! are pruned lazily, at most once per window.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::config::RateLimitConfig;
use crate::observability::metrics;

struct WindowCounter {
    count: u32,
    window_start: Instant,
}

struct LimiterState {
    counters: HashMap<String, WindowCounter>,
    last_sweep: Instant,
    max_requests: u32,
    window: Duration,
    enabled: bool,
}

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { remaining: u32 },
    Limited { retry_after: Duration },
}

impl RateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateDecision::Allowed { .. })
    }
}

/// Process-local, best-effort rate limiter shared by all requests.
pub struct RateLimiter {
    state: Mutex<LimiterState>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            state: Mutex::new(LimiterState {
                counters: HashMap::new(),
                last_sweep: Instant::now(),
                max_requests: config.max_requests,
                window: Duration::from_secs(config.window_secs),
                enabled: config.enabled,
            }),
        }
    }

    /// Apply new limits. Existing counters are kept.
    pub fn reconfigure(&self, config: &RateLimitConfig) {
        let mut state = self.lock();
        state.max_requests = config.max_requests;
        state.window = Duration::from_secs(config.window_secs);
        state.enabled = config.enabled;
    }

    /// Count one request for `key` now.
    pub fn check(&self, key: &str) -> RateDecision {
        self.check_at(key, Instant::now())
    }

    /// Count one request for `key` at the given instant.
    pub fn check_at(&self, key: &str, now: Instant) -> RateDecision {
        let mut state = self.lock();
        if !state.enabled {
            return RateDecision::Allowed {
                remaining: state.max_requests,
            };
        }

        let window = state.window;
        let max_requests = state.max_requests;

        if now.saturating_duration_since(state.last_sweep) >= window {
            state
                .counters
                .retain(|_, c| now.saturating_duration_since(c.window_start) < window);
            state.last_sweep = now;
            metrics::record_rate_limiter_clients(state.counters.len());
        }

        let counter = state
            .counters
            .entry(key.to_string())
            .or_insert(WindowCounter {
                count: 0,
                window_start: now,
            });

        let elapsed = now.saturating_duration_since(counter.window_start);
        if elapsed >= window {
            counter.count = 0;
            counter.window_start = now;
        }

        if counter.count >= max_requests {
            let retry_after = window.saturating_sub(now.saturating_duration_since(counter.window_start));
            return RateDecision::Limited { retry_after };
        }

        counter.count += 1;
        RateDecision::Allowed {
            remaining: max_requests - counter.count,
        }
    }

    /// Number of tracked clients.
    pub fn tracked_clients(&self) -> usize {
        self.lock().counters.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LimiterState> {
        // Poisoning can only lose a single increment.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
