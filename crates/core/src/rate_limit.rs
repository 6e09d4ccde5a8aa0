//! Per-client request throttling.
//!
//! Process-local and best-effort: counts are lost on restart and are not
//! shared between instances.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::warn;

/// Number of tracked clients above which expired windows are swept. Sweeps
/// run at most once per window, so a table full of live clients is not
/// rescanned on every request.
const PRUNE_THRESHOLD: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allow,
    /// Rejected; the client may retry after this long (never more than the window).
    Deny { retry_after: Duration },
}

pub trait RateLimiter: Send + Sync {
    fn check(&self, client_id: &str) -> RateDecision;
}

#[derive(Debug, Clone, Copy)]
struct WindowRecord {
    count: u32,
    resets_at: Instant,
}

#[derive(Debug, Default)]
struct HitTable {
    records: HashMap<String, WindowRecord>,
    last_sweep: Option<Instant>,
}

impl HitTable {
    fn sweep_due(&self, now: Instant, window: Duration) -> bool {
        self.records.len() > PRUNE_THRESHOLD
            && self
                .last_sweep
                .is_none_or(|last| now.saturating_duration_since(last) >= window)
    }
}

/// Fixed window per client that starts on the client's first request.
#[derive(Debug)]
pub struct FixedWindowRateLimiter {
    window: Duration,
    max_requests: u32,
    hits: Mutex<HitTable>,
}

impl FixedWindowRateLimiter {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            window,
            max_requests,
            hits: Mutex::new(HitTable::default()),
        }
    }

    /// [`RateLimiter::check`] against an explicit clock reading.
    pub fn check_at(&self, client_id: &str, now: Instant) -> RateDecision {
        let mut hits = match self.hits.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("Rate limiter lock was poisoned; continuing with recovered state");
                poisoned.into_inner()
            }
        };

        if hits.sweep_due(now, self.window) {
            hits.records.retain(|_, record| now <= record.resets_at);
            hits.last_sweep = Some(now);
        }

        if let Some(record) = hits
            .records
            .get_mut(client_id)
            .filter(|record| now <= record.resets_at)
        {
            record.count = record.count.saturating_add(1);
            if record.count > self.max_requests {
                return RateDecision::Deny {
                    retry_after: record.resets_at.saturating_duration_since(now),
                };
            }
            return RateDecision::Allow;
        }

        hits.records.insert(
            client_id.to_string(),
            WindowRecord {
                count: 1,
                resets_at: now + self.window,
            },
        );
        RateDecision::Allow
    }

    #[cfg(test)]
    fn tracked_clients(&self) -> usize {
        self.hits
            .lock()
            .map(|hits| hits.records.len())
            .unwrap_or_default()
    }
}

impl RateLimiter for FixedWindowRateLimiter {
    fn check(&self, client_id: &str) -> RateDecision {
        self.check_at(client_id, Instant::now())
    }
}
