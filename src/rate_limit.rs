use dashmap::DashMap;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

// Sliding-window burst limiter, one window per identity.
//
// Purely in-memory: windows are rebuilt from empty on restart. This runs
// before the durable ledger so bursts are rejected without touching disk.
pub struct RateLimiter {
    windows: DashMap<String, VecDeque<Instant>>,
    limit: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            windows: DashMap::new(),
            limit,
            window,
        }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    // Identities with a live window, for the metrics gauge.
    pub fn tracked_identities(&self) -> usize {
        self.windows.len()
    }

    // Prune timestamps older than the window, then admit and record, or
    // reject without recording. The DashMap entry guard keeps the
    // prune+append atomic per identity.
    pub fn allow(&self, identity: &str) -> (bool, usize) {
        self.allow_at(identity, Instant::now())
    }

    fn allow_at(&self, identity: &str, now: Instant) -> (bool, usize) {
        let mut entry = self.windows.entry(identity.to_string()).or_default();

        while let Some(&front) = entry.front() {
            if now.duration_since(front) >= self.window {
                entry.pop_front();
            } else {
                break;
            }
        }

        if entry.len() >= self.limit as usize {
            return (false, entry.len());
        }

        entry.push_back(now);
        (true, entry.len())
    }
}

#[cfg(test)]
#[path = "rate_limit_test.rs"]
mod tests;
