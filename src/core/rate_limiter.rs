// src/core/rate_limiter.rs

//! Per-client sliding-window admission control.
//!
//! Each client key owns the timestamps of its admitted requests inside the
//! trailing window. The whole check-then-append happens under one lock, so
//! two racing requests for the same key cannot both see "under threshold".

use crate::core::clock::Clock;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

pub struct RateLimiter {
    window: Duration,
    max_requests: usize,
    clock: Arc<dyn Clock>,
    requests: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl RateLimiter {
    pub fn new(window: Duration, max_requests: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            window,
            max_requests,
            clock,
            requests: Mutex::new(HashMap::new()),
        }
    }

    /// Returns `true` and records the request if `client_key` is under its limit.
    pub fn admit(&self, client_key: &str) -> bool {
        self.try_admit(client_key).is_ok()
    }

    /// Like `admit`, but a rejection carries how long until the oldest
    /// request leaves the window. Rejections record nothing.
    pub fn try_admit(&self, client_key: &str) -> Result<(), Duration> {
        let now = self.clock.now();
        let mut requests = self.requests.lock().unwrap_or_else(|e| e.into_inner());
        self.forget_idle(&mut requests, now);
        let timestamps = requests.entry(client_key.to_string()).or_default();

        while let Some(oldest) = timestamps.front() {
            if now.duration_since(*oldest) >= self.window {
                timestamps.pop_front();
            } else {
                break;
            }
        }

        if timestamps.len() >= self.max_requests {
            if timestamps.is_empty() {
                requests.remove(client_key);
                return Err(self.window);
            }
            let retry_after = timestamps
                .front()
                .map(|oldest| self.window.saturating_sub(now.duration_since(*oldest)))
                .unwrap_or(self.window);
            warn!(client = client_key, retry_after_ms = %retry_after.as_millis(), "Rate limit exceeded.");
            return Err(retry_after);
        }

        timestamps.push_back(now);
        debug!(client = client_key, in_window = timestamps.len(), "Request admitted.");
        Ok(())
    }

    /// Number of client keys with a request inside the window.
    pub fn tracked_clients(&self) -> usize {
        let mut requests = self.requests.lock().unwrap_or_else(|e| e.into_inner());
        self.forget_idle(&mut requests, self.clock.now());
        requests.len()
    }

    /// Drops keys whose newest request already left the window.
    fn forget_idle(&self, requests: &mut HashMap<String, VecDeque<Instant>>, now: Instant) {
        let before = requests.len();
        requests.retain(|_, timestamps| {
            timestamps
                .back()
                .is_some_and(|newest| now.duration_since(*newest) < self.window)
        });
        if requests.len() < before {
            debug!(dropped = before - requests.len(), "Forgot idle clients.");
        }
    }
}
