// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Client-side enforcement of a bank's [`RateLimitPolicy`].
//!
//! Fixed windows of one second (burst), one minute, one hour and one day.
//! A request is admitted only if every window has room; otherwise the caller
//! learns how long until the fullest window resets.

use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

use crate::banks::RateLimitPolicy;

#[derive(Debug)]
struct Window {
    length: Duration,
    /// 0 disables the window.
    limit: u32,
    started: Instant,
    count: u32,
}

impl Window {
    fn new(length: Duration, limit: u32, now: Instant) -> Self {
        Self {
            length,
            limit,
            started: now,
            count: 0,
        }
    }

    fn roll(&mut self, now: Instant) {
        if now.duration_since(self.started) >= self.length {
            self.started = now;
            self.count = 0;
        }
    }

    fn wait(&self, now: Instant) -> Option<Duration> {
        (self.limit > 0 && self.count >= self.limit)
            .then(|| (self.started + self.length).saturating_duration_since(now))
    }
}

#[derive(Debug)]
pub struct RateLimiter {
    windows: Mutex<[Window; 4]>,
}

impl RateLimiter {
    pub fn new(policy: &RateLimitPolicy) -> Self {
        let now = Instant::now();
        Self {
            windows: Mutex::new([
                Window::new(Duration::from_secs(1), policy.burst_limit, now),
                Window::new(Duration::from_secs(60), policy.requests_per_minute, now),
                Window::new(Duration::from_secs(3_600), policy.requests_per_hour, now),
                Window::new(Duration::from_secs(86_400), policy.requests_per_day, now),
            ]),
        }
    }

    /// Admit one request, or return the time until a slot frees up.
    pub fn try_acquire(&self) -> Result<(), Duration> {
        let now = Instant::now();
        // A poisoned limiter admits traffic; the bank still enforces its own limits.
        let Ok(mut windows) = self.windows.lock() else {
            return Ok(());
        };

        for window in windows.iter_mut() {
            window.roll(now);
        }
        if let Some(wait) = windows.iter().filter_map(|w| w.wait(now)).max() {
            return Err(wait);
        }
        for window in windows.iter_mut() {
            window.count += 1;
        }
        Ok(())
    }
}
