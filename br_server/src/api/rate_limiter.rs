//! Rate limiting for WebSocket client messages.
//!
//! Each connection gets a [`MessageLimiter`]: a short burst window and a
//! longer sustained window, both sliding. Submissions spawn interpreter
//! processes, so unthrottled clients could tie up the grader.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Sliding-window counter
#[derive(Debug)]
pub struct RateLimiter {
    timestamps: VecDeque<Instant>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    /// Allow `max_requests` within any `window`
    ///
    /// ```
    /// use br_server::api::rate_limiter::RateLimiter;
    /// use std::time::Duration;
    ///
    /// let mut limiter = RateLimiter::new(2, Duration::from_secs(1));
    /// assert!(limiter.check());
    /// assert!(limiter.check());
    /// assert!(!limiter.check());
    /// ```
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            timestamps: VecDeque::with_capacity(max_requests),
            max_requests,
            window,
        }
    }

    /// Record a request if allowed. Returns `false` when the limit is hit.
    pub fn check(&mut self) -> bool {
        self.check_at(Instant::now())
    }

    fn check_at(&mut self, now: Instant) -> bool {
        while let Some(ts) = self.timestamps.front() {
            if now.duration_since(*ts) > self.window {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }

        if self.timestamps.len() >= self.max_requests {
            return false;
        }

        self.timestamps.push_back(now);
        true
    }

    pub fn remaining(&self) -> usize {
        self.max_requests.saturating_sub(self.timestamps.len())
    }
}

/// Why a message was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Throttled {
    Burst,
    Sustained,
}

impl Throttled {
    pub fn message(self) -> &'static str {
        match self {
            Throttled::Burst => "Rate limit exceeded. Please slow down.",
            Throttled::Sustained => "Too many messages. Please wait before sending more.",
        }
    }
}

/// Burst (10 per second) and sustained (100 per minute) limits for one connection
#[derive(Debug)]
pub struct MessageLimiter {
    burst: RateLimiter,
    sustained: RateLimiter,
}

impl MessageLimiter {
    pub fn new(burst: RateLimiter, sustained: RateLimiter) -> Self {
        Self { burst, sustained }
    }

    pub fn check(&mut self) -> Result<(), Throttled> {
        if !self.burst.check() {
            return Err(Throttled::Burst);
        }
        if !self.sustained.check() {
            return Err(Throttled::Sustained);
        }
        Ok(())
    }
}

impl Default for MessageLimiter {
    fn default() -> Self {
        Self::new(
            RateLimiter::new(10, Duration::from_secs(1)),
            RateLimiter::new(100, Duration::from_secs(60)),
        )
    }
}
