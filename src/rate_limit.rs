//! Per-client request rate limiting.
//!
//! [`RateLimiter`] counts requests per client identity in a window that
//! starts with the client's first request and restarts once it has fully
//! elapsed. It is independent of the page pool.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tokio::time::Instant;

use crate::error::{ResolverError, Result};

/// Requests seen from one client in its current window.
struct RateWindow {
    count: u32,
    started_at: Instant,
}

struct LimiterState {
    windows: HashMap<String, RateWindow>,
    last_sweep: Instant,
}

/// Per-client request counter.
///
/// A window restarts with a count of one when more than `window` has passed
/// since it began; otherwise each request increments the count, and
/// requests beyond `max_requests` are rejected until the window restarts.
///
/// Stale windows are dropped by a sweep that runs during
/// [`check`](Self::check), at most once per window length.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use media_resolver::RateLimiter;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let limiter = RateLimiter::new(Duration::from_secs(60), 2);
///
/// assert!(limiter.check("10.0.0.1").is_ok());
/// assert!(limiter.check("10.0.0.1").is_ok());
/// assert!(limiter.check("10.0.0.1").is_err());
/// assert!(limiter.check("10.0.0.2").is_ok());
/// # }
/// ```
pub struct RateLimiter {
    window: Duration,
    max_requests: u32,
    state: Mutex<LimiterState>,
}

impl RateLimiter {
    /// Create a limiter allowing `max_requests` per `window` per client.
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            window,
            max_requests,
            state: Mutex::new(LimiterState {
                windows: HashMap::new(),
                last_sweep: Instant::now(),
            }),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, LimiterState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Record one request from `client` and decide whether it may proceed.
    ///
    /// # Errors
    ///
    /// Returns [`ResolverError::RateLimited`] carrying the whole seconds
    /// (at least one) until the client's window restarts.
    pub fn check(&self, client: &str) -> Result<()> {
        let now = Instant::now();
        let mut state = self.lock_state();

        if now.duration_since(state.last_sweep) >= self.window {
            let window = self.window;
            let before = state.windows.len();
            state
                .windows
                .retain(|_, w| now.duration_since(w.started_at) <= window);
            state.last_sweep = now;
            log::trace!(
                " Rate limiter sweep dropped {} stale windows",
                before - state.windows.len()
            );
        }

        let entry = state
            .windows
            .entry(client.to_string())
            .or_insert(RateWindow {
                count: 0,
                started_at: now,
            });

        let elapsed = now.duration_since(entry.started_at);
        if elapsed > self.window {
            entry.count = 1;
            entry.started_at = now;
            return Ok(());
        }

        entry.count = entry.count.saturating_add(1);
        if entry.count <= self.max_requests {
            return Ok(());
        }

        let remaining = self.window.saturating_sub(elapsed);
        let retry_after_secs = remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0);
        log::warn!(
            "⚠️ Rate limit exceeded for client {} ({} requests in window)",
            client,
            entry.count
        );

        Err(ResolverError::RateLimited {
            retry_after_secs: retry_after_secs.max(1),
        })
    }

    /// Number of clients with a window currently tracked.
    pub fn tracked_clients(&self) -> usize {
        self.lock_state().windows.len()
    }

    /// Requests allowed per window.
    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    /// Window length.
    pub fn window(&self) -> Duration {
        self.window
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("window", &self.window)
            .field("max_requests", &self.max_requests)
            .field("tracked_clients", &self.tracked_clients())
            .finish()
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
