//! Statistics snapshots for monitoring and health checks.
//!
//! This module provides [`PoolStats`], [`QueueStats`] and the aggregate
//! [`ResolverStats`] served by the `/stats` endpoint.
//!
//! # Example
//!
//! ```rust,ignore
//! let stats = resolver.stats();
//! println!(
//!     "Pages in use: {}/{}, queued: {}",
//!     stats.pool.in_use, stats.pool.capacity, stats.queue.pending
//! );
//! ```

use serde::Serialize;

/// Snapshot of page pool statistics at a point in time.
///
/// # Fields
///
/// | Field | Description |
/// |-------|-------------|
/// | `available` | Idle pages ready for acquisition |
/// | `in_use` | Pages currently lent out |
/// | `total` | Pages owned by the pool (`available + in_use`) |
/// | `capacity` | Maximum pages (`max_pages`) |
/// | `browser_running` | Whether the browser process is up |
///
/// # Example
///
/// ```rust
/// use media_resolver::PoolStats;
///
/// let stats = PoolStats {
///     available: 0,
///     in_use: 5,
///     total: 5,
///     capacity: 5,
///     browser_running: true,
/// };
///
/// assert!(stats.is_saturated());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    /// Idle pages ready for acquisition.
    ///
    /// This value can change immediately after reading.
    pub available: usize,

    /// Pages currently lent out.
    ///
    /// Never exceeds `capacity`.
    pub in_use: usize,

    /// Pages owned by the pool, idle or lent out.
    pub total: usize,

    /// Configured maximum number of pages.
    pub capacity: usize,

    /// Whether a browser process is currently running.
    pub browser_running: bool,
}

impl PoolStats {
    /// Whether every page slot is lent out.
    ///
    /// ```rust
    /// use media_resolver::PoolStats;
    ///
    /// let stats = PoolStats { available: 0, in_use: 2, total: 2, capacity: 5, browser_running: true };
    /// assert!(!stats.is_saturated());
    /// ```
    #[inline]
    pub fn is_saturated(&self) -> bool {
        self.in_use >= self.capacity
    }

    /// Pages that could still be created before reaching capacity.
    #[inline]
    pub fn headroom(&self) -> usize {
        self.capacity.saturating_sub(self.total)
    }
}

/// Snapshot of request queue statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    /// Tasks waiting to start.
    pub pending: usize,

    /// Tasks currently executing. Never exceeds `concurrency`.
    pub in_flight: usize,

    /// Configured concurrency ceiling.
    pub concurrency: usize,
}

impl QueueStats {
    /// Whether new work would have to wait.
    #[inline]
    pub fn is_busy(&self) -> bool {
        self.in_flight >= self.concurrency
    }
}

/// Aggregate statistics of a resolver.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolverStats {
    /// Page pool state.
    pub pool: PoolStats,
    /// Request queue state.
    pub queue: QueueStats,
    /// Entries held by the result cache, fresh or stale.
    pub cached_entries: usize,
}

// ============================================================================
// Unit Tests
// ============================================================================
