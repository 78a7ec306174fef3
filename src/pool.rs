//! Bounded pool of browser pages over one shared browser process.
//!
//! This module provides [`PagePool`], which lends out at most `max_pages`
//! pages at a time, creating them lazily inside a single browser process
//! that is itself launched on first use.
//!
//! # Overview
//!
//! The page pool provides:
//! - **Lazy Launch**: The browser process starts on the first acquisition
//! - **Page Reuse**: Released pages go back to the idle set
//! - **Bounded Capacity**: Never more than `max_pages` pages exist
//! - **Async Waiting**: Callers wait on a notification, no polling
//! - **RAII Pattern**: Pages return to the pool when their handle drops
//! - **Graceful Shutdown**: Waiters are woken and rejected
//!
//! # Architecture
//!
//! ```text
//! PagePool
//!   └─ PagePoolInner (shared with every PageHandle)
//!       ├─ state: Mutex<PoolState>
//!       │   ├─ process: Option<Arc<dyn BrowserProcess>>
//!       │   ├─ pages: Vec<PooledPage>   (idle and lent out)
//!       │   ├─ pending: usize           (slots reserved for pages being opened)
//!       │   └─ generation: u64          (bumped whenever the process is dropped)
//!       ├─ launch_lock                  (one process launch at a time)
//!       └─ available: Notify            (wakes waiters on release/shutdown)
//! ```
//!
//! # Critical Invariants
//!
//! 1. `pages.len() + pending <= max_pages`, checked and updated under one lock
//! 2. A page is lent to at most one handle at a time
//! 3. The state lock is never held across I/O or `.await`
//! 4. Only pages of the current generation are pooled; older ones are
//!    closed when idle or on release
//!
//! # Example
//!
//! ```rust,no_run
//! use media_resolver::{PagePool, ResolverConfig, ChromeBrowserFactory};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = PagePool::builder()
//!         .config(ResolverConfig::default())
//!         .factory(Box::new(ChromeBrowserFactory::with_defaults()))
//!         .build()?;
//!
//!     {
//!         let page = pool.acquire().await?;
//!         // ... use page on a blocking thread ...
//!     } // page returned to pool automatically
//!
//!     pool.shutdown_async().await;
//!     Ok(())
//! }
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use tokio::sync::Notify;

use crate::config::ResolverConfig;
use crate::error::{ResolverError, Result};
use crate::factory::BrowserFactory;
use crate::handle::PageHandle;
use crate::stats::PoolStats;
use crate::traits::{BrowserProcess, PageContent};

// ============================================================================
// PagePoolInner
// ============================================================================

/// A page owned by the pool.
struct PooledPage {
    id: u64,
    page: Arc<dyn PageContent>,
    in_use: bool,
    created_at: Instant,
    /// Generation of the process that opened this page.
    generation: u64,
}

/// Mutable pool state, guarded by one mutex.
#[derive(Default)]
struct PoolState {
    process: Option<Arc<dyn BrowserProcess>>,
    pages: Vec<PooledPage>,
    /// Slots reserved by callers that are opening a page.
    pending: usize,
    generation: u64,
}

/// Outcome of one pass over the pool state.
enum Slot {
    Ready(u64, Arc<dyn PageContent>),
    Reserved,
    Full,
}

/// Internal shared state for the page pool.
///
/// Wrapped in `Arc` and shared between the pool and every outstanding
/// [`PageHandle`], so handles can release pages after the pool is gone.
pub(crate) struct PagePoolInner {
    /// Maximum number of pages.
    capacity: usize,

    /// Factory for launching the browser process.
    factory: Arc<dyn BrowserFactory>,

    state: Mutex<PoolState>,

    /// Serializes process launches.
    launch_lock: tokio::sync::Mutex<()>,

    /// Signalled when a page is released, a slot frees up, or shutdown begins.
    available: Notify,

    /// Atomic flag indicating shutdown in progress.
    shutting_down: AtomicBool,

    next_id: AtomicU64,

    /// Handle to tokio runtime for closing pages off the async threads.
    ///
    /// Captured at creation time so `Drop` impls can use it.
    runtime_handle: tokio::runtime::Handle,
}

impl PagePoolInner {
    /// Create the shared state.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime context.
    pub(crate) fn new(capacity: usize, factory: Box<dyn BrowserFactory>) -> Arc<Self> {
        log::info!(" Initializing page pool with capacity {}", capacity);

        Arc::new(Self {
            capacity,
            factory: Arc::from(factory),
            state: Mutex::new(PoolState::default()),
            launch_lock: tokio::sync::Mutex::new(()),
            available: Notify::new(),
            shutting_down: AtomicBool::new(false),
            next_id: AtomicU64::new(1),
            runtime_handle: tokio::runtime::Handle::current(),
        })
    }

    fn lock_state(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::Acquire)
    }

    /// Take an idle page, or reserve a slot for a new one.
    fn try_take(&self) -> Slot {
        let mut state = self.lock_state();

        if let Some(pooled) = state.pages.iter_mut().find(|p| !p.in_use) {
            pooled.in_use = true;
            return Slot::Ready(pooled.id, Arc::clone(&pooled.page));
        }

        if state.pages.len() + state.pending < self.capacity {
            state.pending += 1;
            return Slot::Reserved;
        }

        Slot::Full
    }

    /// Acquire a page, waiting while the pool is at capacity.
    ///
    /// # Errors
    ///
    /// - [`ResolverError::ShuttingDown`] if shutdown began before or while waiting.
    /// - [`ResolverError::BrowserUnavailable`] if the process or page could not be created.
    pub(crate) async fn acquire(self: &Arc<Self>) -> Result<PageHandle> {
        loop {
            if self.is_shutting_down() {
                return Err(ResolverError::ShuttingDown);
            }

            // Register before inspecting state so a release in between is not missed.
            let notified = self.available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.is_shutting_down() {
                return Err(ResolverError::ShuttingDown);
            }

            match self.try_take() {
                Slot::Ready(id, page) => {
                    log::debug!(" Reusing idle page {}", id);
                    return Ok(PageHandle::new(id, page, Arc::clone(self)));
                }
                Slot::Reserved => return self.create_page().await,
                Slot::Full => {
                    log::trace!(" Pool at capacity, waiting for a page");
                    notified.await;
                }
            }
        }
    }

    /// Open a page in the reserved slot.
    async fn create_page(self: &Arc<Self>) -> Result<PageHandle> {
        let mut reservation = Reservation {
            pool: self,
            armed: true,
        };

        let (process, generation) = self.ensure_process().await?;

        let opener = Arc::clone(&process);
        let opened = tokio::task::spawn_blocking(move || opener.open_page())
            .await
            .map_err(|e| {
                ResolverError::BrowserUnavailable(format!("page creation task failed: {}", e))
            })?;

        let page = match opened {
            Ok(page) => page,
            Err(e) => {
                log::warn!("⚠️ Failed to open page, dropping browser process: {}", e);
                self.discard_process(&process);
                return Err(unavailable(e));
            }
        };

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        {
            let mut state = self.lock_state();
            if self.is_shutting_down() {
                drop(state);
                self.close_page(page);
                return Err(ResolverError::ShuttingDown);
            }
            if state.generation != generation {
                drop(state);
                log::debug!(" Browser process dropped while opening page {}", id);
                self.close_page(page);
                return Err(ResolverError::BrowserUnavailable(
                    "browser process was restarted".to_string(),
                ));
            }
            state.pending -= 1;
            reservation.armed = false;
            state.pages.push(PooledPage {
                id,
                page: Arc::clone(&page),
                in_use: true,
                created_at: Instant::now(),
                generation,
            });
            log::debug!(
                " Created page {} ({}/{} pages)",
                id,
                state.pages.len(),
                self.capacity
            );
        }

        Ok(PageHandle::new(id, page, Arc::clone(self)))
    }

    /// Current process and its generation, if one is running.
    fn current_process(&self) -> Option<(Arc<dyn BrowserProcess>, u64)> {
        let state = self.lock_state();
        state
            .process
            .as_ref()
            .map(|process| (Arc::clone(process), state.generation))
    }

    /// Return the running process and its generation, launching it if needed.
    async fn ensure_process(&self) -> Result<(Arc<dyn BrowserProcess>, u64)> {
        if let Some(current) = self.current_process() {
            return Ok(current);
        }

        let _launch = self.launch_lock.lock().await;

        // Another caller may have launched while we waited.
        if let Some(current) = self.current_process() {
            return Ok(current);
        }
        if self.is_shutting_down() {
            return Err(ResolverError::ShuttingDown);
        }

        log::info!(" Launching browser process...");
        let factory = Arc::clone(&self.factory);
        let process: Arc<dyn BrowserProcess> = tokio::task::spawn_blocking(move || factory.create())
            .await
            .map_err(|e| ResolverError::BrowserUnavailable(format!("launch task failed: {}", e)))?
            .map_err(|e| {
                log::error!("❌ Browser launch failed: {}", e);
                unavailable(e)
            })?
            .into();

        let mut state = self.lock_state();
        if self.is_shutting_down() {
            drop(state);
            process.close();
            return Err(ResolverError::ShuttingDown);
        }
        state.process = Some(Arc::clone(&process));
        log::info!("✅ Browser process ready");

        Ok((process, state.generation))
    }

    /// Forget `process` if it is still current, so the next acquisition relaunches.
    ///
    /// Idle pages it opened are closed now. Lent ones are closed when released.
    fn discard_process(&self, process: &Arc<dyn BrowserProcess>) {
        let (removed, idle) = {
            let mut state = self.lock_state();
            let is_current = state
                .process
                .as_ref()
                .is_some_and(|current| Arc::ptr_eq(current, process));

            if is_current {
                let removed = state.process.take();
                state.generation += 1;
                let (idle, lent): (Vec<_>, Vec<_>) =
                    state.pages.drain(..).partition(|p| !p.in_use);
                state.pages = lent;
                (removed, idle)
            } else {
                (None, Vec::new())
            }
        };

        if !idle.is_empty() {
            log::debug!(" Closing {} idle pages of the dropped process", idle.len());
            self.available.notify_waiters();
        }
        for pooled in idle {
            self.close_page(pooled.page);
        }
        if let Some(process) = removed {
            self.runtime_handle.spawn_blocking(move || process.close());
        }
    }

    fn close_page(&self, page: Arc<dyn PageContent>) {
        self.runtime_handle.spawn_blocking(move || {
            if let Err(e) = page.close() {
                log::debug!(" Failed to close page: {}", e);
            }
        });
    }

    /// Release a page back to the pool, or remove it when `discard` is set.
    ///
    /// Unknown ids are ignored. Pages released during shutdown are closed.
    pub(crate) fn release_page(&self, id: u64, discard: bool) {
        let removed = {
            let mut state = self.lock_state();
            let Some(index) = state.pages.iter().position(|p| p.id == id) else {
                log::debug!(" Release of unknown page {} ignored", id);
                return;
            };

            let stale = state.pages[index].generation != state.generation;
            if discard || stale || self.is_shutting_down() {
                let pooled = state.pages.swap_remove(index);
                log::debug!(
                    " Removed page {} after {:?}",
                    pooled.id,
                    pooled.created_at.elapsed()
                );
                Some(pooled.page)
            } else {
                state.pages[index].in_use = false;
                log::debug!(" Page {} returned to pool", id);
                None
            }
        };

        if let Some(page) = removed {
            self.close_page(page);
        }

        self.available.notify_one();
    }

    pub(crate) fn stats(&self) -> PoolStats {
        let state = self.lock_state();
        let in_use = state.pages.iter().filter(|p| p.in_use).count();
        PoolStats {
            available: state.pages.len() - in_use,
            in_use,
            total: state.pages.len(),
            capacity: self.capacity,
            browser_running: state.process.is_some(),
        }
    }

    /// Set the shutdown flag, wake waiters and take what needs closing.
    ///
    /// Returns `None` when shutdown had already begun.
    fn begin_shutdown(&self) -> Option<ShutdownWork> {
        if self.shutting_down.swap(true, Ordering::AcqRel) {
            return None;
        }

        self.available.notify_waiters();

        let mut state = self.lock_state();
        let (idle, lent): (Vec<_>, Vec<_>) = state.pages.drain(..).partition(|p| !p.in_use);
        state.pages = lent;
        let idle = idle.into_iter().map(|p| p.page).collect();
        Some((state.process.take(), idle))
    }
}

/// The process and idle pages taken at shutdown.
type ShutdownWork = (Option<Arc<dyn BrowserProcess>>, Vec<Arc<dyn PageContent>>);

/// Frees a reserved slot unless the page was successfully added.
struct Reservation<'a> {
    pool: &'a PagePoolInner,
    armed: bool,
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if self.armed {
            {
                let mut state = self.pool.lock_state();
                state.pending = state.pending.saturating_sub(1);
            }
            self.pool.available.notify_one();
        }
    }
}

fn unavailable(e: ResolverError) -> ResolverError {
    match e {
        ResolverError::BrowserUnavailable(_) | ResolverError::ShuttingDown => e,
        other => ResolverError::BrowserUnavailable(other.to_string()),
    }
}

// ============================================================================
// PagePool
// ============================================================================

/// Bounded pool of browser pages.
///
/// Create one with [`PagePool::builder()`]. Dropping the pool shuts it down.
pub struct PagePool {
    inner: Arc<PagePoolInner>,
}

impl PagePool {
    /// Create a new builder.
    pub fn builder() -> PagePoolBuilder {
        PagePoolBuilder::new()
    }

    /// Acquire a page for exclusive use.
    ///
    /// Returns an idle page if there is one, otherwise opens a new page if
    /// the pool is below capacity (launching the browser process on first
    /// use), otherwise waits until a page is released.
    ///
    /// Waiters are woken in registration order, but a caller arriving just
    /// as a page is released may take it first.
    ///
    /// # Errors
    ///
    /// - [`ResolverError::ShuttingDown`] once shutdown has begun.
    /// - [`ResolverError::BrowserUnavailable`] if launching or opening fails.
    ///   The reserved slot is freed and one waiter is woken.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let page = pool.acquire().await?;
    /// let page_ref = page.page();
    /// tokio::task::spawn_blocking(move || page_ref.load(url, timeout)).await??;
    /// drop(page);
    /// ```
    pub async fn acquire(&self) -> Result<PageHandle> {
        self.inner.acquire().await
    }

    /// Release a page by id, as the handle's `Drop` does.
    ///
    /// Unknown ids are a no-op.
    pub fn release(&self, id: u64) {
        self.inner.release_page(id, false);
    }

    /// Get current pool statistics snapshot.
    pub fn stats(&self) -> PoolStats {
        self.inner.stats()
    }

    /// Whether shutdown has begun.
    pub fn is_shutting_down(&self) -> bool {
        self.inner.is_shutting_down()
    }

    /// Asynchronously shut down the pool.
    ///
    /// Wakes every waiter with [`ResolverError::ShuttingDown`], closes idle
    /// pages and the browser process off the async threads. Pages still lent
    /// out are closed when released. Idempotent.
    pub async fn shutdown_async(&self) {
        log::info!("Shutting down page pool (async mode)...");

        let Some((process, idle)) = self.inner.begin_shutdown() else {
            log::debug!(" Pool already shut down");
            return;
        };

        let closed = idle.len();
        let result = tokio::task::spawn_blocking(move || {
            for page in idle {
                let _ = page.close();
            }
            if let Some(process) = process {
                process.close();
            }
        })
        .await;

        if result.is_err() {
            log::error!("Page pool cleanup task panicked");
        }

        let stats = self.stats();
        log::info!(
            "Async shutdown complete - closed {} idle pages, {} still lent out",
            closed,
            stats.in_use
        );
    }

    /// Synchronously shut down the pool.
    ///
    /// Used by `Drop`. Prefer [`shutdown_async()`](Self::shutdown_async)
    /// from async code, since closing the process blocks.
    pub fn shutdown(&self) {
        log::info!("Shutting down page pool (sync mode)...");

        let Some((process, idle)) = self.inner.begin_shutdown() else {
            return;
        };

        for page in idle {
            let _ = page.close();
        }
        if let Some(process) = process {
            process.close();
        }
    }
}

impl Drop for PagePool {
    /// Shut down if that has not happened explicitly.
    fn drop(&mut self) {
        if !self.inner.is_shutting_down() {
            log::warn!(" PagePool dropped without explicit shutdown - cleaning up");
            self.shutdown();
        }
    }
}

impl std::fmt::Debug for PagePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PagePool")
            .field("stats", &self.stats())
            .field("shutting_down", &self.is_shutting_down())
            .finish()
    }
}

// ============================================================================
// PagePoolBuilder
// ============================================================================

/// Builder for constructing a [`PagePool`].
///
/// # Example
///
/// ```rust,ignore
/// use media_resolver::{PagePool, ResolverConfigBuilder, ChromeBrowserFactory};
///
/// let pool = PagePool::builder()
///     .config(ResolverConfigBuilder::new().max_pages(3).build()?)
///     .factory(Box::new(ChromeBrowserFactory::with_defaults()))
///     .build()?;
/// ```
pub struct PagePoolBuilder {
    /// Optional configuration (uses default if not provided).
    config: Option<ResolverConfig>,

    /// Browser factory (required).
    factory: Option<Box<dyn BrowserFactory>>,
}

impl PagePoolBuilder {
    /// Create a new builder with defaults.
    pub fn new() -> Self {
        Self {
            config: None,
            factory: None,
        }
    }

    /// Set the configuration; only `max_pages` is used by the pool.
    pub fn config(mut self, config: ResolverConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the browser factory (required).
    pub fn factory(mut self, factory: Box<dyn BrowserFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Build the pool. No browser is launched until the first acquisition.
    ///
    /// # Errors
    ///
    /// Returns [`ResolverError::Configuration`] if factory is not provided
    /// or capacity is zero.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime context.
    pub fn build(self) -> Result<PagePool> {
        let config = self.config.unwrap_or_default();
        let factory = self.factory.ok_or_else(|| {
            ResolverError::Configuration("No browser factory provided".to_string())
        })?;

        if config.max_pages == 0 {
            return Err(ResolverError::Configuration(
                "max_pages must be greater than 0".to_string(),
            ));
        }

        let inner = PagePoolInner::new(config.max_pages, factory);
        log::info!("✅ Page pool built successfully");

        Ok(PagePool { inner })
    }
}

impl Default for PagePoolBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResolverConfigBuilder;
    use crate::factory::mock::MockBrowserFactory;
    use std::time::Duration;

    fn pool_with(max_pages: usize, factory: MockBrowserFactory) -> PagePool {
        PagePool::builder()
            .config(ResolverConfigBuilder::new().max_pages(max_pages).build().unwrap())
            .factory(Box::new(factory))
            .build()
            .unwrap()
    }

    /// Verifies that PagePool builder rejects missing factory.
    #[tokio::test]
    async fn test_pool_builder_missing_factory() {
        let result = PagePool::builder().build();

        match result {
            Err(ResolverError::Configuration(msg)) => {
                assert!(
                    msg.contains("No browser factory provided"),
                    "Expected factory error, got: {}",
                    msg
                );
            }
            _ => panic!("Expected Configuration error for missing factory"),
        }
    }

    /// Verifies that PagePoolBuilder implements Default.
    #[test]
    fn test_builder_default() {
        let builder: PagePoolBuilder = Default::default();
        assert!(builder.config.is_none());
        assert!(builder.factory.is_none());
    }

    /// Verifies lazy launch and page reuse after release.
    #[tokio::test]
    async fn test_acquire_launches_once_and_reuses() {
        let factory = MockBrowserFactory::new();
        let counters = factory.counters();
        let pool = pool_with(2, factory);

        assert_eq!(counters.creation_count(), 0, "No launch before first acquire");
        assert!(!pool.stats().browser_running);

        let first_id = {
            let page = pool.acquire().await.unwrap();
            assert_eq!(pool.stats().in_use, 1);
            page.id()
        };

        let stats = pool.stats();
        assert_eq!(stats.in_use, 0);
        assert_eq!(stats.available, 1);
        assert!(stats.browser_running);

        let page = pool.acquire().await.unwrap();
        assert_eq!(page.id(), first_id, "Idle page should be reused");
        assert_eq!(counters.creation_count(), 1);
        assert_eq!(counters.pages_opened(), 1);
    }

    /// Verifies that a waiter gets the page released by another holder.
    #[tokio::test]
    async fn test_waiter_receives_released_page() {
        let pool = Arc::new(pool_with(1, MockBrowserFactory::new()));

        let held = pool.acquire().await.unwrap();
        let held_id = held.id();

        let waiter = {
            let pool = Arc::clone(&pool);
            tokio::spawn(async move { pool.acquire().await.map(|p| p.id()) })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished(), "Waiter must block at capacity");

        drop(held);

        let id = tokio::time::timeout(Duration::from_secs(2), waiter)
            .await
            .expect("waiter should be woken")
            .unwrap()
            .unwrap();
        assert_eq!(id, held_id);
    }

    /// Verifies that a failed launch frees the slot for the next caller.
    #[tokio::test]
    async fn test_launch_failure_frees_slot() {
        let factory = MockBrowserFactory::fail_after_n(0, "Chrome not installed");
        let counters = factory.counters();
        let pool = pool_with(1, factory);

        match pool.acquire().await {
            Err(ResolverError::BrowserUnavailable(msg)) => assert_eq!(msg, "Chrome not installed"),
            other => panic!("Expected BrowserUnavailable, got {:?}", other),
        }

        assert_eq!(pool.stats().total, 0);
        assert!(pool.acquire().await.is_err(), "Next acquire retries the launch");
        assert_eq!(counters.creation_count(), 2);
    }

    /// Verifies that an open failure drops the process so the next acquire relaunches.
    #[tokio::test]
    async fn test_open_failure_drops_process() {
        let factory = MockBrowserFactory::new().with_open_error("target crashed");
        let counters = factory.counters();
        let pool = pool_with(1, factory);

        assert!(matches!(
            pool.acquire().await,
            Err(ResolverError::BrowserUnavailable(_))
        ));
        assert!(!pool.stats().browser_running);

        let _ = pool.acquire().await;
        assert_eq!(counters.creation_count(), 2);
    }

    /// Verifies that a discarded page is removed and closed.
    #[tokio::test]
    async fn test_discard_removes_page() {
        let factory = MockBrowserFactory::new();
        let counters = factory.counters();
        let pool = pool_with(1, factory);

        let mut page = pool.acquire().await.unwrap();
        let old_id = page.id();
        page.discard();
        drop(page);

        assert_eq!(pool.stats().total, 0);

        let page = pool.acquire().await.unwrap();
        assert_ne!(page.id(), old_id);
        assert_eq!(counters.pages_opened(), 2);
    }

    /// Verifies that releasing an unknown id is a no-op.
    #[tokio::test]
    async fn test_release_unknown_id() {
        let pool = pool_with(1, MockBrowserFactory::new());
        let _page = pool.acquire().await.unwrap();

        pool.release(9999);

        assert_eq!(pool.stats().in_use, 1);
    }

    /// Verifies that shutdown rejects waiters and new acquisitions.
    #[tokio::test]
    async fn test_shutdown_wakes_waiters() {
        let factory = MockBrowserFactory::new();
        let counters = factory.counters();
        let pool = Arc::new(pool_with(1, factory));
        let held = pool.acquire().await.unwrap();

        let waiter = {
            let pool = Arc::clone(&pool);
            tokio::spawn(async move { pool.acquire().await.map(|p| p.id()) })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        pool.shutdown_async().await;
        pool.shutdown_async().await;

        let result = tokio::time::timeout(Duration::from_secs(2), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result, Err(ResolverError::ShuttingDown));
        assert!(matches!(
            pool.acquire().await,
            Err(ResolverError::ShuttingDown)
        ));
        assert_eq!(counters.processes_closed(), 1);

        drop(held);
        assert_eq!(pool.stats().total, 0, "Lent page is removed on release");
    }

    /// Verifies that pages of a dropped process are never handed out again
    /// and stop counting toward capacity.
    #[tokio::test]
    async fn test_dropped_process_pages_are_closed_on_release() {
        let factory = MockBrowserFactory::new().with_open_error_at(1, "target crashed");
        let counters = factory.counters();
        let pool = pool_with(2, factory);

        let first = pool.acquire().await.unwrap();
        let first_id = first.id();
        assert!(matches!(
            pool.acquire().await,
            Err(ResolverError::BrowserUnavailable(_))
        ));
        assert!(!pool.stats().browser_running);

        drop(first);

        let stats = pool.stats();
        assert_eq!(stats.total, 0, "Page of the dropped process is not pooled");
        assert_eq!(stats.available, 0);

        let page = pool.acquire().await.unwrap();
        assert_ne!(page.id(), first_id, "A fresh page replaces the stale one");
        assert_eq!(counters.creation_count(), 2, "Process relaunched");
        assert_eq!(pool.stats().total, 1);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(counters.pages_closed(), 1);
        assert_eq!(counters.processes_closed(), 1);
    }
}
