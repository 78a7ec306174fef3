//! RAII handle for pooled pages.
//!
//! This module provides [`PageHandle`], which gives exclusive use of one
//! page and returns it to the pool when dropped.
//!
//! # Overview
//!
//! The handle implements the RAII pattern so a page is always released,
//! even if:
//! - Your code returns early
//! - An error occurs
//! - A panic happens
//!
//! # Usage Pattern
//!
//! ```rust,ignore
//! let mut page = pool.acquire().await?;
//!
//! // Page methods block, so run them on a blocking thread.
//! let tab = page.page();
//! let loaded = tokio::task::spawn_blocking(move || tab.load(url, timeout)).await;
//!
//! if loaded.is_err() {
//!     // Broken pages should not be handed to the next caller.
//!     page.discard();
//! }
//! // Page released (or removed) when `page` goes out of scope
//! ```

use std::sync::Arc;

use crate::pool::PagePoolInner;
use crate::traits::PageContent;

/// Exclusive lease on one pooled page.
///
/// Dereferences to [`PageContent`]. Use [`page()`](Self::page) to get an
/// owned reference that can be moved into `spawn_blocking`.
///
/// # Drop Behavior
///
/// Dropping the handle releases the page: it becomes idle again, or is
/// removed and closed if [`discard()`](Self::discard) was called or the
/// pool is shutting down. One waiter is woken either way.
pub struct PageHandle {
    /// Pool-assigned page id.
    id: u64,

    page: Arc<dyn PageContent>,

    /// Keeps the pool state alive so release works after the pool is dropped.
    pool: Arc<PagePoolInner>,

    /// Remove the page instead of returning it.
    discard: bool,
}

impl PageHandle {
    /// Called internally by [`PagePool::acquire()`](crate::PagePool::acquire).
    pub(crate) fn new(id: u64, page: Arc<dyn PageContent>, pool: Arc<PagePoolInner>) -> Self {
        Self {
            id,
            page,
            pool,
            discard: false,
        }
    }

    /// The page's pool-assigned id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Owned reference to the page, for use on a blocking thread.
    ///
    /// The lease is still held by this handle; do not keep the returned
    /// reference after dropping it.
    pub fn page(&self) -> Arc<dyn PageContent> {
        Arc::clone(&self.page)
    }

    /// Mark the page as broken so it is closed instead of reused.
    pub fn discard(&mut self) {
        self.discard = true;
    }

    /// Whether [`discard()`](Self::discard) was called.
    pub fn is_discarded(&self) -> bool {
        self.discard
    }
}

impl std::ops::Deref for PageHandle {
    type Target = dyn PageContent;

    fn deref(&self) -> &Self::Target {
        self.page.as_ref()
    }
}

impl Drop for PageHandle {
    fn drop(&mut self) {
        log::debug!(" PageHandle {} being dropped, releasing page...", self.id);
        self.pool.release_page(self.id, self.discard);
    }
}

impl std::fmt::Debug for PageHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageHandle")
            .field("id", &self.id)
            .field("discard", &self.discard)
            .finish()
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use crate::config::ResolverConfigBuilder;
    use crate::factory::mock::MockBrowserFactory;
    use crate::pool::PagePool;
    use std::time::Duration;

    /// Verifies that the handle derefs to the page and reports its id.
    #[tokio::test]
    async fn test_handle_deref_and_id() {
        let factory = MockBrowserFactory::new();
        let counters = factory.counters();
        let pool = PagePool::builder()
            .config(ResolverConfigBuilder::new().max_pages(1).build().unwrap())
            .factory(Box::new(factory))
            .build()
            .unwrap();

        let page = pool.acquire().await.unwrap();
        assert!(page.id() > 0);
        page.load("https://www.instagram.com/p/abc/", Duration::from_secs(1))
            .unwrap();
        assert_eq!(counters.loaded_urls().len(), 1);

        let debug_str = format!("{:?}", page);
        assert!(debug_str.contains("PageHandle"));
        assert!(!page.is_discarded());
    }

    /// Verifies that a handle outliving its pool still releases cleanly.
    #[tokio::test]
    async fn test_handle_outlives_pool() {
        let pool = PagePool::builder()
            .factory(Box::new(MockBrowserFactory::new()))
            .build()
            .unwrap();

        let page = pool.acquire().await.unwrap();
        drop(pool);
        drop(page);
    }
}
