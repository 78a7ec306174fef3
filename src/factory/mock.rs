//! Mock browser factory for testing.
//!
//! This module provides a scripted implementation of [`BrowserFactory`]
//! whose processes open in-memory pages. Useful for testing pool and
//! orchestrator behavior without requiring Chrome to be installed.
//!
//! # Feature Flag
//!
//! This module is only available when:
//! - The `test-utils` feature is enabled, OR
//! - During testing (`#[cfg(test)]`)
//!
//! # Example
//!
//! ```rust,ignore
//! use media_resolver::factory::mock::MockBrowserFactory;
//!
//! // Factory whose pages report a thumbnail
//! let factory = MockBrowserFactory::new()
//!     .with_metadata(serde_json::json!({ "thumbnail": "https://cdn.example/a.jpg" }));
//!
//! // Factory that fails after N successful launches
//! let factory = MockBrowserFactory::fail_after_n(3, "Resource exhausted");
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::BrowserFactory;
use crate::error::{ResolverError, Result};
use crate::traits::{BrowserProcess, PageContent};

/// Counters and recordings shared by a factory and everything it creates.
#[derive(Default)]
struct MockState {
    creation_count: AtomicUsize,
    pages_opened: AtomicUsize,
    pages_closed: AtomicUsize,
    processes_closed: AtomicUsize,
    open_attempts: AtomicUsize,
    loaded_urls: Mutex<Vec<String>>,
}

/// Scripted behavior of the pages a mock process opens.
#[derive(Clone)]
struct PageScript {
    metadata: serde_json::Value,
    load_delay: Duration,
    load_error: Option<String>,
    open_error: Option<String>,
    /// Zero-based open attempt that fails, once.
    open_fails_at: Option<(usize, String)>,
}

impl Default for PageScript {
    fn default() -> Self {
        Self {
            metadata: serde_json::json!({}),
            load_delay: Duration::ZERO,
            load_error: None,
            open_error: None,
            open_fails_at: None,
        }
    }
}

/// Mock browser factory for testing without Chrome.
///
/// This factory can be configured to:
/// - Always fail launching with a specific error
/// - Fail after N successful launches
/// - Open pages that return fixed metadata, load slowly, or fail to load
/// - Track launches, opened pages and loaded URLs for verification
///
/// # Thread Safety
///
/// This factory is `Send + Sync` and tracks state using atomic operations.
///
/// # Example
///
/// ```rust,ignore
/// use media_resolver::factory::mock::MockBrowserFactory;
///
/// let factory = MockBrowserFactory::always_fails("Test error");
/// assert!(factory.create().is_err());
/// assert_eq!(factory.creation_count(), 1);
/// ```
pub struct MockBrowserFactory {
    /// Whether to fail on creation.
    should_fail: bool,

    /// Custom error message when failing.
    error_message: String,

    /// Optional: fail after this many successful creations.
    fail_after: Option<usize>,

    script: PageScript,

    state: Arc<MockState>,
}

impl MockBrowserFactory {
    /// Create a mock factory whose launches succeed.
    ///
    /// Pages load instantly and report empty metadata.
    pub fn new() -> Self {
        Self {
            should_fail: false,
            error_message: String::new(),
            fail_after: None,
            script: PageScript::default(),
            state: Arc::new(MockState::default()),
        }
    }

    /// Create a mock factory that always fails with the given message.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let factory = MockBrowserFactory::always_fails("Chrome not installed");
    /// assert!(factory.create().is_err());
    /// ```
    pub fn always_fails<S: Into<String>>(message: S) -> Self {
        Self {
            should_fail: true,
            error_message: message.into(),
            ..Self::new()
        }
    }

    /// Create a mock factory that fails after N successful creations.
    ///
    /// Useful for testing pool behavior when relaunching stops working.
    pub fn fail_after_n<S: Into<String>>(n: usize, message: S) -> Self {
        Self {
            error_message: message.into(),
            fail_after: Some(n),
            ..Self::new()
        }
    }

    /// Metadata returned by every page's `evaluate`.
    ///
    /// The value is handed back as a JSON string, the way the page
    /// metadata script serializes it.
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.script.metadata = metadata;
        self
    }

    /// Make every page load block for `delay`.
    pub fn with_load_delay(mut self, delay: Duration) -> Self {
        self.script.load_delay = delay;
        self
    }

    /// Make every page load fail with `message`.
    pub fn with_load_error<S: Into<String>>(mut self, message: S) -> Self {
        self.script.load_error = Some(message.into());
        self
    }

    /// Make processes launch but refuse to open pages.
    pub fn with_open_error<S: Into<String>>(mut self, message: S) -> Self {
        self.script.open_error = Some(message.into());
        self
    }

    /// Make only the `n`th page open (counting from zero, across all
    /// processes) fail with `message`.
    pub fn with_open_error_at<S: Into<String>>(mut self, n: usize, message: S) -> Self {
        self.script.open_fails_at = Some((n, message.into()));
        self
    }

    /// Get the number of launch attempts by this factory.
    pub fn creation_count(&self) -> usize {
        self.state.creation_count.load(Ordering::SeqCst)
    }

    /// Reset the creation counter to zero.
    pub fn reset_count(&self) {
        self.state.creation_count.store(0, Ordering::SeqCst);
    }

    /// Get a handle that keeps observing the factory after it has been
    /// moved into a pool.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let factory = MockBrowserFactory::new();
    /// let counters = factory.counters();
    ///
    /// let pool = PagePool::builder()
    ///     .factory(Box::new(factory))
    ///     .build()?;
    ///
    /// let _page = pool.acquire().await?;
    /// assert_eq!(counters.creation_count(), 1);
    /// ```
    pub fn counters(&self) -> MockCounters {
        MockCounters {
            state: Arc::clone(&self.state),
        }
    }
}

impl Default for MockBrowserFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl BrowserFactory for MockBrowserFactory {
    /// Launch a scripted process or return a mock error.
    ///
    /// # Errors
    ///
    /// Returns [`ResolverError::BrowserUnavailable`] when configured to fail.
    fn create(&self) -> Result<Box<dyn BrowserProcess>> {
        let count = self.state.creation_count.fetch_add(1, Ordering::SeqCst);

        if self.should_fail {
            log::debug!("MockBrowserFactory: Returning configured failure");
            return Err(ResolverError::BrowserUnavailable(
                self.error_message.clone(),
            ));
        }

        if let Some(fail_after) = self.fail_after {
            if count >= fail_after {
                log::debug!("MockBrowserFactory: Failing after {} creations", fail_after);
                return Err(ResolverError::BrowserUnavailable(
                    self.error_message.clone(),
                ));
            }
        }

        log::debug!("MockBrowserFactory: Launching mock process #{}", count + 1);
        Ok(Box::new(MockProcess {
            script: self.script.clone(),
            state: Arc::clone(&self.state),
        }))
    }
}

impl std::fmt::Debug for MockBrowserFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockBrowserFactory")
            .field("should_fail", &self.should_fail)
            .field("error_message", &self.error_message)
            .field("creation_count", &self.creation_count())
            .field("fail_after", &self.fail_after)
            .finish()
    }
}

/// Read-only view of a [`MockBrowserFactory`]'s counters.
#[derive(Clone)]
pub struct MockCounters {
    state: Arc<MockState>,
}

impl MockCounters {
    /// Launch attempts so far.
    pub fn creation_count(&self) -> usize {
        self.state.creation_count.load(Ordering::SeqCst)
    }

    /// Pages opened across all processes.
    pub fn pages_opened(&self) -> usize {
        self.state.pages_opened.load(Ordering::SeqCst)
    }

    /// Pages closed (discarded by the pool).
    pub fn pages_closed(&self) -> usize {
        self.state.pages_closed.load(Ordering::SeqCst)
    }

    /// Processes closed.
    pub fn processes_closed(&self) -> usize {
        self.state.processes_closed.load(Ordering::SeqCst)
    }

    /// URLs passed to `load`, in call order.
    pub fn loaded_urls(&self) -> Vec<String> {
        self.state
            .loaded_urls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

struct MockProcess {
    script: PageScript,
    state: Arc<MockState>,
}

impl BrowserProcess for MockProcess {
    fn open_page(&self) -> Result<Arc<dyn PageContent>> {
        let attempt = self.state.open_attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.script.open_error {
            return Err(ResolverError::BrowserUnavailable(message.clone()));
        }
        if let Some((n, message)) = &self.script.open_fails_at {
            if attempt == *n {
                return Err(ResolverError::BrowserUnavailable(message.clone()));
            }
        }
        self.state.pages_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MockPage {
            script: self.script.clone(),
            state: Arc::clone(&self.state),
        }))
    }

    fn close(&self) {
        self.state.processes_closed.fetch_add(1, Ordering::SeqCst);
    }
}

struct MockPage {
    script: PageScript,
    state: Arc<MockState>,
}

impl PageContent for MockPage {
    fn load(&self, url: &str, _timeout: Duration) -> Result<()> {
        self.state
            .loaded_urls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(url.to_string());

        if !self.script.load_delay.is_zero() {
            std::thread::sleep(self.script.load_delay);
        }

        match &self.script.load_error {
            Some(message) => Err(ResolverError::PageLoadFailed(message.clone())),
            None => Ok(()),
        }
    }

    fn evaluate(&self, _expression: &str) -> Result<Option<serde_json::Value>> {
        Ok(Some(serde_json::Value::String(
            self.script.metadata.to_string(),
        )))
    }

    fn close(&self) -> Result<()> {
        self.state.pages_closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// Verifies that always_fails factory returns error.
    #[test]
    fn test_mock_factory_always_fails() {
        let factory = MockBrowserFactory::always_fails("Test error");

        match factory.create() {
            Err(ResolverError::BrowserUnavailable(msg)) => {
                assert_eq!(msg, "Test error");
            }
            _ => panic!("Expected BrowserUnavailable error"),
        }
    }

    /// Verifies that creation_count tracks attempts and reset_count clears it.
    #[test]
    fn test_mock_factory_creation_count() {
        let factory = MockBrowserFactory::always_fails("Test");

        assert_eq!(factory.creation_count(), 0);
        let _ = factory.create();
        let _ = factory.create();
        assert_eq!(factory.creation_count(), 2);

        factory.reset_count();
        assert_eq!(factory.creation_count(), 0);
    }

    /// Verifies fail_after_n behavior.
    #[test]
    fn test_mock_factory_fail_after_n() {
        let factory = MockBrowserFactory::fail_after_n(2, "Exhausted");

        assert!(factory.create().is_ok());
        assert!(factory.create().is_ok());

        match factory.create() {
            Err(ResolverError::BrowserUnavailable(msg)) => assert_eq!(msg, "Exhausted"),
            _ => panic!("Expected third launch to fail"),
        }
        assert_eq!(factory.creation_count(), 3);
    }

    /// Verifies that pages return the scripted metadata and record loads.
    #[test]
    fn test_mock_page_script() {
        let factory = MockBrowserFactory::new()
            .with_metadata(serde_json::json!({ "title": "Hello" }));
        let counters = factory.counters();

        let process = factory.create().unwrap();
        let page = process.open_page().unwrap();
        page.load("https://www.instagram.com/p/abc/", Duration::from_secs(1))
            .unwrap();

        let value = page.evaluate("ignored").unwrap().unwrap();
        assert_eq!(value, serde_json::json!("{\"title\":\"Hello\"}"));
        assert_eq!(counters.pages_opened(), 1);
        assert_eq!(counters.loaded_urls(), vec!["https://www.instagram.com/p/abc/"]);
    }

    /// Verifies scripted load and open failures.
    #[test]
    fn test_mock_failures() {
        let process = MockBrowserFactory::new()
            .with_load_error("net::ERR_FAILED")
            .create()
            .unwrap();
        let page = process.open_page().unwrap();
        assert!(matches!(
            page.load("https://x", Duration::from_secs(1)),
            Err(ResolverError::PageLoadFailed(_))
        ));

        let process = MockBrowserFactory::new()
            .with_open_error("target crashed")
            .create()
            .unwrap();
        assert!(process.open_page().is_err());

        let process = MockBrowserFactory::new()
            .with_open_error_at(1, "target crashed")
            .create()
            .unwrap();
        assert!(process.open_page().is_ok());
        assert!(process.open_page().is_err());
        assert!(process.open_page().is_ok(), "Only the scripted attempt fails");
    }

    /// Verifies that scripted metadata round-trips through evaluate as the
    /// page script would serialize it.
    #[test]
    fn test_mock_thumbnail_metadata() {
        let page = MockBrowserFactory::new()
            .with_metadata(serde_json::json!({ "thumbnail": "https://cdn.example/a.jpg" }))
            .create()
            .unwrap()
            .open_page()
            .unwrap();

        let metadata =
            crate::content::PageMetadata::from_evaluation(page.evaluate("ignored").unwrap())
                .unwrap();
        assert_eq!(metadata.thumbnail.as_deref(), Some("https://cdn.example/a.jpg"));
    }

    /// Verifies Debug implementation.
    #[test]
    fn test_mock_factory_debug() {
        let factory = MockBrowserFactory::always_fails("Test");
        let debug_str = format!("{:?}", factory);

        assert!(debug_str.contains("MockBrowserFactory"));
        assert!(debug_str.contains("should_fail"));
        assert!(debug_str.contains("true"));
    }
}
