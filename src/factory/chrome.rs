//! Chrome/Chromium browser factory implementation.
//!
//! This module provides [`ChromeBrowserFactory`] for launching a headless
//! Chrome process, plus the [`ChromeProcess`] and [`ChromePage`] adapters
//! the page pool works with.
//!
//! # Overview
//!
//! The factory handles:
//! - Chrome binary path detection (or custom path)
//! - Launch options configuration
//! - Per-page user agent and resource blocking
//!
//! # Resource Blocking
//!
//! Every opened page intercepts requests and fails images, stylesheets,
//! fonts and media with `BlockedByClient`. Only the document and scripts
//! are needed to read page metadata.
//!
//! # Example
//!
//! ```rust,ignore
//! use media_resolver::ChromeBrowserFactory;
//!
//! // Auto-detect Chrome installation
//! let factory = ChromeBrowserFactory::with_defaults();
//!
//! // Or specify custom path
//! let factory = ChromeBrowserFactory::with_path("/usr/bin/google-chrome".to_string());
//! ```

use std::sync::{Arc, Mutex};
use std::time::Duration;

use headless_chrome::browser::tab::RequestPausedDecision;
use headless_chrome::browser::transport::{SessionId, Transport};
use headless_chrome::protocol::cdp::Fetch::events::RequestPausedEvent;
use headless_chrome::protocol::cdp::Fetch::{FailRequest, RequestPattern, RequestStage};
use headless_chrome::protocol::cdp::Network::{ErrorReason, ResourceType};
use headless_chrome::{Browser, LaunchOptions, Tab};

use super::BrowserFactory;
use crate::config::DEFAULT_USER_AGENT;
use crate::error::{ResolverError, Result};
use crate::traits::{BrowserProcess, PageContent};

/// Keeps the CDP connection open while the pool sits idle.
const IDLE_BROWSER_TIMEOUT: Duration = Duration::from_secs(3600);

/// Factory for launching Chrome/Chromium processes.
///
/// # Thread Safety
///
/// This factory is `Send + Sync` and can be safely shared across threads.
///
/// # Example
///
/// ```rust,ignore
/// use media_resolver::ChromeBrowserFactory;
///
/// let factory = ChromeBrowserFactory::with_defaults()
///     .user_agent("Mozilla/5.0 ...");
/// ```
pub struct ChromeBrowserFactory {
    /// Function that generates launch options for each launch.
    launch_options_fn: Box<dyn Fn() -> Result<LaunchOptions<'static>> + Send + Sync>,

    /// User agent applied to every opened page.
    user_agent: String,

    /// Whether pages fail requests for heavy resources.
    block_resources: bool,
}

impl ChromeBrowserFactory {
    /// Create factory with custom launch options function.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// use media_resolver::{ChromeBrowserFactory, ResolverError, create_chrome_options};
    ///
    /// let factory = ChromeBrowserFactory::new(|| {
    ///     create_chrome_options(Some("/custom/path"))
    ///         .map_err(|e| ResolverError::Configuration(e.to_string()))
    /// });
    /// ```
    pub fn new<F>(launch_options_fn: F) -> Self
    where
        F: Fn() -> Result<LaunchOptions<'static>> + Send + Sync + 'static,
    {
        Self {
            launch_options_fn: Box::new(launch_options_fn),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            block_resources: true,
        }
    }

    /// Create factory with auto-detected Chrome path.
    ///
    /// Lets headless_chrome search the usual install locations on Linux,
    /// macOS and Windows.
    pub fn with_defaults() -> Self {
        log::debug!(" Creating ChromeBrowserFactory with auto-detect");
        Self::new(|| {
            create_chrome_options(None).map_err(|e| ResolverError::Configuration(e.to_string()))
        })
    }

    /// Create factory with custom Chrome binary path.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// use media_resolver::ChromeBrowserFactory;
    ///
    /// let factory = ChromeBrowserFactory::with_path("/usr/bin/chromium".to_string());
    /// ```
    pub fn with_path(chrome_path: String) -> Self {
        log::debug!(
            " Creating ChromeBrowserFactory with custom path: {}",
            chrome_path
        );
        Self::new(move || {
            create_chrome_options(Some(&chrome_path))
                .map_err(|e| ResolverError::Configuration(e.to_string()))
        })
    }

    /// Set the user agent applied to every opened page.
    pub fn user_agent<S: Into<String>>(mut self, user_agent: S) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Enable or disable blocking of images, stylesheets, fonts and media.
    ///
    /// Enabled by default.
    pub fn block_resources(mut self, block: bool) -> Self {
        self.block_resources = block;
        self
    }
}

impl BrowserFactory for ChromeBrowserFactory {
    /// Launch a new Chrome process.
    ///
    /// # Errors
    ///
    /// * Returns [`ResolverError::Configuration`] if launch options generation fails.
    /// * Returns [`ResolverError::BrowserUnavailable`] if Chrome fails to launch.
    fn create(&self) -> Result<Box<dyn BrowserProcess>> {
        log::trace!(" ChromeBrowserFactory::create() called");

        let options = (self.launch_options_fn)()?;

        log::debug!(" Launching Chrome browser...");
        let browser = Browser::new(options).map_err(|e| {
            log::error!("❌ Chrome launch failed: {}", e);
            ResolverError::BrowserUnavailable(e.to_string())
        })?;

        Ok(Box::new(ChromeProcess {
            browser: Mutex::new(Some(browser)),
            user_agent: self.user_agent.clone(),
            block_resources: self.block_resources,
        }))
    }
}

/// A running Chrome process.
///
/// Dropping the inner [`Browser`] terminates the process, so
/// [`close`](BrowserProcess::close) takes it out of the mutex.
pub struct ChromeProcess {
    browser: Mutex<Option<Browser>>,
    user_agent: String,
    block_resources: bool,
}

impl BrowserProcess for ChromeProcess {
    fn open_page(&self) -> Result<Arc<dyn PageContent>> {
        let tab = {
            let guard = self.browser.lock().unwrap_or_else(|e| e.into_inner());
            let browser = guard
                .as_ref()
                .ok_or_else(|| ResolverError::BrowserUnavailable("browser closed".to_string()))?;
            browser
                .new_tab()
                .map_err(|e| ResolverError::BrowserUnavailable(e.to_string()))?
        };

        tab.set_user_agent(&self.user_agent, None, None)
            .map_err(|e| ResolverError::BrowserUnavailable(e.to_string()))?;

        if self.block_resources {
            block_heavy_resources(&tab)
                .map_err(|e| ResolverError::BrowserUnavailable(e.to_string()))?;
        }

        log::debug!(" Opened Chrome tab {}", tab.get_target_id());
        Ok(Arc::new(ChromePage { tab }))
    }

    fn close(&self) {
        let browser = self
            .browser
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if browser.is_some() {
            log::info!(" Closing Chrome process");
        }
        drop(browser);
    }
}

impl Drop for ChromeProcess {
    fn drop(&mut self) {
        self.close();
    }
}

/// Whether a request for this resource type should be failed.
fn is_blocked_resource(resource: &ResourceType) -> bool {
    matches!(
        resource,
        ResourceType::Image | ResourceType::Stylesheet | ResourceType::Font | ResourceType::Media
    )
}

/// Install request interception that fails heavy resources.
fn block_heavy_resources(
    tab: &Arc<Tab>,
) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let patterns = [RequestPattern {
        url_pattern: None,
        resource_Type: None,
        request_stage: Some(RequestStage::Request),
    }];
    tab.enable_fetch(Some(&patterns), None)
        .map_err(|e| e.to_string())?;

    tab.enable_request_interception(Arc::new(
        |_transport: Arc<Transport>, _session_id: SessionId, intercepted: RequestPausedEvent| {
            if is_blocked_resource(&intercepted.params.resource_Type) {
                log::trace!(" Blocking {}", intercepted.params.request.url);
                RequestPausedDecision::Fail(FailRequest {
                    request_id: intercepted.params.request_id,
                    error_reason: ErrorReason::BlockedByClient,
                })
            } else {
                RequestPausedDecision::Continue(None)
            }
        },
    ))
    .map_err(|e| e.to_string())?;

    Ok(())
}

/// A Chrome tab lent out by the page pool.
pub struct ChromePage {
    tab: Arc<Tab>,
}

impl PageContent for ChromePage {
    fn load(&self, url: &str, timeout: Duration) -> Result<()> {
        self.tab.set_default_timeout(timeout);
        self.tab
            .navigate_to(url)
            .and_then(|tab| tab.wait_until_navigated())
            .map(|_| ())
            .map_err(|e| ResolverError::PageLoadFailed(e.to_string()))
    }

    fn evaluate(&self, expression: &str) -> Result<Option<serde_json::Value>> {
        self.tab
            .evaluate(expression, false)
            .map(|remote| remote.value)
            .map_err(|e| ResolverError::PageLoadFailed(e.to_string()))
    }

    fn close(&self) -> Result<()> {
        self.tab
            .close(true)
            .map(|_| ())
            .map_err(|e| ResolverError::Internal(e.to_string()))
    }
}

/// Create Chrome launch options with optional custom path.
///
/// This function generates headless launch options with:
/// - Memory optimization flags
/// - GPU acceleration disabled (for headless stability)
/// - Unnecessary features disabled
/// - A one hour idle timeout for the CDP connection
///
/// # Parameters
///
/// * `chrome_path` - Optional custom Chrome binary path. If None, auto-detects.
///
/// # Chrome Flags Applied
///
/// ## Memory and Performance
/// - `--disable-dev-shm-usage` - Use /tmp instead of /dev/shm (container-friendly)
/// - `--disable-crash-reporter` - No crash reporting
/// - `--max_old_space_size=1024` - Limit V8 heap to 1GB
///
/// ## GPU and Rendering
/// - `--disable-gpu-compositing`
/// - `--disable-software-rasterizer`
/// - `--disable-accelerated-2d-canvas`
/// - `--disable-webgl`
///
/// ## Disabled Features
/// - `--disable-extensions`
/// - `--disable-sync`
/// - `--disable-default-apps`
/// - `--mute-audio`
///
/// ## Stability
/// - `--disable-background-timer-throttling`
/// - `--disable-backgrounding-occluded-windows`
/// - `--disable-renderer-backgrounding`
/// - `--disable-ipc-flooding-protection`
pub fn create_chrome_options(
    chrome_path: Option<&str>,
) -> std::result::Result<LaunchOptions<'static>, Box<dyn std::error::Error + Send + Sync>> {
    match chrome_path {
        Some(path) => log::debug!(" Creating Chrome options with custom path: {}", path),
        None => log::debug!(" Creating Chrome options (auto-detect browser)"),
    }

    let mut builder = LaunchOptions::default_builder();

    if let Some(path) = chrome_path {
        builder.path(Some(path.to_string().into()));
    }

    builder
        .headless(true)
        .sandbox(false) // required in containers
        .disable_default_args(true)
        .idle_browser_timeout(IDLE_BROWSER_TIMEOUT)
        .args(vec![
            // ===== Memory and Performance Optimization =====
            "--disable-dev-shm-usage".as_ref(),
            "--disable-crash-reporter".as_ref(),
            "--max_old_space_size=1024".as_ref(),
            // ===== GPU and Rendering Flags =====
            "--disable-gpu-compositing".as_ref(),
            "--disable-software-rasterizer".as_ref(),
            "--disable-accelerated-2d-canvas".as_ref(),
            "--disable-webgl".as_ref(),
            // ===== Disable Unnecessary Features =====
            "--disable-extensions".as_ref(),
            "--disable-sync".as_ref(),
            "--disable-default-apps".as_ref(),
            "--mute-audio".as_ref(),
            // ===== Stability and Performance =====
            "--disable-background-timer-throttling".as_ref(),
            "--disable-backgrounding-occluded-windows".as_ref(),
            "--disable-renderer-backgrounding".as_ref(),
            "--disable-ipc-flooding-protection".as_ref(),
        ])
        .build()
        .map_err(|e| -> Box<dyn std::error::Error + Send + Sync> {
            let path_msg = chrome_path.unwrap_or("auto-detect");
            log::error!(
                "❌ Failed to build Chrome launch options (path: {}): {}",
                path_msg,
                e
            );
            e.into()
        })
}

// ============================================================================
// Unit Tests
// ============================================================================
