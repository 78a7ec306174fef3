//! Browser factory implementations.
//!
//! This module provides the [`BrowserFactory`] trait and implementations
//! for launching the browser process behind the page pool.
//!
//! # Overview
//!
//! The factory pattern abstracts browser creation, allowing:
//! - Custom launch configurations (binary path, user agent)
//! - Request interception that keeps pages light
//! - Mock factories for testing without Chrome
//!
//! # Available Factories
//!
//! | Factory | Description |
//! |---------|-------------|
//! | [`ChromeBrowserFactory`] | Launches Chrome/Chromium |
//! | [`mock::MockBrowserFactory`] | Scripted pages for testing (feature-gated) |
//!
//! # Example
//!
//! ```rust,ignore
//! use media_resolver::{BrowserFactory, ChromeBrowserFactory};
//!
//! // Create factory with auto-detected Chrome
//! let factory = ChromeBrowserFactory::with_defaults();
//!
//! // Launch the process and open a page
//! let process = factory.create()?;
//! let page = process.open_page()?;
//! ```

mod chrome;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

pub use chrome::{ChromeBrowserFactory, ChromePage, ChromeProcess, create_chrome_options};

use crate::error::Result;
use crate::traits::BrowserProcess;

/// Trait for browser factory pattern.
///
/// Abstracts process creation so the pool can run against Chrome in
/// production and against scripted processes in tests.
///
/// # Thread Safety
///
/// This trait requires `Send + Sync` because the factory is owned by the
/// pool and called from blocking worker threads.
///
/// # Implementors
///
/// - [`ChromeBrowserFactory`] - Launches Chrome/Chromium
/// - [`mock::MockBrowserFactory`] - For testing (when `test-utils` feature enabled)
pub trait BrowserFactory: Send + Sync {
    /// Launch a new browser process.
    ///
    /// Blocking; the pool calls it from `spawn_blocking`.
    ///
    /// # Errors
    ///
    /// - [`ResolverError::Configuration`](crate::ResolverError::Configuration) -
    ///   Invalid launch options
    /// - [`ResolverError::BrowserUnavailable`](crate::ResolverError::BrowserUnavailable) -
    ///   Binary not found, launch fails, etc.
    fn create(&self) -> Result<Box<dyn BrowserProcess>>;
}
