//! Page abstraction.

use std::time::Duration;

use crate::error::Result;

/// One browser tab owned by the page pool.
///
/// All methods are blocking. Callers on an async runtime run them inside
/// [`tokio::task::spawn_blocking`].
///
/// # Thread Safety
///
/// Pages are shared as `Arc<dyn PageContent>` and moved onto blocking
/// threads, so implementors must be `Send + Sync`.
pub trait PageContent: Send + Sync {
    /// Navigate to `url` and wait until the document has loaded.
    ///
    /// # Errors
    ///
    /// Returns [`ResolverError::PageLoadFailed`](crate::ResolverError::PageLoadFailed)
    /// if navigation fails or does not finish within `timeout`.
    fn load(&self, url: &str, timeout: Duration) -> Result<()>;

    /// Evaluate a script expression in the loaded document.
    ///
    /// Returns the JSON value of the expression, or `None` when the
    /// expression produced `undefined`.
    fn evaluate(&self, expression: &str) -> Result<Option<serde_json::Value>>;

    /// Close the tab.
    ///
    /// Called when the pool discards a page. The default does nothing.
    fn close(&self) -> Result<()> {
        Ok(())
    }
}
