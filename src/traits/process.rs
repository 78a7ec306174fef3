//! Browser process abstraction.

use std::sync::Arc;

use crate::error::Result;
use super::PageContent;

/// The single automation engine shared by every pooled page.
///
/// Created lazily by a [`BrowserFactory`](crate::BrowserFactory) on the
/// first page acquisition, and dropped by the pool on shutdown or when it
/// can no longer open pages.
pub trait BrowserProcess: Send + Sync {
    /// Open a new page (tab) in this process.
    ///
    /// Blocking.
    ///
    /// # Errors
    ///
    /// Returns [`ResolverError::BrowserUnavailable`](crate::ResolverError::BrowserUnavailable)
    /// when the process is gone or refuses to open a tab.
    fn open_page(&self) -> Result<Arc<dyn PageContent>>;

    /// Terminate the process. Must be safe to call more than once.
    fn close(&self);
}
