//! Traits for abstraction and extensibility.
//!
//! This module provides the seams between the page pool and the automation
//! engine behind it:
//!
//! - **Pages**: [`PageContent`], one tab that can load a URL and evaluate script
//! - **Processes**: [`BrowserProcess`], the shared browser that opens pages
//!
//! Production code uses the Chrome implementations from
//! [`factory`](crate::factory); tests substitute scripted ones.
//!
//! # Implementing a Custom Page
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use media_resolver::{PageContent, Result};
//!
//! struct StaticPage;
//!
//! impl PageContent for StaticPage {
//!     fn load(&self, _url: &str, _timeout: Duration) -> Result<()> {
//!         Ok(())
//!     }
//!
//!     fn evaluate(&self, _expression: &str) -> Result<Option<serde_json::Value>> {
//!         Ok(Some(serde_json::json!("{}")))
//!     }
//! }
//! ```

mod page;
mod process;

pub use page::PageContent;
pub use process::BrowserProcess;
