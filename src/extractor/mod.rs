//! External metadata extractors.
//!
//! An extractor turns a validated [`MediaTarget`] into the list of direct
//! media URLs an upstream service knows for it. The orchestrator races the
//! extractor against `extractor_timeout` and picks a candidate with
//! [`ContentKind::select`](crate::ContentKind::select).
//!
//! # Available Extractors
//!
//! | Extractor | Used for | Request |
//! |-----------|----------|---------|
//! | [`HttpMetadataExtractor`] | posts, reels | `POST {"url": ...}`, reads `url_list` |
//! | [`ProfilePictureExtractor`] | profile pictures | `POST {"username": ...}`, scans for CDN URLs |
//! | [`mock::MockExtractor`] | tests (feature-gated) | none |
//!
//! # Custom Extractor
//!
//! ```rust,ignore
//! use async_trait::async_trait;
//! use media_resolver::{MediaTarget, MetadataExtractor, Result};
//!
//! struct Fixed;
//!
//! #[async_trait]
//! impl MetadataExtractor for Fixed {
//!     async fn extract(&self, _target: &MediaTarget) -> Result<Vec<String>> {
//!         Ok(vec!["https://cdn.example/clip.mp4".to_string()])
//!     }
//! }
//! ```

mod http;
mod profile;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

pub use http::HttpMetadataExtractor;
pub use profile::ProfilePictureExtractor;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};

use crate::content::MediaTarget;
use crate::error::Result;

/// Capability that lists direct media URLs for a target.
///
/// Implementations should report upstream problems as
/// [`ResolverError::ExtractorFailed`](crate::ResolverError::ExtractorFailed).
/// Timeouts are applied by the caller; a slow extractor is simply dropped.
#[async_trait]
pub trait MetadataExtractor: Send + Sync {
    /// Candidate media URLs, in the upstream's order.
    async fn extract(&self, target: &MediaTarget) -> Result<Vec<String>>;
}

/// Headers sent with an API key, in the convention of hosted scraping APIs.
pub(crate) fn api_key_headers(endpoint: &url::Url, api_key: Option<&str>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    let Some(key) = api_key else {
        return headers;
    };

    if let Ok(value) = HeaderValue::from_str(key) {
        headers.insert("x-rapidapi-key", value);
    }
    if let Some(Ok(value)) = endpoint.host_str().map(HeaderValue::from_str) {
        headers.insert("x-rapidapi-host", value);
    }
    headers
}
