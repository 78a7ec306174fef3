//! Error types for media resolution.
//!
//! This module provides [`ResolverError`], a unified error type for the page
//! pool, request queue, rate limiter, orchestrator and download proxy, and a
//! convenient [`Result`] type alias.
//!
//! Every variant maps to an HTTP status via [`ResolverError::status_code`] and
//! to a stable machine-readable code via [`ResolverError::error_code`].
//!
//! # Example
//!
//! ```rust
//! use media_resolver::{ResolverError, Result};
//!
//! fn lookup() -> Result<String> {
//!     Err(ResolverError::NoMediaFound("no video candidate".to_string()))
//! }
//!
//! match lookup() {
//!     Ok(url) => println!("Resolved {}", url),
//!     Err(e) if e.is_retryable() => println!("Try again later: {}", e),
//!     Err(e) => eprintln!("Error ({}): {}", e.status_code(), e),
//! }
//! ```

/// Errors that can occur while resolving or downloading media.
///
/// # Status Mapping
///
/// | Variant | HTTP | Retryable |
/// |---------|------|-----------|
/// | `InvalidInput` | 400 | No |
/// | `RateLimited` | 429 | Yes |
/// | `BrowserUnavailable` | 500 | Yes |
/// | `PageLoadFailed` | 502 | Yes |
/// | `ExtractorFailed` | 502 | Yes |
/// | `UpstreamTimeout` | 500 | Yes |
/// | `NoMediaFound` | 404 | No |
/// | `DownloadFailed` | 500 | Yes |
/// | `ShuttingDown` | 503 | No |
/// | `Configuration` | 500 | No |
/// | `Internal` | 500 | No |
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolverError {
    /// The submitted URL is malformed or not a supported content kind.
    ///
    /// User-correctable; never retried.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The client exceeded its request budget for the current window.
    #[error("Too many requests, retry in {retry_after_secs}s")]
    RateLimited {
        /// Seconds until the client's window resets.
        retry_after_secs: u64,
    },

    /// The automation engine could not be started or could not open a page.
    ///
    /// # Common Causes
    ///
    /// - Chrome/Chromium binary not found or not executable
    /// - Browser process crashed and the page could not be reopened
    /// - System resource limits exceeded
    #[error("Browser unavailable: {0}")]
    BrowserUnavailable(String),

    /// The page could not be loaded or its metadata could not be read.
    #[error("Page load failed: {0}")]
    PageLoadFailed(String),

    /// The external metadata extractor returned an error.
    #[error("Metadata extractor failed: {0}")]
    ExtractorFailed(String),

    /// The external metadata extractor did not answer in time.
    ///
    /// Carries the timeout that elapsed, in seconds.
    #[error("Metadata extractor timed out after {0}s")]
    UpstreamTimeout(u64),

    /// The extractor answered but no candidate matched the expected media kind.
    #[error("No media found: {0}")]
    NoMediaFound(String),

    /// The upstream media fetch failed or was interrupted.
    ///
    /// When this happens after streaming started, the client only sees a
    /// truncated body.
    #[error("Download failed: {0}")]
    DownloadFailed(String),

    /// Operation attempted after shutdown began.
    ///
    /// Returned by the pool, the queue and the orchestrator once
    /// `shutdown`/`close` has been called.
    #[error("Resolver is shutting down")]
    ShuttingDown,

    /// Invalid configuration provided.
    ///
    /// Use [`ResolverConfigBuilder`](crate::ResolverConfigBuilder), which
    /// validates configuration at build time.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Unexpected internal failure (e.g. a worker task panicked).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ResolverError {
    /// HTTP status code for this error.
    ///
    /// # Example
    ///
    /// ```rust
    /// use media_resolver::ResolverError;
    ///
    /// assert_eq!(ResolverError::InvalidInput("x".into()).status_code(), 400);
    /// assert_eq!(ResolverError::UpstreamTimeout(15).status_code(), 500);
    /// ```
    pub fn status_code(&self) -> u16 {
        match self {
            ResolverError::InvalidInput(_) => 400,
            ResolverError::NoMediaFound(_) => 404,
            ResolverError::RateLimited { .. } => 429,
            ResolverError::PageLoadFailed(_) | ResolverError::ExtractorFailed(_) => 502,
            ResolverError::ShuttingDown => 503,
            ResolverError::BrowserUnavailable(_)
            | ResolverError::UpstreamTimeout(_)
            | ResolverError::DownloadFailed(_)
            | ResolverError::Configuration(_)
            | ResolverError::Internal(_) => 500,
        }
    }

    /// Stable machine-readable error code for API responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            ResolverError::InvalidInput(_) => "INVALID_INPUT",
            ResolverError::RateLimited { .. } => "RATE_LIMITED",
            ResolverError::BrowserUnavailable(_) => "BROWSER_UNAVAILABLE",
            ResolverError::PageLoadFailed(_) => "PAGE_LOAD_FAILED",
            ResolverError::ExtractorFailed(_) => "EXTRACTOR_FAILED",
            ResolverError::UpstreamTimeout(_) => "UPSTREAM_TIMEOUT",
            ResolverError::NoMediaFound(_) => "NO_MEDIA_FOUND",
            ResolverError::DownloadFailed(_) => "DOWNLOAD_FAILED",
            ResolverError::ShuttingDown => "SHUTTING_DOWN",
            ResolverError::Configuration(_) => "CONFIGURATION_ERROR",
            ResolverError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether retrying the same request later may succeed.
    ///
    /// Nothing inside the crate retries; this is a hint for clients.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ResolverError::RateLimited { .. }
                | ResolverError::BrowserUnavailable(_)
                | ResolverError::PageLoadFailed(_)
                | ResolverError::ExtractorFailed(_)
                | ResolverError::UpstreamTimeout(_)
                | ResolverError::DownloadFailed(_)
        )
    }
}

/// Convenience conversion from [`String`] to [`ResolverError::Configuration`].
///
/// Lets builder validation errors (`Result<_, String>`) flow through `?`.
///
/// ```rust
/// use media_resolver::ResolverError;
///
/// let error: ResolverError = "max_pages must be greater than 0".to_string().into();
/// assert!(matches!(error, ResolverError::Configuration(_)));
/// ```
impl From<String> for ResolverError {
    fn from(msg: String) -> Self {
        ResolverError::Configuration(msg)
    }
}

/// Convenience conversion from `&str` to [`ResolverError::Configuration`].
impl From<&str> for ResolverError {
    fn from(msg: &str) -> Self {
        ResolverError::Configuration(msg.to_string())
    }
}

/// Result type alias using [`ResolverError`].
pub type Result<T> = std::result::Result<T, ResolverError>;

/// JSON failure payload returned to HTTP clients.
///
/// ```json
/// { "success": false, "message": "Invalid input: ...", "code": "INVALID_INPUT" }
/// ```
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ErrorResponse {
    /// Always `false`.
    pub success: bool,
    /// Human-readable error message.
    pub message: String,
    /// Machine-readable error code.
    pub code: String,
}

impl From<&ResolverError> for ErrorResponse {
    fn from(err: &ResolverError) -> Self {
        Self {
            success: false,
            message: err.to_string(),
            code: err.error_code().to_string(),
        }
    }
}

impl From<ResolverError> for ErrorResponse {
    fn from(err: ResolverError) -> Self {
        Self::from(&err)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
