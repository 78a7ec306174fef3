//! # media-resolver
//!
//! Resolve social-media content URLs to direct media links through a bounded
//! pool of headless Chrome pages, and stream the media back as a download.
//!
//! ## Features
//!
//! - **Page Pooling**: One browser process, at most `max_pages` tabs, reused across requests
//! - **Bounded Concurrency**: FIFO request queue admitting a fixed number of scrapes at once
//! - **Result Caching**: Resolved URLs are served from memory for an hour
//! - **Rate Limiting**: Fixed per-client request windows
//! - **Concurrent Extraction**: Page metadata and extractor lookup run side by side
//! - **RAII Pattern**: Pages return to the pool on drop, on every path
//! - **Streaming Downloads**: Upstream media is forwarded chunk by chunk
//! - **Video Quick Info**: Title and thumbnail of YouTube links via the Data API
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │          HTTP surface (Axum)                │
//! │   rate limiter → resolve / download         │
//! └─────────────────┬───────────────────────────┘
//!                   │
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │           ScrapeOrchestrator                │
//! │ ┌─────────────────────────────────────────┐ │
//! │ │   TtlCache (url → ResolvedMedia)        │ │
//! │ └─────────────────────────────────────────┘ │
//! │ ┌─────────────────────────────────────────┐ │
//! │ │   RequestQueue (FIFO, concurrency 5)    │ │
//! │ └─────────────────────────────────────────┘ │
//! │ ┌──────────────────┐ ┌────────────────────┐ │
//! │ │   PagePool       │ │ MetadataExtractor  │ │
//! │ │   [Page1][Page2] │ │ (HTTP API)         │ │
//! │ └──────────────────┘ └────────────────────┘ │
//! └─────────────────┬───────────────────────────┘
//!                   │
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │        Headless Chrome (one process)        │
//! │     (managed by headless_chrome crate)      │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use media_resolver::prelude::*;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let resolver = ScrapeOrchestrator::builder()
//!         .config(
//!             ResolverConfigBuilder::new()
//!                 .max_pages(5)
//!                 .extractor_timeout(Duration::from_secs(15))
//!                 .build()?
//!         )
//!         .factory(Box::new(ChromeBrowserFactory::with_defaults()))
//!         .extractor(HttpMetadataExtractor::new("https://extractor.internal/api", None)?)
//!         .build()?;
//!
//!     let media = resolver.resolve("https://www.instagram.com/reel/Cx1_ab/").await?;
//!     println!("{:?}: {}", media.media_type, media.download_url);
//!
//!     resolver.shutdown_async().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Environment Configuration
//!
//! With the `env-config` feature, [`init_resolver`] builds everything from
//! environment variables (loaded from `app.env` or the system environment):
//!
//! | Variable | Type | Default | Description |
//! |----------|------|---------|-------------|
//! | `RESOLVER_MAX_PAGES` | usize | 5 | Maximum pages in the pool |
//! | `RESOLVER_QUEUE_CONCURRENCY` | usize | 5 | Scrapes admitted at once |
//! | `RESOLVER_CACHE_TTL_SECONDS` | u64 | 3600 | Result lifetime |
//! | `RESOLVER_EXTRACTOR_TIMEOUT_SECONDS` | u64 | 15 | Extractor deadline |
//! | `RESOLVER_NAVIGATION_TIMEOUT_SECONDS` | u64 | 30 | Page load bound |
//! | `RESOLVER_DOWNLOAD_TIMEOUT_SECONDS` | u64 | 30 | Upstream header/read bound |
//! | `RATE_LIMIT_WINDOW_SECONDS` | u64 | 60 | Rate limit window |
//! | `RATE_LIMIT_MAX_REQUESTS` | u32 | 20 | Requests per window |
//! | `RESOLVER_ALLOWED_HOSTS` | list | instagram hosts | Accepted URL hosts |
//! | `RESOLVER_USER_AGENT` | String | desktop Chrome | Browser and download user agent |
//! | `EXTRACTOR_ENDPOINT` | URL | required | Post/reel extractor API |
//! | `EXTRACTOR_API_KEY` | String | none | Sent as `x-rapidapi-key` |
//! | `PROFILE_API_ENDPOINT` | URL | none | Profile picture API |
//! | `YOUTUBE_API_KEY` | String | none | Enables `/quick-info` video lookups |
//! | `YOUTUBE_API_ENDPOINT` | URL | YouTube Data API | Video lookup endpoint |
//! | `RESOLVER_ALLOW_PRIVATE_DOWNLOADS` | bool | false | Download from private addresses |
//! | `CHROME_PATH` | String | auto | Custom Chrome binary path |
//! | `HOST` / `PORT` | | `0.0.0.0:3001` | Server bind address |
//! | `TRUST_PROXY_HEADERS` | bool | false | Identify clients by `X-Forwarded-For` |
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `env-config` | Environment-based configuration |
//! | `axum-integration` | Axum routes ([`integrations::axum`]) |
//! | `server` | The `media-resolver` binary (implies the two above) |
//! | `test-utils` | Mock browser factory and extractor |
//!
//! ## Error Handling
//!
//! All fallible operations return [`Result<T, ResolverError>`](Result):
//!
//! ```rust,ignore
//! match resolver.resolve(url).await {
//!     Ok(media) => { /* ... */ }
//!     Err(ResolverError::InvalidInput(msg)) => { /* 400 */ }
//!     Err(ResolverError::UpstreamTimeout(secs)) => { /* extractor too slow */ }
//!     Err(e) => eprintln!("Resolve failed ({}): {}", e.status_code(), e),
//! }
//! ```
//!
//! ## Testing
//!
//! Enable `test-utils` to script pages and extractors without Chrome or a
//! network:
//!
//! ```rust,ignore
//! use media_resolver::extractor::mock::MockExtractor;
//! use media_resolver::factory::mock::MockBrowserFactory;
//!
//! let resolver = ScrapeOrchestrator::builder()
//!     .factory(Box::new(MockBrowserFactory::new()))
//!     .extractor(MockExtractor::returning(["https://cdn.example/a.mp4"]))
//!     .build()?;
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

// ============================================================================
// Modules
// ============================================================================

pub mod cache;
pub mod config;
pub mod content;
pub mod download;
pub mod error;
pub mod extractor;
pub mod factory;
pub mod handle;
pub mod orchestrator;
pub mod pool;
pub mod prelude;
pub mod queue;
pub mod rate_limit;
pub mod stats;
pub mod traits;
pub mod video;

// ============================================================================
// Feature-gated modules
// ============================================================================

/// Web framework integrations.
///
/// Enable `axum-integration` (or `server`) to use them.
#[cfg(feature = "axum-integration")]
pub mod integrations;

// ============================================================================
// Re-exports (Public API)
// ============================================================================

pub use cache::TtlCache;
pub use config::{ResolverConfig, ResolverConfigBuilder};
pub use content::{ContentKind, MediaTarget, MediaType, PageMetadata, ResolvedMedia};
pub use download::{DownloadProxy, MediaStream};
pub use error::{ErrorResponse, ResolverError, Result};
pub use extractor::{HttpMetadataExtractor, MetadataExtractor, ProfilePictureExtractor};
pub use factory::{BrowserFactory, ChromeBrowserFactory, create_chrome_options};
pub use handle::PageHandle;
pub use orchestrator::{ScrapeOrchestrator, ScrapeOrchestratorBuilder};
pub use pool::{PagePool, PagePoolBuilder};
pub use queue::RequestQueue;
pub use rate_limit::RateLimiter;
pub use stats::{PoolStats, QueueStats, ResolverStats};
pub use traits::{BrowserProcess, PageContent};
pub use video::{VideoInfo, VideoInfoClient};

// Feature-gated re-exports
#[cfg(feature = "env-config")]
pub use config::env::{chrome_path_from_env, from_env};

#[cfg(feature = "env-config")]
pub use orchestrator::init_resolver;

// ============================================================================
// Convenience type aliases
// ============================================================================

/// Shared resolver type for web frameworks.
///
/// The orchestrator is internally synchronised, so no outer mutex is needed.
pub type SharedResolver = std::sync::Arc<ScrapeOrchestrator>;
