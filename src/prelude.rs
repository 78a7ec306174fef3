//! Convenient imports for common usage patterns.
//!
//! ```rust,ignore
//! use media_resolver::prelude::*;
//! ```
//!
//! This imports the orchestrator and its builder, configuration, the error
//! type, content types, the Chrome factory, the HTTP extractors, the
//! download proxy, the rate limiter, the video lookup client and
//! [`SharedResolver`].

// Core types
pub use crate::config::{ResolverConfig, ResolverConfigBuilder};
pub use crate::content::{ContentKind, MediaType, ResolvedMedia};
pub use crate::download::{DownloadProxy, MediaStream};
pub use crate::error::{ResolverError, Result};
pub use crate::extractor::{HttpMetadataExtractor, MetadataExtractor, ProfilePictureExtractor};
pub use crate::factory::{BrowserFactory, ChromeBrowserFactory};
pub use crate::orchestrator::{ScrapeOrchestrator, ScrapeOrchestratorBuilder};
pub use crate::rate_limit::RateLimiter;
pub use crate::stats::ResolverStats;
pub use crate::video::{VideoInfo, VideoInfoClient};
pub use crate::SharedResolver;

// Feature-gated exports
#[cfg(feature = "env-config")]
pub use crate::config::env::from_env;

#[cfg(feature = "env-config")]
pub use crate::orchestrator::init_resolver;

// Commonly needed with SharedResolver
pub use std::sync::Arc;
