//! Configuration for the page pool, queue, cache, rate limiter and proxy.
//!
//! This module provides [`ResolverConfig`] and [`ResolverConfigBuilder`].
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use media_resolver::ResolverConfigBuilder;
//!
//! let config = ResolverConfigBuilder::new()
//!     .max_pages(3)
//!     .queue_concurrency(3)
//!     .cache_ttl(Duration::from_secs(600))
//!     .build()
//!     .expect("Invalid configuration");
//!
//! assert_eq!(config.max_pages, 3);
//! assert_eq!(config.cache_ttl, Duration::from_secs(600));
//! ```
//!
//! # Environment Configuration
//!
//! When the `env-config` feature is enabled, configuration can be loaded
//! from environment variables and an optional `app.env` file:
//!
//! ```rust,ignore
//! use media_resolver::config::env::from_env;
//!
//! let config = from_env()?;
//! ```
//!
//! See [`mod@env`] module for available environment variables.

use std::time::Duration;

/// Desktop Chrome user agent sent by pages and by the download proxy.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Hosts accepted by the URL validators when nothing else is configured.
pub const DEFAULT_ALLOWED_HOSTS: &[&str] = &["instagram.com", "www.instagram.com"];

/// Configuration for media resolution.
///
/// # Fields Overview
///
/// | Field | Default | Description |
/// |-------|---------|-------------|
/// | `max_pages` | 5 | Pool capacity (pages in use at once) |
/// | `queue_concurrency` | 5 | Scrape tasks running at once |
/// | `cache_ttl` | 1 hour | Lifetime of a resolved result |
/// | `extractor_timeout` | 15s | Deadline for the metadata extractor |
/// | `navigation_timeout` | 30s | Deadline for loading a page |
/// | `download_timeout` | 30s | Deadline for upstream response headers and each read |
/// | `rate_limit_window` | 60s | Rate limiter window |
/// | `rate_limit_max_requests` | 20 | Requests per client per window |
/// | `allowed_hosts` | instagram.com | Hosts accepted for resolution |
/// | `user_agent` | desktop Chrome | User agent for pages and downloads |
/// | `allow_private_downloads` | false | Let the download proxy reach private addresses |
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Maximum number of pages lent out at the same time.
    ///
    /// Every page is a tab in the single shared browser process, so this
    /// bounds browser memory.
    pub max_pages: usize,

    /// Maximum number of scrape tasks executing at once.
    ///
    /// Excess work waits in FIFO order in the request queue.
    pub queue_concurrency: usize,

    /// How long a resolved result is served from cache.
    ///
    /// Stale entries are ignored, never evicted.
    pub cache_ttl: Duration,

    /// Deadline for the external metadata extractor.
    pub extractor_timeout: Duration,

    /// Deadline for loading a page and reading its metadata.
    pub navigation_timeout: Duration,

    /// Deadline for upstream download response headers, and for each body read.
    pub download_timeout: Duration,

    /// Length of the per-client rate limiting window.
    pub rate_limit_window: Duration,

    /// Requests allowed per client within one window.
    pub rate_limit_max_requests: u32,

    /// Hosts whose URLs may be resolved (compared case-insensitively).
    pub allowed_hosts: Vec<String>,

    /// User agent used by pages and the download proxy.
    pub user_agent: String,

    /// Whether the download proxy may fetch from loopback and private
    /// network addresses. Off outside local testing.
    pub allow_private_downloads: bool,
}

impl Default for ResolverConfig {
    /// Production-ready default configuration.
    ///
    /// ```rust
    /// use media_resolver::ResolverConfig;
    /// use std::time::Duration;
    ///
    /// let config = ResolverConfig::default();
    ///
    /// assert_eq!(config.max_pages, 5);
    /// assert_eq!(config.queue_concurrency, 5);
    /// assert_eq!(config.cache_ttl, Duration::from_secs(3600));
    /// assert_eq!(config.extractor_timeout, Duration::from_secs(15));
    /// ```
    fn default() -> Self {
        Self {
            max_pages: 5,
            queue_concurrency: 5,
            cache_ttl: Duration::from_secs(3600), // 1 hour
            extractor_timeout: Duration::from_secs(15),
            navigation_timeout: Duration::from_secs(30),
            download_timeout: Duration::from_secs(30),
            rate_limit_window: Duration::from_secs(60),
            rate_limit_max_requests: 20,
            allowed_hosts: DEFAULT_ALLOWED_HOSTS.iter().map(|h| h.to_string()).collect(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            allow_private_downloads: false,
        }
    }
}

impl ResolverConfig {
    /// Whether `host` is one of the configured allowed hosts.
    pub fn is_allowed_host(&self, host: &str) -> bool {
        self.allowed_hosts
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(host))
    }
}

/// Builder for [`ResolverConfig`] with validation.
///
/// # Validation
///
/// The [`build()`](Self::build) method checks that every count and every
/// duration is non-zero and that at least one host is allowed.
pub struct ResolverConfigBuilder {
    config: ResolverConfig,
}

impl ResolverConfigBuilder {
    /// Create a new builder with default values.
    pub fn new() -> Self {
        Self {
            config: ResolverConfig::default(),
        }
    }

    /// Set the pool capacity (must be > 0).
    ///
    /// ```rust
    /// use media_resolver::ResolverConfigBuilder;
    ///
    /// let config = ResolverConfigBuilder::new().max_pages(1).build().unwrap();
    /// assert_eq!(config.max_pages, 1);
    /// ```
    pub fn max_pages(mut self, pages: usize) -> Self {
        self.config.max_pages = pages;
        self
    }

    /// Set the request queue concurrency ceiling (must be > 0).
    pub fn queue_concurrency(mut self, concurrency: usize) -> Self {
        self.config.queue_concurrency = concurrency;
        self
    }

    /// Set the cache time-to-live.
    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.config.cache_ttl = ttl;
        self
    }

    /// Set the metadata extractor deadline.
    pub fn extractor_timeout(mut self, timeout: Duration) -> Self {
        self.config.extractor_timeout = timeout;
        self
    }

    /// Set the page navigation deadline.
    pub fn navigation_timeout(mut self, timeout: Duration) -> Self {
        self.config.navigation_timeout = timeout;
        self
    }

    /// Set the download proxy deadline.
    pub fn download_timeout(mut self, timeout: Duration) -> Self {
        self.config.download_timeout = timeout;
        self
    }

    /// Set the rate limiting window and the number of requests allowed in it.
    ///
    /// ```rust
    /// use std::time::Duration;
    /// use media_resolver::ResolverConfigBuilder;
    ///
    /// let config = ResolverConfigBuilder::new()
    ///     .rate_limit(Duration::from_secs(10), 3)
    ///     .build()
    ///     .unwrap();
    ///
    /// assert_eq!(config.rate_limit_max_requests, 3);
    /// ```
    pub fn rate_limit(mut self, window: Duration, max_requests: u32) -> Self {
        self.config.rate_limit_window = window;
        self.config.rate_limit_max_requests = max_requests;
        self
    }

    /// Replace the allowed hosts.
    pub fn allowed_hosts<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.allowed_hosts = hosts.into_iter().map(Into::into).collect();
        self
    }

    /// Add one allowed host, keeping the existing ones.
    pub fn allow_host<S: Into<String>>(mut self, host: S) -> Self {
        self.config.allowed_hosts.push(host.into());
        self
    }

    /// Set the user agent for pages and downloads.
    pub fn user_agent<S: Into<String>>(mut self, user_agent: S) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Allow or refuse downloads from private addresses.
    pub fn allow_private_downloads(mut self, allow: bool) -> Self {
        self.config.allow_private_downloads = allow;
        self
    }

    /// Build and validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns a message naming the first invalid field.
    ///
    /// ```rust
    /// use media_resolver::ResolverConfigBuilder;
    ///
    /// assert!(ResolverConfigBuilder::new().max_pages(0).build().is_err());
    /// assert!(ResolverConfigBuilder::new().queue_concurrency(0).build().is_err());
    /// ```
    pub fn build(self) -> std::result::Result<ResolverConfig, String> {
        let config = self.config;

        if config.max_pages == 0 {
            return Err("max_pages must be greater than 0".to_string());
        }

        if config.queue_concurrency == 0 {
            return Err("queue_concurrency must be greater than 0".to_string());
        }

        let durations = [
            ("cache_ttl", config.cache_ttl),
            ("extractor_timeout", config.extractor_timeout),
            ("navigation_timeout", config.navigation_timeout),
            ("download_timeout", config.download_timeout),
            ("rate_limit_window", config.rate_limit_window),
        ];
        if let Some((name, _)) = durations.iter().find(|(_, d)| d.is_zero()) {
            return Err(format!("{} must be greater than 0", name));
        }

        if config.rate_limit_max_requests == 0 {
            return Err("rate_limit_max_requests must be greater than 0".to_string());
        }

        if config.allowed_hosts.iter().all(|h| h.trim().is_empty()) {
            return Err("allowed_hosts must contain at least one host".to_string());
        }

        Ok(config)
    }
}

impl Default for ResolverConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Environment Configuration (feature-gated)
// ============================================================================

/// Environment-based configuration loading.
///
/// This module is only available when the `env-config` feature is enabled.
///
/// # Environment File
///
/// Variables are loaded from an optional `app.env` file in the current
/// directory (via `dotenvy`), then from the process environment.
///
/// # Environment Variables
///
/// | Variable | Type | Default | Description |
/// |----------|------|---------|-------------|
/// | `RESOLVER_MAX_PAGES` | usize | 5 | Pool capacity |
/// | `RESOLVER_QUEUE_CONCURRENCY` | usize | 5 | Concurrency ceiling |
/// | `RESOLVER_CACHE_TTL_SECONDS` | u64 | 3600 | Cache TTL |
/// | `RESOLVER_EXTRACTOR_TIMEOUT_SECONDS` | u64 | 15 | Extractor deadline |
/// | `RESOLVER_NAVIGATION_TIMEOUT_SECONDS` | u64 | 30 | Page load deadline |
/// | `RESOLVER_DOWNLOAD_TIMEOUT_SECONDS` | u64 | 30 | Download deadline |
/// | `RATE_LIMIT_WINDOW_SECONDS` | u64 | 60 | Rate limit window |
/// | `RATE_LIMIT_MAX_REQUESTS` | u32 | 20 | Requests per window |
/// | `RESOLVER_ALLOWED_HOSTS` | list | instagram.com,www.instagram.com | Accepted hosts |
/// | `RESOLVER_USER_AGENT` | String | desktop Chrome | User agent |
/// | `RESOLVER_ALLOW_PRIVATE_DOWNLOADS` | bool | false | Download from private addresses |
/// | `CHROME_PATH` | String | auto | Custom Chrome binary path |
/// | `EXTRACTOR_ENDPOINT` | String | none | Post/reel extractor API |
/// | `EXTRACTOR_API_KEY` | String | none | API key for the extractors |
/// | `PROFILE_API_ENDPOINT` | String | none | Profile picture API |
/// | `YOUTUBE_API_KEY` | String | none | Key for video quick info |
/// | `YOUTUBE_API_ENDPOINT` | String | YouTube Data API | Video lookup endpoint |
/// | `HOST` / `PORT` | String / u16 | 0.0.0.0 / 3001 | Server bind address |
/// | `TRUST_PROXY_HEADERS` | bool | false | Use `X-Forwarded-For` for client identity |
///
/// # Example `app.env` File
///
/// ```text
/// RESOLVER_MAX_PAGES=5
/// RESOLVER_QUEUE_CONCURRENCY=5
/// RESOLVER_CACHE_TTL_SECONDS=3600
/// EXTRACTOR_ENDPOINT=https://extractor.internal/api/resolve
/// # CHROME_PATH=/usr/bin/chromium
/// ```
#[cfg(feature = "env-config")]
pub mod env {
    use super::*;
    use crate::error::ResolverError;
    use std::net::SocketAddr;

    /// Default environment file name.
    pub const ENV_FILE_NAME: &str = "app.env";

    /// Default port for the server binary.
    pub const DEFAULT_PORT: u16 = 3001;

    /// Load environment variables from `app.env` file.
    ///
    /// Called automatically by [`from_env`].
    pub fn load_env_file() -> Result<std::path::PathBuf, dotenvy::Error> {
        dotenvy::from_filename(ENV_FILE_NAME)
    }

    fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
        std::env::var(name).ok().and_then(|s| s.trim().parse().ok())
    }

    /// Load configuration from environment variables.
    ///
    /// Also loads `app.env` if present. Unparseable values fall back to the
    /// defaults; the resulting configuration is validated.
    ///
    /// # Errors
    ///
    /// Returns [`ResolverError::Configuration`] if the values are invalid.
    pub fn from_env() -> Result<ResolverConfig, ResolverError> {
        match load_env_file() {
            Ok(path) => {
                log::info!("📄 Loaded configuration from: {:?}", path);
            }
            Err(e) => {
                log::debug!(
                    "📄 No {} file found or failed to load: {} (using environment variables and defaults)",
                    ENV_FILE_NAME,
                    e
                );
            }
        }

        let defaults = ResolverConfig::default();

        let max_pages = parse_var("RESOLVER_MAX_PAGES").unwrap_or(defaults.max_pages);
        let queue_concurrency =
            parse_var("RESOLVER_QUEUE_CONCURRENCY").unwrap_or(defaults.queue_concurrency);
        let cache_ttl_seconds = parse_var("RESOLVER_CACHE_TTL_SECONDS")
            .unwrap_or(defaults.cache_ttl.as_secs());
        let extractor_timeout_seconds = parse_var("RESOLVER_EXTRACTOR_TIMEOUT_SECONDS")
            .unwrap_or(defaults.extractor_timeout.as_secs());
        let navigation_timeout_seconds = parse_var("RESOLVER_NAVIGATION_TIMEOUT_SECONDS")
            .unwrap_or(defaults.navigation_timeout.as_secs());
        let download_timeout_seconds = parse_var("RESOLVER_DOWNLOAD_TIMEOUT_SECONDS")
            .unwrap_or(defaults.download_timeout.as_secs());
        let window_seconds = parse_var("RATE_LIMIT_WINDOW_SECONDS")
            .unwrap_or(defaults.rate_limit_window.as_secs());
        let max_requests =
            parse_var("RATE_LIMIT_MAX_REQUESTS").unwrap_or(defaults.rate_limit_max_requests);
        let allowed_hosts = std::env::var("RESOLVER_ALLOWED_HOSTS")
            .ok()
            .map(|list| parse_host_list(&list))
            .filter(|hosts| !hosts.is_empty())
            .unwrap_or(defaults.allowed_hosts);
        let user_agent = std::env::var("RESOLVER_USER_AGENT").unwrap_or(defaults.user_agent);
        let allow_private_downloads = flag_from_env("RESOLVER_ALLOW_PRIVATE_DOWNLOADS");

        log::info!("🔧 Loading resolver configuration from environment:");
        log::info!("   - Max pages: {}", max_pages);
        log::info!("   - Queue concurrency: {}", queue_concurrency);
        log::info!(
            "   - Cache TTL: {}s ({}min)",
            cache_ttl_seconds,
            cache_ttl_seconds / 60
        );
        log::info!("   - Extractor timeout: {}s", extractor_timeout_seconds);
        log::info!("   - Navigation timeout: {}s", navigation_timeout_seconds);
        log::info!("   - Download timeout: {}s", download_timeout_seconds);
        log::info!(
            "   - Rate limit: {} requests / {}s",
            max_requests,
            window_seconds
        );
        log::info!("   - Allowed hosts: {}", allowed_hosts.join(", "));
        if allow_private_downloads {
            log::warn!("⚠️ Downloads from private addresses are allowed");
        }

        ResolverConfigBuilder::new()
            .max_pages(max_pages)
            .queue_concurrency(queue_concurrency)
            .cache_ttl(Duration::from_secs(cache_ttl_seconds))
            .extractor_timeout(Duration::from_secs(extractor_timeout_seconds))
            .navigation_timeout(Duration::from_secs(navigation_timeout_seconds))
            .download_timeout(Duration::from_secs(download_timeout_seconds))
            .rate_limit(Duration::from_secs(window_seconds), max_requests)
            .allowed_hosts(allowed_hosts)
            .user_agent(user_agent)
            .allow_private_downloads(allow_private_downloads)
            .build()
            .map_err(ResolverError::Configuration)
    }

    /// Split a comma separated host list, dropping blanks.
    pub fn parse_host_list(list: &str) -> Vec<String> {
        list.split(',')
            .map(|h| h.trim().to_ascii_lowercase())
            .filter(|h| !h.is_empty())
            .collect()
    }

    /// Get Chrome path from `CHROME_PATH`.
    ///
    /// `None` means auto-detection.
    pub fn chrome_path_from_env() -> Option<String> {
        std::env::var("CHROME_PATH").ok()
    }

    /// Endpoint of the post/reel metadata extractor (`EXTRACTOR_ENDPOINT`).
    pub fn extractor_endpoint_from_env() -> Option<String> {
        std::env::var("EXTRACTOR_ENDPOINT").ok()
    }

    /// API key sent to the extractor endpoints (`EXTRACTOR_API_KEY`).
    pub fn extractor_api_key_from_env() -> Option<String> {
        std::env::var("EXTRACTOR_API_KEY").ok()
    }

    /// Endpoint of the profile picture API (`PROFILE_API_ENDPOINT`).
    pub fn profile_endpoint_from_env() -> Option<String> {
        std::env::var("PROFILE_API_ENDPOINT").ok()
    }

    fn flag_from_env(name: &str) -> bool {
        std::env::var(name)
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false)
    }

    /// YouTube Data API key (`YOUTUBE_API_KEY`); video lookups are off without it.
    pub fn youtube_api_key_from_env() -> Option<String> {
        std::env::var("YOUTUBE_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty())
    }

    /// Video lookup endpoint (`YOUTUBE_API_ENDPOINT`), or the public API.
    pub fn video_api_endpoint_from_env() -> String {
        std::env::var("YOUTUBE_API_ENDPOINT")
            .unwrap_or_else(|_| crate::video::DEFAULT_VIDEO_API_ENDPOINT.to_string())
    }

    /// Whether client identity may be taken from `X-Forwarded-For`.
    pub fn trust_proxy_headers_from_env() -> bool {
        flag_from_env("TRUST_PROXY_HEADERS")
    }

    /// Server bind address from `HOST` and `PORT`.
    pub fn bind_addr_from_env() -> SocketAddr {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = parse_var("PORT").unwrap_or(DEFAULT_PORT);

        format!("{}:{}", host, port)
            .parse()
            .unwrap_or_else(|e| {
                log::warn!("⚠️ Invalid HOST/PORT ({}), binding 0.0.0.0:{}", e, port);
                SocketAddr::from(([0, 0, 0, 0], port))
            })
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
