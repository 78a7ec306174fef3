//! Scrape orchestration.
//!
//! [`ScrapeOrchestrator`] resolves one content URL into a [`ResolvedMedia`]:
//!
//! 1. Validate the URL for its [`ContentKind`] (`InvalidInput` otherwise)
//! 2. Return a fresh cached result if there is one
//! 3. Queue behind the concurrency ceiling and acquire a page
//! 4. Concurrently load the page and read its metadata, and ask the
//!    extractor for candidates under `extractor_timeout`
//! 5. Release the page (discarding it if it failed)
//! 6. Select a candidate, merge, cache and return
//!
//! Nothing is retried. The page is released on every path.
//!
//! # Example
//!
//! ```rust,no_run
//! use media_resolver::{ChromeBrowserFactory, HttpMetadataExtractor, ScrapeOrchestrator};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let resolver = ScrapeOrchestrator::builder()
//!         .factory(Box::new(ChromeBrowserFactory::with_defaults()))
//!         .extractor(HttpMetadataExtractor::new("https://extractor.internal/api", None)?)
//!         .build()?;
//!
//!     let media = resolver.resolve("https://www.instagram.com/p/ABC123/").await?;
//!     println!("{} -> {}", media.title, media.download_url);
//!
//!     resolver.shutdown_async().await;
//!     Ok(())
//! }
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::TtlCache;
use crate::config::ResolverConfig;
use crate::content::{ContentKind, METADATA_SCRIPT, MediaTarget, PageMetadata, ResolvedMedia};
use crate::error::{ResolverError, Result};
use crate::extractor::MetadataExtractor;
use crate::factory::BrowserFactory;
use crate::pool::PagePool;
use crate::queue::RequestQueue;
use crate::stats::ResolverStats;

/// Resolves content URLs through the page pool, request queue and cache.
///
/// Share it as [`SharedResolver`](crate::SharedResolver) (`Arc<ScrapeOrchestrator>`).
pub struct ScrapeOrchestrator {
    config: ResolverConfig,
    pool: Arc<PagePool>,
    queue: RequestQueue,
    cache: Arc<TtlCache<String, ResolvedMedia>>,
    extractor: Arc<dyn MetadataExtractor>,
    overrides: HashMap<ContentKind, Arc<dyn MetadataExtractor>>,
}

impl ScrapeOrchestrator {
    /// Create a new builder.
    pub fn builder() -> ScrapeOrchestratorBuilder {
        ScrapeOrchestratorBuilder::new()
    }

    /// Resolve `url`, detecting its content kind from the URL.
    ///
    /// # Errors
    ///
    /// - [`ResolverError::InvalidInput`] for unsupported URLs
    /// - [`ResolverError::BrowserUnavailable`] if no page could be created
    /// - [`ResolverError::UpstreamTimeout`] / [`ResolverError::ExtractorFailed`]
    ///   from the extractor
    /// - [`ResolverError::PageLoadFailed`] if the page could not be read
    /// - [`ResolverError::NoMediaFound`] if no candidate fits the kind
    /// - [`ResolverError::ShuttingDown`] after shutdown
    pub async fn resolve(&self, url: &str) -> Result<ResolvedMedia> {
        let target = ContentKind::detect(url, &self.config)?;
        self.resolve_target(target).await
    }

    /// Resolve `url` as a specific content kind.
    ///
    /// Same errors as [`resolve`](Self::resolve); a URL of another kind is
    /// [`ResolverError::InvalidInput`].
    pub async fn resolve_as(&self, kind: ContentKind, url: &str) -> Result<ResolvedMedia> {
        let target = kind.validate(url, &self.config)?;
        self.resolve_target(target).await
    }

    async fn resolve_target(&self, target: MediaTarget) -> Result<ResolvedMedia> {
        if let Some(hit) = self.cache.get(target.url.as_str()) {
            log::debug!(" Cache hit for {}", target.url);
            return Ok(hit);
        }

        log::info!(" Resolving {} {}", target.kind, target.url);

        let task = ScrapeTask {
            pool: Arc::clone(&self.pool),
            extractor: self.extractor_for(target.kind),
            cache: Arc::clone(&self.cache),
            navigation_timeout: self.config.navigation_timeout,
            extractor_timeout: self.config.extractor_timeout,
            target,
        };

        let url = task.target.url.clone();
        let result = self.queue.submit(task.run()).await;

        match &result {
            Ok(media) => log::info!("✅ Resolved {} ({:?})", url, media.media_type),
            Err(e) => log::warn!("⚠️ Failed to resolve {}: {}", url, e),
        }
        result
    }

    fn extractor_for(&self, kind: ContentKind) -> Arc<dyn MetadataExtractor> {
        self.overrides
            .get(&kind)
            .map(Arc::clone)
            .unwrap_or_else(|| Arc::clone(&self.extractor))
    }

    /// The configuration in use.
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Pool, queue and cache statistics.
    pub fn stats(&self) -> ResolverStats {
        ResolverStats {
            pool: self.pool.stats(),
            queue: self.queue.stats(),
            cached_entries: self.cache.len(),
        }
    }

    /// Whether [`shutdown_async`](Self::shutdown_async) has begun.
    pub fn is_shutting_down(&self) -> bool {
        self.queue.is_closed() || self.pool.is_shutting_down()
    }

    /// Reject queued and new work, then shut the page pool down.
    ///
    /// Idempotent. Tasks already running finish; their pages are closed
    /// on release.
    pub async fn shutdown_async(&self) {
        log::info!("Shutting down resolver...");
        self.queue.close();
        self.pool.shutdown_async().await;
        log::info!("Resolver shut down");
    }
}

impl std::fmt::Debug for ScrapeOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScrapeOrchestrator")
            .field("stats", &self.stats())
            .field("overrides", &self.overrides.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// One queued scrape.
struct ScrapeTask {
    pool: Arc<PagePool>,
    extractor: Arc<dyn MetadataExtractor>,
    cache: Arc<TtlCache<String, ResolvedMedia>>,
    navigation_timeout: Duration,
    extractor_timeout: Duration,
    target: MediaTarget,
}

impl ScrapeTask {
    async fn run(self) -> Result<ResolvedMedia> {
        let mut page = self.pool.acquire().await?;

        let tab = page.page();
        let url = self.target.url.clone();
        let navigation_timeout = self.navigation_timeout;
        let page_work = tokio::task::spawn_blocking(move || -> Result<PageMetadata> {
            tab.load(&url, navigation_timeout)?;
            PageMetadata::from_evaluation(tab.evaluate(METADATA_SCRIPT)?)
        });

        // The extractor future is dropped at the deadline; page work is always awaited.
        let extraction = tokio::time::timeout(
            self.extractor_timeout,
            self.extractor.extract(&self.target),
        );

        let (page_result, extraction_result) = tokio::join!(page_work, extraction);

        let page_result = page_result
            .map_err(|e| ResolverError::Internal(format!("page task failed: {}", e)))
            .and_then(|metadata| metadata);

        if let Err(e) = &page_result {
            log::warn!("⚠️ Page {} failed, discarding: {}", page.id(), e);
            page.discard();
        }
        drop(page);

        let candidates = match extraction_result {
            Ok(candidates) => candidates?,
            Err(_) => {
                log::warn!(
                    "⚠️ Extractor timed out after {:?} for {}",
                    self.extractor_timeout,
                    self.target.url
                );
                return Err(ResolverError::UpstreamTimeout(
                    self.extractor_timeout.as_secs(),
                ));
            }
        };
        let metadata = page_result?;
        let (download_url, media_type) = self.target.kind.select(&candidates)?;

        let media = ResolvedMedia::assemble(self.target.kind, metadata, download_url, media_type);
        self.cache.set(self.target.url, media.clone());
        Ok(media)
    }
}

// ============================================================================
// ScrapeOrchestratorBuilder
// ============================================================================

/// Builder for [`ScrapeOrchestrator`].
///
/// A browser factory and a default extractor are required.
pub struct ScrapeOrchestratorBuilder {
    config: Option<ResolverConfig>,
    factory: Option<Box<dyn BrowserFactory>>,
    extractor: Option<Arc<dyn MetadataExtractor>>,
    overrides: HashMap<ContentKind, Arc<dyn MetadataExtractor>>,
}

impl ScrapeOrchestratorBuilder {
    /// Create a new builder with defaults.
    pub fn new() -> Self {
        Self {
            config: None,
            factory: None,
            extractor: None,
            overrides: HashMap::new(),
        }
    }

    /// Set the configuration (defaults to [`ResolverConfig::default()`]).
    pub fn config(mut self, config: ResolverConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the browser factory (required).
    pub fn factory(mut self, factory: Box<dyn BrowserFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Set the default extractor (required).
    pub fn extractor<E: MetadataExtractor + 'static>(mut self, extractor: E) -> Self {
        self.extractor = Some(Arc::new(extractor));
        self
    }

    /// Use `extractor` for one content kind instead of the default.
    pub fn extractor_for<E: MetadataExtractor + 'static>(
        mut self,
        kind: ContentKind,
        extractor: E,
    ) -> Self {
        self.overrides.insert(kind, Arc::new(extractor));
        self
    }

    /// Build the orchestrator.
    ///
    /// # Errors
    ///
    /// Returns [`ResolverError::Configuration`] if the factory or the
    /// default extractor is missing.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime context.
    pub fn build(self) -> Result<ScrapeOrchestrator> {
        let config = self.config.unwrap_or_default();
        let factory = self.factory.ok_or_else(|| {
            ResolverError::Configuration("No browser factory provided".to_string())
        })?;
        let extractor = self.extractor.ok_or_else(|| {
            ResolverError::Configuration("No metadata extractor provided".to_string())
        })?;

        let pool = PagePool::builder()
            .config(config.clone())
            .factory(factory)
            .build()?;
        let queue = RequestQueue::new(config.queue_concurrency);
        let cache = TtlCache::new(config.cache_ttl);

        log::info!(
            "✅ Resolver ready (pages: {}, concurrency: {}, cache TTL: {}s)",
            config.max_pages,
            config.queue_concurrency,
            config.cache_ttl.as_secs()
        );

        Ok(ScrapeOrchestrator {
            config,
            pool: Arc::new(pool),
            queue,
            cache: Arc::new(cache),
            extractor,
            overrides: self.overrides,
        })
    }
}

impl Default for ScrapeOrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Environment Initialization (feature-gated)
// ============================================================================

/// Initialize a resolver from environment variables.
///
/// Reads the configuration with [`from_env`](crate::config::env::from_env),
/// launches Chrome from `CHROME_PATH` (or auto-detects it), uses
/// `EXTRACTOR_ENDPOINT` for posts and reels and, when set,
/// `PROFILE_API_ENDPOINT` for profile pictures. `EXTRACTOR_API_KEY` is sent
/// to both.
///
/// # Errors
///
/// Returns [`ResolverError::Configuration`] if the configuration is invalid
/// or `EXTRACTOR_ENDPOINT` is missing.
///
/// # Panics
///
/// Panics if called outside a tokio runtime context.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     env_logger::init();
///     let resolver = media_resolver::init_resolver()?;
///     // Use resolver in handlers...
///     Ok(())
/// }
/// ```
#[cfg(feature = "env-config")]
pub fn init_resolver() -> Result<crate::SharedResolver> {
    use crate::config::env::{
        chrome_path_from_env, extractor_api_key_from_env, extractor_endpoint_from_env, from_env,
        profile_endpoint_from_env,
    };
    use crate::extractor::{HttpMetadataExtractor, ProfilePictureExtractor};
    use crate::factory::ChromeBrowserFactory;

    log::info!("Initializing resolver from environment...");

    let config = from_env()?;
    let chrome_path = chrome_path_from_env();
    log::info!(
        "   - Chrome path: {}",
        chrome_path.as_deref().unwrap_or("auto-detect")
    );

    let factory = match chrome_path {
        Some(path) => ChromeBrowserFactory::with_path(path),
        None => ChromeBrowserFactory::with_defaults(),
    }
    .user_agent(config.user_agent.clone());

    let endpoint = extractor_endpoint_from_env().ok_or_else(|| {
        ResolverError::Configuration("EXTRACTOR_ENDPOINT is not set".to_string())
    })?;
    let api_key = extractor_api_key_from_env();
    log::info!("   - Extractor endpoint: {}", endpoint);

    let mut builder = ScrapeOrchestrator::builder()
        .config(config)
        .factory(Box::new(factory))
        .extractor(HttpMetadataExtractor::new(&endpoint, api_key.clone())?);

    match profile_endpoint_from_env() {
        Some(profile_endpoint) => {
            log::info!("   - Profile endpoint: {}", profile_endpoint);
            builder = builder.extractor_for(
                ContentKind::ProfilePicture,
                ProfilePictureExtractor::new(&profile_endpoint, api_key)?,
            );
        }
        None => {
            log::warn!(
                "⚠️ PROFILE_API_ENDPOINT not set, profile pictures use the default extractor"
            );
        }
    }

    let resolver = builder.build().map_err(|e| {
        log::error!("❌ Failed to create resolver: {}", e);
        e
    })?;

    Ok(Arc::new(resolver))
}

// ============================================================================
// Unit Tests
// ============================================================================
