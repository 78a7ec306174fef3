//! Axum HTTP surface.
//!
//! Thin adapters from HTTP onto [`ScrapeOrchestrator`](crate::ScrapeOrchestrator),
//! [`RateLimiter`] and [`DownloadProxy`].
//!
//! # Routes
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | POST | `/api/resolve` | Resolve `{ "url" }`, kind detected from the URL |
//! | POST | `/api/resolve/{kind}` | Resolve as `post`, `reel` or `profile` |
//! | GET | `/download?url=&filename=` | Stream a resolved media URL |
//! | GET | `/download-pic?url=` | Same, default filename `profile-pic.jpg` |
//! | GET | `/quick-info?url=` | Title and thumbnail of a YouTube video |
//! | GET | `/health` | Liveness |
//! | GET | `/stats` | Pool, queue, cache and limiter counts |
//!
//! Resolution and quick-info routes are rate limited per client. The client is the peer
//! address, or the first `X-Forwarded-For` hop when
//! [`AppState::trust_proxy_headers`] is set.
//!
//! Failures answer `{ "success": false, "message", "code" }` with the
//! status of [`ResolverError::status_code`]; `429` responses also carry
//! `Retry-After`.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::net::SocketAddr;
//! use media_resolver::integrations::axum::{AppState, router, shutdown_signal};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let resolver = media_resolver::init_resolver()?;
//!     let state = AppState::new(resolver)?;
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3001").await?;
//!     axum::serve(
//!         listener,
//!         router(state.clone()).into_make_service_with_connect_info::<SocketAddr>(),
//!     )
//!     .with_graceful_shutdown(shutdown_signal(state))
//!     .await?;
//!     Ok(())
//! }
//! ```

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::{ConnectInfo, FromRequestParts, Path, Query, State};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::SharedResolver;
use crate::content::{ContentKind, ResolvedMedia};
use crate::download::DownloadProxy;
use crate::error::{ErrorResponse, ResolverError, Result};
use crate::rate_limit::RateLimiter;
use crate::stats::ResolverStats;
use crate::video::{VideoInfo, VideoInfoClient};

/// Base URL used to turn a bare username into a profile URL.
const PROFILE_BASE_URL: &str = "https://www.instagram.com";

// ============================================================================
// State
// ============================================================================

/// Shared state of the HTTP surface.
#[derive(Clone)]
pub struct AppState {
    /// The resolver.
    pub resolver: SharedResolver,
    /// Per-client limiter for resolution routes.
    pub limiter: Arc<RateLimiter>,
    /// Download proxy.
    pub proxy: Arc<DownloadProxy>,
    /// Take client identity from `X-Forwarded-For`.
    pub trust_proxy_headers: bool,
    /// Video lookups; `/quick-info` fails without one.
    pub video: Option<Arc<VideoInfoClient>>,
}

impl AppState {
    /// Build state around `resolver`, sizing the limiter and the download
    /// proxy from its configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ResolverError::Configuration`] if the download client
    /// cannot be built.
    pub fn new(resolver: SharedResolver) -> Result<Self> {
        let config = resolver.config();
        let limiter = RateLimiter::new(config.rate_limit_window, config.rate_limit_max_requests);
        let proxy = DownloadProxy::from_config(config)?;

        Ok(Self {
            resolver,
            limiter: Arc::new(limiter),
            proxy: Arc::new(proxy),
            trust_proxy_headers: false,
            video: None,
        })
    }

    /// Enable `/quick-info` with `client`.
    pub fn video_info(mut self, client: VideoInfoClient) -> Self {
        self.video = Some(Arc::new(client));
        self
    }

    /// Set whether `X-Forwarded-For` identifies the client.
    pub fn trust_proxy_headers(mut self, trust: bool) -> Self {
        self.trust_proxy_headers = trust;
        self
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("resolver", &self.resolver)
            .field("trust_proxy_headers", &self.trust_proxy_headers)
            .field("video", &self.video)
            .finish()
    }
}

/// Build the router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/resolve", post(resolve))
        .route("/api/resolve/{kind}", post(resolve_kind))
        .route("/download", get(download))
        .route("/download-pic", get(download_profile_picture))
        .route("/quick-info", get(quick_info))
        .route("/health", get(health))
        .route("/stats", get(stats))
        .with_state(state)
}

// ============================================================================
// Client Identity
// ============================================================================

/// Identity used for rate limiting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientId(pub String);

impl FromRequestParts<AppState> for ClientId {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> std::result::Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);

        Ok(ClientId(client_identity(
            &parts.headers,
            peer,
            state.trust_proxy_headers,
        )))
    }
}

/// First `X-Forwarded-For` hop when trusted, else the peer IP.
fn client_identity(headers: &HeaderMap, peer: Option<SocketAddr>, trust_proxy: bool) -> String {
    if trust_proxy {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|hop| !hop.is_empty());

        if let Some(hop) = forwarded {
            return hop.to_string();
        }
    }

    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

// ============================================================================
// Request / Response Types
// ============================================================================

/// Body of the resolution routes.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResolveRequest {
    /// Content URL.
    #[serde(default)]
    pub url: Option<String>,
    /// Username, accepted by the profile route instead of a URL.
    #[serde(default)]
    pub username: Option<String>,
}

/// Query of the download routes.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DownloadQuery {
    /// Direct media URL.
    #[serde(default)]
    pub url: Option<String>,
    /// Attachment filename.
    #[serde(default)]
    pub filename: Option<String>,
}

#[derive(Serialize)]
struct ResolveResponse {
    success: bool,
    #[serde(flatten)]
    media: ResolvedMedia,
}

/// Query of the quick-info route.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuickInfoQuery {
    /// Video URL.
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Serialize)]
struct QuickInfoResponse {
    success: bool,
    #[serde(flatten)]
    info: VideoInfo,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatsResponse {
    #[serde(flatten)]
    resolver: ResolverStats,
    tracked_clients: usize,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

impl IntoResponse for ResolverError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            log::error!("❌ Request failed: {} (HTTP {})", self, status.as_u16());
        } else {
            log::debug!("Request rejected: {} (HTTP {})", self, status.as_u16());
        }

        let mut response = (status, Json(ErrorResponse::from(&self))).into_response();
        if let ResolverError::RateLimited { retry_after_secs } = self {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
        }
        response
    }
}

// ============================================================================
// Handlers
// ============================================================================

fn missing_url() -> ResolverError {
    ResolverError::InvalidInput("Please provide a valid Instagram URL".to_string())
}

fn read_body(
    body: std::result::Result<Json<ResolveRequest>, JsonRejection>,
) -> Result<ResolveRequest> {
    body.map(|Json(request)| request).map_err(|e| {
        ResolverError::InvalidInput(format!("Invalid request body: {}", e.body_text()))
    })
}

/// `POST /api/resolve`
pub async fn resolve(
    State(state): State<AppState>,
    ClientId(client): ClientId,
    body: std::result::Result<Json<ResolveRequest>, JsonRejection>,
) -> Result<Response> {
    state.limiter.check(&client)?;

    let url = read_body(body)?.url.ok_or_else(missing_url)?;
    let media = state.resolver.resolve(&url).await?;

    Ok(Json(ResolveResponse {
        success: true,
        media,
    })
    .into_response())
}

/// `POST /api/resolve/{kind}`
pub async fn resolve_kind(
    State(state): State<AppState>,
    ClientId(client): ClientId,
    Path(kind): Path<String>,
    body: std::result::Result<Json<ResolveRequest>, JsonRejection>,
) -> Result<Response> {
    state.limiter.check(&client)?;

    let kind: ContentKind = kind.parse()?;
    let request = read_body(body)?;
    let url = match (request.url, request.username) {
        (Some(url), _) => url,
        (None, Some(username)) if kind == ContentKind::ProfilePicture => {
            format!("{}/{}/", PROFILE_BASE_URL, username.trim().trim_start_matches('@'))
        }
        _ => return Err(missing_url()),
    };

    let media = state.resolver.resolve_as(kind, &url).await?;

    Ok(Json(ResolveResponse {
        success: true,
        media,
    })
    .into_response())
}

/// `GET /download`
pub async fn download(
    State(state): State<AppState>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response> {
    stream_media(&state, query, ContentKind::Post.default_filename()).await
}

/// `GET /download-pic`
pub async fn download_profile_picture(
    State(state): State<AppState>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response> {
    stream_media(
        &state,
        query,
        ContentKind::ProfilePicture.default_filename(),
    )
    .await
}

async fn stream_media(
    state: &AppState,
    query: DownloadQuery,
    default_filename: &str,
) -> Result<Response> {
    let url = query.url.ok_or_else(|| {
        ResolverError::InvalidInput("Please provide a valid download URL".to_string())
    })?;
    let filename = query.filename.as_deref().unwrap_or(default_filename);

    let media = state.proxy.stream(&url, Some(filename)).await?;

    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, media.content_type.as_str())
        .header(header::CONTENT_DISPOSITION, media.content_disposition())
        .header(header::CACHE_CONTROL, "no-cache");
    if let Some(length) = media.content_length {
        builder = builder.header(header::CONTENT_LENGTH, length);
    }

    builder
        .body(Body::from_stream(media.body))
        .map_err(|e| ResolverError::Internal(format!("response headers: {}", e)))
}

/// `GET /quick-info`
pub async fn quick_info(
    State(state): State<AppState>,
    ClientId(client): ClientId,
    Query(query): Query<QuickInfoQuery>,
) -> Result<Response> {
    state.limiter.check(&client)?;

    let url = query
        .url
        .filter(|url| !url.trim().is_empty())
        .ok_or_else(|| ResolverError::InvalidInput("URL is required".to_string()))?;
    let video = state.video.as_ref().ok_or_else(|| {
        ResolverError::Configuration("YouTube API key is missing".to_string())
    })?;

    let info = video.quick_info(&url).await?;

    Ok(Json(QuickInfoResponse {
        success: true,
        info,
    })
    .into_response())
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Response {
    if state.resolver.is_shutting_down() {
        return ResolverError::ShuttingDown.into_response();
    }

    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
    .into_response()
}

/// `GET /stats`
pub async fn stats(State(state): State<AppState>) -> Response {
    Json(StatsResponse {
        resolver: state.resolver.stats(),
        tracked_clients: state.limiter.tracked_clients(),
    })
    .into_response()
}

// ============================================================================
// Graceful Shutdown
// ============================================================================

/// Wait for ctrl-c or SIGTERM, then shut the resolver down.
///
/// Pass to `axum::serve(..).with_graceful_shutdown(..)`.
pub async fn shutdown_signal(state: AppState) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("❌ Failed to listen for ctrl+c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                log::error!("❌ Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    log::info!("Shutdown signal received");
    state.resolver.shutdown_async().await;
}

// ============================================================================
// Unit Tests
// ============================================================================
