//! Streaming download proxy.
//!
//! [`DownloadProxy::stream`] opens a GET against a resolved media URL and
//! hands back a [`MediaStream`]: the attachment filename, the upstream
//! content type and length, and the body as a stream of chunks. Nothing is
//! buffered beyond a single chunk.
//!
//! Failures before the upstream headers arrive are returned as
//! [`ResolverError::DownloadFailed`]. Failures mid-transfer end the stream
//! with an error item; the client sees a truncated file.
//!
//! # Private Addresses
//!
//! Unless [`ResolverConfig::allow_private_downloads`] is set, URLs whose host
//! is `localhost` or resolves to a loopback, private, link-local, shared or
//! unspecified address are rejected as [`ResolverError::InvalidInput`].
//! Redirects to such literal addresses are refused as well.
//!
//! # Example
//!
//! ```rust,ignore
//! use media_resolver::DownloadProxy;
//! use std::time::Duration;
//!
//! let proxy = DownloadProxy::new(Duration::from_secs(30), "my-agent/1.0")?;
//! let media = proxy.stream("https://cdn.example/clip.mp4", Some("clip.mp4")).await?;
//! println!("{} ({:?})", media.content_disposition(), media.content_type);
//! ```

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::time::Duration;

use bytes::Bytes;
use futures::StreamExt;
use futures::stream::BoxStream;
use url::{Host, Url};

use crate::config::ResolverConfig;
use crate::error::{ResolverError, Result};

/// Redirects followed before giving up.
const MAX_REDIRECTS: usize = 10;

/// Filename used when the caller gives none.
pub const DEFAULT_FILENAME: &str = "instagram-content";

/// Content type used when the upstream sends none.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// A media body ready to be forwarded.
pub struct MediaStream {
    /// Sanitised attachment filename.
    pub filename: String,
    /// Upstream `Content-Type`, or [`DEFAULT_CONTENT_TYPE`].
    pub content_type: String,
    /// Upstream `Content-Length`, when known.
    pub content_length: Option<u64>,
    /// Body chunks as they arrive.
    pub body: BoxStream<'static, std::result::Result<Bytes, ResolverError>>,
}

impl MediaStream {
    /// `Content-Disposition` value marking the body as an attachment.
    ///
    /// Carries a plain ASCII `filename` and an RFC 5987 `filename*` with the
    /// exact UTF-8 name.
    pub fn content_disposition(&self) -> String {
        let ascii: String = self
            .filename
            .chars()
            .map(|c| if c.is_ascii() { c } else { '_' })
            .collect();

        format!(
            "attachment; filename=\"{}\"; filename*=UTF-8''{}",
            ascii,
            urlencoding::encode(&self.filename)
        )
    }
}

impl std::fmt::Debug for MediaStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaStream")
            .field("filename", &self.filename)
            .field("content_type", &self.content_type)
            .field("content_length", &self.content_length)
            .finish()
    }
}

/// Strip characters that could break the header or name a path.
///
/// Returns [`DEFAULT_FILENAME`] when nothing usable is left.
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| !c.is_control() && !matches!(c, '"' | '\\' | '/' | ';'))
        .collect();
    let cleaned = cleaned.trim().trim_start_matches('.').trim();

    if cleaned.is_empty() {
        DEFAULT_FILENAME.to_string()
    } else {
        cleaned.to_string()
    }
}

fn is_private_v4(ip: Ipv4Addr) -> bool {
    let [a, b, ..] = ip.octets();
    ip.is_loopback()
        || ip.is_private()
        || ip.is_link_local()
        || ip.is_unspecified()
        || ip.is_broadcast()
        // 100.64.0.0/10 shared address space
        || (a == 100 && (b & 0xc0) == 64)
}

fn is_private_v6(ip: Ipv6Addr) -> bool {
    let first = ip.segments()[0];
    ip.is_loopback()
        || ip.is_unspecified()
        // fc00::/7 unique local, fe80::/10 link-local
        || (first & 0xfe00) == 0xfc00
        || (first & 0xffc0) == 0xfe80
        || ip.to_ipv4_mapped().is_some_and(is_private_v4)
}

/// Whether `ip` is an address the proxy must not reach on a client's behalf.
pub fn is_private_address(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_private_v4(v4),
        IpAddr::V6(v6) => is_private_v6(v6),
    }
}

/// Checks the host of `url` without resolving names.
///
/// Returns `false` for `localhost` names and private IP literals.
fn is_public_literal(url: &Url) -> bool {
    match url.host() {
        Some(Host::Ipv4(ip)) => !is_private_v4(ip),
        Some(Host::Ipv6(ip)) => !is_private_v6(ip),
        Some(Host::Domain(domain)) => {
            let domain = domain.trim_end_matches('.').to_ascii_lowercase();
            domain != "localhost" && !domain.ends_with(".localhost")
        }
        None => false,
    }
}

fn blocked_host() -> ResolverError {
    ResolverError::InvalidInput("Download host is not allowed".to_string())
}

/// Streams upstream media to clients.
pub struct DownloadProxy {
    client: reqwest::Client,
    timeout: Duration,
    allow_private: bool,
}

impl DownloadProxy {
    /// Create a proxy that refuses private addresses.
    ///
    /// `timeout` bounds both the wait for the upstream response headers and
    /// each individual body read.
    ///
    /// # Errors
    ///
    /// Returns [`ResolverError::Configuration`] if the HTTP client cannot be
    /// built.
    pub fn new(timeout: Duration, user_agent: impl Into<String>) -> Result<Self> {
        Self::build(timeout, user_agent.into(), false)
    }

    /// Create a proxy from the download settings of `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ResolverError::Configuration`] if the HTTP client cannot be
    /// built.
    pub fn from_config(config: &ResolverConfig) -> Result<Self> {
        Self::build(
            config.download_timeout,
            config.user_agent.clone(),
            config.allow_private_downloads,
        )
    }

    fn build(timeout: Duration, user_agent: String, allow_private: bool) -> Result<Self> {
        let redirects = reqwest::redirect::Policy::custom(move |attempt| {
            if attempt.previous().len() >= MAX_REDIRECTS {
                attempt.error("too many redirects")
            } else if !allow_private && !is_public_literal(attempt.url()) {
                log::warn!("⚠️ Refusing redirect to {}", attempt.url());
                attempt.error("redirect to a private address")
            } else {
                attempt.follow()
            }
        });

        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .read_timeout(timeout)
            .redirect(redirects)
            .build()
            .map_err(|e| ResolverError::Configuration(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            timeout,
            allow_private,
        })
    }

    /// Reject hosts that name or resolve to a private address.
    async fn check_host(&self, url: &Url) -> Result<()> {
        if self.allow_private {
            return Ok(());
        }
        if !is_public_literal(url) {
            log::warn!("⚠️ Refusing download from private host: {}", url);
            return Err(blocked_host());
        }

        let Some(Host::Domain(domain)) = url.host() else {
            return Ok(());
        };
        let port = url.port_or_known_default().unwrap_or(443);
        let addrs = tokio::net::lookup_host((domain, port)).await.map_err(|e| {
            ResolverError::DownloadFailed(format!("cannot resolve {}: {}", domain, e))
        })?;

        for addr in addrs {
            if is_private_address(addr.ip()) {
                log::warn!("⚠️ {} resolves to private address {}", domain, addr.ip());
                return Err(blocked_host());
            }
        }
        Ok(())
    }

    /// Open `url` for streaming.
    ///
    /// # Errors
    ///
    /// - [`ResolverError::InvalidInput`] if `url` is not an http(s) URL, or
    ///   its host is private and private downloads are not allowed
    /// - [`ResolverError::DownloadFailed`] if the upstream cannot be reached,
    ///   does not answer within the timeout, or answers with a non-2xx status
    pub async fn stream(&self, url: &str, filename: Option<&str>) -> Result<MediaStream> {
        let parsed = Url::parse(url.trim())
            .ok()
            .filter(|u| matches!(u.scheme(), "http" | "https"))
            .ok_or_else(|| {
                ResolverError::InvalidInput("Please provide a valid download URL".to_string())
            })?;

        self.check_host(&parsed).await?;

        let filename = sanitize_filename(filename.unwrap_or(DEFAULT_FILENAME));
        log::info!("⬇️ Download started: {} as {}", parsed, filename);

        let response = tokio::time::timeout(self.timeout, self.client.get(parsed.clone()).send())
            .await
            .map_err(|_| {
                log::warn!("⚠️ Download of {} timed out after {:?}", parsed, self.timeout);
                ResolverError::DownloadFailed(format!(
                    "upstream did not respond within {}s",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| {
                log::warn!("⚠️ Download of {} failed: {}", parsed, e);
                ResolverError::DownloadFailed(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            log::warn!("⚠️ Upstream returned HTTP {} for {}", status, parsed);
            return Err(ResolverError::DownloadFailed(format!(
                "upstream returned HTTP {}",
                status
            )));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();
        let content_length = response.content_length();

        let source = parsed.to_string();
        let body = response
            .bytes_stream()
            .map(move |chunk| {
                chunk.map_err(|e| {
                    log::warn!("⚠️ Download of {} interrupted: {}", source, e);
                    ResolverError::DownloadFailed(e.to_string())
                })
            })
            .boxed();

        Ok(MediaStream {
            filename,
            content_type,
            content_length,
            body,
        })
    }
}

impl std::fmt::Debug for DownloadProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadProxy")
            .field("timeout", &self.timeout)
            .field("allow_private", &self.allow_private)
            .finish()
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
