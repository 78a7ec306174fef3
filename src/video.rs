//! Quick information about video-sharing links.
//!
//! [`video_id`] validates a YouTube watch, short, embed or `youtu.be` URL and
//! extracts its 11 character id. [`VideoInfoClient`] looks the id up in the
//! YouTube Data API (`videos?part=snippet`) and returns the title and the
//! best available thumbnail.
//!
//! Listing downloadable formats needs a signature-deciphering extraction
//! library and is not provided here.
//!
//! # Example
//!
//! ```rust
//! use media_resolver::video::video_id;
//!
//! assert_eq!(video_id("https://youtu.be/dQw4w9WgXcQ?t=42").unwrap(), "dQw4w9WgXcQ");
//! assert!(video_id("https://www.instagram.com/p/ABC/").is_err());
//! ```

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{ResolverError, Result};

/// YouTube Data API videos endpoint.
pub const DEFAULT_VIDEO_API_ENDPOINT: &str = "https://www.googleapis.com/youtube/v3/videos";

/// Deadline for one API lookup unless configured otherwise.
pub const DEFAULT_VIDEO_API_TIMEOUT: Duration = Duration::from_secs(15);

/// Hosts serving watch pages.
const WATCH_HOSTS: &[&str] = &[
    "youtube.com",
    "www.youtube.com",
    "m.youtube.com",
    "music.youtube.com",
    "gaming.youtube.com",
    "www.youtube-nocookie.com",
];

/// Short link host; the id is the first path segment.
const SHORT_HOST: &str = "youtu.be";

/// Path prefixes on watch hosts that carry the id as the next segment.
const ID_PATH_PREFIXES: &[&str] = &["embed", "v", "shorts", "live", "e"];

static VIDEO_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").unwrap());

fn invalid() -> ResolverError {
    ResolverError::InvalidInput("Please provide a valid YouTube URL".to_string())
}

/// Extract the video id from a YouTube URL.
///
/// Accepts `watch?v=<id>`, `/embed/<id>`, `/v/<id>`, `/shorts/<id>`,
/// `/live/<id>` on the YouTube hosts, and `youtu.be/<id>`. Ids longer than
/// 11 characters are cut to 11 before checking.
///
/// # Errors
///
/// Returns [`ResolverError::InvalidInput`] for any other URL.
pub fn video_id(url: &str) -> Result<String> {
    let parsed = Url::parse(url.trim()).map_err(|_| invalid())?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(invalid());
    }
    let host = parsed.host_str().ok_or_else(invalid)?.to_ascii_lowercase();

    let mut segments = parsed
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect::<Vec<_>>())
        .unwrap_or_default()
        .into_iter();

    let raw = if host == SHORT_HOST {
        segments.next().map(str::to_string)
    } else if WATCH_HOSTS.contains(&host.as_str()) {
        let from_query = parsed
            .query_pairs()
            .find(|(key, _)| key == "v")
            .map(|(_, value)| value.into_owned());
        from_query.or_else(|| match segments.next() {
            Some(prefix) if ID_PATH_PREFIXES.contains(&prefix) => {
                segments.next().map(str::to_string)
            }
            _ => None,
        })
    } else {
        None
    };

    let raw = raw.ok_or_else(invalid)?;
    let id: String = raw.chars().take(11).collect();
    if VIDEO_ID.is_match(&id) {
        Ok(id)
    } else {
        Err(invalid())
    }
}

/// Title and thumbnail of one video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoInfo {
    /// The 11 character video id.
    pub video_id: String,
    /// Video title.
    pub title: String,
    /// Largest of the `high`, `medium` and `default` thumbnails that exists.
    pub thumbnail: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VideoListResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
struct VideoItem {
    snippet: Snippet,
}

#[derive(Debug, Deserialize)]
struct Snippet {
    #[serde(default)]
    title: String,
    #[serde(default)]
    thumbnails: Thumbnails,
}

#[derive(Debug, Default, Deserialize)]
struct Thumbnails {
    high: Option<Thumbnail>,
    medium: Option<Thumbnail>,
    default: Option<Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

impl Thumbnails {
    fn best(self) -> Option<String> {
        self.high.or(self.medium).or(self.default).map(|t| t.url)
    }
}

/// Looks up video details in the YouTube Data API.
///
/// # Example
///
/// ```rust,ignore
/// use media_resolver::video::{VideoInfoClient, DEFAULT_VIDEO_API_ENDPOINT};
///
/// let key = std::env::var("YOUTUBE_API_KEY")?;
/// let client = VideoInfoClient::new(DEFAULT_VIDEO_API_ENDPOINT, key)?;
/// let info = client.quick_info("https://www.youtube.com/watch?v=dQw4w9WgXcQ").await?;
/// println!("{} {:?}", info.title, info.thumbnail);
/// ```
pub struct VideoInfoClient {
    client: reqwest::Client,
    endpoint: Url,
    api_key: String,
    timeout: Duration,
}

impl VideoInfoClient {
    /// Create a client for `endpoint` authenticated with `api_key`.
    ///
    /// # Errors
    ///
    /// Returns [`ResolverError::Configuration`] if the endpoint is not a
    /// valid URL, the key is blank, or the HTTP client cannot be built.
    pub fn new(endpoint: &str, api_key: impl Into<String>) -> Result<Self> {
        let endpoint = Url::parse(endpoint).map_err(|e| {
            ResolverError::Configuration(format!("invalid video API endpoint {}: {}", endpoint, e))
        })?;

        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ResolverError::Configuration(
                "YouTube API key is missing".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| ResolverError::Configuration(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint,
            api_key,
            timeout: DEFAULT_VIDEO_API_TIMEOUT,
        })
    }

    /// Set the lookup deadline.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Title and thumbnail of the video at `url`.
    ///
    /// # Errors
    ///
    /// - [`ResolverError::InvalidInput`] if `url` is not a YouTube video URL
    /// - [`ResolverError::NoMediaFound`] if the API knows no such video
    /// - [`ResolverError::ExtractorFailed`] if the API fails or answers garbage
    /// - [`ResolverError::UpstreamTimeout`] if the API does not answer in time
    pub async fn quick_info(&self, url: &str) -> Result<VideoInfo> {
        let id = video_id(url)?;
        log::debug!(" Looking up video {}", id);

        let request = self
            .client
            .get(self.endpoint.clone())
            .query(&[
                ("part", "snippet"),
                ("id", id.as_str()),
                ("key", self.api_key.as_str()),
            ])
            .send();

        let response = tokio::time::timeout(self.timeout, request)
            .await
            .map_err(|_| {
                log::warn!("⚠️ Video API timed out after {:?}", self.timeout);
                ResolverError::UpstreamTimeout(self.timeout.as_secs())
            })?
            .map_err(|e| ResolverError::ExtractorFailed(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            log::warn!("⚠️ Video API returned HTTP {} for {}", status, id);
            return Err(ResolverError::ExtractorFailed(format!(
                "video API returned HTTP {}",
                status
            )));
        }

        // Error URLs carry the API key.
        let body: VideoListResponse = response.json().await.map_err(|e| {
            ResolverError::ExtractorFailed(format!("unreadable response: {}", e.without_url()))
        })?;

        let item = body
            .items
            .into_iter()
            .next()
            .ok_or_else(|| ResolverError::NoMediaFound("Video not found".to_string()))?;

        log::info!("✅ Video {} found", id);
        Ok(VideoInfo {
            video_id: id,
            title: item.snippet.title,
            thumbnail: item.snippet.thumbnails.best(),
        })
    }
}

impl std::fmt::Debug for VideoInfoClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoInfoClient")
            .field("endpoint", &self.endpoint.as_str())
            .field("api_key", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Query;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::{Json, Router};
    use std::collections::HashMap;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}/videos", addr)
    }

    #[test]
    fn test_video_id_forms() {
        for url in [
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://youtube.com/watch?feature=share&v=dQw4w9WgXcQ",
            "https://m.youtube.com/watch?v=dQw4w9WgXcQ&t=10s",
            "https://youtu.be/dQw4w9WgXcQ?si=abc",
            "https://www.youtube.com/shorts/dQw4w9WgXcQ",
            "https://www.youtube.com/embed/dQw4w9WgXcQ",
            "http://www.youtube.com/v/dQw4w9WgXcQ",
            "https://www.youtube.com/live/dQw4w9WgXcQ?feature=share",
            "https://www.youtube.com/watch?v=dQw4w9WgXcQextra",
        ] {
            assert_eq!(video_id(url).unwrap(), "dQw4w9WgXcQ", "{}", url);
        }
    }

    #[test]
    fn test_video_id_rejects() {
        for url in [
            "",
            "not a url",
            "ftp://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://www.youtube.com/",
            "https://www.youtube.com/watch?v=short",
            "https://www.youtube.com/channel/UC123",
            "https://youtu.be/",
            "https://notyoutube.com/watch?v=dQw4w9WgXcQ",
            "https://www.instagram.com/reel/Cx1_ab/",
        ] {
            assert!(
                matches!(video_id(url), Err(ResolverError::InvalidInput(_))),
                "{:?} should be rejected",
                url
            );
        }
    }

    /// Verifies the query sent to the API and the fields read back.
    #[tokio::test]
    async fn test_quick_info_reads_snippet() {
        let router = Router::new().route(
            "/videos",
            get(|Query(query): Query<HashMap<String, String>>| async move {
                assert_eq!(query["part"], "snippet");
                assert_eq!(query["id"], "dQw4w9WgXcQ");
                assert_eq!(query["key"], "secret");
                Json(serde_json::json!({
                    "items": [{
                        "snippet": {
                            "title": "Never Gonna Give You Up",
                            "thumbnails": {
                                "default": { "url": "https://i.ytimg.com/vi/dQw4w9WgXcQ/default.jpg" },
                                "high": { "url": "https://i.ytimg.com/vi/dQw4w9WgXcQ/hqdefault.jpg" }
                            }
                        }
                    }]
                }))
            }),
        );
        let endpoint = serve(router).await;

        let client = VideoInfoClient::new(&endpoint, "secret").unwrap();
        let info = client
            .quick_info("https://youtu.be/dQw4w9WgXcQ")
            .await
            .unwrap();

        assert_eq!(
            info,
            VideoInfo {
                video_id: "dQw4w9WgXcQ".to_string(),
                title: "Never Gonna Give You Up".to_string(),
                thumbnail: Some("https://i.ytimg.com/vi/dQw4w9WgXcQ/hqdefault.jpg".to_string()),
            }
        );

        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["videoId"], "dQw4w9WgXcQ");
    }

    #[tokio::test]
    async fn test_quick_info_not_found() {
        let router = Router::new().route(
            "/videos",
            get(|| async { Json(serde_json::json!({ "items": [] })) }),
        );
        let endpoint = serve(router).await;

        let client = VideoInfoClient::new(&endpoint, "secret").unwrap();
        assert_eq!(
            client
                .quick_info("https://www.youtube.com/watch?v=dQw4w9WgXcQ")
                .await,
            Err(ResolverError::NoMediaFound("Video not found".to_string()))
        );
    }

    #[tokio::test]
    async fn test_quick_info_api_error() {
        let router = Router::new().route(
            "/videos",
            get(|| async { (StatusCode::FORBIDDEN, "quotaExceeded") }),
        );
        let endpoint = serve(router).await;

        let client = VideoInfoClient::new(&endpoint, "secret").unwrap();
        match client
            .quick_info("https://www.youtube.com/watch?v=dQw4w9WgXcQ")
            .await
        {
            Err(ResolverError::ExtractorFailed(msg)) => assert!(msg.contains("403")),
            other => panic!("Expected ExtractorFailed, got {:?}", other),
        }
    }

    /// Verifies that an invalid URL fails before any request is made.
    #[tokio::test]
    async fn test_quick_info_invalid_url() {
        let client = VideoInfoClient::new("http://127.0.0.1:9/videos", "secret").unwrap();

        assert!(matches!(
            client.quick_info("https://www.instagram.com/p/ABC/").await,
            Err(ResolverError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_client_configuration() {
        assert!(matches!(
            VideoInfoClient::new("not a url", "secret"),
            Err(ResolverError::Configuration(_))
        ));
        assert!(matches!(
            VideoInfoClient::new(DEFAULT_VIDEO_API_ENDPOINT, "  "),
            Err(ResolverError::Configuration(_))
        ));

        let client = VideoInfoClient::new(DEFAULT_VIDEO_API_ENDPOINT, "secret").unwrap();
        assert!(!format!("{:?}", client).contains("secret"));
    }
}
