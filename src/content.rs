//! Supported content kinds and their per-kind rules.
//!
//! Each [`ContentKind`] supplies:
//!
//! | Rule | Post | Reel | Profile picture |
//! |------|------|------|-----------------|
//! | URL path | `/p/<code>` | `/reel/<code>`, `/reels/<code>` | `/<username>/` |
//! | Accepted candidate | video, else image | video | full-resolution CDN image |
//! | Result `type` | `post` | `reel` | `profile` |
//! | Download filename | `instagram-content` | `instagram-content` | `profile-pic.jpg` |
//!
//! Page metadata ([`PageMetadata`]) is read the same way for every kind.
//!
//! # Example
//!
//! ```rust
//! use media_resolver::{ContentKind, ResolverConfig};
//!
//! let config = ResolverConfig::default();
//! let target = ContentKind::detect("https://www.instagram.com/reel/Cx1_ab/", &config).unwrap();
//!
//! assert_eq!(target.kind, ContentKind::Reel);
//! assert_eq!(target.identifier, "Cx1_ab");
//! ```

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::ResolverConfig;
use crate::error::{ResolverError, Result};

/// Fallback title when the document has none.
pub const DEFAULT_TITLE: &str = "Instagram Content";

/// Titles are cut to this many characters.
pub const MAX_TITLE_CHARS: usize = 50;

static POST_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/p/([A-Za-z0-9_-]+)(?:/.*)?$").unwrap());

static REEL_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/reels?/([A-Za-z0-9_-]+)(?:/.*)?$").unwrap());

static PROFILE_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/([A-Za-z0-9._]{1,30})/?$").unwrap());

/// Resize marker on profile CDN URLs, e.g. `_s150x150`.
static SIZE_MARKER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"_s\d+x\d+").unwrap());

/// First path segments that are site sections, not usernames.
const RESERVED_SEGMENTS: &[&str] = &[
    "p", "reel", "reels", "tv", "stories", "explore", "accounts", "direct", "about",
    "developer", "legal", "api", "web", "challenge", "emails", "session",
];

/// A supported kind of content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    /// A feed post (`/p/<code>`), photo or video.
    Post,
    /// A reel (`/reel/<code>`), always video.
    Reel,
    /// A profile's full-resolution picture (`/<username>/`).
    #[serde(rename = "profile")]
    ProfilePicture,
}

impl ContentKind {
    /// All kinds, in detection order.
    pub const ALL: [ContentKind; 3] = [
        ContentKind::Post,
        ContentKind::Reel,
        ContentKind::ProfilePicture,
    ];

    /// Value of the `type` field in resolved results.
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Post => "post",
            ContentKind::Reel => "reel",
            ContentKind::ProfilePicture => "profile",
        }
    }

    /// Filename offered when downloading this kind without an explicit one.
    pub fn default_filename(&self) -> &'static str {
        match self {
            ContentKind::Post | ContentKind::Reel => "instagram-content",
            ContentKind::ProfilePicture => "profile-pic.jpg",
        }
    }

    fn path_pattern(&self) -> &'static Regex {
        match self {
            ContentKind::Post => &POST_PATH,
            ContentKind::Reel => &REEL_PATH,
            ContentKind::ProfilePicture => &PROFILE_PATH,
        }
    }

    /// Check that `url` is a URL of this kind on an allowed host.
    ///
    /// # Errors
    ///
    /// Returns [`ResolverError::InvalidInput`] if the URL does not parse,
    /// is not http(s), names a host outside `allowed_hosts`, or has a path
    /// that does not match this kind.
    pub fn validate(&self, url: &str, config: &ResolverConfig) -> Result<MediaTarget> {
        let invalid = || {
            ResolverError::InvalidInput(format!(
                "Please provide a valid Instagram {} URL",
                self.as_str()
            ))
        };

        let parsed = parse_allowed(url, config).map_err(|_| invalid())?;
        let identifier = self.match_path(parsed.path()).ok_or_else(invalid)?;

        Ok(MediaTarget {
            kind: *self,
            url: url.trim().to_string(),
            identifier,
        })
    }

    fn match_path(&self, path: &str) -> Option<String> {
        let captures = self.path_pattern().captures(path)?;
        let identifier = captures.get(1)?.as_str();

        if *self == ContentKind::ProfilePicture
            && RESERVED_SEGMENTS.contains(&identifier.to_ascii_lowercase().as_str())
        {
            return None;
        }

        Some(identifier.to_string())
    }

    /// Work out which kind `url` is and validate it as that kind.
    ///
    /// # Errors
    ///
    /// Returns [`ResolverError::InvalidInput`] if the URL matches no kind.
    pub fn detect(url: &str, config: &ResolverConfig) -> Result<MediaTarget> {
        let parsed = parse_allowed(url, config)?;

        Self::ALL
            .iter()
            .find_map(|kind| {
                kind.match_path(parsed.path()).map(|identifier| MediaTarget {
                    kind: *kind,
                    url: url.trim().to_string(),
                    identifier,
                })
            })
            .ok_or_else(|| {
                ResolverError::InvalidInput(
                    "URL is not a supported Instagram post, reel or profile".to_string(),
                )
            })
    }

    /// Pick the download URL for this kind from the extractor's candidates.
    ///
    /// The first acceptable candidate wins.
    ///
    /// # Errors
    ///
    /// Returns [`ResolverError::NoMediaFound`] when no candidate is acceptable.
    pub fn select(&self, candidates: &[String]) -> Result<(String, MediaType)> {
        let first_of = |wanted: MediaType| {
            candidates
                .iter()
                .find(|c| MediaType::of(c) == Some(wanted))
                .map(|c| (c.clone(), wanted))
        };

        let selected = match self {
            ContentKind::Post => first_of(MediaType::Video).or_else(|| first_of(MediaType::Image)),
            ContentKind::Reel => first_of(MediaType::Video),
            ContentKind::ProfilePicture => candidates
                .iter()
                .find(|c| is_full_resolution_profile_picture(c))
                .map(|c| (c.clone(), MediaType::Image)),
        };

        selected.ok_or_else(|| {
            ResolverError::NoMediaFound(format!(
                "no {} candidate among {} extractor results",
                match self {
                    ContentKind::Post => "media",
                    ContentKind::Reel => "video",
                    ContentKind::ProfilePicture => "full-resolution profile picture",
                },
                candidates.len()
            ))
        })
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentKind {
    type Err = ResolverError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "post" => Ok(ContentKind::Post),
            "reel" | "reels" => Ok(ContentKind::Reel),
            "profile" | "profile-pic" | "profile-picture" => Ok(ContentKind::ProfilePicture),
            other => Err(ResolverError::InvalidInput(format!(
                "Unsupported content kind: {}",
                other
            ))),
        }
    }
}

fn parse_allowed(url: &str, config: &ResolverConfig) -> Result<Url> {
    let parsed = Url::parse(url.trim())
        .map_err(|e| ResolverError::InvalidInput(format!("Malformed URL: {}", e)))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ResolverError::InvalidInput(
            "URL must use http or https".to_string(),
        ));
    }

    match parsed.host_str() {
        Some(host) if config.is_allowed_host(host) => Ok(parsed),
        _ => Err(ResolverError::InvalidInput(
            "URL host is not supported".to_string(),
        )),
    }
}

/// Whether `candidate` is a signed, unresized profile picture on the CDN.
pub fn is_full_resolution_profile_picture(candidate: &str) -> bool {
    candidate.contains("instagram.f")
        && candidate.contains("/t51.2885-19/")
        && !SIZE_MARKER.is_match(candidate)
        && candidate.contains("oh=")
        && candidate.contains("oe=")
}

/// A validated resolution request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaTarget {
    /// Kind the URL was validated as.
    pub kind: ContentKind,
    /// The URL as submitted (trimmed); also the cache key.
    pub url: String,
    /// Shortcode for posts and reels, username for profiles.
    pub identifier: String,
}

/// Coarse media type of a download URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    /// Video container (`.mp4`, `.mov`, `.webm`, `.m4v`).
    Video,
    /// Still image (`.jpg`, `.jpeg`, `.png`, `.webp`, `.heic`).
    Image,
}

impl MediaType {
    /// Classify a candidate URL by the extension of its path.
    ///
    /// Candidates that do not parse as URLs are classified by substring, so
    /// `.mp4` anywhere marks a video.
    pub fn of(candidate: &str) -> Option<MediaType> {
        let path = Url::parse(candidate)
            .map(|u| u.path().to_ascii_lowercase())
            .unwrap_or_else(|_| candidate.to_ascii_lowercase());

        let extension = path.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("");
        match extension {
            "mp4" | "mov" | "webm" | "m4v" => Some(MediaType::Video),
            "jpg" | "jpeg" | "png" | "webp" | "heic" => Some(MediaType::Image),
            _ if path.contains(".mp4") => Some(MediaType::Video),
            _ => None,
        }
    }
}

/// Script evaluated in the loaded page; returns the metadata as a JSON string.
pub const METADATA_SCRIPT: &str = r#"JSON.stringify((() => {
    const meta = (property) => {
        const el = document.querySelector(`meta[property="${property}"]`);
        return el && el.content ? el.content : null;
    };
    return {
        thumbnail: meta("og:image"),
        title: document.title || null,
        username: meta("og:title"),
    };
})())"#;

/// Metadata read from the rendered page.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct PageMetadata {
    /// Document title, at most [`MAX_TITLE_CHARS`] characters.
    #[serde(default)]
    pub title: Option<String>,
    /// `og:image` content.
    #[serde(default)]
    pub thumbnail: Option<String>,
    /// `og:title` content.
    #[serde(default)]
    pub username: Option<String>,
}

impl PageMetadata {
    /// Decode the value produced by [`METADATA_SCRIPT`].
    ///
    /// Accepts the JSON string the script returns, or an already decoded
    /// object. Missing values stay `None`.
    ///
    /// # Errors
    ///
    /// Returns [`ResolverError::PageLoadFailed`] if the value is not metadata.
    pub fn from_evaluation(value: Option<serde_json::Value>) -> Result<Self> {
        let decoded: PageMetadata = match value {
            None | Some(serde_json::Value::Null) => PageMetadata::default(),
            Some(serde_json::Value::String(raw)) => serde_json::from_str(&raw).map_err(|e| {
                ResolverError::PageLoadFailed(format!("unreadable page metadata: {}", e))
            })?,
            Some(other) => serde_json::from_value(other).map_err(|e| {
                ResolverError::PageLoadFailed(format!("unreadable page metadata: {}", e))
            })?,
        };

        Ok(Self {
            title: decoded
                .title
                .map(|t| t.chars().take(MAX_TITLE_CHARS).collect::<String>())
                .filter(|t| !t.is_empty()),
            thumbnail: decoded.thumbnail.filter(|s| !s.is_empty()),
            username: decoded.username.filter(|s| !s.is_empty()),
        })
    }

    /// Title to show, falling back to [`DEFAULT_TITLE`].
    pub fn display_title(&self) -> String {
        self.title
            .clone()
            .unwrap_or_else(|| DEFAULT_TITLE.to_string())
    }
}

/// A resolved media item.
///
/// Serializes as
/// `{ "type", "title", "thumbnail", "username", "downloadUrl", "mediaType" }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedMedia {
    /// Content kind.
    #[serde(rename = "type")]
    pub kind: ContentKind,
    /// Page title (defaulted, truncated).
    pub title: String,
    /// Preview image.
    pub thumbnail: Option<String>,
    /// Attributed account name.
    pub username: Option<String>,
    /// Direct media URL.
    pub download_url: String,
    /// Type of `download_url`.
    pub media_type: MediaType,
}

impl ResolvedMedia {
    /// Merge page metadata with the selected download URL.
    pub fn assemble(
        kind: ContentKind,
        metadata: PageMetadata,
        download_url: String,
        media_type: MediaType,
    ) -> Self {
        Self {
            kind,
            title: metadata.display_title(),
            thumbnail: metadata.thumbnail,
            username: metadata.username,
            download_url,
            media_type,
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ResolverConfig {
        ResolverConfig::default()
    }

    #[test]
    fn test_validate_post_urls() {
        let target = ContentKind::Post
            .validate("https://www.instagram.com/p/ABC123/?igsh=xyz", &config())
            .unwrap();
        assert_eq!(target.identifier, "ABC123");

        assert!(ContentKind::Post
            .validate("http://instagram.com/p/A-b_9", &config())
            .is_ok());

        for bad in [
            "https://www.instagram.com/reel/ABC123/",
            "https://example.com/p/ABC123/",
            "ftp://www.instagram.com/p/ABC123/",
            "not a url",
            "https://www.instagram.com/p/",
        ] {
            assert!(
                matches!(
                    ContentKind::Post.validate(bad, &config()),
                    Err(ResolverError::InvalidInput(_))
                ),
                "{} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_validate_reel_and_profile() {
        assert!(ContentKind::Reel
            .validate("https://www.instagram.com/reels/Cx1/", &config())
            .is_ok());

        let target = ContentKind::ProfilePicture
            .validate("https://www.instagram.com/some.user_1/", &config())
            .unwrap();
        assert_eq!(target.identifier, "some.user_1");

        assert!(ContentKind::ProfilePicture
            .validate("https://www.instagram.com/explore/", &config())
            .is_err());
    }

    /// Verifies that the allowed host list drives validation.
    #[test]
    fn test_custom_allowed_host() {
        let config = crate::config::ResolverConfigBuilder::new()
            .allowed_hosts(["site.example"])
            .build()
            .unwrap();

        let target = ContentKind::detect("https://site.example/p/ABC123", &config).unwrap();
        assert_eq!(target.kind, ContentKind::Post);
        assert!(ContentKind::detect("https://www.instagram.com/p/ABC123", &config).is_err());
    }

    #[test]
    fn test_detect() {
        let detect = |url: &str| ContentKind::detect(url, &config()).map(|t| t.kind);

        assert_eq!(detect("https://www.instagram.com/p/X/"), Ok(ContentKind::Post));
        assert_eq!(detect("https://www.instagram.com/reel/X/"), Ok(ContentKind::Reel));
        assert_eq!(
            detect("https://www.instagram.com/someone"),
            Ok(ContentKind::ProfilePicture)
        );
        assert!(detect("https://www.instagram.com/stories/someone/1/").is_err());
    }

    #[test]
    fn test_kind_parsing_and_names() {
        assert_eq!("post".parse::<ContentKind>(), Ok(ContentKind::Post));
        assert_eq!("Reel".parse::<ContentKind>(), Ok(ContentKind::Reel));
        assert_eq!("profile".parse::<ContentKind>(), Ok(ContentKind::ProfilePicture));
        assert!("story".parse::<ContentKind>().is_err());

        assert_eq!(ContentKind::ProfilePicture.to_string(), "profile");
        assert_eq!(ContentKind::Post.default_filename(), "instagram-content");
        assert_eq!(ContentKind::ProfilePicture.default_filename(), "profile-pic.jpg");
    }

    #[test]
    fn test_media_type_of() {
        assert_eq!(MediaType::of("https://cdn.example/a.mp4?x=1"), Some(MediaType::Video));
        assert_eq!(MediaType::of("https://cdn.example/a.JPG"), Some(MediaType::Image));
        assert_eq!(MediaType::of("https://cdn.example/a"), None);
        assert_eq!(MediaType::of("/relative/clip.mp4"), Some(MediaType::Video));
    }

    /// Verifies that posts prefer video and fall back to an image.
    #[test]
    fn test_select_post() {
        let candidates = vec![
            "https://cdn.example/ABC123-thumb.jpg".to_string(),
            "https://cdn.example/ABC123.mp4".to_string(),
        ];
        assert_eq!(
            ContentKind::Post.select(&candidates),
            Ok((
                "https://cdn.example/ABC123.mp4".to_string(),
                MediaType::Video
            ))
        );

        let images = vec!["https://cdn.example/photo.jpg".to_string()];
        assert_eq!(
            ContentKind::Post.select(&images).unwrap().1,
            MediaType::Image
        );

        assert!(matches!(
            ContentKind::Post.select(&[]),
            Err(ResolverError::NoMediaFound(_))
        ));
    }

    #[test]
    fn test_select_reel_requires_video() {
        let images = vec!["https://cdn.example/photo.jpg".to_string()];
        assert!(matches!(
            ContentKind::Reel.select(&images),
            Err(ResolverError::NoMediaFound(_))
        ));
    }

    #[test]
    fn test_select_profile_picture() {
        let small = "https://instagram.fxyz1-1.fna.fbcdn.net/v/t51.2885-19/1_n.jpg?stp=dst-jpg_s150x150&oh=a&oe=b";
        let full = "https://instagram.fxyz1-1.fna.fbcdn.net/v/t51.2885-19/1_n.jpg?oh=a&oe=b";
        let unsigned = "https://instagram.fxyz1-1.fna.fbcdn.net/v/t51.2885-19/1_n.jpg";

        assert!(!is_full_resolution_profile_picture(small));
        assert!(is_full_resolution_profile_picture(full));
        assert!(!is_full_resolution_profile_picture(unsigned));

        let candidates = vec![small.to_string(), full.to_string()];
        assert_eq!(
            ContentKind::ProfilePicture.select(&candidates),
            Ok((full.to_string(), MediaType::Image))
        );
    }

    #[test]
    fn test_page_metadata_decoding() {
        let long_title = "x".repeat(80);
        let raw = serde_json::json!({
            "title": long_title,
            "thumbnail": "https://cdn.example/t.jpg",
            "username": ""
        })
        .to_string();

        let metadata = PageMetadata::from_evaluation(Some(serde_json::Value::String(raw))).unwrap();
        assert_eq!(metadata.title.as_deref().map(str::len), Some(50));
        assert_eq!(metadata.thumbnail.as_deref(), Some("https://cdn.example/t.jpg"));
        assert_eq!(metadata.username, None);

        let empty = PageMetadata::from_evaluation(None).unwrap();
        assert_eq!(empty.display_title(), DEFAULT_TITLE);

        assert!(matches!(
            PageMetadata::from_evaluation(Some(serde_json::json!("not json"))),
            Err(ResolverError::PageLoadFailed(_))
        ));
    }

    /// Verifies the wire shape of a resolved result.
    #[test]
    fn test_resolved_media_serialization() {
        let media = ResolvedMedia::assemble(
            ContentKind::Post,
            PageMetadata::default(),
            "https://cdn.example/ABC123.mp4".to_string(),
            MediaType::Video,
        );

        let json = serde_json::to_value(&media).unwrap();
        assert_eq!(json["type"], "post");
        assert_eq!(json["title"], DEFAULT_TITLE);
        assert_eq!(json["thumbnail"], serde_json::Value::Null);
        assert_eq!(json["downloadUrl"], "https://cdn.example/ABC123.mp4");
        assert_eq!(json["mediaType"], "video");
    }
}
