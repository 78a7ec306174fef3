//! Post and reel extractor backed by an HTTP API.

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use super::{MetadataExtractor, api_key_headers};
use crate::content::MediaTarget;
use crate::error::{ResolverError, Result};

/// Response body of the extractor API.
#[derive(Debug, Deserialize)]
struct ExtractorResponse {
    #[serde(default)]
    url_list: Vec<String>,
}

/// Extractor that asks an HTTP service for a post's direct media URLs.
///
/// Sends `POST <endpoint>` with `{"url": "<post url>"}` and reads the
/// `url_list` array of the JSON response. When an API key is configured it
/// is sent with the endpoint's host in `x-rapidapi-key`/`x-rapidapi-host`.
///
/// # Example
///
/// ```rust,ignore
/// use media_resolver::HttpMetadataExtractor;
///
/// let extractor = HttpMetadataExtractor::new(
///     "https://extractor.internal/api/resolve",
///     std::env::var("EXTRACTOR_API_KEY").ok(),
/// )?;
/// ```
pub struct HttpMetadataExtractor {
    client: reqwest::Client,
    endpoint: Url,
    api_key: Option<String>,
}

impl HttpMetadataExtractor {
    /// Create an extractor for `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns [`ResolverError::Configuration`] if the endpoint is not a
    /// valid URL or the HTTP client cannot be built.
    pub fn new(endpoint: &str, api_key: Option<String>) -> Result<Self> {
        let endpoint = Url::parse(endpoint).map_err(|e| {
            ResolverError::Configuration(format!("invalid extractor endpoint {}: {}", endpoint, e))
        })?;

        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| ResolverError::Configuration(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint,
            api_key,
        })
    }

    /// The configured endpoint.
    pub fn endpoint(&self) -> &str {
        self.endpoint.as_str()
    }
}

#[async_trait]
impl MetadataExtractor for HttpMetadataExtractor {
    async fn extract(&self, target: &MediaTarget) -> Result<Vec<String>> {
        log::debug!(" Requesting media URLs for {} from {}", target.url, self.endpoint);

        let response = self
            .client
            .post(self.endpoint.clone())
            .headers(api_key_headers(&self.endpoint, self.api_key.as_deref()))
            .json(&serde_json::json!({ "url": target.url }))
            .send()
            .await
            .map_err(|e| ResolverError::ExtractorFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ResolverError::ExtractorFailed(format!(
                "extractor returned HTTP {}",
                status
            )));
        }

        let body: ExtractorResponse = response
            .json()
            .await
            .map_err(|e| ResolverError::ExtractorFailed(format!("unreadable response: {}", e)))?;

        log::debug!(" Extractor returned {} candidates", body.url_list.len());
        Ok(body.url_list)
    }
}

impl std::fmt::Debug for HttpMetadataExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpMetadataExtractor")
            .field("endpoint", &self.endpoint.as_str())
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::ContentKind;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}/resolve", addr)
    }

    fn target() -> MediaTarget {
        MediaTarget {
            kind: ContentKind::Post,
            url: "https://www.instagram.com/p/ABC123/".to_string(),
            identifier: "ABC123".to_string(),
        }
    }

    /// Verifies the request body, API key headers and url_list parsing.
    #[tokio::test]
    async fn test_extract_reads_url_list() {
        let router = Router::new().route(
            "/resolve",
            post(|headers: HeaderMap, Json(body): Json<serde_json::Value>| async move {
                assert_eq!(body["url"], "https://www.instagram.com/p/ABC123/");
                assert_eq!(headers["x-rapidapi-key"], "secret");
                assert_eq!(headers["x-rapidapi-host"], "127.0.0.1");
                Json(serde_json::json!({
                    "results_number": 2,
                    "url_list": ["https://cdn.example/a.mp4", "https://cdn.example/a.jpg"]
                }))
            }),
        );
        let endpoint = serve(router).await;

        let extractor = HttpMetadataExtractor::new(&endpoint, Some("secret".to_string())).unwrap();
        let candidates = extractor.extract(&target()).await.unwrap();

        assert_eq!(
            candidates,
            vec!["https://cdn.example/a.mp4", "https://cdn.example/a.jpg"]
        );
    }

    /// Verifies that an upstream error status becomes ExtractorFailed.
    #[tokio::test]
    async fn test_extract_upstream_error() {
        let router = Router::new().route(
            "/resolve",
            post(|| async { (StatusCode::BAD_GATEWAY, "down") }),
        );
        let endpoint = serve(router).await;

        let extractor = HttpMetadataExtractor::new(&endpoint, None).unwrap();
        match extractor.extract(&target()).await {
            Err(ResolverError::ExtractorFailed(msg)) => assert!(msg.contains("502")),
            other => panic!("Expected ExtractorFailed, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_endpoint() {
        assert!(matches!(
            HttpMetadataExtractor::new("not a url", None),
            Err(ResolverError::Configuration(_))
        ));
    }

    #[test]
    fn test_debug_redacts_key() {
        let extractor =
            HttpMetadataExtractor::new("https://extractor.example/api", Some("secret".into()))
                .unwrap();
        let debug_str = format!("{:?}", extractor);
        assert!(!debug_str.contains("secret"));
        assert!(debug_str.contains("extractor.example"));
    }
}
