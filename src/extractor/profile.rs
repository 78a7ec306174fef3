//! Profile picture extractor.

use async_trait::async_trait;
use url::Url;

use super::{MetadataExtractor, api_key_headers};
use crate::content::MediaTarget;
use crate::error::{ResolverError, Result};

/// Path fragment shared by profile picture CDN URLs.
const PROFILE_CDN_MARKER: &str = "/t51.2885-19/";

/// Extractor that asks a profile API for a user's picture URLs.
///
/// Sends `POST <endpoint>` with `{"username": "<name>"}` and collects every
/// string anywhere in the JSON response that points at the profile picture
/// CDN, in document order. Picking the full-resolution one is left to
/// [`ContentKind::select`](crate::ContentKind::select).
pub struct ProfilePictureExtractor {
    client: reqwest::Client,
    endpoint: Url,
    api_key: Option<String>,
}

impl ProfilePictureExtractor {
    /// Create an extractor for `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns [`ResolverError::Configuration`] if the endpoint is invalid.
    pub fn new(endpoint: &str, api_key: Option<String>) -> Result<Self> {
        let endpoint = Url::parse(endpoint).map_err(|e| {
            ResolverError::Configuration(format!("invalid profile endpoint {}: {}", endpoint, e))
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
}

/// Collect profile CDN strings from `value`, depth first.
fn collect_profile_urls(value: &serde_json::Value, found: &mut Vec<String>) {
    match value {
        serde_json::Value::String(s) => {
            if s.contains("instagram.f") && s.contains(PROFILE_CDN_MARKER) {
                found.push(s.clone());
            }
        }
        serde_json::Value::Array(items) => {
            for item in items {
                collect_profile_urls(item, found);
            }
        }
        serde_json::Value::Object(map) => {
            for item in map.values() {
                collect_profile_urls(item, found);
            }
        }
        _ => {}
    }
}

#[async_trait]
impl MetadataExtractor for ProfilePictureExtractor {
    async fn extract(&self, target: &MediaTarget) -> Result<Vec<String>> {
        log::debug!(" Requesting profile picture for {}", target.identifier);

        let response = self
            .client
            .post(self.endpoint.clone())
            .headers(api_key_headers(&self.endpoint, self.api_key.as_deref()))
            .json(&serde_json::json!({ "username": target.identifier }))
            .send()
            .await
            .map_err(|e| ResolverError::ExtractorFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ResolverError::ExtractorFailed(format!(
                "profile API returned HTTP {}",
                status
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ResolverError::ExtractorFailed(format!("unreadable response: {}", e)))?;

        let mut found = Vec::new();
        collect_profile_urls(&body, &mut found);
        Ok(found)
    }
}

impl std::fmt::Debug for ProfilePictureExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfilePictureExtractor")
            .field("endpoint", &self.endpoint.as_str())
            .finish()
    }
}
