//! Mock metadata extractor for testing.
//!
//! Only available with the `test-utils` feature or under `#[cfg(test)]`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::MetadataExtractor;
use crate::content::MediaTarget;
use crate::error::{ResolverError, Result};

/// Extractor returning fixed candidates, optionally after a delay or with
/// a failure.
///
/// The delay uses `tokio::time::sleep`, so tests on a paused clock can
/// push it past the extractor timeout instantly.
///
/// # Example
///
/// ```rust,ignore
/// use media_resolver::extractor::mock::MockExtractor;
///
/// let extractor = MockExtractor::returning(["https://cdn.example/a.mp4"]);
/// let calls = extractor.counter();
/// ```
pub struct MockExtractor {
    candidates: Vec<String>,
    failure: Option<String>,
    delay: Duration,
    calls: Arc<AtomicUsize>,
}

impl MockExtractor {
    /// Extractor that returns `candidates`.
    pub fn returning<I, S>(candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            candidates: candidates.into_iter().map(Into::into).collect(),
            failure: None,
            delay: Duration::ZERO,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Extractor that fails with [`ResolverError::ExtractorFailed`].
    pub fn failing<S: Into<String>>(message: S) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::returning(Vec::<String>::new())
        }
    }

    /// Wait `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Number of `extract` calls so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Shared call counter that survives moving the extractor.
    pub fn counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl MetadataExtractor for MockExtractor {
    async fn extract(&self, target: &MediaTarget) -> Result<Vec<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        log::debug!("MockExtractor: extracting {}", target.url);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match &self.failure {
            Some(message) => Err(ResolverError::ExtractorFailed(message.clone())),
            None => Ok(self.candidates.clone()),
        }
    }
}

impl std::fmt::Debug for MockExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockExtractor")
            .field("candidates", &self.candidates)
            .field("failure", &self.failure)
            .field("delay", &self.delay)
            .field("calls", &self.call_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::ContentKind;

    fn target() -> MediaTarget {
        MediaTarget {
            kind: ContentKind::Post,
            url: "https://www.instagram.com/p/X/".to_string(),
            identifier: "X".to_string(),
        }
    }

    #[tokio::test]
    async fn test_mock_extractor_counts_calls() {
        let extractor = MockExtractor::returning(["https://cdn.example/a.mp4"]);
        let counter = extractor.counter();

        let result = extractor.extract(&target()).await.unwrap();
        assert_eq!(result, vec!["https://cdn.example/a.mp4"]);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_mock_extractor_failure() {
        let extractor = MockExtractor::failing("quota exceeded");
        assert_eq!(
            extractor.extract(&target()).await,
            Err(ResolverError::ExtractorFailed("quota exceeded".to_string()))
        );
        assert_eq!(extractor.call_count(), 1);
    }
}
