//! Time-to-live result cache.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

/// Key-value cache whose entries expire after a fixed time-to-live.
///
/// Expired entries are never returned but are not evicted either; they
/// stay until overwritten or [`clear`](Self::clear)ed.
///
/// Uses [`tokio::time::Instant`], so a paused test clock controls expiry.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use media_resolver::TtlCache;
///
/// let cache = TtlCache::new(Duration::from_secs(3600));
/// cache.set("https://www.instagram.com/p/abc/".to_string(), 42);
///
/// assert_eq!(cache.get("https://www.instagram.com/p/abc/"), Some(42));
/// assert_eq!(cache.get("https://www.instagram.com/p/other/"), None);
/// ```
pub struct TtlCache<K, V> {
    ttl: Duration,
    entries: Mutex<HashMap<K, (V, Instant)>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    /// Create an empty cache.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// The configured time-to-live.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return the value stored for `key` if it is younger than the TTL.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries
            .get(key)
            .filter(|(_, stored_at)| stored_at.elapsed() < self.ttl)
            .map(|(value, _)| value.clone())
    }

    /// Store `value` under `key`, replacing any previous entry.
    pub fn set(&self, key: K, value: V) {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key, (value, Instant::now()));
    }

    /// Number of stored entries, fresh or stale.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Whether no entries are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every entry.
    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_after_ttl() {
        let cache = TtlCache::new(Duration::from_secs(3600));
        cache.set("k".to_string(), "v".to_string());

        tokio::time::advance(Duration::from_secs(3599)).await;
        assert_eq!(cache.get("k"), Some("v".to_string()));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(cache.get("k"), None, "Entry at exactly the TTL is stale");
        assert_eq!(cache.len(), 1, "Stale entries are not evicted");
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_refreshes_entry() {
        let cache = TtlCache::new(Duration::from_secs(10));
        cache.set("k", 1);

        tokio::time::advance(Duration::from_secs(8)).await;
        cache.set("k", 2);

        tokio::time::advance(Duration::from_secs(8)).await;
        assert_eq!(cache.get("k"), Some(2));
    }

    #[test]
    fn test_clear() {
        let cache = TtlCache::new(Duration::from_secs(10));
        cache.set(1, "a");
        cache.set(2, "b");
        assert_eq!(cache.len(), 2);

        cache.clear();
        assert!(cache.is_empty());
    }
}
