use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use tracing::trace;

/// Shared key-value cache with per-key TTL.
///
/// The presence registry stores its volatile state (`channel:*`, `online:*`)
/// through this trait so that a deployment spanning several server instances
/// can swap the in-process store for a shared one. TTL expiry is
/// authoritative: a key past its deadline is gone, no sweeper required.
pub trait KeyValueCache: Send + Sync {
    /// Insert or overwrite `key`, returning the previous live value if any.
    fn set(&self, key: &str, value: &str, ttl: Duration) -> Option<String>;

    fn get(&self, key: &str) -> Option<String>;

    /// Remove `key`, returning the value it held if it was still live.
    fn remove(&self, key: &str) -> Option<String>;

    fn exists(&self, key: &str) -> bool {
        self.get(key).is_some()
    }
}

struct Entry {
    value: String,
    expires_at: Instant,
}

/// In-process cache. Expired entries are dropped lazily on access.
#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, Entry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueCache for MemoryCache {
    fn set(&self, key: &str, value: &str, ttl: Duration) -> Option<String> {
        let mut entries = self.entries.write().expect("cache lock poisoned");
        let now = Instant::now();
        trace!(key, ttl_secs = ttl.as_secs(), "cache set");
        entries
            .insert(
                key.to_string(),
                Entry {
                    value: value.to_string(),
                    expires_at: now + ttl,
                },
            )
            .filter(|prev| prev.expires_at > now)
            .map(|prev| prev.value)
    }

    fn get(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        {
            let entries = self.entries.read().expect("cache lock poisoned");
            match entries.get(key) {
                Some(entry) if entry.expires_at > now => return Some(entry.value.clone()),
                Some(_) => {}
                None => return None,
            }
        }
        // Expired: upgrade to a write lock and drop it.
        let mut entries = self.entries.write().expect("cache lock poisoned");
        if let Some(entry) = entries.get(key) {
            if entry.expires_at <= now {
                entries.remove(key);
            } else {
                return Some(entry.value.clone());
            }
        }
        None
    }

    fn remove(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        let mut entries = self.entries.write().expect("cache lock poisoned");
        entries
            .remove(key)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get() {
        let cache = MemoryCache::new();
        assert_eq!(cache.set("k", "v1", Duration::from_secs(60)), None);
        assert_eq!(cache.get("k").as_deref(), Some("v1"));
        assert!(cache.exists("k"));
    }

    #[test]
    fn overwrite_returns_previous_value() {
        let cache = MemoryCache::new();
        cache.set("k", "old", Duration::from_secs(60));
        let prev = cache.set("k", "new", Duration::from_secs(60));
        assert_eq!(prev.as_deref(), Some("old"));
        assert_eq!(cache.get("k").as_deref(), Some("new"));
    }

    #[test]
    fn expired_entries_are_gone() {
        let cache = MemoryCache::new();
        cache.set("k", "v", Duration::from_millis(5));
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(cache.get("k"), None);
        assert!(!cache.exists("k"));
        // Overwriting an expired key reports no previous value.
        assert_eq!(cache.set("k", "v2", Duration::from_secs(60)), None);
    }

    #[test]
    fn remove_returns_live_value_once() {
        let cache = MemoryCache::new();
        cache.set("k", "v", Duration::from_secs(60));
        assert_eq!(cache.remove("k").as_deref(), Some("v"));
        assert_eq!(cache.remove("k"), None);
        assert_eq!(cache.get("k"), None);
    }
}
