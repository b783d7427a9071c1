use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use huddle_cache::KeyValueCache;

/// Channel bindings survive short disconnects for a week.
pub const CHANNEL_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);
/// Online flags expire after a day without a refresh.
pub const ONLINE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

fn channel_key(user_id: i64) -> String {
    format!("channel:{user_id}")
}

fn online_key(user_id: i64) -> String {
    format!("online:{user_id}")
}

/// Single writer for the volatile `channel:*` and `online:*` keys. Backed by
/// the shared cache so every server instance sees the same bindings.
#[derive(Clone)]
pub struct PresenceRegistry {
    cache: Arc<dyn KeyValueCache>,
}

impl PresenceRegistry {
    pub fn new(cache: Arc<dyn KeyValueCache>) -> Self {
        Self { cache }
    }

    /// Bind a user to their current channel. Last writer wins; the previous
    /// channel name comes back so the caller can evict the stale connection.
    pub fn bind(&self, user_id: i64, channel: &str) -> Option<String> {
        debug!(user_id, channel, "presence bind");
        self.cache.set(&channel_key(user_id), channel, CHANNEL_TTL)
    }

    pub fn lookup(&self, user_id: i64) -> Option<String> {
        self.cache.get(&channel_key(user_id))
    }

    /// Clear the binding, but only if this connection still owns it. A newer
    /// connection that superseded us keeps its binding untouched.
    pub fn release(&self, user_id: i64, channel: &str) -> bool {
        if self.lookup(user_id).as_deref() == Some(channel) {
            self.cache.remove(&channel_key(user_id));
            true
        } else {
            false
        }
    }

    pub fn set_online(&self, user_id: i64) {
        self.cache.set(&online_key(user_id), "1", ONLINE_TTL);
    }

    pub fn set_offline(&self, user_id: i64) {
        self.cache.remove(&online_key(user_id));
    }

    /// A user always sees themselves online; everyone else is consulted
    /// against the cache, where TTL expiry is authoritative.
    pub fn is_online(&self, user_id: i64, viewer_id: i64) -> bool {
        viewer_id == user_id || self.cache.exists(&online_key(user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use huddle_cache::MemoryCache;

    fn registry() -> PresenceRegistry {
        PresenceRegistry::new(Arc::new(MemoryCache::new()))
    }

    #[test]
    fn bind_returns_the_superseded_channel() {
        let presence = registry();
        assert_eq!(presence.bind(1, "conn.a"), None);
        assert_eq!(presence.bind(1, "conn.b").as_deref(), Some("conn.a"));
        assert_eq!(presence.lookup(1).as_deref(), Some("conn.b"));
    }

    #[test]
    fn release_is_owner_only() {
        let presence = registry();
        presence.bind(1, "conn.a");
        presence.bind(1, "conn.b");

        // The stale connection cannot clear the newer binding.
        assert!(!presence.release(1, "conn.a"));
        assert_eq!(presence.lookup(1).as_deref(), Some("conn.b"));

        assert!(presence.release(1, "conn.b"));
        assert_eq!(presence.lookup(1), None);
    }

    #[test]
    fn online_flag_toggles() {
        let presence = registry();
        assert!(!presence.is_online(1, 2));

        presence.set_online(1);
        assert!(presence.is_online(1, 2));

        presence.set_offline(1);
        assert!(!presence.is_online(1, 2));
    }

    #[test]
    fn a_user_always_sees_themselves_online() {
        let presence = registry();
        assert!(presence.is_online(7, 7));
    }
}
