//! Session cache with FIFO eviction and timeout support.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use lru::LruCache;
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::config::CacheConfig;
use crate::error::{Error, Result};
use crate::expiry::ExpiryPolicy;
use crate::persistence::{NoPersistence, PersistenceHook};
use crate::session::{PeerKey, Session, SessionId};

/// Entry stored in the cache.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Cached session.
    pub session: Arc<Session>,

    /// When this entry was inserted (or last overwritten).
    pub cached_at: Instant,
}

impl CacheEntry {
    fn new(session: Arc<Session>) -> Self {
        Self {
            session,
            cached_at: Instant::now(),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Counters {
    hits: u64,
    misses: u64,
    evictions: u64,
    expirations: u64,
}

/// Inner state protected by the mutex.
///
/// `entries` is only ever promoted on insert, never on lookup, so its
/// recency order is insertion order and `cached_at` is non-decreasing from
/// the LRU end to the MRU end.
struct CacheInner {
    /// Sessions in insertion order (LRU end = oldest).
    entries: LruCache<SessionId, CacheEntry>,

    /// Most recent session id stored for each peer.
    peers: HashMap<PeerKey, SessionId>,

    capacity: usize,
    expiry: ExpiryPolicy,
    counters: Counters,
}

impl CacheInner {
    fn insert(&mut self, session: Arc<Session>) {
        let id = session.id().clone();
        if let Some(previous) = self.entries.pop(&id) {
            self.unlink_peer(&previous.session);
        }
        if let Some(peer) = session.peer() {
            self.peers.insert(peer.clone(), id.clone());
        }
        self.entries.put(id, CacheEntry::new(session));
    }

    fn remove(&mut self, id: &[u8]) -> Option<Arc<Session>> {
        let entry = self.entries.pop(id)?;
        self.unlink_peer(&entry.session);
        Some(entry.session)
    }

    /// Drop the peer index entry if it still points at this session.
    /// Returns whether it did.
    fn unlink_peer(&mut self, session: &Session) -> bool {
        if let Some(peer) = session.peer()
            && self.peers.get(peer) == Some(session.id())
        {
            self.peers.remove(peer);
            return true;
        }
        false
    }

    /// Live session the peer index currently points at.
    fn live_for_peer(&self, peer: &PeerKey) -> Option<Arc<Session>> {
        let id = self.peers.get(peer)?;
        self.entries
            .peek(id)
            .filter(|e| !self.expiry.is_expired(e.cached_at))
            .map(|e| Arc::clone(&e.session))
    }

    /// Evict oldest entries until the size constraint holds.
    fn enforce_capacity(&mut self, label: &str) -> Vec<Arc<Session>> {
        let mut evicted = Vec::new();
        while self.entries.len() > self.capacity {
            let Some((id, entry)) = self.entries.pop_lru() else {
                break;
            };
            debug!(cache = %label, session_id = %id, "Evicting oldest session to make room");
            self.unlink_peer(&entry.session);
            self.counters.evictions += 1;
            evicted.push(entry.session);
        }
        evicted
    }

    /// Remove every expired entry. Expired entries form a prefix of the
    /// insertion order, so this stops at the first live one.
    fn purge_expired(&mut self, label: &str) -> Vec<Arc<Session>> {
        let mut expired = Vec::new();
        if self.expiry.timeout().is_none() {
            return expired;
        }
        let now = Instant::now();
        while let Some((_, entry)) = self.entries.peek_lru() {
            if !self.expiry.is_expired_at(entry.cached_at, now) {
                break;
            }
            let Some((id, entry)) = self.entries.pop_lru() else {
                break;
            };
            debug!(cache = %label, session_id = %id, "Session expired, removing from cache");
            self.unlink_peer(&entry.session);
            self.counters.expirations += 1;
            expired.push(entry.session);
        }
        expired
    }

    /// Look up a live entry, purging it if it has expired.
    fn get_live(&mut self, id: &[u8], label: &str) -> (Option<Arc<Session>>, Option<Arc<Session>>) {
        let expired = match self.entries.peek(id) {
            None => {
                self.counters.misses += 1;
                return (None, None);
            }
            Some(entry) => self.expiry.is_expired(entry.cached_at),
        };

        if expired {
            debug!(cache = %label, session_id = %hex::encode(id), "Session expired, removing from cache");
            self.counters.misses += 1;
            self.counters.expirations += 1;
            return (None, self.remove(id));
        }

        self.counters.hits += 1;
        let session = self.entries.peek(id).map(|e| Arc::clone(&e.session));
        (session, None)
    }
}

/// Bounded TLS session cache with FIFO eviction and optional timeout.
///
/// This cache provides:
/// - Insertion-order eviction when capacity is reached or shrunk
/// - Timeout-based expiration (expired entries are invisible immediately
///   and purged lazily)
/// - A peer index for client-side resumption lookups
/// - Persistence hooks for write-through of peer sessions
/// - Thread-safe access via a single mutex
///
/// Cloning is cheap and yields a handle to the same cache.
pub struct SessionCache<P: PersistenceHook = NoPersistence> {
    inner: Arc<Mutex<CacheInner>>,
    persistence: Arc<P>,
    label: Arc<str>,
}

impl SessionCache<NoPersistence> {
    /// Create a new in-memory session cache.
    pub fn new(config: CacheConfig) -> Self {
        Self::with_persistence(config, NoPersistence)
    }
}

impl<P: PersistenceHook> SessionCache<P> {
    /// Create a new session cache with a persistence backend.
    pub fn with_persistence(config: CacheConfig, persistence: P) -> Self {
        let inner = CacheInner {
            entries: LruCache::unbounded(),
            peers: HashMap::new(),
            capacity: config.capacity.max(1),
            expiry: ExpiryPolicy::new(config.timeout),
            counters: Counters::default(),
        };

        Self {
            inner: Arc::new(Mutex::new(inner)),
            persistence: Arc::new(persistence),
            label: Arc::from(config.label),
        }
    }

    /// Label this cache uses in log events.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Number of physically stored entries (may include expired entries
    /// that have not been purged yet).
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Check if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    /// Store a session, replacing any entry with the same id.
    ///
    /// A replaced entry counts as newly inserted: its timeout restarts and it
    /// becomes the last candidate for eviction. If the cache is over
    /// capacity afterwards, the oldest entries are evicted.
    pub fn store(&self, session: Session) {
        let session = Arc::new(session);
        let removed = {
            let mut inner = self.inner.lock();
            let mut removed = inner.purge_expired(&self.label);
            inner.insert(Arc::clone(&session));
            removed.extend(inner.enforce_capacity(&self.label));

            trace!(
                cache = %self.label,
                session_id = %session.id(),
                cache_size = inner.entries.len(),
                "Session stored in cache"
            );
            removed
        };

        self.notify_evicted(&removed);

        if let Some(peer) = session.peer()
            && let Err(e) = self.persistence.save(peer, &session)
        {
            warn!(cache = %self.label, peer = %peer, error = %e, "Failed to persist session");
        }
    }

    /// Look up a session by id.
    ///
    /// `None` as the id is a caller error. An empty or unknown id is a miss.
    pub fn lookup(&self, id: Option<&[u8]>) -> Result<Option<Arc<Session>>> {
        let id = id.ok_or_else(|| Error::InvalidArgument("session id must not be null".to_string()))?;
        Ok(self.get(id))
    }

    /// Look up a session by id. Does not change eviction order.
    pub fn get(&self, id: &[u8]) -> Option<Arc<Session>> {
        if id.is_empty() {
            self.inner.lock().counters.misses += 1;
            return None;
        }

        let (session, expired) = self.inner.lock().get_live(id, &self.label);
        if let Some(expired) = expired {
            self.notify_evicted(&[expired]);
        }
        if session.is_some() {
            trace!(cache = %self.label, session_id = %hex::encode(id), "Session found in cache");
        }
        session
    }

    /// Check if a live session with this id is cached.
    pub fn contains(&self, id: &[u8]) -> bool {
        let inner = self.inner.lock();
        inner
            .entries
            .peek(id)
            .is_some_and(|e| !inner.expiry.is_expired(e.cached_at))
    }

    /// Peek at a live cache entry, including its insertion time.
    pub fn peek_entry(&self, id: &[u8]) -> Option<CacheEntry> {
        let inner = self.inner.lock();
        inner
            .entries
            .peek(id)
            .filter(|e| !inner.expiry.is_expired(e.cached_at))
            .cloned()
    }

    /// Find the session to offer when reconnecting to `host:port`.
    ///
    /// Checks the in-memory peer index first, then the persistence backend.
    /// A session restored from storage is re-inserted into memory unless it
    /// is older than the current timeout.
    pub fn lookup_by_peer(&self, host: &str, port: u16) -> Option<Arc<Session>> {
        let peer = PeerKey::new(host, port);

        let (expiry, in_memory) = {
            let mut inner = self.inner.lock();
            let id = inner.peers.get(&peer).cloned();
            let found = id.map(|id| inner.get_live(id.as_bytes(), &self.label));
            (inner.expiry, found)
        };

        match in_memory {
            Some((Some(session), _)) => return Some(session),
            Some((None, Some(expired))) => self.notify_evicted(&[expired]),
            _ => {}
        }

        let loaded = match self.persistence.load(&peer) {
            Ok(loaded) => loaded?,
            Err(e) => {
                warn!(cache = %self.label, peer = %peer, error = %e, "Failed to load persisted session");
                return None;
            }
        };

        let stale = expiry.is_stale(loaded.created_at());
        let loaded = Arc::new(loaded);
        let (session, evicted) = {
            let mut inner = self.inner.lock();
            // A session stored while the lock was released is newer than
            // anything on disk.
            match inner.live_for_peer(&peer) {
                Some(current) => (Some(current), Vec::new()),
                None if stale => (None, Vec::new()),
                None => {
                    debug!(cache = %self.label, peer = %peer, session_id = %loaded.id(), "Restored persisted session");
                    inner.insert(Arc::clone(&loaded));
                    (Some(loaded), inner.enforce_capacity(&self.label))
                }
            }
        };
        self.notify_evicted(&evicted);

        if session.is_none() {
            debug!(cache = %self.label, peer = %peer, "Persisted session is stale, discarding");
            if let Err(e) = self.persistence.remove(&peer) {
                warn!(cache = %self.label, peer = %peer, error = %e, "Failed to remove stale session");
            }
        }
        session
    }

    /// Snapshot the ids of all live sessions, oldest first.
    ///
    /// Expired entries are purged while taking the snapshot.
    pub fn ids(&self) -> SessionIds {
        let (ids, expired) = {
            let mut inner = self.inner.lock();
            let expired = inner.purge_expired(&self.label);
            let ids: Vec<SessionId> = inner.entries.iter().rev().map(|(id, _)| id.clone()).collect();
            (ids, expired)
        };
        self.notify_evicted(&expired);
        SessionIds {
            inner: ids.into_iter(),
        }
    }

    /// Snapshot all live sessions, oldest first.
    pub fn sessions(&self) -> Vec<Arc<Session>> {
        let inner = self.inner.lock();
        let now = Instant::now();
        inner
            .entries
            .iter()
            .rev()
            .filter(|(_, e)| !inner.expiry.is_expired_at(e.cached_at, now))
            .map(|(_, e)| Arc::clone(&e.session))
            .collect()
    }

    /// Maximum number of retained sessions.
    pub fn cache_size(&self) -> usize {
        self.inner.lock().capacity
    }

    /// Change the capacity, evicting the oldest entries if the cache is now
    /// over capacity. Non-positive sizes are rejected and leave the cache
    /// unchanged.
    pub fn set_cache_size(&self, size: i64) -> Result<()> {
        let capacity = usize::try_from(size)
            .ok()
            .filter(|&n| n > 0)
            .ok_or_else(|| {
                Error::InvalidArgument(format!("cache size must be positive, got {size}"))
            })?;

        let evicted = {
            let mut inner = self.inner.lock();
            inner.capacity = capacity;
            debug!(cache = %self.label, capacity, "Session cache size changed");
            inner.enforce_capacity(&self.label)
        };
        self.notify_evicted(&evicted);
        Ok(())
    }

    /// Session timeout in seconds, `0` when sessions never expire.
    pub fn session_timeout(&self) -> u64 {
        self.inner.lock().expiry.timeout_secs()
    }

    /// Change the session timeout. `0` disables expiry; negative values are
    /// rejected and leave the cache unchanged.
    ///
    /// The new timeout applies to existing entries immediately.
    pub fn set_session_timeout(&self, seconds: i64) -> Result<()> {
        let seconds = u64::try_from(seconds).map_err(|_| {
            Error::InvalidArgument(format!("session timeout must not be negative, got {seconds}"))
        })?;
        self.apply_timeout(Some(Duration::from_secs(seconds)));
        Ok(())
    }

    /// Change the session timeout with sub-second precision.
    /// `None` or a zero duration disables expiry.
    pub fn set_timeout(&self, timeout: Option<Duration>) {
        self.apply_timeout(timeout);
    }

    fn apply_timeout(&self, timeout: Option<Duration>) {
        let expired = {
            let mut inner = self.inner.lock();
            inner.expiry.set_timeout(timeout);
            debug!(
                cache = %self.label,
                timeout_secs = inner.expiry.timeout_secs(),
                "Session timeout changed"
            );
            inner.purge_expired(&self.label)
        };
        self.notify_evicted(&expired);
    }

    /// Remove a session so it can no longer be resumed.
    ///
    /// The persisted copy for the session's peer is deleted too, unless a
    /// newer session for that peer has replaced it.
    pub fn invalidate(&self, id: &[u8]) -> Option<Arc<Session>> {
        let (removed, was_current) = {
            let mut inner = self.inner.lock();
            let entry = inner.entries.pop(id)?;
            let was_current = inner.unlink_peer(&entry.session);
            (entry.session, was_current)
        };
        debug!(cache = %self.label, session_id = %removed.id(), "Session invalidated");

        if was_current
            && let Some(peer) = removed.peer()
            && let Err(e) = self.persistence.remove(peer)
        {
            warn!(cache = %self.label, peer = %peer, error = %e, "Failed to remove persisted session");
        }
        Some(removed)
    }

    /// Remove every entry from memory. Persisted sessions are kept.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.peers.clear();
    }

    /// Clean up expired sessions and return how many were removed.
    pub fn purge_expired(&self) -> usize {
        let expired = self.inner.lock().purge_expired(&self.label);
        let count = expired.len();
        self.notify_evicted(&expired);

        if count > 0 {
            debug!(cache = %self.label, count, "Cleaned up expired sessions");
        }
        count
    }

    /// Get cache statistics.
    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        CacheStats {
            size: inner.entries.len(),
            capacity: inner.capacity,
            timeout_secs: inner.expiry.timeout_secs(),
            hits: inner.counters.hits,
            misses: inner.counters.misses,
            evictions: inner.counters.evictions,
            expirations: inner.counters.expirations,
        }
    }

    fn notify_evicted(&self, sessions: &[Arc<Session>]) {
        for session in sessions {
            if let Err(e) = self.persistence.on_evict(session) {
                warn!(cache = %self.label, session_id = %session.id(), error = %e, "Eviction hook failed");
            }
        }
    }
}

impl<P: PersistenceHook> Clone for SessionCache<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            persistence: Arc::clone(&self.persistence),
            label: Arc::clone(&self.label),
        }
    }
}

impl<P: PersistenceHook> std::fmt::Debug for SessionCache<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCache")
            .field("label", &self.label)
            .field("stats", &self.stats())
            .finish()
    }
}

/// Snapshot iterator over session ids, produced by [`SessionCache::ids`].
#[derive(Debug, Clone)]
pub struct SessionIds {
    inner: std::vec::IntoIter<SessionId>,
}

impl Iterator for SessionIds {
    type Item = SessionId;

    fn next(&mut self) -> Option<SessionId> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for SessionIds {}

/// Cache statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct CacheStats {
    /// Current number of stored entries.
    pub size: usize,

    /// Maximum capacity.
    pub capacity: usize,

    /// Session timeout in seconds (0 = never expires).
    pub timeout_secs: u64,

    /// Lookups that returned a session.
    pub hits: u64,

    /// Lookups that found nothing or an expired entry.
    pub misses: u64,

    /// Entries removed to satisfy capacity.
    pub evictions: u64,

    /// Entries removed because they outlived the timeout.
    pub expirations: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::FileSessionStore;
    use std::thread;

    fn session(name: &str) -> Session {
        let mut id = name.as_bytes().to_vec();
        id.resize(32, 0);
        Session::new(SessionId::new(id).unwrap(), name.as_bytes().to_vec())
    }

    fn id(name: &str) -> Vec<u8> {
        session(name).id().as_bytes().to_vec()
    }

    fn ids(cache: &SessionCache) -> Vec<Vec<u8>> {
        cache.ids().map(SessionId::into_bytes).collect()
    }

    #[test]
    fn test_store_and_lookup() {
        let cache = SessionCache::new(CacheConfig::new().with_capacity(10));

        cache.store(session("a"));

        let found = cache.lookup(Some(id("a").as_slice())).unwrap().unwrap();
        assert_eq!(found.id().as_bytes(), id("a").as_slice());
        assert_eq!(found.state(), b"a");
    }

    #[test]
    fn test_lookup_null_is_invalid_argument() {
        let cache = SessionCache::new(CacheConfig::new());
        assert!(matches!(cache.lookup(None), Err(Error::InvalidArgument(_))));

        cache.store(session("a"));
        assert!(matches!(cache.lookup(None), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_lookup_empty_or_unknown_is_miss() {
        let cache = SessionCache::new(CacheConfig::new());
        assert!(cache.lookup(Some(&[][..])).unwrap().is_none());
        assert!(cache.lookup(Some(&[0u8][..])).unwrap().is_none());

        cache.store(session("a"));
        assert!(cache.lookup(Some(&[][..])).unwrap().is_none());
        assert!(cache.lookup(Some(&[0u8][..])).unwrap().is_none());
        assert_eq!(cache.stats().misses, 4);
    }

    #[test]
    fn test_fifo_eviction() {
        let cache = SessionCache::new(CacheConfig::new().with_capacity(3));

        for name in ["s1", "s2", "s3"] {
            cache.store(session(name));
        }
        assert_eq!(cache.len(), 3);

        // Insert a 4th - should evict s1
        cache.store(session("s4"));

        assert_eq!(cache.len(), 3);
        assert!(!cache.contains(&id("s1")));
        assert!(cache.contains(&id("s2")));
        assert!(cache.contains(&id("s3")));
        assert!(cache.contains(&id("s4")));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_lookup_does_not_change_eviction_order() {
        let cache = SessionCache::new(CacheConfig::new().with_capacity(3));

        for name in ["s1", "s2", "s3"] {
            cache.store(session(name));
        }

        // Access s1; insertion order still makes it the oldest
        assert!(cache.get(&id("s1")).is_some());

        cache.store(session("s4"));

        assert!(!cache.contains(&id("s1")));
        assert!(cache.contains(&id("s2")));
    }

    #[test]
    fn test_store_overwrite_refreshes() {
        let cache = SessionCache::new(CacheConfig::new().with_capacity(3));

        for name in ["s1", "s2", "s3"] {
            cache.store(session(name));
        }

        // Re-storing s1 moves it to the newest position without growing
        cache.store(session("s1"));
        assert_eq!(cache.len(), 3);
        assert_eq!(ids(&cache), vec![id("s2"), id("s3"), id("s1")]);

        cache.store(session("s4"));
        assert!(!cache.contains(&id("s2")));
        assert!(cache.contains(&id("s1")));
    }

    #[test]
    fn test_shrink_and_grow_capacity() {
        let cache = SessionCache::new(CacheConfig::new().with_capacity(3));
        for name in ["a", "b", "c"] {
            cache.store(session(name));
        }
        assert_eq!(cache.ids().len(), 3);

        cache.set_cache_size(1).unwrap();
        assert_eq!(cache.cache_size(), 1);
        assert_eq!(ids(&cache), vec![id("c")]);

        cache.set_cache_size(2).unwrap();
        cache.store(session("d"));
        assert_eq!(ids(&cache), vec![id("c"), id("d")]);

        cache.store(session("e"));
        assert_eq!(ids(&cache), vec![id("d"), id("e")]);
    }

    #[test]
    fn test_invalid_cache_size_rejected() {
        let cache = SessionCache::new(CacheConfig::new().with_capacity(7));

        assert!(matches!(cache.set_cache_size(-1), Err(Error::InvalidArgument(_))));
        assert!(matches!(cache.set_cache_size(0), Err(Error::InvalidArgument(_))));
        assert_eq!(cache.cache_size(), 7);
    }

    #[test]
    fn test_zero_capacity_config_clamped() {
        let cache = SessionCache::new(CacheConfig::new().with_capacity(0));
        assert_eq!(cache.cache_size(), 1);
    }

    #[test]
    fn test_session_timeout_setters() {
        let cache = SessionCache::new(CacheConfig::new().with_timeout_secs(300));
        assert_eq!(cache.session_timeout(), 300);

        cache.set_session_timeout(0).unwrap();
        assert_eq!(cache.session_timeout(), 0);

        assert!(matches!(
            cache.set_session_timeout(-1),
            Err(Error::InvalidArgument(_))
        ));
        assert_eq!(cache.session_timeout(), 0);
    }

    #[test]
    fn test_timeout_expiration() {
        let cache = SessionCache::new(
            CacheConfig::new()
                .with_capacity(10)
                .with_timeout(Duration::from_millis(50)),
        );

        cache.store(session("a"));
        assert_eq!(cache.ids().count(), 1);

        // Wait for expiration
        thread::sleep(Duration::from_millis(100));

        // Invisible before purge
        assert!(!cache.contains(&id("a")));
        assert!(cache.get(&id("a")).is_none());
        assert!(cache.is_empty());
        assert_eq!(cache.stats().expirations, 1);
    }

    #[test]
    fn test_shrinking_timeout_applies_immediately() {
        let cache = SessionCache::new(CacheConfig::new().with_timeout_secs(3600));
        cache.store(session("a"));

        thread::sleep(Duration::from_millis(1100));
        cache.set_session_timeout(1).unwrap();

        assert_eq!(cache.ids().count(), 0);
        assert!(cache.lookup(Some(id("a").as_slice())).unwrap().is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_zero_timeout_never_expires() {
        let cache = SessionCache::new(CacheConfig::new().with_timeout(Duration::from_millis(10)));
        cache.set_session_timeout(0).unwrap();
        cache.store(session("a"));

        thread::sleep(Duration::from_millis(30));
        assert!(cache.get(&id("a")).is_some());
    }

    #[test]
    fn test_store_purges_expired() {
        let cache = SessionCache::new(CacheConfig::new().with_timeout(Duration::from_millis(50)));
        cache.store(session("old1"));
        cache.store(session("old2"));

        thread::sleep(Duration::from_millis(100));
        cache.store(session("new"));

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats().expirations, 2);
    }

    #[test]
    fn test_purge_expired() {
        let cache = SessionCache::new(CacheConfig::new().with_timeout(Duration::from_millis(50)));
        for name in ["s1", "s2", "s3"] {
            cache.store(session(name));
        }
        assert_eq!(cache.len(), 3);

        // Wait for expiration
        thread::sleep(Duration::from_millis(100));

        assert_eq!(cache.purge_expired(), 3);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_peek_entry_tracks_insertion_time() {
        let cache = SessionCache::new(CacheConfig::new());
        cache.store(session("a"));
        let first = cache.peek_entry(&id("a")).unwrap();

        thread::sleep(Duration::from_millis(5));
        cache.store(session("a"));
        let second = cache.peek_entry(&id("a")).unwrap();

        assert!(second.cached_at > first.cached_at);
        assert!(cache.peek_entry(&id("missing")).is_none());
    }

    #[test]
    fn test_invalidate() {
        let cache = SessionCache::new(CacheConfig::new());
        cache.store(session("a"));

        let removed = cache.invalidate(&id("a")).unwrap();
        assert_eq!(removed.id().as_bytes(), id("a").as_slice());
        assert!(!cache.contains(&id("a")));
        assert!(cache.invalidate(&id("a")).is_none());
    }

    #[test]
    fn test_peer_index() {
        let cache = SessionCache::new(CacheConfig::new().with_capacity(2));
        cache.store(session("a").with_peer("example.com", 443));
        cache.store(session("b").with_peer("example.org", 443));

        let found = cache.lookup_by_peer("example.com", 443).unwrap();
        assert_eq!(found.id().as_bytes(), id("a").as_slice());
        assert!(cache.lookup_by_peer("example.com", 8443).is_none());

        // Newer session for the same peer wins
        cache.store(session("c").with_peer("example.org", 443));
        let found = cache.lookup_by_peer("example.org", 443).unwrap();
        assert_eq!(found.id().as_bytes(), id("c").as_slice());

        // Eviction of "a" drops its peer entry
        assert!(cache.lookup_by_peer("example.com", 443).is_none());
    }

    #[test]
    fn test_invalidate_unlinks_peer() {
        let cache = SessionCache::new(CacheConfig::new());
        cache.store(session("a").with_peer("example.com", 443));
        cache.invalidate(&id("a"));
        assert!(cache.lookup_by_peer("example.com", 443).is_none());
    }

    #[test]
    fn test_clear() {
        let cache = SessionCache::new(CacheConfig::new());
        cache.store(session("a").with_peer("example.com", 443));
        cache.store(session("b"));

        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.lookup_by_peer("example.com", 443).is_none());
    }

    #[test]
    fn test_stats() {
        let cache = SessionCache::new(CacheConfig::new().with_capacity(100).with_timeout_secs(60));
        for i in 0..5 {
            cache.store(session(&format!("s{i}")));
        }
        cache.get(&id("s0"));
        cache.get(&id("missing"));

        let stats = cache.stats();
        assert_eq!(stats.size, 5);
        assert_eq!(stats.capacity, 100);
        assert_eq!(stats.timeout_secs, 60);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_sub_second_timeout_is_reported() {
        let cache = SessionCache::new(CacheConfig::new().with_timeout(Duration::from_millis(500)));
        assert_eq!(cache.session_timeout(), 1);
        assert_eq!(cache.stats().timeout_secs, 1);

        cache.store(session("a"));
        thread::sleep(Duration::from_millis(600));
        assert_eq!(cache.ids().count(), 0);
    }

    #[test]
    fn test_invalidate_older_session_keeps_newer_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = FileSessionStore::open(dir.path()).unwrap();
        let cache = SessionCache::with_persistence(CacheConfig::new(), store.clone());

        cache.store(session("a").with_peer("example.com", 443));
        cache.store(session("b").with_peer("example.com", 443));

        assert!(cache.invalidate(&id("a")).is_some());
        let persisted = store.list().unwrap();
        assert_eq!(persisted.len(), 1);
        assert_eq!(persisted[0].id().as_bytes(), id("b").as_slice());

        // Invalidating the current session removes its file
        assert!(cache.invalidate(&id("b")).is_some());
        assert!(store.list().unwrap().is_empty());
    }

    /// Hook whose `load` runs a store against the cache before handing
    /// back an older persisted session.
    struct StoreDuringLoad {
        before_load: Mutex<Option<Box<dyn FnOnce() + Send>>>,
        persisted: Session,
    }

    impl PersistenceHook for StoreDuringLoad {
        fn load(&self, _peer: &PeerKey) -> Result<Option<Session>> {
            let before_load = self.before_load.lock().take();
            if let Some(f) = before_load {
                f();
            }
            Ok(Some(self.persisted.clone()))
        }

        fn save(&self, _peer: &PeerKey, _session: &Session) -> Result<()> {
            Ok(())
        }

        fn remove(&self, _peer: &PeerKey) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_restore_does_not_shadow_concurrent_store() {
        let hook = Arc::new(StoreDuringLoad {
            before_load: Mutex::new(None),
            persisted: session("old").with_peer("example.com", 443),
        });
        let cache = SessionCache::with_persistence(CacheConfig::new(), Arc::clone(&hook));

        let other = cache.clone();
        *hook.before_load.lock() = Some(Box::new(move || {
            other.store(session("new").with_peer("example.com", 443));
        }));

        let found = cache.lookup_by_peer("example.com", 443).unwrap();
        assert_eq!(found.id().as_bytes(), id("new").as_slice());

        let ids: Vec<Vec<u8>> = cache.ids().map(SessionId::into_bytes).collect();
        assert_eq!(ids, vec![id("new")]);
        let again = cache.lookup_by_peer("example.com", 443).unwrap();
        assert_eq!(again.id().as_bytes(), id("new").as_slice());
    }

    #[test]
    fn test_clone_shares_state() {
        let cache = SessionCache::new(CacheConfig::new());
        let other = cache.clone();
        cache.store(session("a"));
        assert!(other.contains(&id("a")));
    }
}
