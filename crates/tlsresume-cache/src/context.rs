//! Client/server cache pair owned by one TLS context.

use crate::cache::SessionCache;
use crate::config::CacheConfig;
use crate::persistence::{NoPersistence, PersistenceHook};

/// The two independent session caches of a TLS context.
///
/// `client` holds sessions this side initiated, `server` holds sessions it
/// accepted. They never share entries and are configured independently.
/// Only the client side carries a persistence hook, since a client is the
/// party that looks sessions up by peer after a restart.
pub struct SessionContext<P: PersistenceHook = NoPersistence> {
    client: SessionCache<P>,
    server: SessionCache,
}

impl SessionContext<NoPersistence> {
    /// Create a context with in-memory caches.
    pub fn new(client: CacheConfig, server: CacheConfig) -> Self {
        Self::with_client_persistence(client, server, NoPersistence)
    }
}

impl Default for SessionContext<NoPersistence> {
    fn default() -> Self {
        Self::new(CacheConfig::client_default(), CacheConfig::server_default())
    }
}

impl<P: PersistenceHook> Clone for SessionContext<P> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            server: self.server.clone(),
        }
    }
}

impl<P: PersistenceHook> std::fmt::Debug for SessionContext<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("client", &self.client)
            .field("server", &self.server)
            .finish()
    }
}

impl<P: PersistenceHook> SessionContext<P> {
    /// Create a context whose client cache writes through to `persistence`.
    pub fn with_client_persistence(client: CacheConfig, server: CacheConfig, persistence: P) -> Self {
        Self {
            client: SessionCache::with_persistence(client, persistence),
            server: SessionCache::new(server),
        }
    }

    /// Cache of sessions initiated as a client.
    pub fn client(&self) -> &SessionCache<P> {
        &self.client
    }

    /// Cache of sessions accepted as a server.
    pub fn server(&self) -> &SessionCache {
        &self.server
    }
}
