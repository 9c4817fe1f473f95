//! TLS session cache with FIFO eviction and timeout support.
//!
//! This crate provides the session store a TLS engine consults for
//! session resumption:
//! - Bounded capacity with insertion-order eviction
//! - Timeout-based expiry (`0` disables it)
//! - Independent client-side and server-side caches per context
//! - A peer index and persistence hooks for client-side resumption
//!
//! # Example
//!
//! ```rust
//! use tlsresume_cache::{CacheConfig, Session, SessionContext, SessionId};
//!
//! let ctx = SessionContext::new(
//!     CacheConfig::client_default(),
//!     CacheConfig::server_default().with_capacity(100),
//! );
//!
//! let id = SessionId::new(vec![0x42; 32]).unwrap();
//! ctx.server().store(Session::new(id.clone(), b"master-secret".to_vec()));
//!
//! let resumed = ctx.server().lookup(Some(id.as_bytes())).unwrap();
//! assert!(resumed.is_some());
//! ```

mod cache;
mod config;
mod context;
mod error;
mod expiry;
mod persistence;
mod session;

pub use cache::{CacheEntry, CacheStats, SessionCache, SessionIds};
pub use config::{
    CacheConfig, DEFAULT_CLIENT_CACHE_SIZE, DEFAULT_SERVER_CACHE_SIZE, DEFAULT_SESSION_TIMEOUT,
};
pub use context::SessionContext;
pub use error::{Error, Result};
pub use expiry::ExpiryPolicy;
pub use persistence::{DEFAULT_MAX_FILES, FileSessionStore, NoPersistence, PersistenceHook};
pub use session::{PeerKey, Session, SessionId};
