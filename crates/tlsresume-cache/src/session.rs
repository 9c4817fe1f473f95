//! Session and session identifier types.

use std::borrow::Borrow;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Opaque, non-empty TLS session identifier.
///
/// TLS 1.2 session ids are 32 bytes, but the cache does not depend on a
/// particular length. Displayed and serialized as lowercase hex.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionId(Vec<u8>);

impl SessionId {
    /// Create a session id from raw bytes. Empty ids are rejected.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(Error::InvalidArgument(
                "session id must not be empty".to_string(),
            ));
        }
        Ok(Self(bytes))
    }

    /// Parse a session id from its hex representation.
    pub fn from_hex(encoded: &str) -> Result<Self> {
        let bytes = hex::decode(encoded).map_err(|e| {
            Error::InvalidArgument(format!("invalid hex session id '{encoded}': {e}"))
        })?;
        Self::new(bytes)
    }

    /// Raw id bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Length of the id in bytes (never zero).
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Lowercase hex encoding of the id.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// Consume the id and return its bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl Borrow<[u8]> for SessionId {
    fn borrow(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<[u8]> for SessionId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl TryFrom<Vec<u8>> for SessionId {
    type Error = Error;

    fn try_from(bytes: Vec<u8>) -> Result<Self> {
        Self::new(bytes)
    }
}

impl TryFrom<&[u8]> for SessionId {
    type Error = Error;

    fn try_from(bytes: &[u8]) -> Result<Self> {
        Self::new(bytes.to_vec())
    }
}

impl TryFrom<String> for SessionId {
    type Error = Error;

    fn try_from(hex: String) -> Result<Self> {
        Self::from_hex(&hex)
    }
}

impl From<SessionId> for String {
    fn from(id: SessionId) -> Self {
        id.to_hex()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId({})", self.to_hex())
    }
}

/// Remote endpoint a client-side session was negotiated with.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerKey {
    pub host: String,
    pub port: u16,
}

impl PeerKey {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for PeerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Negotiated TLS session state.
///
/// The cache treats everything except the id (and the peer, for the
/// client-side index) as opaque. A session is immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    id: SessionId,
    created_at: DateTime<Utc>,
    #[serde(default)]
    protocol: String,
    #[serde(default)]
    cipher_suite: String,
    #[serde(default)]
    peer: Option<PeerKey>,
    #[serde(default)]
    state: Vec<u8>,
}

impl Session {
    /// Create a session created now with the given opaque state.
    pub fn new(id: SessionId, state: Vec<u8>) -> Self {
        Self {
            id,
            created_at: Utc::now(),
            protocol: String::new(),
            cipher_suite: String::new(),
            peer: None,
            state,
        }
    }

    /// Set the negotiated protocol version (e.g. `TLSv1.2`).
    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = protocol.into();
        self
    }

    /// Set the negotiated cipher suite name.
    pub fn with_cipher_suite(mut self, cipher_suite: impl Into<String>) -> Self {
        self.cipher_suite = cipher_suite.into();
        self
    }

    /// Record the peer this session was negotiated with.
    pub fn with_peer(mut self, host: impl Into<String>, port: u16) -> Self {
        self.peer = Some(PeerKey::new(host, port));
        self
    }

    /// Override the creation timestamp.
    pub fn with_created_at(mut self, ts: DateTime<Utc>) -> Self {
        self.created_at = ts;
        self
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    pub fn cipher_suite(&self) -> &str {
        &self.cipher_suite
    }

    pub fn peer(&self) -> Option<&PeerKey> {
        self.peer.as_ref()
    }

    /// Opaque negotiated state (master secret, extensions, ...).
    pub fn state(&self) -> &[u8] {
        &self.state
    }
}
