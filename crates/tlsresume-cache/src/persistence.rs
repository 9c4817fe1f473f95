//! Persistence hooks for client-side sessions.
//!
//! A client that restarts loses its in-memory cache and with it every chance
//! to resume. The [`PersistenceHook`] trait lets the cache write sessions
//! through to durable storage keyed by peer, and consult that storage when
//! the in-memory peer index misses. [`FileSessionStore`] keeps one JSON file
//! per peer in a directory.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::session::{PeerKey, Session};

/// Trait for persistence backends.
///
/// Implement this trait to connect the session cache to your storage backend.
/// The cache calls these methods outside its internal lock.
pub trait PersistenceHook: Send + Sync {
    /// Load the session last stored for a peer.
    ///
    /// Return `Ok(None)` if nothing is stored for that peer.
    fn load(&self, peer: &PeerKey) -> Result<Option<Session>>;

    /// Save a session for a peer, replacing any previous one.
    fn save(&self, peer: &PeerKey, session: &Session) -> Result<()>;

    /// Delete whatever is stored for a peer.
    fn remove(&self, peer: &PeerKey) -> Result<()>;

    /// Called when a session leaves the in-memory cache through capacity
    /// eviction or expiry. Default implementation does nothing.
    fn on_evict(&self, _session: &Session) -> Result<()> {
        Ok(())
    }
}

impl<H: PersistenceHook + ?Sized> PersistenceHook for Box<H> {
    fn load(&self, peer: &PeerKey) -> Result<Option<Session>> {
        (**self).load(peer)
    }

    fn save(&self, peer: &PeerKey, session: &Session) -> Result<()> {
        (**self).save(peer, session)
    }

    fn remove(&self, peer: &PeerKey) -> Result<()> {
        (**self).remove(peer)
    }

    fn on_evict(&self, session: &Session) -> Result<()> {
        (**self).on_evict(session)
    }
}

impl<H: PersistenceHook + ?Sized> PersistenceHook for Arc<H> {
    fn load(&self, peer: &PeerKey) -> Result<Option<Session>> {
        (**self).load(peer)
    }

    fn save(&self, peer: &PeerKey, session: &Session) -> Result<()> {
        (**self).save(peer, session)
    }

    fn remove(&self, peer: &PeerKey) -> Result<()> {
        (**self).remove(peer)
    }

    fn on_evict(&self, session: &Session) -> Result<()> {
        (**self).on_evict(session)
    }
}

/// A no-op persistence hook for in-memory only caching.
#[derive(Debug, Clone, Default)]
pub struct NoPersistence;

impl PersistenceHook for NoPersistence {
    fn load(&self, _peer: &PeerKey) -> Result<Option<Session>> {
        Ok(None)
    }

    fn save(&self, _peer: &PeerKey, _session: &Session) -> Result<()> {
        Ok(())
    }

    fn remove(&self, _peer: &PeerKey) -> Result<()> {
        Ok(())
    }
}

/// Default maximum number of session files kept by [`FileSessionStore`].
pub const DEFAULT_MAX_FILES: usize = 1_000;

/// Extension used for session files.
const FILE_EXTENSION: &str = "session";

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Directory-backed session store, one JSON file per peer.
///
/// File names are `<hex(host)>.<port>.session`, so every peer maps to its
/// own file and no host can escape the directory. When more than `max_files`
/// files exist after a save, the least recently modified are deleted.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    dir: PathBuf,
    max_files: usize,
}

impl FileSessionStore {
    /// Open (and create if needed) a store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| io_error(&dir, e))?;
        Ok(Self {
            dir,
            max_files: DEFAULT_MAX_FILES,
        })
    }

    /// Bound the number of stored sessions.
    pub fn with_max_files(mut self, max_files: usize) -> Self {
        self.max_files = max_files.max(1);
        self
    }

    /// Root directory of the store.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file holding the session for `peer`.
    pub fn path_for(&self, peer: &PeerKey) -> PathBuf {
        self.dir.join(format!(
            "{}.{}.{FILE_EXTENSION}",
            hex::encode(peer.host.as_bytes()),
            peer.port
        ))
    }

    /// Read every stored session, skipping files that fail to parse.
    pub fn list(&self) -> Result<Vec<Session>> {
        let mut sessions = Vec::new();
        for (path, _) in self.session_files()? {
            match read_session(&path) {
                Ok(session) => sessions.push(session),
                Err(e) => debug!(path = %path.display(), error = %e, "Skipping unreadable session file"),
            }
        }
        sessions.sort_by_key(|s| s.created_at());
        Ok(sessions)
    }

    /// Session files with their modification times.
    fn session_files(&self) -> Result<Vec<(PathBuf, SystemTime)>> {
        let entries = fs::read_dir(&self.dir).map_err(|e| io_error(&self.dir, e))?;
        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| io_error(&self.dir, e))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(FILE_EXTENSION) {
                continue;
            }
            let modified = entry
                .metadata()
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            files.push((path, modified));
        }
        Ok(files)
    }

    fn trim_to_size(&self) -> Result<()> {
        let mut files = self.session_files()?;
        if files.len() <= self.max_files {
            return Ok(());
        }
        files.sort_by_key(|(_, modified)| *modified);
        let excess = files.len() - self.max_files;
        for (path, _) in files.into_iter().take(excess) {
            debug!(path = %path.display(), "Removing oldest persisted session");
            remove_file(&path)?;
        }
        Ok(())
    }
}

impl PersistenceHook for FileSessionStore {
    fn load(&self, peer: &PeerKey) -> Result<Option<Session>> {
        let path = self.path_for(peer);
        if !path.is_file() {
            return Ok(None);
        }
        match read_session(&path) {
            Ok(session) if session.peer() != Some(peer) => {
                debug!(path = %path.display(), peer = %peer, "Persisted session belongs to another peer");
                Ok(None)
            }
            Ok(session) => {
                trace!(peer = %peer, session_id = %session.id(), "Loaded persisted session");
                Ok(Some(session))
            }
            Err(e) => {
                // A corrupt file would fail every reconnect; drop it.
                remove_file(&path)?;
                Err(e)
            }
        }
    }

    fn save(&self, peer: &PeerKey, session: &Session) -> Result<()> {
        let path = self.path_for(peer);
        let json = serde_json::to_vec_pretty(session)
            .map_err(|e| Error::Persistence(format!("failed to encode session: {e}")))?;
        // Atomic replace: readers see the old file or the new one
        let tmp = path.with_extension(format!(
            "{}-{}.tmp",
            std::process::id(),
            TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        fs::write(&tmp, json).map_err(|e| io_error(&tmp, e))?;
        fs::rename(&tmp, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            io_error(&path, e)
        })?;
        trace!(peer = %peer, session_id = %session.id(), "Persisted session");
        self.trim_to_size()
    }

    fn remove(&self, peer: &PeerKey) -> Result<()> {
        remove_file(&self.path_for(peer))
    }
}

fn read_session(path: &Path) -> Result<Session> {
    let bytes = fs::read(path).map_err(|e| io_error(path, e))?;
    serde_json::from_slice(&bytes).map_err(|e| {
        Error::Persistence(format!(
            "failed to decode session file '{}': {e}",
            path.display()
        ))
    })
}

fn remove_file(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(io_error(path, e)),
    }
}

fn io_error(path: &Path, e: io::Error) -> Error {
    Error::Persistence(format!("'{}': {e}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionId;
    use tempfile::TempDir;

    fn session(byte: u8, host: &str, port: u16) -> Session {
        Session::new(SessionId::new(vec![byte; 32]).unwrap(), vec![byte])
            .with_protocol("TLSv1.2")
            .with_peer(host, port)
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let store = FileSessionStore::open(dir.path()).unwrap();
        let peer = PeerKey::new("example.com", 443);
        let s = session(1, "example.com", 443);

        store.save(&peer, &s).unwrap();
        let loaded = store.load(&peer).unwrap().unwrap();
        assert_eq!(loaded, s);

        assert!(store.load(&PeerKey::new("example.com", 8443)).unwrap().is_none());
    }

    #[test]
    fn test_save_replaces_previous_session() {
        let dir = TempDir::new().unwrap();
        let store = FileSessionStore::open(dir.path()).unwrap();
        let peer = PeerKey::new("example.com", 443);

        store.save(&peer, &session(1, "example.com", 443)).unwrap();
        store.save(&peer, &session(2, "example.com", 443)).unwrap();

        let loaded = store.load(&peer).unwrap().unwrap();
        assert_eq!(loaded.state(), &[2]);
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn test_remove() {
        let dir = TempDir::new().unwrap();
        let store = FileSessionStore::open(dir.path()).unwrap();
        let peer = PeerKey::new("example.com", 443);

        store.save(&peer, &session(1, "example.com", 443)).unwrap();
        store.remove(&peer).unwrap();
        assert!(store.load(&peer).unwrap().is_none());

        // Removing a missing entry is not an error
        store.remove(&peer).unwrap();
    }

    #[test]
    fn test_corrupt_file_is_dropped() {
        let dir = TempDir::new().unwrap();
        let store = FileSessionStore::open(dir.path()).unwrap();
        let peer = PeerKey::new("example.com", 443);
        fs::write(store.path_for(&peer), b"not json").unwrap();

        assert!(matches!(store.load(&peer), Err(Error::Persistence(_))));
        assert!(!store.path_for(&peer).exists());
    }

    #[test]
    fn test_host_stays_inside_dir() {
        let dir = TempDir::new().unwrap();
        let store = FileSessionStore::open(dir.path()).unwrap();
        let path = store.path_for(&PeerKey::new("../etc/passwd", 1));
        assert_eq!(path.parent(), Some(dir.path()));
        assert_eq!(
            path.file_name().and_then(|n| n.to_str()),
            Some("2e2e2f6574632f706173737764.1.session")
        );
    }

    #[test]
    fn test_distinct_hosts_get_distinct_files() {
        let dir = TempDir::new().unwrap();
        let store = FileSessionStore::open(dir.path()).unwrap();
        let v6 = PeerKey::new("fe80::1", 443);
        let lookalike = PeerKey::new("fe80__1", 443);
        assert_ne!(store.path_for(&v6), store.path_for(&lookalike));

        store.save(&v6, &session(1, "fe80::1", 443)).unwrap();
        assert!(store.load(&lookalike).unwrap().is_none());
        assert_eq!(store.load(&v6).unwrap().unwrap().state(), &[1]);
    }

    #[test]
    fn test_load_ignores_session_for_other_peer() {
        let dir = TempDir::new().unwrap();
        let store = FileSessionStore::open(dir.path()).unwrap();
        let peer = PeerKey::new("example.com", 443);

        // File under this peer's name holding another server's session
        let json = serde_json::to_vec(&session(1, "example.org", 443)).unwrap();
        fs::write(store.path_for(&peer), json).unwrap();

        assert!(store.load(&peer).unwrap().is_none());
    }

    #[test]
    fn test_max_files_bounds_store() {
        let dir = TempDir::new().unwrap();
        let store = FileSessionStore::open(dir.path()).unwrap().with_max_files(2);

        for port in 1..=4u16 {
            let peer = PeerKey::new("host", port);
            store.save(&peer, &session(port as u8, "host", port)).unwrap();
        }

        assert_eq!(store.list().unwrap().len(), 2);
    }
}
