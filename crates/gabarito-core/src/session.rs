//! Session store.
//!
//! The store is an explicit context object: front-ends create it once with
//! [`SessionStore::hydrate`], pass it to whatever needs the current user, and
//! tear it down with [`SessionStore::logout`]. Durable persistence is behind
//! the [`SessionStorage`] trait so the same store works over a file on disk or
//! an in-memory slot in tests.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::access::Route;
use crate::backend::ExamBackend;
use crate::error::{ClientError, ClientResult};
use crate::model::{Credentials, Registration, Session};

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

/// Durable slot holding at most one session.
pub trait SessionStorage: Send + Sync {
    /// Read the persisted session, if any.
    fn load(&self) -> Result<Option<Session>>;

    /// Replace the persisted session.
    fn save(&self, session: &Session) -> Result<()>;

    /// Remove the persisted session. Removing an empty slot is not an error.
    fn clear(&self) -> Result<()>;
}

/// Session persisted as JSON in a file.
#[derive(Debug, Clone)]
pub struct FileSessionStorage {
    path: PathBuf,
}

impl FileSessionStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStorage for FileSessionStorage {
    fn load(&self) -> Result<Option<Session>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read session file {}", self.path.display()))?;
        let session: Session = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse session file {}", self.path.display()))?;
        Ok(Some(session))
    }

    fn save(&self, session: &Session) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(session).context("failed to serialize session")?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("failed to write session file {}", self.path.display()))?;

        // The file holds a bearer token.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))?;
        }
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e)
                .with_context(|| format!("failed to remove session file {}", self.path.display())),
        }
    }
}

/// In-memory slot. Clones share the slot, so dropping a store and hydrating a
/// new one from a clone behaves like a reload.
#[derive(Debug, Clone, Default)]
pub struct MemorySessionStorage {
    slot: Arc<Mutex<Option<Session>>>,
}

impl MemorySessionStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStorage for MemorySessionStorage {
    fn load(&self) -> Result<Option<Session>> {
        let slot = self
            .slot
            .lock()
            .map_err(|_| anyhow::anyhow!("session slot lock poisoned"))?;
        Ok(slot.clone())
    }

    fn save(&self, session: &Session) -> Result<()> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| anyhow::anyhow!("session slot lock poisoned"))?;
        *slot = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| anyhow::anyhow!("session slot lock poisoned"))?;
        *slot = None;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Holds the current session and keeps it in sync with durable storage.
pub struct SessionStore {
    storage: Box<dyn SessionStorage>,
    current: Option<Session>,
}

impl SessionStore {
    /// Build a store and restore whatever session the storage holds.
    ///
    /// A persisted session without a token, or one that cannot be read, is
    /// discarded and the storage cleared.
    pub fn hydrate(storage: impl SessionStorage + 'static) -> Self {
        let current = match storage.load() {
            Ok(Some(session)) if session.is_authenticated() => {
                debug!(user = %session.user.id, "restored session");
                Some(session)
            }
            Ok(Some(_)) => {
                warn!("discarding persisted session without a token");
                clear_quietly(&storage);
                None
            }
            Ok(None) => None,
            Err(e) => {
                warn!("discarding unreadable session: {e:#}");
                clear_quietly(&storage);
                None
            }
        };
        Self {
            storage: Box::new(storage),
            current,
        }
    }

    /// The active session, if the user is logged in.
    pub fn current(&self) -> Option<&Session> {
        self.current.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.current.is_some()
    }

    /// The active session, or `NotAuthenticated`.
    pub fn require(&self) -> ClientResult<&Session> {
        self.current.as_ref().ok_or(ClientError::NotAuthenticated)
    }

    /// Authenticate against the backend and persist the new session.
    ///
    /// A single attempt; failures are returned for the caller to display.
    pub async fn login(
        &mut self,
        backend: &dyn ExamBackend,
        credentials: &Credentials,
    ) -> ClientResult<&Session> {
        let session = backend.login(credentials).await?;
        info!(user = %session.user.id, role = %session.user.role, "logged in");
        self.begin(session)
    }

    /// Create an account and start a session for it.
    pub async fn register(
        &mut self,
        backend: &dyn ExamBackend,
        registration: &Registration,
    ) -> ClientResult<&Session> {
        let session = backend.register(registration).await?;
        info!(user = %session.user.id, role = %session.user.role, "registered");
        self.begin(session)
    }

    /// Re-read the profile from `/auth/me`.
    ///
    /// A rejected token ends the session locally.
    pub async fn refresh(&mut self, backend: &dyn ExamBackend) -> ClientResult<&Session> {
        let token = self.require()?.token.clone();
        match backend.me(&token).await {
            Ok(profile) => {
                let session = Session {
                    token,
                    user: profile.into(),
                };
                self.begin(session)
            }
            Err(ClientError::Unauthorized(message)) => {
                warn!("token rejected, ending session");
                self.teardown()?;
                Err(ClientError::Unauthorized(message))
            }
            Err(e) => Err(e),
        }
    }

    /// End the session.
    ///
    /// The backend is told best-effort; local storage is always cleared.
    /// Returns where the user should land next.
    pub async fn logout(&mut self, backend: &dyn ExamBackend) -> ClientResult<Route> {
        if let Some(session) = &self.current {
            if let Err(e) = backend.logout(&session.token).await {
                warn!("backend logout failed, clearing local session anyway: {e}");
            }
        }
        self.teardown()?;
        info!("logged out");
        Ok(Route::Login)
    }

    /// Adopt a session and persist it.
    pub fn begin(&mut self, session: Session) -> ClientResult<&Session> {
        if !session.is_authenticated() {
            return Err(ClientError::Decode("session without a token".into()));
        }
        self.storage
            .save(&session)
            .map_err(|e| ClientError::Storage(format!("{e:#}")))?;
        Ok(self.current.insert(session))
    }

    /// Forget the session and clear durable storage.
    pub fn teardown(&mut self) -> ClientResult<()> {
        self.current = None;
        self.storage
            .clear()
            .map_err(|e| ClientError::Storage(format!("{e:#}")))
    }
}

fn clear_quietly(storage: &dyn SessionStorage) {
    if let Err(e) = storage.clear() {
        warn!("failed to clear session storage: {e:#}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Role, User};

    fn session(token: &str) -> Session {
        Session {
            token: token.into(),
            user: User {
                id: "u-1".into(),
                name: "Ana".into(),
                email: "ana@example.com".into(),
                role: Role::Professor,
            },
        }
    }

    #[test]
    fn empty_storage_hydrates_unauthenticated() {
        let store = SessionStore::hydrate(MemorySessionStorage::new());
        assert!(!store.is_authenticated());
        assert!(matches!(store.require(), Err(ClientError::NotAuthenticated)));
    }

    #[test]
    fn session_survives_reload() {
        let storage = MemorySessionStorage::new();
        let mut store = SessionStore::hydrate(storage.clone());
        store.begin(session("tok")).unwrap();
        drop(store);

        let reloaded = SessionStore::hydrate(storage);
        assert_eq!(reloaded.current().unwrap().token, "tok");
    }

    #[test]
    fn tokenless_session_is_discarded_on_hydrate() {
        let storage = MemorySessionStorage::new();
        storage.save(&session("")).unwrap();

        let store = SessionStore::hydrate(storage.clone());
        assert!(!store.is_authenticated());
        assert!(storage.load().unwrap().is_none());
    }

    #[test]
    fn begin_refuses_tokenless_session() {
        let mut store = SessionStore::hydrate(MemorySessionStorage::new());
        assert!(matches!(
            store.begin(session("")),
            Err(ClientError::Decode(_))
        ));
        assert!(!store.is_authenticated());
    }

    #[test]
    fn teardown_clears_storage() {
        let storage = MemorySessionStorage::new();
        let mut store = SessionStore::hydrate(storage.clone());
        store.begin(session("tok")).unwrap();
        store.teardown().unwrap();
        assert!(!store.is_authenticated());
        assert!(storage.load().unwrap().is_none());
    }

    #[test]
    fn file_storage_roundtrip_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("session.json");
        let storage = FileSessionStorage::new(&path);

        assert!(storage.load().unwrap().is_none());
        storage.save(&session("file-token")).unwrap();
        assert!(path.exists());
        assert_eq!(storage.load().unwrap().unwrap().token, "file-token");

        storage.clear().unwrap();
        assert!(!path.exists());
        // Clearing twice is fine.
        storage.clear().unwrap();
    }

    #[test]
    fn corrupt_session_file_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "{ not json").unwrap();

        let store = SessionStore::hydrate(FileSessionStorage::new(&path));
        assert!(!store.is_authenticated());
        assert!(!path.exists());
    }
}
