use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};

use super::error::StorageError;

const PROBE_KEY: &str = "__test_storage__";
const CREDENTIAL_FILE_VERSION: u32 = 1;

/// Fixed keys for the values the client persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr)]
pub enum CredentialKey {
    #[strum(serialize = "app_auth_token")]
    AccessToken,
    #[strum(serialize = "app_refresh_token")]
    RefreshToken,
    #[strum(serialize = "app_user")]
    User,
}

impl CredentialKey {
    pub const ALL: [CredentialKey; 3] = [Self::AccessToken, Self::RefreshToken, Self::User];
}

/// Preferred backing mechanism for a [`CredentialStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum StorageKind {
    /// Survives process restarts (`~/.tether/credentials.toml`).
    Durable,
    /// Survives process restarts within one login session (runtime dir).
    Session,
    /// Process memory only.
    Memory,
}

/// Key/value capability set every backing mechanism provides.
pub trait StorageBackend: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;
    fn clear(&self) -> Result<(), StorageError>;

    /// Availability probe: write then remove a marker item.
    fn probe(&self) -> bool {
        self.set_item(PROBE_KEY, PROBE_KEY)
            .and_then(|()| self.remove_item(PROBE_KEY))
            .is_ok()
    }
}

/// In-memory backend; also the fallback when a preferred backend is unavailable.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    items: Mutex<HashMap<String, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn items(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl StorageBackend for MemoryBackend {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.items().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.items().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.items().remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.items().clear();
        Ok(())
    }
}

/// File-backed store using a single TOML file.
///
/// # Example
/// ```no_run
/// use tether::auth::store::{FileBackend, StorageBackend};
///
/// let backend = FileBackend::durable();
/// backend.set_item("app_auth_token", "access")?;
/// # Ok::<(), tether::auth::StorageError>(())
/// ```
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// `~/.tether/credentials.toml`.
    pub fn durable() -> Self {
        Self::new(default_tether_dir().join("credentials.toml"))
    }

    /// `$XDG_RUNTIME_DIR/tether/session.toml`, or the OS temp dir when the
    /// platform has no per-login runtime directory.
    pub fn session() -> Self {
        let base = directories::BaseDirs::new()
            .and_then(|dirs| dirs.runtime_dir().map(Path::to_path_buf))
            .unwrap_or_else(std::env::temp_dir);
        Self::new(base.join("tether").join("session.toml"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<BTreeMap<String, String>, StorageError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(err) => return Err(err.into()),
        };
        let file: CredentialFile = toml::from_str(&raw)?;
        Ok(file.items)
    }

    fn write(&self, items: BTreeMap<String, String>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = CredentialFile {
            version: CREDENTIAL_FILE_VERSION,
            saved_at: Utc::now(),
            items,
        };
        fs::write(&self.path, toml::to_string(&file)?)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600))?;
        }
        Ok(())
    }

    fn update(
        &self,
        apply: impl FnOnce(&mut BTreeMap<String, String>),
    ) -> Result<(), StorageError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.check_location()?;
        let mut items = self.read()?;
        apply(&mut items);
        self.write(items)
    }

    /// The credential file's directory must be a directory (or not exist yet).
    fn check_location(&self) -> Result<(), StorageError> {
        match self.path.parent() {
            Some(parent) if parent.exists() && !parent.is_dir() => Err(StorageError::Unavailable(
                format!("{} is not a directory", parent.display()),
            )),
            _ => Ok(()),
        }
    }
}

impl StorageBackend for FileBackend {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self.read()?.remove(key))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.update(|items| {
            items.insert(key.to_string(), value.to_string());
        })
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.update(|items| {
            items.remove(key);
        })
    }

    fn clear(&self) -> Result<(), StorageError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CredentialFile {
    version: u32,
    saved_at: DateTime<Utc>,
    #[serde(default)]
    items: BTreeMap<String, String>,
}

/// Access token, refresh token and cached user record, over one backend.
///
/// The backend is picked once at construction. If the preferred one fails its
/// availability probe, an in-memory backend is used instead and a warning is
/// logged; callers cannot observe which one is active.
#[derive(Clone)]
pub struct CredentialStore {
    backend: Arc<dyn StorageBackend>,
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore").finish_non_exhaustive()
    }
}

impl CredentialStore {
    /// Store over the default location for `kind`.
    pub fn new(kind: StorageKind) -> Self {
        match kind {
            StorageKind::Durable => Self::with_backend(kind, FileBackend::durable()),
            StorageKind::Session => Self::with_backend(kind, FileBackend::session()),
            StorageKind::Memory => Self::in_memory(),
        }
    }

    pub fn in_memory() -> Self {
        Self {
            backend: Arc::new(MemoryBackend::new()),
        }
    }

    /// Durable store rooted at `dir` instead of the home directory.
    pub fn durable_at(dir: impl AsRef<Path>) -> Self {
        Self::with_backend(
            StorageKind::Durable,
            FileBackend::new(dir.as_ref().join("credentials.toml")),
        )
    }

    /// Probe `backend` and fall back to memory if it is unusable.
    pub fn with_backend(preferred: StorageKind, backend: impl StorageBackend + 'static) -> Self {
        if backend.probe() {
            return Self {
                backend: Arc::new(backend),
            };
        }
        tracing::warn!(
            storage = %preferred,
            "{preferred} storage is unavailable; credentials will be kept in memory and lost when the process exits"
        );
        Self::in_memory()
    }

    pub fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.backend.get_item(key)
    }

    pub fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.backend.set_item(key, value)
    }

    pub fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.backend.remove_item(key)
    }

    /// Remove every item held by the backend.
    pub fn clear(&self) -> Result<(), StorageError> {
        self.backend.clear()
    }

    pub fn get_token(&self, key: CredentialKey) -> Result<Option<String>, StorageError> {
        Ok(self
            .backend
            .get_item(key.as_ref())?
            .filter(|value| !value.is_empty()))
    }

    pub fn set_token(&self, key: CredentialKey, value: &str) -> Result<(), StorageError> {
        self.backend.set_item(key.as_ref(), value)
    }

    pub fn remove_token(&self, key: CredentialKey) -> Result<(), StorageError> {
        self.backend.remove_item(key.as_ref())
    }

    /// Remove the access token, refresh token and user record.
    pub fn clear_all(&self) -> Result<(), StorageError> {
        for key in CredentialKey::ALL {
            self.backend.remove_item(key.as_ref())?;
        }
        Ok(())
    }
}

fn default_tether_dir() -> PathBuf {
    directories::UserDirs::new()
        .map(|dirs| dirs.home_dir().join(".tether"))
        .unwrap_or_else(|| PathBuf::from(".tether"))
}
