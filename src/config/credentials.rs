//! Persisted API credential (the console's client-local storage).

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ConsoleError, Result};

/// Fixed key the credential is stored under.
pub const API_KEY_STORAGE_KEY: &str = "tmp::voice_api_key";

/// Storage abstraction for the persisted API key.
pub trait CredentialStore: Send + Sync {
    fn load(&self) -> Result<Option<String>>;
    /// Persist `value`. Empty or whitespace-only values are ignored.
    fn save(&self, value: &str) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

/// File-backed credential store using a TOML file.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    base_dir: PathBuf,
}

#[derive(Debug, Serialize, Deserialize)]
struct CredentialFile {
    version: u32,
    key: String,
    value: String,
    saved_at: DateTime<Utc>,
}

impl FileCredentialStore {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub fn new_default() -> Self {
        Self::new(default_console_dir())
    }

    pub fn path(&self) -> PathBuf {
        let name = API_KEY_STORAGE_KEY.replace("::", "-");
        self.base_dir.join(format!("{name}.toml"))
    }

    fn ensure_parent(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Result<Option<String>> {
        let raw = match fs::read_to_string(self.path()) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let file: CredentialFile = toml::from_str(&raw).map_err(|error| {
            ConsoleError::Configuration(format!("Corrupt credential file: {error}"))
        })?;
        if file.key != API_KEY_STORAGE_KEY {
            return Ok(None);
        }
        Ok(Some(file.value))
    }

    fn save(&self, value: &str) -> Result<()> {
        let value = value.trim();
        if value.is_empty() {
            return Ok(());
        }
        let path = self.path();
        Self::ensure_parent(&path)?;
        let file = CredentialFile {
            version: 1,
            key: API_KEY_STORAGE_KEY.to_string(),
            value: value.to_string(),
            saved_at: Utc::now(),
        };
        let serialized = toml::to_string(&file).map_err(|error| {
            ConsoleError::Configuration(format!("Failed to serialize credential: {error}"))
        })?;
        fs::write(&path, serialized)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o600))?;
        }
        tracing::debug!(path = %path.display(), "stored api key");
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        match fs::remove_file(self.path()) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

fn default_console_dir() -> PathBuf {
    directories::UserDirs::new()
        .map(|dirs| dirs.home_dir().join(".realtime-console"))
        .unwrap_or_else(|| PathBuf::from(".realtime-console"))
}
