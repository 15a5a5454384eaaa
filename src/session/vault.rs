//! Local persistence of the session credential and the signed-in address.
//!
//! The credential goes to the system keyring when available, otherwise to a
//! `0600` file in the config directory. `DRAFTLY_SESSION_TOKEN` overrides both.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::io::Write;
use std::path::PathBuf;

#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;

const ENV_TOKEN: &str = "DRAFTLY_SESSION_TOKEN";
const KEYRING_SERVICE: &str = "draftly";
const KEYRING_KEY: &str = "session";

/// What survives a restart of the client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedSession {
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

pub trait SessionVault: Send + Sync {
    fn load(&self) -> Option<PersistedSession>;
    fn store(&self, session: &PersistedSession) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

/// Keyring-backed vault with a file fallback.
pub struct KeyringVault {
    session_file: PathBuf,
}

impl KeyringVault {
    pub fn new() -> Self {
        let session_file = crate::config::Config::config_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(".session.toml");
        Self { session_file }
    }

    #[cfg(test)]
    fn with_file(session_file: PathBuf) -> Self {
        Self { session_file }
    }

    fn keyring_get(&self) -> Option<String> {
        let entry = keyring::Entry::new(KEYRING_SERVICE, KEYRING_KEY).ok()?;
        entry.get_password().ok()
    }

    fn keyring_set(&self, token: &str) -> bool {
        let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, KEYRING_KEY) else {
            return false;
        };
        if entry.set_password(token).is_err() {
            return false;
        }
        // Read back through a fresh entry; in-memory stores fail this
        self.keyring_get().as_deref() == Some(token)
    }

    fn keyring_delete(&self) {
        if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, KEYRING_KEY) {
            let _ = entry.delete_credential();
        }
    }

    fn file_get(&self) -> Option<PersistedSession> {
        let content = fs::read_to_string(&self.session_file).ok()?;
        toml::from_str(&content).ok()
    }

    /// Write the session file with restricted permissions
    fn file_set(&self, session: &PersistedSession) -> Result<()> {
        if let Some(parent) = self.session_file.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string(session).context("Failed to serialize session")?;

        #[cfg(unix)]
        {
            let mut file = fs::OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(0o600)
                .open(&self.session_file)?;
            file.write_all(content.as_bytes())?;
        }

        #[cfg(not(unix))]
        {
            let mut file = fs::File::create(&self.session_file)?;
            file.write_all(content.as_bytes())?;
        }

        Ok(())
    }
}

impl SessionVault for KeyringVault {
    fn load(&self) -> Option<PersistedSession> {
        let stored = self.file_get();
        let token = env::var(ENV_TOKEN)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| self.keyring_get())
            .or_else(|| stored.as_ref().and_then(|s| s.token.clone()));

        match (stored, token) {
            (Some(stored), token) => Some(PersistedSession {
                email: stored.email,
                token,
            }),
            (None, Some(token)) => Some(PersistedSession {
                email: String::new(),
                token: Some(token),
            }),
            (None, None) => None,
        }
    }

    fn store(&self, session: &PersistedSession) -> Result<()> {
        let in_keyring = session
            .token
            .as_deref()
            .is_some_and(|token| self.keyring_set(token));

        if session.token.is_some() && !in_keyring {
            tracing::info!("Keyring unavailable, keeping session token in file");
        }

        let on_disk = PersistedSession {
            email: session.email.clone(),
            token: if in_keyring {
                None
            } else {
                session.token.clone()
            },
        };
        self.file_set(&on_disk)
            .with_context(|| format!("Failed to write {}", self.session_file.display()))
    }

    fn clear(&self) -> Result<()> {
        self.keyring_delete();
        match fs::remove_file(&self.session_file) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e)
                .with_context(|| format!("Failed to remove {}", self.session_file.display())),
        }
    }
}

/// In-process vault; nothing reaches the disk.
#[cfg(test)]
#[derive(Default)]
pub struct MemoryVault {
    slot: std::sync::Mutex<Option<PersistedSession>>,
}

#[cfg(test)]
impl MemoryVault {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
impl SessionVault for MemoryVault {
    fn load(&self) -> Option<PersistedSession> {
        self.slot
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn store(&self, session: &PersistedSession) -> Result<()> {
        *self.slot.lock().unwrap_or_else(|e| e.into_inner()) = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.slot.lock().unwrap_or_else(|e| e.into_inner()) = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_file_round_trip_and_clear() {
        let dir = env::temp_dir().join(format!("draftly-vault-{}", std::process::id()));
        let vault = KeyringVault::with_file(dir.join(".session.toml"));
        let session = PersistedSession {
            email: "me@example.com".into(),
            token: None,
        };

        vault.file_set(&session).unwrap();
        assert_eq!(vault.file_get(), Some(session));

        vault.clear().unwrap();
        assert!(vault.file_get().is_none());
        // Clearing twice is fine
        vault.clear().unwrap();
        let _ = fs::remove_dir_all(dir);
    }

    #[cfg(unix)]
    #[test]
    fn test_session_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = env::temp_dir().join(format!("draftly-vault-perm-{}", std::process::id()));
        let vault = KeyringVault::with_file(dir.join(".session.toml"));
        vault
            .file_set(&PersistedSession {
                email: "me@example.com".into(),
                token: Some("secret".into()),
            })
            .unwrap();

        let mode = fs::metadata(dir.join(".session.toml"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_memory_vault() {
        let vault = MemoryVault::new();
        assert!(vault.load().is_none());
        let session = PersistedSession {
            email: "a@b.c".into(),
            token: Some("t".into()),
        };
        vault.store(&session).unwrap();
        assert_eq!(vault.load(), Some(session));
        vault.clear().unwrap();
        assert!(vault.load().is_none());
    }
}
