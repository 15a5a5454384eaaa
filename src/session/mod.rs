//! Process-wide authentication state.
//!
//! `SessionStore` is the only writer of [`Identity`]. It performs no network
//! calls; callers refresh the UI and navigate after changing it.

mod vault;

use std::sync::{Arc, Mutex, MutexGuard};

use crate::model::Identity;

#[cfg(test)]
pub use vault::MemoryVault;
pub use vault::{KeyringVault, PersistedSession, SessionVault};

pub struct SessionStore {
    identity: Mutex<Identity>,
    vault: Arc<dyn SessionVault>,
}

impl SessionStore {
    pub fn new(vault: Box<dyn SessionVault>) -> Self {
        Self {
            identity: Mutex::new(Identity::default()),
            vault: Arc::from(vault),
        }
    }

    #[cfg(test)]
    pub fn ephemeral() -> Self {
        Self::new(Box::new(MemoryVault::new()))
    }

    fn lock(&self) -> MutexGuard<'_, Identity> {
        self.identity.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Pull a persisted credential back in. The identity stays
    /// unauthenticated until the backend confirms it.
    pub fn restore(&self) -> bool {
        let Some(saved) = self.vault.load() else {
            return false;
        };
        let mut identity = self.lock();
        identity.user_email = saved.email;
        identity.session_credential = saved.token;
        tracing::debug!(
            "Restored session for {:?} (credential: {})",
            identity.user_email,
            identity.session_credential.is_some()
        );
        identity.session_credential.is_some() || !identity.user_email.is_empty()
    }

    pub fn set_identity(&self, authenticated: bool, email: &str) {
        let snapshot = {
            let mut identity = self.lock();
            identity.is_authenticated = authenticated;
            identity.user_email = email.to_string();
            identity.clone()
        };
        if authenticated {
            self.persist(&snapshot);
        }
    }

    pub fn set_credential(&self, token: impl Into<String>) {
        let snapshot = {
            let mut identity = self.lock();
            identity.session_credential = Some(token.into());
            identity.clone()
        };
        self.persist(&snapshot);
    }

    pub fn identity(&self) -> Identity {
        self.lock().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.lock().is_authenticated
    }

    pub fn credential(&self) -> Option<String> {
        self.lock().session_credential.clone()
    }

    pub fn email(&self) -> String {
        self.lock().user_email.clone()
    }

    /// Forget the identity and the persisted credential. The in-memory
    /// identity is gone before the first await; keyring and file I/O run on
    /// the blocking pool.
    pub async fn clear(&self) {
        *self.lock() = Identity::default();
        let vault = Arc::clone(&self.vault);
        match tokio::task::spawn_blocking(move || vault.clear()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!("Failed to clear persisted session: {:#}", e),
            Err(e) => tracing::warn!("Session clear task failed: {}", e),
        }
    }

    fn persist(&self, identity: &Identity) {
        let session = PersistedSession {
            email: identity.user_email.clone(),
            token: identity.session_credential.clone(),
        };
        if let Err(e) = self.vault.store(&session) {
            tracing::warn!("Failed to persist session: {:#}", e);
        }
    }
}
