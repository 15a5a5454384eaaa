//! Application core - wires the session, transport and components together
//! and maps commands onto them.

mod command;
mod event_loop;

use anyhow::Result;
use std::sync::{Arc, Mutex};

use crate::api::BackendApi;
use crate::config::Config;
use crate::draft::DraftLifecycle;
use crate::error::ClientError;
use crate::events::{Emitter, UiEvent};
use crate::inbox::{InboxSyncEngine, SyncReport};
use crate::model::{Ack, Tone};
use crate::session::{KeyringVault, SessionStore};
use crate::thread::ThreadSession;
use crate::transport::{HttpBackend, Reply, ReqwestBackend, RetryConfig, TransportGateway};

pub use command::{CommandError, CommandHelp, ParsedCommand, available_commands, parse_command};
pub use event_loop::App;

pub struct AppController {
    config: Config,
    api: BackendApi,
    inbox: Arc<InboxSyncEngine>,
    threads: Arc<ThreadSession>,
    drafts: DraftLifecycle,
    emitter: Emitter,
    tone: Mutex<Tone>,
}

impl AppController {
    /// Production wiring: keyring-backed session and the HTTP backend.
    pub fn new(config: Config, emitter: Emitter) -> Result<Self> {
        let session = Arc::new(SessionStore::new(Box::new(KeyringVault::new())));
        session.restore();

        let backend = ReqwestBackend::new(&config.server.base_url, config.server.request_timeout())?;
        backend.seed_session_cookies(&session.email(), session.credential().as_deref());

        Ok(Self::with_backend(config, session, Arc::new(backend), emitter))
    }

    pub fn with_backend(
        config: Config,
        session: Arc<SessionStore>,
        backend: Arc<dyn HttpBackend>,
        emitter: Emitter,
    ) -> Self {
        let on_restart = {
            let emitter = emitter.clone();
            Arc::new(move || emitter.emit(UiEvent::SessionExpired))
        };
        let gateway = Arc::new(TransportGateway::new(backend, session, on_restart));
        let api = BackendApi::new(gateway);

        let retry = RetryConfig::with_retries(config.sync.max_retries);
        let inbox = Arc::new(InboxSyncEngine::new(api.clone(), emitter.clone(), retry));
        let threads = Arc::new(ThreadSession::new(api.clone(), emitter.clone()));
        let drafts = DraftLifecycle::new(
            threads.clone(),
            api.clone(),
            inbox.clone(),
            emitter.clone(),
        );
        let tone = Mutex::new(Tone::new(config.draft.default_tone.clone()));

        Self {
            config,
            api,
            inbox,
            threads,
            drafts,
            emitter,
            tone,
        }
    }

    fn session(&self) -> &Arc<SessionStore> {
        self.api.gateway().session()
    }

    pub fn tone(&self) -> Tone {
        self.tone.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn set_tone(&self, tone: &str) {
        *self.tone.lock().unwrap_or_else(|e| e.into_inner()) = Tone::new(tone);
        self.emitter.emit(UiEvent::Notice(format!("Tone set to {}", tone)));
    }

    pub fn inbox(&self) -> &Arc<InboxSyncEngine> {
        &self.inbox
    }

    pub fn threads(&self) -> &Arc<ThreadSession> {
        &self.threads
    }

    /// Confirm the stored session with `/auth/me` and adopt the identity
    /// (and refreshed token) it reports.
    pub async fn authenticate(&self) -> Result<String, ClientError> {
        let session = self.session();
        if session.credential().is_none() && session.email().is_empty() {
            return Err(ClientError::NotAuthenticated);
        }

        match self.api.me().await? {
            Reply::Data(me) => {
                if let Some(token) = me.session_token {
                    session.set_credential(token);
                }
                session.set_identity(true, &me.email);
                self.api.gateway().rearm();
                tracing::info!("Signed in as {}", me.email);
                Ok(me.email)
            }
            Reply::Rejected => Err(ClientError::SessionExpired),
        }
    }

    /// Check the persisted session with the backend. When it is valid,
    /// start polling and run the first sync; otherwise send the user to
    /// the login page. Returns whether the client is signed in.
    pub async fn initialize(&self) -> bool {
        match self.authenticate().await {
            Ok(email) => {
                self.emitter.emit(UiEvent::AuthChanged { email: Some(email) });
                self.inbox.start_polling(self.config.sync.poll_interval());
                self.inbox.sync_now().await;
                true
            }
            Err(ClientError::Transport(e)) => {
                tracing::warn!("Auth check failed: {}", e);
                self.emitter
                    .emit(UiEvent::Notice(format!("Could not reach the server: {}", e)));
                self.navigate_to_login();
                false
            }
            Err(e) => {
                tracing::info!("Not signed in: {}", e);
                self.navigate_to_login();
                false
            }
        }
    }

    fn adopt_token(&self, token: &str) {
        self.session().set_credential(token.trim());
        self.api.gateway().rearm();
    }

    /// Adopt a session token obtained from the login page and confirm it.
    pub async fn sign_in_with_token(&self, token: &str) -> Result<String, ClientError> {
        self.adopt_token(token);
        self.authenticate().await
    }

    pub async fn sync(&self) -> SyncReport {
        self.inbox.sync_now().await
    }

    /// Open row `index` (1-based) of the shown inbox list.
    pub async fn open(&self, index: usize) -> Result<(), ClientError> {
        let summary = {
            let snapshot = self.inbox.snapshot();
            snapshot.conversations().get(index.wrapping_sub(1)).cloned()
        };
        let Some(summary) = summary else {
            self.emitter
                .emit(UiEvent::Notice(format!("No conversation #{}", index)));
            return Ok(());
        };
        self.threads.load_thread(&summary, &self.tone()).await?;
        Ok(())
    }

    pub async fn regenerate(&self, tone: Option<&str>) -> Result<(), ClientError> {
        self.threads.check_draft_matches_thread()?;
        if let Some(tone) = tone {
            *self.tone.lock().unwrap_or_else(|e| e.into_inner()) = Tone::new(tone);
        }
        self.drafts.regenerate(&self.tone()).await?;
        Ok(())
    }

    pub fn edit(&self, body: &str) -> Result<(), ClientError> {
        self.threads.check_draft_matches_thread()?;
        self.drafts.edit(body)?;
        Ok(())
    }

    /// Submit the current draft body.
    pub async fn submit(&self, draft_only: bool) -> Result<Ack, ClientError> {
        self.threads.check_draft_matches_thread()?;
        let body = self
            .threads
            .draft()
            .map(|d| d.body)
            .ok_or(ClientError::EmptyDraft)?;
        self.drafts.send_or_save(&body, draft_only).await
    }

    /// Sign out locally even when the server call fails.
    pub async fn logout(&self) {
        match self.api.logout().await {
            Ok(_) => tracing::info!("Signed out"),
            Err(e) => tracing::warn!("Logout request failed: {}", e),
        }

        self.session().clear().await;
        if let Some(handle) = self.inbox.polling_handle() {
            self.inbox.stop_polling(handle);
        }
        self.threads.retire();
        self.inbox.reset();
        self.emitter.emit(UiEvent::AuthChanged { email: None });
        self.navigate_to_login();
    }

    /// Send the user through the login page again, after a session
    /// expiry or an explicit `login`.
    pub fn restart_auth_flow(&self) {
        let url = self.config.server.login_url();
        if let Err(e) = open::that(&url) {
            tracing::warn!("Failed to open browser: {}", e);
        }
        self.navigate_to_login();
    }

    fn navigate_to_login(&self) {
        self.emitter.emit(UiEvent::NavigateToLogin {
            url: self.config.server.login_url(),
        });
    }

    pub fn status(&self) -> String {
        let identity = self.session().identity();
        let account = if identity.is_authenticated {
            identity.user_email
        } else {
            "not signed in".to_string()
        };
        let last_sync = self
            .inbox
            .snapshot()
            .last_synced
            .map(|t| t.format("%H:%M:%S").to_string())
            .unwrap_or_else(|| "never".to_string());
        format!(
            "{} | polling {} | last sync {} | tone {}",
            account,
            if self.inbox.is_polling() { "on" } else { "off" },
            last_sync,
            self.tone()
        )
    }

    /// Stop background work before exit.
    pub fn shutdown(&self) {
        if let Some(handle) = self.inbox.polling_handle() {
            self.inbox.stop_polling(handle);
        }
    }

    /// Run one command. Precondition failures come back as a notice;
    /// failures of network operations already produced their own event.
    pub async fn dispatch(&self, command: ParsedCommand) {
        let result = match command {
            ParsedCommand::Sync => {
                self.sync().await;
                Ok(())
            }
            ParsedCommand::Open(index) => self.open(index).await,
            ParsedCommand::Tone(tone) => {
                self.set_tone(&tone);
                Ok(())
            }
            ParsedCommand::Regen(tone) => self.regenerate(tone.as_deref()).await,
            ParsedCommand::Edit(body) => self.edit(&body),
            ParsedCommand::Send => self.submit(false).await.map(|_| ()),
            ParsedCommand::Save => self.submit(true).await.map(|_| ()),
            ParsedCommand::Logout => {
                self.logout().await;
                Ok(())
            }
            ParsedCommand::Login(Some(token)) => {
                self.adopt_token(&token);
                self.initialize().await;
                Ok(())
            }
            ParsedCommand::Login(None) => {
                self.restart_auth_flow();
                Ok(())
            }
            ParsedCommand::Status => {
                self.emitter.emit(UiEvent::Notice(self.status()));
                Ok(())
            }
            // Handled by the event loop
            ParsedCommand::Help | ParsedCommand::Quit => Ok(()),
        };

        if let Err(e) = result {
            match e {
                ClientError::SessionExpired | ClientError::Superseded => {}
                e if e.is_banner() => {}
                e => self.emitter.emit(UiEvent::Notice(e.to_string())),
            }
        }
    }
}
