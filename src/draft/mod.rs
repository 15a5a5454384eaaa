//! Regenerate, edit and submit the draft of the selected thread.

use std::sync::Arc;

use crate::api::{BackendApi, SendRequest};
use crate::constants::MAX_DRAFT_LENGTH;
use crate::error::{ClientError, TransportError};
use crate::events::{Emitter, UiEvent};
use crate::inbox::InboxSyncEngine;
use crate::model::{Ack, DraftOrigin, DraftState, Tone};
use crate::thread::{SessionPhase, ThreadSession};
use crate::transport::Reply;

pub struct DraftLifecycle {
    threads: Arc<ThreadSession>,
    api: BackendApi,
    inbox: Arc<InboxSyncEngine>,
    emitter: Emitter,
}

impl DraftLifecycle {
    pub fn new(
        threads: Arc<ThreadSession>,
        api: BackendApi,
        inbox: Arc<InboxSyncEngine>,
        emitter: Emitter,
    ) -> Self {
        Self {
            threads,
            api,
            inbox,
            emitter,
        }
    }

    /// Ask the backend for a fresh draft in `tone`. On any failure the
    /// current draft stays as it was.
    pub async fn regenerate(&self, tone: &Tone) -> Result<DraftState, ClientError> {
        let ticket = self.threads.begin_draft_op(SessionPhase::Regenerating)?;
        self.emitter.emit(UiEvent::DraftRegenerating {
            thread_id: ticket.thread_id.clone(),
        });

        let result = match self.api.regenerate_draft(tone, &ticket.thread_id).await {
            Ok(Reply::Data(Some(body))) => Ok(DraftState {
                thread_id: ticket.thread_id.clone(),
                tone: tone.clone(),
                body,
                editable: true,
                origin: DraftOrigin::Regenerated,
            }),
            Ok(Reply::Data(None)) => Err(ClientError::Transport(TransportError::Decode(
                "response carried no draft".into(),
            ))),
            Ok(Reply::Rejected) => Err(ClientError::SessionExpired),
            Err(e) => Err(e.into()),
        };

        match result {
            Ok(draft) => {
                if !self.threads.finish_draft_op(
                    &ticket,
                    SessionPhase::Ready,
                    Some(draft.clone()),
                    None,
                ) {
                    tracing::debug!("Discarding stale draft for thread {}", ticket.thread_id);
                    return Err(ClientError::Superseded);
                }
                tracing::info!("Regenerated draft for thread {} ({})", ticket.thread_id, tone);
                self.emitter.emit(UiEvent::DraftUpdated(draft.clone()));
                Ok(draft)
            }
            Err(e) => {
                if !self.threads.finish_draft_op(
                    &ticket,
                    SessionPhase::RegenerateFailed,
                    None,
                    Some(e.to_string()),
                ) {
                    return Err(ClientError::Superseded);
                }
                tracing::warn!("Regenerate failed for thread {}: {}", ticket.thread_id, e);
                self.emitter.emit(UiEvent::DraftFailed {
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    pub fn edit(&self, body: &str) -> Result<DraftState, ClientError> {
        let draft = self.threads.edit_draft(body)?;
        self.emitter.emit(UiEvent::DraftUpdated(draft.clone()));
        Ok(draft)
    }

    /// Send `body` to the thread's sender, or save it as a server-side
    /// draft when `draft_only` is set. Success retires the thread and runs
    /// exactly one inbox resync.
    pub async fn send_or_save(&self, body: &str, draft_only: bool) -> Result<Ack, ClientError> {
        let snapshot = self.threads.snapshot();
        let thread_id = snapshot.thread_id.ok_or(ClientError::NoThreadSelected)?;
        let recipient = snapshot.recipient.ok_or(ClientError::NoRecipientResolved)?;
        if body.trim().is_empty() {
            return Err(ClientError::EmptyDraft);
        }
        let len = body.chars().count();
        if len > MAX_DRAFT_LENGTH {
            return Err(ClientError::DraftTooLong {
                len,
                max: MAX_DRAFT_LENGTH,
            });
        }

        let ticket = self.threads.begin_draft_op(SessionPhase::Sending)?;
        if ticket.thread_id != thread_id {
            return Err(ClientError::Superseded);
        }
        self.emitter.emit(UiEvent::DraftSubmitting { draft_only });

        let email = self.api.gateway().session().email();
        let result = match self
            .api
            .send_draft(SendRequest {
                email: &email,
                thread_id: &thread_id,
                draft_body: body,
                draft_only,
                to_email: &recipient,
            })
            .await
        {
            Ok(Reply::Data(receipt)) => receipt.into_ack(draft_only),
            Ok(Reply::Rejected) => Err(ClientError::SessionExpired),
            Err(e) => Err(e.into()),
        };

        let ack = match result {
            Ok(ack) => ack,
            Err(e) => {
                let current = self.threads.finish_draft_op(
                    &ticket,
                    SessionPhase::SendFailed,
                    None,
                    Some(e.to_string()),
                );
                tracing::warn!(
                    "{} failed for thread {}: {}",
                    if draft_only { "Save" } else { "Send" },
                    thread_id,
                    e
                );
                if current {
                    self.emitter.emit(UiEvent::SubmitFailed {
                        error: e.to_string(),
                    });
                }
                return Err(e);
            }
        };

        match &ack {
            Ack::Sent { message_id } => {
                tracing::info!("Sent reply on thread {} as {}", thread_id, message_id)
            }
            Ack::Saved { draft_id } => {
                tracing::info!("Saved draft on thread {} as {}", thread_id, draft_id)
            }
        }

        let submitted = DraftState {
            thread_id: thread_id.clone(),
            tone: snapshot.tone,
            body: body.to_string(),
            editable: false,
            origin: ack.origin(),
        };
        if !self.threads.retire_submitted(&ticket, submitted) {
            tracing::debug!("Thread {} no longer selected after submit", thread_id);
        }
        self.emitter.emit(UiEvent::DraftSubmitted(ack.clone()));

        self.inbox.sync_now().await;
        Ok(ack)
    }
}
