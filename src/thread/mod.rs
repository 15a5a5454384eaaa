//! The selected conversation and its live draft.
//!
//! Selecting a thread bumps the generation; results of older loads (and of
//! draft operations issued against them) are discarded on arrival.

use std::sync::{Mutex, MutexGuard};

use crate::api::BackendApi;
use crate::error::ClientError;
use crate::events::{Emitter, UiEvent};
use crate::model::{ConversationSummary, DraftOrigin, DraftState, ThreadContext, ThreadId, Tone};
use crate::transport::Reply;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionPhase {
    #[default]
    Idle,
    Loading,
    Ready,
    LoadFailed,
    Regenerating,
    RegenerateFailed,
    Sending,
    SendFailed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThreadSnapshot {
    pub generation: u64,
    /// Bumped by every operation that may replace the draft
    pub draft_seq: u64,
    pub phase: SessionPhase,
    pub thread_id: Option<ThreadId>,
    pub subject: String,
    pub recipient: Option<String>,
    pub tone: Tone,
    pub context: Option<ThreadContext>,
    pub draft: Option<DraftState>,
    pub last_error: Option<String>,
}

/// Ticket for a draft operation; valid while the same thread stays loaded
/// and no newer draft operation has started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DraftTicket {
    pub generation: u64,
    pub draft_seq: u64,
    pub thread_id: ThreadId,
}

pub struct ThreadSession {
    api: BackendApi,
    emitter: Emitter,
    slot: Mutex<ThreadSnapshot>,
}

impl ThreadSession {
    pub fn new(api: BackendApi, emitter: Emitter) -> Self {
        Self {
            api,
            emitter,
            slot: Mutex::new(ThreadSnapshot::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ThreadSnapshot> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn snapshot(&self) -> ThreadSnapshot {
        self.lock().clone()
    }

    pub fn current_thread_id(&self) -> Option<ThreadId> {
        self.lock().thread_id.clone()
    }

    #[cfg(test)]
    pub fn recipient(&self) -> Option<String> {
        self.lock().recipient.clone()
    }

    pub fn draft(&self) -> Option<DraftState> {
        self.lock().draft.clone()
    }

    #[cfg(test)]
    pub fn phase(&self) -> SessionPhase {
        self.lock().phase
    }

    /// Select `summary` and fetch its context plus the generated draft.
    ///
    /// Context and draft of the previous selection are dropped immediately;
    /// unsaved edits are not kept across a thread switch.
    pub async fn load_thread(
        &self,
        summary: &ConversationSummary,
        tone: &Tone,
    ) -> Result<ThreadContext, ClientError> {
        let thread_id = summary.thread_id.clone();
        let generation = {
            let mut slot = self.lock();
            if slot.draft.as_ref().is_some_and(|d| d.editable) {
                tracing::debug!("Discarding draft for thread {:?}", slot.thread_id);
            }
            slot.generation += 1;
            slot.draft_seq += 1;
            slot.phase = SessionPhase::Loading;
            slot.thread_id = Some(thread_id.clone());
            slot.subject = summary.subject.clone();
            slot.recipient = Some(summary.from_address.clone()).filter(|r| !r.is_empty());
            slot.tone = tone.clone();
            slot.context = None;
            slot.draft = None;
            slot.last_error = None;
            slot.generation
        };
        self.emitter.emit(UiEvent::ThreadLoading {
            thread_id: thread_id.clone(),
            subject: summary.subject.clone(),
        });

        let email = self.api.gateway().session().email();
        let result = self.api.fetch_thread(&email, &thread_id, tone).await;

        let mut slot = self.lock();
        if slot.generation != generation {
            tracing::debug!("Discarding stale load of thread {}", thread_id);
            return Err(ClientError::Superseded);
        }

        let outcome = match result {
            Ok(Reply::Data(payload)) => {
                let draft = payload.draft.map(|body| DraftState {
                    thread_id: thread_id.clone(),
                    tone: tone.clone(),
                    body,
                    editable: true,
                    origin: DraftOrigin::Generated,
                });
                slot.phase = SessionPhase::Ready;
                if slot.recipient.is_none() {
                    slot.recipient =
                        Some(payload.context.from_address.clone()).filter(|r| !r.trim().is_empty());
                }
                slot.context = Some(payload.context.clone());
                slot.draft = draft.clone();
                Ok((payload.context, draft))
            }
            Ok(Reply::Rejected) => Err(ClientError::SessionExpired),
            Err(e) => Err(ClientError::from(e)),
        };

        match outcome {
            Ok((context, draft)) => {
                drop(slot);
                tracing::info!(
                    "Loaded thread {} ({} messages, draft: {})",
                    thread_id,
                    context.messages.len(),
                    draft.is_some()
                );
                self.emitter.emit(UiEvent::ThreadReady {
                    context: context.clone(),
                    draft,
                });
                Ok(context)
            }
            Err(e) => {
                // Keep the selection so a retry has something to work with
                slot.phase = SessionPhase::LoadFailed;
                slot.last_error = Some(e.to_string());
                drop(slot);
                tracing::warn!("Thread {} failed to load: {}", thread_id, e);
                self.emitter.emit(UiEvent::ThreadFailed {
                    thread_id,
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Forget the selection; in-flight results for it are discarded.
    pub fn retire(&self) {
        clear_selection(&mut self.lock());
        self.emitter.emit(UiEvent::ThreadRetired);
    }

    /// Close out a successful send or save. The thread it was issued against
    /// is retired unless another thread has been selected since, even when a
    /// newer draft operation on it is still in flight.
    pub(crate) fn retire_submitted(&self, ticket: &DraftTicket, submitted: DraftState) -> bool {
        {
            let mut slot = self.lock();
            if slot.generation != ticket.generation {
                return false;
            }
            clear_selection(&mut slot);
        }
        self.emitter.emit(UiEvent::DraftUpdated(submitted));
        self.emitter.emit(UiEvent::ThreadRetired);
        true
    }

    /// Start a draft operation: moves to `phase` and hands out a ticket.
    pub(crate) fn begin_draft_op(&self, phase: SessionPhase) -> Result<DraftTicket, ClientError> {
        let mut slot = self.lock();
        let thread_id = slot.thread_id.clone().ok_or(ClientError::NoThreadSelected)?;
        slot.draft_seq += 1;
        slot.phase = phase;
        slot.last_error = None;
        Ok(DraftTicket {
            generation: slot.generation,
            draft_seq: slot.draft_seq,
            thread_id,
        })
    }

    /// Finish a draft operation. Returns false (and changes nothing) when
    /// the ticket was superseded.
    pub(crate) fn finish_draft_op(
        &self,
        ticket: &DraftTicket,
        phase: SessionPhase,
        draft: Option<DraftState>,
        error: Option<String>,
    ) -> bool {
        let mut slot = self.lock();
        if slot.generation != ticket.generation || slot.draft_seq != ticket.draft_seq {
            return false;
        }
        slot.phase = phase;
        if let Some(draft) = draft {
            slot.tone = draft.tone.clone();
            slot.draft = Some(draft);
        }
        slot.last_error = error;
        true
    }

    /// Replace the body of the editable draft for the active thread.
    pub(crate) fn edit_draft(&self, body: &str) -> Result<DraftState, ClientError> {
        let mut slot = self.lock();
        let active = slot.thread_id.clone().ok_or(ClientError::NoThreadSelected)?;
        let draft = slot.draft.as_mut().ok_or(ClientError::EmptyDraft)?;
        if draft.thread_id != active {
            return Err(ClientError::StaleDraft {
                draft_thread: draft.thread_id.to_string(),
                active_thread: active.to_string(),
            });
        }
        draft.editable = true;
        draft.body = body.to_string();
        Ok(draft.clone())
    }

    /// The draft/thread invariant the controller checks before any draft
    /// operation.
    pub fn check_draft_matches_thread(&self) -> Result<(), ClientError> {
        let slot = self.lock();
        match (&slot.thread_id, &slot.draft) {
            (None, _) => Err(ClientError::NoThreadSelected),
            (Some(active), Some(draft)) if draft.thread_id != *active => {
                Err(ClientError::StaleDraft {
                    draft_thread: draft.thread_id.to_string(),
                    active_thread: active.to_string(),
                })
            }
            _ => Ok(()),
        }
    }
}

fn clear_selection(slot: &mut ThreadSnapshot) {
    *slot = ThreadSnapshot {
        generation: slot.generation + 1,
        draft_seq: slot.draft_seq + 1,
        tone: slot.tone.clone(),
        ..Default::default()
    };
}
