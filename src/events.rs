//! Events emitted by the client components for the rendering layer.
//!
//! Every asynchronous path ends in one terminal event (ready, failed, empty
//! or session expired) so the view never stays on a loading placeholder.

use tokio::sync::mpsc;

use crate::inbox::InboxSnapshot;
use crate::model::{Ack, DraftState, ThreadContext, ThreadId};

#[derive(Debug, Clone)]
pub enum UiEvent {
    /// Signed-in address changed (None = signed out)
    AuthChanged { email: Option<String> },
    InboxSyncing,
    InboxUpdated(InboxSnapshot),
    ThreadLoading { thread_id: ThreadId, subject: String },
    ThreadReady {
        context: ThreadContext,
        draft: Option<DraftState>,
    },
    ThreadFailed { thread_id: ThreadId, error: String },
    /// Back to the empty placeholder view
    ThreadRetired,
    DraftRegenerating { thread_id: ThreadId },
    DraftUpdated(DraftState),
    DraftFailed { error: String },
    DraftSubmitting { draft_only: bool },
    DraftSubmitted(Ack),
    SubmitFailed { error: String },
    /// Inline message for precondition failures
    Notice(String),
    SessionExpired,
    NavigateToLogin { url: String },
}

/// Cloneable sender that tolerates a missing or closed receiver.
#[derive(Debug, Clone, Default)]
pub struct Emitter(Option<mpsc::UnboundedSender<UiEvent>>);

impl Emitter {
    pub fn new(tx: mpsc::UnboundedSender<UiEvent>) -> Self {
        Self(Some(tx))
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<UiEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    pub fn silent() -> Self {
        Self(None)
    }

    pub fn emit(&self, event: UiEvent) {
        if let Some(tx) = &self.0
            && tx.send(event).is_err()
        {
            tracing::trace!("UI event receiver dropped");
        }
    }
}
