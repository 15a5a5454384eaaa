//! Error taxonomy shared by the client components

use thiserror::Error;

/// Failures below the session layer: no usable response came back.
///
/// Session expiry is never reported through this type; the gateway absorbs
/// it and answers `Reply::Rejected` instead.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(String),

    #[error("server returned {status}: {detail}")]
    Status { status: u16, detail: String },

    #[error("could not decode response: {0}")]
    Decode(String),
}

impl TransportError {
    /// Only connection-level failures are worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TransportError::Network(_))
    }
}

/// Errors surfaced by the inbox, thread and draft components.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClientError {
    /// The session was invalidated; the re-auth prompt is already showing.
    #[error("session expired")]
    SessionExpired,

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("select an email first")]
    NoThreadSelected,

    #[error("no recipient address for this thread")]
    NoRecipientResolved,

    /// The draft belongs to a thread that is no longer selected.
    #[error("draft for thread {draft_thread} does not match selected thread {active_thread}")]
    StaleDraft {
        draft_thread: String,
        active_thread: String,
    },

    /// A newer operation replaced this one before it completed.
    #[error("result superseded by a newer request")]
    Superseded,

    #[error("draft is empty")]
    EmptyDraft,

    #[error("draft too long ({len} characters, maximum {max})")]
    DraftTooLong { len: usize, max: usize },

    #[error("unexpected acknowledgment: {0}")]
    UnexpectedAck(String),

    #[error("not signed in")]
    NotAuthenticated,
}

impl ClientError {
    /// Whether the error should show as a retryable banner rather than
    /// an inline validation message.
    pub fn is_banner(&self) -> bool {
        matches!(
            self,
            ClientError::Transport(_) | ClientError::UnexpectedAck(_)
        )
    }
}
