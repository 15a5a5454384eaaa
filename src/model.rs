use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_TONE;

/// Who the client is signed in as.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    pub is_authenticated: bool,
    pub user_email: String,
    pub session_credential: Option<String>,
}

/// Server-side conversation identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThreadId(pub String);

impl ThreadId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Style parameter for draft generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tone(pub String);

impl Tone {
    pub fn new(tone: impl Into<String>) -> Self {
        Self(tone.into())
    }

}

impl Default for Tone {
    fn default() -> Self {
        Self(DEFAULT_TONE.to_string())
    }
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One row of an inbox sync, in server order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationSummary {
    pub message_id: String,
    pub thread_id: ThreadId,
    pub subject: String,
    pub from_address: String,
    pub snippet: String,
    pub to_address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ThreadMessage {
    pub from: String,
    pub to: String,
    pub date: String,
    pub body: String,
}

/// Full context of the selected conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadContext {
    pub thread_id: ThreadId,
    pub messages: Vec<ThreadMessage>,
    pub from_address: String,
    pub to_address: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftOrigin {
    Generated,
    Regenerated,
    SentAck,
    SavedAck,
}

/// The single live draft, tied to the selected thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftState {
    pub thread_id: ThreadId,
    pub tone: Tone,
    pub body: String,
    pub editable: bool,
    pub origin: DraftOrigin,
}

/// Backend acknowledgment of a submitted draft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ack {
    Sent { message_id: String },
    Saved { draft_id: String },
}

impl Ack {
    pub fn origin(&self) -> DraftOrigin {
        match self {
            Ack::Sent { .. } => DraftOrigin::SentAck,
            Ack::Saved { .. } => DraftOrigin::SavedAck,
        }
    }
}
