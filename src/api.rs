//! Typed wrappers for the backend endpoints.
//!
//! Wire structs mirror the JSON the backend produces; each call converts them
//! into model types so no component has to inspect response shapes.

use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::constants::SESSION_TOKEN_RESPONSE_HEADER;
use crate::error::{ClientError, TransportError};
use crate::model::{Ack, ConversationSummary, ThreadContext, ThreadId, ThreadMessage, Tone};
use crate::transport::{Reply, TransportGateway, Verb};

pub const AUTH_ME: &str = "/auth/me";
pub const AUTH_LOGOUT: &str = "/auth/logout";
pub const FETCH_LATEST: &str = "/email/fetch_latest";
pub const DRAFT: &str = "/email/draft";
pub const REGENERATE_DRAFT: &str = "/email/regenerate_draft";
pub const SEND: &str = "/email/send";

/// `/auth/me`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Me {
    pub email: String,
    pub session_token: Option<String>,
}

#[derive(Deserialize)]
struct MeResponse {
    email: String,
}

/// `/email/fetch_latest` after decoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LatestMail {
    Rows(Vec<ConversationSummary>),
    /// Human-readable status in place of a list
    Status(String),
}

#[derive(Deserialize)]
struct FetchLatestResponse {
    #[serde(default)]
    message: Option<serde_json::Value>,
    #[serde(default, alias = "message_ids")]
    messages: Option<MessageColumns>,
}

/// Column-oriented message list: index `i` of every array is one row
#[derive(Deserialize, Default)]
struct MessageColumns {
    #[serde(default)]
    subject: Option<Vec<Option<String>>>,
    #[serde(default, rename = "msgId")]
    msg_id: Vec<Option<String>>,
    #[serde(default, rename = "threadId")]
    thread_id: Vec<Option<String>>,
    #[serde(default)]
    from: Vec<Option<String>>,
    #[serde(default)]
    snippet: Vec<Option<String>>,
    #[serde(default, rename = "toEmail")]
    to_email: Vec<Option<String>>,
}

fn column(values: &[Option<String>], index: usize) -> Option<String> {
    values
        .get(index)
        .cloned()
        .flatten()
        .filter(|v| !v.is_empty())
}

impl FetchLatestResponse {
    fn into_latest(self) -> Result<LatestMail, TransportError> {
        if let Some(status) = self.message.as_ref().and_then(|m| m.as_str()) {
            return Ok(LatestMail::Status(status.to_string()));
        }

        let columns = self
            .messages
            .ok_or_else(|| TransportError::Decode("response carried no message list".into()))?;
        let Some(subjects) = columns.subject.as_deref() else {
            return Ok(LatestMail::Rows(Vec::new()));
        };

        let mut rows = Vec::with_capacity(columns.msg_id.len());
        for (index, msg_id) in columns.msg_id.iter().enumerate() {
            let (Some(message_id), Some(thread_id)) =
                (msg_id.clone(), column(&columns.thread_id, index))
            else {
                tracing::warn!("Skipping inbox row {} without message or thread id", index);
                continue;
            };
            rows.push(ConversationSummary {
                message_id,
                thread_id: ThreadId(thread_id),
                subject: column(subjects, index).unwrap_or_default(),
                from_address: column(&columns.from, index).unwrap_or_default(),
                snippet: column(&columns.snippet, index).unwrap_or_default(),
                to_address: column(&columns.to_email, index),
            });
        }
        Ok(LatestMail::Rows(rows))
    }
}

/// `/email/draft` after decoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadPayload {
    pub context: ThreadContext,
    /// Inline draft, absent when the backend produced none
    pub draft: Option<String>,
}

#[derive(Deserialize)]
struct DraftResponse {
    #[serde(default)]
    draft: Option<String>,
    #[serde(default)]
    thread_context: Option<ThreadContextWire>,
    #[serde(default)]
    from_email: Option<String>,
    #[serde(default)]
    to_email: Option<String>,
}

#[derive(Deserialize, Default)]
struct ThreadContextWire {
    #[serde(default)]
    llm_context: Vec<MessageWire>,
    #[serde(default)]
    from_email: Option<String>,
    #[serde(default)]
    to_email: Option<String>,
}

#[derive(Deserialize)]
struct MessageWire {
    #[serde(default)]
    from: Option<String>,
    #[serde(default)]
    to: Option<String>,
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    body: Option<String>,
}

impl DraftResponse {
    fn into_payload(self, thread_id: ThreadId) -> ThreadPayload {
        let wire = self.thread_context.unwrap_or_default();
        let messages = wire
            .llm_context
            .into_iter()
            .map(|m| ThreadMessage {
                from: m.from.unwrap_or_default(),
                to: m.to.unwrap_or_default(),
                date: m.date.unwrap_or_default(),
                body: m.body.unwrap_or_default(),
            })
            .collect();

        ThreadPayload {
            context: ThreadContext {
                thread_id,
                messages,
                from_address: wire.from_email.or(self.from_email).unwrap_or_default(),
                to_address: wire.to_email.or(self.to_email).unwrap_or_default(),
            },
            draft: non_empty(self.draft),
        }
    }
}

#[derive(Deserialize)]
struct RegenerateResponse {
    #[serde(default)]
    draft: Option<String>,
}

/// Body of `/email/send`
#[derive(Debug, Clone)]
pub struct SendRequest<'a> {
    pub email: &'a str,
    pub thread_id: &'a ThreadId,
    pub draft_body: &'a str,
    pub draft_only: bool,
    pub to_email: &'a str,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct SendReceipt {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub draft_id: Option<String>,
}

impl SendReceipt {
    /// A send must come back with a message id and a save with a draft id;
    /// anything else is not an acknowledgment of what was asked.
    pub fn into_ack(self, draft_only: bool) -> Result<Ack, ClientError> {
        match (draft_only, self.message_id, self.draft_id) {
            (false, Some(message_id), None) => Ok(Ack::Sent { message_id }),
            (true, None, Some(draft_id)) => Ok(Ack::Saved { draft_id }),
            (_, message_id, draft_id) => Err(ClientError::UnexpectedAck(format!(
                "draft_only={} message_id={:?} draft_id={:?}",
                draft_only, message_id, draft_id
            ))),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Endpoint client; every call goes through the gateway.
#[derive(Clone)]
pub struct BackendApi {
    gateway: Arc<TransportGateway>,
}

impl BackendApi {
    pub fn new(gateway: Arc<TransportGateway>) -> Self {
        Self { gateway }
    }

    pub fn gateway(&self) -> &Arc<TransportGateway> {
        &self.gateway
    }

    pub async fn me(&self) -> Result<Reply<Me>, TransportError> {
        let response = match self.gateway.send(Verb::Get, AUTH_ME, None).await? {
            Reply::Data(response) => response,
            Reply::Rejected => return Ok(Reply::Rejected),
        };
        let me: MeResponse = serde_json::from_str(&response.body)
            .map_err(|e| TransportError::Decode(format!("{}: {}", AUTH_ME, e)))?;
        Ok(Reply::Data(Me {
            email: me.email,
            session_token: response
                .header(SESSION_TOKEN_RESPONSE_HEADER)
                .map(str::to_string),
        }))
    }

    pub async fn logout(&self) -> Result<Reply<()>, TransportError> {
        Ok(match self.gateway.send(Verb::Post, AUTH_LOGOUT, None).await? {
            Reply::Data(_) => Reply::Data(()),
            Reply::Rejected => Reply::Rejected,
        })
    }

    pub async fn fetch_latest(&self, email: &str) -> Result<Reply<LatestMail>, TransportError> {
        let body = json!({ "email": email });
        match self
            .gateway
            .send_json::<FetchLatestResponse>(Verb::Post, FETCH_LATEST, Some(body))
            .await?
        {
            Reply::Data(response) => response.into_latest().map(Reply::Data),
            Reply::Rejected => Ok(Reply::Rejected),
        }
    }

    pub async fn fetch_thread(
        &self,
        email: &str,
        thread_id: &ThreadId,
        tone: &Tone,
    ) -> Result<Reply<ThreadPayload>, TransportError> {
        let body = json!({ "threadId": thread_id, "tone": tone, "email": email });
        Ok(
            match self
                .gateway
                .send_json::<DraftResponse>(Verb::Post, DRAFT, Some(body))
                .await?
            {
                Reply::Data(response) => Reply::Data(response.into_payload(thread_id.clone())),
                Reply::Rejected => Reply::Rejected,
            },
        )
    }

    pub async fn regenerate_draft(
        &self,
        tone: &Tone,
        thread_id: &ThreadId,
    ) -> Result<Reply<Option<String>>, TransportError> {
        let body = json!({ "user_style": tone, "thread_id": thread_id });
        Ok(
            match self
                .gateway
                .send_json::<RegenerateResponse>(Verb::Post, REGENERATE_DRAFT, Some(body))
                .await?
            {
                Reply::Data(response) => Reply::Data(non_empty(response.draft)),
                Reply::Rejected => Reply::Rejected,
            },
        )
    }

    pub async fn send_draft(
        &self,
        request: SendRequest<'_>,
    ) -> Result<Reply<SendReceipt>, TransportError> {
        let body = json!({
            "email": request.email,
            "thread_id": request.thread_id,
            "draft_body": request.draft_body,
            "draft_only": request.draft_only,
            "toEmail": request.to_email,
        });
        self.gateway
            .send_json::<SendReceipt>(Verb::Post, SEND, Some(body))
            .await
    }
}
