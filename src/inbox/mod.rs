//! Inbox synchronization: on-demand and periodic fetches of the latest
//! conversation summaries.
//!
//! Each `sync_now` takes a generation number when it is issued. A result is
//! committed only if no newer generation has been committed already, so a
//! slow request can never overwrite a fresher list.

mod polling;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Local};

use crate::api::{BackendApi, LatestMail};
use crate::constants::NO_EMAILS_FOUND;
use crate::error::TransportError;
use crate::events::{Emitter, UiEvent};
use crate::model::ConversationSummary;
use crate::transport::{Reply, RetryConfig, with_retry};

pub use polling::PollingHandle;
use polling::PollingSlot;

/// Result of one inbox sync. `Empty` and `Failed` both show an empty list
/// but must stay distinguishable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Messages(Vec<ConversationSummary>),
    /// Valid response with nothing to list, carrying the server's text
    Empty(String),
    Failed(String),
    SessionExpired,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub generation: u64,
    pub outcome: SyncOutcome,
    /// False when a newer sync had already been committed
    pub committed: bool,
}

/// What the inbox view currently shows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InboxSnapshot {
    pub generation: u64,
    pub outcome: Option<SyncOutcome>,
    pub last_synced: Option<DateTime<Local>>,
}

impl InboxSnapshot {
    pub fn conversations(&self) -> &[ConversationSummary] {
        match &self.outcome {
            Some(SyncOutcome::Messages(rows)) => rows,
            _ => &[],
        }
    }
}

pub struct InboxSyncEngine {
    api: BackendApi,
    emitter: Emitter,
    retry: RetryConfig,
    issued: AtomicU64,
    state: Mutex<InboxSnapshot>,
    polling: PollingSlot,
}

impl InboxSyncEngine {
    pub fn new(api: BackendApi, emitter: Emitter, retry: RetryConfig) -> Self {
        Self {
            api,
            emitter,
            retry,
            issued: AtomicU64::new(0),
            state: Mutex::new(InboxSnapshot::default()),
            polling: PollingSlot::default(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, InboxSnapshot> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn snapshot(&self) -> InboxSnapshot {
        self.lock().clone()
    }

    /// Fetch the latest summaries for the signed-in identity.
    pub async fn sync_now(&self) -> SyncReport {
        let generation = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        self.emitter.emit(UiEvent::InboxSyncing);

        let session = self.api.gateway().session();
        let outcome = if !session.is_authenticated() {
            tracing::debug!("Sync #{} skipped: not signed in", generation);
            SyncOutcome::SessionExpired
        } else {
            let email = session.email();
            let result = with_retry(&self.retry, TransportError::is_retryable, || {
                self.api.fetch_latest(&email)
            })
            .await;
            classify(result)
        };

        self.commit(generation, outcome)
    }

    fn commit(&self, generation: u64, outcome: SyncOutcome) -> SyncReport {
        let snapshot = {
            let mut state = self.lock();
            if generation <= state.generation {
                tracing::debug!(
                    "Discarding sync #{}: #{} already shown",
                    generation,
                    state.generation
                );
                None
            } else {
                state.generation = generation;
                if matches!(outcome, SyncOutcome::Messages(_) | SyncOutcome::Empty(_)) {
                    state.last_synced = Some(Local::now());
                }
                state.outcome = Some(outcome.clone());
                Some(state.clone())
            }
        };

        let committed = snapshot.is_some();
        if let Some(snapshot) = snapshot {
            match &outcome {
                SyncOutcome::Messages(rows) => {
                    tracing::info!("Sync #{}: {} conversations", generation, rows.len())
                }
                SyncOutcome::Empty(status) => tracing::info!("Sync #{}: {}", generation, status),
                SyncOutcome::Failed(reason) => {
                    tracing::warn!("Sync #{} failed: {}", generation, reason)
                }
                SyncOutcome::SessionExpired => {
                    tracing::info!("Sync #{}: session expired", generation)
                }
            }
            self.emitter.emit(UiEvent::InboxUpdated(snapshot));
        }

        SyncReport {
            generation,
            outcome,
            committed,
        }
    }

    /// Drop the shown list, e.g. after logout.
    pub fn reset(&self) {
        let generation = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let snapshot = {
            let mut state = self.lock();
            *state = InboxSnapshot {
                generation,
                ..Default::default()
            };
            state.clone()
        };
        self.emitter.emit(UiEvent::InboxUpdated(snapshot));
    }
}

fn classify(result: Result<Reply<LatestMail>, TransportError>) -> SyncOutcome {
    match result {
        Ok(Reply::Data(LatestMail::Status(status))) => SyncOutcome::Empty(status),
        Ok(Reply::Data(LatestMail::Rows(rows))) if rows.is_empty() => {
            SyncOutcome::Empty(NO_EMAILS_FOUND.to_string())
        }
        Ok(Reply::Data(LatestMail::Rows(rows))) => SyncOutcome::Messages(rows),
        Ok(Reply::Rejected) => SyncOutcome::SessionExpired,
        Err(e) => SyncOutcome::Failed(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::FETCH_LATEST;
    use crate::testing::{Harness, json_response};
    use serde_json::json;
    use std::time::Duration;

    fn engine(h: &Harness) -> Arc<InboxSyncEngine> {
        Arc::new(InboxSyncEngine::new(
            BackendApi::new(h.gateway.clone()),
            Emitter::default(),
            RetryConfig::new(0, Duration::from_millis(1), Duration::from_millis(1)),
        ))
    }

    fn one_row(subject: &str) -> serde_json::Value {
        json!({
            "messages": {
                "subject": [subject],
                "msgId": [format!("m-{}", subject)],
                "threadId": [format!("t-{}", subject)],
                "from": ["alice@example.com"],
                "snippet": ["..."],
                "toEmail": ["me@example.com"]
            }
        })
    }

    #[tokio::test]
    async fn test_sync_posts_signed_in_email() {
        let h = Harness::new();
        h.sign_in("me@example.com", "tok");
        let engine = engine(&h);

        let task = tokio::spawn({
            let engine = engine.clone();
            async move { engine.sync_now().await }
        });
        let call = h.calls.next().await;
        assert_eq!(call.path(), FETCH_LATEST);
        assert_eq!(call.field("email").as_deref(), Some("me@example.com"));
        call.respond(json_response(200, one_row("Lunch")));

        let report = task.await.unwrap();
        assert!(report.committed);
        let SyncOutcome::Messages(rows) = report.outcome else {
            panic!("expected messages");
        };
        assert_eq!(rows[0].subject, "Lunch");
        assert_eq!(engine.snapshot().conversations().len(), 1);
        assert!(engine.snapshot().last_synced.is_some());
    }

    #[tokio::test]
    async fn test_slow_older_sync_does_not_clobber_newer_result() {
        let h = Harness::new();
        h.sign_in("me@example.com", "tok");
        let engine = engine(&h);

        let slow = tokio::spawn({
            let engine = engine.clone();
            async move { engine.sync_now().await }
        });
        let slow_call = h.calls.next().await;

        let fast = tokio::spawn({
            let engine = engine.clone();
            async move { engine.sync_now().await }
        });
        let fast_call = h.calls.next().await;

        // Newer request completes first, older one lands afterwards
        fast_call.respond(json_response(200, one_row("Fresh")));
        let fast_report = fast.await.unwrap();
        slow_call.respond(json_response(200, one_row("Stale")));
        let slow_report = slow.await.unwrap();

        assert!(fast_report.committed);
        assert!(!slow_report.committed);
        let snapshot = engine.snapshot();
        assert_eq!(snapshot.generation, fast_report.generation);
        assert_eq!(snapshot.conversations()[0].subject, "Fresh");
    }

    #[tokio::test]
    async fn test_in_order_completion_keeps_latest() {
        let h = Harness::new();
        h.sign_in("me@example.com", "tok");
        let engine = engine(&h);

        let first = tokio::spawn({
            let engine = engine.clone();
            async move { engine.sync_now().await }
        });
        let first_call = h.calls.next().await;
        let second = tokio::spawn({
            let engine = engine.clone();
            async move { engine.sync_now().await }
        });
        let second_call = h.calls.next().await;

        first_call.respond(json_response(200, one_row("One")));
        assert!(first.await.unwrap().committed);
        second_call.respond(json_response(200, one_row("Two")));
        assert!(second.await.unwrap().committed);

        assert_eq!(engine.snapshot().conversations()[0].subject, "Two");
    }

    #[tokio::test]
    async fn test_status_message_is_empty_not_failure() {
        let h = Harness::new();
        h.sign_in("me@example.com", "tok");
        h.calls
            .serve(|_| json_response(200, json!({"message": "No new unread emails found."})));
        let engine = engine(&h);

        let report = engine.sync_now().await;

        assert_eq!(
            report.outcome,
            SyncOutcome::Empty("No new unread emails found.".into())
        );
        assert!(engine.snapshot().conversations().is_empty());
    }

    #[tokio::test]
    async fn test_transport_failure_is_failed_variant() {
        let h = Harness::new();
        h.sign_in("me@example.com", "tok");
        h.calls
            .serve_with(|_| Err(TransportError::Network("connection reset".into())));
        let engine = engine(&h);

        let report = engine.sync_now().await;

        assert!(matches!(report.outcome, SyncOutcome::Failed(_)));
        assert_ne!(
            report.outcome,
            SyncOutcome::Empty(NO_EMAILS_FOUND.to_string())
        );
        assert!(engine.snapshot().last_synced.is_none());
    }

    #[tokio::test]
    async fn test_network_failure_is_retried() {
        let h = Harness::new();
        h.sign_in("me@example.com", "tok");
        let engine = Arc::new(InboxSyncEngine::new(
            BackendApi::new(h.gateway.clone()),
            Emitter::default(),
            RetryConfig::new(1, Duration::from_millis(1), Duration::from_millis(1)),
        ));

        let task = tokio::spawn({
            let engine = engine.clone();
            async move { engine.sync_now().await }
        });
        h.calls
            .next()
            .await
            .fail(TransportError::Network("timeout".into()));
        h.calls
            .next()
            .await
            .respond(json_response(200, one_row("Retried")));

        let report = task.await.unwrap();
        assert!(matches!(report.outcome, SyncOutcome::Messages(_)));
        assert_eq!(h.request_count(FETCH_LATEST), 2);
    }

    #[tokio::test]
    async fn test_zero_rows_is_no_emails_found() {
        let h = Harness::new();
        h.sign_in("me@example.com", "tok");
        h.calls.serve(|_| json_response(200, json!({"messages": {"msgId": []}})));
        let engine = engine(&h);

        let report = engine.sync_now().await;
        assert_eq!(report.outcome, SyncOutcome::Empty(NO_EMAILS_FOUND.into()));
    }

    #[tokio::test]
    async fn test_401_yields_session_expired() {
        let h = Harness::new();
        h.sign_in("me@example.com", "tok");
        h.calls.serve(|_| json_response(401, json!({})));
        let engine = engine(&h);

        let report = engine.sync_now().await;

        assert_eq!(report.outcome, SyncOutcome::SessionExpired);
        assert_eq!(h.restart_count(), 1);
    }

    #[tokio::test]
    async fn test_signed_out_sync_issues_no_request() {
        let h = Harness::new();
        let engine = engine(&h);

        let report = engine.sync_now().await;

        assert_eq!(report.outcome, SyncOutcome::SessionExpired);
        assert!(h.requested().is_empty());
    }

    #[tokio::test]
    async fn test_emits_syncing_then_updated() {
        let h = Harness::new();
        h.sign_in("me@example.com", "tok");
        h.calls.serve(|_| json_response(200, one_row("Hi")));
        let (emitter, mut rx) = Emitter::channel();
        let engine = InboxSyncEngine::new(
            BackendApi::new(h.gateway.clone()),
            emitter,
            RetryConfig::new(0, Duration::from_millis(1), Duration::from_millis(1)),
        );

        engine.sync_now().await;

        assert!(matches!(rx.recv().await, Some(UiEvent::InboxSyncing)));
        assert!(matches!(rx.recv().await, Some(UiEvent::InboxUpdated(s)) if s.conversations().len() == 1));
    }
}
