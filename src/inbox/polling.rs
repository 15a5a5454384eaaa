//! Repeating inbox refresh with a single-instance guard.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::InboxSyncEngine;

/// Identifies the active polling timer; returned by `start_polling`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollingHandle(u64);

struct ActivePoll {
    handle: PollingHandle,
    interval: Duration,
    cancel: CancellationToken,
}

#[derive(Default)]
pub(super) struct PollingSlot {
    active: Mutex<Option<ActivePoll>>,
    next_id: AtomicU64,
}

impl InboxSyncEngine {
    /// Start the periodic sync, or return the handle of the one already
    /// running. The first tick fires one interval after start.
    pub fn start_polling(self: &Arc<Self>, interval: Duration) -> PollingHandle {
        let mut active = self
            .polling
            .active
            .lock()
            .unwrap_or_else(|e| e.into_inner());

        if let Some(poll) = active.as_ref() {
            if poll.interval != interval {
                tracing::debug!(
                    "Polling already active every {:?}; ignoring {:?}",
                    poll.interval,
                    interval
                );
            }
            return poll.handle;
        }

        let handle = PollingHandle(self.polling.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let cancel = CancellationToken::new();
        tokio::spawn(poll_loop(
            Arc::downgrade(self),
            interval,
            cancel.clone(),
        ));
        tracing::info!("Auto-polling started every {:?}", interval);

        *active = Some(ActivePoll {
            handle,
            interval,
            cancel,
        });
        handle
    }

    /// Cancel the timer identified by `handle`. Returns false if that
    /// timer is no longer the active one.
    pub fn stop_polling(&self, handle: PollingHandle) -> bool {
        let mut active = self
            .polling
            .active
            .lock()
            .unwrap_or_else(|e| e.into_inner());

        match active.take() {
            Some(poll) if poll.handle == handle => {
                poll.cancel.cancel();
                tracing::info!("Auto-polling stopped");
                true
            }
            other => {
                *active = other;
                false
            }
        }
    }

    pub fn polling_handle(&self) -> Option<PollingHandle> {
        self.polling
            .active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|poll| poll.handle)
    }

    pub fn is_polling(&self) -> bool {
        self.polling_handle().is_some()
    }
}

async fn poll_loop(engine: Weak<InboxSyncEngine>, interval: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let Some(engine) = engine.upgrade() else {
            break;
        };
        if !engine.api.gateway().session().is_authenticated() {
            tracing::trace!("Poll tick skipped: not signed in");
            continue;
        }

        tracing::debug!("Poll tick: syncing inbox");
        // A sync that already started runs to completion so the view
        // always gets its terminal update.
        engine.sync_now().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{BackendApi, FETCH_LATEST};
    use crate::events::Emitter;
    use crate::testing::{Harness, json_response};
    use crate::transport::RetryConfig;
    use serde_json::json;

    const INTERVAL: Duration = Duration::from_secs(120);

    fn engine(h: &Harness) -> Arc<InboxSyncEngine> {
        Arc::new(InboxSyncEngine::new(
            BackendApi::new(h.gateway.clone()),
            Emitter::default(),
            RetryConfig::new(0, Duration::from_millis(1), Duration::from_millis(1)),
        ))
    }

    fn serve_status(h: &Harness) {
        h.calls
            .serve(|_| json_response(200, json!({"message": "No new unread emails found."})));
    }

    #[tokio::test(start_paused = true)]
    async fn test_double_start_reuses_timer() {
        let h = Harness::new();
        h.sign_in("me@example.com", "tok");
        serve_status(&h);
        let engine = engine(&h);

        let first = engine.start_polling(INTERVAL);
        let second = engine.start_polling(INTERVAL);
        assert_eq!(first, second);

        tokio::time::sleep(INTERVAL + Duration::from_millis(10)).await;
        assert_eq!(h.request_count(FETCH_LATEST), 1);

        tokio::time::sleep(INTERVAL).await;
        assert_eq!(h.request_count(FETCH_LATEST), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_tick_before_first_interval() {
        let h = Harness::new();
        h.sign_in("me@example.com", "tok");
        serve_status(&h);
        let engine = engine(&h);

        engine.start_polling(INTERVAL);
        tokio::time::sleep(INTERVAL - Duration::from_secs(1)).await;

        assert_eq!(h.request_count(FETCH_LATEST), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_skipped_while_signed_out() {
        let h = Harness::new();
        serve_status(&h);
        let engine = engine(&h);

        engine.start_polling(INTERVAL);
        tokio::time::sleep(INTERVAL * 3 + Duration::from_millis(10)).await;

        assert!(h.requested().is_empty());
        assert!(engine.is_polling());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_polling_cancels_timer() {
        let h = Harness::new();
        h.sign_in("me@example.com", "tok");
        serve_status(&h);
        let engine = engine(&h);

        let handle = engine.start_polling(INTERVAL);
        assert!(engine.stop_polling(handle));
        assert!(!engine.is_polling());
        // Stale handle is a no-op
        assert!(!engine.stop_polling(handle));

        tokio::time::sleep(INTERVAL * 2).await;
        assert!(h.requested().is_empty());

        let restarted = engine.start_polling(INTERVAL);
        assert_ne!(restarted, handle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_wins_over_overdue_tick() {
        let h = Harness::new();
        h.sign_in("me@example.com", "tok");
        let engine = engine(&h);

        let handle = engine.start_polling(INTERVAL);
        tokio::time::sleep(INTERVAL + Duration::from_millis(10)).await;
        let in_flight = h.calls.next().await;
        assert_eq!(in_flight.path(), FETCH_LATEST);

        // The next tick is already due when the in-flight sync returns
        tokio::time::sleep(INTERVAL * 2).await;
        assert!(engine.stop_polling(handle));
        in_flight.respond(json_response(200, json!({"message": "No new unread emails found."})));

        tokio::time::sleep(INTERVAL * 3).await;
        assert_eq!(h.request_count(FETCH_LATEST), 1);
    }
}
