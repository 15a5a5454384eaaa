//! Scripted backend for tests: every request is parked until the test
//! answers it, so tests decide the completion order of concurrent calls.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use crate::error::TransportError;
use crate::session::SessionStore;
use crate::transport::{HttpBackend, OutboundRequest, RawResponse, TransportGateway};

type Answer = Result<RawResponse, TransportError>;

pub struct PendingCall {
    pub request: OutboundRequest,
    reply: oneshot::Sender<Answer>,
}

impl PendingCall {
    pub fn path(&self) -> &str {
        &self.request.path
    }

    /// JSON body field, as a string
    pub fn field(&self, name: &str) -> Option<String> {
        let value = self.request.body.as_ref()?.get(name)?;
        Some(match value {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }

    pub fn respond(self, response: RawResponse) {
        let _ = self.reply.send(Ok(response));
    }

    pub fn fail(self, error: TransportError) {
        let _ = self.reply.send(Err(error));
    }
}

pub struct ScriptedBackend {
    tx: mpsc::UnboundedSender<PendingCall>,
    paths: Mutex<Vec<String>>,
}

#[async_trait]
impl HttpBackend for ScriptedBackend {
    async fn execute(&self, request: OutboundRequest) -> Answer {
        self.paths
            .lock()
            .unwrap()
            .push(request.path.clone());
        let (reply, answer) = oneshot::channel();
        self.tx
            .send(PendingCall { request, reply })
            .map_err(|_| TransportError::Network("backend closed".into()))?;
        answer
            .await
            .unwrap_or_else(|_| Err(TransportError::Network("request dropped".into())))
    }
}

/// Test side of the scripted backend
pub struct Calls {
    rx: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<PendingCall>>>,
}

impl Calls {
    pub async fn next(&self) -> PendingCall {
        self.rx
            .lock()
            .await
            .recv()
            .await
            .expect("backend dropped")
    }

    /// Answer every request from now on with `handler`.
    pub fn serve<F>(&self, handler: F)
    where
        F: Fn(&OutboundRequest) -> RawResponse + Send + 'static,
    {
        self.serve_with(move |request| Ok(handler(request)));
    }

    pub fn serve_with<F>(&self, handler: F)
    where
        F: Fn(&OutboundRequest) -> Answer + Send + 'static,
    {
        let rx = Arc::clone(&self.rx);
        tokio::spawn(async move {
            let mut rx = rx.lock().await;
            while let Some(call) = rx.recv().await {
                let answer = handler(&call.request);
                let _ = call.reply.send(answer);
            }
        });
    }
}

pub fn json_response(status: u16, value: serde_json::Value) -> RawResponse {
    RawResponse::new(status, value.to_string())
}

/// Session store + gateway wired to a scripted backend
pub struct Harness {
    pub session: Arc<SessionStore>,
    pub gateway: Arc<TransportGateway>,
    pub backend: Arc<ScriptedBackend>,
    pub calls: Calls,
    restarts: Arc<AtomicUsize>,
}

impl Harness {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let backend = Arc::new(ScriptedBackend {
            tx,
            paths: Mutex::new(Vec::new()),
        });
        let session = Arc::new(SessionStore::ephemeral());
        let restarts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&restarts);
        let gateway = Arc::new(TransportGateway::new(
            backend.clone(),
            Arc::clone(&session),
            Arc::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        ));

        Self {
            session,
            gateway,
            backend,
            calls: Calls {
                rx: Arc::new(tokio::sync::Mutex::new(rx)),
            },
            restarts,
        }
    }

    pub fn sign_in(&self, email: &str, token: &str) {
        self.session.set_credential(token);
        self.session.set_identity(true, email);
    }

    pub fn restart_count(&self) -> usize {
        self.restarts.load(Ordering::SeqCst)
    }

    /// Paths requested so far, in issue order
    pub fn requested(&self) -> Vec<String> {
        self.backend.paths.lock().unwrap().clone()
    }

    pub fn request_count(&self, path: &str) -> usize {
        self.requested().iter().filter(|p| *p == path).count()
    }
}
