//! HTTP backend seam: the gateway talks to the network only through
//! [`HttpBackend`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::cookie::Jar;
use reqwest::{Client, Url};

use crate::constants::{EMAIL_COOKIE, SESSION_COOKIE, SESSION_TOKEN_HEADER};
use crate::error::TransportError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Get,
    Post,
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verb::Get => f.write_str("GET"),
            Verb::Post => f.write_str("POST"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub verb: Verb,
    pub path: String,
    pub body: Option<serde_json::Value>,
    /// Bearer credential, sent as `X-Session-Token`
    pub session_token: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    /// Header names are lowercase
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait HttpBackend: Send + Sync {
    /// Perform one request. `Err` means no response arrived at all.
    async fn execute(&self, request: OutboundRequest) -> Result<RawResponse, TransportError>;
}

/// reqwest client with a cookie jar for the backend's session cookies
pub struct ReqwestBackend {
    client: Client,
    base: Url,
    jar: Arc<Jar>,
}

impl ReqwestBackend {
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self> {
        let normalized = format!("{}/", base_url.trim_end_matches('/'));
        let base = Url::parse(&normalized)
            .with_context(|| format!("Invalid backend URL: {}", base_url))?;

        let jar = Arc::new(Jar::default());
        let mut builder = Client::builder().cookie_provider(Arc::clone(&jar));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().context("Failed to create HTTP client")?;

        Ok(Self { client, base, jar })
    }

    /// Seed the jar with a persisted session so cookie-based endpoints
    /// recognize us after a restart.
    pub fn seed_session_cookies(&self, email: &str, token: Option<&str>) {
        if !email.is_empty() {
            self.jar
                .add_cookie_str(&format!("{}={}", EMAIL_COOKIE, email), &self.base);
        }
        if let Some(token) = token {
            self.jar
                .add_cookie_str(&format!("{}={}", SESSION_COOKIE, token), &self.base);
        }
    }

    fn url_for(&self, path: &str) -> Result<Url, TransportError> {
        self.base
            .join(path.trim_start_matches('/'))
            .map_err(|e| TransportError::Network(format!("bad path {}: {}", path, e)))
    }
}

#[async_trait]
impl HttpBackend for ReqwestBackend {
    async fn execute(&self, request: OutboundRequest) -> Result<RawResponse, TransportError> {
        let url = self.url_for(&request.path)?;
        let mut builder = match request.verb {
            Verb::Get => self.client.get(url),
            Verb::Post => self.client.post(url),
        };
        if let Some(token) = &request.session_token {
            builder = builder.header(SESSION_TOKEN_HEADER, token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}
