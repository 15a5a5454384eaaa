//! Application-wide constants for tuning and wire compatibility
//!
//! Centralizes magic numbers and header names shared with the backend.

/// Inbox auto-refresh period in seconds.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 120;

/// Network retries for an inbox sync before it is reported as failed.
pub const DEFAULT_SYNC_RETRIES: u32 = 2;

/// Initial backoff before the first sync retry, in milliseconds.
pub const SYNC_RETRY_INITIAL_MS: u64 = 500;

/// Backoff cap for sync retries, in seconds.
pub const SYNC_RETRY_MAX_SECS: u64 = 10;

/// Tone used when the user has not picked one.
pub const DEFAULT_TONE: &str = "Professional";

/// Longest draft body the backend accepts.
pub const MAX_DRAFT_LENGTH: usize = 50_000;

/// Request header carrying the bearer session credential.
pub const SESSION_TOKEN_HEADER: &str = "X-Session-Token";

/// Response header on `/auth/me` carrying a fresh session credential.
pub const SESSION_TOKEN_RESPONSE_HEADER: &str = "session_token";

/// Cookie names the backend uses for session continuity.
pub const SESSION_COOKIE: &str = "session_token";
pub const EMAIL_COOKIE: &str = "user_email";

/// Error marker the backend puts in bodies when the OAuth grant is gone.
pub const INVALID_GRANT_MARKER: &str = "invalid_grant";

/// Status text used when a sync returns columns without any rows.
pub const NO_EMAILS_FOUND: &str = "No emails found";

/// Sender shown when the backend omits one.
pub const UNKNOWN_SENDER: &str = "Unknown Sender";

/// Default backend origin.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Column width used when flattening HTML bodies for the terminal.
pub const RENDER_WIDTH: usize = 100;
