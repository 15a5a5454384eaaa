//! Inbox list rendering

use crate::constants::UNKNOWN_SENDER;
use crate::inbox::{InboxSnapshot, SyncOutcome};

use super::truncate;

const SUBJECT_WIDTH: usize = 48;
const SNIPPET_WIDTH: usize = 60;

pub fn render_inbox(snapshot: &InboxSnapshot) -> Vec<String> {
    let mut lines = Vec::new();
    let synced = snapshot
        .last_synced
        .map(|t| format!(" (synced {})", t.format("%H:%M:%S")))
        .unwrap_or_default();
    lines.push(format!("Inbox{}", synced));

    match &snapshot.outcome {
        None => lines.push("  Loading...".to_string()),
        Some(SyncOutcome::Messages(rows)) => {
            for (index, row) in rows.iter().enumerate() {
                let from = if row.from_address.is_empty() {
                    UNKNOWN_SENDER
                } else {
                    row.from_address.as_str()
                };
                lines.push(format!(
                    "{:>3}. {:<30} {}",
                    index + 1,
                    truncate(from, 30),
                    truncate(&row.subject, SUBJECT_WIDTH)
                ));
                if !row.snippet.is_empty() {
                    lines.push(format!("     {}", truncate(&row.snippet, SNIPPET_WIDTH)));
                }
            }
        }
        Some(SyncOutcome::Empty(status)) => lines.push(format!("  {}", status)),
        Some(SyncOutcome::Failed(reason)) => {
            lines.push(format!("  Sync failed: {} ('sync' to retry)", reason))
        }
        Some(SyncOutcome::SessionExpired) => lines.push("  Signed out".to_string()),
    }
    lines
}
