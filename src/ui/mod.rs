//! Line-oriented terminal renderer driven by [`UiEvent`]s.

mod inbox;
mod reader;

use std::io::{self, Write};

use crate::app::CommandHelp;
use crate::events::UiEvent;
use crate::model::Ack;

pub use inbox::render_inbox;
pub use reader::{render_draft, render_thread};

/// Cut `text` to `max` characters, marking the cut with an ellipsis.
pub(crate) fn truncate(text: &str, max: usize) -> String {
    let line = text.lines().next().unwrap_or_default();
    if line.chars().count() <= max && line.len() == text.len() {
        return line.to_string();
    }
    let cut: String = line.chars().take(max.saturating_sub(1)).collect();
    format!("{}…", cut)
}

pub struct TerminalView<W: Write> {
    out: W,
}

impl TerminalView<io::Stdout> {
    pub fn stdout() -> Self {
        Self { out: io::stdout() }
    }
}

impl<W: Write> TerminalView<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }

    fn lines(&mut self, lines: &[String]) -> io::Result<()> {
        for line in lines {
            writeln!(self.out, "{}", line)?;
        }
        self.out.flush()
    }

    fn line(&mut self, line: impl AsRef<str>) -> io::Result<()> {
        writeln!(self.out, "{}", line.as_ref())?;
        self.out.flush()
    }

    pub fn prompt(&mut self) -> io::Result<()> {
        write!(self.out, "> ")?;
        self.out.flush()
    }

    pub fn show_help(&mut self, commands: &[CommandHelp]) -> io::Result<()> {
        self.line("Commands:")?;
        for command in commands {
            writeln!(self.out, "  {:<16} {}", command.name, command.description)?;
        }
        self.out.flush()
    }

    pub fn render(&mut self, event: &UiEvent) -> io::Result<()> {
        match event {
            UiEvent::AuthChanged { email: Some(email) } => {
                self.line(format!("Signed in as {}", email))
            }
            UiEvent::AuthChanged { email: None } => self.line("Signed out"),
            UiEvent::InboxSyncing => Ok(()),
            UiEvent::InboxUpdated(snapshot) => self.lines(&render_inbox(snapshot)),
            UiEvent::ThreadLoading { subject, .. } => {
                self.line(format!("Opening \"{}\"...", subject))
            }
            UiEvent::ThreadReady { context, draft } => {
                self.lines(&render_thread(context))?;
                match draft {
                    Some(draft) => self.lines(&render_draft(draft)),
                    None => self.line("No draft was generated ('regen' to try again)"),
                }
            }
            UiEvent::ThreadFailed { thread_id, error } => self.line(format!(
                "Could not load thread {}: {} ('open' it again to retry)",
                thread_id, error
            )),
            UiEvent::ThreadRetired => Ok(()),
            UiEvent::DraftRegenerating { .. } => self.line("Regenerating draft..."),
            UiEvent::DraftUpdated(draft) => self.lines(&render_draft(draft)),
            UiEvent::DraftFailed { error } => {
                self.line(format!("Draft not updated: {}", error))
            }
            UiEvent::DraftSubmitting { draft_only } => {
                self.line(if *draft_only { "Saving..." } else { "Sending..." })
            }
            UiEvent::DraftSubmitted(Ack::Sent { .. }) => self.line("Email sent"),
            UiEvent::DraftSubmitted(Ack::Saved { .. }) => self.line("Draft saved"),
            UiEvent::SubmitFailed { error } => {
                self.line(format!("Not sent: {} (draft kept)", error))
            }
            UiEvent::Notice(text) => self.line(text),
            UiEvent::SessionExpired => {
                self.line("Your session has expired. Type 'login' to sign in again.")
            }
            UiEvent::NavigateToLogin { url } => self.line(format!(
                "Sign in at {} and then run 'login <token>' (or 'draftly login').",
                url
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inbox::{InboxSnapshot, SyncOutcome};

    fn rendered(events: &[UiEvent]) -> String {
        let mut view = TerminalView::new(Vec::new());
        for event in events {
            view.render(event).unwrap();
        }
        String::from_utf8(view.into_inner()).unwrap()
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghij", 5), "abcd…");
        assert_eq!(truncate("first\nsecond", 20), "first…");
    }

    #[test]
    fn test_session_expired_prompt() {
        let out = rendered(&[UiEvent::SessionExpired]);
        assert!(out.contains("session has expired"));
    }

    #[test]
    fn test_acks_render_distinctly() {
        let out = rendered(&[
            UiEvent::DraftSubmitted(Ack::Sent {
                message_id: "m".into(),
            }),
            UiEvent::DraftSubmitted(Ack::Saved {
                draft_id: "d".into(),
            }),
        ]);
        assert_eq!(out, "Email sent\nDraft saved\n");
    }

    #[test]
    fn test_inbox_update() {
        let out = rendered(&[UiEvent::InboxUpdated(InboxSnapshot {
            generation: 1,
            outcome: Some(SyncOutcome::Empty("No emails found".into())),
            last_synced: None,
        })]);
        assert_eq!(out, "Inbox\n  No emails found\n");
    }
}
