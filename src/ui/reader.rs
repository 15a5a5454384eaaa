//! Thread and draft rendering

use crate::constants::RENDER_WIDTH;
use crate::model::{DraftOrigin, DraftState, ThreadContext, ThreadMessage};

/// Bodies arrive as HTML or plain text; both go through the converter.
fn render_body(body: &str) -> String {
    if body.trim().is_empty() {
        return "No content".to_string();
    }
    html2text::config::plain()
        .string_from_read(body.as_bytes(), RENDER_WIDTH)
        .unwrap_or_else(|e| {
            tracing::debug!("Falling back to raw body: {}", e);
            body.to_string()
        })
        .trim_end()
        .to_string()
}

fn or_unknown(value: &str) -> &str {
    if value.is_empty() { "Unknown" } else { value }
}

fn render_message(message: &ThreadMessage, lines: &mut Vec<String>) {
    lines.push(format!("From: {}", or_unknown(&message.from)));
    lines.push(format!("To:   {}", or_unknown(&message.to)));
    if !message.date.is_empty() {
        lines.push(format!("Date: {}", message.date));
    }
    lines.push(String::new());
    lines.extend(render_body(&message.body).lines().map(|l| format!("  {}", l)));
    lines.push("-".repeat(RENDER_WIDTH.min(40)));
}

pub fn render_thread(context: &ThreadContext) -> Vec<String> {
    let mut lines = vec![format!(
        "Thread {} ({} messages)",
        context.thread_id,
        context.messages.len()
    )];
    for message in &context.messages {
        render_message(message, &mut lines);
    }
    lines
}

pub fn render_draft(draft: &DraftState) -> Vec<String> {
    let label = match draft.origin {
        DraftOrigin::Generated => "Draft",
        DraftOrigin::Regenerated => "Draft (regenerated)",
        DraftOrigin::SentAck => "Sent",
        DraftOrigin::SavedAck => "Saved",
    };
    let mut lines = vec![format!("{} [{}]", label, draft.tone)];
    lines.extend(draft.body.lines().map(|l| format!("  {}", l)));
    if draft.editable {
        lines.push("('edit <text>', 'regen [tone]', 'send' or 'save')".to_string());
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ThreadId, Tone};

    #[test]
    fn test_html_body_is_converted() {
        let text = render_body("<p>Hello <b>there</b></p>");
        assert!(text.contains("Hello"));
        assert!(!text.contains("<p>"));
    }

    #[test]
    fn test_missing_fields_fall_back() {
        let context = ThreadContext {
            thread_id: ThreadId::new("t1"),
            messages: vec![ThreadMessage::default()],
            from_address: String::new(),
            to_address: String::new(),
        };

        let lines = render_thread(&context);

        assert_eq!(lines[0], "Thread t1 (1 messages)");
        assert_eq!(lines[1], "From: Unknown");
        assert_eq!(lines[2], "To:   Unknown");
        assert!(lines.iter().any(|l| l.trim() == "No content"));
    }

    #[test]
    fn test_draft_labels() {
        let mut draft = DraftState {
            thread_id: ThreadId::new("t1"),
            tone: Tone::default(),
            body: "Line one\nLine two".into(),
            editable: true,
            origin: DraftOrigin::Regenerated,
        };
        let lines = render_draft(&draft);
        assert_eq!(lines[0], "Draft (regenerated) [Professional]");
        assert_eq!(lines[2], "  Line two");

        draft.origin = DraftOrigin::SavedAck;
        draft.editable = false;
        let lines = render_draft(&draft);
        assert_eq!(lines[0], "Saved [Professional]");
        assert_eq!(lines.len(), 3);
    }
}
