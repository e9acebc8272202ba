use crate::types::{Message, MessageRole};

/// Literal delimiter the summarization prompt asks the agent to emit between
/// its short and full summary.
pub const SUMMARY_DELIMITER: &str = "---FULL---";
const MAX_MESSAGE_CHARS: usize = 2000;
const MAX_SHORT_CHARS: usize = 200;
const FALLBACK_SHORT_CHARS: usize = 150;

/// The prompt sent to a fresh, isolated agent session to produce a summary.
pub fn summarize_prompt(transcript: &str) -> String {
    format!(
        "Summarize the conversation below.\n\
         Respond with a short summary (at most 150 characters), then a line \
         containing exactly `{SUMMARY_DELIMITER}`, then a full summary.\n\n\
         {transcript}"
    )
}

/// Render messages as a `User: …` / `Assistant: …` transcript, truncating any
/// single message body over 2000 chars.
pub fn format_transcript(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| {
            let role = match m.role {
                MessageRole::User => "User",
                MessageRole::Assistant => "Assistant",
            };
            let content = if m.content.chars().count() > MAX_MESSAGE_CHARS {
                let clipped: String = m.content.chars().take(MAX_MESSAGE_CHARS).collect();
                format!("{clipped} [truncated]")
            } else {
                m.content.clone()
            };
            format!("{role}: {content}")
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Split raw agent output into `(short, full)`. Falls back to deriving a
/// short summary from the full text when the delimiter is missing.
pub fn parse_summary(raw: &str) -> (String, String) {
    if let Some(pos) = raw.find(SUMMARY_DELIMITER) {
        let short = raw[..pos].trim();
        let full = raw[pos + SUMMARY_DELIMITER.len()..].trim();
        (truncate_with_ellipsis(short, MAX_SHORT_CHARS), full.to_string())
    } else {
        let full = raw.trim().to_string();
        let short = clip_at_word_boundary(&full, FALLBACK_SHORT_CHARS);
        (short, full)
    }
}

fn truncate_with_ellipsis(s: &str, limit: usize) -> String {
    if s.chars().count() <= limit {
        return s.to_string();
    }
    let clipped: String = s.chars().take(limit.saturating_sub(3)).collect();
    format!("{clipped}...")
}

fn clip_at_word_boundary(s: &str, limit: usize) -> String {
    if s.chars().count() <= limit {
        return s.to_string();
    }
    let clipped: String = s.chars().take(limit).collect();
    let trimmed = match clipped.rfind(' ') {
        Some(idx) => &clipped[..idx],
        None => &clipped,
    };
    format!("{trimmed}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_summary_splits_on_delimiter() {
        let raw = "Short bit\n---FULL---\nThe complete story.";
        let (short, full) = parse_summary(raw);
        assert_eq!(short, "Short bit");
        assert_eq!(full, "The complete story.");
    }

    #[test]
    fn parse_summary_without_delimiter_derives_short() {
        let raw = "a ".repeat(120);
        let (short, full) = parse_summary(raw.trim());
        assert!(short.ends_with("..."));
        assert_eq!(full, raw.trim());
    }

    #[test]
    fn parse_summary_truncates_overlong_short() {
        let long_short = "x".repeat(250);
        let raw = format!("{long_short}\n---FULL---\nfull text");
        let (short, _) = parse_summary(&raw);
        assert_eq!(short.chars().count(), MAX_SHORT_CHARS);
        assert!(short.ends_with("..."));
    }

    #[test]
    fn format_transcript_truncates_long_messages() {
        let messages = vec![Message {
            id: 1,
            session_name: "main".to_string(),
            role: MessageRole::User,
            content: "x".repeat(3000),
            summarized: false,
            user_id: None,
            created_at: "now".to_string(),
        }];
        let transcript = format_transcript(&messages);
        assert!(transcript.contains("[truncated]"));
    }
}
