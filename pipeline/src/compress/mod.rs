//! History compaction: bounds agent loop message lists so context windows
//! cannot grow unboundedly across rounds.

pub mod config;

pub use config::CompactionConfig;

use crate::message::Message;

/// Threshold at which [`compact`] collapses the middle of the history.
pub const COMPACTION_TRIGGER_LEN: usize = 30;

/// Number of most recent messages kept verbatim when compacting.
pub const COMPACT_KEEP_RECENT: usize = 20;

/// If `messages` has grown past [`COMPACTION_TRIGGER_LEN`], collapses it to:
/// message 0 (the original instruction), a synthesized system-note summary of
/// the dropped middle span, and the most recent [`COMPACT_KEEP_RECENT`]
/// messages. Otherwise returns `messages` unchanged.
///
/// The summary note enumerates any section names and outcome-shaped phrases
/// (`"done"`, `"completed"`, `"failed"`, `"skipped"`) found in the dropped
/// span, so later rounds retain a trace of what happened without paying for
/// the full transcript.
///
/// A bridge assistant turn is inserted after the summary when needed so the
/// resulting history still alternates user/assistant correctly before the
/// kept tail.
pub fn compact(messages: Vec<Message>) -> Vec<Message> {
    if messages.len() <= COMPACTION_TRIGGER_LEN {
        return messages;
    }

    let first = messages[0].clone();
    let keep_from = messages.len() - COMPACT_KEEP_RECENT;
    let dropped = &messages[1..keep_from];
    let tail = messages[keep_from..].to_vec();

    let summary = summarize_dropped(dropped);
    let mut out = Vec::with_capacity(2 + tail.len());
    out.push(first);
    out.push(Message::system(summary));

    if let Some(needs_bridge) = tail.first() {
        if matches!(needs_bridge, Message::Assistant(_)) {
            out.push(Message::assistant(
                "(continuing from compacted history above)",
            ));
        }
    }

    out.extend(tail);
    out
}

fn summarize_dropped(dropped: &[Message]) -> String {
    const OUTCOME_PHRASES: &[&str] = &["done", "completed", "failed", "skipped"];

    let mut sections = Vec::new();
    let mut outcomes = Vec::new();

    for message in dropped {
        let content = message.content();
        for line in content.lines() {
            let trimmed = line.trim();
            if let Some(name) = trimmed.strip_prefix("## ") {
                sections.push(name.trim().to_string());
            } else if let Some(name) = trimmed.strip_prefix("# ") {
                sections.push(name.trim().to_string());
            }
        }
        let lower = content.to_lowercase();
        for phrase in OUTCOME_PHRASES {
            if lower.contains(phrase) {
                outcomes.push(format!("{phrase}"));
            }
        }
    }

    sections.dedup();
    outcomes.dedup();

    let mut summary = format!(
        "[compacted {} earlier messages]",
        dropped.len()
    );
    if !sections.is_empty() {
        summary.push_str(&format!(" sections mentioned: {}.", sections.join(", ")));
    }
    if !outcomes.is_empty() {
        summary.push_str(&format!(" outcomes mentioned: {}.", outcomes.join(", ")));
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msgs(n: usize) -> Vec<Message> {
        let mut out = vec![Message::system("instruction")];
        for i in 0..n {
            if i % 2 == 0 {
                out.push(Message::user(format!("turn {i}")));
            } else {
                out.push(Message::assistant(format!("## Section {i}\ndone")));
            }
        }
        out
    }

    #[test]
    fn leaves_short_history_untouched() {
        let history = msgs(10);
        let len = history.len();
        assert_eq!(compact(history).len(), len);
    }

    #[test]
    fn compacts_when_past_trigger_length() {
        let history = msgs(40);
        let compacted = compact(history);
        assert_eq!(compacted.len(), 2 + COMPACT_KEEP_RECENT);
        assert_eq!(compacted[0], Message::system("instruction"));
        match &compacted[1] {
            Message::System(note) => {
                assert!(note.contains("compacted"));
                assert!(note.contains("Section"));
                assert!(note.contains("done"));
            }
            other => panic!("expected system summary, got {other:?}"),
        }
    }

    #[test]
    fn keeps_message_zero_verbatim() {
        let history = msgs(50);
        let compacted = compact(history.clone());
        assert_eq!(compacted[0], history[0]);
    }
}
