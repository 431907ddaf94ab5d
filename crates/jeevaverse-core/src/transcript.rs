//! View models for rendering a conversation
//!
//! The "thinking" placeholder only exists here; the log never stores it.

use chrono::{DateTime, FixedOffset, Offset, Utc};

use crate::history::LogStore;
use crate::state::{Role, Turn};

pub const GREETING: &str = "Welcome to JeevaVerse. Attach an image or ask a question.";

/// India Standard Time, the default display offset
pub const DEFAULT_UTC_OFFSET_MINUTES: i32 = 330;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscriptEntry<'a> {
    Greeting,
    Turn(&'a Turn),
    Pending,
}

/// Entries for the live chat view, oldest first.
pub fn transcript(turns: &[Turn], sending: bool) -> Vec<TranscriptEntry<'_>> {
    if turns.is_empty() && !sending {
        return vec![TranscriptEntry::Greeting];
    }

    let mut entries: Vec<TranscriptEntry> = turns.iter().map(TranscriptEntry::Turn).collect();
    if sending {
        entries.push(TranscriptEntry::Pending);
    }
    entries
}

pub fn speaker_name(role: Role) -> &'static str {
    match role {
        Role::User => "You",
        Role::Model => "JeevaVerse",
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub speaker: &'static str,
    pub text: String,
    pub when: String,
}

/// e.g. `16 Oct 2026, 3:45 pm`. Out-of-range offsets fall back to UTC.
pub fn format_timestamp(timestamp: &DateTime<Utc>, utc_offset_minutes: i32) -> String {
    let offset = FixedOffset::east_opt(utc_offset_minutes.saturating_mul(60)).unwrap_or_else(|| Utc.fix());
    timestamp
        .with_timezone(&offset)
        .format("%-d %b %Y, %-I:%M %P")
        .to_string()
}

/// Entries for the history panel, newest first.
pub fn history_entries(log: &LogStore, utc_offset_minutes: i32) -> Vec<HistoryEntry> {
    log.recent()
        .into_iter()
        .map(|turn| HistoryEntry {
            speaker: speaker_name(turn.role),
            text: turn.content.text.clone(),
            when: format_timestamp(&turn.timestamp, utc_offset_minutes),
        })
        .collect()
}
