//! Chat module
//!
//! Bounded history of chat lines; the newest few are sent to players as
//! they join.

use std::collections::VecDeque;

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

/// Lines kept in memory
pub const CHAT_HISTORY_SIZE: usize = 100;

/// Lines replayed to a joining player
pub const CHAT_REPLAY: usize = 20;

/// Longest accepted line, in characters
pub const MAX_MESSAGE_CHARS: usize = 200;

/// One chat line
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatLine {
    pub id: Uuid,
    pub player_id: Uuid,
    pub player_name: String,
    pub message: String,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
}

/// Ring buffer of recent chat
#[derive(Debug, Default)]
pub struct ChatLog {
    lines: VecDeque<ChatLine>,
}

impl ChatLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a line. Blank messages are ignored and long ones truncated.
    pub fn post(&mut self, player_id: Uuid, player_name: &str, message: &str) -> Option<ChatLine> {
        let message = message.trim();
        if message.is_empty() {
            return None;
        }

        let line = ChatLine {
            id: Uuid::new_v4(),
            player_id,
            player_name: player_name.to_string(),
            message: message.chars().take(MAX_MESSAGE_CHARS).collect(),
            timestamp: Utc::now().timestamp_millis(),
        };

        if self.lines.len() == CHAT_HISTORY_SIZE {
            self.lines.pop_front();
        }
        self.lines.push_back(line.clone());
        Some(line)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// The newest `CHAT_REPLAY` lines, oldest first
    pub fn recent(&self) -> Vec<ChatLine> {
        let skip = self.lines.len().saturating_sub(CHAT_REPLAY);
        self.lines.iter().skip(skip).cloned().collect()
    }
}
