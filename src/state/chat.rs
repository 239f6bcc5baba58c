use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Chat line as stored and broadcast by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ChatMessage {
    /// Server-stamped identifier.
    pub id: String,
    /// Display name, trimmed.
    pub username: String,
    /// Message body, trimmed.
    pub text: String,
    /// Avatar color chosen by the client (`#RRGGBB`).
    pub color: String,
    /// Optional avatar image (usually a data URL).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    /// Server-stamped epoch milliseconds.
    pub timestamp: u64,
}

/// Bounded chat history, oldest evicted first.
#[derive(Debug, Clone)]
pub struct ChatLog {
    messages: VecDeque<ChatMessage>,
    max: usize,
}

impl ChatLog {
    /// Empty log keeping at most `max` messages.
    pub fn new(max: usize) -> Self {
        Self {
            messages: VecDeque::with_capacity(max),
            max,
        }
    }

    /// Rebuild a log from messages in chronological order, keeping only the newest `max`.
    pub fn from_messages(max: usize, messages: impl IntoIterator<Item = ChatMessage>) -> Self {
        let mut log = Self::new(max);
        for message in messages {
            log.append(message);
        }
        log
    }

    /// Push `message`, evicting the oldest beyond the cap.
    pub fn append(&mut self, message: ChatMessage) {
        self.messages.push_back(message);
        while self.messages.len() > self.max {
            self.messages.pop_front();
        }
    }

    /// Retained messages, oldest first.
    pub fn recent(&self) -> Vec<ChatMessage> {
        self.messages.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(n: u64) -> ChatMessage {
        ChatMessage {
            id: format!("m{n}"),
            username: "kaya".into(),
            text: format!("hello {n}"),
            color: "#FF6B6B".into(),
            avatar: None,
            timestamp: n,
        }
    }

    #[test]
    fn append_evicts_oldest_beyond_cap() {
        let mut log = ChatLog::new(3);
        for n in 0..5 {
            log.append(message(n));
        }

        let ids = log.recent().into_iter().map(|m| m.id).collect::<Vec<_>>();
        assert_eq!(ids, vec!["m2", "m3", "m4"]);
    }

    #[test]
    fn avatar_is_omitted_when_absent() {
        let json = serde_json::to_value(message(1)).unwrap();
        assert!(json.get("avatar").is_none());
        assert_eq!(json["timestamp"], 1);
    }
}
