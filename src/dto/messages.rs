use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    dto::chat::ChatSendRequest,
    state::{
        catalog::CatalogEntry, chat::ChatMessage, gallery::GalleryEntry, state_machine::TimerState,
    },
};

/// Full point-in-time state delivered once to every new subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshot {
    /// Countdown state.
    pub timer: TimerState,
    /// Drawing on display; absent before the first reveal.
    #[schema(value_type = Option<String>)]
    pub current_drawing: Option<CatalogEntry>,
    /// Retired drawings, most recent first.
    pub gallery: Vec<GalleryEntry>,
    /// Retained chat messages, oldest first.
    pub chat: Vec<ChatMessage>,
}

/// Messages pushed from the server to viewers.
///
/// Serialized as `{"event": "<name>", "data": <payload>}` on every transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerMessage {
    /// Snapshot sent first on every subscription.
    #[serde(rename = "state:init")]
    StateInit(StateSnapshot),
    /// Countdown tick, restart or reveal start.
    #[serde(rename = "timer:update")]
    TimerUpdate(TimerState),
    /// The avatar started drawing.
    #[serde(rename = "drawing:start")]
    DrawingStart {},
    /// A new drawing is on display.
    #[serde(rename = "drawing:update", rename_all = "camelCase")]
    DrawingUpdate {
        /// The drawing now shown.
        current_drawing: CatalogEntry,
    },
    /// The reveal finished.
    #[serde(rename = "drawing:complete")]
    DrawingComplete {},
    /// The gallery changed.
    #[serde(rename = "gallery:update")]
    GalleryUpdate {
        /// Full gallery, most recent first.
        gallery: Vec<GalleryEntry>,
    },
    /// A viewer posted a chat line.
    #[serde(rename = "chat:message")]
    ChatMessage(ChatMessage),
}

impl ServerMessage {
    /// Wire name of the message, also used as the SSE event name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::StateInit(_) => "state:init",
            Self::TimerUpdate(_) => "timer:update",
            Self::DrawingStart {} => "drawing:start",
            Self::DrawingUpdate { .. } => "drawing:update",
            Self::DrawingComplete {} => "drawing:complete",
            Self::GalleryUpdate { .. } => "gallery:update",
            Self::ChatMessage(_) => "chat:message",
        }
    }
}

/// Messages accepted from WebSocket viewers.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientMessage {
    /// Post a chat line.
    #[serde(rename = "chat:send")]
    ChatSend(ChatSendRequest),
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn timer_update_uses_camel_case_envelope() {
        let message = ServerMessage::TimerUpdate(TimerState {
            started_at: 42,
            duration: 60,
            is_drawing: false,
        });
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(
            value,
            json!({
                "event": "timer:update",
                "data": { "startedAt": 42, "duration": 60, "isDrawing": false }
            })
        );
        assert_eq!(message.name(), "timer:update");
    }

    #[test]
    fn drawing_events_carry_expected_payloads() {
        let update = ServerMessage::DrawingUpdate {
            current_drawing: CatalogEntry::new("/drawings/1.png"),
        };
        assert_eq!(
            serde_json::to_value(&update).unwrap(),
            json!({ "event": "drawing:update", "data": { "currentDrawing": "/drawings/1.png" } })
        );
        assert_eq!(
            serde_json::to_value(ServerMessage::DrawingStart {}).unwrap(),
            json!({ "event": "drawing:start", "data": {} })
        );

        let parsed: ServerMessage =
            serde_json::from_str(r#"{"event":"drawing:complete","data":{}}"#).unwrap();
        assert_eq!(parsed, ServerMessage::DrawingComplete {});
    }

    #[test]
    fn chat_send_parses_from_client_envelope() {
        let raw =
            r##"{"event":"chat:send","data":{"username":"noah","text":"hi","color":"#4ECDC4"}}"##;
        let ClientMessage::ChatSend(request) = serde_json::from_str::<ClientMessage>(raw).unwrap();
        assert_eq!(request.username, "noah");
        assert_eq!(request.avatar, None);
    }
}
