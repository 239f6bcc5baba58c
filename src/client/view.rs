use crate::{
    dto::messages::{ServerMessage, StateSnapshot},
    state::{
        catalog::CatalogEntry, chat::ChatMessage, gallery::GalleryEntry, server::EngineSeed,
        state_machine::TimerState,
    },
};

/// What a viewer renders, rebuilt purely from received messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientView {
    timer: Option<TimerState>,
    current_drawing: Option<CatalogEntry>,
    gallery: Vec<GalleryEntry>,
    chat: Vec<ChatMessage>,
    drawing_in_progress: bool,
    chat_max: usize,
}

impl ClientView {
    /// Empty view keeping at most `chat_max` chat lines, like the server.
    pub fn new(chat_max: usize) -> Self {
        Self {
            timer: None,
            current_drawing: None,
            gallery: Vec::new(),
            chat: Vec::new(),
            drawing_in_progress: false,
            chat_max,
        }
    }

    /// Fold one server message into the view.
    pub fn apply(&mut self, message: &ServerMessage) {
        match message {
            ServerMessage::StateInit(snapshot) => {
                self.drawing_in_progress = snapshot.timer.is_drawing;
                self.timer = Some(snapshot.timer.clone());
                self.current_drawing = snapshot.current_drawing.clone();
                self.gallery = snapshot.gallery.clone();
                self.chat = snapshot.chat.clone();
                self.trim_chat();
            }
            ServerMessage::TimerUpdate(timer) => {
                self.timer = Some(timer.clone());
            }
            ServerMessage::DrawingStart {} => self.drawing_in_progress = true,
            ServerMessage::DrawingUpdate { current_drawing } => {
                self.current_drawing = Some(current_drawing.clone());
            }
            ServerMessage::DrawingComplete {} => self.drawing_in_progress = false,
            ServerMessage::GalleryUpdate { gallery } => self.gallery = gallery.clone(),
            ServerMessage::ChatMessage(message) => {
                self.chat.push(message.clone());
                self.trim_chat();
            }
        }
    }

    /// Whether a snapshot has been received yet.
    pub fn is_initialized(&self) -> bool {
        self.timer.is_some()
    }

    /// Seconds to display at wall-clock `now`; zero while drawing or before the first snapshot.
    pub fn seconds_remaining(&self, now: u64) -> u32 {
        self.timer
            .as_ref()
            .map_or(0, |timer| timer.seconds_remaining(now))
    }

    /// True while the avatar is drawing, from `drawing:start` until `drawing:complete`.
    pub fn is_drawing(&self) -> bool {
        self.drawing_in_progress
    }

    /// Last timer received, if any.
    pub fn timer(&self) -> Option<&TimerState> {
        self.timer.as_ref()
    }

    /// Drawing on display.
    pub fn current_drawing(&self) -> Option<&CatalogEntry> {
        self.current_drawing.as_ref()
    }

    /// Gallery, most recent first.
    pub fn gallery(&self) -> &[GalleryEntry] {
        &self.gallery
    }

    /// Retained chat, oldest first.
    pub fn chat(&self) -> &[ChatMessage] {
        &self.chat
    }

    /// The view expressed as a server snapshot, once initialized.
    pub fn to_snapshot(&self) -> Option<StateSnapshot> {
        let timer = self.timer.clone()?;
        Some(StateSnapshot {
            timer,
            current_drawing: self.current_drawing.clone(),
            gallery: self.gallery.clone(),
            chat: self.chat.clone(),
        })
    }

    /// Drawings and chat to carry into a local engine.
    pub fn seed(&self) -> EngineSeed {
        EngineSeed {
            current_drawing: self.current_drawing.clone(),
            gallery: self.gallery.clone(),
            chat: self.chat.clone(),
        }
    }

    fn trim_chat(&mut self) {
        if self.chat.len() > self.chat_max {
            let overflow = self.chat.len() - self.chat_max;
            self.chat.drain(..overflow);
        }
    }
}
