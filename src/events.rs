use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};

use crate::ui::conversation::history::UiFragment;

/// Role of a participant in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ConversationRole {
    User,
    Assistant,
    System,
}

/// One streamed increment produced by the agent action
#[derive(Debug, Clone, PartialEq)]
pub enum AgentIncrement {
    /// Text appended to the in-progress assistant reply
    Delta(String),
    /// Replace the reply with a structured UI fragment
    Fragment(UiFragment),
    /// Backend-assigned conversation identity
    Identity { id: String, title: String },
}

/// Severity of a transient notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

/// Transient user-facing notification (toast)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Info, message: message.into() }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Success, message: message.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Error, message: message.into() }
    }
}

/// Terminal-side events fed into the chat panel
#[derive(Debug, Clone)]
pub enum TuiEvent {
    /// Key press event
    Key(crossterm::event::KeyEvent),
    /// Paste event
    Paste(String),
    /// Terminal resize
    Resize(u16, u16),
    /// Periodic redraw
    Tick,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_serializes_lowercase() {
        let json = serde_json::to_string(&ConversationRole::Assistant).unwrap();
        assert_eq!(json, "\"assistant\"");
        assert_eq!(ConversationRole::User.to_string(), "user");
    }
}
