//! Canonical conversation log.
//!
//! The log is the persistence-worthy record of a conversation: entries are
//! appended once a turn has completed and are never edited afterwards. It is
//! what gets packaged when a conversation is shared.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::events::ConversationRole;

/// Canonical payload of a turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum EntryContent {
    Text(String),
    Structured(serde_json::Value),
}

impl EntryContent {
    /// Plain-text view of the payload, used for model context and transcripts.
    pub fn as_text(&self) -> String {
        match self {
            EntryContent::Text(text) => text.clone(),
            EntryContent::Structured(value) => value.to_string(),
        }
    }
}

/// One turn in the canonical log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationEntry {
    pub id: String,
    pub role: ConversationRole,
    pub content: EntryContent,
    pub created_at: DateTime<Utc>,
}

impl ConversationEntry {
    pub fn new(role: ConversationRole, content: EntryContent) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content,
            created_at: Utc::now(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(ConversationRole::User, EntryContent::Text(text.into()))
    }
}

/// Append-only store of finalized turns
#[derive(Debug, Clone, Default)]
pub struct ConversationLog {
    entries: Vec<ConversationEntry>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commit a finalized entry.
    pub fn append(&mut self, entry: ConversationEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[ConversationEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry. Only used when the owning session starts over.
    pub(crate) fn reset(&mut self) {
        self.entries.clear();
    }
}

/// Backend-assigned identity of a conversation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationIdentity {
    pub id: Option<String>,
    pub title: Option<String>,
}

impl ConversationIdentity {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            title: Some(title.into()),
        }
    }

    pub fn is_assigned(&self) -> bool {
        self.id.is_some() && self.title.is_some()
    }
}

/// Shape handed to the share collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSnapshot {
    pub id: String,
    pub title: String,
    pub messages: Vec<ConversationEntry>,
}

impl ConversationSnapshot {
    /// Render the snapshot as a plain transcript.
    pub fn transcript(&self) -> String {
        let mut out = format!("# {}\n", self.title);
        for entry in &self.messages {
            out.push_str(&format!(
                "\n[{}] {}:\n{}\n",
                entry.created_at.format("%Y-%m-%d %H:%M:%S"),
                entry.role,
                entry.content.as_text()
            ));
        }
        out
    }
}
