//! Share gating and packaging.
//!
//! A conversation is offered for sharing once it has an identity and at
//! least one full exchange on screen. What gets shared is always the
//! canonical log, never the display list.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::conversation::ConversationSnapshot;
use crate::error::ShareError;
use crate::session::ChatSession;

/// Display entries needed before sharing is offered (one exchange)
pub const MIN_SHAREABLE_MESSAGES: usize = 2;

/// Outcome of publishing a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareResult {
    pub id: String,
    pub share_path: String,
    pub url: String,
}

/// Persistence collaborator that publishes a snapshot
#[async_trait]
pub trait ShareService: Send + Sync {
    async fn share_chat(&self, snapshot: &ConversationSnapshot) -> Result<ShareResult, ShareError>;
}

pub struct ShareGate;

impl ShareGate {
    pub fn is_shareable(chat: &ChatSession) -> bool {
        chat.identity().is_assigned() && chat.display().len() >= MIN_SHAREABLE_MESSAGES
    }

    pub fn package_for_share(chat: &ChatSession) -> Result<ConversationSnapshot, ShareError> {
        if !Self::is_shareable(chat) {
            return Err(ShareError::NotShareable);
        }
        let identity = chat.identity();
        match (&identity.id, &identity.title) {
            (Some(id), Some(title)) => Ok(ConversationSnapshot {
                id: id.clone(),
                title: title.clone(),
                messages: chat.log().entries().to_vec(),
            }),
            _ => Err(ShareError::NotShareable),
        }
    }
}

/// Open/closed state of the share dialog. Never touches the chat stores.
#[derive(Debug, Default)]
pub struct ShareDialog {
    open: bool,
}

impl ShareDialog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn open(&mut self) {
        self.open = true;
    }

    pub fn dismiss(&mut self) {
        self.open = false;
    }

    /// The link was handed to the user
    pub fn confirm_copied(&mut self) {
        self.open = false;
    }

    /// Publish the snapshot. Success closes the dialog; failure keeps it
    /// open so the user can retry or dismiss.
    pub async fn share(
        &mut self,
        snapshot: &ConversationSnapshot,
        service: &dyn ShareService,
    ) -> Result<ShareResult, ShareError> {
        match service.share_chat(snapshot).await {
            Ok(result) => {
                tracing::info!(conversation = %result.id, url = %result.url, "conversation shared");
                self.confirm_copied();
                Ok(result)
            }
            Err(error) => {
                tracing::warn!(%error, conversation = %snapshot.id, "sharing failed");
                Err(error)
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::*;

    /// Share service that records snapshots, optionally failing
    #[derive(Default)]
    pub(crate) struct RecordingShareService {
        pub(crate) fail: bool,
        pub(crate) shared: Mutex<Vec<ConversationSnapshot>>,
    }

    #[async_trait]
    impl ShareService for RecordingShareService {
        async fn share_chat(&self, snapshot: &ConversationSnapshot) -> Result<ShareResult, ShareError> {
            if self.fail {
                return Err(ShareError::Storage("disk full".into()));
            }
            self.shared.lock().unwrap().push(snapshot.clone());
            Ok(ShareResult {
                id: snapshot.id.clone(),
                share_path: format!("/share/{}", snapshot.id),
                url: format!("http://localhost:3000/share/{}", snapshot.id),
            })
        }
    }
}
