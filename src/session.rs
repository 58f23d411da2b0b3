use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::conversation::{ConversationIdentity, ConversationLog};
use crate::ui::conversation::history::DisplayList;

/// Opaque identity/auth context of the person chatting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
    pub display_name: String,
}

impl Session {
    /// Build the local session from config, falling back to `$USER`
    pub fn from_config(config: &Config) -> Self {
        let display_name = config
            .user
            .clone()
            .or_else(|| std::env::var("USER").ok())
            .unwrap_or_else(|| "you".to_string());

        Self {
            user_id: display_name.to_lowercase().replace(' ', "-"),
            display_name,
        }
    }
}

/// State owned by one active chat: both stores plus the conversation identity.
///
/// Every reset bumps `epoch`; work started under an older epoch must not be
/// applied to the stores.
#[derive(Debug, Default)]
pub struct ChatSession {
    session: Option<Session>,
    identity: ConversationIdentity,
    log: ConversationLog,
    display: DisplayList,
    epoch: u64,
    disposed: bool,
}

impl ChatSession {
    pub fn new(session: Option<Session>, identity: ConversationIdentity) -> Self {
        Self {
            session,
            identity,
            ..Self::default()
        }
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn identity(&self) -> &ConversationIdentity {
        &self.identity
    }

    pub fn log(&self) -> &ConversationLog {
        &self.log
    }

    pub fn display(&self) -> &DisplayList {
        &self.display
    }

    pub(crate) fn log_mut(&mut self) -> &mut ConversationLog {
        &mut self.log
    }

    pub(crate) fn display_mut(&mut self) -> &mut DisplayList {
        &mut self.display
    }

    pub(crate) fn assign_identity(&mut self, id: String, title: String) {
        self.identity = ConversationIdentity {
            id: Some(id),
            title: Some(title),
        };
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Whether work tagged with `epoch` may still touch the stores
    pub fn is_live(&self, epoch: u64) -> bool {
        !self.disposed && self.epoch == epoch
    }

    /// Start over with an empty conversation
    pub(crate) fn reset(&mut self) {
        self.log.reset();
        self.display.reset();
        self.identity = ConversationIdentity::default();
        self.epoch += 1;
    }

    /// End the session; nothing may be applied afterwards
    pub(crate) fn dispose(&mut self) {
        self.reset();
        self.disposed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_bumps_epoch_and_clears_stores() {
        let mut chat = ChatSession::new(None, ConversationIdentity::new("c1", "Trip"));
        chat.display_mut().push_user("hi".into());
        let before = chat.epoch();

        chat.reset();

        assert!(chat.display().is_empty());
        assert!(chat.log().is_empty());
        assert_eq!(chat.identity(), &ConversationIdentity::default());
        assert!(!chat.is_live(before));
        assert!(chat.is_live(chat.epoch()));
    }

    #[test]
    fn disposed_session_is_never_live() {
        let mut chat = ChatSession::default();
        chat.dispose();
        assert!(chat.is_disposed());
        assert!(!chat.is_live(chat.epoch()));
    }

    #[test]
    fn session_from_config_prefers_configured_name() {
        let config = Config {
            user: Some("Ada Lovelace".into()),
            ..Config::default()
        };
        let session = Session::from_config(&config);
        assert_eq!(session.display_name, "Ada Lovelace");
        assert_eq!(session.user_id, "ada-lovelace");
    }
}
