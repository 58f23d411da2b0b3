//! Conversation UI components for the chat interface

pub mod affordances;
pub mod commands;
pub mod composer;
pub mod history;
pub mod panel;
pub mod scroll;
pub mod streaming;
pub mod submission;

pub use affordances::EphemeralAffordances;
pub use commands::{get_help_text, ParsedCommand, SlashCommand};
pub use composer::{ComposerResult, ConversationComposer};
pub use history::{DisplayEntry, DisplayList, EntryState, HistoryView, Renderable, UiFragment};
pub use panel::{ChatPanel, PanelAction};
pub use scroll::{ScrollAnchor, ScrollState, ScrollToBottomButton};
pub use streaming::RespondingIndicator;
pub use submission::{Progress, SubmissionController, SubmitOutcome, TurnIds};
