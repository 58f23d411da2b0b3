//! Typed errors for the conversation core.
//!
//! Application edges (CLI, config loading, terminal setup) stay on
//! `anyhow::Result`; these enums describe failures the chat panel reacts to.

use thiserror::Error;

/// Why a submission could not be started.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    /// Another turn is still streaming for this session.
    #[error("a response is still streaming; wait for it to finish")]
    Busy,

    /// The session was torn down.
    #[error("the chat session has ended")]
    Disposed,
}

/// Failures reported by the agent action, either as a rejected call or as a
/// terminal error element in the stream.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AgentError {
    #[error("agent rejected the request: {0}")]
    Rejected(String),

    #[error("response stream failed: {0}")]
    Stream(String),

    #[error("network error: {0}")]
    Transport(String),
}

/// Failures of the share flow. None of these affect conversation state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShareError {
    #[error("conversation cannot be shared yet")]
    NotShareable,

    #[error("failed to store shared conversation: {0}")]
    Storage(String),

    #[error("failed to serialize shared conversation: {0}")]
    Serialization(String),
}

/// Rejected display-list mutations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DisplayError {
    #[error("no display entry with id '{0}'")]
    UnknownEntry(String),

    #[error("display entry '{0}' is finalized")]
    Finalized(String),
}

impl From<std::io::Error> for ShareError {
    fn from(err: std::io::Error) -> Self {
        ShareError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for ShareError {
    fn from(err: serde_json::Error) -> Self {
        ShareError::Serialization(err.to_string())
    }
}

impl From<reqwest::Error> for AgentError {
    fn from(err: reqwest::Error) -> Self {
        AgentError::Transport(err.to_string())
    }
}
