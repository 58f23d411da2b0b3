//! Terminal chat client: a canonical conversation log and a display list
//! kept in step by a single submission controller.

pub mod agent;
pub mod config;
pub mod conversation;
pub mod error;
pub mod events;
pub mod llm;
pub mod session;
pub mod share;
pub mod storage;
pub mod streaming;
pub mod ui;
