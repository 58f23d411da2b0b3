//! Submission of user input and reconciliation of the streamed reply.
//!
//! The controller is the only writer of the chat stores. A submission first
//! appends the user's message to the display list synchronously, then awaits
//! the agent action; the reply is applied one increment at a time through
//! [`SubmissionController::next_increment`], and only a completed reply is
//! promoted into the canonical log.

use std::sync::Arc;

use futures::StreamExt;

use crate::agent::{AgentAction, AgentContext, AgentStream};
use crate::conversation::{ConversationEntry, ConversationLog, ConversationIdentity};
use crate::error::{AgentError, SubmitError};
use crate::events::{AgentIncrement, ConversationRole, Notice};
use crate::session::ChatSession;
use crate::streaming::StreamState;
use crate::ui::conversation::history::DisplayList;

/// Display ids of the two entries belonging to one exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnIds {
    pub user_entry_id: String,
    pub assistant_entry_id: String,
}

/// Result of a submission attempt
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Blank input, nothing happened
    Ignored,
    /// The agent accepted the message and is streaming its reply
    Accepted(TurnIds),
    /// The reply finished and both turns are in the log
    Completed(TurnIds),
    /// The agent rejected the message or the stream failed
    Failed(TurnIds, AgentError),
    /// The session was reset or torn down before the reply finished
    Discarded,
}

/// What applying one increment did
#[derive(Debug, Clone, PartialEq)]
pub enum Progress {
    Updated,
    Completed,
    Failed(AgentError),
    /// Arrived after the session moved on; dropped without touching state
    Discarded,
}

/// Submission whose optimistic entry is already visible
#[derive(Debug)]
pub struct PendingTurn {
    epoch: u64,
    input: String,
    user_entry_id: String,
}

struct InFlight {
    epoch: u64,
    input: String,
    ids: TurnIds,
    stream: AgentStream,
    state: StreamState,
}

pub struct SubmissionController {
    chat: ChatSession,
    agent: Arc<dyn AgentAction>,
    in_flight: Option<InFlight>,
    notices: Vec<Notice>,
}

impl SubmissionController {
    pub fn new(chat: ChatSession, agent: Arc<dyn AgentAction>) -> Self {
        Self {
            chat,
            agent,
            in_flight: None,
            notices: Vec::new(),
        }
    }

    pub fn chat(&self) -> &ChatSession {
        &self.chat
    }

    pub fn messages(&self) -> &DisplayList {
        self.chat.display()
    }

    pub fn log(&self) -> &ConversationLog {
        self.chat.log()
    }

    pub fn identity(&self) -> &ConversationIdentity {
        self.chat.identity()
    }

    /// A live reply is streaming; new submissions are rejected
    pub fn is_busy(&self) -> bool {
        self.in_flight
            .as_ref()
            .is_some_and(|turn| self.chat.is_live(turn.epoch))
    }

    /// There is a stream to poll, live or stale
    pub fn has_pending(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Drain queued notifications
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    /// Submit the composer's content.
    ///
    /// The user entry is appended and `input` cleared before the first
    /// suspension point. Agent failures are reported through the returned
    /// outcome and an error notice, never as `Err`.
    pub async fn submit(&mut self, input: &mut String) -> Result<SubmitOutcome, SubmitError> {
        match self.begin(input)? {
            Some(turn) => Ok(self.dispatch(turn).await),
            None => Ok(SubmitOutcome::Ignored),
        }
    }

    /// Submit and drive the reply to its end
    pub async fn submit_and_wait(&mut self, input: &mut String) -> Result<SubmitOutcome, SubmitError> {
        let outcome = self.submit(input).await?;
        let SubmitOutcome::Accepted(ids) = outcome else {
            return Ok(outcome);
        };

        Ok(match self.run_to_completion().await {
            Some(Progress::Completed) => SubmitOutcome::Completed(ids),
            Some(Progress::Failed(error)) => SubmitOutcome::Failed(ids, error),
            _ => SubmitOutcome::Discarded,
        })
    }

    /// Synchronous half of a submission: validate, append the optimistic
    /// user entry and clear the input. `Ok(None)` for blank input.
    pub fn begin(&mut self, input: &mut String) -> Result<Option<PendingTurn>, SubmitError> {
        if self.chat.is_disposed() {
            return Err(SubmitError::Disposed);
        }
        if input.trim().is_empty() {
            return Ok(None);
        }
        if self.is_busy() {
            return Err(SubmitError::Busy);
        }

        // A stale stream from a previous conversation is simply dropped.
        self.in_flight = None;

        let content = std::mem::take(input);
        let user_entry_id = self.chat.display_mut().push_user(content.clone());
        tracing::info!(entry = %user_entry_id, chars = content.len(), "submitting user message");

        Ok(Some(PendingTurn {
            epoch: self.chat.epoch(),
            input: content,
            user_entry_id,
        }))
    }

    /// Asynchronous half: invoke the agent action and host its reply
    pub async fn dispatch(&mut self, turn: PendingTurn) -> SubmitOutcome {
        let context = AgentContext {
            session: self.chat.session().cloned(),
            identity: self.chat.identity().clone(),
            history: self.chat.log().entries().to_vec(),
            input: turn.input.clone(),
        };

        let result = self.agent.submit_user_message(context).await;

        if !self.chat.is_live(turn.epoch) {
            tracing::debug!("session moved on while the agent was starting; dropping reply");
            return SubmitOutcome::Discarded;
        }

        match result {
            Ok(stream) => {
                let assistant_entry_id = self.chat.display_mut().push_assistant_pending();
                let ids = TurnIds {
                    user_entry_id: turn.user_entry_id,
                    assistant_entry_id,
                };
                self.in_flight = Some(InFlight {
                    epoch: turn.epoch,
                    input: turn.input,
                    ids: ids.clone(),
                    stream,
                    state: StreamState::new(),
                });
                SubmitOutcome::Accepted(ids)
            }
            Err(error) => {
                tracing::warn!(%error, "agent rejected submission");
                let assistant_entry_id = self.chat.display_mut().push_assistant_error(error.to_string());
                self.notices.push(Notice::error(error.to_string()));
                SubmitOutcome::Failed(
                    TurnIds {
                        user_entry_id: turn.user_entry_id,
                        assistant_entry_id,
                    },
                    error,
                )
            }
        }
    }

    /// Await the next streamed increment and apply it.
    ///
    /// Returns `None` when nothing is in flight. Cancel-safe: dropping the
    /// future before it resolves loses no increment.
    pub async fn next_increment(&mut self) -> Option<Progress> {
        let item = self.in_flight.as_mut()?.stream.next().await;
        let mut turn = self.in_flight.take()?;

        if !self.chat.is_live(turn.epoch) {
            tracing::debug!(entry = %turn.ids.assistant_entry_id, "discarding increment for a stale session");
            return Some(Progress::Discarded);
        }

        match item {
            Some(Ok(AgentIncrement::Identity { id, title })) => {
                tracing::info!(conversation = %id, %title, "conversation identity assigned");
                self.chat.assign_identity(id, title);
                self.in_flight = Some(turn);
                Some(Progress::Updated)
            }
            Some(Ok(increment)) => {
                turn.state.apply(&increment);
                if let Err(error) = self
                    .chat
                    .display_mut()
                    .update(&turn.ids.assistant_entry_id, turn.state.renderable())
                {
                    tracing::warn!(%error, "streaming entry could not be updated");
                }
                self.in_flight = Some(turn);
                Some(Progress::Updated)
            }
            Some(Err(error)) => Some(self.fail_turn(turn, error)),
            None => Some(self.complete_turn(turn)),
        }
    }

    /// Drive the in-flight reply until it ends, returning how it ended
    pub async fn run_to_completion(&mut self) -> Option<Progress> {
        let mut last = None;
        while let Some(progress) = self.next_increment().await {
            last = Some(progress);
        }
        last
    }

    fn complete_turn(&mut self, turn: InFlight) -> Progress {
        let display = self.chat.display_mut();
        let id = &turn.ids.assistant_entry_id;
        if let Err(error) = display
            .update(id, turn.state.final_renderable())
            .and_then(|()| display.finalize(id))
        {
            tracing::warn!(%error, "assistant entry could not be finalized");
        }

        let log = self.chat.log_mut();
        log.append(ConversationEntry::user(turn.input));
        log.append(ConversationEntry::new(
            ConversationRole::Assistant,
            turn.state.finalize(),
        ));

        tracing::info!(
            entry = %id,
            increments = turn.state.increments(),
            log_len = self.chat.log().len(),
            "assistant reply completed"
        );
        Progress::Completed
    }

    fn fail_turn(&mut self, turn: InFlight, error: AgentError) -> Progress {
        tracing::warn!(%error, entry = %turn.ids.assistant_entry_id, "assistant reply failed");
        if let Err(display_error) = self
            .chat
            .display_mut()
            .fail(&turn.ids.assistant_entry_id, error.to_string())
        {
            tracing::warn!(error = %display_error, "assistant entry could not be marked failed");
        }
        self.notices.push(Notice::error(error.to_string()));
        Progress::Failed(error)
    }

    /// Start a new, empty conversation. A reply still streaming for the old
    /// one is left to be discarded.
    pub fn new_conversation(&mut self) {
        tracing::info!("starting a new conversation");
        self.chat.reset();
    }

    /// End the session. Late increments are discarded.
    pub fn teardown(&mut self) {
        tracing::info!("tearing down chat session");
        self.chat.dispose();
    }
}
