//! Agent action seam: where a user message turns into a stream of increments.

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use tokio::sync::mpsc;

use crate::config::Config;
use crate::conversation::{ConversationEntry, ConversationIdentity};
use crate::error::AgentError;
use crate::events::AgentIncrement;
use crate::llm::{LlmClient, LlmEvent, LlmMessage, LlmRequest};
use crate::session::Session;

const TITLE_MAX_CHARS: usize = 100;

/// Ordered, finite, non-restartable sequence of increments for one turn.
/// The stream ending means the turn completed; an `Err` item is terminal.
pub type AgentStream = BoxStream<'static, Result<AgentIncrement, AgentError>>;

/// Everything the agent needs to answer a new user message
#[derive(Debug, Clone)]
pub struct AgentContext {
    pub session: Option<Session>,
    pub identity: ConversationIdentity,
    /// Committed turns, oldest first. Does not include `input`.
    pub history: Vec<ConversationEntry>,
    pub input: String,
}

#[async_trait]
pub trait AgentAction: Send + Sync {
    async fn submit_user_message(&self, context: AgentContext) -> Result<AgentStream, AgentError>;
}

/// Agent backed by an OpenAI-compatible chat completions endpoint
pub struct LlmAgent {
    client: LlmClient,
    system_prompt: String,
}

impl LlmAgent {
    pub fn new(client: LlmClient, system_prompt: impl Into<String>) -> Self {
        Self {
            client,
            system_prompt: system_prompt.into(),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, AgentError> {
        let client = LlmClient::new(config.agent.clone(), config.api_key())?;
        Ok(Self::new(client, config.agent.system_prompt.clone()))
    }

    /// Build the model request from the conversation context
    fn build_messages(&self, context: &AgentContext) -> Vec<LlmMessage> {
        let mut messages = vec![LlmMessage::new("system", self.system_prompt.clone())];

        for entry in &context.history {
            messages.push(LlmMessage::new(entry.role.as_ref(), entry.content.as_text()));
        }

        messages.push(LlmMessage::new("user", context.input.clone()));
        messages
    }
}

#[async_trait]
impl AgentAction for LlmAgent {
    async fn submit_user_message(&self, context: AgentContext) -> Result<AgentStream, AgentError> {
        let request = LlmRequest::new(self.build_messages(&context));
        let rx = self.client.stream_response(request).await?;

        // A fresh conversation gets its identity once the first turn completes.
        let identity = (!context.identity.is_assigned()).then(|| AgentIncrement::Identity {
            id: uuid::Uuid::new_v4().to_string(),
            title: title_from_input(&context.input),
        });

        Ok(increments_from_events(rx, identity))
    }
}

/// Derive a conversation title from the first user message
pub fn title_from_input(input: &str) -> String {
    input.trim().chars().take(TITLE_MAX_CHARS).collect()
}

/// Adapt the client's event channel into an agent stream.
///
/// `on_complete` is emitted right before the stream ends successfully.
pub fn increments_from_events(
    rx: mpsc::Receiver<LlmEvent>,
    on_complete: Option<AgentIncrement>,
) -> AgentStream {
    stream::unfold(
        (rx, on_complete, false),
        |(mut rx, mut on_complete, finished)| async move {
            if finished {
                return None;
            }
            match rx.recv().await {
                Some(LlmEvent::TextDelta(delta)) => {
                    Some((Ok(AgentIncrement::Delta(delta)), (rx, on_complete, false)))
                }
                Some(LlmEvent::Error(error)) => {
                    Some((Err(AgentError::Stream(error)), (rx, None, true)))
                }
                Some(LlmEvent::StreamComplete) | None => {
                    let last = on_complete.take()?;
                    Some((Ok(last), (rx, None, true)))
                }
            }
        },
    )
    .boxed()
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use tokio::sync::oneshot;

    use super::*;

    enum Reply {
        Stream(AgentStream),
        Reject(AgentError),
        Hold,
        Gated(oneshot::Receiver<()>, AgentStream),
    }

    /// Agent that answers from a queue of prepared replies
    #[derive(Default)]
    pub(crate) struct ScriptedAgent {
        replies: Mutex<VecDeque<Reply>>,
        contexts: Mutex<Vec<AgentContext>>,
    }

    impl ScriptedAgent {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn push_stream(&self, stream: AgentStream) {
            self.replies.lock().unwrap().push_back(Reply::Stream(stream));
        }

        pub(crate) fn push_rejection(&self, error: AgentError) {
            self.replies.lock().unwrap().push_back(Reply::Reject(error));
        }

        /// Next call never resolves
        pub(crate) fn hold_next(&self) {
            self.replies.lock().unwrap().push_back(Reply::Hold);
        }

        /// Next call stays suspended until the returned sender fires, then
        /// answers with `stream`
        pub(crate) fn push_gated(&self, stream: AgentStream) -> oneshot::Sender<()> {
            let (release, gate) = oneshot::channel();
            self.replies.lock().unwrap().push_back(Reply::Gated(gate, stream));
            release
        }

        pub(crate) fn calls(&self) -> usize {
            self.contexts.lock().unwrap().len()
        }

        pub(crate) fn contexts(&self) -> Vec<AgentContext> {
            self.contexts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl AgentAction for ScriptedAgent {
        async fn submit_user_message(&self, context: AgentContext) -> Result<AgentStream, AgentError> {
            self.contexts.lock().unwrap().push(context);
            let reply = self.replies.lock().unwrap().pop_front();
            match reply {
                Some(Reply::Stream(stream)) => Ok(stream),
                Some(Reply::Reject(error)) => Err(error),
                Some(Reply::Hold) => std::future::pending().await,
                Some(Reply::Gated(gate, stream)) => {
                    let _ = gate.await;
                    Ok(stream)
                }
                None => Ok(stream::empty().boxed()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AgentConfig;
    use crate::events::ConversationRole;
    use crate::conversation::EntryContent;

    #[tokio::test]
    async fn events_become_increments_then_identity() {
        let (tx, rx) = mpsc::channel(8);
        tx.send(LlmEvent::TextDelta("Sure,".into())).await.unwrap();
        tx.send(LlmEvent::TextDelta(" here's a plan.".into())).await.unwrap();
        tx.send(LlmEvent::StreamComplete).await.unwrap();
        drop(tx);

        let identity = AgentIncrement::Identity { id: "c1".into(), title: "Trip".into() };
        let items: Vec<_> = increments_from_events(rx, Some(identity.clone())).collect().await;

        assert_eq!(
            items,
            vec![
                Ok(AgentIncrement::Delta("Sure,".into())),
                Ok(AgentIncrement::Delta(" here's a plan.".into())),
                Ok(identity),
            ]
        );
    }

    #[tokio::test]
    async fn error_event_is_terminal() {
        let (tx, rx) = mpsc::channel(8);
        tx.send(LlmEvent::TextDelta("partial".into())).await.unwrap();
        tx.send(LlmEvent::Error("connection reset".into())).await.unwrap();
        tx.send(LlmEvent::TextDelta("never seen".into())).await.unwrap();
        drop(tx);

        let items: Vec<_> = increments_from_events(rx, None).collect().await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[1], Err(AgentError::Stream("connection reset".into())));
    }

    #[tokio::test]
    async fn closed_channel_completes_stream() {
        let (tx, rx) = mpsc::channel::<LlmEvent>(1);
        drop(tx);
        let items: Vec<_> = increments_from_events(rx, None).collect().await;
        assert!(items.is_empty());
    }

    #[test]
    fn title_is_truncated_first_message() {
        assert_eq!(title_from_input("  Plan a trip  "), "Plan a trip");
        let long = "x".repeat(250);
        assert_eq!(title_from_input(&long).chars().count(), 100);
    }

    #[test]
    fn messages_carry_system_history_and_input() {
        let client = LlmClient::new(AgentConfig::default(), None).unwrap();
        let agent = LlmAgent::new(client, "be brief");
        let context = AgentContext {
            session: None,
            identity: ConversationIdentity::default(),
            history: vec![
                ConversationEntry::user("hello"),
                ConversationEntry::new(ConversationRole::Assistant, EntryContent::Text("hi!".into())),
            ],
            input: "Plan a trip".into(),
        };

        let messages = agent.build_messages(&context);
        let roles: Vec<_> = messages.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["system", "user", "assistant", "user"]);
        assert_eq!(messages[3].content, "Plan a trip");
    }
}
