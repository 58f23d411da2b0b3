use crate::conversation::EntryContent;
use crate::events::AgentIncrement;
use crate::ui::conversation::history::{Renderable, UiFragment};

/// Accumulated state of the assistant reply currently being streamed
#[derive(Debug, Clone, Default)]
pub struct StreamState {
    /// Accumulated text buffer
    text_buffer: String,
    /// Structured fragment, overrides the text once present
    fragment: Option<UiFragment>,
    /// Number of increments applied
    increments: usize,
}

impl StreamState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process a text delta from the agent
    pub fn push_delta(&mut self, delta: &str) {
        self.text_buffer.push_str(delta);
    }

    /// Replace the reply with a structured fragment
    pub fn set_fragment(&mut self, fragment: UiFragment) {
        self.fragment = Some(fragment);
    }

    /// Apply a content increment. Identity increments carry no content and
    /// are handled by the caller.
    pub fn apply(&mut self, increment: &AgentIncrement) {
        self.increments += 1;
        match increment {
            AgentIncrement::Delta(delta) => self.push_delta(delta),
            AgentIncrement::Fragment(fragment) => self.set_fragment(fragment.clone()),
            AgentIncrement::Identity { .. } => {}
        }
    }

    /// What the in-progress display entry should show right now
    pub fn renderable(&self) -> Renderable {
        if let Some(fragment) = &self.fragment {
            return Renderable::Fragment(fragment.clone());
        }
        if self.text_buffer.is_empty() {
            Renderable::Pending
        } else {
            Renderable::Text(self.text_buffer.clone())
        }
    }

    /// Canonical content of the completed reply
    pub fn finalize(&self) -> EntryContent {
        match &self.fragment {
            Some(fragment) => EntryContent::Structured(
                serde_json::to_value(fragment).unwrap_or(serde_json::Value::Null),
            ),
            None => EntryContent::Text(self.text_buffer.clone()),
        }
    }

    /// Renderable of the completed reply; an empty reply shows as empty text
    pub fn final_renderable(&self) -> Renderable {
        match self.renderable() {
            Renderable::Pending => Renderable::Text(String::new()),
            other => other,
        }
    }

    pub fn increments(&self) -> usize {
        self.increments
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deltas_concatenate() {
        let mut state = StreamState::new();
        assert_eq!(state.renderable(), Renderable::Pending);

        state.apply(&AgentIncrement::Delta("Sure,".into()));
        state.apply(&AgentIncrement::Delta(" here's a plan.".into()));

        assert_eq!(state.increments(), 2);
        assert_eq!(state.renderable(), Renderable::Text("Sure, here's a plan.".into()));
        assert_eq!(state.finalize(), EntryContent::Text("Sure, here's a plan.".into()));
    }

    #[test]
    fn fragment_takes_over_the_reply() {
        let mut state = StreamState::new();
        state.push_delta("Loading chart");
        let fragment = UiFragment {
            kind: "stock_price".into(),
            props: serde_json::json!({ "symbol": "ACME", "price": 12.5 }),
        };
        state.set_fragment(fragment.clone());

        assert_eq!(state.renderable(), Renderable::Fragment(fragment));
        match state.finalize() {
            EntryContent::Structured(value) => assert_eq!(value["kind"], "stock_price"),
            other => panic!("expected structured content, got {other:?}"),
        }
    }

    #[test]
    fn empty_reply_finalizes_to_empty_text() {
        let state = StreamState::new();
        assert_eq!(state.final_renderable(), Renderable::Text(String::new()));
        assert_eq!(state.finalize(), EntryContent::Text(String::new()));
    }
}
