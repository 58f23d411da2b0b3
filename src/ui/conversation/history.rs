//! Display message list and its history view

use crate::error::DisplayError;
use crate::events::ConversationRole;
use crate::ui::conversation::scroll::ScrollState;
use chrono::{DateTime, Utc};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Widget},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Structured UI payload produced by the agent (cards, tables, tool results)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiFragment {
    pub kind: String,
    #[serde(default)]
    pub props: serde_json::Value,
}

/// What a display entry shows
#[derive(Debug, Clone, PartialEq)]
pub enum Renderable {
    Text(String),
    Fragment(UiFragment),
    /// Placeholder while the agent has not produced anything yet
    Pending,
    Error(String),
}

/// Lifecycle of a display entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// Updated in place by streamed increments
    Streaming,
    /// Immutable
    Final,
    /// Immutable, the turn failed
    Failed,
}

/// A single rendered unit in the conversation view
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayEntry {
    pub id: String,
    pub role: ConversationRole,
    pub renderable: Renderable,
    pub state: EntryState,
    pub created_at: DateTime<Utc>,
}

impl DisplayEntry {
    fn new(role: ConversationRole, renderable: Renderable, state: EntryState) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            renderable,
            state,
            created_at: Utc::now(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.state == EntryState::Failed
    }
}

/// Ordered list of display entries, the UI-facing view of a conversation
#[derive(Debug, Clone, Default)]
pub struct DisplayList {
    entries: Vec<DisplayEntry>,
}

impl DisplayList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a finalized user message, returning its id
    pub fn push_user(&mut self, content: String) -> String {
        self.push(DisplayEntry::new(
            ConversationRole::User,
            Renderable::Text(content),
            EntryState::Final,
        ))
    }

    /// Append the in-progress assistant entry, returning its id
    pub fn push_assistant_pending(&mut self) -> String {
        self.push(DisplayEntry::new(
            ConversationRole::Assistant,
            Renderable::Pending,
            EntryState::Streaming,
        ))
    }

    /// Append an assistant entry that failed before it could stream
    pub fn push_assistant_error(&mut self, message: String) -> String {
        self.push(DisplayEntry::new(
            ConversationRole::Assistant,
            Renderable::Error(message),
            EntryState::Failed,
        ))
    }

    fn push(&mut self, entry: DisplayEntry) -> String {
        let id = entry.id.clone();
        self.entries.push(entry);
        id
    }

    /// Replace the renderable of a streaming entry
    pub fn update(&mut self, id: &str, renderable: Renderable) -> Result<(), DisplayError> {
        let entry = self.streaming_entry_mut(id)?;
        entry.renderable = renderable;
        Ok(())
    }

    /// Freeze a streaming entry
    pub fn finalize(&mut self, id: &str) -> Result<(), DisplayError> {
        let entry = self.streaming_entry_mut(id)?;
        entry.state = EntryState::Final;
        Ok(())
    }

    /// Turn a streaming entry into an error-state entry
    pub fn fail(&mut self, id: &str, message: String) -> Result<(), DisplayError> {
        let entry = self.streaming_entry_mut(id)?;
        entry.renderable = Renderable::Error(message);
        entry.state = EntryState::Failed;
        Ok(())
    }

    fn streaming_entry_mut(&mut self, id: &str) -> Result<&mut DisplayEntry, DisplayError> {
        let entry = self
            .entries
            .iter_mut()
            .find(|entry| entry.id == id)
            .ok_or_else(|| DisplayError::UnknownEntry(id.to_string()))?;
        if entry.state != EntryState::Streaming {
            return Err(DisplayError::Finalized(id.to_string()));
        }
        Ok(entry)
    }

    pub fn get(&self, id: &str) -> Option<&DisplayEntry> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    pub fn entries(&self) -> &[DisplayEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn reset(&mut self) {
        self.entries.clear();
    }
}

/// History display component
pub struct HistoryView<'a> {
    messages: &'a DisplayList,
    scroll: &'a ScrollState,
}

impl<'a> HistoryView<'a> {
    pub fn new(messages: &'a DisplayList, scroll: &'a ScrollState) -> Self {
        Self { messages, scroll }
    }
}

impl Widget for HistoryView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .borders(Borders::ALL)
            .title("💬 Conversation");

        let inner_area = block.inner(area);
        block.render(area, buf);

        if self.messages.is_empty() {
            self.scroll.set_max_offset(0);
            return;
        }

        let mut all_lines: Vec<Line> = Vec::new();
        for entry in self.messages.entries() {
            all_lines.append(&mut render_entry(entry, inner_area.width));
            all_lines.push(Line::from(vec![Span::raw("")]));
        }

        let height = inner_area.height as usize;
        let total = all_lines.len();
        let max_offset = total.saturating_sub(height);
        self.scroll.set_max_offset(max_offset);

        let end = total - self.scroll.offset();
        let start = end.saturating_sub(height);

        for (i, line) in all_lines[start..end].iter().enumerate() {
            buf.set_line(inner_area.x, inner_area.y + i as u16, line, inner_area.width);
        }
    }
}

/// Render a single entry into lines
fn render_entry(entry: &DisplayEntry, width: u16) -> Vec<Line<'static>> {
    let mut lines = Vec::new();

    let role_icon = match entry.role {
        ConversationRole::User => "👤",
        ConversationRole::Assistant => "🤖",
        ConversationRole::System => "⚙️",
    };

    let timestamp = entry.created_at.format("%H:%M:%S").to_string();
    let header = format!("{} {} {}", role_icon, timestamp, "─".repeat(20));
    lines.push(Line::from(vec![Span::styled(
        header,
        Style::default().fg(Color::DarkGray),
    )]));

    let content_width = width.saturating_sub(2) as usize;
    match &entry.renderable {
        Renderable::Text(text) => {
            let wrapped = wrap_text(text, content_width);
            let last = wrapped.len().saturating_sub(1);
            for (i, content_line) in wrapped.into_iter().enumerate() {
                let mut spans = vec![
                    Span::raw("  "),
                    Span::styled(content_line, content_style(entry.role)),
                ];
                if entry.state == EntryState::Streaming && i == last {
                    spans.push(Span::styled("▋", Style::default().fg(Color::Yellow)));
                }
                lines.push(Line::from(spans));
            }
        }
        Renderable::Fragment(fragment) => {
            lines.push(Line::from(vec![
                Span::raw("  "),
                Span::styled(
                    format!("▣ {}", fragment.kind),
                    Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD),
                ),
            ]));
            for content_line in wrap_text(&fragment_summary(fragment), content_width) {
                lines.push(Line::from(vec![
                    Span::raw("  "),
                    Span::styled(content_line, Style::default().fg(Color::Magenta)),
                ]));
            }
        }
        Renderable::Pending => {
            lines.push(Line::from(vec![
                Span::raw("  "),
                Span::styled("…", Style::default().fg(Color::Yellow)),
            ]));
        }
        Renderable::Error(message) => {
            for content_line in wrap_text(message, content_width.saturating_sub(9)) {
                lines.push(Line::from(vec![
                    Span::raw("  "),
                    Span::styled("❌ Error: ", Style::default().fg(Color::Red)),
                    Span::raw(content_line),
                ]));
            }
        }
    }

    lines
}

fn fragment_summary(fragment: &UiFragment) -> String {
    match &fragment.props {
        serde_json::Value::Null => String::new(),
        serde_json::Value::Object(map) => map
            .iter()
            .map(|(key, value)| match value {
                serde_json::Value::String(s) => format!("{key}: {s}"),
                other => format!("{key}: {other}"),
            })
            .collect::<Vec<_>>()
            .join(" · "),
        other => other.to_string(),
    }
}

/// Wrap text to fit within the given width
pub(crate) fn wrap_text(text: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return vec![text.to_string()];
    }

    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let mut current_line = String::new();
        for word in paragraph.split_whitespace() {
            let current_len = current_line.chars().count();
            let word_len = word.chars().count();
            if current_len == 0 {
                current_line.push_str(word);
            } else if current_len + word_len + 1 <= width {
                current_line.push(' ');
                current_line.push_str(word);
            } else {
                lines.push(std::mem::take(&mut current_line));
                current_line.push_str(word);
            }
        }
        lines.push(current_line);
    }

    if lines.is_empty() {
        lines.push(String::new());
    }

    lines
}

/// Get content style based on role
fn content_style(role: ConversationRole) -> Style {
    match role {
        ConversationRole::User => Style::default().fg(Color::Blue),
        ConversationRole::Assistant => Style::default().fg(Color::Green),
        ConversationRole::System => Style::default().fg(Color::Yellow),
    }
}
