use crate::ui::conversation::commands::{command_entries, parse_slash_command, CommandEntry, ParsedCommand};
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Widget},
};

/// Result returned when the user interacts with the composer
#[derive(Debug, PartialEq)]
pub enum ComposerResult {
    /// Enter pressed on regular text; the backing value is left for the
    /// submission to consume
    Submitted,
    Command(ParsedCommand),
    None,
}

/// State for the text area within the composer
#[derive(Debug, Clone, Default)]
pub struct TextAreaState {
    pub content: String,
    /// Cursor position in characters
    pub cursor_position: usize,
}

impl TextAreaState {
    fn byte_index(&self, char_pos: usize) -> usize {
        self.content
            .char_indices()
            .nth(char_pos)
            .map(|(i, _)| i)
            .unwrap_or(self.content.len())
    }

    fn char_len(&self) -> usize {
        self.content.chars().count()
    }
}

/// Composer for user input
pub struct ConversationComposer {
    state: TextAreaState,
    placeholder: String,
    busy: bool,
    command_entries: Vec<CommandEntry>,
    filtered_commands: Vec<CommandEntry>,
    show_command_palette: bool,
    selected_command: Option<usize>,
}

impl ConversationComposer {
    pub fn new(placeholder: impl Into<String>) -> Self {
        Self {
            state: TextAreaState::default(),
            placeholder: placeholder.into(),
            busy: false,
            command_entries: command_entries(),
            filtered_commands: Vec::new(),
            show_command_palette: false,
            selected_command: None,
        }
    }

    /// Handle key input
    pub fn handle_key(&mut self, key: KeyEvent) -> ComposerResult {
        if key.kind != KeyEventKind::Press {
            return ComposerResult::None;
        }

        match key.code {
            KeyCode::Enter if key.modifiers.contains(KeyModifiers::SHIFT) => {
                self.insert_char('\n');
            }
            KeyCode::Enter => {
                if self.show_command_palette {
                    if let Some(command) = self.apply_selected_command() {
                        return ComposerResult::Command(command);
                    }
                    // Nothing matched, so the text is an ordinary message.
                    self.close_command_palette();
                }

                if let Some(command) = parse_slash_command(&self.state.content) {
                    self.clear();
                    return ComposerResult::Command(command);
                }
                if !self.state.content.trim().is_empty() {
                    return ComposerResult::Submitted;
                }
            }
            KeyCode::Up if self.show_command_palette => self.move_command_selection(-1),
            KeyCode::Down if self.show_command_palette => self.move_command_selection(1),
            KeyCode::Esc if self.show_command_palette => self.close_command_palette(),
            KeyCode::Tab if self.show_command_palette => {
                if let Some(entry) = self.selected_entry() {
                    self.set_input(format!("/{}", entry.keyword));
                    self.refresh_command_palette();
                }
            }
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.insert_char(c);
                self.sync_command_palette();
            }
            KeyCode::Backspace => {
                if self.backspace() {
                    self.sync_command_palette();
                }
            }
            KeyCode::Delete => {
                if self.delete() {
                    self.sync_command_palette();
                }
            }
            KeyCode::Left => {
                self.state.cursor_position = self.state.cursor_position.saturating_sub(1);
            }
            KeyCode::Right => {
                if self.state.cursor_position < self.state.char_len() {
                    self.state.cursor_position += 1;
                }
            }
            KeyCode::Home => {
                self.state.cursor_position = 0;
            }
            KeyCode::End => {
                self.state.cursor_position = self.state.char_len();
            }
            _ => {}
        }

        ComposerResult::None
    }

    /// Insert pasted text at the cursor
    pub fn paste(&mut self, text: &str) {
        for c in text.chars() {
            self.insert_char(c);
        }
        self.sync_command_palette();
    }

    /// Insert a character at the cursor position
    fn insert_char(&mut self, c: char) {
        let at = self.state.byte_index(self.state.cursor_position);
        self.state.content.insert(at, c);
        self.state.cursor_position += 1;
    }

    /// Delete character before cursor
    fn backspace(&mut self) -> bool {
        if self.state.cursor_position == 0 {
            return false;
        }
        self.state.cursor_position -= 1;
        let at = self.state.byte_index(self.state.cursor_position);
        self.state.content.remove(at);
        true
    }

    /// Delete character at cursor
    fn delete(&mut self) -> bool {
        if self.state.cursor_position >= self.state.char_len() {
            return false;
        }
        let at = self.state.byte_index(self.state.cursor_position);
        self.state.content.remove(at);
        true
    }

    fn sync_command_palette(&mut self) {
        let content = &self.state.content;
        let typing_command = content.starts_with('/') && !content.contains(char::is_whitespace);
        if typing_command {
            if !self.show_command_palette {
                self.show_command_palette = true;
                self.selected_command = Some(0);
            }
            self.refresh_command_palette();
        } else {
            self.close_command_palette();
        }
    }

    fn close_command_palette(&mut self) {
        self.show_command_palette = false;
        self.filtered_commands.clear();
        self.selected_command = None;
    }

    fn refresh_command_palette(&mut self) {
        let query = self.state.content.trim_start_matches('/').to_lowercase();
        self.filtered_commands = self
            .command_entries
            .iter()
            .filter(|entry| query.is_empty() || entry.keyword.starts_with(&query))
            .copied()
            .collect();

        self.selected_command = if self.filtered_commands.is_empty() {
            None
        } else {
            let index = self.selected_command.unwrap_or(0);
            Some(index.min(self.filtered_commands.len() - 1))
        };
    }

    fn move_command_selection(&mut self, delta: isize) {
        if self.filtered_commands.is_empty() {
            self.selected_command = None;
            return;
        }

        let current = self.selected_command.unwrap_or(0) as isize;
        let len = self.filtered_commands.len() as isize;
        let next = (current + delta).rem_euclid(len);
        self.selected_command = Some(next as usize);
    }

    fn selected_entry(&self) -> Option<CommandEntry> {
        self.selected_command
            .and_then(|index| self.filtered_commands.get(index))
            .copied()
    }

    fn apply_selected_command(&mut self) -> Option<ParsedCommand> {
        let entry = self.selected_entry()?;
        self.clear();
        Some(ParsedCommand {
            command: entry.command,
            argument: None,
        })
    }

    /// Reflect whether a reply is streaming
    pub fn set_busy(&mut self, busy: bool) {
        self.busy = busy;
    }

    pub fn input(&self) -> &str {
        &self.state.content
    }

    /// Backing value of the composer, consumed by a submission
    pub fn input_mut(&mut self) -> &mut String {
        &mut self.state.content
    }

    /// Replace the content and move the cursor to the end
    pub fn set_input(&mut self, value: impl Into<String>) {
        self.state.content = value.into();
        self.state.cursor_position = self.state.char_len();
    }

    /// Keep the cursor valid after the backing value changed underneath
    pub fn sync_cursor(&mut self) {
        self.state.cursor_position = self.state.cursor_position.min(self.state.char_len());
        if self.state.content.is_empty() {
            self.close_command_palette();
        }
    }

    pub fn is_empty(&self) -> bool {
        self.state.content.is_empty()
    }

    pub fn clear(&mut self) {
        self.state.content.clear();
        self.state.cursor_position = 0;
        self.close_command_palette();
    }
}

impl Widget for &ConversationComposer {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let title = if self.busy {
            "✍️  Message (waiting for reply…)"
        } else {
            "✍️  Message"
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .title(title)
            .style(Style::default().fg(if self.busy { Color::Gray } else { Color::Green }));

        let inner_area = block.inner(area);
        block.render(area, buf);

        if self.state.content.is_empty() {
            let placeholder_line = Line::from(vec![Span::styled(
                self.placeholder.as_str(),
                Style::default().fg(Color::DarkGray),
            )]);
            buf.set_line(inner_area.x, inner_area.y, &placeholder_line, inner_area.width);
        } else {
            let mut content = self.state.content.clone();
            content.insert(self.state.byte_index(self.state.cursor_position), '▌');

            for (i, line_text) in content.split('\n').enumerate() {
                if i < inner_area.height as usize {
                    let line = Line::from(vec![Span::raw(line_text)]);
                    buf.set_line(inner_area.x, inner_area.y + i as u16, &line, inner_area.width);
                }
            }
        }

        if self.show_command_palette && !self.filtered_commands.is_empty() {
            let palette_height = (self.filtered_commands.len().min(5) + 2) as u16;
            let palette_area = Rect {
                x: inner_area.x,
                y: area.y.saturating_sub(palette_height),
                width: inner_area.width,
                height: palette_height.min(area.y),
            };
            if palette_area.height < 3 {
                return;
            }

            let block = Block::default()
                .borders(Borders::ALL)
                .title("Commands")
                .style(Style::default().fg(Color::Blue));
            let inner = block.inner(palette_area);
            block.render(palette_area, buf);

            for (index, entry) in self.filtered_commands.iter().enumerate() {
                if index >= inner.height as usize {
                    break;
                }

                let style = if self.selected_command == Some(index) {
                    Style::default().fg(Color::Black).bg(Color::Cyan).add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(Color::White)
                };

                let line = Line::from(vec![
                    Span::styled(format!("/{}", entry.keyword), style),
                    Span::styled(" - ", Style::default().fg(Color::DarkGray)),
                    Span::styled(entry.description, Style::default().fg(Color::Gray)),
                ]);

                buf.set_line(inner.x, inner.y + index as u16, &line, inner.width);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::conversation::commands::SlashCommand;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_text(composer: &mut ConversationComposer, text: &str) {
        for c in text.chars() {
            composer.handle_key(key(KeyCode::Char(c)));
        }
    }

    #[test]
    fn enter_submits_without_clearing() {
        let mut composer = ConversationComposer::new("Send a message");
        type_text(&mut composer, "Plan a trip");

        assert_eq!(composer.handle_key(key(KeyCode::Enter)), ComposerResult::Submitted);
        assert_eq!(composer.input(), "Plan a trip");
    }

    #[test]
    fn enter_on_blank_input_does_nothing() {
        let mut composer = ConversationComposer::new("Send a message");
        type_text(&mut composer, "   ");
        assert_eq!(composer.handle_key(key(KeyCode::Enter)), ComposerResult::None);
    }

    #[test]
    fn shift_enter_inserts_newline() {
        let mut composer = ConversationComposer::new("");
        type_text(&mut composer, "a");
        composer.handle_key(KeyEvent::new(KeyCode::Enter, KeyModifiers::SHIFT));
        type_text(&mut composer, "b");
        assert_eq!(composer.input(), "a\nb");
    }

    #[test]
    fn editing_handles_multibyte_characters() {
        let mut composer = ConversationComposer::new("");
        type_text(&mut composer, "héllo");
        composer.handle_key(key(KeyCode::Left));
        composer.handle_key(key(KeyCode::Backspace));
        assert_eq!(composer.input(), "hélo");
        composer.handle_key(key(KeyCode::Home));
        composer.handle_key(key(KeyCode::Delete));
        assert_eq!(composer.input(), "élo");
    }

    #[test]
    fn typed_command_is_parsed_and_cleared() {
        let mut composer = ConversationComposer::new("");
        type_text(&mut composer, "/new");
        composer.handle_key(key(KeyCode::Esc));

        let result = composer.handle_key(key(KeyCode::Enter));

        assert_eq!(
            result,
            ComposerResult::Command(ParsedCommand { command: SlashCommand::New, argument: None })
        );
        assert!(composer.is_empty());
    }

    #[test]
    fn palette_selection_runs_command() {
        let mut composer = ConversationComposer::new("");
        type_text(&mut composer, "/");
        assert!(composer.show_command_palette);
        assert_eq!(composer.filtered_commands.len(), command_entries().len());

        type_text(&mut composer, "b");
        // "bottom" and "bye"
        assert_eq!(composer.filtered_commands.len(), 2);
        composer.handle_key(key(KeyCode::Down));

        let result = composer.handle_key(key(KeyCode::Enter));
        assert_eq!(
            result,
            ComposerResult::Command(ParsedCommand { command: SlashCommand::Bye, argument: None })
        );
        assert!(!composer.show_command_palette);
    }

    #[test]
    fn unknown_slash_word_is_submitted_as_text() {
        let mut composer = ConversationComposer::new("");
        type_text(&mut composer, "/usr");
        assert!(composer.show_command_palette);
        assert!(composer.filtered_commands.is_empty());

        assert_eq!(composer.handle_key(key(KeyCode::Enter)), ComposerResult::Submitted);
        assert_eq!(composer.input(), "/usr");
        assert!(!composer.show_command_palette);
    }

    #[test]
    fn set_input_moves_cursor_to_end() {
        let mut composer = ConversationComposer::new("");
        composer.set_input("Analyze a dataset");
        type_text(&mut composer, "!");
        assert_eq!(composer.input(), "Analyze a dataset!");
    }
}
