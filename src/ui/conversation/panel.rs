//! The chat panel: composes the submission controller, onboarding
//! affordances, share flow and scroll anchor into one screen.

use std::sync::Arc;
use std::time::Duration;

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Widget, Wrap},
};
use tokio::time::Instant;

use crate::agent::AgentAction;
use crate::config::Config;
use crate::conversation::{ConversationIdentity, ConversationLog};
use crate::error::SubmitError;
use crate::events::{Notice, NoticeLevel, TuiEvent};
use crate::session::{ChatSession, Session};
use crate::share::{ShareDialog, ShareGate, ShareService};
use crate::ui::conversation::affordances::EphemeralAffordances;
use crate::ui::conversation::commands::{get_help_text, ParsedCommand, SlashCommand};
use crate::ui::conversation::composer::{ComposerResult, ConversationComposer};
use crate::ui::conversation::history::{DisplayList, HistoryView};
use crate::ui::conversation::scroll::{ScrollAnchor, ScrollState, ScrollToBottomButton};
use crate::ui::conversation::streaming::RespondingIndicator;
use crate::ui::conversation::submission::{Progress, SubmissionController, SubmitOutcome};

const PAGE_LINES: usize = 10;

/// What the event loop should do after the panel handled an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelAction {
    None,
    Exit,
}

struct ActiveNotice {
    notice: Notice,
    expires_at: Instant,
}

pub struct ChatPanel {
    controller: SubmissionController,
    affordances: EphemeralAffordances,
    share_dialog: ShareDialog,
    share_service: Arc<dyn ShareService>,
    scroll: ScrollState,
    composer: ConversationComposer,
    notices: Vec<ActiveNotice>,
    notice_ttl: Duration,
    show_help: bool,
    frame: usize,
}

impl ChatPanel {
    /// Mount the panel. Arms the onboarding timer, so it must run inside a
    /// tokio runtime.
    pub fn new(
        config: &Config,
        session: Session,
        agent: Arc<dyn AgentAction>,
        share_service: Arc<dyn ShareService>,
    ) -> Self {
        let chat = ChatSession::new(Some(session), ConversationIdentity::default());
        Self {
            controller: SubmissionController::new(chat, agent),
            affordances: EphemeralAffordances::mount(
                config.onboarding_timeout(),
                config.ui.example_prompts.clone(),
            ),
            share_dialog: ShareDialog::new(),
            share_service,
            scroll: ScrollState::new(),
            composer: ConversationComposer::new("Send a message... (/help for commands)"),
            notices: Vec::new(),
            notice_ttl: config.notice_ttl(),
            show_help: false,
            frame: 0,
        }
    }

    pub fn messages(&self) -> &DisplayList {
        self.controller.messages()
    }

    /// Canonical conversation log sent to the agent
    pub fn ai_messages(&self) -> &ConversationLog {
        self.controller.log()
    }

    pub fn identity(&self) -> &ConversationIdentity {
        self.controller.identity()
    }

    pub fn is_at_bottom(&self) -> bool {
        self.scroll.is_at_bottom()
    }

    pub fn scroll_to_bottom(&mut self) {
        ScrollToBottomButton::activate(&mut self.scroll);
    }

    pub fn input(&self) -> &str {
        self.composer.input()
    }

    pub fn set_input(&mut self, value: impl Into<String>) {
        self.composer.set_input(value);
    }

    pub fn is_shareable(&self) -> bool {
        ShareGate::is_shareable(self.controller.chat())
    }

    pub fn share_dialog(&self) -> &ShareDialog {
        &self.share_dialog
    }

    pub fn is_busy(&self) -> bool {
        self.controller.is_busy()
    }

    /// A reply stream is waiting to be polled
    pub fn has_pending(&self) -> bool {
        self.controller.has_pending()
    }

    /// Visible toasts, oldest first
    pub fn notices(&self) -> impl Iterator<Item = &Notice> {
        self.notices.iter().map(|active| &active.notice)
    }

    /// Apply the next streamed increment. Cancel-safe.
    pub async fn next_increment(&mut self) -> Option<Progress> {
        let progress = self.controller.next_increment().await;
        self.collect_notices();
        self.composer.set_busy(self.controller.is_busy());
        progress
    }

    pub async fn handle_event(&mut self, event: TuiEvent) -> PanelAction {
        match event {
            TuiEvent::Key(key) => self.handle_key(key).await,
            TuiEvent::Paste(text) => {
                self.composer.paste(&text);
                PanelAction::None
            }
            TuiEvent::Resize(_, _) => PanelAction::None,
            TuiEvent::Tick => {
                self.tick();
                PanelAction::None
            }
        }
    }

    /// Advance the animation frame and drop expired toasts
    pub fn tick(&mut self) {
        self.frame = self.frame.wrapping_add(1);
        let now = Instant::now();
        self.notices.retain(|active| active.expires_at > now);
    }

    pub async fn handle_key(&mut self, key: KeyEvent) -> PanelAction {
        if key.kind != KeyEventKind::Press {
            return PanelAction::None;
        }
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

        if ctrl && key.code == KeyCode::Char('c') {
            return PanelAction::Exit;
        }

        if self.show_help {
            self.show_help = false;
            return PanelAction::None;
        }

        if self.share_dialog.is_open() {
            match key.code {
                KeyCode::Enter => self.confirm_share().await,
                KeyCode::Esc => self.share_dialog.dismiss(),
                _ => {}
            }
            return PanelAction::None;
        }

        match key.code {
            KeyCode::Char('s') if ctrl => {
                self.open_share();
                return PanelAction::None;
            }
            KeyCode::End if ctrl => {
                self.scroll_to_bottom();
                return PanelAction::None;
            }
            KeyCode::PageUp => {
                self.scroll.scroll_up(PAGE_LINES);
                return PanelAction::None;
            }
            KeyCode::PageDown => {
                self.scroll.scroll_down(PAGE_LINES);
                return PanelAction::None;
            }
            KeyCode::Char(c @ '1'..='9') if self.composer.is_empty() => {
                let index = c as usize - '1' as usize;
                let picked = self
                    .affordances
                    .pick_example(index, self.messages().len())
                    .map(|prompt| prompt.composer_text().to_string());
                if let Some(text) = picked {
                    self.composer.set_input(text);
                    return PanelAction::None;
                }
            }
            _ => {}
        }

        match self.composer.handle_key(key) {
            ComposerResult::Submitted => {
                self.submit_input().await;
                PanelAction::None
            }
            ComposerResult::Command(command) => self.run_command(command).await,
            ComposerResult::None => PanelAction::None,
        }
    }

    /// Submit whatever is in the composer
    pub async fn submit_input(&mut self) {
        match self.controller.submit(self.composer.input_mut()).await {
            Ok(SubmitOutcome::Ignored) => {}
            Ok(outcome) => {
                tracing::debug!(?outcome, "submission dispatched");
                self.scroll_to_bottom();
            }
            Err(SubmitError::Busy) => {
                self.push_notice(Notice::info("Still waiting for the current reply"));
            }
            Err(error) => {
                self.push_notice(Notice::error(error.to_string()));
            }
        }
        self.composer.sync_cursor();
        self.composer.set_busy(self.controller.is_busy());
        self.collect_notices();
    }

    async fn run_command(&mut self, command: ParsedCommand) -> PanelAction {
        tracing::debug!(command = command.command.command(), "slash command");
        match command.command {
            SlashCommand::Share => self.open_share(),
            SlashCommand::New => {
                self.controller.new_conversation();
                self.share_dialog.dismiss();
                self.scroll_to_bottom();
                self.composer.set_busy(false);
                self.push_notice(Notice::info("Started a new conversation"));
            }
            SlashCommand::Bottom => self.scroll_to_bottom(),
            SlashCommand::Help => self.show_help = true,
            SlashCommand::Bye => return PanelAction::Exit,
        }
        PanelAction::None
    }

    fn open_share(&mut self) {
        if self.is_shareable() {
            self.share_dialog.open();
        } else {
            self.push_notice(Notice::info("Nothing to share yet"));
        }
    }

    async fn confirm_share(&mut self) {
        let snapshot = match ShareGate::package_for_share(self.controller.chat()) {
            Ok(snapshot) => snapshot,
            Err(error) => {
                self.share_dialog.dismiss();
                self.push_notice(Notice::error(error.to_string()));
                return;
            }
        };

        match self.share_dialog.share(&snapshot, self.share_service.as_ref()).await {
            Ok(result) => self.push_notice(Notice::success(format!("Share link: {}", result.url))),
            Err(error) => self.push_notice(Notice::error(format!("Sharing failed: {error}"))),
        }
    }

    fn collect_notices(&mut self) {
        for notice in self.controller.take_notices() {
            self.push_notice(notice);
        }
    }

    fn push_notice(&mut self, notice: Notice) {
        self.notices.push(ActiveNotice {
            notice,
            expires_at: Instant::now() + self.notice_ttl,
        });
    }

    /// End the session; late increments are discarded and the onboarding
    /// timer is released when the panel is dropped.
    pub fn teardown(&mut self) {
        self.controller.teardown();
    }

    fn render_onboarding(&self, area: Rect, buf: &mut Buffer) {
        let messages_len = self.messages().len();
        let mut lines = Vec::new();

        if self.affordances.logo_visible(messages_len) {
            lines.push(Line::from(Span::styled(
                "chatdeck",
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            )));
            lines.push(Line::from(Span::styled(
                "Ask anything to get started.",
                Style::default().fg(Color::Gray),
            )));
            lines.push(Line::from(""));
        }

        if self.affordances.example_prompts_visible(messages_len) {
            for (index, prompt) in self.affordances.example_prompts().iter().enumerate() {
                let mut spans = vec![
                    Span::styled(format!("[{}] ", index + 1), Style::default().fg(Color::Yellow)),
                    Span::styled(prompt.heading.clone(), Style::default().add_modifier(Modifier::BOLD)),
                ];
                if !prompt.subheading.is_empty() {
                    spans.push(Span::styled(
                        format!("  {}", prompt.subheading),
                        Style::default().fg(Color::DarkGray),
                    ));
                }
                lines.push(Line::from(spans));
            }
        }

        if !lines.is_empty() {
            Paragraph::new(lines).render(area, buf);
        }
    }

    fn render_status(&self, area: Rect, buf: &mut Buffer) {
        let line = match self.notices.last() {
            Some(active) => {
                let color = match active.notice.level {
                    NoticeLevel::Info => Color::Cyan,
                    NoticeLevel::Success => Color::Green,
                    NoticeLevel::Error => Color::Red,
                };
                Line::from(Span::styled(active.notice.message.clone(), Style::default().fg(color)))
            }
            None => {
                let mut spans = vec![Span::styled("/help commands", Style::default().fg(Color::DarkGray))];
                if self.is_shareable() {
                    spans.push(Span::styled("  ·  ", Style::default().fg(Color::DarkGray)));
                    spans.push(Span::styled("Ctrl+S share", Style::default().fg(Color::Cyan)));
                }
                Line::from(spans)
            }
        };
        buf.set_line(area.x, area.y, &line, area.width);
    }

    fn render_share_dialog(&self, area: Rect, buf: &mut Buffer) {
        let popup = centered_rect(area, 50, 7);
        Clear.render(popup, buf);

        let title = self.identity().title.clone().unwrap_or_default();
        let lines = vec![
            Line::from(Span::styled(
                format!("Share \"{title}\""),
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from("Anyone with the link can read this conversation."),
            Line::from(""),
            Line::from(Span::styled(
                "Enter create link · Esc cancel",
                Style::default().fg(Color::DarkGray),
            )),
        ];
        Paragraph::new(lines)
            .wrap(Wrap { trim: true })
            .block(Block::default().borders(Borders::ALL).title("🔗 Share"))
            .render(popup, buf);
    }

    fn render_help(&self, area: Rect, buf: &mut Buffer) {
        let help = get_help_text();
        let popup = centered_rect(area, 70, help.lines().count() as u16 + 2);
        Clear.render(popup, buf);
        Paragraph::new(help)
            .wrap(Wrap { trim: false })
            .block(Block::default().borders(Borders::ALL).title("Help (any key to close)"))
            .render(popup, buf);
    }
}

impl Widget for &ChatPanel {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(5),    // History
                Constraint::Length(1), // Responding indicator
                Constraint::Length(3), // Composer
                Constraint::Length(1), // Status / toasts
            ])
            .split(area);

        HistoryView::new(self.messages(), &self.scroll).render(chunks[0], buf);

        let history_inner = Block::default().borders(Borders::ALL).inner(chunks[0]);
        if self.messages().is_empty() {
            self.render_onboarding(history_inner, buf);
        }

        if history_inner.height > 0 {
            let cta_area = Rect {
                y: history_inner.y + history_inner.height - 1,
                height: 1,
                ..history_inner
            };
            ScrollToBottomButton::new(&self.scroll).render(cta_area, buf);
        }

        RespondingIndicator::new(self.is_busy(), self.frame).render(chunks[1], buf);
        (&self.composer).render(chunks[2], buf);
        self.render_status(chunks[3], buf);

        if self.share_dialog.is_open() {
            self.render_share_dialog(area, buf);
        }
        if self.show_help {
            self.render_help(area, buf);
        }
    }
}

fn centered_rect(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}
