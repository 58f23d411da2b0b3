//! Bottom anchoring for the history view.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Widget,
};
use std::cell::Cell;

/// Capability consumed by the panel: where the view is, and how to pin it.
pub trait ScrollAnchor {
    fn is_at_bottom(&self) -> bool;
    fn scroll_to_bottom(&mut self);
}

/// Line-based scroll position measured from the bottom of the history.
///
/// `offset == 0` means the newest line is visible. The renderer reports the
/// largest reachable offset back through `max_offset` so that scrolling up
/// past the first line is clamped on the next frame.
#[derive(Debug, Default)]
pub struct ScrollState {
    offset: Cell<usize>,
    max_offset: Cell<usize>,
}

impl ScrollState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn offset(&self) -> usize {
        self.offset.get()
    }

    pub fn scroll_up(&mut self, lines: usize) {
        let next = self.offset.get().saturating_add(lines).min(self.max_offset.get());
        self.offset.set(next);
    }

    pub fn scroll_down(&mut self, lines: usize) {
        self.offset.set(self.offset.get().saturating_sub(lines));
    }

    /// Record how far the current content can scroll and clamp to it.
    pub fn set_max_offset(&self, max: usize) {
        self.max_offset.set(max);
        if self.offset.get() > max {
            self.offset.set(max);
        }
    }
}

impl ScrollAnchor for ScrollState {
    fn is_at_bottom(&self) -> bool {
        self.offset.get() == 0
    }

    fn scroll_to_bottom(&mut self) {
        self.offset.set(0);
    }
}

/// Call-to-action shown while the history is scrolled away from the tail.
///
/// Holds nothing but the forwarded flag.
pub struct ScrollToBottomButton {
    is_at_bottom: bool,
}

impl ScrollToBottomButton {
    pub fn new(anchor: &dyn ScrollAnchor) -> Self {
        Self { is_at_bottom: anchor.is_at_bottom() }
    }

    pub fn visible(&self) -> bool {
        !self.is_at_bottom
    }

    /// Forward an activation to the anchor.
    pub fn activate(anchor: &mut dyn ScrollAnchor) {
        anchor.scroll_to_bottom();
    }
}

impl Widget for ScrollToBottomButton {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if !self.visible() || area.height == 0 {
            return;
        }

        let label = " ↓ Scroll to bottom (Ctrl+End) ";
        let width = (label.chars().count() as u16).min(area.width);
        let x = area.x + area.width.saturating_sub(width);
        let line = Line::from(vec![Span::styled(
            label,
            Style::default()
                .fg(Color::Black)
                .bg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )]);
        buf.set_line(x, area.y, &line, width);
    }
}
