use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::Widget,
};

/// One-line "responding" indicator shown above the composer while a reply
/// streams. Animation is driven by the panel's tick counter.
#[derive(Debug, Clone, Copy)]
pub struct RespondingIndicator {
    active: bool,
    frame: usize,
}

impl RespondingIndicator {
    pub fn new(active: bool, frame: usize) -> Self {
        Self { active, frame }
    }

    fn dots(&self) -> &'static str {
        match self.frame % 4 {
            0 => ".",
            1 => "..",
            2 => "...",
            _ => "   ",
        }
    }
}

impl Widget for RespondingIndicator {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if !self.active || area.height == 0 {
            return;
        }

        let indicator = Line::from(vec![
            Span::styled("🤖 ", Style::default().fg(Color::Green)),
            Span::styled("Assistant is responding", Style::default().fg(Color::Green)),
            Span::styled(self.dots(), Style::default().fg(Color::Yellow)),
        ]);
        buf.set_line(area.x, area.y, &indicator, area.width);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rendered(indicator: RespondingIndicator) -> String {
        let area = Rect::new(0, 0, 40, 1);
        let mut buf = Buffer::empty(area);
        indicator.render(area, &mut buf);
        buf.content().iter().map(|cell| cell.symbol()).collect()
    }

    #[test]
    fn idle_indicator_draws_nothing() {
        assert!(rendered(RespondingIndicator::new(false, 0)).trim().is_empty());
    }

    #[test]
    fn active_indicator_animates_dots() {
        assert!(rendered(RespondingIndicator::new(true, 2)).contains("responding..."));
        assert!(!rendered(RespondingIndicator::new(true, 0)).contains("responding.."));
    }
}
