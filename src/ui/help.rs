use ratatui::layout::{Constraint, Flex, Layout, Rect};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};
use ratatui::Frame;

use crate::ui::theme::Theme;

const BINDINGS: &[(&str, &str)] = &[
    ("Up / Down", "Focus prev/next visible host"),
    ("Left / Right", "Focus prev/next host (incl. completed)"),
    ("Enter", "Full-screen view of focused host"),
    ("Tab", "Open host menu"),
    ("PgUp / PgDn", "Scroll focused host's log"),
    ("m", "Toggle minimized band"),
    ("", ""),
    ("Log scroll", ""),
    ("Up / Down", "Scroll one line"),
    ("Home / End", "Jump to top / bottom"),
    ("Esc", "Back to host navigation"),
    ("", ""),
    ("Menu", ""),
    ("1-9", "Jump to nth host"),
    ("Enter", "Select host"),
    ("Esc", "Close menu"),
    ("", ""),
    ("q", "Quit"),
    ("h", "Toggle this help"),
];

pub fn render(f: &mut Frame, area: Rect, theme: &Theme) {
    let popup_width = 56;
    let popup_height = (BINDINGS.len() as u16) + 2;
    let popup_area = centered_rect(popup_width, popup_height, area);

    f.render_widget(Clear, popup_area);

    let lines: Vec<Line> = BINDINGS
        .iter()
        .map(|(key, desc)| {
            if key.is_empty() && desc.is_empty() {
                Line::from("")
            } else if desc.is_empty() {
                Line::from(Span::styled(format!("  -- {} --", key), theme.footer()))
            } else {
                Line::from(vec![
                    Span::styled(format!("  {:<14}", key), theme.help_key()),
                    Span::styled(*desc, theme.help_desc()),
                ])
            }
        })
        .collect();

    let help = Paragraph::new(lines).block(
        Block::default()
            .title(" Keys ")
            .borders(Borders::ALL)
            .border_style(theme.border_focused()),
    );
    f.render_widget(help, popup_area);
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let vertical = Layout::vertical([Constraint::Length(height)])
        .flex(Flex::Center)
        .split(area);
    let horizontal = Layout::horizontal([Constraint::Length(width)])
        .flex(Flex::Center)
        .split(vertical[0]);
    horizontal[0]
}
