use std::time::Instant;

use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};
use ratatui::Frame;

use crate::app::App;
use crate::layout::menu_rect;
use crate::text::{format_duration, truncate};

/// Host-selection overlay: every host, visible or hidden, with its status.
/// The grid underneath is left as-is.
pub fn render(f: &mut Frame, app: &App, now: Instant) {
    let theme = app.theme();
    let area = f.area();
    let rect = menu_rect(area.width, area.height);
    if rect.height < 3 || rect.width < 10 {
        return;
    }

    f.render_widget(Clear, rect);

    let name_col = (rect.width as usize).saturating_sub(30).max(12);
    let rows = rect.height.saturating_sub(2) as usize;
    let cursor = app.menu_cursor();

    // Keep the cursor inside the visible window when the list is long.
    let first = cursor.saturating_sub(rows.saturating_sub(1));

    let lines: Vec<Line> = app
        .hosts()
        .iter()
        .enumerate()
        .skip(first)
        .take(rows)
        .map(|(i, host)| {
            let selected = i == cursor;
            let duration = host
                .elapsed(now)
                .map(|d| format_duration(d.as_secs_f64()))
                .unwrap_or_else(|| "-".to_string());
            let number = if i < 9 {
                format!("{} ", i + 1)
            } else {
                "  ".to_string()
            };
            let row = format!(
                " {}{} {:<name_col$} {:<10} {}",
                number,
                host.phase.symbol(),
                truncate(&host.key, name_col),
                host.phase.label(),
                duration,
            );
            if selected {
                Line::from(Span::styled(row, theme.selected()))
            } else {
                Line::from(vec![Span::styled(row, theme.phase(host.phase))])
            }
        })
        .collect();

    let block = Block::default()
        .title(" All Hosts [↑/↓ move  1-9 jump  Enter select  Esc close] ")
        .borders(Borders::ALL)
        .border_style(theme.border_focused());
    f.render_widget(Paragraph::new(lines).block(block), rect);
}
