use std::time::Instant;

use ratatui::layout::Rect;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

use crate::app::App;
use crate::host::HostState;
use crate::text::{format_duration, sanitize, truncate};

/// One host's box in the grid: status title, a progress line, and the tail
/// (or scrolled window) of its output.
pub fn render_tile(f: &mut Frame, app: &App, idx: usize, rect: Rect, focused: bool, now: Instant) {
    let theme = app.theme();
    let host = &app.hosts()[idx];

    let border_style = if focused {
        theme.border_focused()
    } else {
        theme.border()
    };
    let title = Line::from(vec![
        Span::styled(format!(" {} ", host.key), theme.title()),
        Span::styled(
            format!("[{}] {} ", host.phase, host.phase.symbol()),
            theme.phase(host.phase),
        ),
    ]);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style)
        .title(title);
    let inner = block.inner(rect);
    f.render_widget(block, rect);
    if inner.height == 0 || inner.width == 0 {
        return;
    }

    let mut lines = Vec::with_capacity(inner.height as usize);
    lines.push(status_line(app, idx, host, now));

    let log_rows = inner.height.saturating_sub(1) as usize;
    let width = inner.width as usize;
    for raw in window(host, log_rows) {
        lines.push(Line::from(Span::styled(
            truncate(&sanitize(raw), width),
            theme.output(),
        )));
    }

    f.render_widget(Paragraph::new(lines), inner);
}

/// A completed host collapsed into the bottom band.
pub fn render_minimized_row(f: &mut Frame, app: &App, idx: usize, rect: Rect, now: Instant) {
    let theme = app.theme();
    let host = &app.hosts()[idx];
    let duration = host
        .elapsed(now)
        .map(|d| format_duration(d.as_secs_f64()))
        .unwrap_or_else(|| "unknown".to_string());
    let line = Line::from(vec![
        Span::styled(
            format!(" {} {} ", host.phase.symbol(), host.key),
            theme.phase(host.phase),
        ),
        Span::styled(format!("{} in {}", host.phase, duration), theme.footer()),
    ]);
    f.render_widget(Paragraph::new(line), rect);
}

fn status_line<'a>(app: &App, idx: usize, host: &'a HostState, now: Instant) -> Line<'a> {
    let theme = app.theme();
    let mut spans = Vec::new();

    if let Some(elapsed) = host.elapsed(now) {
        spans.push(Span::styled(
            format!("{} ", format_duration(elapsed.as_secs_f64())),
            theme.header(),
        ));
    }
    if let Some(est) = app.estimate_for(idx, now) {
        spans.push(Span::styled(
            format!(
                "{:.0}% (~{} left)",
                est.fraction * 100.0,
                format_duration(est.remaining_secs)
            ),
            theme.progress(),
        ));
    }
    if let Some(err) = &host.error {
        let label = host
            .error_kind
            .map(|k| format!("[{}] ", k.label()))
            .unwrap_or_default();
        spans.push(Span::styled(
            format!("{}{}", label, truncate(&sanitize(err), 120)),
            theme.error(),
        ));
    }
    if spans.is_empty() {
        spans.push(Span::styled("waiting...", theme.footer()));
    }
    Line::from(spans)
}

/// The slice of the buffer to show: the scrolled window when the user has
/// scrolled, otherwise the tail.
fn window(host: &HostState, rows: usize) -> Vec<&str> {
    match host.scroll {
        Some(top) => host.buffer.snapshot(top, rows),
        None => host.buffer.tail(rows),
    }
}
