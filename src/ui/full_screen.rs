use std::time::Instant;

use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

use crate::app::App;
use crate::layout::full_screen_rect;
use crate::text::{format_duration, sanitize, truncate};

/// The focused host filling everything between header and footer.
pub fn render(f: &mut Frame, app: &App, now: Instant) {
    let theme = app.theme();
    let host = &app.hosts()[app.focus()];
    let area = f.area();
    let rect = full_screen_rect(area.width, area.height);
    if rect.height == 0 {
        return;
    }

    let mut title_spans = vec![
        Span::styled(format!(" {} ", host.key), theme.title()),
        Span::styled(
            format!("[{}] {} ", host.phase, host.phase.symbol()),
            theme.phase(host.phase),
        ),
    ];
    if let Some(elapsed) = host.elapsed(now) {
        title_spans.push(Span::styled(
            format!("{} ", format_duration(elapsed.as_secs_f64())),
            theme.header(),
        ));
    }
    if let Some(est) = app.estimate_for(app.focus(), now) {
        title_spans.push(Span::styled(
            format!(
                "{:.0}% (~{} left) ",
                est.fraction * 100.0,
                format_duration(est.remaining_secs)
            ),
            theme.progress(),
        ));
    }
    if let Some(code) = host.exit_code {
        title_spans.push(Span::styled(format!("exit {} ", code), theme.footer()));
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(theme.border_focused())
        .title(Line::from(title_spans))
        .title_bottom(Line::from(Span::styled(
            scroll_label(host),
            theme.footer(),
        )));
    let inner = block.inner(rect);
    f.render_widget(block, rect);
    if inner.height == 0 || inner.width == 0 {
        return;
    }

    let rows = inner.height as usize;
    let width = inner.width as usize;
    let window = match host.scroll {
        Some(top) => host.buffer.snapshot(top, rows),
        None => host.buffer.tail(rows),
    };
    let mut lines: Vec<Line> = window
        .iter()
        .map(|raw| Line::from(Span::styled(truncate(&sanitize(raw), width), theme.output())))
        .collect();
    if let Some(err) = &host.error {
        lines.push(Line::from(Span::styled(
            truncate(&sanitize(err), width),
            theme.error(),
        )));
    }
    f.render_widget(Paragraph::new(lines), inner);
}

fn scroll_label(host: &crate::host::HostState) -> String {
    let end = host.buffer.end_index();
    match host.scroll {
        Some(top) => format!(" line {}/{} ", top + 1, end),
        None => format!(" {} lines ", end),
    }
}
