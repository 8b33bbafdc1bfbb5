mod full_screen;
mod help;
mod menu;
pub mod theme;
mod tile;

use std::time::Instant;

use ratatui::layout::Rect;
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;

use crate::app::App;
use crate::input::NavMode;
use crate::layout::GridLayout;

/// Draw one frame from the controller's current state. Pure with respect to
/// its inputs; ratatui's buffer diffing writes only changed cells.
pub fn render(f: &mut Frame, app: &App, layout: &GridLayout, now: Instant) {
    match app.nav_mode() {
        NavMode::HostNav | NavMode::LogScroll => {
            render_header(f, app, layout.header, now);
            for (idx, rect) in &layout.tiles {
                tile::render_tile(f, app, *idx, *rect, *idx == app.focus(), now);
            }
            for (idx, rect) in &layout.minimized {
                tile::render_minimized_row(f, app, *idx, *rect, now);
            }
            render_footer(f, app, layout.footer, now);
        }
        NavMode::FullScreen => {
            render_header(f, app, layout.header, now);
            full_screen::render(f, app, now);
            render_footer(f, app, layout.footer, now);
        }
        NavMode::Menu => {
            render_header(f, app, layout.header, now);
            for (idx, rect) in &layout.tiles {
                tile::render_tile(f, app, *idx, *rect, *idx == app.focus(), now);
            }
            for (idx, rect) in &layout.minimized {
                tile::render_minimized_row(f, app, *idx, *rect, now);
            }
            render_footer(f, app, layout.footer, now);
            menu::render(f, app, now);
        }
    }

    if app.help_visible() {
        help::render(f, f.area(), &app.theme());
    }
}

fn render_header(f: &mut Frame, app: &App, area: Rect, now: Instant) {
    if area.height == 0 {
        return;
    }
    let theme = app.theme();
    let stats = app.stats(now);

    let title = Line::from(vec![
        Span::styled(" redland-forge ", theme.title()),
        Span::styled(
            format!(
                "— {} hosts: {} queued, {}",
                stats.total,
                stats.queued,
                stats.status_line()
            ),
            theme.header(),
        ),
    ]);
    f.render_widget(Paragraph::new(title), Rect { height: 1, ..area });

    if area.height >= 2 {
        let mut spans = vec![Span::styled(
            format!(" Progress: {}", stats.progress_line()),
            theme.progress(),
        )];
        if let Some(countdown) = app.countdown(now) {
            spans.push(Span::raw("  "));
            spans.push(Span::styled(countdown, theme.countdown()));
        }
        let second = Rect {
            y: area.y + 1,
            height: 1,
            ..area
        };
        f.render_widget(Paragraph::new(Line::from(spans)), second);
    }
}

fn render_footer(f: &mut Frame, app: &App, area: Rect, now: Instant) {
    if area.height == 0 {
        return;
    }
    let theme = app.theme();
    let hints = match app.nav_mode() {
        NavMode::HostNav => " ↑/↓ focus  ←/→ all hosts  Enter full-screen  Tab menu  m minimize  h help  q quit",
        NavMode::LogScroll => " ↑/↓ PgUp/PgDn scroll  Home/End top/bottom  Esc back  q quit",
        NavMode::FullScreen => " PgUp/PgDn scroll  Home/End top/bottom  Enter/Esc back  q quit",
        NavMode::Menu => " ↑/↓ move  1-9 jump  Enter select  Esc close  q quit",
    };

    let mut spans = vec![Span::styled(hints, theme.footer())];
    if let Some(countdown) = app.countdown(now) {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(countdown, theme.countdown()));
    }
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}
