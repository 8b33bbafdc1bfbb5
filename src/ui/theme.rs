use ratatui::style::{Color, Modifier, Style};

use crate::host::BuildPhase;

/// Style table for the whole UI. With colors off (`--color never`, or auto
/// on a dumb terminal) every style collapses to the terminal default.
#[derive(Debug, Clone, Copy)]
pub struct Theme {
    enabled: bool,
}

impl Theme {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn colors_enabled(&self) -> bool {
        self.enabled
    }

    fn style(&self, style: Style) -> Style {
        if self.enabled {
            style
        } else {
            Style::default()
        }
    }

    pub fn title(&self) -> Style {
        self.style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
    }

    pub fn header(&self) -> Style {
        self.style(Style::default().fg(Color::Cyan))
    }

    pub fn footer(&self) -> Style {
        self.style(Style::default().fg(Color::DarkGray))
    }

    pub fn border(&self) -> Style {
        self.style(Style::default().fg(Color::DarkGray))
    }

    pub fn border_focused(&self) -> Style {
        self.style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
    }

    pub fn selected(&self) -> Style {
        if self.enabled {
            Style::default()
                .bg(Color::DarkGray)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().add_modifier(Modifier::REVERSED)
        }
    }

    pub fn output(&self) -> Style {
        Style::default()
    }

    pub fn error(&self) -> Style {
        self.style(
            Style::default()
                .fg(Color::Red)
                .add_modifier(Modifier::BOLD),
        )
    }

    pub fn countdown(&self) -> Style {
        self.style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )
    }

    pub fn progress(&self) -> Style {
        self.style(Style::default().fg(Color::Green))
    }

    pub fn help_key(&self) -> Style {
        self.style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
    }

    pub fn help_desc(&self) -> Style {
        self.style(Style::default().fg(Color::White))
    }

    pub fn phase(&self, phase: BuildPhase) -> Style {
        let style = match phase {
            BuildPhase::Queued => Style::default().fg(Color::DarkGray),
            BuildPhase::Connecting => Style::default().fg(Color::Yellow),
            BuildPhase::Preparing => Style::default().fg(Color::Yellow),
            BuildPhase::Configure => Style::default().fg(Color::Cyan),
            BuildPhase::Make => Style::default().fg(Color::Cyan),
            BuildPhase::Check => Style::default().fg(Color::Magenta),
            BuildPhase::Install => Style::default().fg(Color::Blue),
            BuildPhase::Completed => Style::default()
                .fg(Color::Green)
                .add_modifier(Modifier::BOLD),
            BuildPhase::Failed => Style::default()
                .fg(Color::Red)
                .add_modifier(Modifier::BOLD),
        };
        self.style(style)
    }
}
