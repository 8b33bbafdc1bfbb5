use std::time::{Duration, Instant};

pub const DEFAULT_EXIT_DELAY_SECS: u64 = 300;

/// Deadline-based auto-exit. No background timer: the controller's tick
/// compares the armed deadline against `now`. The deadline is (re)armed on
/// every terminal host event while all hosts are terminal, and cleared
/// otherwise, so late-finishing hosts push the exit out.
#[derive(Debug)]
pub struct AutoExit {
    delay: Duration,
    enabled: bool,
    deadline: Option<Instant>,
}

impl AutoExit {
    pub fn new(delay: Duration, enabled: bool) -> Self {
        Self {
            delay,
            enabled,
            deadline: None,
        }
    }

    /// Called after each terminal host event.
    pub fn on_terminal_event(&mut self, all_terminal: bool, now: Instant) {
        if !self.enabled {
            return;
        }
        self.deadline = if all_terminal {
            Some(now + self.delay)
        } else {
            None
        };
    }

    /// Cancel the countdown (any quitting key does this).
    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn should_exit(&self, now: Instant) -> bool {
        matches!(self.deadline, Some(d) if now >= d)
    }

    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(now))
    }

    pub fn countdown_label(&self, now: Instant) -> Option<String> {
        let remaining = self.remaining(now)?;
        if remaining.is_zero() {
            return Some("Exiting...".to_string());
        }
        let secs = remaining.as_secs();
        if secs >= 60 {
            Some(format!("Auto-exit in {}m {}s", secs / 60, secs % 60))
        } else {
            Some(format!("Auto-exit in {}s", secs))
        }
    }
}
