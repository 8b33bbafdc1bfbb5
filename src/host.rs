use std::time::{Duration, Instant};

use crate::buffer::OutputBuffer;
use crate::error::{BuildError, ErrorKind};

/// Ordered build phases. Ordering follows declaration order; a host's phase
/// only ever advances through it, and `Completed`/`Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BuildPhase {
    Queued,
    Connecting,
    Preparing,
    Configure,
    Make,
    Check,
    Install,
    Completed,
    Failed,
}

/// The phases that accrue measured time and feed the timing cache.
pub const TIMED_PHASES: [BuildPhase; 4] = [
    BuildPhase::Configure,
    BuildPhase::Make,
    BuildPhase::Check,
    BuildPhase::Install,
];

impl BuildPhase {
    pub fn label(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Connecting => "connecting",
            Self::Preparing => "preparing",
            Self::Configure => "configure",
            Self::Make => "make",
            Self::Check => "check",
            Self::Install => "install",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Queued => "·",
            Self::Completed => "✓",
            Self::Failed => "✗",
            _ => "▶",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Timed phases strictly after this one.
    pub fn later_timed(self) -> impl Iterator<Item = BuildPhase> {
        TIMED_PHASES.into_iter().filter(move |p| *p > self)
    }
}

impl std::fmt::Display for BuildPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Validate and normalize a `user@hostname` entry.
pub fn parse_host_key(entry: &str) -> Result<String, BuildError> {
    let entry = entry.trim();
    let (user, host) = entry
        .split_once('@')
        .ok_or_else(|| BuildError::Resolve(entry.to_string()))?;
    if user.is_empty() || host.is_empty() || host.contains('@') || host.contains(char::is_whitespace)
    {
        return Err(BuildError::Resolve(entry.to_string()));
    }
    Ok(format!("{}@{}", user, host))
}

/// Cumulative measured seconds per timed phase.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PhaseTimes {
    pub configure: f64,
    pub make: f64,
    pub check: f64,
    pub install: f64,
}

impl PhaseTimes {
    pub fn accrue(&mut self, phase: BuildPhase, secs: f64) {
        match phase {
            BuildPhase::Configure => self.configure += secs,
            BuildPhase::Make => self.make += secs,
            BuildPhase::Check => self.check += secs,
            BuildPhase::Install => self.install += secs,
            _ => {}
        }
    }

    pub fn total(&self) -> f64 {
        self.configure + self.make + self.check + self.install
    }
}

/// Everything the controller tracks for one host. Outlives the worker so the
/// final summary can be produced after shutdown.
#[derive(Debug)]
pub struct HostState {
    pub key: String,
    pub phase: BuildPhase,
    pub build_start: Option<Instant>,
    pub phase_start: Option<Instant>,
    pub last_activity: Option<Instant>,
    pub phase_times: PhaseTimes,
    pub buffer: OutputBuffer,
    pub exit_code: Option<i32>,
    pub error: Option<String>,
    pub error_kind: Option<ErrorKind>,
    /// Absolute line offset when scrolled; `None` follows the tail.
    pub scroll: Option<usize>,
    pub completed_at: Option<Instant>,
    pub minimized: bool,
}

impl HostState {
    pub fn new(key: String, buffer_cap: usize) -> Self {
        Self {
            key,
            phase: BuildPhase::Queued,
            build_start: None,
            phase_start: None,
            last_activity: None,
            phase_times: PhaseTimes::default(),
            buffer: OutputBuffer::new(buffer_cap),
            exit_code: None,
            error: None,
            error_kind: None,
            scroll: None,
            completed_at: None,
            minimized: false,
        }
    }

    /// Advance to `phase`, attributing the elapsed slice to the phase being
    /// left. Regressions and transitions out of a terminal state are ignored.
    pub fn advance(&mut self, phase: BuildPhase, now: Instant) {
        if phase <= self.phase || self.phase.is_terminal() {
            return;
        }
        if let Some(started) = self.phase_start {
            let elapsed = now.duration_since(started).as_secs_f64();
            self.phase_times.accrue(self.phase, elapsed);
        }
        if self.build_start.is_none() {
            self.build_start = Some(now);
        }
        self.phase = phase;
        self.phase_start = Some(now);
        self.last_activity = Some(now);
        if phase.is_terminal() {
            self.completed_at = Some(now);
        }
    }

    pub fn touch(&mut self, now: Instant) {
        self.last_activity = Some(now);
    }

    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }

    pub fn succeeded(&self) -> bool {
        self.phase == BuildPhase::Completed
    }

    /// Wall time since the build started; time to completion once terminal.
    pub fn elapsed(&self, now: Instant) -> Option<Duration> {
        let start = self.build_start?;
        let end = self.completed_at.unwrap_or(now);
        Some(end.duration_since(start))
    }

    pub fn elapsed_in_phase(&self, now: Instant) -> f64 {
        match self.phase_start {
            Some(started) => now.duration_since(started).as_secs_f64(),
            None => 0.0,
        }
    }
}
