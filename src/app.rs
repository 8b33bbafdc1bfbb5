use std::collections::HashMap;
use std::sync::mpsc::Receiver;
use std::time::{Duration, Instant};

use crate::autoexit::AutoExit;
use crate::buffer::DEFAULT_BUFFER_LINES;
use crate::cache::{Estimate, TimingCache};
use crate::error::{ErrorKind, Severity};
use crate::event::BuildEvent;
use crate::exec::Executor;
use crate::host::{BuildPhase, HostState};
use crate::input::{Action, NavMode};
use crate::layout::{self, GridLayout, AUTO_MINIMIZE_TIMEOUT_SECS};
use crate::phase::PhaseDetector;
use crate::stats::RunStats;
use crate::summary::BuildOutcome;
use crate::tlog;
use crate::ui::theme::Theme;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);
const FALLBACK_PAGE: usize = 10;

/// The application controller. Sole owner and mutator of all host state;
/// workers only ever reach it through the event channel.
pub struct App {
    hosts: Vec<HostState>,
    detectors: Vec<PhaseDetector>,
    index: HashMap<String, usize>,
    events: Receiver<BuildEvent>,
    executor: Executor,
    cache: TimingCache,
    autoexit: AutoExit,
    theme: Theme,
    show_progress: bool,

    focus: usize,
    mode: NavMode,
    help_visible: bool,
    band_visible: bool,
    menu_cursor: usize,

    run_start: Instant,
    should_quit: bool,
    cancelled_mid_run: bool,

    term_size: (u16, u16),
    layout_cache: Option<LayoutCache>,

    plain_mode: bool,
    plain_notes: Vec<String>,
}

struct LayoutCache {
    size: (u16, u16),
    visible: Vec<usize>,
    minimized: Vec<usize>,
    layout: GridLayout,
}

impl App {
    pub fn new(
        host_keys: Vec<String>,
        executor: Executor,
        events: Receiver<BuildEvent>,
        cache: TimingCache,
        autoexit: AutoExit,
        theme: Theme,
        show_progress: bool,
    ) -> Self {
        let mut index = HashMap::new();
        let mut hosts = Vec::with_capacity(host_keys.len());
        let mut detectors = Vec::with_capacity(host_keys.len());
        for (i, key) in host_keys.into_iter().enumerate() {
            index.insert(key.clone(), i);
            hosts.push(HostState::new(key, DEFAULT_BUFFER_LINES));
            detectors.push(PhaseDetector::new());
        }
        Self {
            hosts,
            detectors,
            index,
            events,
            executor,
            cache,
            autoexit,
            theme,
            show_progress,
            focus: 0,
            mode: NavMode::HostNav,
            help_visible: false,
            band_visible: true,
            menu_cursor: 0,
            run_start: Instant::now(),
            should_quit: false,
            cancelled_mid_run: false,
            term_size: (80, 24),
            layout_cache: None,
            plain_mode: false,
            plain_notes: Vec::new(),
        }
    }

    pub fn start(&mut self) {
        self.executor.start();
    }

    // ---- event application -------------------------------------------------

    /// Non-blocking drain of pending worker events. Returns whether anything
    /// changed (the frame is dirty).
    pub fn drain_events(&mut self) -> bool {
        let mut dirty = false;
        while let Ok(event) = self.events.try_recv() {
            self.apply_event(event, Instant::now());
            dirty = true;
        }
        dirty
    }

    fn apply_event(&mut self, event: BuildEvent, now: Instant) {
        let Some(&idx) = self.index.get(event.host()) else {
            tlog!(warn, "event for unknown host {}", event.host());
            return;
        };
        match event {
            BuildEvent::Connecting { .. } => {
                self.advance(idx, BuildPhase::Connecting, now);
            }
            BuildEvent::Preparing { .. } => {
                self.advance(idx, BuildPhase::Preparing, now);
            }
            BuildEvent::Started { .. } => {
                self.hosts[idx].touch(now);
            }
            BuildEvent::Line { line, .. } => {
                self.hosts[idx].buffer.push(line.clone());
                self.hosts[idx].touch(now);
                if let Some(phase) = self.detectors[idx].feed(&line) {
                    self.advance(idx, phase, now);
                }
            }
            BuildEvent::Exited { exit_code, .. } => {
                self.hosts[idx].exit_code = Some(exit_code);
                if exit_code == 0 {
                    self.advance(idx, BuildPhase::Completed, now);
                } else {
                    let trail = self.hosts[idx].buffer.tail(3).join(" | ");
                    let mut message = format!("build failed with exit code {}", exit_code);
                    if !trail.is_empty() {
                        message = format!("{}: {}", message, trail);
                    }
                    self.hosts[idx].error = Some(message);
                    self.hosts[idx].error_kind = Some(ErrorKind::Execute);
                    self.advance(idx, BuildPhase::Failed, now);
                }
                self.finish_host(idx, now);
            }
            BuildEvent::Failed { kind, message, .. } => {
                match kind.severity() {
                    Severity::Low => tlog!(info, "{}: {}", self.hosts[idx].key, message),
                    _ => tlog!(error, "{}: {}", self.hosts[idx].key, message),
                }
                self.hosts[idx].error = Some(message);
                self.hosts[idx].error_kind = Some(kind);
                self.advance(idx, BuildPhase::Failed, now);
                self.finish_host(idx, now);
            }
        }
    }

    fn advance(&mut self, idx: usize, phase: BuildPhase, now: Instant) {
        let before = self.hosts[idx].phase;
        self.hosts[idx].advance(phase, now);
        let after = self.hosts[idx].phase;
        if before != after {
            self.detectors[idx].force(after);
            self.layout_cache = None;
            if self.plain_mode {
                self.plain_notes
                    .push(format!("{}: {}", self.hosts[idx].key, after));
            }
        }
    }

    /// Terminal-event bookkeeping: cache recording, slot release, auto-exit.
    fn finish_host(&mut self, idx: usize, now: Instant) {
        let key = self.hosts[idx].key.clone();
        let success = self.hosts[idx].succeeded();
        let times = self.hosts[idx].phase_times;
        let total = self.hosts[idx]
            .elapsed(now)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);
        if success || times.total() > 0.0 {
            self.cache.record(&key, &times, total, success);
        }

        self.executor.on_host_finished(&key);
        let all_terminal = self.hosts.iter().all(|h| h.is_terminal());
        self.autoexit.on_terminal_event(all_terminal, now);

        if self.plain_mode {
            if let Some(err) = &self.hosts[idx].error {
                self.plain_notes.push(format!("{}: {}", key, err));
            }
        }
    }

    // ---- tick --------------------------------------------------------------

    /// Per-tick housekeeping; returns whether the frame went dirty.
    pub fn tick(&mut self, now: Instant) -> bool {
        let mut dirty = false;

        if self.band_visible {
            for host in &mut self.hosts {
                let collapse = host.phase == BuildPhase::Completed
                    && host
                        .completed_at
                        .is_some_and(|t| now.duration_since(t).as_secs() >= AUTO_MINIMIZE_TIMEOUT_SECS);
                if collapse != host.minimized {
                    host.minimized = collapse;
                    dirty = true;
                }
            }
            if dirty {
                self.layout_cache = None;
                self.clamp_focus();
            }
        }

        if self.autoexit.should_exit(now) {
            tlog!(info, "auto-exit deadline reached");
            self.should_quit = true;
        }
        dirty
    }

    // ---- input -------------------------------------------------------------

    pub fn handle_action(&mut self, action: Action) {
        match action {
            Action::Quit => self.quit_from_user(),
            Action::ToggleHelp => self.help_visible = !self.help_visible,

            Action::FocusPrevVisible => self.move_focus_visible(-1),
            Action::FocusNextVisible => self.move_focus_visible(1),
            Action::FocusPrev => self.move_focus_all(-1),
            Action::FocusNext => self.move_focus_all(1),

            Action::EnterFullScreen => self.mode = NavMode::FullScreen,
            Action::ExitFullScreen => {
                self.mode = NavMode::HostNav;
                self.focused_mut().scroll = None;
            }
            Action::LeaveLogScroll => {
                self.mode = NavMode::HostNav;
                self.focused_mut().scroll = None;
            }

            Action::OpenMenu => {
                self.menu_cursor = self.focus;
                self.mode = NavMode::Menu;
            }
            Action::CloseMenu => self.mode = NavMode::HostNav,
            Action::MenuPrev => {
                self.menu_cursor = self.menu_cursor.saturating_sub(1);
            }
            Action::MenuNext => {
                if self.menu_cursor + 1 < self.hosts.len() {
                    self.menu_cursor += 1;
                }
            }
            Action::MenuJump(n) => {
                if n < self.hosts.len() {
                    self.menu_cursor = n;
                }
            }
            Action::MenuSelect => {
                if !self.hosts.is_empty() {
                    self.focus = self.menu_cursor;
                    self.mode = NavMode::FullScreen;
                }
            }

            Action::ScrollUp(n) => self.scroll_by(-(n as i64)),
            Action::ScrollDown(n) => self.scroll_by(n as i64),
            Action::ScrollPageUp => {
                if self.mode == NavMode::HostNav {
                    self.mode = NavMode::LogScroll;
                }
                self.scroll_by(-(self.page_size() as i64));
            }
            Action::ScrollPageDown => {
                if self.mode == NavMode::HostNav {
                    self.mode = NavMode::LogScroll;
                }
                self.scroll_by(self.page_size() as i64);
            }
            Action::ScrollTop => {
                let first = self.focused().buffer.first_index();
                self.focused_mut().scroll = Some(first);
            }
            Action::ScrollBottom => self.focused_mut().scroll = None,

            Action::ToggleMinimized => {
                self.band_visible = !self.band_visible;
                if !self.band_visible {
                    for host in &mut self.hosts {
                        host.minimized = false;
                    }
                }
                self.layout_cache = None;
            }

            Action::None => {}
        }
    }

    fn quit_from_user(&mut self) {
        let stats = self.stats(Instant::now());
        if !stats.all_terminal() {
            self.cancelled_mid_run = true;
        }
        self.autoexit.cancel();
        self.should_quit = true;
    }

    fn move_focus_visible(&mut self, step: i64) {
        let visible = self.visible_indices();
        if visible.is_empty() {
            return;
        }
        let pos = visible
            .iter()
            .position(|&i| i == self.focus)
            .unwrap_or(0) as i64;
        let next = (pos + step).rem_euclid(visible.len() as i64) as usize;
        self.focus = visible[next];
    }

    fn move_focus_all(&mut self, step: i64) {
        if self.hosts.is_empty() {
            return;
        }
        let next = (self.focus as i64 + step).rem_euclid(self.hosts.len() as i64);
        self.focus = next as usize;
    }

    fn clamp_focus(&mut self) {
        let visible = self.visible_indices();
        if !visible.is_empty() && !visible.contains(&self.focus) {
            self.focus = visible[0];
        }
    }

    fn scroll_by(&mut self, delta: i64) {
        let page = self.page_size();
        let host = &mut self.hosts[self.focus];
        let first = host.buffer.first_index();
        let end = host.buffer.end_index();
        let bottom_top = end.saturating_sub(page).max(first);
        let current = host.scroll.unwrap_or(bottom_top);
        let target = (current as i64 + delta).clamp(first as i64, bottom_top as i64) as usize;
        host.scroll = if target >= bottom_top {
            None
        } else {
            Some(target)
        };
    }

    /// Viewport height of the focused host's log in the current mode.
    fn page_size(&self) -> usize {
        match self.mode {
            NavMode::FullScreen => {
                let rect = layout::full_screen_rect(self.term_size.0, self.term_size.1);
                (rect.height.saturating_sub(4)) as usize
            }
            _ => self
                .layout_cache
                .as_ref()
                .and_then(|c| {
                    c.layout
                        .tiles
                        .iter()
                        .find(|(i, _)| *i == self.focus)
                        .map(|(_, r)| r.height.saturating_sub(3) as usize)
                })
                .unwrap_or(FALLBACK_PAGE),
        }
        .max(1)
    }

    // ---- layout ------------------------------------------------------------

    pub fn set_term_size(&mut self, width: u16, height: u16) {
        if self.term_size != (width, height) {
            self.term_size = (width, height);
            self.layout_cache = None;
        }
    }

    pub fn visible_indices(&self) -> Vec<usize> {
        (0..self.hosts.len())
            .filter(|&i| !self.hosts[i].minimized)
            .collect()
    }

    pub fn minimized_indices(&self) -> Vec<usize> {
        (0..self.hosts.len())
            .filter(|&i| self.hosts[i].minimized)
            .collect()
    }

    /// Grid layout for the current terminal size, cached until the size or
    /// the visible/minimized sets change.
    pub fn grid_layout(&mut self) -> GridLayout {
        let visible = self.visible_indices();
        let minimized = self.minimized_indices();
        if let Some(cache) = &self.layout_cache {
            if cache.size == self.term_size
                && cache.visible == visible
                && cache.minimized == minimized
            {
                return cache.layout.clone();
            }
        }
        let layout =
            layout::compute_grid(self.term_size.0, self.term_size.1, &visible, &minimized);
        self.layout_cache = Some(LayoutCache {
            size: self.term_size,
            visible,
            minimized,
            layout: layout.clone(),
        });
        layout
    }

    // ---- accessors for rendering -------------------------------------------

    pub fn hosts(&self) -> &[HostState] {
        &self.hosts
    }

    pub fn focus(&self) -> usize {
        self.focus
    }

    fn focused(&self) -> &HostState {
        &self.hosts[self.focus]
    }

    fn focused_mut(&mut self) -> &mut HostState {
        &mut self.hosts[self.focus]
    }

    pub fn nav_mode(&self) -> NavMode {
        self.mode
    }

    pub fn help_visible(&self) -> bool {
        self.help_visible
    }

    pub fn menu_cursor(&self) -> usize {
        self.menu_cursor
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn stats(&self, now: Instant) -> RunStats {
        RunStats::collect(&self.hosts, self.run_start, now)
    }

    pub fn countdown(&self, now: Instant) -> Option<String> {
        self.autoexit.countdown_label(now)
    }

    pub fn estimate_for(&self, idx: usize, now: Instant) -> Option<Estimate> {
        if !self.show_progress {
            return None;
        }
        let host = self.hosts.get(idx)?;
        if host.is_terminal() {
            return None;
        }
        self.cache
            .estimate(&host.key, host.phase, host.elapsed_in_phase(now))
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    // ---- plain-text fallback ----------------------------------------------

    /// Entered when the renderer fails; phase transitions are reported as
    /// plain lines from then on.
    pub fn enter_plain_mode(&mut self) {
        self.plain_mode = true;
    }

    pub fn is_plain_mode(&self) -> bool {
        self.plain_mode
    }

    pub fn take_plain_notes(&mut self) -> Vec<String> {
        std::mem::take(&mut self.plain_notes)
    }

    // ---- shutdown ----------------------------------------------------------

    /// Cancel the executor, give workers a bounded grace period to reach
    /// terminal events, mark stragglers cancelled, and flush the cache.
    pub fn shutdown(&mut self) {
        self.executor.cancel_all();

        let deadline = Instant::now() + SHUTDOWN_GRACE;
        while Instant::now() < deadline {
            self.drain_events();
            if self.hosts.iter().all(|h| h.is_terminal()) {
                break;
            }
            if self.executor.active_count() == 0 {
                // No workers left to produce events; stragglers are queued
                // hosts that were never admitted.
                break;
            }
            std::thread::sleep(Duration::from_millis(50));
        }
        self.drain_events();

        let now = Instant::now();
        for idx in 0..self.hosts.len() {
            if !self.hosts[idx].is_terminal() {
                self.hosts[idx].error = Some("build cancelled".to_string());
                self.hosts[idx].error_kind = Some(ErrorKind::Cancelled);
                self.advance(idx, BuildPhase::Failed, now);
            }
        }

        if self.executor.active_count() == 0 {
            // Every worker has sent its terminal event; joining cannot block.
            self.executor.wait();
        } else {
            tlog!(warn, "abandoning workers still running after grace period");
        }

        if let Err(e) = self.cache.save() {
            tlog!(warn, "final cache save failed: {}", e);
        }
    }

    pub fn outcomes(&self, now: Instant) -> Vec<BuildOutcome> {
        self.hosts
            .iter()
            .map(|h| BuildOutcome {
                host: h.key.clone(),
                success: h.succeeded(),
                duration: h.elapsed(now),
                error: h.error.clone(),
            })
            .collect()
    }

    pub fn total_elapsed(&self, now: Instant) -> Duration {
        now.duration_since(self.run_start)
    }

    /// 0 all succeeded, 1 any failed, 130 interrupted mid-run.
    pub fn exit_code(&self) -> i32 {
        if self.cancelled_mid_run {
            130
        } else if self.hosts.iter().any(|h| !h.succeeded()) && !self.hosts.is_empty() {
            1
        } else {
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autoexit::AutoExit;
    use crate::cache::TimingCache;
    use crate::event::event_channel;
    use crate::exec::{Executor, ExecutorConfig, DEFAULT_BUILD_TIMEOUT, DEFAULT_IDLE_TIMEOUT};
    use std::path::PathBuf;

    fn test_app(hosts: &[&str]) -> App {
        let (sink, rx) = event_channel();
        let executor = Executor::new(
            ExecutorConfig {
                max_concurrent: 2,
                connect_timeout: Duration::from_secs(1),
                build_timeout: DEFAULT_BUILD_TIMEOUT,
                idle_timeout: DEFAULT_IDLE_TIMEOUT,
                tarball: PathBuf::from("/tmp/t.tgz"),
                agent_script: String::new(),
            },
            sink,
        );
        App::new(
            hosts.iter().map(|h| h.to_string()).collect(),
            executor,
            rx,
            TimingCache::disabled(),
            AutoExit::new(Duration::from_secs(30), true),
            Theme::new(false),
            true,
        )
    }

    fn line(host: &str, text: &str) -> BuildEvent {
        BuildEvent::Line {
            host: host.to_string(),
            line: text.to_string(),
        }
    }

    #[test]
    fn test_line_events_drive_phase_detection() {
        let mut app = test_app(&["u@a"]);
        let now = Instant::now();
        app.apply_event(
            BuildEvent::Connecting {
                host: "u@a".to_string(),
            },
            now,
        );
        assert_eq!(app.hosts[0].phase, BuildPhase::Connecting);

        app.apply_event(line("u@a", "checking for gcc... yes"), now);
        assert_eq!(app.hosts[0].phase, BuildPhase::Configure);
        assert_eq!(app.hosts[0].buffer.len(), 1);

        app.apply_event(line("u@a", "make[1]: Entering directory '/x'"), now);
        assert_eq!(app.hosts[0].phase, BuildPhase::Make);
    }

    #[test]
    fn test_exit_zero_completes_and_nonzero_fails() {
        let mut app = test_app(&["u@a", "u@b"]);
        let now = Instant::now();
        app.apply_event(
            BuildEvent::Exited {
                host: "u@a".to_string(),
                exit_code: 0,
            },
            now,
        );
        assert_eq!(app.hosts[0].phase, BuildPhase::Completed);
        assert!(app.hosts[0].error.is_none());

        app.apply_event(line("u@b", "collect2: error: ld returned 1"), now);
        app.apply_event(
            BuildEvent::Exited {
                host: "u@b".to_string(),
                exit_code: 2,
            },
            now,
        );
        assert_eq!(app.hosts[1].phase, BuildPhase::Failed);
        let err = app.hosts[1].error.as_deref().unwrap();
        assert!(err.contains("exit code 2"));
        assert!(err.contains("ld returned 1"));
        assert_eq!(app.hosts[1].error_kind, Some(ErrorKind::Execute));
    }

    #[test]
    fn test_failed_event_is_terminal_and_sticky() {
        let mut app = test_app(&["u@a"]);
        let now = Instant::now();
        app.apply_event(
            BuildEvent::Failed {
                host: "u@a".to_string(),
                kind: ErrorKind::Stalled,
                message: "no output for 600s".to_string(),
            },
            now,
        );
        assert_eq!(app.hosts[0].phase, BuildPhase::Failed);
        // Late lines cannot resurrect the host.
        app.apply_event(line("u@a", "BUILD OK"), now);
        assert_eq!(app.hosts[0].phase, BuildPhase::Failed);
    }

    #[test]
    fn test_autoexit_arms_only_when_all_terminal() {
        let mut app = test_app(&["u@a", "u@b"]);
        let now = Instant::now();
        app.apply_event(
            BuildEvent::Exited {
                host: "u@a".to_string(),
                exit_code: 0,
            },
            now,
        );
        assert!(!app.autoexit.is_armed());
        app.apply_event(
            BuildEvent::Exited {
                host: "u@b".to_string(),
                exit_code: 0,
            },
            now,
        );
        assert!(app.autoexit.is_armed());
    }

    #[test]
    fn test_exit_codes() {
        let mut app = test_app(&["u@a", "u@b"]);
        let now = Instant::now();
        app.apply_event(
            BuildEvent::Exited {
                host: "u@a".to_string(),
                exit_code: 0,
            },
            now,
        );
        app.apply_event(
            BuildEvent::Exited {
                host: "u@b".to_string(),
                exit_code: 0,
            },
            now,
        );
        assert_eq!(app.exit_code(), 0);

        let mut app = test_app(&["u@a"]);
        app.apply_event(
            BuildEvent::Exited {
                host: "u@a".to_string(),
                exit_code: 1,
            },
            Instant::now(),
        );
        assert_eq!(app.exit_code(), 1);

        let mut app = test_app(&["u@a"]);
        app.handle_action(Action::Quit);
        assert!(app.should_quit());
        assert_eq!(app.exit_code(), 130);
    }

    #[test]
    fn test_menu_navigation_reaches_hidden_hosts() {
        let mut app = test_app(&["u@a", "u@b", "u@c"]);
        app.handle_action(Action::OpenMenu);
        assert_eq!(app.nav_mode(), NavMode::Menu);
        app.handle_action(Action::MenuJump(2));
        app.handle_action(Action::MenuSelect);
        assert_eq!(app.focus(), 2);
        assert_eq!(app.nav_mode(), NavMode::FullScreen);
        app.handle_action(Action::ExitFullScreen);
        assert_eq!(app.nav_mode(), NavMode::HostNav);
    }

    #[test]
    fn test_focus_wraps_over_all_hosts() {
        let mut app = test_app(&["u@a", "u@b", "u@c"]);
        app.handle_action(Action::FocusPrev);
        assert_eq!(app.focus(), 2);
        app.handle_action(Action::FocusNext);
        assert_eq!(app.focus(), 0);
    }

    #[test]
    fn test_page_scroll_enters_log_scroll_mode() {
        let mut app = test_app(&["u@a"]);
        let now = Instant::now();
        for i in 0..50 {
            app.apply_event(line("u@a", &format!("line {}", i)), now);
        }
        app.handle_action(Action::ScrollPageUp);
        assert_eq!(app.nav_mode(), NavMode::LogScroll);
        assert!(app.hosts[0].scroll.is_some());

        app.handle_action(Action::LeaveLogScroll);
        assert_eq!(app.nav_mode(), NavMode::HostNav);
        assert!(app.hosts[0].scroll.is_none());
    }

    #[test]
    fn test_scroll_clamps_and_follows_tail_at_bottom() {
        let mut app = test_app(&["u@a"]);
        let now = Instant::now();
        for i in 0..30 {
            app.apply_event(line("u@a", &format!("line {}", i)), now);
        }
        app.handle_action(Action::ScrollTop);
        assert_eq!(app.hosts[0].scroll, Some(0));
        app.handle_action(Action::ScrollUp(5));
        assert_eq!(app.hosts[0].scroll, Some(0));
        app.handle_action(Action::ScrollBottom);
        assert!(app.hosts[0].scroll.is_none());
    }

    #[test]
    fn test_minimize_collapses_completed_hosts_after_timeout() {
        let mut app = test_app(&["u@a", "u@b"]);
        let start = Instant::now();
        app.apply_event(
            BuildEvent::Exited {
                host: "u@a".to_string(),
                exit_code: 0,
            },
            start,
        );
        assert!(!app.tick(start));
        let later = start + Duration::from_secs(AUTO_MINIMIZE_TIMEOUT_SECS + 1);
        assert!(app.tick(later));
        assert!(app.hosts[0].minimized);
        assert_eq!(app.visible_indices(), vec![1]);
        assert_eq!(app.minimized_indices(), vec![0]);

        // Toggling the band re-expands everything.
        app.handle_action(Action::ToggleMinimized);
        assert!(!app.hosts[0].minimized);
    }

    #[test]
    fn test_failed_hosts_stay_in_grid() {
        let mut app = test_app(&["u@a"]);
        let start = Instant::now();
        app.apply_event(
            BuildEvent::Exited {
                host: "u@a".to_string(),
                exit_code: 1,
            },
            start,
        );
        let later = start + Duration::from_secs(AUTO_MINIMIZE_TIMEOUT_SECS * 2);
        app.tick(later);
        assert!(!app.hosts[0].minimized);
    }

    #[test]
    fn test_autoexit_tick_quits() {
        let mut app = test_app(&["u@a"]);
        let start = Instant::now();
        app.apply_event(
            BuildEvent::Exited {
                host: "u@a".to_string(),
                exit_code: 0,
            },
            start,
        );
        app.tick(start + Duration::from_secs(29));
        assert!(!app.should_quit());
        app.tick(start + Duration::from_secs(31));
        assert!(app.should_quit());
        // Auto-exit after completion is not an interrupt.
        assert_eq!(app.exit_code(), 0);
    }

    #[test]
    fn test_layout_cache_invalidated_by_resize() {
        let mut app = test_app(&["u@a", "u@b"]);
        app.set_term_size(120, 40);
        let first = app.grid_layout();
        assert!(!first.tiles.is_empty());
        let again = app.grid_layout();
        assert_eq!(first, again);
        app.set_term_size(100, 30);
        let resized = app.grid_layout();
        assert_ne!(first, resized);
    }

    #[test]
    fn test_shutdown_marks_stragglers_cancelled() {
        let mut app = test_app(&["u@a", "u@b"]);
        let now = Instant::now();
        app.apply_event(
            BuildEvent::Exited {
                host: "u@a".to_string(),
                exit_code: 0,
            },
            now,
        );
        app.shutdown();
        assert!(app.hosts.iter().all(|h| h.is_terminal()));
        assert_eq!(app.hosts[1].error_kind, Some(ErrorKind::Cancelled));
        assert_eq!(app.hosts[0].phase, BuildPhase::Completed);
    }

    #[test]
    fn test_outcomes_for_summary() {
        let mut app = test_app(&["u@a", "u@b"]);
        let now = Instant::now();
        app.apply_event(
            BuildEvent::Exited {
                host: "u@a".to_string(),
                exit_code: 0,
            },
            now,
        );
        app.apply_event(
            BuildEvent::Failed {
                host: "u@b".to_string(),
                kind: ErrorKind::Connect,
                message: "connection refused".to_string(),
            },
            now,
        );
        let outcomes = app.outcomes(Instant::now());
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes[0].success);
        assert!(!outcomes[1].success);
        assert_eq!(outcomes[1].error.as_deref(), Some("connection refused"));
    }
}
