use std::time::{Duration, Instant};

use crate::host::{BuildPhase, HostState};

/// Aggregate run statistics, derived on demand from host states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunStats {
    pub queued: usize,
    pub active: usize,
    pub completed: usize,
    pub failed: usize,
    pub total: usize,
    pub elapsed: Duration,
}

impl RunStats {
    pub fn collect(hosts: &[HostState], run_start: Instant, now: Instant) -> Self {
        let mut stats = Self {
            queued: 0,
            active: 0,
            completed: 0,
            failed: 0,
            total: hosts.len(),
            elapsed: now.duration_since(run_start),
        };
        for host in hosts {
            match host.phase {
                BuildPhase::Queued => stats.queued += 1,
                BuildPhase::Completed => stats.completed += 1,
                BuildPhase::Failed => stats.failed += 1,
                _ => stats.active += 1,
            }
        }
        stats
    }

    pub fn terminal(&self) -> usize {
        self.completed + self.failed
    }

    pub fn all_terminal(&self) -> bool {
        self.terminal() >= self.total
    }

    pub fn progress_percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.terminal() as f64 / self.total as f64 * 100.0
    }

    pub fn success_rate(&self) -> f64 {
        if self.terminal() == 0 {
            return 0.0;
        }
        self.completed as f64 / self.terminal() as f64 * 100.0
    }

    pub fn status_line(&self) -> String {
        format!(
            "{} active, {} completed, {} failed",
            self.active, self.completed, self.failed
        )
    }

    pub fn progress_line(&self) -> String {
        format!(
            "{:.1}% ({}/{})",
            self.progress_percent(),
            self.terminal(),
            self.total
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::HostState;

    fn host_in(key: &str, phase: BuildPhase, now: Instant) -> HostState {
        let mut host = HostState::new(key.to_string(), 10);
        host.advance(phase, now);
        host
    }

    #[test]
    fn test_collect_counts() {
        let now = Instant::now();
        let hosts = vec![
            HostState::new("u@q".to_string(), 10),
            host_in("u@a", BuildPhase::Make, now),
            host_in("u@b", BuildPhase::Completed, now),
            host_in("u@c", BuildPhase::Failed, now),
        ];
        let stats = RunStats::collect(&hosts, now, now);
        assert_eq!(stats.queued, 1);
        assert_eq!(stats.active, 1);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.total, 4);
        assert!(!stats.all_terminal());
        assert!((stats.progress_percent() - 50.0).abs() < 1e-6);
        assert!((stats.success_rate() - 50.0).abs() < 1e-6);
    }

    #[test]
    fn test_empty_run() {
        let now = Instant::now();
        let stats = RunStats::collect(&[], now, now);
        assert!(stats.all_terminal());
        assert_eq!(stats.progress_percent(), 0.0);
        assert_eq!(stats.success_rate(), 0.0);
    }

    #[test]
    fn test_status_lines() {
        let now = Instant::now();
        let hosts = vec![
            host_in("u@a", BuildPhase::Completed, now),
            host_in("u@b", BuildPhase::Completed, now),
        ];
        let stats = RunStats::collect(&hosts, now, now);
        assert_eq!(stats.status_line(), "0 active, 2 completed, 0 failed");
        assert_eq!(stats.progress_line(), "100.0% (2/2)");
        assert!(stats.all_terminal());
    }
}
