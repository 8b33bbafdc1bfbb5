use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::BuildError;
use crate::host::{BuildPhase, PhaseTimes};
use crate::tlog;

pub const CACHE_VERSION: &str = "1.0";
pub const DEFAULT_RETENTION_DAYS: u32 = 30;
pub const DEFAULT_KEEP_BUILDS: usize = 5;

const DEMO_PREFIXES: &[&str] = &["test-", "demo-"];
const DEMO_TTL_SECS: i64 = 3600;
const SECS_PER_DAY: i64 = 24 * 3600;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingRecord {
    pub timestamp: i64,
    pub configure_time: f64,
    pub make_time: f64,
    pub check_time: f64,
    pub install_time: f64,
    pub total_time: f64,
    pub success: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AverageTimes {
    pub configure: f64,
    pub make: f64,
    pub check: f64,
    pub install: f64,
    pub total: f64,
}

impl AverageTimes {
    pub fn get(&self, phase: BuildPhase) -> f64 {
        match phase {
            BuildPhase::Configure => self.configure,
            BuildPhase::Make => self.make,
            BuildPhase::Check => self.check,
            BuildPhase::Install => self.install,
            _ => 0.0,
        }
    }

    fn phase_sum(&self) -> f64 {
        self.configure + self.make + self.check + self.install
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub last_updated: i64,
    pub total_builds: u64,
    pub average_times: AverageTimes,
    pub recent_builds: Vec<TimingRecord>,
}

impl CacheEntry {
    /// Averages are the mean of the retained recent records, so the aggregate
    /// view can never drift from the data that backs it.
    fn recompute_averages(&mut self) {
        let n = self.recent_builds.len();
        if n == 0 {
            self.average_times = AverageTimes::default();
            return;
        }
        let nf = n as f64;
        let mut avg = AverageTimes::default();
        for rec in &self.recent_builds {
            avg.configure += rec.configure_time;
            avg.make += rec.make_time;
            avg.check += rec.check_time;
            avg.install += rec.install_time;
            avg.total += rec.total_time;
        }
        avg.configure /= nf;
        avg.make /= nf;
        avg.check /= nf;
        avg.install /= nf;
        avg.total /= nf;
        self.average_times = avg;
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
    version: String,
    cache_retention_days: u32,
    hosts: BTreeMap<String, CacheEntry>,
}

/// Remaining-time estimate for an in-flight build.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Estimate {
    pub remaining_secs: f64,
    /// Completed fraction of the whole build, 0.0..=1.0.
    pub fraction: f64,
}

/// Persistent per-host build timings keyed by `user@hostname`. Owned by the
/// controller; never touched by workers.
#[derive(Debug)]
pub struct TimingCache {
    path: Option<PathBuf>,
    retention_days: u32,
    keep_builds: usize,
    demo_prefixes: Vec<String>,
    hosts: BTreeMap<String, CacheEntry>,
    enabled: bool,
}

impl TimingCache {
    /// Load from `path`; parse failures and unknown versions start fresh with
    /// a warning rather than failing the run.
    pub fn load(path: PathBuf, retention_days: u32, keep_builds: usize) -> Self {
        let hosts = match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<CacheFile>(&content) {
                Ok(file) if file.version == CACHE_VERSION => file.hosts,
                Ok(file) => {
                    tlog!(
                        warn,
                        "timing cache version {} unknown, starting fresh",
                        file.version
                    );
                    BTreeMap::new()
                }
                Err(e) => {
                    tlog!(warn, "timing cache unreadable ({}), starting fresh", e);
                    BTreeMap::new()
                }
            },
            Err(_) => BTreeMap::new(),
        };

        let mut cache = Self {
            path: Some(path),
            retention_days,
            keep_builds,
            demo_prefixes: DEMO_PREFIXES.iter().map(|s| s.to_string()).collect(),
            hosts,
            enabled: true,
        };
        cache.cleanup(chrono::Utc::now().timestamp());
        cache
    }

    /// A cache that records and estimates nothing (`--no-cache`).
    pub fn disabled() -> Self {
        Self {
            path: None,
            retention_days: DEFAULT_RETENTION_DAYS,
            keep_builds: DEFAULT_KEEP_BUILDS,
            demo_prefixes: DEMO_PREFIXES.iter().map(|s| s.to_string()).collect(),
            hosts: BTreeMap::new(),
            enabled: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn entry(&self, host: &str) -> Option<&CacheEntry> {
        if !self.enabled {
            return None;
        }
        self.hosts.get(host)
    }

    /// Record a finished build and persist. Save failures disable the cache
    /// for the rest of the run.
    pub fn record(&mut self, host: &str, times: &PhaseTimes, total_secs: f64, success: bool) {
        if !self.enabled {
            return;
        }
        let now = chrono::Utc::now().timestamp();
        let entry = self.hosts.entry(host.to_string()).or_default();
        entry.last_updated = now;
        entry.total_builds += 1;
        entry.recent_builds.push(TimingRecord {
            timestamp: now,
            configure_time: times.configure,
            make_time: times.make,
            check_time: times.check,
            install_time: times.install,
            total_time: total_secs,
            success,
        });
        let keep = self.keep_builds.max(1);
        if entry.recent_builds.len() > keep {
            let excess = entry.recent_builds.len() - keep;
            entry.recent_builds.drain(..excess);
        }
        entry.recompute_averages();

        if let Err(e) = self.save() {
            tlog!(warn, "{}; cache disabled for this run", e);
            self.enabled = false;
        }
    }

    /// ETA for a host currently in `phase` with `elapsed_in_phase` seconds
    /// spent there. None without historical data.
    pub fn estimate(&self, host: &str, phase: BuildPhase, elapsed_in_phase: f64) -> Option<Estimate> {
        if phase.is_terminal() {
            return None;
        }
        let avg = &self.entry(host)?.average_times;
        let total_avg = if avg.total > 0.0 {
            avg.total
        } else {
            avg.phase_sum()
        };
        if total_avg <= 0.0 {
            return None;
        }

        // Phases before the first timed one contribute the full phase sum,
        // since avg(p) is zero for them and every timed phase is later.
        let mut remaining = 0.0;
        let current_avg = avg.get(phase);
        if current_avg > 0.0 {
            remaining += current_avg * (1.0 - elapsed_in_phase / current_avg).max(0.0);
        }
        for later in phase.later_timed() {
            remaining += avg.get(later);
        }

        let fraction = ((total_avg - remaining) / total_avg).clamp(0.0, 1.0);
        Some(Estimate {
            remaining_secs: remaining,
            fraction,
        })
    }

    /// Drop entries past retention. Demo/test hosts expire after one hour.
    /// Idempotent; runs at load time and before each save.
    pub fn cleanup(&mut self, now: i64) {
        let cutoff = now - self.retention_days as i64 * SECS_PER_DAY;
        let demo_cutoff = now - DEMO_TTL_SECS;
        let prefixes = self.demo_prefixes.clone();
        self.hosts.retain(|host, entry| {
            let is_demo = prefixes.iter().any(|p| {
                host.split('@').nth(1).unwrap_or(host).starts_with(p.as_str())
            });
            if is_demo {
                entry.last_updated >= demo_cutoff
            } else {
                entry.last_updated >= cutoff
            }
        });
    }

    /// Write atomically: temp file in the target directory, fsync, rename.
    pub fn save(&mut self) -> Result<(), BuildError> {
        let Some(path) = self.path.clone() else {
            return Ok(());
        };
        self.cleanup(chrono::Utc::now().timestamp());

        let file = CacheFile {
            version: CACHE_VERSION.to_string(),
            cache_retention_days: self.retention_days,
            hosts: self.hosts.clone(),
        };
        let json = serde_json::to_string_pretty(&file)
            .map_err(|e| BuildError::CacheIo(e.to_string()))?;

        let dir = path.parent().ok_or_else(|| {
            BuildError::CacheIo(format!("cache path {} has no parent", path.display()))
        })?;
        std::fs::create_dir_all(dir).map_err(|e| BuildError::CacheIo(e.to_string()))?;

        let mut tmp =
            tempfile::NamedTempFile::new_in(dir).map_err(|e| BuildError::CacheIo(e.to_string()))?;
        tmp.write_all(json.as_bytes())
            .map_err(|e| BuildError::CacheIo(e.to_string()))?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| BuildError::CacheIo(e.to_string()))?;
        tmp.persist(&path)
            .map_err(|e| BuildError::CacheIo(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn times(configure: f64, make: f64, check: f64, install: f64) -> PhaseTimes {
        PhaseTimes {
            configure,
            make,
            check,
            install,
        }
    }

    fn cache_at(dir: &Path) -> TimingCache {
        TimingCache::load(
            dir.join("timing-cache.json"),
            DEFAULT_RETENTION_DAYS,
            DEFAULT_KEEP_BUILDS,
        )
    }

    #[test]
    fn test_record_and_reload_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = cache_at(dir.path());
        cache.record("u@a", &times(10.0, 60.0, 20.0, 5.0), 95.0, true);

        let reloaded = cache_at(dir.path());
        let entry = reloaded.entry("u@a").unwrap();
        assert_eq!(entry.total_builds, 1);
        assert_eq!(entry.recent_builds.len(), 1);
        assert_eq!(entry, cache.entry("u@a").unwrap());
    }

    #[test]
    fn test_averages_match_recent_records() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = cache_at(dir.path());
        cache.record("u@a", &times(10.0, 60.0, 20.0, 5.0), 95.0, true);
        cache.record("u@a", &times(20.0, 80.0, 40.0, 15.0), 155.0, true);

        let avg = &cache.entry("u@a").unwrap().average_times;
        assert!((avg.configure - 15.0).abs() < 1e-3);
        assert!((avg.make - 70.0).abs() < 1e-3);
        assert!((avg.check - 30.0).abs() < 1e-3);
        assert!((avg.install - 10.0).abs() < 1e-3);
        assert!((avg.total - 125.0).abs() < 1e-3);
    }

    #[test]
    fn test_recent_ring_capped_and_averages_follow() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = TimingCache::load(dir.path().join("c.json"), 30, 3);
        for i in 0..6 {
            let t = (i + 1) as f64;
            cache.record("u@a", &times(t, t, t, t), 4.0 * t, true);
        }
        let entry = cache.entry("u@a").unwrap();
        assert_eq!(entry.recent_builds.len(), 3);
        assert_eq!(entry.total_builds, 6);
        // Ring holds builds 4,5,6 -> mean configure is 5.0.
        assert!((entry.average_times.configure - 5.0).abs() < 1e-3);
    }

    #[test]
    fn test_unknown_version_starts_fresh_and_rewrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("timing-cache.json");
        std::fs::write(&path, r#"{"version":"9.9","cache_retention_days":30,"hosts":{"u@a":{"last_updated":1,"total_builds":4,"average_times":{"configure":1.0,"make":1.0,"check":1.0,"install":1.0,"total":4.0},"recent_builds":[]}}}"#).unwrap();

        let mut cache = TimingCache::load(path.clone(), 30, 5);
        assert!(cache.entry("u@a").is_none());

        cache.record("u@b", &times(1.0, 1.0, 1.0, 1.0), 4.0, true);
        let content = std::fs::read_to_string(&path).unwrap();
        let file: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(file["version"], CACHE_VERSION);
    }

    #[test]
    fn test_corrupt_file_starts_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("timing-cache.json");
        std::fs::write(&path, "{not json").unwrap();
        let cache = TimingCache::load(path, 30, 5);
        assert!(cache.is_enabled());
        assert!(cache.entry("u@a").is_none());
    }

    #[test]
    fn test_cleanup_drops_stale_and_demo_hosts() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = cache_at(dir.path());
        cache.record("u@a", &times(1.0, 1.0, 1.0, 1.0), 4.0, true);
        cache.record("u@test-box", &times(1.0, 1.0, 1.0, 1.0), 4.0, true);
        cache.record("u@demo-box", &times(1.0, 1.0, 1.0, 1.0), 4.0, true);

        let now = chrono::Utc::now().timestamp();
        // Two hours on: demo hosts past their 1 h TTL, regular host retained.
        cache.cleanup(now + 2 * 3600);
        assert!(cache.entry("u@a").is_some());
        assert!(cache.entry("u@test-box").is_none());
        assert!(cache.entry("u@demo-box").is_none());

        // 31 days on: the regular host falls past retention too.
        cache.cleanup(now + 31 * SECS_PER_DAY);
        assert!(cache.entry("u@a").is_none());

        // Idempotent on an already-clean map.
        cache.cleanup(now + 31 * SECS_PER_DAY);
        assert!(cache.entry("u@a").is_none());
    }

    #[test]
    fn test_estimate_mid_phase() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = cache_at(dir.path());
        cache.record("u@a", &times(10.0, 60.0, 20.0, 10.0), 100.0, true);

        // Halfway through make: 30 left of make + 20 check + 10 install.
        let est = cache.estimate("u@a", BuildPhase::Make, 30.0).unwrap();
        assert!((est.remaining_secs - 60.0).abs() < 1e-3);
        assert!((est.fraction - 0.4).abs() < 1e-3);

        // Overrunning the average never goes negative on the current phase.
        let est = cache.estimate("u@a", BuildPhase::Make, 300.0).unwrap();
        assert!((est.remaining_secs - 30.0).abs() < 1e-3);
    }

    #[test]
    fn test_estimate_before_timed_phases() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = cache_at(dir.path());
        cache.record("u@a", &times(10.0, 60.0, 20.0, 10.0), 100.0, true);

        let est = cache.estimate("u@a", BuildPhase::Connecting, 5.0).unwrap();
        assert!((est.remaining_secs - 100.0).abs() < 1e-3);
        assert!(est.fraction.abs() < 1e-3);
    }

    #[test]
    fn test_estimate_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_at(dir.path());
        assert!(cache.estimate("u@nowhere", BuildPhase::Make, 10.0).is_none());

        let disabled = TimingCache::disabled();
        assert!(disabled.estimate("u@a", BuildPhase::Make, 10.0).is_none());
        assert!(disabled.entry("u@a").is_none());
    }

    #[test]
    fn test_disabled_cache_never_writes() {
        let mut cache = TimingCache::disabled();
        cache.record("u@a", &times(1.0, 1.0, 1.0, 1.0), 4.0, true);
        assert!(cache.entry("u@a").is_none());
        assert!(cache.save().is_ok());
    }

    #[test]
    fn test_atomic_save_replaces_file_wholesale() {
        // The temp file is only renamed over the cache after a successful
        // write + fsync, so an interrupted save leaves the old file intact.
        let dir = tempfile::tempdir().unwrap();
        let mut cache = cache_at(dir.path());
        cache.record("u@a", &times(1.0, 1.0, 1.0, 1.0), 4.0, true);
        let before = std::fs::read_to_string(dir.path().join("timing-cache.json")).unwrap();

        // A second successful save replaces it wholesale; the intermediate
        // state is never visible at the final path.
        cache.record("u@b", &times(2.0, 2.0, 2.0, 2.0), 8.0, true);
        let after = std::fs::read_to_string(dir.path().join("timing-cache.json")).unwrap();
        assert_ne!(before, after);
        let parsed: serde_json::Value = serde_json::from_str(&after).unwrap();
        assert!(parsed["hosts"]["u@a"].is_object());
        assert!(parsed["hosts"]["u@b"].is_object());
    }
}
