use std::sync::OnceLock;

use regex::Regex;

use crate::host::BuildPhase;

enum Matcher {
    Contains(&'static str),
    Prefix(&'static str),
    MakeEnter,
}

struct Rule {
    phase: BuildPhase,
    priority: u8,
    matcher: Matcher,
}

const MARKER: u8 = 1;
const SENTINEL: u8 = 10;

// The recognized phase markers. These strings are the contract with the
// build agent; changing them breaks phase detection for deployed agents.
const RULES: &[Rule] = &[
    Rule { phase: BuildPhase::Preparing, priority: MARKER, matcher: Matcher::Contains("Uploading") },
    Rule { phase: BuildPhase::Preparing, priority: MARKER, matcher: Matcher::Contains("Extracting") },
    Rule { phase: BuildPhase::Preparing, priority: MARKER, matcher: Matcher::Prefix("tar: ") },
    Rule { phase: BuildPhase::Configure, priority: MARKER, matcher: Matcher::Contains("configure:") },
    Rule { phase: BuildPhase::Configure, priority: MARKER, matcher: Matcher::Contains("./configure") },
    Rule { phase: BuildPhase::Configure, priority: MARKER, matcher: Matcher::Contains("checking for") },
    Rule { phase: BuildPhase::Make, priority: MARKER, matcher: Matcher::MakeEnter },
    Rule { phase: BuildPhase::Make, priority: MARKER, matcher: Matcher::Contains("make: Entering directory") },
    Rule { phase: BuildPhase::Check, priority: MARKER, matcher: Matcher::Contains("make check") },
    Rule { phase: BuildPhase::Check, priority: MARKER, matcher: Matcher::Contains("Testsuite summary") },
    Rule { phase: BuildPhase::Check, priority: MARKER, matcher: Matcher::Prefix("PASS:") },
    Rule { phase: BuildPhase::Check, priority: MARKER, matcher: Matcher::Prefix("FAIL:") },
    Rule { phase: BuildPhase::Install, priority: MARKER, matcher: Matcher::Contains("make install") },
    Rule { phase: BuildPhase::Install, priority: MARKER, matcher: Matcher::Contains("installing ") },
    Rule { phase: BuildPhase::Install, priority: MARKER, matcher: Matcher::Prefix("/usr/local/") },
    Rule { phase: BuildPhase::Completed, priority: SENTINEL, matcher: Matcher::Contains("BUILD OK") },
    Rule { phase: BuildPhase::Failed, priority: SENTINEL, matcher: Matcher::Contains("BUILD FAILED") },
];

fn make_enter_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^make\[").unwrap())
}

impl Matcher {
    fn matches(&self, line: &str) -> bool {
        match self {
            Self::Contains(s) => line.contains(s),
            Self::Prefix(s) => line.starts_with(s),
            Self::MakeEnter => make_enter_re().is_match(line),
        }
    }
}

/// Classifies a line stream into monotonic phase transitions: the detected
/// phase only ever moves forward through the `BuildPhase` order. When a line
/// matches several advancing rules, the highest priority wins, and within
/// equal priority the later phase wins.
#[derive(Debug)]
pub struct PhaseDetector {
    current: BuildPhase,
}

impl PhaseDetector {
    pub fn new() -> Self {
        Self {
            current: BuildPhase::Queued,
        }
    }

    pub fn current(&self) -> BuildPhase {
        self.current
    }

    /// Feed one output line; returns the new phase when a transition fires.
    pub fn feed(&mut self, line: &str) -> Option<BuildPhase> {
        let line = line.trim();
        let mut best: Option<&Rule> = None;
        for rule in RULES {
            if rule.phase <= self.current || !rule.matcher.matches(line) {
                continue;
            }
            best = match best {
                None => Some(rule),
                Some(b) if rule.priority > b.priority => Some(rule),
                Some(b) if rule.priority == b.priority && rule.phase > b.phase => Some(rule),
                other => other,
            };
        }
        let phase = best?.phase;
        self.current = phase;
        Some(phase)
    }

    /// Externally attributed transition (connection progress, exit status).
    /// Monotonic like `feed`.
    pub fn force(&mut self, phase: BuildPhase) {
        if phase > self.current {
            self.current = phase;
        }
    }
}

impl Default for PhaseDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector_at(phase: BuildPhase) -> PhaseDetector {
        let mut d = PhaseDetector::new();
        d.force(phase);
        d
    }

    #[test]
    fn test_marker_recognition() {
        let mut d = PhaseDetector::new();
        assert_eq!(d.feed("Extracting redland-1.0.17.tar.gz"), Some(BuildPhase::Preparing));
        assert_eq!(d.feed("checking for gcc... gcc"), Some(BuildPhase::Configure));
        assert_eq!(d.feed("make[1]: Entering directory '/tmp/x'"), Some(BuildPhase::Make));
        assert_eq!(d.feed("PASS: test_node"), Some(BuildPhase::Check));
        assert_eq!(d.feed("make install"), Some(BuildPhase::Install));
        assert_eq!(d.feed("BUILD OK"), Some(BuildPhase::Completed));
    }

    #[test]
    fn test_unknown_lines_leave_phase_unchanged() {
        let mut d = detector_at(BuildPhase::Make);
        assert_eq!(d.feed("  CC       rdf_node.lo"), None);
        assert_eq!(d.current(), BuildPhase::Make);
    }

    #[test]
    fn test_monotonic_never_regresses() {
        let mut d = detector_at(BuildPhase::Check);
        // Nested make re-entry during the test suite must not go back to make.
        assert_eq!(d.feed("make[2]: Entering directory '/tmp/x/tests'"), None);
        assert_eq!(d.current(), BuildPhase::Check);
        assert_eq!(d.feed("checking for reconfigure"), None);
    }

    #[test]
    fn test_lines_are_trimmed_before_matching() {
        let mut d = PhaseDetector::new();
        assert_eq!(d.feed("   tar: removing leading '/'"), Some(BuildPhase::Preparing));
        let mut d = detector_at(BuildPhase::Make);
        assert_eq!(d.feed("  PASS: smoke"), Some(BuildPhase::Check));
    }

    #[test]
    fn test_sentinel_outranks_markers_on_same_line() {
        // "BUILD OK" beats the install marker also present on the line.
        let mut d = detector_at(BuildPhase::Make);
        assert_eq!(d.feed("make install done, BUILD OK"), Some(BuildPhase::Completed));
    }

    #[test]
    fn test_equal_priority_prefers_later_phase() {
        // Matches both check ("make check") and install ("make install").
        let mut d = detector_at(BuildPhase::Configure);
        assert_eq!(
            d.feed("make check && make install"),
            Some(BuildPhase::Install)
        );
    }

    #[test]
    fn test_only_advancing_rules_considered() {
        // At install, a line matching check and completed fires completed.
        let mut d = detector_at(BuildPhase::Install);
        assert_eq!(d.feed("make check said BUILD OK"), Some(BuildPhase::Completed));
    }

    #[test]
    fn test_failed_sentinel() {
        let mut d = detector_at(BuildPhase::Make);
        assert_eq!(d.feed("BUILD FAILED"), Some(BuildPhase::Failed));
        // Terminal; nothing advances past it.
        assert_eq!(d.feed("BUILD OK"), None);
        assert_eq!(d.current(), BuildPhase::Failed);
    }

    #[test]
    fn test_force_is_monotonic() {
        let mut d = detector_at(BuildPhase::Make);
        d.force(BuildPhase::Connecting);
        assert_eq!(d.current(), BuildPhase::Make);
        d.force(BuildPhase::Completed);
        assert_eq!(d.current(), BuildPhase::Completed);
    }
}
