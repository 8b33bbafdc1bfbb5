use std::sync::OnceLock;

use regex::Regex;

fn ansi_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\x1b(?:[@-Z\\-_]|\[[0-9;?]*[ -/]*[@-~])").unwrap())
}

/// Strip ANSI escape sequences and replace remaining non-printable bytes with
/// the replacement glyph, so remote output cannot inject terminal control
/// sequences into the UI.
pub fn sanitize(line: &str) -> String {
    let stripped = ansi_re().replace_all(line, "");
    stripped
        .chars()
        .map(|c| {
            if c == '\t' {
                ' '
            } else if c.is_control() {
                '\u{FFFD}'
            } else {
                c
            }
        })
        .collect()
}

/// Truncate to `max_width` characters, ending in an ellipsis when anything
/// was cut. Widths below the ellipsis itself return a clipped ellipsis.
pub fn truncate(line: &str, max_width: usize) -> String {
    const ELLIPSIS: &str = "...";
    if line.chars().count() <= max_width {
        return line.to_string();
    }
    if max_width <= ELLIPSIS.len() {
        return ELLIPSIS.chars().take(max_width).collect();
    }
    let keep = max_width - ELLIPSIS.len();
    let mut out: String = line.chars().take(keep).collect();
    out.push_str(ELLIPSIS);
    out
}

/// Human duration: "42.0s", "3m 20s", "2h 5m".
pub fn format_duration(secs: f64) -> String {
    if secs < 0.0 {
        return "0.0s".to_string();
    }
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else if secs < 3600.0 {
        let minutes = (secs / 60.0) as u64;
        let rem = secs % 60.0;
        if rem < 1.0 {
            format!("{}m", minutes)
        } else {
            format!("{}m {:.0}s", minutes, rem)
        }
    } else {
        let hours = (secs / 3600.0) as u64;
        let minutes = ((secs % 3600.0) / 60.0) as u64;
        if minutes == 0 {
            format!("{}h", hours)
        } else {
            format!("{}h {}m", hours, minutes)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_strips_ansi() {
        assert_eq!(sanitize("\x1b[1;32mok\x1b[0m done"), "ok done");
    }

    #[test]
    fn test_sanitize_replaces_control_bytes() {
        assert_eq!(sanitize("a\x07b\x00c"), "a\u{FFFD}b\u{FFFD}c");
        assert_eq!(sanitize("col1\tcol2"), "col1 col2");
    }

    #[test]
    fn test_sanitize_keeps_unicode() {
        assert_eq!(sanitize("✓ built"), "✓ built");
    }

    #[test]
    fn test_truncate_short_line_unchanged() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello", 5), "hello");
    }

    #[test]
    fn test_truncate_adds_ellipsis() {
        assert_eq!(truncate("hello world", 8), "hello...");
        assert_eq!(truncate("hello", 2), "..");
    }

    #[test]
    fn test_format_duration_ranges() {
        assert_eq!(format_duration(4.0), "4.0s");
        assert_eq!(format_duration(59.9), "59.9s");
        assert_eq!(format_duration(200.0), "3m 20s");
        assert_eq!(format_duration(180.2), "3m");
        assert_eq!(format_duration(7500.0), "2h 5m");
        assert_eq!(format_duration(7200.0), "2h");
        assert_eq!(format_duration(-3.0), "0.0s");
    }
}
