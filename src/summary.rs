use std::time::Duration;

use crate::text::format_duration;

const BANNER_WIDTH: usize = 60;

#[derive(Debug, Clone)]
pub struct BuildOutcome {
    pub host: String,
    pub success: bool,
    pub duration: Option<Duration>,
    pub error: Option<String>,
}

/// The BUILD SUMMARY block printed to stdout after the TUI has been torn
/// down. Host order follows the order outcomes were collected in.
pub fn generate_summary(outcomes: &[BuildOutcome], total: Duration) -> String {
    let banner = "=".repeat(BANNER_WIDTH);
    let mut out = Vec::new();
    out.push(banner.clone());
    out.push("BUILD SUMMARY".to_string());
    out.push(banner.clone());
    out.push(format!("Total time: {}", format_duration(total.as_secs_f64())));
    out.push(String::new());

    let successful: Vec<&BuildOutcome> = outcomes.iter().filter(|o| o.success).collect();
    let failed: Vec<&BuildOutcome> = outcomes.iter().filter(|o| !o.success).collect();

    if !successful.is_empty() {
        out.push("SUCCESSFUL BUILDS:".to_string());
        for o in &successful {
            out.push(format!("  ✓ {} ({})", o.host, outcome_duration(o)));
        }
        out.push(String::new());
    }

    if !failed.is_empty() {
        out.push("FAILED BUILDS:".to_string());
        for o in &failed {
            out.push(format!("  ✗ {} ({})", o.host, outcome_duration(o)));
            if let Some(ref err) = o.error {
                out.push(format!("    Error: {}", err));
            }
        }
        out.push(String::new());
    }

    if outcomes.is_empty() {
        out.push("No builds completed".to_string());
    } else {
        let rate = successful.len() as f64 / outcomes.len() as f64 * 100.0;
        out.push(format!(
            "Overall: {}/{} builds successful ({:.1}%)",
            successful.len(),
            outcomes.len(),
            rate
        ));
    }
    out.push(banner);
    out.join("\n")
}

fn outcome_duration(outcome: &BuildOutcome) -> String {
    match outcome.duration {
        Some(d) => format_duration(d.as_secs_f64()),
        None => "unknown".to_string(),
    }
}
