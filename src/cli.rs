use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};

use crate::autoexit::DEFAULT_EXIT_DELAY_SECS;
use crate::cache::{DEFAULT_KEEP_BUILDS, DEFAULT_RETENTION_DAYS};
use crate::host::parse_host_key;
use crate::layout::{FOOTER_HEIGHT, HEADER_HEIGHT, MIN_TILE_HEIGHT};

#[derive(Parser, Debug)]
#[command(
    name = "redland-forge",
    about = "Run identical autoconf builds across SSH hosts with live progress",
    version
)]
pub struct Cli {
    /// Source tarball to build on every host
    pub tarball: PathBuf,

    /// Hosts as user@hostname (repeatable, comma-splitting applied)
    pub hosts: Vec<String>,

    /// File with one user@hostname per line (# comments allowed)
    #[arg(short = 'f', long = "hosts-file")]
    pub hosts_file: Option<PathBuf>,

    /// Maximum concurrent builds (default: derived from terminal height)
    #[arg(long)]
    pub max_concurrent: Option<usize>,

    /// Seconds after the last completion before the UI exits on its own
    #[arg(long, default_value_t = DEFAULT_EXIT_DELAY_SECS)]
    pub auto_exit_delay: u64,

    /// Never exit automatically
    #[arg(long)]
    pub no_auto_exit: bool,

    /// Timing cache location
    #[arg(long)]
    pub cache_file: Option<PathBuf>,

    /// Days to retain per-host timing data
    #[arg(long, default_value_t = DEFAULT_RETENTION_DAYS)]
    pub cache_retention: u32,

    /// Recent builds kept per host
    #[arg(long, default_value_t = DEFAULT_KEEP_BUILDS)]
    pub cache_keep_builds: usize,

    /// Disable the timing cache entirely
    #[arg(long)]
    pub no_cache: bool,

    /// Hide ETA / percentage estimates
    #[arg(long)]
    pub no_progress: bool,

    /// Color output
    #[arg(long, value_enum, default_value_t = ColorMode::Auto)]
    pub color: ColorMode,

    /// Write the diagnostic ring to debug.log on exit
    #[arg(long)]
    pub debug: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColorMode {
    Auto,
    Always,
    Never,
}

/// Assemble the host list: positionals (comma-split) first, then the hosts
/// file. Entries are validated and deduplicated preserving order.
pub fn collect_hosts(cli: &Cli) -> Result<Vec<String>> {
    let mut entries: Vec<String> = Vec::new();
    for arg in &cli.hosts {
        for part in arg.split(',') {
            let part = part.trim();
            if !part.is_empty() {
                entries.push(part.to_string());
            }
        }
    }
    if let Some(path) = &cli.hosts_file {
        entries.extend(load_hosts_file(path)?);
    }

    let mut hosts = Vec::new();
    for entry in entries {
        let key = parse_host_key(&entry)?;
        if !hosts.contains(&key) {
            hosts.push(key);
        }
    }
    Ok(hosts)
}

pub fn load_hosts_file(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read hosts file {}", path.display()))?;
    Ok(content
        .lines()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(|l| l.to_string())
        .collect())
}

pub fn default_cache_file() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("redland-forge")
        .join("timing-cache.json")
}

/// How many builds to run at once when the user did not say: one per grid
/// row the terminal can show, floor 1.
pub fn derive_max_concurrent(term_height: u16) -> usize {
    let avail = term_height
        .saturating_sub(HEADER_HEIGHT)
        .saturating_sub(FOOTER_HEIGHT);
    ((avail / MIN_TILE_HEIGHT) as usize).max(1)
}

pub fn color_enabled(mode: ColorMode, stdout_is_tty: bool, term: Option<&str>) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => stdout_is_tty && term != Some("dumb"),
    }
}
