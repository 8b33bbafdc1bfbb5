use chrono::{DateTime, Utc};
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex, OnceLock};

const MAX_ENTRIES: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn label(self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

struct LogBuffer {
    entries: Vec<LogEntry>,
}

fn global() -> &'static Arc<Mutex<LogBuffer>> {
    static INSTANCE: OnceLock<Arc<Mutex<LogBuffer>>> = OnceLock::new();
    INSTANCE.get_or_init(|| {
        Arc::new(Mutex::new(LogBuffer {
            entries: Vec::new(),
        }))
    })
}

pub fn push(level: LogLevel, msg: String) {
    let mut buf = global().lock().unwrap();
    buf.entries.push(LogEntry {
        timestamp: Utc::now(),
        level,
        message: msg,
    });
    if buf.entries.len() > MAX_ENTRIES {
        let excess = buf.entries.len() - MAX_ENTRIES;
        buf.entries.drain(..excess);
    }
}

pub fn entries() -> Vec<LogEntry> {
    global().lock().unwrap().entries.clone()
}

/// Flush the ring to a file (`--debug` does this at shutdown).
pub fn dump_to_file(path: &Path) -> std::io::Result<()> {
    let entries = entries();
    let mut file = std::fs::File::create(path)?;
    for entry in entries {
        writeln!(
            file,
            "{} [{}] {}",
            entry.timestamp.format("%Y-%m-%dT%H:%M:%S%.3fZ"),
            entry.level.label(),
            entry.message
        )?;
    }
    Ok(())
}

#[macro_export]
macro_rules! tlog {
    (debug, $($arg:tt)*) => {
        $crate::log::push($crate::log::LogLevel::Debug, format!($($arg)*))
    };
    (info, $($arg:tt)*) => {
        $crate::log::push($crate::log::LogLevel::Info, format!($($arg)*))
    };
    (warn, $($arg:tt)*) => {
        $crate::log::push($crate::log::LogLevel::Warn, format!($($arg)*))
    };
    (error, $($arg:tt)*) => {
        $crate::log::push($crate::log::LogLevel::Error, format!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_dump() {
        push(LogLevel::Info, "connection established".to_string());
        push(LogLevel::Warn, "cache version mismatch".to_string());
        let all = entries();
        assert!(all
            .iter()
            .any(|e| e.level == LogLevel::Warn && e.message.contains("cache version")));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("debug.log");
        dump_to_file(&path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("[WARN] cache version mismatch"));
    }
}
