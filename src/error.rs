use thiserror::Error;

/// How badly an error affects the run as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Abort the entire run.
    Critical,
    /// Fail the affected host, keep the others going.
    High,
    /// Degrade a feature (e.g. cache disabled) and warn.
    Medium,
    /// Log only.
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    Resolve,
    Connect,
    Transfer,
    Execute,
    Stalled,
    Cancelled,
    Render,
    CacheIo,
    Internal,
}

impl ErrorKind {
    pub fn severity(self) -> Severity {
        match self {
            Self::Config => Severity::Critical,
            Self::Resolve => Severity::High,
            Self::Connect => Severity::High,
            Self::Transfer => Severity::High,
            Self::Execute => Severity::High,
            Self::Stalled => Severity::High,
            Self::Cancelled => Severity::Low,
            Self::Render => Severity::Medium,
            Self::CacheIo => Severity::Medium,
            Self::Internal => Severity::Critical,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Config => "config",
            Self::Resolve => "resolve",
            Self::Connect => "connect",
            Self::Transfer => "transfer",
            Self::Execute => "execute",
            Self::Stalled => "stalled",
            Self::Cancelled => "cancelled",
            Self::Render => "render",
            Self::CacheIo => "cache_io",
            Self::Internal => "internal",
        }
    }
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("invalid arguments: {0}")]
    Config(String),

    #[error("cannot parse host entry '{0}' (expected user@hostname)")]
    Resolve(String),

    #[error("SSH connection failed for {host}: {message}")]
    Connect { host: String, message: String },

    #[error("file transfer failed for {host}: {message}")]
    Transfer { host: String, message: String },

    #[error("build failed on {host}: {message}")]
    Execute { host: String, message: String },

    #[error("no output from {host} for {idle_secs}s")]
    Stalled { host: String, idle_secs: u64 },

    #[error("build cancelled on {host}")]
    Cancelled { host: String },

    #[error("terminal rendering failed: {0}")]
    Render(String),

    #[error("cache I/O failed: {0}")]
    CacheIo(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl BuildError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Config,
            Self::Resolve(_) => ErrorKind::Resolve,
            Self::Connect { .. } => ErrorKind::Connect,
            Self::Transfer { .. } => ErrorKind::Transfer,
            Self::Execute { .. } => ErrorKind::Execute,
            Self::Stalled { .. } => ErrorKind::Stalled,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
            Self::Render(_) => ErrorKind::Render,
            Self::CacheIo(_) => ErrorKind::CacheIo,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn severity(&self) -> Severity {
        self.kind().severity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_labels() {
        assert_eq!(ErrorKind::Connect.label(), "connect");
        assert_eq!(ErrorKind::CacheIo.label(), "cache_io");
    }

    #[test]
    fn test_severity_mapping() {
        let err = BuildError::Connect {
            host: "u@a".to_string(),
            message: "refused".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::Connect);
        assert_eq!(err.severity(), Severity::High);

        let cache = BuildError::CacheIo("disk full".to_string());
        assert_eq!(cache.severity(), Severity::Medium);
    }
}
