use std::time::Duration;

use thiserror::Error;

/// A single round failed. The benchmark never retries: a retry would
/// corrupt the timing of the round it replaces.
#[derive(Debug, Error)]
pub enum RoundError {
    #[error("IO error: {context} - {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP {0}")]
    HttpStatus(u16),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Ack not observed within {0:?}")]
    AckTimeout(Duration),

    /// Data was corrupted in transit. Never a transient failure.
    #[error(
        "Checksum mismatch: expected {expected_len} bytes sha256={expected_sha256}, \
         receiver reported {actual_len} bytes sha256={actual_sha256}"
    )]
    ChecksumMismatch {
        expected_len: u64,
        actual_len: u64,
        expected_sha256: String,
        actual_sha256: String,
    },
}

impl RoundError {
    /// Adapter for `map_err` on filesystem calls.
    pub fn io(context: &'static str) -> impl FnOnce(std::io::Error) -> Self {
        move |source| Self::Io { context, source }
    }

    /// Stable label used in the `failure` log field.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Io { .. } => "io",
            Self::HttpStatus(_) => "http_status",
            Self::Transport(_) => "transport",
            Self::Timeout(_) => "timeout",
            Self::AckTimeout(_) => "ack_timeout",
            Self::ChecksumMismatch { .. } => "integrity",
        }
    }

    pub fn is_integrity(&self) -> bool {
        matches!(self, Self::ChecksumMismatch { .. })
    }
}

/// Invalid configuration. Raised before any round runs.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("SIZES must be set (comma-separated byte counts)")]
    MissingSizes,

    #[error("Invalid payload size {0:?}: sizes must be positive integers")]
    InvalidSize(String),

    #[error("Invalid value for {key}: {value:?} ({reason})")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: &'static str,
    },
}

/// Errors surfaced by the benchmark orchestrator.
#[derive(Debug, Error)]
pub enum BenchError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Round size={size} rep={rep} failed: {source}")]
    RoundFailed {
        size: usize,
        rep: u32,
        #[source]
        source: RoundError,
    },

    #[error("Failed to write report: {0}")]
    Report(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integrity_failures_have_their_own_category() {
        let mismatch = RoundError::ChecksumMismatch {
            expected_len: 4,
            actual_len: 4,
            expected_sha256: "aa".into(),
            actual_sha256: "bb".into(),
        };
        assert!(mismatch.is_integrity());
        assert_eq!(mismatch.category(), "integrity");

        let status = RoundError::HttpStatus(500);
        assert!(!status.is_integrity());
        assert_eq!(status.category(), "http_status");
        assert_eq!(status.to_string(), "HTTP 500");

        let timeout = RoundError::Timeout(Duration::from_secs(1));
        assert_ne!(timeout.category(), mismatch.category());
    }

    #[test]
    fn io_adapter_keeps_context() {
        let err = RoundError::io("open ready signal")(std::io::Error::from(
            std::io::ErrorKind::NotFound,
        ));
        assert_eq!(err.category(), "io");
        assert!(err.to_string().starts_with("IO error: open ready signal"));
    }
}
