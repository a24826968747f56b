use std::fmt;
use std::time::Duration;

/// Column order shared by both mechanisms.
pub const CSV_HEADER: &str = "method,size_bytes,rep,elapsed_ms,throughput_mib_s";

const MIB: f64 = 1024.0 * 1024.0;

/// Which handoff produced a record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Mechanism {
    /// Rename-signalled handoff through a shared directory. The medium
    /// label (e.g. `disk`, `memory`) only affects reporting.
    File { medium: Option<String> },
    /// HTTP upload with digest verification.
    Net,
}

impl Mechanism {
    pub fn file(medium: Option<String>) -> Self {
        Self::File { medium }
    }
}

impl fmt::Display for Mechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File { medium: Some(medium) } => write!(f, "file-{}", medium),
            Self::File { medium: None } => write!(f, "file"),
            Self::Net => write!(f, "net"),
        }
    }
}

/// One successful round. Created, reported and dropped within the round.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundRecord {
    pub mechanism: Mechanism,
    pub size_bytes: usize,
    /// 1-based repetition index.
    pub rep: u32,
    pub elapsed: Duration,
}

impl RoundRecord {
    pub fn new(mechanism: Mechanism, size_bytes: usize, rep: u32, elapsed: Duration) -> Self {
        Self {
            mechanism,
            size_bytes,
            rep,
            elapsed,
        }
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed.as_secs_f64() * 1000.0
    }

    /// Binary megabytes per second. Infinite for a zero-length interval,
    /// which the platform clock can't produce for any non-trivial round.
    pub fn throughput_mib_s(&self) -> f64 {
        throughput_mib_s(self.size_bytes, self.elapsed)
    }

    /// `method,size_bytes,rep,elapsed_ms,throughput_mib_s`
    pub fn csv_line(&self) -> String {
        format!(
            "{},{},{},{:.3},{:.3}",
            self.mechanism,
            self.size_bytes,
            self.rep,
            self.elapsed_ms(),
            self.throughput_mib_s()
        )
    }
}

pub fn throughput_mib_s(size_bytes: usize, elapsed: Duration) -> f64 {
    (size_bytes as f64 / MIB) / elapsed.as_secs_f64()
}
