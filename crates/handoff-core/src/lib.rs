/// Handoff core: shared pieces of the handoff throughput benchmark.
///
/// Both mechanisms (filesystem rename signalling and HTTP upload) report
/// through the same record/reporter types so their numbers line up:
/// - Round records and CSV/summary reporting
/// - Payload generation and SHA-256 integrity digests
/// - Environment-driven configuration
/// - The benchmark orchestrator driving (size, repetition) rounds

pub mod bench;
pub mod config;
pub mod error;
pub mod payload;
pub mod record;
pub mod report;
pub mod wire;

pub use bench::{RoundRunner, run_benchmark};
pub use config::{BenchConfig, FailurePolicy, FsConfig, NetConfig};
pub use error::{BenchError, ConfigError, RoundError};
pub use payload::{random_payload, sha256_hex};
pub use record::{CSV_HEADER, Mechanism, RoundRecord};
pub use report::{BenchSummary, Reporter, SizeSummary};
pub use wire::{ErrorBody, UploadReceipt};
