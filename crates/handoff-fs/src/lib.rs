/// Filesystem handoff: a producer and a consumer process sharing one
/// directory and signalling through file existence.
///
/// - `payload.tmp` → `payload.ready` rename publishes a payload (Writer)
/// - `ack.tmp` → `ack` rename acknowledges full consumption (Reader)
/// - `.reader-ready` is the Reader's process-lifetime readiness beacon
///
/// No locks: each side owns disjoint names and the Writer is the only
/// deleter, between rounds.

pub mod layout;
pub mod reader;
pub mod watch;
pub mod writer;

pub use layout::{ACK_NAME, ACK_TMP_NAME, BEACON_NAME, HandoffDir, READY_NAME, TMP_NAME};
pub use reader::{Reader, ReaderState, ReaderStats};
pub use watch::DirWatcher;
pub use writer::{FsWriter, WriterState};
