use std::io;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::debug;

pub const TMP_NAME: &str = "payload.tmp";
pub const READY_NAME: &str = "payload.ready";
pub const ACK_NAME: &str = "ack";
pub const ACK_TMP_NAME: &str = "ack.tmp";
pub const BEACON_NAME: &str = ".reader-ready";

/// The shared directory and its well-known signal paths.
#[derive(Debug, Clone)]
pub struct HandoffDir {
    root: PathBuf,
}

impl HandoffDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn tmp(&self) -> PathBuf {
        self.root.join(TMP_NAME)
    }

    pub fn ready(&self) -> PathBuf {
        self.root.join(READY_NAME)
    }

    pub fn ack(&self) -> PathBuf {
        self.root.join(ACK_NAME)
    }

    pub fn ack_tmp(&self) -> PathBuf {
        self.root.join(ACK_TMP_NAME)
    }

    pub fn beacon(&self) -> PathBuf {
        self.root.join(BEACON_NAME)
    }

    /// Create the directory if absent. Idempotent.
    pub async fn ensure(&self) -> io::Result<()> {
        fs::create_dir_all(&self.root).await
    }

    /// A payload is waiting: ready is present and not yet acknowledged.
    ///
    /// The Writer removes ready before ack, so an acknowledged payload never
    /// looks pending again.
    pub async fn ready_pending(&self) -> bool {
        exists(&self.ready()).await && !exists(&self.ack()).await
    }
}

/// Existence check. Errors count as absent; the next event re-checks.
pub async fn exists(path: &Path) -> bool {
    fs::try_exists(path).await.unwrap_or(false)
}

/// Best-effort delete. Returns whether a file was actually removed;
/// "already absent" is the normal case and other errors are only logged.
pub async fn remove_quietly(path: &Path) -> bool {
    match fs::remove_file(path).await {
        Ok(()) => true,
        Err(e) if e.kind() == io::ErrorKind::NotFound => false,
        Err(e) => {
            debug!("Failed to remove {}: {}", path.display(), e);
            false
        }
    }
}
