use std::future::Future;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use handoff_core::{FsConfig, RoundError};
use tokio::fs;
use tokio::io::AsyncReadExt;
use tracing::{debug, info, warn};

use crate::layout::{HandoffDir, READY_NAME, exists};
use crate::watch::{self, DirWatcher};

/// Consumer-side state. Notifications never start a second consumer:
/// a signal that lands mid-pass only owes one more pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    Idle,
    Processing,
    RecheckPending,
}

impl ReaderState {
    /// A hint arrived. Returns true when the caller should start a pass.
    fn signal(&mut self) -> bool {
        match *self {
            Self::Idle => {
                *self = Self::Processing;
                true
            }
            Self::Processing => {
                *self = Self::RecheckPending;
                false
            }
            Self::RecheckPending => false,
        }
    }

    /// A pass finished. Returns true when another pass is owed.
    fn pass_done(&mut self) -> bool {
        match *self {
            Self::RecheckPending => {
                *self = Self::Processing;
                true
            }
            Self::Processing | Self::Idle => {
                *self = Self::Idle;
                false
            }
        }
    }
}

/// Reader counters, lock-free so a test or another task can read them while
/// the reader runs.
#[derive(Debug, Default)]
pub struct ReaderStats {
    /// Payloads fully drained and acknowledged.
    pub consumed: AtomicU64,
    pub bytes_drained: AtomicU64,
    pub failures: AtomicU64,
    pub in_flight: AtomicU64,
    /// Highest `in_flight` ever observed. Stays at 1 unless exclusion broke.
    pub peak_in_flight: AtomicU64,
    pub watch_restarts: AtomicU64,
}

/// Filesystem consumer: waits for `payload.ready`, drains it, publishes `ack`.
pub struct Reader {
    dir: HandoffDir,
    chunk_size: usize,
    watch_backoff: Duration,
    state: ReaderState,
    stats: Arc<ReaderStats>,
}

impl Reader {
    pub fn new(config: &FsConfig) -> Self {
        Self {
            dir: HandoffDir::new(&config.data_dir),
            chunk_size: config.chunk_size.max(1),
            watch_backoff: config.watch_backoff,
            state: ReaderState::Idle,
            stats: Arc::new(ReaderStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<ReaderStats> {
        self.stats.clone()
    }

    pub fn state(&self) -> ReaderState {
        self.state
    }

    /// Run until `shutdown` resolves.
    pub async fn run_until(self, shutdown: impl Future<Output = ()>) -> Result<(), RoundError> {
        tokio::select! {
            res = self.run() => res,
            _ = shutdown => {
                info!("Reader shutting down");
                Ok(())
            }
        }
    }

    /// Run for the lifetime of the process. Only startup errors return;
    /// round failures and watcher hiccups are logged and survived.
    pub async fn run(mut self) -> Result<(), RoundError> {
        self.dir
            .ensure()
            .await
            .map_err(RoundError::io("create shared directory"))?;

        // Subscribe before announcing, so the beacon really means "watching".
        let watcher = self.subscribe().await;

        fs::write(self.dir.beacon(), format!("{}\n", std::process::id()))
            .await
            .map_err(RoundError::io("write readiness beacon"))?;
        info!("Reader watching {}", self.dir.root().display());

        if exists(&self.dir.ready()).await && exists(&self.dir.ack()).await {
            warn!("Stale ack alongside payload.ready at startup; leaving it for the writer");
        }

        self.watch_loop(watcher).await;
        Ok(())
    }

    /// Event loop proper; never returns.
    async fn watch_loop(&mut self, mut watcher: DirWatcher) {
        // Startup catch-up: a ready signal that predates the subscription
        // produces no event.
        let mut healthy = self.check_and_process(&mut watcher).await;

        loop {
            if healthy {
                healthy = match watcher.next().await {
                    Some(Ok(event)) => {
                        if watch::signals(&event, READY_NAME) {
                            self.check_and_process(&mut watcher).await
                        } else {
                            true
                        }
                    }
                    Some(Err(e)) => {
                        warn!("Directory watch error: {}", e);
                        false
                    }
                    None => {
                        warn!("Directory watch closed");
                        false
                    }
                };
                continue;
            }

            // Re-subscribe, then re-check: events may have been lost while
            // the old subscription was failing.
            self.stats.watch_restarts.fetch_add(1, Ordering::Relaxed);
            tokio::time::sleep(self.watch_backoff).await;
            drop(watcher);
            watcher = self.subscribe().await;
            info!("Directory watch re-established");
            healthy = self.check_and_process(&mut watcher).await;
        }
    }

    async fn subscribe(&self) -> DirWatcher {
        loop {
            match DirWatcher::watch(self.dir.root()) {
                Ok(watcher) => return watcher,
                Err(e) => {
                    warn!(
                        "Failed to watch {}: {}; retrying in {:?}",
                        self.dir.root().display(),
                        e,
                        self.watch_backoff
                    );
                    tokio::time::sleep(self.watch_backoff).await;
                }
            }
        }
    }

    /// Process pending payloads one at a time until no further pass is owed.
    /// A failed consume is retried after `watch_backoff` for as long as the
    /// payload stays pending. Returns false if the watcher reported an error
    /// along the way.
    async fn check_and_process(&mut self, watcher: &mut DirWatcher) -> bool {
        if !self.state.signal() {
            return true;
        }

        let mut healthy = true;
        loop {
            if self.dir.ready_pending().await {
                match self.consume_and_ack().await {
                    Ok(Some(bytes)) => {
                        debug!("Consumed payload ({} bytes), ack published", bytes);
                        // One more look for a signal coalesced into this pass.
                        self.state.signal();
                    }
                    Ok(None) => debug!("payload.ready vanished before it could be opened"),
                    Err(e) => {
                        self.stats.failures.fetch_add(1, Ordering::Relaxed);
                        warn!(failure = e.category(), "Consume failed: {}", e);
                        // No further event is guaranteed for a payload that is
                        // already in place, so retry while it stays pending.
                        if self.dir.ready_pending().await {
                            tokio::time::sleep(self.watch_backoff).await;
                            self.state.signal();
                        }
                    }
                }
            }

            match watcher.drain(READY_NAME) {
                Ok(true) => {
                    self.state.signal();
                }
                Ok(false) => {}
                Err(e) => {
                    warn!("Directory watch error during consume: {}", e);
                    healthy = false;
                    self.state.signal();
                }
            }

            if !self.state.pass_done() {
                return healthy;
            }
        }
    }

    /// Drain `payload.ready` to end of stream, then publish `ack` through
    /// `ack.tmp` + rename. Returns the bytes read, or `None` if the ready
    /// file disappeared before it could be opened.
    pub async fn consume_and_ack(&self) -> Result<Option<u64>, RoundError> {
        let stats = &self.stats;
        let now = stats.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        stats.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        let result = self.drain_and_publish().await;
        stats.in_flight.fetch_sub(1, Ordering::SeqCst);

        if let Ok(Some(bytes)) = result {
            stats.consumed.fetch_add(1, Ordering::Relaxed);
            stats.bytes_drained.fetch_add(bytes, Ordering::Relaxed);
        }
        result
    }

    async fn drain_and_publish(&self) -> Result<Option<u64>, RoundError> {
        let mut file = match fs::File::open(self.dir.ready()).await {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(RoundError::io("open payload.ready")(e)),
        };

        let mut buf = vec![0u8; self.chunk_size];
        let mut total: u64 = 0;
        loop {
            let n = file
                .read(&mut buf)
                .await
                .map_err(RoundError::io("read payload.ready"))?;
            if n == 0 {
                break;
            }
            total += n as u64;
        }
        drop(file);

        let ack_tmp = self.dir.ack_tmp();
        fs::write(&ack_tmp, b"ok")
            .await
            .map_err(RoundError::io("write ack.tmp"))?;
        fs::rename(&ack_tmp, self.dir.ack())
            .await
            .map_err(RoundError::io("rename ack.tmp to ack"))?;

        Ok(Some(total))
    }
}
