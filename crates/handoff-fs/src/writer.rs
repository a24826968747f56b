use std::time::{Duration, Instant};

use handoff_core::{FsConfig, Mechanism, RoundError, RoundRunner, random_payload};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::layout::{ACK_NAME, HandoffDir, exists, remove_quietly};
use crate::watch::{self, DirWatcher};

/// Existence-poll interval used only when no watcher is available.
const ACK_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Producer-side state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    WaitingForBeacon,
    Idle,
    RoundRunning,
}

/// Filesystem producer and benchmark round driver.
///
/// Owns `payload.tmp`/`payload.ready` and every delete in the shared
/// directory. Round N+1 never starts before round N's ack was seen and
/// removed.
pub struct FsWriter {
    dir: HandoffDir,
    fsync: bool,
    ack_timeout: Option<Duration>,
    beacon_poll: Duration,
    medium: Option<String>,
    state: WriterState,
    watcher: Option<DirWatcher>,
}

impl FsWriter {
    pub fn new(config: &FsConfig, medium: Option<String>) -> Self {
        Self {
            dir: HandoffDir::new(&config.data_dir),
            fsync: config.fsync,
            ack_timeout: config.ack_timeout,
            beacon_poll: config.beacon_poll,
            medium,
            state: WriterState::WaitingForBeacon,
            watcher: None,
        }
    }

    pub fn state(&self) -> WriterState {
        self.state
    }

    /// Block until the Reader's beacon exists. Polls at `beacon_poll`, so
    /// the two processes may start in either order.
    pub async fn wait_for_reader(&mut self) -> Result<(), RoundError> {
        if self.state != WriterState::WaitingForBeacon {
            return Ok(());
        }
        self.dir
            .ensure()
            .await
            .map_err(RoundError::io("create shared directory"))?;

        let beacon = self.dir.beacon();
        let mut ticker = tokio::time::interval(self.beacon_poll);
        let mut announced = false;
        loop {
            ticker.tick().await;
            if exists(&beacon).await {
                break;
            }
            if !announced {
                info!("Waiting for reader beacon at {}", beacon.display());
                announced = true;
            }
        }
        info!("Reader is up ({})", self.dir.root().display());

        self.ensure_watcher();
        self.state = WriterState::Idle;
        Ok(())
    }

    fn ensure_watcher(&mut self) {
        if self.watcher.is_some() {
            return;
        }
        match DirWatcher::watch(self.dir.root()) {
            Ok(w) => self.watcher = Some(w),
            Err(e) => warn!("Directory watch unavailable ({}); ack wait will poll", e),
        }
    }

    /// Remove anything a previous round left behind. A leftover here is a
    /// bug upstream, so it is logged rather than silently absorbed.
    async fn clear_leftovers(&self) {
        for path in [self.dir.tmp(), self.dir.ready(), self.dir.ack()] {
            if remove_quietly(&path).await {
                warn!("Removed leftover {} before round", path.display());
            }
        }
    }

    async fn write_payload(&self, payload: &[u8]) -> Result<(), RoundError> {
        let mut file = fs::File::create(self.dir.tmp())
            .await
            .map_err(RoundError::io("create payload.tmp"))?;
        file.write_all(payload)
            .await
            .map_err(RoundError::io("write payload.tmp"))?;
        file.flush()
            .await
            .map_err(RoundError::io("flush payload.tmp"))?;
        if self.fsync {
            file.sync_all()
                .await
                .map_err(RoundError::io("fsync payload.tmp"))?;
        }
        Ok(())
    }

    async fn round(&mut self, size: usize) -> Result<Duration, RoundError> {
        self.clear_leftovers().await;
        self.ensure_watcher();
        if let Some(watcher) = self.watcher.as_mut() {
            // Queued hints from the previous round only name deleted files.
            if let Err(e) = watcher.drain(ACK_NAME) {
                warn!("Directory watch error: {}; re-subscribing", e);
                self.watcher = None;
                self.ensure_watcher();
            }
        }

        let started = Instant::now();
        let payload = random_payload(size);
        self.write_payload(&payload).await?;

        // The single publish step: the Reader only ever sees a complete file.
        fs::rename(self.dir.tmp(), self.dir.ready())
            .await
            .map_err(RoundError::io("rename payload.tmp to payload.ready"))?;

        self.await_ack().await?;
        let elapsed = started.elapsed();

        // Ready before ack: an acknowledged payload must never look pending.
        remove_quietly(&self.dir.ready()).await;
        remove_quietly(&self.dir.ack()).await;
        debug!("Round complete: {} bytes in {:?}", size, elapsed);

        Ok(elapsed)
    }

    async fn await_ack(&mut self) -> Result<(), RoundError> {
        match self.ack_timeout {
            Some(limit) => tokio::time::timeout(limit, self.wait_ack_signal())
                .await
                .map_err(|_| RoundError::AckTimeout(limit)),
            None => {
                self.wait_ack_signal().await;
                Ok(())
            }
        }
    }

    /// Event-driven where possible. The watcher was attached before the
    /// publish, so an ack can't slip in ahead of the subscription; the
    /// existence check up front covers events that already fired.
    async fn wait_ack_signal(&mut self) {
        let ack = self.dir.ack();
        if exists(&ack).await {
            return;
        }

        if let Some(watcher) = self.watcher.as_mut() {
            loop {
                match watcher.next().await {
                    Some(Ok(event)) => {
                        if watch::signals(&event, ACK_NAME) && exists(&ack).await {
                            return;
                        }
                    }
                    Some(Err(e)) => {
                        warn!("Directory watch error while waiting for ack: {}; polling", e);
                        break;
                    }
                    None => {
                        warn!("Directory watch closed while waiting for ack; polling");
                        break;
                    }
                }
            }
            self.watcher = None;
        }

        while !exists(&ack).await {
            tokio::time::sleep(ACK_POLL_INTERVAL).await;
        }
    }
}

impl RoundRunner for FsWriter {
    fn mechanism(&self) -> Mechanism {
        Mechanism::file(self.medium.clone())
    }

    async fn run_round(&mut self, size: usize, rep: u32) -> Result<Duration, RoundError> {
        self.wait_for_reader().await?;
        debug!("Round start: size={} rep={}", size, rep);
        self.state = WriterState::RoundRunning;
        let result = self.round(size).await;
        self.state = WriterState::Idle;
        result
    }
}
