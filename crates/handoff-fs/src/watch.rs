use std::ffi::OsStr;
use std::path::Path;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc::{self, error::TryRecvError};

/// Non-recursive change subscription on the shared directory.
///
/// `notify` delivers on its own thread; events are bridged into an
/// unbounded channel so the owning task can await them. Dropping the
/// watcher ends the subscription.
pub struct DirWatcher {
    _watcher: RecommendedWatcher,
    rx: mpsc::UnboundedReceiver<notify::Result<Event>>,
    #[cfg(test)]
    tx: mpsc::UnboundedSender<notify::Result<Event>>,
}

impl DirWatcher {
    pub fn watch(dir: &Path) -> notify::Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        #[cfg(test)]
        let injector = tx.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let _ = tx.send(res);
        })?;
        watcher.watch(dir, RecursiveMode::NonRecursive)?;
        Ok(Self {
            _watcher: watcher,
            rx,
            #[cfg(test)]
            tx: injector,
        })
    }

    /// Handle for feeding notifications as if `notify` had delivered them.
    #[cfg(test)]
    pub(crate) fn injector(&self) -> mpsc::UnboundedSender<notify::Result<Event>> {
        self.tx.clone()
    }

    /// Next notification. `None` means the subscription is gone.
    pub async fn next(&mut self) -> Option<notify::Result<Event>> {
        self.rx.recv().await
    }

    /// Consume everything already queued without waiting. Returns whether
    /// any of it signalled `name`.
    pub fn drain(&mut self, name: &str) -> notify::Result<bool> {
        let mut hit = false;
        loop {
            match self.rx.try_recv() {
                Ok(Ok(event)) => hit |= signals(&event, name),
                Ok(Err(e)) => return Err(e),
                Err(TryRecvError::Empty) => return Ok(hit),
                Err(TryRecvError::Disconnected) => {
                    return Err(notify::Error::generic("watch channel closed"));
                }
            }
        }
    }
}

/// Whether `event` is a hint that `name` may have appeared.
///
/// Creates and modifies are treated alike: an atomic rename surfaces as
/// either depending on the platform, and only an existence check says what
/// is actually there. A rescan request or an unclassified event means the
/// backend lost track, so it signals every name.
pub fn signals(event: &Event, name: &str) -> bool {
    if event.need_rescan() || matches!(event.kind, EventKind::Other) {
        return true;
    }
    let relevant = matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Any
    );
    relevant
        && event
            .paths
            .iter()
            .any(|p| p.file_name() == Some(OsStr::new(name)))
}
