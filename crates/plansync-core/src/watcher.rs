use crate::paths::is_watched_file;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Quiet period between the last raw filesystem event and the batched
/// notification. New events reset the timer; they never stack timers.
pub const QUIET_PERIOD: Duration = Duration::from_millis(500);

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Created,
    Modified,
    Removed,
}

/// One batched notification per debounce window: every path changed during
/// the window, deduplicated, with the most recent kind winning per path.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeBatch {
    pub changes: BTreeMap<PathBuf, ChangeKind>,
}

/// Error reported through the watcher's side channel, never through the
/// batch stream.
#[derive(Debug, Clone, PartialEq)]
pub struct WatchError {
    pub message: String,
    pub recoverable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    Stopped,
    Starting,
    Running,
    Error,
}

#[derive(Debug)]
enum RawEvent {
    Change(PathBuf, ChangeKind),
    Error(String),
}

// ---------------------------------------------------------------------------
// ArtifactWatcher
// ---------------------------------------------------------------------------

/// Watches the output root for artifact file changes and coalesces bursts
/// into single batched notifications.
///
/// Lifecycle: `stopped -> starting -> running`, or `starting -> error`;
/// `running` and `error` both allow `stop()` and `restart()`. `start()` is
/// a no-op unless stopped.
pub struct ArtifactWatcher {
    root: PathBuf,
    quiet: Duration,
    state: WatcherState,
    batch_tx: mpsc::Sender<ChangeBatch>,
    error_tx: mpsc::Sender<WatchError>,
    inner: Option<RecommendedWatcher>,
    debouncer: Option<JoinHandle<()>>,
}

impl ArtifactWatcher {
    pub fn new(
        root: impl Into<PathBuf>,
    ) -> (Self, mpsc::Receiver<ChangeBatch>, mpsc::Receiver<WatchError>) {
        Self::with_quiet_period(root, QUIET_PERIOD)
    }

    pub fn with_quiet_period(
        root: impl Into<PathBuf>,
        quiet: Duration,
    ) -> (Self, mpsc::Receiver<ChangeBatch>, mpsc::Receiver<WatchError>) {
        let (batch_tx, batch_rx) = mpsc::channel(16);
        let (error_tx, error_rx) = mpsc::channel(16);
        let watcher = Self {
            root: root.into(),
            quiet,
            state: WatcherState::Stopped,
            batch_tx,
            error_tx,
            inner: None,
            debouncer: None,
        };
        (watcher, batch_rx, error_rx)
    }

    pub fn state(&self) -> WatcherState {
        self.state
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Start watching. Must be called from within a tokio runtime.
    pub fn start(&mut self) {
        if self.state != WatcherState::Stopped {
            return;
        }
        self.state = WatcherState::Starting;

        // A missing root is not a fault; it may simply not exist yet.
        if !self.root.is_dir() {
            tracing::debug!(root = %self.root.display(), "watch root missing, staying stopped");
            self.state = WatcherState::Stopped;
            return;
        }

        let (raw_tx, raw_rx) = mpsc::unbounded_channel();
        let forward = raw_tx;
        let callback = move |res: notify::Result<Event>| match res {
            Ok(event) => {
                let Some(kind) = map_kind(&event.kind) else {
                    return;
                };
                for path in event.paths {
                    if is_watched_file(&path) {
                        let _ = forward.send(RawEvent::Change(path, kind));
                    }
                }
            }
            Err(e) => {
                let _ = forward.send(RawEvent::Error(e.to_string()));
            }
        };

        let mut inner = match notify::recommended_watcher(callback) {
            Ok(w) => w,
            Err(e) => return self.fail_start(e),
        };
        if let Err(e) = inner.watch(&self.root, RecursiveMode::Recursive) {
            return self.fail_start(e);
        }

        self.inner = Some(inner);
        self.debouncer = Some(spawn_debouncer(
            raw_rx,
            self.batch_tx.clone(),
            self.error_tx.clone(),
            self.quiet,
        ));
        self.state = WatcherState::Running;
        tracing::info!(root = %self.root.display(), "artifact watcher running");
    }

    /// Stop watching. Cancels the pending timer and discards unflushed
    /// changes; no batch fires for work already stopped.
    pub fn stop(&mut self) {
        self.inner = None;
        if let Some(task) = self.debouncer.take() {
            task.abort();
        }
        if self.state != WatcherState::Stopped {
            tracing::debug!(root = %self.root.display(), "artifact watcher stopped");
        }
        self.state = WatcherState::Stopped;
    }

    pub fn restart(&mut self) {
        self.stop();
        self.start();
    }

    fn fail_start(&mut self, e: notify::Error) {
        self.state = WatcherState::Error;
        let message = crate::PlansyncError::WatchRegistration {
            path: self.root.display().to_string(),
            reason: e.to_string(),
        }
        .to_string();
        tracing::warn!(error = %message, "watcher start failed");
        let _ = self.error_tx.try_send(WatchError {
            message,
            recoverable: true,
        });
    }
}

impl Drop for ArtifactWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

fn map_kind(kind: &EventKind) -> Option<ChangeKind> {
    match kind {
        EventKind::Create(_) => Some(ChangeKind::Created),
        EventKind::Modify(_) => Some(ChangeKind::Modified),
        EventKind::Remove(_) => Some(ChangeKind::Removed),
        EventKind::Access(_) => None,
        EventKind::Any | EventKind::Other => Some(ChangeKind::Modified),
    }
}

// ---------------------------------------------------------------------------
// Debouncer
// ---------------------------------------------------------------------------

/// Accumulate raw events into a pending map and flush it as one batch once
/// the quiet period elapses with no further events.
fn spawn_debouncer(
    mut raw_rx: mpsc::UnboundedReceiver<RawEvent>,
    batch_tx: mpsc::Sender<ChangeBatch>,
    error_tx: mpsc::Sender<WatchError>,
    quiet: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut pending: BTreeMap<PathBuf, ChangeKind> = BTreeMap::new();
        let mut deadline: Option<Instant> = None;
        loop {
            let current = deadline;
            tokio::select! {
                raw = raw_rx.recv() => match raw {
                    None => break,
                    Some(RawEvent::Change(path, kind)) => {
                        pending.insert(path, kind);
                        deadline = Some(Instant::now() + quiet);
                    }
                    Some(RawEvent::Error(message)) => {
                        let _ = error_tx
                            .send(WatchError { message, recoverable: true })
                            .await;
                    }
                },
                _ = sleep_until_or_never(current) => {
                    deadline = None;
                    if !pending.is_empty() {
                        let batch = ChangeBatch {
                            changes: std::mem::take(&mut pending),
                        };
                        tracing::debug!(paths = batch.changes.len(), "flushing change batch");
                        if batch_tx.send(batch).await.is_err() {
                            break;
                        }
                    }
                }
            }
        }
    })
}

async fn sleep_until_or_never(deadline: Option<Instant>) {
    match deadline {
        Some(d) => tokio::time::sleep_until(d).await,
        None => std::future::pending().await,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
