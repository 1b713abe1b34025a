use crate::io;
use crate::parse::epic::Epic;
use crate::parse::status::StatusDocument;
use crate::parse::story::Story;
use crate::paths::{self, classify_artifact, ArtifactKind};
use crate::recommend::{recommend, InstalledWorkflows};
use crate::snapshot::{DashboardState, WATCHER_ERROR_PATH};
use crate::types::{ItemKey, Lifecycle};
use crate::watcher::{ChangeBatch, ChangeKind, WatchError};
use futures::future::join_all;
use std::path::{Path, PathBuf};
use tokio::sync::{mpsc, watch};

// ---------------------------------------------------------------------------
// ArtifactSync
// ---------------------------------------------------------------------------

/// Owns the merged snapshot and keeps it in sync with the artifact files.
///
/// All mutation happens inside discrete handlers (`initialize`, `refresh`,
/// `apply_batch`) that run to completion before the next one; the snapshot
/// is published as an immutable copy through a watch channel, so readers
/// never observe a torn update. Change batches that arrive while
/// `initialize` runs sit in the watcher's channel and are replayed in
/// arrival order by `run`.
pub struct ArtifactSync {
    root: PathBuf,
    installed: InstalledWorkflows,
    state: DashboardState,
    tx: watch::Sender<DashboardState>,
}

impl ArtifactSync {
    pub fn new(
        root: impl Into<PathBuf>,
        installed: InstalledWorkflows,
    ) -> (Self, watch::Receiver<DashboardState>) {
        let root = root.into();
        let state = DashboardState::new(&root);
        let (tx, rx) = watch::channel(state.clone());
        (
            Self {
                root,
                installed,
                state,
                tx,
            },
            rx,
        )
    }

    /// Latest settled snapshot, by value.
    pub fn snapshot(&self) -> DashboardState {
        self.state.clone()
    }

    /// Another handle for subscribers.
    pub fn subscribe(&self) -> watch::Receiver<DashboardState> {
        self.tx.subscribe()
    }

    /// Full parse of all three artifact kinds, then one notification.
    pub async fn initialize(&mut self) {
        self.full_parse().await;
        self.state.loading = false;
        self.publish();
    }

    /// Drop all errors, re-read everything from disk.
    pub async fn refresh(&mut self) {
        self.state.loading = true;
        self.state.errors.clear();
        self.publish();

        self.full_parse().await;
        self.state.loading = false;
        self.publish();
    }

    /// Serve batched change events and watcher errors until both channels
    /// close. Call after `initialize`.
    pub async fn run(
        mut self,
        mut batches: mpsc::Receiver<ChangeBatch>,
        mut watch_errors: mpsc::Receiver<WatchError>,
    ) {
        let mut errors_open = true;
        loop {
            tokio::select! {
                batch = batches.recv() => match batch {
                    Some(batch) => self.apply_batch(batch).await,
                    None => break,
                },
                err = watch_errors.recv(), if errors_open => match err {
                    Some(err) => {
                        // Re-tag the side-channel failure into the snapshot's
                        // error list under a synthetic path.
                        self.state.record_error_tagged(
                            WATCHER_ERROR_PATH,
                            err.message,
                            err.recoverable,
                        );
                        self.publish();
                    }
                    None => errors_open = false,
                },
            }
        }
    }

    // -----------------------------------------------------------------------
    // Batched change handling
    // -----------------------------------------------------------------------

    /// Apply one batched change event: deletes first (synchronously, no
    /// file reads), then all surviving paths re-parsed concurrently, then
    /// exactly one notification.
    pub async fn apply_batch(&mut self, batch: ChangeBatch) {
        let mut status_path: Option<PathBuf> = None;
        let mut epics_path: Option<PathBuf> = None;
        let mut story_paths: Vec<PathBuf> = Vec::new();

        for (path, kind) in &batch.changes {
            let kind_class = classify_artifact(path);
            if *kind == ChangeKind::Removed {
                self.apply_delete(path, kind_class);
                continue;
            }
            match kind_class {
                ArtifactKind::Status => status_path = Some(path.clone()),
                ArtifactKind::Epics => epics_path = Some(path.clone()),
                ArtifactKind::Story => story_paths.push(path.clone()),
                ArtifactKind::Irrelevant => {}
            }
        }

        let (status_res, epics_res, story_results) = tokio::join!(
            async {
                match &status_path {
                    Some(p) => Some(load_status(p).await),
                    None => None,
                }
            },
            async {
                match &epics_path {
                    Some(p) => Some(load_epics(p).await),
                    None => None,
                }
            },
            join_all(
                story_paths
                    .iter()
                    .map(|p| async move { (p.clone(), load_story(p).await) })
            ),
        );

        if let (Some(path), Some(res)) = (&status_path, status_res) {
            self.apply_status_result(path, res);
        }
        if let (Some(path), Some(res)) = (&epics_path, epics_res) {
            self.apply_epics_result(path, res);
        }
        for (path, res) in story_results {
            self.apply_story_result(&path, res);
        }

        self.state.phase = paths::phase_flags(&self.root);
        self.overlay_status();
        self.recompute_current_story();
        self.publish();
    }

    fn apply_delete(&mut self, path: &Path, kind: ArtifactKind) {
        let display = path.display().to_string();
        match kind {
            ArtifactKind::Status => {
                self.state.status = None;
                self.state.clear_error(&display);
            }
            ArtifactKind::Epics => {
                self.state.epics.clear();
                self.state.clear_error(&display);
            }
            ArtifactKind::Story => {
                if let Some(key) = paths::story_key_from_path(path) {
                    self.state.stories.remove(&key);
                }
                self.state.clear_error(&display);
            }
            ArtifactKind::Irrelevant => {}
        }
    }

    // -----------------------------------------------------------------------
    // Full parse (status -> epics -> stories; overlay depends on status)
    // -----------------------------------------------------------------------

    async fn full_parse(&mut self) {
        self.state.phase = paths::phase_flags(&self.root);

        let status_path = paths::status_path(&self.root);
        match load_status_optional(&status_path).await {
            Ok(status) => {
                self.state.status = status;
                self.state.clear_error(&status_path.display().to_string());
            }
            Err(msg) => {
                self.state
                    .record_error(status_path.display().to_string(), msg);
            }
        }

        let epics_path = paths::epics_path(&self.root);
        match load_epics_optional(&epics_path).await {
            Ok(epics) => {
                self.state.epics = epics;
                self.state.clear_error(&epics_path.display().to_string());
            }
            Err(msg) => {
                self.state
                    .record_error(epics_path.display().to_string(), msg);
            }
        }

        self.state.stories.clear();
        let dir = self.stories_dir();
        for (path, res) in load_story_dir(&dir).await {
            self.apply_story_result(&path, res);
        }

        self.overlay_status();
        self.recompute_current_story();
    }

    /// Story directory from the status document's `story_location`,
    /// falling back to the conventional location.
    fn stories_dir(&self) -> PathBuf {
        match &self.state.status {
            Some(status) => self.root.join(&status.story_location),
            None => paths::stories_dir(&self.root),
        }
    }

    // -----------------------------------------------------------------------
    // Result application (per-path error dedup: success clears, failure
    // replaces; at most one live error per source path)
    // -----------------------------------------------------------------------

    fn apply_status_result(&mut self, path: &Path, res: Result<StatusDocument, String>) {
        let path_str = path.display().to_string();
        match res {
            Ok(doc) => {
                self.state.status = Some(doc);
                self.state.clear_error(&path_str);
            }
            Err(msg) => {
                tracing::warn!(path = %path_str, error = %msg, "status parse failed");
                self.state.record_error(path_str, msg);
            }
        }
    }

    fn apply_epics_result(&mut self, path: &Path, res: Result<Vec<Epic>, String>) {
        let path_str = path.display().to_string();
        match res {
            Ok(epics) => {
                self.state.epics = epics;
                self.state.clear_error(&path_str);
            }
            Err(msg) => {
                tracing::warn!(path = %path_str, error = %msg, "epics parse failed");
                self.state.record_error(path_str, msg);
            }
        }
    }

    fn apply_story_result(&mut self, path: &Path, res: Result<Story, String>) {
        let path_str = path.display().to_string();
        match res {
            Ok(story) => {
                self.state.stories.insert(story.key.clone(), story);
                self.state.clear_error(&path_str);
            }
            Err(msg) => {
                tracing::warn!(path = %path_str, error = %msg, "story parse failed");
                self.state.record_error(path_str, msg);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Derived facts
    // -----------------------------------------------------------------------

    /// Fill epic and story-entry statuses from the status document.
    fn overlay_status(&mut self) {
        let entries = match &self.state.status {
            Some(status) => status.development_status.clone(),
            None => Vec::new(),
        };
        for epic in &mut self.state.epics {
            epic.status = entries
                .iter()
                .find(|e| matches!(e.item, ItemKey::Epic { number } if number == epic.number))
                .map(|e| e.state)
                .unwrap_or(Lifecycle::Backlog);
            for entry in &mut epic.stories {
                let Some(ItemKey::Story {
                    epic: en,
                    story: sn,
                    suffix,
                    ..
                }) = ItemKey::classify(&entry.key)
                else {
                    continue;
                };
                entry.status = entries
                    .iter()
                    .find(|e| {
                        matches!(
                            &e.item,
                            ItemKey::Story { epic, story, suffix: sf, .. }
                                if *epic == en && *story == sn && *sf == suffix
                        )
                    })
                    .map(|e| e.state);
            }
        }
    }

    /// First story entry in status-document order whose state is actionable
    /// and whose key resolves in the story map.
    fn recompute_current_story(&mut self) {
        let current = self.state.status.as_ref().and_then(|status| {
            status.development_status.iter().find_map(|e| {
                (e.item.is_story()
                    && e.state.is_actionable()
                    && self.state.stories.contains_key(&e.key))
                .then(|| e.key.clone())
            })
        });
        self.state.current_story = current;
    }

    fn publish(&mut self) {
        self.state.actions = recommend(&self.state, &self.installed);
        self.tx.send_replace(self.state.clone());
    }
}

// ---------------------------------------------------------------------------
// Loading helpers
// ---------------------------------------------------------------------------

async fn load_status(path: &Path) -> Result<StatusDocument, String> {
    let text = io::read_artifact(path).await.map_err(|e| e.to_string())?;
    crate::parse::status::parse_status(&text).map_err(|f| f.message)
}

/// Like `load_status` but a missing file is the normal "no status yet"
/// state, not an error.
async fn load_status_optional(path: &Path) -> Result<Option<StatusDocument>, String> {
    match io::read_artifact(path).await {
        Ok(text) => crate::parse::status::parse_status(&text)
            .map(Some)
            .map_err(|f| f.message),
        Err(crate::PlansyncError::FileNotFound(_)) => Ok(None),
        Err(e) => Err(e.to_string()),
    }
}

async fn load_epics(path: &Path) -> Result<Vec<Epic>, String> {
    let text = io::read_artifact(path).await.map_err(|e| e.to_string())?;
    crate::parse::epic::parse_epics(&text, Some(path)).map_err(|f| f.message)
}

async fn load_epics_optional(path: &Path) -> Result<Vec<Epic>, String> {
    match io::read_artifact(path).await {
        Ok(text) => crate::parse::epic::parse_epics(&text, Some(path)).map_err(|f| f.message),
        Err(crate::PlansyncError::FileNotFound(_)) => Ok(Vec::new()),
        Err(e) => Err(e.to_string()),
    }
}

async fn load_story(path: &Path) -> Result<Story, String> {
    let text = io::read_artifact(path).await.map_err(|e| e.to_string())?;
    crate::parse::story::parse_story(&text, Some(path)).map_err(|f| f.message)
}

/// Discover and parse every canonical story file in `dir`, concurrently.
async fn load_story_dir(dir: &Path) -> Vec<(PathBuf, Result<Story, String>)> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let story_paths: Vec<PathBuf> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| classify_artifact(p) == ArtifactKind::Story)
        .collect();
    join_all(
        story_paths
            .into_iter()
            .map(|p| async move { (p.clone(), load_story(&p).await) }),
    )
    .await
}
