use crate::parse::epic::Epic;
use crate::parse::status::StatusDocument;
use crate::parse::story::Story;
use crate::paths::PhaseFlags;
use crate::recommend::Action;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Synthetic error-list key for failures reported by the watcher rather
/// than by parsing a file.
pub const WATCHER_ERROR_PATH: &str = "<watcher>";

// ---------------------------------------------------------------------------
// DashboardState
// ---------------------------------------------------------------------------

/// The merged snapshot. Owned exclusively by the aggregator and replaced
/// by value on every settled update; subscribers only ever observe a
/// complete, immutable copy.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardState {
    pub status: Option<StatusDocument>,
    pub epics: Vec<Epic>,
    /// Story key -> parsed story document.
    pub stories: BTreeMap<String, Story>,
    /// Key into `stories`; recomputed after every mutation, never set
    /// independently.
    pub current_story: Option<String>,
    pub errors: Vec<SourceError>,
    pub loading: bool,
    pub root: String,
    pub phase: PhaseFlags,
    pub actions: Vec<Action>,
}

impl DashboardState {
    pub fn new(root: &Path) -> Self {
        Self {
            status: None,
            epics: Vec::new(),
            stories: BTreeMap::new(),
            current_story: None,
            errors: Vec::new(),
            loading: true,
            root: root.display().to_string(),
            phase: PhaseFlags::default(),
            actions: Vec::new(),
        }
    }

    pub fn current_story_doc(&self) -> Option<&Story> {
        self.stories.get(self.current_story.as_deref()?)
    }

    // -----------------------------------------------------------------------
    // Error list (at most one live entry per source path)
    // -----------------------------------------------------------------------

    pub fn record_error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.record_error_tagged(path, message, false);
    }

    pub fn record_error_tagged(
        &mut self,
        path: impl Into<String>,
        message: impl Into<String>,
        recoverable: bool,
    ) {
        let entry = SourceError {
            path: path.into(),
            message: message.into(),
            recoverable,
        };
        if let Some(existing) = self.errors.iter_mut().find(|e| e.path == entry.path) {
            *existing = entry;
        } else {
            self.errors.push(entry);
        }
    }

    pub fn clear_error(&mut self, path: &str) {
        self.errors.retain(|e| e.path != path);
    }

    pub fn error_for(&self, path: &str) -> Option<&SourceError> {
        self.errors.iter().find(|e| e.path == path)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceError {
    pub path: String,
    pub message: String,
    pub recoverable: bool,
}
