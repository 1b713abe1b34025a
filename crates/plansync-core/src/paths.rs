use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Artifact file names
// ---------------------------------------------------------------------------

pub const STATUS_FILE: &str = "sprint-status.yaml";
pub const EPICS_FILE: &str = "epics.md";
pub const STORIES_DIR: &str = "stories";
pub const WORKFLOWS_DIR: &str = "workflows";

pub const BRIEF_MD: &str = "brief.md";
pub const PRD_MD: &str = "prd.md";
pub const ARCHITECTURE_MD: &str = "architecture.md";

/// Value the status document's `tracking_system` field must carry.
pub const TRACKING_SYSTEM: &str = "plansync";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn status_path(root: &Path) -> PathBuf {
    root.join(STATUS_FILE)
}

pub fn epics_path(root: &Path) -> PathBuf {
    root.join(EPICS_FILE)
}

pub fn stories_dir(root: &Path) -> PathBuf {
    root.join(STORIES_DIR)
}

pub fn workflows_dir(root: &Path) -> PathBuf {
    root.join(WORKFLOWS_DIR)
}

// ---------------------------------------------------------------------------
// Artifact classification
// ---------------------------------------------------------------------------

/// What a changed path means to the aggregator.
///
/// This is the single classification contract: the watcher's event filter
/// and the aggregator's dispatch both go through [`classify_artifact`], and
/// the decision looks only at the file name, never at the full path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Status,
    Epics,
    Story,
    Irrelevant,
}

static STORY_FILE_RE: OnceLock<Regex> = OnceLock::new();

fn story_file_re() -> &'static Regex {
    STORY_FILE_RE
        .get_or_init(|| Regex::new(r"^([0-9]+)-([0-9]+)([a-z])?-[a-z0-9][a-z0-9-]*$").unwrap())
}

pub fn classify_artifact(path: &Path) -> ArtifactKind {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return ArtifactKind::Irrelevant;
    };
    if name == STATUS_FILE {
        return ArtifactKind::Status;
    }
    if name == EPICS_FILE {
        return ArtifactKind::Epics;
    }
    if path.extension().and_then(|e| e.to_str()) == Some("md") {
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            if story_file_re().is_match(stem) {
                return ArtifactKind::Story;
            }
        }
    }
    ArtifactKind::Irrelevant
}

/// Story key embedded in a canonical story file name, if any.
/// `stories/2-3a-checkout.md` -> `2-3a-checkout`.
pub fn story_key_from_path(path: &Path) -> Option<String> {
    let stem = path.file_stem().and_then(|s| s.to_str())?;
    if path.extension().and_then(|e| e.to_str()) != Some("md") {
        return None;
    }
    story_file_re().is_match(stem).then(|| stem.to_string())
}

/// True for file kinds the watcher registers interest in (the status
/// document's yaml name plus markdown documents).
pub fn is_watched_file(path: &Path) -> bool {
    match path.extension().and_then(|e| e.to_str()) {
        Some("md") => true,
        Some("yaml") | Some("yml") => {
            path.file_name().and_then(|n| n.to_str()) == Some(STATUS_FILE)
        }
        _ => false,
    }
}

// ---------------------------------------------------------------------------
// Phase markers
// ---------------------------------------------------------------------------

/// Coarse project-phase flags, probed from marker files under the root.
/// Only consulted by the recommendation engine while no status document
/// exists yet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseFlags {
    pub has_brief: bool,
    pub has_prd: bool,
    pub has_architecture: bool,
    pub has_epics: bool,
}

pub fn phase_flags(root: &Path) -> PhaseFlags {
    PhaseFlags {
        has_brief: root.join(BRIEF_MD).is_file(),
        has_prd: root.join(PRD_MD).is_file(),
        has_architecture: root.join(ARCHITECTURE_MD).is_file(),
        has_epics: root.join(EPICS_FILE).is_file(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn classify_status_file() {
        assert_eq!(
            classify_artifact(Path::new("/p/planning/sprint-status.yaml")),
            ArtifactKind::Status
        );
    }

    #[test]
    fn classify_epics_anywhere_under_root() {
        assert_eq!(
            classify_artifact(Path::new("/p/planning/epics.md")),
            ArtifactKind::Epics
        );
        assert_eq!(
            classify_artifact(Path::new("/p/planning/archive/epics.md")),
            ArtifactKind::Epics
        );
    }

    #[test]
    fn classify_story_files() {
        assert_eq!(
            classify_artifact(Path::new("/p/planning/stories/1-2-login.md")),
            ArtifactKind::Story
        );
        assert_eq!(
            classify_artifact(Path::new("/p/planning/stories/3-11b-split-cart.md")),
            ArtifactKind::Story
        );
    }

    #[test]
    fn classify_ignores_everything_else() {
        for p in [
            "/p/planning/notes.md",
            "/p/planning/status.yaml",
            "/p/planning/1-2-login.txt",
            "/p/planning/1-x-login.md",
            "/p/planning/prd.md",
        ] {
            assert_eq!(
                classify_artifact(Path::new(p)),
                ArtifactKind::Irrelevant,
                "expected irrelevant: {p}"
            );
        }
    }

    #[test]
    fn story_key_extraction() {
        assert_eq!(
            story_key_from_path(Path::new("/x/stories/2-3a-checkout.md")).as_deref(),
            Some("2-3a-checkout")
        );
        assert_eq!(story_key_from_path(Path::new("/x/stories/readme.md")), None);
    }

    #[test]
    fn watched_file_kinds() {
        assert!(is_watched_file(Path::new("/r/epics.md")));
        assert!(is_watched_file(Path::new("/r/sprint-status.yaml")));
        assert!(!is_watched_file(Path::new("/r/other.yaml")));
        assert!(!is_watched_file(Path::new("/r/build.log")));
    }

    #[test]
    fn phase_flags_probe_markers() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(BRIEF_MD), "# Brief").unwrap();
        std::fs::write(dir.path().join(PRD_MD), "# PRD").unwrap();

        let flags = phase_flags(dir.path());
        assert!(flags.has_brief);
        assert!(flags.has_prd);
        assert!(!flags.has_architecture);
        assert!(!flags.has_epics);
    }
}
