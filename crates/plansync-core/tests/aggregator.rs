use plansync_core::aggregator::ArtifactSync;
use plansync_core::recommend::InstalledWorkflows;
use plansync_core::snapshot::WATCHER_ERROR_PATH;
use plansync_core::types::{ActionId, Lifecycle};
use plansync_core::watcher::{ChangeBatch, ChangeKind, WatchError};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// Fixture
// ---------------------------------------------------------------------------

const STATUS: &str = "\
generated: 2026-08-30
project: Webshop
project_key: webshop
tracking_system: plansync
story_location: stories
development_status:
  epic-1: in-progress
  1-1-user-login: ready-for-dev
  1-2-password-reset: backlog
";

const EPICS: &str = "\
## Epic 1: User Accounts

Signup, login, recovery.

### Story 1.1: User Login

As a user, I want to log in, so that my data is private.

### Story 1.2: Password Reset
";

const STORY_1_1: &str = "\
# Story 1.1: User Login

Status: ready-for-dev

## Story

As a user,
I want to log in,
so that my data is private.

## Tasks / Subtasks

- [ ] Task 1: Build login form
  - [ ] 1.1: Render fields
";

fn write_fixture(dir: &Path) {
    std::fs::write(dir.join("sprint-status.yaml"), STATUS).unwrap();
    std::fs::write(dir.join("epics.md"), EPICS).unwrap();
    std::fs::create_dir(dir.join("stories")).unwrap();
    std::fs::write(dir.join("stories/1-1-user-login.md"), STORY_1_1).unwrap();
}

fn batch(entries: &[(&Path, ChangeKind)]) -> ChangeBatch {
    let changes: BTreeMap<PathBuf, ChangeKind> = entries
        .iter()
        .map(|(p, k)| (p.to_path_buf(), *k))
        .collect();
    ChangeBatch { changes }
}

async fn initialized(dir: &Path) -> ArtifactSync {
    let (mut sync, _rx) = ArtifactSync::new(dir, InstalledWorkflows::everything());
    sync.initialize().await;
    sync
}

// ---------------------------------------------------------------------------
// Initialization
// ---------------------------------------------------------------------------

#[tokio::test]
async fn initialize_merges_all_artifacts() {
    let dir = TempDir::new().unwrap();
    write_fixture(dir.path());

    let sync = initialized(dir.path()).await;
    let snap = sync.snapshot();

    assert!(!snap.loading);
    assert!(snap.errors.is_empty());
    assert_eq!(snap.status.as_ref().unwrap().project_key, "webshop");
    assert_eq!(snap.epics.len(), 1);
    // Status overlay onto the epic and its story entries.
    assert_eq!(snap.epics[0].status, Lifecycle::InProgress);
    assert_eq!(
        snap.epics[0].stories[0].status,
        Some(Lifecycle::ReadyForDev)
    );
    assert_eq!(snap.stories.len(), 1);
    // First actionable story entry in status order wins.
    assert_eq!(snap.current_story.as_deref(), Some("1-1-user-login"));
}

#[tokio::test]
async fn ready_for_dev_current_story_drives_recommendation() {
    let dir = TempDir::new().unwrap();
    write_fixture(dir.path());

    let snap = initialized(dir.path()).await.snapshot();
    let primary: Vec<_> = snap.actions.iter().filter(|a| a.primary).collect();
    assert_eq!(primary.len(), 1);
    assert_eq!(primary[0].id, ActionId::StartStory);
}

#[tokio::test]
async fn empty_root_is_not_an_error() {
    let dir = TempDir::new().unwrap();

    let snap = initialized(dir.path()).await.snapshot();
    assert!(snap.status.is_none());
    assert!(snap.epics.is_empty());
    assert!(snap.stories.is_empty());
    assert!(snap.errors.is_empty());
    // Planning from scratch starts at the brief.
    assert_eq!(snap.actions[0].id, ActionId::CreateBrief);
    assert!(snap.actions[0].primary);
}

#[tokio::test]
async fn current_story_skips_unparsed_keys() {
    let dir = TempDir::new().unwrap();
    write_fixture(dir.path());
    // 1-2 is actionable in the status doc but has no story file; 1-1 is not
    // actionable. No current story should be derived from 1-2 alone.
    let status = STATUS
        .replace("1-1-user-login: ready-for-dev", "1-1-user-login: done")
        .replace("1-2-password-reset: backlog", "1-2-password-reset: in-progress");
    std::fs::write(dir.path().join("sprint-status.yaml"), status).unwrap();

    let snap = initialized(dir.path()).await.snapshot();
    assert_eq!(snap.current_story, None);
}

// ---------------------------------------------------------------------------
// Batched changes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn deleting_status_clears_without_error() {
    let dir = TempDir::new().unwrap();
    write_fixture(dir.path());
    let mut sync = initialized(dir.path()).await;
    assert!(sync.snapshot().current_story.is_some());

    let status_path = dir.path().join("sprint-status.yaml");
    std::fs::remove_file(&status_path).unwrap();
    sync.apply_batch(batch(&[(&status_path, ChangeKind::Removed)]))
        .await;

    let snap = sync.snapshot();
    assert!(snap.status.is_none());
    assert!(snap.current_story.is_none());
    assert!(snap.errors.is_empty());
}

#[tokio::test]
async fn deleting_story_file_removes_it_from_the_map() {
    let dir = TempDir::new().unwrap();
    write_fixture(dir.path());
    let mut sync = initialized(dir.path()).await;

    let story_path = dir.path().join("stories/1-1-user-login.md");
    std::fs::remove_file(&story_path).unwrap();
    sync.apply_batch(batch(&[(&story_path, ChangeKind::Removed)]))
        .await;

    let snap = sync.snapshot();
    assert!(snap.stories.is_empty());
    // It was the current story; the pointer must clear with it.
    assert!(snap.current_story.is_none());
}

#[tokio::test]
async fn selective_reparse_updates_only_the_changed_story() {
    let dir = TempDir::new().unwrap();
    write_fixture(dir.path());
    let mut sync = initialized(dir.path()).await;

    let story_path = dir.path().join("stories/1-1-user-login.md");
    let updated = STORY_1_1.replace("- [ ] Task 1", "- [x] Task 1");
    std::fs::write(&story_path, updated).unwrap();
    let epics_before = sync.snapshot().epics.clone();

    sync.apply_batch(batch(&[(&story_path, ChangeKind::Modified)]))
        .await;

    let snap = sync.snapshot();
    let story = &snap.stories["1-1-user-login"];
    assert_eq!(story.task_completed(), 1);
    assert_eq!(snap.epics, epics_before);
}

#[tokio::test]
async fn irrelevant_paths_are_ignored() {
    let dir = TempDir::new().unwrap();
    write_fixture(dir.path());
    let mut sync = initialized(dir.path()).await;
    let before = sync.snapshot();

    let notes = dir.path().join("notes.md");
    std::fs::write(&notes, "scratch").unwrap();
    sync.apply_batch(batch(&[(&notes, ChangeKind::Created)]))
        .await;

    let snap = sync.snapshot();
    assert_eq!(snap.stories.len(), before.stories.len());
    assert_eq!(snap.epics, before.epics);
    assert!(snap.errors.is_empty());
}

#[tokio::test]
async fn parse_failure_records_one_error_then_success_clears_it() {
    let dir = TempDir::new().unwrap();
    write_fixture(dir.path());
    let mut sync = initialized(dir.path()).await;

    let story_path = dir.path().join("stories/1-2-password-reset.md");
    std::fs::write(&story_path, "no heading at all\n").unwrap();
    sync.apply_batch(batch(&[(&story_path, ChangeKind::Created)]))
        .await;

    let snap = sync.snapshot();
    assert_eq!(snap.errors.len(), 1);
    assert!(snap.errors[0].message.contains("missing header"));

    // A second failing parse replaces, never accumulates.
    std::fs::write(&story_path, "").unwrap();
    sync.apply_batch(batch(&[(&story_path, ChangeKind::Modified)]))
        .await;
    let snap = sync.snapshot();
    assert_eq!(snap.errors.len(), 1);
    assert!(snap.errors[0].message.contains("empty"));

    std::fs::write(&story_path, "# Story 1.2: Password Reset\n").unwrap();
    sync.apply_batch(batch(&[(&story_path, ChangeKind::Modified)]))
        .await;
    let snap = sync.snapshot();
    assert!(snap.errors.is_empty());
    assert!(snap.stories.contains_key("1-2-password-reset"));
}

#[tokio::test]
async fn broken_status_keeps_previous_value_and_records_error() {
    let dir = TempDir::new().unwrap();
    write_fixture(dir.path());
    let mut sync = initialized(dir.path()).await;

    let status_path = dir.path().join("sprint-status.yaml");
    std::fs::write(&status_path, "generated: 2026-08-30\n").unwrap();
    sync.apply_batch(batch(&[(&status_path, ChangeKind::Modified)]))
        .await;

    let snap = sync.snapshot();
    // Last good parse survives; the failure shows up in the error list.
    assert_eq!(snap.status.as_ref().unwrap().project_key, "webshop");
    assert_eq!(snap.errors.len(), 1);
    assert!(snap.errors[0].message.contains("missing field"));
}

#[tokio::test]
async fn status_change_recomputes_current_story() {
    let dir = TempDir::new().unwrap();
    write_fixture(dir.path());
    let mut sync = initialized(dir.path()).await;

    let status_path = dir.path().join("sprint-status.yaml");
    let done = STATUS.replace("1-1-user-login: ready-for-dev", "1-1-user-login: done");
    std::fs::write(&status_path, done).unwrap();
    sync.apply_batch(batch(&[(&status_path, ChangeKind::Modified)]))
        .await;

    let snap = sync.snapshot();
    assert_eq!(snap.current_story, None);
    assert_eq!(
        snap.epics[0].stories[0].status,
        Some(Lifecycle::Done)
    );
}

// ---------------------------------------------------------------------------
// Refresh
// ---------------------------------------------------------------------------

#[tokio::test]
async fn refresh_clears_errors_and_reparses() {
    let dir = TempDir::new().unwrap();
    write_fixture(dir.path());
    let mut sync = initialized(dir.path()).await;

    let story_path = dir.path().join("stories/1-2-password-reset.md");
    std::fs::write(&story_path, "broken\n").unwrap();
    sync.apply_batch(batch(&[(&story_path, ChangeKind::Created)]))
        .await;
    assert_eq!(sync.snapshot().errors.len(), 1);

    std::fs::write(&story_path, "# Story 1.2: Password Reset\n").unwrap();
    sync.refresh().await;

    let snap = sync.snapshot();
    assert!(!snap.loading);
    assert!(snap.errors.is_empty());
    assert_eq!(snap.stories.len(), 2);
}

// ---------------------------------------------------------------------------
// Run loop
// ---------------------------------------------------------------------------

#[tokio::test]
async fn run_serves_batches_and_watcher_errors() {
    let dir = TempDir::new().unwrap();
    write_fixture(dir.path());

    let (mut sync, mut rx) = ArtifactSync::new(dir.path(), InstalledWorkflows::everything());
    sync.initialize().await;
    // Consume the initialization publish so later waits only observe the
    // engine's own updates.
    rx.borrow_and_update();

    let (batch_tx, batch_rx) = mpsc::channel(16);
    let (error_tx, error_rx) = mpsc::channel(16);
    let handle = tokio::spawn(sync.run(batch_rx, error_rx));

    error_tx
        .send(WatchError {
            message: "inotify queue overflowed".into(),
            recoverable: true,
        })
        .await
        .unwrap();
    rx.changed().await.unwrap();
    {
        let snap = rx.borrow_and_update();
        let err = snap
            .errors
            .iter()
            .find(|e| e.path == WATCHER_ERROR_PATH)
            .unwrap();
        assert!(err.recoverable);
    }

    let status_path = dir.path().join("sprint-status.yaml");
    std::fs::remove_file(&status_path).unwrap();
    batch_tx
        .send(batch(&[(&status_path, ChangeKind::Removed)]))
        .await
        .unwrap();
    rx.changed().await.unwrap();
    assert!(rx.borrow_and_update().status.is_none());

    // Dropping both senders ends the loop.
    drop(batch_tx);
    drop(error_tx);
    handle.await.unwrap();
}
