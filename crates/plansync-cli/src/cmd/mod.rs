pub mod check;
pub mod next;
pub mod snapshot;
pub mod watch;

use plansync_core::aggregator::ArtifactSync;
use plansync_core::recommend::InstalledWorkflows;
use plansync_core::snapshot::DashboardState;
use std::path::Path;

/// One-shot read: parse everything under `root` and return the settled
/// snapshot.
pub(crate) async fn load_snapshot(root: &Path) -> DashboardState {
    let installed = InstalledWorkflows::discover(root);
    let (mut sync, _rx) = ArtifactSync::new(root, installed);
    sync.initialize().await;
    sync.snapshot()
}
