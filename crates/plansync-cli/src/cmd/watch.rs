use plansync_core::aggregator::ArtifactSync;
use plansync_core::recommend::InstalledWorkflows;
use plansync_core::snapshot::DashboardState;
use plansync_core::watcher::ArtifactWatcher;
use std::path::Path;

/// Watch the root and print a line per settled snapshot until Ctrl-C.
pub async fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let (mut watcher, batch_rx, error_rx) = ArtifactWatcher::new(root);
    let installed = InstalledWorkflows::discover(root);
    let (mut sync, mut rx) = ArtifactSync::new(root, installed);

    sync.initialize().await;
    watcher.start();
    let engine = tokio::spawn(sync.run(batch_rx, error_rx));

    print_update(&rx.borrow_and_update().clone(), json)?;
    loop {
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                print_update(&rx.borrow_and_update().clone(), json)?;
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    // Dropping the watcher closes both channels, which ends the engine.
    drop(watcher);
    engine.await?;
    Ok(())
}

fn print_update(snap: &DashboardState, json: bool) -> anyhow::Result<()> {
    if json {
        // One compact document per line, for piping.
        println!("{}", serde_json::to_string(snap)?);
        return Ok(());
    }

    let current = snap.current_story.as_deref().unwrap_or("-");
    println!(
        "{} epic(s), {} story file(s), current: {current}",
        snap.epics.len(),
        snap.stories.len()
    );
    for err in &snap.errors {
        eprintln!("warning: {}: {}", err.path, err.message);
    }
    Ok(())
}
