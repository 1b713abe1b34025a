use crate::output::print_json;
use anyhow::bail;
use std::path::Path;

/// Parse every artifact and report problems. Exits nonzero when any
/// artifact fails to parse, which makes this usable as a pre-commit gate.
pub async fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let snap = super::load_snapshot(root).await;

    if json {
        print_json(&snap.errors)?;
    } else if snap.errors.is_empty() {
        println!(
            "ok: {} epic(s), {} story file(s)",
            snap.epics.len(),
            snap.stories.len()
        );
    } else {
        for err in &snap.errors {
            eprintln!("{}: {}", err.path, err.message);
        }
    }

    if !snap.errors.is_empty() {
        bail!("{} artifact(s) failed to parse", snap.errors.len());
    }
    Ok(())
}
