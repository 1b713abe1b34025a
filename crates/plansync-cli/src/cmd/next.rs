use crate::output::print_json;
use std::path::Path;

pub async fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let snap = super::load_snapshot(root).await;

    if json {
        return print_json(&snap.actions);
    }

    if let Some(story) = snap.current_story_doc() {
        println!(
            "Current story: {} — {} [{}] ({})",
            story.key,
            story.title,
            story.status.as_str(),
            story.progress_summary()
        );
    }

    for action in &snap.actions {
        let marker = if action.primary { "→" } else { " " };
        println!("{marker} {:<20} {}", action.id.as_str(), action.label);
    }

    Ok(())
}
