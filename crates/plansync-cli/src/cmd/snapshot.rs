use crate::output::{print_json, print_table};
use std::path::Path;

pub async fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let snap = super::load_snapshot(root).await;

    if json {
        return print_json(&snap);
    }

    match &snap.status {
        Some(status) => {
            println!("Project:   {} ({})", status.project, status.project_key);
            println!("Generated: {}", status.generated);
        }
        None => println!("Project:   (no sprint status yet)"),
    }
    if let Some(key) = &snap.current_story {
        println!("Current:   {key}");
    }
    println!();

    if !snap.epics.is_empty() {
        let rows: Vec<Vec<String>> = snap
            .epics
            .iter()
            .map(|e| {
                vec![
                    e.key.clone(),
                    e.title.clone(),
                    e.status.as_str().to_string(),
                    e.stories.len().to_string(),
                ]
            })
            .collect();
        print_table(&["EPIC", "TITLE", "STATUS", "STORIES"], rows);
        println!();
    }

    if !snap.stories.is_empty() {
        let rows: Vec<Vec<String>> = snap
            .stories
            .values()
            .map(|s| {
                vec![
                    s.key.clone(),
                    s.title.clone(),
                    s.status.as_str().to_string(),
                    s.progress_summary(),
                ]
            })
            .collect();
        print_table(&["STORY", "TITLE", "STATUS", "PROGRESS"], rows);
        println!();
    }

    for err in &snap.errors {
        eprintln!("warning: {}: {}", err.path, err.message);
    }

    Ok(())
}
