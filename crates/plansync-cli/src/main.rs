mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "plansync",
    about = "Planning artifact dashboard — merge sprint status, epics, and stories into one live snapshot",
    version,
    propagate_version = true
)]
struct Cli {
    /// Planning output root (default: auto-detect from sprint-status.yaml)
    #[arg(long, global = true, env = "PLANSYNC_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse everything once and print the merged snapshot
    Snapshot,

    /// Show the recommended next workflow action(s)
    Next,

    /// Validate all artifacts; exit nonzero on parse errors
    Check,

    /// Watch the root and print a line per settled update
    Watch,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Watch => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Snapshot => cmd::snapshot::run(&root, cli.json).await,
        Commands::Next => cmd::next::run(&root, cli.json).await,
        Commands::Check => cmd::check::run(&root, cli.json).await,
        Commands::Watch => cmd::watch::run(&root, cli.json).await,
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
