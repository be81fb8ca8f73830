// ABOUTME: Headless entry point: scan the configured roots, sweep statuses, print the tree

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use serde::Serialize;
use tokio::sync::{mpsc, RwLock};

use githud::config::ScanConfig;
use githud::runner::GitCommandRunner;
use githud::scanner;
use githud::scheduler::{RefreshScheduler, StatusEvent};
use githud::tree::{NodeKind, ProjectTree, StatusIndicator, TreeNode};

#[derive(Parser)]
#[command(
    name = "githud",
    about = "Sync-state dashboard for many independent git working trees"
)]
struct Cli {
    /// Root directories to scan for working trees
    #[arg(required = true)]
    roots: Vec<PathBuf>,

    /// Emit a JSON report per sweep instead of the text tree
    #[arg(long)]
    json: bool,

    /// Keep running and re-sweep periodically
    #[arg(long)]
    watch: bool,

    /// Minutes between periodic sweeps in watch mode
    #[arg(long, default_value_t = 30)]
    interval_mins: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging();
    setup_panic_handler();

    let cli = Cli::parse();
    let config = ScanConfig::new(cli.roots.clone());
    let records = scanner::scan(&config)?;

    let base = dirs::home_dir().unwrap_or_else(|| PathBuf::from("/"));
    let tree = Arc::new(RwLock::new(ProjectTree::build(&records, &base)));

    let (tx, mut rx) = mpsc::unbounded_channel();
    let scheduler = Arc::new(RefreshScheduler::new(
        Arc::clone(&tree),
        Arc::new(GitCommandRunner),
        tx,
    ));

    {
        let scheduler = Arc::clone(&scheduler);
        tokio::spawn(async move {
            scheduler.refresh_all().await;
        });
    }
    if cli.watch {
        let _periodic = scheduler.spawn_periodic(Duration::from_secs(cli.interval_mins * 60));
    }

    while let Some(event) = rx.recv().await {
        if matches!(event, StatusEvent::SweepFinished) {
            let tree = tree.read().await;
            if cli.json {
                print_json(&tree)?;
            } else {
                print_tree(&tree);
            }
            if !cli.watch {
                break;
            }
        }
    }

    Ok(())
}

fn print_tree(tree: &ProjectTree) {
    for child in &tree.root().children {
        print_node(child, 0);
    }
}

fn print_node(node: &TreeNode, depth: usize) {
    let indent = "  ".repeat(depth);
    match node.indicator() {
        Some(indicator) => println!("{indent}{} {}", indicator.symbol(), node.name),
        None => println!("{indent}{}/", node.name),
    }
    for child in &node.children {
        print_node(child, depth + 1);
    }
}

#[derive(Serialize)]
struct RepoReport<'a> {
    path: &'a std::path::Path,
    status: githud::tree::StatusFlags,
    indicator: StatusIndicator,
}

fn print_json(tree: &ProjectTree) -> Result<()> {
    let mut reports = Vec::new();
    for node in tree.walk_bfs() {
        if let NodeKind::Repository {
            absolute_path,
            status,
            status_checked,
        } = &node.kind
        {
            reports.push(RepoReport {
                path: absolute_path,
                status: *status,
                indicator: StatusIndicator::from_flags(*status, *status_checked),
            });
        }
    }
    println!("{}", serde_json::to_string_pretty(&reports)?);
    Ok(())
}

fn setup_panic_handler() {
    use tracing::error;

    std::panic::set_hook(Box::new(|panic_info| {
        error!("Application panicked: {}", panic_info);
        eprintln!("Application panicked: {}", panic_info);
        eprintln!("Please check the logs for more details.");
    }));
}

fn setup_logging() {
    use std::fs::OpenOptions;
    use tracing_subscriber::prelude::*;

    let log_dir = dirs::home_dir()
        .map(|home| home.join(".githud").join("logs"))
        .unwrap_or_else(|| PathBuf::from(".githud/logs"));
    let _ = std::fs::create_dir_all(&log_dir);

    let log_file = log_dir.join(format!(
        "githud-{}.log",
        chrono::Local::now().format("%Y%m%d-%H%M%S")
    ));
    let Ok(file) = OpenOptions::new().create(true).append(true).open(&log_file) else {
        return;
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(file)
                .with_ansi(false),
        )
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "githud=info".into()),
        )
        .init();
}
