use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use humansize::{format_size, BINARY};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use treescrub::{
    Action, Configuration, EntryOutcome, LogEntry, PatternTable, RunStatus, RunSummary,
};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Remove build output, IDE scratch files and legacy source-control bindings from a project tree",
    long_about = None
)]
struct Args {
    /// Root directory of the project tree
    root: PathBuf,

    /// Only look at entries directly under the root
    #[arg(long)]
    top_level_only: bool,

    /// Leave read-only files and directories alone instead of clearing the attribute
    #[arg(long)]
    no_force: bool,

    /// Also remove source-control binding elements from project files
    #[arg(long, short = 'p')]
    strip_project_bindings: bool,

    /// Show what would be removed, but don't change anything
    #[arg(long, short = 'n')]
    dry_run: bool,

    /// Measure and report the space reclaimed
    #[arg(long, short)]
    sizes: bool,

    /// TOML file overriding the default pattern table
    #[arg(long, value_name = "FILE")]
    patterns: Option<PathBuf>,

    /// Log every decision to stderr
    #[arg(long, short)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("treescrub=debug")
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .init();
}

fn describe(outcome: &EntryOutcome, dry_run: bool) -> String {
    let path = outcome.path.display();
    let verb = |done: &str, planned: &str| (if dry_run { planned } else { done }).to_string();

    match &outcome.action {
        Action::DeletedDirectory => format!("{} directory {}", verb("Deleted", "Would delete"), path),
        Action::DeletedFile => format!("{} file {}", verb("Deleted", "Would delete"), path),
        Action::CleanedSolution | Action::CleanedProject { .. } => format!(
            "{} source control bindings from {}",
            verb("Removed", "Would remove"),
            path
        ),
        Action::Skipped { reason } => format!("Skipping {} because {}", path, reason),
    }
}

fn render(summary: &RunSummary) {
    println!("Cleaning directory {}", summary.root().display());
    println!();

    for entry in summary.log() {
        match entry {
            LogEntry::Outcome(outcome) => {
                let line = describe(outcome, summary.is_dry_run());
                match outcome.action {
                    Action::Skipped { .. } => println!("{}", line),
                    _ => println!("{}", line.green()),
                }
            }
            LogEntry::Error(error) => println!("{}", error.message.red()),
        }
    }

    if summary.status() == RunStatus::NothingToClean {
        println!("{}", "Nothing to clean".yellow());
        return;
    }

    println!();
    let counts = [
        ("Deleted directories", "Directories to delete", summary.directories_deleted()),
        ("Deleted files", "Files to delete", summary.files_deleted()),
        ("Cleaned solution files", "Solution files to clean", summary.solution_files_cleaned()),
        ("Cleaned project files", "Project files to clean", summary.project_files_cleaned()),
    ];
    for (done, planned, count) in counts {
        if count > 0 {
            let label = if summary.is_dry_run() { planned } else { done };
            println!("{}: {}", label, count);
        }
    }

    if let Some(bytes) = summary.bytes_reclaimed() {
        println!(
            "Space reclaimed: {}",
            format_size(bytes, BINARY).bold()
        );
    }

    if summary.is_dry_run() {
        println!("Dry run mode: nothing was changed.");
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let patterns = match &args.patterns {
        Some(path) => PatternTable::load(path)?,
        None => PatternTable::default(),
    };

    let config = Configuration::default()
        .with_recursive(!args.top_level_only)
        .with_force(!args.no_force)
        .with_strip_project_bindings(args.strip_project_bindings)
        .with_dry_run(args.dry_run)
        .with_calculate_sizes(args.sizes)
        .with_patterns(patterns);

    let summary = treescrub::run(&args.root, config)
        .with_context(|| format!("Cannot clean {}", args.root.display()))?;

    render(&summary);

    Ok(())
}
