use std::path::{Path, PathBuf};

use clap::Parser;
use marginalia::config::{
    Cli, Command, Config, DigestKind, OutputFormat, default_config_dir, default_config_path,
};
use marginalia::extract::Disabled;
use marginalia::memory::MemoryTracker;
use marginalia::pipeline::{Collaborators, ProcessOptions, process_export};
use marginalia::unpack_error;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let args = Cli::parse();

    // Determine config path and data directory.
    // If --config is provided, use its parent directory for data (ledger, etc.)
    // Otherwise use ~/.marginalia/ for both
    let (config_path, data_dir) = match args.config_path {
        Some(path) => {
            let path = PathBuf::from(path);
            let dir = path
                .parent()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| PathBuf::from("."));
            (path, dir)
        }
        None => {
            let dir = default_config_dir();
            (default_config_path(), dir)
        }
    };

    // Ensure data directory exists
    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        eprintln!("failed to create data directory {:?}: {}", data_dir, e);
        std::process::exit(1);
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
    tracing::info!("marginalia starting");

    let cfg = Config::new(config_path.to_str().unwrap()).unwrap_or_else(|e| {
        tracing::error!(error = %e, path = ?config_path, "failed to load config file");
        std::process::exit(1);
    });

    let mut tracker = MemoryTracker::new(cfg.app.memory_file(&data_dir));

    match args.command {
        Command::Process {
            file,
            dry_run,
            skip_email,
            skip_tasks,
        } => {
            let opts = ProcessOptions {
                dry_run,
                skip_email,
                skip_tasks,
            };
            run_process(&cfg, &mut tracker, file, opts).await;
        }
        Command::Digest { kind } => run_digest(&mut tracker, kind),
        Command::Dashboard { format } => run_dashboard(&mut tracker, format),
    }
}

async fn run_process(
    cfg: &Config,
    tracker: &mut MemoryTracker,
    file: Option<PathBuf>,
    opts: ProcessOptions,
) {
    let files = match file {
        Some(path) => vec![path],
        None => find_exports(&cfg.app.exports_dir()),
    };

    if files.is_empty() {
        println!("No HTML exports found in {}", cfg.app.exports_dir().display());
        return;
    }

    println!("Found {} file(s) to process", files.len());

    // Extraction, task-tracker and notification integrations are wired as
    // Disabled in this binary; the pipeline treats them as unavailable.
    let collab = Collaborators {
        concepts: Disabled,
        actions: Disabled,
        tasks: Disabled,
        notifier: Disabled,
    };

    let mut records = Vec::new();
    for path in &files {
        match process_export(path, cfg, tracker, &collab, &opts).await {
            Ok(Some(record)) => records.push(record),
            Ok(None) => {}
            Err(e) => {
                tracing::error!(
                    "failed to process {}: {}",
                    path.display(),
                    unpack_error(&*e)
                );
            }
        }
    }

    if !records.is_empty() && !opts.dry_run {
        let concepts: usize = records.iter().map(|r| r.concepts_created.len()).sum();
        let actions: usize = records.iter().map(|r| r.actions_created.len()).sum();
        println!();
        println!("Processed {} book(s)", records.len());
        println!("  Concepts: {}", concepts);
        println!("  Actions: {}", actions);
    }
}

fn find_exports(dir: &Path) -> Vec<PathBuf> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!("cannot read exports directory {}: {}", dir.display(), e);
            return Vec::new();
        }
    };

    let mut files: Vec<PathBuf> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| {
            p.extension()
                .map(|ext| ext.eq_ignore_ascii_case("html"))
                .unwrap_or(false)
        })
        .collect();
    files.sort();
    files
}

fn run_digest(tracker: &mut MemoryTracker, kind: DigestKind) {
    match kind {
        DigestKind::Spaced => {
            let due = tracker.get_due_reviews();
            if due.is_empty() {
                println!("No concepts due for review!");
                return;
            }

            println!("Concepts due for review: {}", due.len());
            println!();
            for entry in &due {
                println!(
                    "  {} (from \"{}\") — reviews: {}",
                    entry.concept_name, entry.source_book, entry.review_count
                );
            }
        }
        DigestKind::Weekly => {
            let recent = tracker.get_recent_books(7);
            let stats = tracker.get_stats();

            println!("Weekly Summary");
            println!();
            println!("Books processed: {}", recent.len());
            println!("Total concepts: {}", stats.concepts_created);
            println!("Total actions: {}", stats.actions_created);
            println!("Pending reviews: {}", stats.pending_reviews);

            if !recent.is_empty() {
                println!();
                println!("Recent Books:");
                for record in &recent {
                    println!("  - {} by {}", record.book_title, record.book_author);
                }
            }
        }
        DigestKind::Monthly => {
            let stats = tracker.get_stats();

            println!("Monthly Analytics");
            println!();
            println!("Books Processed:      {}", stats.books_processed);
            println!("Total Highlights:     {}", stats.total_highlights);
            println!("Concepts Created:     {}", stats.concepts_created);
            println!("Actions Created:      {}", stats.actions_created);
            println!("In Spaced Repetition: {}", stats.total_in_rotation);
            println!("Pending Reviews:      {}", stats.pending_reviews);
        }
    }
}

fn run_dashboard(tracker: &mut MemoryTracker, format: OutputFormat) {
    let stats = tracker.get_stats();

    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&stats).unwrap_or_default()
            );
        }
        OutputFormat::Table => {
            println!("Statistics");
            println!();
            println!("Books Processed:      {}", stats.books_processed);
            println!("Total Highlights:     {}", stats.total_highlights);
            println!("Concepts Created:     {}", stats.concepts_created);
            println!("Actions Created:      {}", stats.actions_created);
            println!("In Spaced Repetition: {}", stats.total_in_rotation);
            println!("Pending Reviews:      {}", stats.pending_reviews);

            let recent = tracker.get_recent_books(5);
            if !recent.is_empty() {
                println!();
                println!("Recent Books:");
                for record in &recent {
                    println!(
                        "  - {} ({} | {} concepts, {} actions)",
                        record.book_title,
                        record.processed_at.format("%Y-%m-%d"),
                        record.concepts_created.len(),
                        record.actions_created.len()
                    );
                }
            }
        }
    }
}
