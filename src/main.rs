//! treeaudit - Snapshot a directory tree and report what changed.
//!
//! Usage:
//!   treeaudit PATH                   Audit PATH against ./audit.log
//!   treeaudit -t PATH                Also print the tree of the new snapshot
//!   treeaudit -i old.log -o new.log PATH  Use separate baseline files
//!   treeaudit --help                 Show help

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use clap::{Parser, ValueEnum};
use color_eyre::eyre::{Context, Result, bail};
use tracing_subscriber::EnvFilter;

use treeaudit_core::{HashAlgorithm, IdentityStrategy, Node, ScanConfig, Snapshot};
use treeaudit_diff::DiffReport;
use treeaudit_scan::{ScanProgress, SnapshotBuilder};

#[derive(Parser)]
#[command(
    name = "treeaudit",
    version,
    about = "Snapshot a directory tree and report what changed since the last audit",
    long_about = "treeaudit records the structure and content fingerprints of a directory tree.\n\n\
                  Each run compares the live tree with the baseline saved by the previous \
                  run, prints what was added, removed or changed, and saves the new \
                  snapshot as the next baseline."
)]
struct Cli {
    /// Directory to audit
    path: PathBuf,

    /// Baseline to compare against
    #[arg(short, long, default_value = "audit.log")]
    input_file: PathBuf,

    /// Where to save the new snapshot
    #[arg(short, long, default_value = "audit.log")]
    output_file: PathBuf,

    /// Print scan statistics and debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Print an indented tree of the new snapshot
    #[arg(short, long)]
    tree: bool,

    /// Content hash algorithm (sha256, blake3)
    #[arg(long, default_value = "sha256")]
    algorithm: HashAlgorithm,

    /// How entries are matched between runs (name, inode)
    #[arg(long, default_value = "name")]
    identity: IdentityStrategy,

    /// Glob of entry names to skip (repeatable)
    #[arg(long = "ignore", value_name = "GLOB")]
    ignore: Vec<String>,

    /// Maximum depth to descend below PATH
    #[arg(long)]
    max_depth: Option<u32>,

    /// Threads used to read directories
    #[arg(long, default_value = "1")]
    threads: usize,

    /// Output format for the change list
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,

    /// Compare only; leave the baseline file untouched
    #[arg(long)]
    dry_run: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_logging(cli.verbose);

    run_audit(&cli)
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Scan, compare with the baseline, report and save.
fn run_audit(cli: &Cli) -> Result<()> {
    let config = ScanConfig::builder()
        .root(cli.path.clone())
        .algorithm(cli.algorithm)
        .identity(cli.identity)
        .ignore_patterns(cli.ignore.clone())
        .max_depth(cli.max_depth)
        .threads(cli.threads)
        .build()
        .context("Invalid scan options")?;

    if cli.verbose {
        eprintln!("Scanning {}...", cli.path.display());
    }

    let snapshot = scan(&config, cli.verbose)
        .with_context(|| format!("Scan of {} failed", cli.path.display()))?;

    for warning in &snapshot.warnings {
        eprintln!("warning: {}", warning.message);
    }
    if cli.verbose {
        print_scan_summary(&snapshot);
    }

    let baseline = treeaudit_store::load_optional(&cli.input_file)
        .with_context(|| format!("Could not read baseline {}", cli.input_file.display()))?;

    match &baseline {
        Some(old) => {
            check_compatible(old, &snapshot, &cli.input_file)?;
            if cli.verbose {
                eprintln!(
                    "Comparing with baseline from {} ({})",
                    format_time(old.taken_at),
                    old.root_path.display()
                );
            }
        }
        None => eprintln!(
            "No baseline at {}, first run: every entry is new.",
            cli.input_file.display()
        ),
    }

    let report = DiffReport::between_snapshots(baseline.as_ref(), Some(&snapshot));

    match cli.format {
        OutputFormat::Text => print_report(&report),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }

    if cli.tree {
        println!();
        print_tree(&snapshot);
    }

    if cli.dry_run {
        tracing::info!(path = %cli.output_file.display(), "dry run, baseline not saved");
    } else {
        treeaudit_store::save(&snapshot, &cli.output_file)
            .with_context(|| format!("Could not save baseline {}", cli.output_file.display()))?;
    }

    Ok(())
}

/// Build the snapshot, reporting progress on stderr when `verbose`.
fn scan(config: &ScanConfig, verbose: bool) -> Result<Snapshot, treeaudit_scan::ScanError> {
    let builder = SnapshotBuilder::new();
    if !verbose {
        return builder.build(config);
    }

    let mut updates = builder.subscribe();
    std::thread::scope(|scope| {
        scope.spawn(move || {
            // Ends once the builder, and with it the sender, is dropped.
            while let Ok(progress) = updates.blocking_recv() {
                print_progress(&progress);
            }
        });
        let result = builder.build(config);
        drop(builder);
        result
    })
}

fn print_progress(progress: &ScanProgress) {
    eprintln!(
        "  {} files, {} dirs, {} hashed ({}/s), {} warning(s): {}",
        progress.files_scanned,
        progress.dirs_scanned,
        format_size(progress.bytes_hashed),
        format_size(progress.hash_rate()),
        progress.warnings_count,
        progress.current_path.display()
    );
}

/// Refuse to compare snapshots whose fingerprints or keys are not comparable.
fn check_compatible(old: &Snapshot, new: &Snapshot, baseline: &Path) -> Result<()> {
    if old.algorithm != new.algorithm {
        bail!(
            "Baseline {} was hashed with {}, this scan used {}. \
             Rerun with --algorithm {} or start a new baseline with -i pointing elsewhere.",
            baseline.display(),
            old.algorithm,
            new.algorithm,
            old.algorithm
        );
    }
    if old.identity != new.identity {
        bail!(
            "Baseline {} keys entries by {}, this scan used {}. \
             Rerun with --identity {} or start a new baseline with -i pointing elsewhere.",
            baseline.display(),
            old.identity,
            new.identity,
            old.identity
        );
    }
    Ok(())
}

fn print_report(report: &DiffReport) {
    if report.is_empty() {
        println!("No differences found.");
        return;
    }
    for change in &report.changes {
        println!("{change}");
    }
    println!();
    println!("{}", report.summary);
}

fn print_scan_summary(snapshot: &Snapshot) {
    eprintln!("{}", "─".repeat(60));
    eprintln!(
        " {} - {}",
        snapshot.root_path.display(),
        format_size(snapshot.total_size())
    );
    eprintln!(
        " {} files, {} directories, {} symlinks",
        snapshot.stats.total_files, snapshot.stats.total_dirs, snapshot.stats.total_symlinks
    );
    if let Some((path, size)) = &snapshot.stats.largest_file {
        eprintln!(" Largest file: {} ({})", path.display(), format_size(*size));
    }
    eprintln!(" Scanned in {:.2}s", snapshot.scan_duration.as_secs_f64());
    if snapshot.has_warnings() {
        eprintln!(" {} warning(s) during scan", snapshot.warnings.len());
    }
    eprintln!("{}", "─".repeat(60));
}

/// Print the snapshot as an indented tree, largest share bars included.
fn print_tree(snapshot: &Snapshot) {
    let root = snapshot.root_node();
    let root_size = root.size();

    // Explicit stack: directory depth is bounded only by the filesystem.
    let mut stack: Vec<(&Node, usize)> = vec![(&root, 0)];
    while let Some((node, depth)) = stack.pop() {
        print_node(node, depth, root_size);
        if let Some(dir) = node.as_directory() {
            stack.extend(dir.children().values().rev().map(|child| (child, depth + 1)));
        }
    }
}

/// Print a single tree line.
fn print_node(node: &Node, depth: usize, root_size: u64) {
    let size = node.size();
    let indent = "  ".repeat(depth);
    let ratio = if root_size > 0 {
        size as f64 / root_size as f64 * 100.0
    } else {
        0.0
    };

    let name = if depth == 0 {
        node.name().to_string()
    } else {
        display_name(node.name())
    };
    let dir_marker = if node.is_dir() { "/" } else { "" };

    let detail = match node.as_file() {
        Some(file) => file.fingerprint.to_string(),
        None => String::new(),
    };

    println!(
        "{}{}{:<40} {:>10} {:>5.1}% {} {}",
        indent,
        if node.is_dir() { "▼ " } else { "  " },
        truncate(&format!("{}{}", name, dir_marker), 40),
        format_size(size),
        ratio,
        make_bar(ratio / 100.0, 10),
        detail
    );
}

/// Last path component of a node name.
fn display_name(name: &str) -> String {
    Path::new(name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string())
}

/// Create a simple ASCII bar.
fn make_bar(ratio: f64, width: usize) -> String {
    let filled = (ratio * width as f64).round() as usize;
    let empty = width.saturating_sub(filled);
    format!("[{}{}]", "█".repeat(filled), "░".repeat(empty))
}

/// Format size in human-readable form.
fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}

fn format_time(time: std::time::SystemTime) -> String {
    DateTime::<Local>::from(time)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

/// Truncate a string to max length.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len - 1).collect();
        format!("{kept}…")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_is_required() {
        assert!(Cli::try_parse_from(["treeaudit"]).is_err());
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["treeaudit", "."]);
        assert_eq!(cli.path, PathBuf::from("."));
        assert_eq!(cli.input_file, PathBuf::from("audit.log"));
        assert_eq!(cli.output_file, PathBuf::from("audit.log"));
        assert_eq!(cli.algorithm, HashAlgorithm::Sha256);
        assert_eq!(cli.identity, IdentityStrategy::Name);
        assert!(!cli.verbose && !cli.tree && !cli.dry_run);
    }

    #[test]
    fn test_cli_flags() {
        let cli = Cli::parse_from([
            "treeaudit", "-v", "-t", "-i", "old.log", "-o", "new.log", "--algorithm", "blake3",
            "--ignore", "*.tmp", "--ignore", ".git", "/srv",
        ]);
        assert!(cli.verbose && cli.tree);
        assert_eq!(cli.input_file, PathBuf::from("old.log"));
        assert_eq!(cli.output_file, PathBuf::from("new.log"));
        assert_eq!(cli.algorithm, HashAlgorithm::Blake3);
        assert_eq!(cli.ignore, vec!["*.tmp", ".git"]);
        assert_eq!(cli.path, PathBuf::from("/srv"));
    }

    #[test]
    fn test_display_name_and_truncate() {
        assert_eq!(display_name("/a/b/c.txt"), "c.txt");
        assert_eq!(display_name("plain"), "plain");
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghij", 5), "abcd…");
    }

    #[test]
    fn test_mismatched_algorithm_is_refused() {
        let root = treeaudit_core::DirectoryNode::new("/r", treeaudit_core::Identity::name("/r"));
        let old = Snapshot::new(root.clone(), "/r");
        let mut new = Snapshot::new(root, "/r");
        new.algorithm = HashAlgorithm::Blake3;

        assert!(check_compatible(&old, &old, Path::new("audit.log")).is_ok());
        let err = check_compatible(&old, &new, Path::new("audit.log")).unwrap_err();
        assert!(err.to_string().contains("--algorithm sha256"));
    }
}
