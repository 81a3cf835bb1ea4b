mod enumerate;
mod options;
mod report;
mod scan;

use clap::{CommandFactory, Parser};
use enumerate::{collect_files, resolve_root, Enumeration, PathError};
use options::{ExecutionMode, ScanOptions, SummaryFormat, DEFAULT_TAIL_BYTES, MAX_TAIL_BYTES};
use report::{is_broken_pipe, Reporter, ScanSummary};
use scan::scan_paths;
use std::io::{self, IsTerminal, Write};
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::process;
use std::time::Instant;
use thiserror::Error;
use tracing::debug;
use tracing_subscriber::EnvFilter;

const EXAMPLES: &str = "\
e.g.:   tailzero
        tailzero /mnt/backup
        tailzero -s /mnt/backup
        tailzero -m --threads 4 /srv/share/folder";

/// Looks for files whose last bytes are all zero, which often indicates a
/// truncated or partially copied file. Read-only; nothing is modified.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, after_help = EXAMPLES)]
struct Args {
    /// Directory to search
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Mute per-file errors, including access denied.
    #[arg(short = 'm', long)]
    mute_errors: bool,

    /// Single-threaded rather than multi-threaded search.
    #[arg(short = 's', long)]
    serial: bool,

    /// Number of worker threads for the parallel search (default: one per CPU).
    #[arg(short = 't', long, conflicts_with = "serial")]
    threads: Option<NonZeroUsize>,

    /// How many trailing bytes must be zero for a file to be reported.
    #[arg(
        long,
        default_value_t = DEFAULT_TAIL_BYTES,
        value_parser = clap::value_parser!(u64).range(1..=MAX_TAIL_BYTES)
    )]
    tail_bytes: u64,

    /// Follow symbolic links when scanning directories.
    #[arg(long)]
    follow_symlinks: bool,

    /// Summary format to emit after the scan.
    #[arg(long, value_enum, default_value = "text")]
    summary_format: SummaryFormat,
}

impl Args {
    fn into_options(self, color: bool) -> Result<ScanOptions, PathError> {
        let mode = if self.serial {
            ExecutionMode::Serial
        } else {
            ExecutionMode::Parallel {
                threads: self.threads,
            }
        };
        let root = resolve_root(&self.path)?;
        Ok(ScanOptions {
            mute_errors: self.mute_errors,
            mode,
            tail_bytes: self.tail_bytes,
            follow_symlinks: self.follow_symlinks,
            summary_format: self.summary_format,
            color,
            ..ScanOptions::new(root)
        })
    }
}

#[derive(Debug, Error)]
enum AppError {
    #[error(transparent)]
    Path(#[from] PathError),

    #[error("no files found in {}", .0.display())]
    NoFiles(PathBuf),

    #[error("failed to start worker threads: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

fn usage() -> ! {
    let mut out = io::stdout();
    let _ = writeln!(out, "{}", Args::command().render_help());
    let _ = out.flush();
    process::exit(1);
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("TAILZERO_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_ansi(false)
        .with_writer(io::stderr)
        .with_env_filter(filter)
        .init();
}

/// Enumerates the root, checks every file and writes the summary to `out`.
fn run_app<W: Write + Send>(options: &ScanOptions, out: W) -> Result<ScanSummary, AppError> {
    let start = Instant::now();
    let enumeration = collect_files(&options.root, options.follow_symlinks)?;
    if enumeration.files.is_empty() {
        return Err(AppError::NoFiles(options.root.clone()));
    }
    run_scan(options, &enumeration, out, start)
}

/// Checks an already enumerated tree. Files that vanished since enumeration
/// are reported like any other per-file failure.
fn run_scan<W: Write + Send>(
    options: &ScanOptions,
    enumeration: &Enumeration,
    out: W,
    start: Instant,
) -> Result<ScanSummary, AppError> {
    let reporter = Reporter::new(out, options.mute_errors, options.color);
    for skipped in &enumeration.skipped {
        reporter.warn(format_args!("skipping unreadable entry: {}", skipped));
    }
    reporter.line(format_args!(
        "looking at {} files in folder {}",
        enumeration.files.len(),
        options.root.display()
    ));

    debug!(
        mode = ?options.mode,
        tail_bytes = options.tail_bytes,
        "starting tail scan"
    );
    scan_paths(&enumeration.files, options, &reporter)?;

    let (mut out, tally) = reporter.finish()?;
    let summary = ScanSummary::new(
        &options.root,
        enumeration.files.len(),
        tally,
        options.tail_bytes,
        options.mode,
        start.elapsed(),
    );
    if let Err(err) = summary
        .write_to(&mut out, options.summary_format)
        .and_then(|()| out.flush())
    {
        if !is_broken_pipe(&err) {
            return Err(AppError::Io(err));
        }
    }
    Ok(summary)
}

fn main() {
    init_tracing();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) if !err.use_stderr() => err.exit(),
        Err(err) => {
            let _ = err.print();
            usage();
        }
    };

    let color = io::stdout().is_terminal();
    let result = args
        .into_options(color)
        .map_err(AppError::from)
        .and_then(|options| run_app(&options, io::stdout()));

    match result {
        Ok(_) => {}
        Err(err @ (AppError::Path(_) | AppError::NoFiles(_))) => {
            eprintln!("error -- {}", err);
            usage();
        }
        Err(err) => {
            eprintln!("error -- {}", err);
            process::exit(1);
        }
    }
}
