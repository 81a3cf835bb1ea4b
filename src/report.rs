use crate::options::{ExecutionMode, SummaryFormat};
use crate::scan::ScanError;
use ansi_term::Colour;
use serde::Serialize;
use std::fmt::Display;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// Formats a Duration into a human-readable string.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    let mins = secs / 60;
    let secs = secs % 60;
    if mins > 0 {
        format!("{} min {} sec", mins, secs)
    } else {
        format!("{} sec", secs)
    }
}

pub(crate) fn is_broken_pipe(err: &io::Error) -> bool {
    if err.kind() == io::ErrorKind::BrokenPipe {
        return true;
    }
    matches!(err.raw_os_error(), Some(32) | Some(109))
}

/// Counters accumulated while scanning.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Tally {
    pub found: usize,
    pub failed: usize,
}

struct ReporterState<W> {
    out: W,
    tally: Tally,
    output_open: bool,
    write_error: Option<io::Error>,
}

impl<W: Write> ReporterState<W> {
    fn emit(&mut self, line: &str) {
        if !self.output_open {
            return;
        }
        if let Err(err) = writeln!(self.out, "{}", line) {
            self.output_open = false;
            if !is_broken_pipe(&err) && self.write_error.is_none() {
                self.write_error = Some(err);
            }
        }
    }
}

/// Shared sink for everything the scan prints.
///
/// The counters and the output stream sit behind one mutex, so a match is
/// counted and printed as a single step and lines from different workers
/// never interleave.
pub struct Reporter<W> {
    mute_errors: bool,
    color: bool,
    state: Mutex<ReporterState<W>>,
}

impl<W: Write> Reporter<W> {
    pub fn new(out: W, mute_errors: bool, color: bool) -> Self {
        Self {
            mute_errors,
            color,
            state: Mutex::new(ReporterState {
                out,
                tally: Tally::default(),
                output_open: true,
                write_error: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ReporterState<W>> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Prints an informational line regardless of muting.
    pub fn line(&self, text: impl Display) {
        let line = text.to_string();
        self.lock().emit(&line);
    }

    /// Prints a non-fatal diagnostic unless errors are muted. Does not count
    /// towards the per-file failure total.
    pub fn warn(&self, text: impl Display) {
        if self.mute_errors {
            return;
        }
        let line = self.paint_error(text.to_string());
        self.lock().emit(&line);
    }

    pub fn record_match(&self, path: &Path, bytes: u64) {
        let shown = path.display().to_string();
        let shown = if self.color {
            Colour::Yellow.paint(shown).to_string()
        } else {
            shown
        };
        let line = format!("the last {:4} bytes are zero: {}", bytes, shown);
        let mut state = self.lock();
        state.tally.found += 1;
        state.emit(&line);
    }

    pub fn record_error(&self, err: &ScanError) {
        let mut state = self.lock();
        state.tally.failed += 1;
        if !self.mute_errors {
            let line = self.paint_error(err.to_string());
            state.emit(&line);
        }
    }

    /// Hands back the sink and the final counters. A write failure other than
    /// a closed pipe is reported here.
    pub fn finish(self) -> io::Result<(W, Tally)> {
        let state = self
            .state
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match state.write_error {
            Some(err) => Err(err),
            None => Ok((state.out, state.tally)),
        }
    }

    fn paint_error(&self, text: String) -> String {
        if self.color {
            Colour::Red.paint(text).to_string()
        } else {
            text
        }
    }
}

/// End-of-run numbers, printed as text or JSON.
#[derive(Clone, Debug, Serialize)]
pub struct ScanSummary {
    pub root: PathBuf,
    pub scanned_files: usize,
    pub zero_tail_files: usize,
    pub failed_files: usize,
    pub tail_bytes: u64,
    pub parallel: bool,
    pub elapsed_seconds: f64,
}

impl ScanSummary {
    pub fn new(
        root: &Path,
        scanned_files: usize,
        tally: Tally,
        tail_bytes: u64,
        mode: ExecutionMode,
        elapsed: Duration,
    ) -> Self {
        Self {
            root: root.to_path_buf(),
            scanned_files,
            zero_tail_files: tally.found,
            failed_files: tally.failed,
            tail_bytes,
            parallel: mode.is_parallel(),
            elapsed_seconds: elapsed.as_secs_f64(),
        }
    }

    pub fn text(&self) -> String {
        let mut line = format!(
            "found {} files with a zero tail out of {}",
            self.zero_tail_files, self.scanned_files
        );
        if self.failed_files > 0 {
            line.push_str(&format!(" ({} could not be checked)", self.failed_files));
        }
        line.push_str(&format!(
            " in {}",
            format_duration(Duration::from_secs_f64(self.elapsed_seconds))
        ));
        line
    }

    pub fn write_to<W: Write>(&self, out: &mut W, format: SummaryFormat) -> io::Result<()> {
        match format {
            SummaryFormat::Text => writeln!(out, "{}", self.text()),
            SummaryFormat::Json => {
                serde_json::to_writer_pretty(&mut *out, self)?;
                writeln!(out)
            }
        }
    }
}
