use clap::ValueEnum;
use serde::Serialize;
use std::num::NonZeroUsize;
use std::path::PathBuf;

/// Number of trailing bytes inspected when no `--tail-bytes` is given.
pub const DEFAULT_TAIL_BYTES: u64 = 8192;

/// Largest tail window accepted on the command line (64 MiB).
pub const MAX_TAIL_BYTES: u64 = 64 * 1024 * 1024;

#[derive(Copy, Clone, Debug, Serialize, ValueEnum, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SummaryFormat {
    Text,
    Json,
}

/// How the per-file checks are dispatched.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ExecutionMode {
    Serial,
    /// `threads: None` uses rayon's global pool.
    Parallel { threads: Option<NonZeroUsize> },
}

impl ExecutionMode {
    pub fn is_parallel(self) -> bool {
        matches!(self, ExecutionMode::Parallel { .. })
    }
}

/// Settings for one run, fixed before the scan starts.
#[derive(Clone, Debug)]
pub struct ScanOptions {
    pub root: PathBuf,
    pub mute_errors: bool,
    pub mode: ExecutionMode,
    pub tail_bytes: u64,
    pub follow_symlinks: bool,
    pub summary_format: SummaryFormat,
    pub color: bool,
}

impl ScanOptions {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            mute_errors: false,
            mode: ExecutionMode::Parallel { threads: None },
            tail_bytes: DEFAULT_TAIL_BYTES,
            follow_symlinks: false,
            summary_format: SummaryFormat::Text,
            color: false,
        }
    }
}
