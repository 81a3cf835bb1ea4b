use crate::options::{ExecutionMode, ScanOptions};
use crate::report::Reporter;
use rayon::prelude::*;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, trace};

/// A failure while checking one file. Never fatal to the scan.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("can't open file {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("can't get file length for file {}: {source}", path.display())]
    SizeQuery {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("can't seek to {len} bytes from end of file {}: {source}", path.display())]
    Seek {
        path: PathBuf,
        len: u64,
        #[source]
        source: io::Error,
    },

    #[error("can't read {len} bytes from file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        len: u64,
        #[source]
        source: io::Error,
    },
}

impl ScanError {
    pub fn operation(&self) -> &'static str {
        match self {
            ScanError::Open { .. } => "open",
            ScanError::SizeQuery { .. } => "size",
            ScanError::Seek { .. } => "seek",
            ScanError::Read { .. } => "read",
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            ScanError::Open { path, .. }
            | ScanError::SizeQuery { path, .. }
            | ScanError::Seek { path, .. }
            | ScanError::Read { path, .. } => path,
        }
    }

    pub fn os_code(&self) -> Option<i32> {
        match self {
            ScanError::Open { source, .. }
            | ScanError::SizeQuery { source, .. }
            | ScanError::Seek { source, .. }
            | ScanError::Read { source, .. } => source.raw_os_error(),
        }
    }
}

/// Outcome of a successful tail check.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TailVerdict {
    /// The last `bytes` bytes are all zero.
    ZeroTail { bytes: u64 },
    NonZero,
    /// Zero-length files carry no tail to judge.
    Empty,
}

/// Opens `path` read-only without denying other readers, writers or deleters.
fn open_shared(path: &Path) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.read(true);
    #[cfg(windows)]
    {
        use std::os::windows::fs::OpenOptionsExt;
        const FILE_SHARE_READ: u32 = 0x1;
        const FILE_SHARE_WRITE: u32 = 0x2;
        const FILE_SHARE_DELETE: u32 = 0x4;
        options.share_mode(FILE_SHARE_READ | FILE_SHARE_WRITE | FILE_SHARE_DELETE);
    }
    options.open(path)
}

fn is_zero_filled(buf: &[u8]) -> bool {
    buf.iter().all(|&b| b == 0)
}

/// Reads the last `min(len, tail_bytes)` bytes of `path` and reports whether
/// they are all zero.
///
/// The file handle lives only for this call and is closed on every return
/// path.
pub fn check_tail(path: &Path, tail_bytes: u64) -> Result<TailVerdict, ScanError> {
    let mut file = open_shared(path).map_err(|source| ScanError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    let size = file
        .metadata()
        .map_err(|source| ScanError::SizeQuery {
            path: path.to_path_buf(),
            source,
        })?
        .len();
    read_tail(&mut file, path, size, tail_bytes)
}

/// Classifies the tail of `reader`, trusting `size` as its length.
///
/// If the data turns out shorter than `size` (a file truncated after its size
/// was taken), the read comes up short and the result is a
/// [`ScanError::Read`], never a match.
fn read_tail<R: Read + Seek>(
    reader: &mut R,
    path: &Path,
    size: u64,
    tail_bytes: u64,
) -> Result<TailVerdict, ScanError> {
    if size == 0 {
        return Ok(TailVerdict::Empty);
    }

    let to_check = size.min(tail_bytes);
    reader
        .seek(SeekFrom::Start(size - to_check))
        .map_err(|source| ScanError::Seek {
            path: path.to_path_buf(),
            len: to_check,
            source,
        })?;

    let mut buf = vec![0u8; to_check as usize];
    reader
        .read_exact(&mut buf)
        .map_err(|source| ScanError::Read {
            path: path.to_path_buf(),
            len: to_check,
            source,
        })?;

    if is_zero_filled(&buf) {
        Ok(TailVerdict::ZeroTail { bytes: to_check })
    } else {
        Ok(TailVerdict::NonZero)
    }
}

fn scan_one<W: Write>(path: &Path, tail_bytes: u64, reporter: &Reporter<W>) {
    match check_tail(path, tail_bytes) {
        Ok(TailVerdict::ZeroTail { bytes }) => reporter.record_match(path, bytes),
        Ok(verdict) => trace!(path = %path.display(), ?verdict, "tail checked"),
        Err(err) => {
            debug!(
                path = %err.path().display(),
                op = err.operation(),
                code = ?err.os_code(),
                "tail check failed"
            );
            reporter.record_error(&err);
        }
    }
}

/// Checks every path once, serially or across a rayon pool, feeding results
/// into `reporter`. Returns after all checks have completed.
pub fn scan_paths<W: Write + Send>(
    paths: &[PathBuf],
    options: &ScanOptions,
    reporter: &Reporter<W>,
) -> Result<(), rayon::ThreadPoolBuildError> {
    let tail_bytes = options.tail_bytes;
    let visit = |path: &PathBuf| scan_one(path, tail_bytes, reporter);

    match options.mode {
        ExecutionMode::Serial => paths.iter().for_each(visit),
        ExecutionMode::Parallel { threads: None } => paths.par_iter().for_each(visit),
        ExecutionMode::Parallel {
            threads: Some(threads),
        } => {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads.get())
                .build()?;
            pool.install(|| paths.par_iter().for_each(visit));
        }
    }
    Ok(())
}
