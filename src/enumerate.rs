use std::fs;
use std::io;
use std::path::{self, Path, PathBuf};
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

/// Failures that prevent a scan from starting at all.
#[derive(Debug, Error)]
pub enum PathError {
    #[error("unable to get full path for {}: {source}", path.display())]
    Resolve {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("can't find path {}: {source}", path.display())]
    Missing {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("path isn't a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("can't read directory {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Regular files found under a root, plus the entries the walk had to skip.
#[derive(Debug, Default)]
pub struct Enumeration {
    pub files: Vec<PathBuf>,
    pub skipped: Vec<walkdir::Error>,
}

/// Turns a user-supplied path into an absolute path to an existing directory.
pub fn resolve_root(path: &Path) -> Result<PathBuf, PathError> {
    let full = path::absolute(path).map_err(|source| PathError::Resolve {
        path: path.to_path_buf(),
        source,
    })?;
    let metadata = fs::metadata(&full).map_err(|source| PathError::Missing {
        path: full.clone(),
        source,
    })?;
    if !metadata.is_dir() {
        return Err(PathError::NotADirectory(full));
    }
    Ok(full)
}

/// Walks `root` recursively and collects the path of every regular file.
///
/// Only an unreadable root is fatal. Anything that goes wrong further down the
/// tree lands in [`Enumeration::skipped`] and the walk carries on.
pub fn collect_files(root: &Path, follow_symlinks: bool) -> Result<Enumeration, PathError> {
    fs::read_dir(root).map_err(|source| PathError::Unreadable {
        path: root.to_path_buf(),
        source,
    })?;

    let mut enumeration = Enumeration::default();
    for entry in WalkDir::new(root).follow_links(follow_symlinks) {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                debug!(error = %e, "skipping unreadable entry");
                enumeration.skipped.push(e);
                continue;
            }
        };
        if entry.file_type().is_file() {
            enumeration.files.push(entry.into_path());
        }
    }
    debug!(
        root = %root.display(),
        files = enumeration.files.len(),
        skipped = enumeration.skipped.len(),
        "enumeration complete"
    );
    Ok(enumeration)
}
