//! Source lookup through the fixed search path

use std::fs::File;
use std::path::{Path, PathBuf};

use super::SEARCH_FOLDERS;
use crate::error::{Error, Result};

/// A source file found in the search path.
#[derive(Debug)]
pub struct ResolvedSource {
    /// Path relative to the working directory, `/`-separated
    pub relative: String,
    /// Filesystem path that was opened
    pub path: PathBuf,
    /// The open file, positioned at the start
    pub file: File,
}

/// Locate `name` for reading.
///
/// Tries `name` itself, then `AudioCache/name`, then `Speech/name`, all
/// relative to `working_dir`; the first one that opens wins.
pub fn resolve_source(working_dir: &Path, name: &str) -> Result<ResolvedSource> {
    let candidates = std::iter::once(name.to_string())
        .chain(SEARCH_FOLDERS.iter().map(|dir| format!("{dir}/{name}")));

    for relative in candidates {
        let path = working_dir.join(&relative);
        if let Ok(file) = File::open(&path) {
            if file.metadata().is_ok_and(|m| m.is_file()) {
                tracing::trace!("Resolved {} -> {}", name, path.display());
                return Ok(ResolvedSource {
                    relative,
                    path,
                    file,
                });
            }
        }
    }

    Err(Error::SourceNotFound {
        name: name.to_string(),
        working_dir: working_dir.to_path_buf(),
    })
}
