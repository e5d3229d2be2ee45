//! Path utilities

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Normalize path separators to forward slashes (as recorded in libraries)
pub fn normalize_path<P: AsRef<Path>>(path: P) -> String {
    path.as_ref().to_string_lossy().replace('\\', "/")
}

/// Get relative path and normalize separators
pub fn relative_path<P: AsRef<Path>>(path: P, base: P) -> Option<String> {
    path.as_ref()
        .strip_prefix(base.as_ref())
        .ok()
        .map(normalize_path)
}

/// Destination of a library entry extracted under `out_dir`.
///
/// Recorded names may use either separator. Absolute names, drive prefixes
/// and `..` components are rejected so extraction cannot leave `out_dir`.
///
/// # Errors
///
/// Returns [`Error::InvalidPath`] for names that would escape `out_dir`.
pub fn entry_output_path(out_dir: &Path, name: &str) -> Result<PathBuf> {
    let name = name.replace('\\', "/");
    if name.starts_with('/') || name.contains(':') {
        return Err(Error::InvalidPath(name));
    }

    let mut path = out_dir.to_path_buf();
    let mut depth = 0;
    for part in name.split('/') {
        match part {
            "" | "." => {}
            ".." => return Err(Error::InvalidPath(name)),
            _ => {
                path.push(part);
                depth += 1;
            }
        }
    }

    if depth == 0 {
        return Err(Error::InvalidPath(name));
    }
    Ok(path)
}
