//! Batch library operations
//!
//! Directory walking for build inputs, library discovery and extracting
//! many libraries in one go.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::PakOperations;
use super::clib::{BEGIN_SIGNATURE, END_SIGNATURE, PakPhase, PakProgress};
use crate::error::{Error, Result};
use crate::utils::relative_path;

/// Result of a batch library operation
#[derive(Debug, Clone)]
pub struct BatchPakResult {
    /// Number of successful operations
    pub success_count: usize,
    /// Number of failed operations
    pub fail_count: usize,
    /// Messages for each file processed
    pub results: Vec<String>,
}

/// List the files directly inside `working_dir/dir`, relative to `working_dir`
///
/// Sorted by name; subdirectories and `.DS_Store` are skipped.
///
/// # Errors
///
/// Returns [`Error::WalkDirError`] if the directory cannot be read.
pub fn collect_input_files(working_dir: &Path, dir: &Path) -> Result<Vec<PathBuf>> {
    let root = working_dir.join(dir);
    let mut files = Vec::new();

    for entry in WalkDir::new(&root).min_depth(1).max_depth(1) {
        let entry = entry?;
        if !entry.file_type().is_file() || entry.file_name() == ".DS_Store" {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(working_dir)
            .map_err(|_| Error::InvalidPath(entry.path().display().to_string()))?;
        files.push(relative.to_path_buf());
    }

    files.sort();
    Ok(files)
}

/// Find all CLIB libraries in a directory recursively
///
/// Files are recognised by content: a leading volume signature (standalone
/// primary or continuation volumes) or an end trailer (libraries appended to
/// an executable).
///
/// # Returns
/// A sorted list of paths to libraries found in the directory tree.
pub fn find_library_files<P: AsRef<Path>>(dir: P) -> Vec<PathBuf> {
    let mut libraries: Vec<_> = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|e| e.file_type().is_file() && is_library_file(e.path()))
        .map(|e| e.path().to_path_buf())
        .collect();

    libraries.sort();
    libraries
}

/// Whether `path` starts with a volume signature or ends with a library trailer.
pub fn is_library_file(path: &Path) -> bool {
    let Ok(mut file) = File::open(path) else {
        return false;
    };

    let mut magic = [0u8; 5];
    if file.read_exact(&mut magic).is_ok() && magic == BEGIN_SIGNATURE {
        return true;
    }

    let mut end = [0u8; END_SIGNATURE.len()];
    file.seek(SeekFrom::End(-(END_SIGNATURE.len() as i64)))
        .and_then(|_| file.read_exact(&mut end))
        .is_ok_and(|()| end == END_SIGNATURE)
}

/// Extract several libraries
///
/// Each library is extracted into a folder named after it (without
/// extension), under its path relative to `source_base`.
///
/// # Returns
/// Summary of the batch extraction operation.
pub fn batch_extract<F>(
    libraries: &[PathBuf],
    source_base: &Path,
    dest_base: &Path,
    progress: F,
) -> BatchPakResult
where
    F: Fn(&PakProgress) + Send + Sync,
{
    let total = libraries.len();
    let mut success_count = 0;
    let mut fail_count = 0;
    let mut results = Vec::with_capacity(total);

    for (i, library) in libraries.iter().enumerate() {
        let display_path = relative_path(library.as_path(), source_base)
            .unwrap_or_else(|| library.display().to_string());
        progress(&PakProgress::with_file(
            PakPhase::Extracting,
            i + 1,
            total,
            display_path.as_str(),
        ));

        let relative_parent = library
            .strip_prefix(source_base)
            .ok()
            .and_then(Path::parent)
            .unwrap_or(Path::new(""));
        let stem = library
            .file_stem()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();
        let dest = dest_base.join(relative_parent).join(stem);

        match PakOperations::extract(library.as_path(), dest.as_path()) {
            Ok(()) => {
                success_count += 1;
                results.push(format!("Extracted: {display_path}"));
            }
            Err(e) => {
                fail_count += 1;
                tracing::warn!("Failed to extract {}: {}", display_path, e);
                results.push(format!("Failed {display_path}: {e}"));
            }
        }
    }

    BatchPakResult {
        success_count,
        fail_count,
        results,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pak::clib::BuildOptions;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_collect_input_files_is_sorted_and_flat() {
        let dir = tempdir().unwrap();
        let speech = dir.path().join("Speech");
        fs::create_dir_all(speech.join("nested")).unwrap();
        fs::write(speech.join("b.wav"), b"b").unwrap();
        fs::write(speech.join("a.wav"), b"a").unwrap();
        fs::write(speech.join(".DS_Store"), b"").unwrap();
        fs::write(speech.join("nested/c.wav"), b"c").unwrap();

        let files = collect_input_files(dir.path(), Path::new("Speech")).unwrap();
        assert_eq!(
            files,
            vec![PathBuf::from("Speech/a.wav"), PathBuf::from("Speech/b.wav")]
        );
    }

    #[test]
    fn test_collect_missing_directory() {
        let dir = tempdir().unwrap();
        let result = collect_input_files(dir.path(), Path::new("nope"));
        assert!(matches!(result, Err(Error::WalkDirError(_))));
    }

    #[test]
    fn test_find_and_batch_extract() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(src.join("AudioCache")).unwrap();
        fs::write(src.join("one.txt"), b"1").unwrap();
        fs::write(src.join("AudioCache/two.ogg"), b"22").unwrap();
        fs::write(src.join("plain.txt"), b"not a library").unwrap();

        let standalone = BuildOptions::new("libs/data.ags").with_working_dir(&src);
        PakOperations::build(&["one.txt"], &standalone).unwrap();

        fs::create_dir_all(src.join("Compiled")).unwrap();
        fs::write(src.join("Compiled/game.exe"), b"MZ engine stub").unwrap();
        let bundled = BuildOptions::new("game")
            .with_exe_bundle(true)
            .with_working_dir(&src);
        PakOperations::build(&["AudioCache/two.ogg"], &bundled).unwrap();

        let found = find_library_files(&src);
        assert_eq!(
            found,
            vec![src.join("Compiled/game.exe"), src.join("libs/data.ags")]
        );

        let dest = dir.path().join("dest");
        let result = batch_extract(&found, &src, &dest, |_| {});
        assert_eq!(result.success_count, 2);
        assert_eq!(result.fail_count, 0);
        assert_eq!(fs::read(dest.join("libs/data/one.txt")).unwrap(), b"1");
        assert_eq!(fs::read(dest.join("Compiled/game/two.ogg")).unwrap(), b"22");
    }
}
