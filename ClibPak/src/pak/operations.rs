//! Core library operations

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use super::clib::{
    BuildOptions, BuildReport, ClibReader, ClibWriter, LibraryEntry, PakPhase, PakProgress,
    ProgressCallback,
};
use crate::error::{Error, Result};
use crate::utils::entry_output_path;

/// Summary of an existing library
#[derive(Debug, Clone)]
pub struct LibraryInfo {
    /// Path the library was read from
    pub path: PathBuf,
    /// Where the library starts inside that file
    pub segment_start: u64,
    /// Header obfuscation seed
    pub seed: i32,
    /// Volume file names, primary first
    pub volume_names: Vec<String>,
    /// Number of entries
    pub entry_count: usize,
    /// Sum of all entry lengths
    pub total_size: u64,
}

/// High-level CLIB library operations.
pub struct PakOperations;

impl PakOperations {
    /// Build a library from `files` (relative to `options.working_dir`).
    ///
    /// # Errors
    ///
    /// Returns a validation error before any output is written, [`Error::SourceNotFound`]
    /// if a file cannot be located, or an IO error if a volume cannot be written.
    ///
    /// [`Error::SourceNotFound`]: crate::Error::SourceNotFound
    pub fn build<P: AsRef<Path>>(files: &[P], options: &BuildOptions) -> Result<BuildReport> {
        Self::build_with_progress(files, options, &|_| {})
    }

    /// Build a library with progress callback
    ///
    /// # Errors
    ///
    /// See [`PakOperations::build`].
    pub fn build_with_progress<P: AsRef<Path>>(
        files: &[P],
        options: &BuildOptions,
        progress: ProgressCallback,
    ) -> Result<BuildReport> {
        ClibWriter::new(options.clone()).build_with_progress(files, progress)
    }

    /// List the entries of a library
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be opened, or a format error
    /// if it is not a readable library.
    ///
    /// [`Error::Io`]: crate::Error::Io
    pub fn list<P: AsRef<Path>>(path: P) -> Result<Vec<LibraryEntry>> {
        Self::list_with_progress(path, &|_| {})
    }

    /// List the entries of a library with progress callback
    ///
    /// # Errors
    ///
    /// See [`PakOperations::list`].
    pub fn list_with_progress<P: AsRef<Path>>(
        path: P,
        progress: ProgressCallback,
    ) -> Result<Vec<LibraryEntry>> {
        progress(&PakProgress::new(PakPhase::ReadingHeader, 1, 1));
        let reader = ClibReader::open(path)?;
        let entries = reader.entries().to_vec();
        progress(&PakProgress::new(PakPhase::Complete, entries.len(), entries.len()));
        Ok(entries)
    }

    /// Read the header of a library and summarise it
    ///
    /// # Errors
    ///
    /// See [`PakOperations::list`].
    pub fn info<P: AsRef<Path>>(path: P) -> Result<LibraryInfo> {
        let path = path.as_ref();
        let reader = ClibReader::open(path)?;
        Ok(LibraryInfo {
            path: path.to_path_buf(),
            segment_start: reader.segment_start(),
            seed: reader.seed(),
            volume_names: reader.index().volume_names.clone(),
            entry_count: reader.entries().len(),
            total_size: reader.index().total_size(),
        })
    }

    /// Extract every entry of a library into `output_dir`
    ///
    /// # Errors
    ///
    /// Returns a format error for unreadable libraries, [`Error::InvalidPath`]
    /// for entry names that would leave `output_dir`, [`Error::VolumeMissing`]
    /// if a continuation volume is absent, or an IO error.
    ///
    /// [`Error::InvalidPath`]: crate::Error::InvalidPath
    /// [`Error::VolumeMissing`]: crate::Error::VolumeMissing
    pub fn extract<P: AsRef<Path>>(path: P, output_dir: P) -> Result<()> {
        Self::extract_with_progress(path, output_dir, &|_| {})
    }

    /// Extract every entry of a library with progress callback
    ///
    /// # Errors
    ///
    /// See [`PakOperations::extract`].
    pub fn extract_with_progress<P: AsRef<Path>>(
        path: P,
        output_dir: P,
        progress: ProgressCallback,
    ) -> Result<()> {
        progress(&PakProgress::new(PakPhase::ReadingHeader, 1, 1));
        let reader = ClibReader::open(path)?;
        let selected: Vec<usize> = (0..reader.entries().len()).collect();
        Self::extract_selected(reader, &selected, output_dir.as_ref(), progress)
    }

    /// Extract the named entries of a library into `output_dir`
    ///
    /// Names are matched case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EntryNotFound`] if a name is not in the library, or
    /// the errors of [`PakOperations::extract`].
    ///
    /// [`Error::EntryNotFound`]: crate::Error::EntryNotFound
    pub fn extract_files<P: AsRef<Path>, S: AsRef<str>>(
        path: P,
        output_dir: P,
        names: &[S],
    ) -> Result<()> {
        Self::extract_files_with_progress(path, output_dir, names, &|_| {})
    }

    /// Extract the named entries with progress callback
    ///
    /// # Errors
    ///
    /// See [`PakOperations::extract_files`].
    pub fn extract_files_with_progress<P: AsRef<Path>, S: AsRef<str>>(
        path: P,
        output_dir: P,
        names: &[S],
        progress: ProgressCallback,
    ) -> Result<()> {
        progress(&PakProgress::new(PakPhase::ReadingHeader, 1, 1));
        let reader = ClibReader::open(path)?;
        let selected = names
            .iter()
            .map(|name| {
                let name = name.as_ref();
                reader
                    .index()
                    .find(name)
                    .map(|(i, _)| i)
                    .ok_or_else(|| Error::EntryNotFound(name.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;
        Self::extract_selected(reader, &selected, output_dir.as_ref(), progress)
    }

    /// Read a single entry into memory
    ///
    /// # Errors
    ///
    /// Returns [`Error::EntryNotFound`] if the name is not in the library,
    /// or the errors of [`PakOperations::list`].
    ///
    /// [`Error::EntryNotFound`]: crate::Error::EntryNotFound
    pub fn read_file_bytes<P: AsRef<Path>>(path: P, name: &str) -> Result<Vec<u8>> {
        ClibReader::open(path)?.read_entry(name)
    }

    fn extract_selected(
        mut reader: ClibReader<File>,
        selected: &[usize],
        output_dir: &Path,
        progress: ProgressCallback,
    ) -> Result<()> {
        // Validate every destination before writing anything
        let targets = selected
            .iter()
            .map(|&i| entry_output_path(output_dir, &reader.entries()[i].name).map(|p| (i, p)))
            .collect::<Result<Vec<_>>>()?;

        std::fs::create_dir_all(output_dir)?;
        let total = targets.len();
        for (n, (i, target)) in targets.into_iter().enumerate() {
            let name = reader.entries()[i].name.clone();
            progress(&PakProgress::with_file(PakPhase::Extracting, n + 1, total, name.as_str()));

            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut out = BufWriter::new(File::create(&target)?);
            reader.copy_entry_to(i, &mut out)?;
            out.into_inner().map_err(std::io::IntoInnerError::into_error)?;
            tracing::debug!("Extracted {} -> {}", name, target.display());
        }

        progress(&PakProgress::new(PakPhase::Complete, total, total));
        tracing::info!("Extracted {} file(s) to {}", total, output_dir.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::tempdir;

    fn build_sample(dir: &Path) -> BuildReport {
        fs::create_dir_all(dir.join("Speech")).unwrap();
        fs::write(dir.join("a.txt"), b"first").unwrap();
        fs::write(dir.join("Speech/b.wav"), b"second").unwrap();
        let options = BuildOptions::new("data.ags").with_working_dir(dir).with_seed(3);
        PakOperations::build(&["a.txt", "Speech/b.wav"], &options).unwrap()
    }

    #[test]
    fn test_list_and_info() {
        let dir = tempdir().unwrap();
        let report = build_sample(dir.path());

        let entries = PakOperations::list(&report.volume_paths[0]).unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "Speech/b.wav"]);

        let info = PakOperations::info(&report.volume_paths[0]).unwrap();
        assert_eq!(info.entry_count, 2);
        assert_eq!(info.total_size, 11);
        assert_eq!(info.seed, 3);
        assert_eq!(info.volume_names, vec!["data.ags".to_string()]);
    }

    #[test]
    fn test_extract_writes_identical_bytes() {
        let dir = tempdir().unwrap();
        let report = build_sample(dir.path());
        let out = dir.path().join("out");

        PakOperations::extract(report.volume_paths[0].as_path(), out.as_path()).unwrap();
        assert_eq!(fs::read(out.join("a.txt")).unwrap(), b"first");
        assert_eq!(fs::read(out.join("Speech/b.wav")).unwrap(), b"second");
    }

    #[test]
    fn test_extract_named_files() {
        let dir = tempdir().unwrap();
        let report = build_sample(dir.path());
        let out = dir.path().join("picked");

        PakOperations::extract_files(report.volume_paths[0].as_path(), out.as_path(), &["A.TXT"])
            .unwrap();
        assert!(out.join("a.txt").exists());
        assert!(!out.join("Speech").exists());

        let err = PakOperations::extract_files(
            report.volume_paths[0].as_path(),
            out.as_path(),
            &["nope"],
        )
        .unwrap_err();
        assert!(matches!(err, Error::EntryNotFound(_)));
    }

    #[test]
    fn test_read_file_bytes() {
        let dir = tempdir().unwrap();
        let report = build_sample(dir.path());
        let bytes = PakOperations::read_file_bytes(&report.volume_paths[0], "speech/B.WAV").unwrap();
        assert_eq!(bytes, b"second");
    }
}
