//! Multi-volume library writer
//!
//! A build has three stages. [`ClibWriter::plan`] validates names, measures
//! every source and assigns volumes without touching any output. The write
//! stage then emits each volume with a placeholder header in the primary
//! one, and finally the primary header is rewritten in place once every
//! payload offset is known.

use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, WriteBytesExt};

use super::{
    ArchiveEntry, BEGIN_SIGNATURE, COMPILED_DIR, END_SIGNATURE, FsVolumeStore, LIB_VERSION,
    MAX_DATAFILENAME_LENGTH, MAX_FILENAME_LENGTH, MAX_FILES, MAX_VOLUMES, PakPhase, PakProgress,
    ProgressCallback, SIGNATURE_SIZE, VolumeOpenMode, VolumePlanner, VolumeSet, VolumeStore,
    copy_payload, encode_header, is_disk_full, resolve_source, volume_file_names,
};
use crate::error::{Error, Result};

/// Settings for one library build
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Output base name. The output file itself, or the stem of
    /// `Compiled/<base>.exe`, `Compiled/<base>.001`, ... when bundling
    pub base_name: PathBuf,
    /// Payload bytes per volume before a new one is started; 0 disables splitting
    pub split_threshold: u64,
    /// Append to an engine executable and number the continuation volumes
    pub exe_bundle: bool,
    /// Root for source lookup and output paths
    pub working_dir: PathBuf,
    /// Header obfuscation seed; the current time when unset
    pub seed: Option<i32>,
}

impl BuildOptions {
    /// Options for a single-volume, non-bundled build in the current directory
    pub fn new(base_name: impl Into<PathBuf>) -> Self {
        Self {
            base_name: base_name.into(),
            split_threshold: 0,
            exe_bundle: false,
            working_dir: PathBuf::from("."),
            seed: None,
        }
    }

    /// Set the split threshold in bytes
    #[must_use]
    pub fn with_split_threshold(mut self, bytes: u64) -> Self {
        self.split_threshold = bytes;
        self
    }

    /// Enable or disable EXE bundling
    #[must_use]
    pub fn with_exe_bundle(mut self, exe_bundle: bool) -> Self {
        self.exe_bundle = exe_bundle;
        self
    }

    /// Set the directory sources are looked up in and outputs written to
    #[must_use]
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = dir.into();
        self
    }

    /// Use a fixed obfuscation seed (reproducible output)
    #[must_use]
    pub fn with_seed(mut self, seed: i32) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Where volume `index` is written.
    #[must_use]
    pub fn volume_path(&self, volume_names: &[String], index: usize) -> PathBuf {
        match volume_names.get(index) {
            Some(name) if self.exe_bundle => self.working_dir.join(COMPILED_DIR).join(name),
            _ => self.working_dir.join(&self.base_name),
        }
    }
}

/// Outcome of a successful build
#[derive(Debug, Clone)]
pub struct BuildReport {
    /// The table as written, with final offsets
    pub volume_set: VolumeSet,
    /// Output path of each volume, by index
    pub volume_paths: Vec<PathBuf>,
    /// Seed the header was obfuscated with
    pub seed: i32,
    /// Where the library starts inside the primary volume (non-zero when appended)
    pub segment_start: u64,
    /// Absolute position of the header in the primary volume
    pub header_offset: u64,
    /// Encoded header size, seed included
    pub header_len: usize,
}

impl BuildReport {
    /// Number of volumes written
    #[must_use]
    pub fn volume_count(&self) -> usize {
        self.volume_paths.len()
    }
}

/// Position of the library inside the primary volume.
#[derive(Debug, Clone, Copy)]
struct PrimaryLayout {
    segment_start: u64,
    header_offset: u64,
    header_len: usize,
}

/// Builds CLIB libraries.
///
/// Generic over the [`VolumeStore`] receiving the volumes; [`ClibWriter::new`]
/// writes to disk.
///
/// # Example
/// ```no_run
/// use clibpak::pak::clib::{BuildOptions, ClibWriter};
///
/// let options = BuildOptions::new("game")
///     .with_exe_bundle(true)
///     .with_split_threshold(50_000_000)
///     .with_working_dir("project");
/// let report = ClibWriter::new(options).build(&["game28.dta", "acsprset.spr"])?;
/// println!("wrote {} volume(s)", report.volume_count());
/// # Ok::<(), clibpak::Error>(())
/// ```
#[derive(Debug)]
pub struct ClibWriter<S: VolumeStore = FsVolumeStore> {
    options: BuildOptions,
    store: S,
}

impl ClibWriter<FsVolumeStore> {
    /// Writer that puts volumes on disk
    #[must_use]
    pub fn new(options: BuildOptions) -> Self {
        Self::with_store(options, FsVolumeStore::new())
    }
}

impl<S: VolumeStore> ClibWriter<S> {
    /// Writer using a custom volume store
    pub fn with_store(options: BuildOptions, store: S) -> Self {
        Self { options, store }
    }

    #[must_use]
    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Build a library from `files`, in order.
    ///
    /// # Errors
    ///
    /// Returns a validation error before any output is created, [`Error::SourceNotFound`]
    /// if a source cannot be located, or an IO error if a volume cannot be written.
    /// Outputs created by a failed build are removed.
    pub fn build<P: AsRef<Path>>(&mut self, files: &[P]) -> Result<BuildReport> {
        self.build_with_progress(files, &|_| {})
    }

    /// Build a library from `files` with progress callback.
    ///
    /// # Errors
    ///
    /// See [`ClibWriter::build`].
    pub fn build_with_progress<P: AsRef<Path>>(
        &mut self,
        files: &[P],
        progress: ProgressCallback,
    ) -> Result<BuildReport> {
        let volume_set = self.plan_with_progress(files, progress)?;
        self.write_with_progress(volume_set, progress)
    }

    /// Validate, measure and assign volumes without writing anything.
    ///
    /// `files` are relative to the working directory (or absolute). Each is
    /// recorded under its base name, which in non-bundled builds becomes the
    /// path it was found at relative to the working directory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TooManyFiles`], [`Error::FileNameTooLong`],
    /// [`Error::VolumeNameTooLong`], [`Error::FileTooLarge`] or [`Error::SourceNotFound`].
    pub fn plan<P: AsRef<Path>>(&self, files: &[P]) -> Result<VolumeSet> {
        self.plan_with_progress(files, &|_| {})
    }

    /// [`ClibWriter::plan`] with progress callback.
    ///
    /// # Errors
    ///
    /// See [`ClibWriter::plan`].
    pub fn plan_with_progress<P: AsRef<Path>>(
        &self,
        files: &[P],
        progress: ProgressCallback,
    ) -> Result<VolumeSet> {
        let total = files.len();
        let working_dir = &self.options.working_dir;

        progress(&PakProgress::new(PakPhase::Validating, 0, total));
        if total > MAX_FILES {
            return Err(Error::TooManyFiles {
                count: total,
                max: MAX_FILES,
            });
        }
        if self.options.base_name.file_name().is_none() {
            return Err(Error::InvalidPath(format!(
                "output name has no file name: {}",
                self.options.base_name.display()
            )));
        }

        let mut names = Vec::with_capacity(total);
        for file in files {
            let file = file.as_ref();
            let name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(|| Error::InvalidPath(file.display().to_string()))?;
            check_entry_name(&name)?;
            names.push(name);
        }

        let mut planner = VolumePlanner::new(self.options.split_threshold);
        let mut volume_set = VolumeSet::new();
        for (i, (file, name)) in files.iter().zip(names).enumerate() {
            let file = file.as_ref();
            progress(&PakProgress::with_file(PakPhase::Planning, i + 1, total, name.as_str()));

            let source = working_dir.join(file);
            let metadata = std::fs::metadata(&source)
                .ok()
                .filter(std::fs::Metadata::is_file)
                .ok_or_else(|| Error::SourceNotFound {
                    name: file.display().to_string(),
                    working_dir: working_dir.clone(),
                })?;
            let size = metadata.len();
            let length = i32::try_from(size)
                .ok()
                .and_then(|l| u32::try_from(l).ok())
                .ok_or_else(|| Error::FileTooLarge {
                    path: source.clone(),
                    size,
                })?;

            let volume = planner.assign(&name, size);
            volume_set.entries.push(ArchiveEntry {
                name,
                source,
                volume,
                offset: 0,
                length,
            });
        }

        // Record the names the engine will look the entries up by
        for (i, entry) in volume_set.entries.iter_mut().enumerate() {
            progress(&PakProgress::with_file(PakPhase::Resolving, i + 1, total, entry.name.as_str()));
            let resolved = resolve_source(working_dir, &entry.name)?;
            if !self.options.exe_bundle {
                entry.name = resolved.relative;
                check_entry_name(&entry.name)?;
            }
            entry.source = resolved.path;
        }

        volume_set.volume_names = volume_file_names(
            &self.options.base_name,
            self.options.exe_bundle,
            planner.volume_count(),
        );
        for name in &volume_set.volume_names {
            if name.len() >= MAX_DATAFILENAME_LENGTH {
                return Err(Error::VolumeNameTooLong {
                    name: name.clone(),
                    max: MAX_DATAFILENAME_LENGTH,
                });
            }
        }

        if !self.options.exe_bundle && volume_set.volume_names.len() > 1 {
            tracing::warn!(
                "{} volumes share the output name {}; later volumes overwrite earlier ones on disk",
                volume_set.volume_names.len(),
                self.options.base_name.display()
            );
        }

        tracing::info!(
            "Planned {} files over {} volume(s)",
            volume_set.entries.len(),
            volume_set.volume_names.len()
        );
        Ok(volume_set)
    }

    /// Write a planned library.
    ///
    /// # Errors
    ///
    /// See [`ClibWriter::build`].
    pub fn write(&mut self, volume_set: VolumeSet) -> Result<BuildReport> {
        self.write_with_progress(volume_set, &|_| {})
    }

    /// Write a planned library with progress callback.
    ///
    /// # Errors
    ///
    /// See [`ClibWriter::build`].
    pub fn write_with_progress(
        &mut self,
        mut volume_set: VolumeSet,
        progress: ProgressCallback,
    ) -> Result<BuildReport> {
        let count = volume_set.volume_names.len();
        if count == 0 || count > MAX_VOLUMES || volume_set.volume_count() > count {
            return Err(Error::InvalidFormat(format!(
                "{count} data file name(s) for {} volume(s)",
                volume_set.volume_count()
            )));
        }

        let seed = self.options.seed.unwrap_or_else(time_seed);
        let volume_paths: Vec<PathBuf> = (0..count)
            .map(|i| self.options.volume_path(&volume_set.volume_names, i))
            .collect();

        self.store.begin();
        let mut opened = Vec::with_capacity(count);
        let layout = match self.write_volumes(&mut volume_set, &volume_paths, seed, &mut opened, progress)
        {
            Ok(layout) => layout,
            Err(err) => {
                if matches!(&err, Error::WriteFailed { source, .. } if is_disk_full(source)) {
                    tracing::error!("Output disk is full");
                }
                tracing::warn!("Build failed, removing partial output: {}", err);
                self.discard_volumes(&opened, &volume_paths);
                return Err(err);
            }
        };

        progress(&PakProgress::new(PakPhase::Complete, count, count));
        tracing::info!(
            "Wrote {} files to {} volume(s), primary {}",
            volume_set.entries.len(),
            count,
            volume_paths[0].display()
        );

        Ok(BuildReport {
            volume_set,
            volume_paths,
            seed,
            segment_start: layout.segment_start,
            header_offset: layout.header_offset,
            header_len: layout.header_len,
        })
    }

    fn write_volumes(
        &mut self,
        volume_set: &mut VolumeSet,
        volume_paths: &[PathBuf],
        seed: i32,
        opened: &mut Vec<u8>,
        progress: ProgressCallback,
    ) -> Result<PrimaryLayout> {
        let working_dir = self.options.working_dir.clone();
        let total_files = volume_set.entries.len();
        let count = volume_paths.len();
        let mut copied = 0;
        let mut primary = None;

        for (index, path) in volume_paths.iter().enumerate() {
            let volume_index = u8::try_from(index)
                .map_err(|_| Error::InvalidFormat(format!("volume index {index} out of range")))?;
            let volume_name = volume_set.volume_names[index].clone();
            let write_failed = |source| Error::WriteFailed {
                name: volume_name.clone(),
                source,
            };

            progress(&PakProgress::with_file(
                PakPhase::WritingVolume,
                index + 1,
                count,
                volume_name.as_str(),
            ));

            let mode = if index == 0 {
                VolumeOpenMode::Append
            } else {
                VolumeOpenMode::CreateFresh
            };
            let mut volume = self
                .store
                .open(volume_index, path, mode)
                .map_err(|source| Error::OpenFailed {
                    path: path.clone(),
                    source,
                })?;
            opened.push(volume_index);

            let segment_start = volume.seek(SeekFrom::End(0))?;
            volume.write_all(&BEGIN_SIGNATURE).map_err(write_failed)?;
            volume
                .write_all(&[LIB_VERSION, volume_index])
                .map_err(write_failed)?;
            let mut position = segment_start + SIGNATURE_SIZE;

            if index == 0 {
                let placeholder = encode_header(&volume_set.to_index(), seed)?;
                volume.write_all(&placeholder).map_err(write_failed)?;
                primary = Some(PrimaryLayout {
                    segment_start,
                    header_offset: position,
                    header_len: placeholder.len(),
                });
                position += placeholder.len() as u64;
            }

            for entry in volume_set.entries.iter_mut().filter(|e| e.volume == volume_index) {
                entry.offset = format_field(position - segment_start).ok_or_else(|| {
                    Error::OffsetOverflow {
                        name: entry.name.clone(),
                    }
                })?;

                copied += 1;
                progress(&PakProgress::with_file(
                    PakPhase::CopyingFiles,
                    copied,
                    total_files,
                    entry.name.as_str(),
                ));

                let mut source = resolve_source(&working_dir, &entry.name)?;
                tracing::debug!(
                    "{} -> {} @ {} ({} bytes)",
                    source.path.display(),
                    volume_name,
                    entry.offset,
                    entry.length
                );
                position += copy_payload(
                    &mut source.file,
                    &mut volume,
                    u64::from(entry.length),
                    &entry.name,
                    &working_dir,
                )?;
            }

            if segment_start > 0 {
                let start = format_field(segment_start).ok_or_else(|| Error::OffsetOverflow {
                    name: volume_name.clone(),
                })?;
                volume
                    .write_i32::<LittleEndian>(start as i32)
                    .map_err(write_failed)?;
                volume.write_all(&END_SIGNATURE).map_err(write_failed)?;
            }

            self.store
                .finish(volume_index, volume)
                .map_err(write_failed)?;
            tracing::debug!(
                "Finished volume {} ({}), segment start {}",
                index,
                path.display(),
                segment_start
            );
        }

        let layout = primary
            .ok_or_else(|| Error::InvalidFormat("library has no primary volume".to_string()))?;
        self.backpatch_header(volume_set, &volume_paths[0], layout, seed, progress)?;
        Ok(layout)
    }

    /// Overwrite the placeholder header with the final table.
    fn backpatch_header(
        &mut self,
        volume_set: &VolumeSet,
        path: &Path,
        layout: PrimaryLayout,
        seed: i32,
        progress: ProgressCallback,
    ) -> Result<()> {
        progress(&PakProgress::new(PakPhase::Backpatching, 1, 1));

        let header = encode_header(&volume_set.to_index(), seed)?;
        if header.len() != layout.header_len {
            return Err(Error::HeaderSizeMismatch {
                expected: layout.header_len,
                actual: header.len(),
            });
        }

        let write_failed = |source| Error::WriteFailed {
            name: volume_set.volume_names[0].clone(),
            source,
        };
        let mut volume = self
            .store
            .open(0, path, VolumeOpenMode::Rewrite)
            .map_err(|source| Error::OpenFailed {
                path: path.to_path_buf(),
                source,
            })?;
        volume.seek(SeekFrom::Start(layout.header_offset))?;
        volume.write_all(&header).map_err(write_failed)?;
        self.store.finish(0, volume).map_err(write_failed)?;

        tracing::debug!(
            "Header rewritten at {} ({} bytes)",
            layout.header_offset,
            header.len()
        );
        Ok(())
    }

    fn discard_volumes(&mut self, opened: &[u8], volume_paths: &[PathBuf]) {
        for &index in opened.iter().rev() {
            let path = &volume_paths[usize::from(index)];
            if let Err(err) = self.store.discard(index, path) {
                tracing::warn!("Failed to remove {}: {}", path.display(), err);
            }
        }
    }
}

fn check_entry_name(name: &str) -> Result<()> {
    if name.len() >= MAX_FILENAME_LENGTH {
        return Err(Error::FileNameTooLong {
            name: name.to_string(),
            length: name.len(),
            max: MAX_FILENAME_LENGTH,
        });
    }
    Ok(())
}

/// Fits `value` into a non-negative 32-bit table field.
fn format_field(value: u64) -> Option<u32> {
    i32::try_from(value).ok().and_then(|v| u32::try_from(v).ok())
}

fn time_seed() -> i32 {
    chrono::Utc::now().timestamp() as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pak::clib::{MemoryVolumeStore, RAND_SEED_SALT, TRAILER_SIZE, decode_header};
    use pretty_assertions::assert_eq;
    use std::fs;
    use std::io::{self, Cursor};
    use tempfile::{TempDir, tempdir};

    fn project(files: &[(&str, Vec<u8>)]) -> TempDir {
        let dir = tempdir().unwrap();
        for (name, data) in files {
            let path = dir.path().join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, data).unwrap();
        }
        dir
    }

    fn memory_writer(dir: &Path, options: BuildOptions) -> ClibWriter<MemoryVolumeStore> {
        ClibWriter::with_store(options.with_working_dir(dir), MemoryVolumeStore::new())
    }

    #[test]
    fn test_single_volume_layout() {
        let dir = project(&[("a.txt", b"hello".to_vec()), ("b.bin", vec![7u8; 300])]);
        let mut writer = memory_writer(dir.path(), BuildOptions::new("game.ags").with_seed(1234));
        let report = writer.build(&["a.txt", "b.bin"]).unwrap();

        let volume = writer.store().volume(0).unwrap();
        assert_eq!(&volume[..5], b"CLIB\x1a");
        assert_eq!(volume[5], LIB_VERSION);
        assert_eq!(volume[6], 0);

        let stored = i32::from_le_bytes(volume[7..11].try_into().unwrap());
        assert_eq!(stored, 1234 - RAND_SEED_SALT);

        let (index, seed) = decode_header(&volume[7..]).unwrap();
        assert_eq!(seed, 1234);
        assert_eq!(index.volume_names, vec!["game.ags".to_string()]);
        assert_eq!(index.entries.len(), 2);

        let payload_start = 7 + report.header_len;
        assert_eq!(index.entries[0].offset as usize, payload_start);
        assert_eq!(index.entries[1].offset as usize, payload_start + 5);
        assert_eq!(&volume[payload_start..payload_start + 5], b"hello");
        assert_eq!(volume.len(), payload_start + 305);
        assert_eq!(report.segment_start, 0);
        assert_eq!(report.header_offset, 7);
    }

    #[test]
    fn test_split_volumes() {
        let dir = project(&[
            ("game28.dta", vec![1u8; 500]),
            ("acsprset.spr", vec![2u8; 10000]),
            ("music.vox", vec![3u8; 300]),
        ]);
        let options = BuildOptions::new("game")
            .with_exe_bundle(true)
            .with_split_threshold(20000)
            .with_seed(77);
        let mut writer = memory_writer(dir.path(), options);
        let report = writer
            .build(&["game28.dta", "acsprset.spr", "music.vox"])
            .unwrap();

        assert_eq!(report.volume_count(), 2);
        assert_eq!(
            report.volume_paths,
            vec![
                dir.path().join("Compiled/game.exe"),
                dir.path().join("Compiled/game.001"),
            ]
        );

        let primary = writer.store().volume(0).unwrap();
        let (index, _) = decode_header(&primary[7..]).unwrap();
        assert_eq!(index.volume_names, vec!["game.exe".to_string(), "game.001".to_string()]);
        let volumes: Vec<u8> = index.entries.iter().map(|e| e.volume).collect();
        assert_eq!(volumes, vec![0, 1, 1]);

        let second = writer.store().volume(1).unwrap();
        assert_eq!(&second[..7], b"CLIB\x1a\x15\x01");
        assert_eq!(index.entries[1].offset, 7);
        assert_eq!(index.entries[2].offset, 10007);
        assert_eq!(second.len(), 7 + 10000 + 300);
        assert!(second[7..10007].iter().all(|b| *b == 2));
        assert_eq!(primary.len(), 7 + report.header_len + 500);
    }

    #[test]
    fn test_exe_append_writes_trailer() {
        let dir = project(&[("a.txt", b"abc".to_vec())]);
        let exe = vec![0x4du8; 1000];
        let store = MemoryVolumeStore::new().with_existing(0, exe.clone());
        let options = BuildOptions::new("game")
            .with_exe_bundle(true)
            .with_working_dir(dir.path())
            .with_seed(5);
        let mut writer = ClibWriter::with_store(options, store);
        let report = writer.build(&["a.txt"]).unwrap();

        let volume = writer.store().volume(0).unwrap();
        assert_eq!(&volume[..1000], exe.as_slice());
        assert_eq!(&volume[1000..1005], b"CLIB\x1a");
        assert_eq!(report.segment_start, 1000);
        assert_eq!(report.header_offset, 1007);

        let trailer = &volume[volume.len() - TRAILER_SIZE as usize..];
        assert_eq!(i32::from_le_bytes(trailer[..4].try_into().unwrap()), 1000);
        assert_eq!(&trailer[4..], &END_SIGNATURE);

        let (index, _) = decode_header(&volume[1007..]).unwrap();
        let entry = &index.entries[0];
        let start = 1000 + entry.offset as usize;
        assert_eq!(&volume[start..start + 3], b"abc");
    }

    #[test]
    fn test_non_exe_records_resolved_names() {
        let dir = project(&[("AudioCache/x.ogg", b"ogg".to_vec()), ("y.txt", b"y".to_vec())]);
        let writer = memory_writer(dir.path(), BuildOptions::new("out.dat"));
        let planned = writer.plan(&["AudioCache/x.ogg", "y.txt"]).unwrap();
        let names: Vec<&str> = planned.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["AudioCache/x.ogg", "y.txt"]);

        let writer = memory_writer(dir.path(), BuildOptions::new("out").with_exe_bundle(true));
        let planned = writer.plan(&["AudioCache/x.ogg", "y.txt"]).unwrap();
        assert_eq!(planned.entries[0].name, "x.ogg");
    }

    #[test]
    fn test_name_length_boundary() {
        let ok_name = format!("{}.x", "a".repeat(97));
        let long_name = format!("{}.x", "a".repeat(98));
        assert_eq!(ok_name.len(), 99);
        let dir = project(&[(ok_name.as_str(), b"1".to_vec()), (long_name.as_str(), b"2".to_vec())]);

        let mut writer = ClibWriter::new(
            BuildOptions::new("out")
                .with_exe_bundle(true)
                .with_working_dir(dir.path()),
        );
        assert!(writer.plan(&[ok_name.as_str()]).is_ok());

        let err = writer.build(&[ok_name.as_str(), long_name.as_str()]).unwrap_err();
        assert!(matches!(err, Error::FileNameTooLong { length: 100, .. }));
        assert!(!dir.path().join(COMPILED_DIR).exists());
    }

    #[test]
    fn test_too_many_files() {
        let dir = tempdir().unwrap();
        let files: Vec<String> = (0..=MAX_FILES).map(|i| format!("f{i}")).collect();
        let writer = memory_writer(dir.path(), BuildOptions::new("out"));
        assert!(matches!(
            writer.plan(&files),
            Err(Error::TooManyFiles { count: 10001, .. })
        ));
    }

    #[test]
    fn test_missing_source_cleans_up() {
        let dir = project(&[("a.txt", b"aaaa".to_vec()), ("missing.dat", b"soon gone".to_vec())]);
        let mut writer = ClibWriter::new(BuildOptions::new("out.dat").with_working_dir(dir.path()));
        let planned = writer.plan(&["a.txt", "missing.dat"]).unwrap();
        fs::remove_file(dir.path().join("missing.dat")).unwrap();

        let err = writer.write(planned).unwrap_err();
        assert!(matches!(err, Error::SourceNotFound { ref name, .. } if name == "missing.dat"));
        assert!(err.to_string().contains("Do not remove files during the compilation process"));
        assert!(!dir.path().join("out.dat").exists());
    }

    #[test]
    fn test_missing_source_rejected_before_output() {
        let dir = project(&[("a.txt", b"a".to_vec())]);
        let mut writer = ClibWriter::new(BuildOptions::new("out.dat").with_working_dir(dir.path()));
        let err = writer.build(&["a.txt", "nope.bin"]).unwrap_err();
        assert_eq!(err.category(), crate::error::ErrorCategory::SourceNotFound);
        assert!(!dir.path().join("out.dat").exists());
    }

    #[test]
    fn test_failed_append_restores_executable() {
        let dir = project(&[("a.txt", b"aaaa".to_vec()), ("b.txt", b"bbbb".to_vec())]);
        let exe_path = dir.path().join("Compiled/game.exe");
        fs::create_dir_all(exe_path.parent().unwrap()).unwrap();
        fs::write(&exe_path, b"MZ-engine").unwrap();

        let mut writer = ClibWriter::new(
            BuildOptions::new("game")
                .with_exe_bundle(true)
                .with_working_dir(dir.path()),
        );
        let planned = writer.plan(&["a.txt", "b.txt"]).unwrap();
        fs::remove_file(dir.path().join("b.txt")).unwrap();

        assert!(writer.write(planned).is_err());
        assert_eq!(fs::read(&exe_path).unwrap(), b"MZ-engine");
    }

    #[test]
    fn test_failed_rebuild_keeps_previous_library() {
        let dir = project(&[("a.txt", b"aaaa".to_vec()), ("b.txt", b"bbbb".to_vec())]);
        let exe_path = dir.path().join("Compiled/game.exe");
        let mut writer = ClibWriter::new(
            BuildOptions::new("game")
                .with_exe_bundle(true)
                .with_working_dir(dir.path())
                .with_seed(11),
        );

        writer.build(&["a.txt"]).unwrap();
        let first = fs::read(&exe_path).unwrap();

        let planned = writer.plan(&["a.txt", "b.txt"]).unwrap();
        fs::remove_file(dir.path().join("b.txt")).unwrap();
        assert!(matches!(writer.write(planned), Err(Error::SourceNotFound { .. })));

        assert_eq!(fs::read(&exe_path).unwrap(), first);
    }

    /// Volume that runs out of space after `room` bytes.
    struct CappedVolume {
        inner: Cursor<Vec<u8>>,
        room: usize,
    }

    impl Write for CappedVolume {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if buf.len() > self.room {
                return Err(io::Error::new(io::ErrorKind::StorageFull, "no space left on device"));
            }
            self.room -= buf.len();
            self.inner.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Seek for CappedVolume {
        fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
            self.inner.seek(pos)
        }
    }

    struct CappedStore {
        inner: MemoryVolumeStore,
        room: usize,
        discarded: Vec<u8>,
    }

    impl VolumeStore for CappedStore {
        type Volume = CappedVolume;

        fn begin(&mut self) {
            self.inner.begin();
        }

        fn open(&mut self, index: u8, path: &Path, mode: VolumeOpenMode) -> io::Result<Self::Volume> {
            Ok(CappedVolume {
                inner: self.inner.open(index, path, mode)?,
                room: self.room,
            })
        }

        fn finish(&mut self, index: u8, volume: Self::Volume) -> io::Result<()> {
            self.inner.finish(index, volume.inner)
        }

        fn discard(&mut self, index: u8, path: &Path) -> io::Result<()> {
            self.discarded.push(index);
            self.inner.discard(index, path)
        }
    }

    #[test]
    fn test_disk_full_discards_every_volume() {
        let dir = project(&[
            ("game28.dta", vec![1u8; 500]),
            ("acsprset.spr", vec![2u8; 10000]),
            ("music.vox", vec![3u8; 300]),
        ]);
        let store = CappedStore {
            inner: MemoryVolumeStore::new(),
            room: 5000,
            discarded: Vec::new(),
        };
        let options = BuildOptions::new("game")
            .with_exe_bundle(true)
            .with_split_threshold(20000)
            .with_working_dir(dir.path());
        let mut writer = ClibWriter::with_store(options, store);

        match writer.build(&["game28.dta", "acsprset.spr", "music.vox"]) {
            Err(Error::WriteFailed { name, source }) => {
                assert_eq!(name, "acsprset.spr");
                assert!(is_disk_full(&source));
            }
            other => panic!("expected WriteFailed, got {other:?}"),
        }

        let store = writer.into_store();
        assert_eq!(store.discarded, vec![1, 0]);
        assert!(store.inner.is_empty());
    }

    #[test]
    fn test_fixed_seed_is_reproducible() {
        let dir = project(&[("a.txt", b"abc".to_vec())]);
        let build = || {
            let mut writer = memory_writer(dir.path(), BuildOptions::new("x").with_seed(42));
            writer.build(&["a.txt"]).unwrap();
            writer.into_store().volume(0).unwrap().to_vec()
        };
        assert_eq!(build(), build());
    }

    #[test]
    fn test_mismatched_volume_set_rejected() {
        let dir = tempdir().unwrap();
        let mut writer = memory_writer(dir.path(), BuildOptions::new("x"));
        let err = writer.write(VolumeSet::new()).unwrap_err();
        assert!(matches!(err, Error::InvalidFormat(_)));
    }
}
