//! Destinations for library volumes
//!
//! The writer never touches the filesystem directly; it asks a
//! [`VolumeStore`] for each volume. [`FsVolumeStore`] is the real thing,
//! [`MemoryVolumeStore`] keeps every volume in its own buffer.

use std::collections::{BTreeMap, HashMap};
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Cursor, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// How a volume is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeOpenMode {
    /// Open or create, writing after any existing content (primary volume)
    Append,
    /// Create or truncate (continuation volumes)
    CreateFresh,
    /// Reopen an existing volume for in-place overwrite (header back-patch)
    Rewrite,
}

/// Where the writer puts volumes.
pub trait VolumeStore {
    /// Handle to one open volume.
    type Volume: Write + Seek;

    /// Start a new build; [`VolumeStore::discard`] only undoes what follows.
    fn begin(&mut self);

    /// Open volume `index` stored at `path`.
    fn open(&mut self, index: u8, path: &Path, mode: VolumeOpenMode) -> io::Result<Self::Volume>;

    /// Flush and close a volume handle.
    fn finish(&mut self, index: u8, volume: Self::Volume) -> io::Result<()>;

    /// Undo what the current build wrote to a volume.
    ///
    /// Volumes the build created are deleted; a file the build appended to
    /// is cut back to its original length.
    fn discard(&mut self, index: u8, path: &Path) -> io::Result<()>;
}

/// Writes volumes to disk.
#[derive(Debug, Default, Clone)]
pub struct FsVolumeStore {
    /// Length of each file touched by the current build before it started;
    /// `None` if the build created it
    touched: HashMap<PathBuf, Option<u64>>,
}

impl FsVolumeStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl VolumeStore for FsVolumeStore {
    type Volume = BufWriter<File>;

    fn begin(&mut self) {
        self.touched.clear();
    }

    fn open(&mut self, _index: u8, path: &Path, mode: VolumeOpenMode) -> io::Result<Self::Volume> {
        if mode != VolumeOpenMode::Rewrite {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let before = match mode {
                VolumeOpenMode::Append => std::fs::metadata(path).ok().map(|m| m.len()),
                _ => None,
            };
            self.touched.entry(path.to_path_buf()).or_insert(before);
        }

        let file = match mode {
            VolumeOpenMode::Append => OpenOptions::new().create(true).append(true).open(path)?,
            VolumeOpenMode::CreateFresh => OpenOptions::new()
                .create(true)
                .truncate(true)
                .write(true)
                .open(path)?,
            VolumeOpenMode::Rewrite => OpenOptions::new().write(true).open(path)?,
        };
        Ok(BufWriter::new(file))
    }

    fn finish(&mut self, _index: u8, volume: Self::Volume) -> io::Result<()> {
        let file = volume.into_inner().map_err(io::IntoInnerError::into_error)?;
        file.sync_all()
    }

    fn discard(&mut self, _index: u8, path: &Path) -> io::Result<()> {
        match self.touched.remove(path) {
            Some(Some(len)) => OpenOptions::new().write(true).open(path)?.set_len(len),
            Some(None) => match std::fs::remove_file(path) {
                Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
                _ => Ok(()),
            },
            None => Ok(()),
        }
    }
}

/// Keeps each volume in memory, keyed by volume index.
///
/// Volumes that share a file name on disk stay separate here.
#[derive(Debug, Default, Clone)]
pub struct MemoryVolumeStore {
    volumes: BTreeMap<u8, Vec<u8>>,
    originals: BTreeMap<u8, Vec<u8>>,
}

impl MemoryVolumeStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate a volume, e.g. with an executable to append to.
    #[must_use]
    pub fn with_existing(mut self, index: u8, bytes: Vec<u8>) -> Self {
        self.originals.insert(index, bytes.clone());
        self.volumes.insert(index, bytes);
        self
    }

    /// Contents of a finished volume.
    #[must_use]
    pub fn volume(&self, index: u8) -> Option<&[u8]> {
        self.volumes.get(&index).map(Vec::as_slice)
    }

    /// Number of volumes held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.volumes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.volumes.is_empty()
    }
}

impl VolumeStore for MemoryVolumeStore {
    type Volume = Cursor<Vec<u8>>;

    fn begin(&mut self) {
        self.originals = self.volumes.clone();
    }

    fn open(&mut self, index: u8, _path: &Path, mode: VolumeOpenMode) -> io::Result<Self::Volume> {
        match mode {
            VolumeOpenMode::Append => {
                let mut cursor = Cursor::new(self.volumes.remove(&index).unwrap_or_default());
                cursor.seek(SeekFrom::End(0))?;
                Ok(cursor)
            }
            VolumeOpenMode::CreateFresh => {
                self.volumes.remove(&index);
                Ok(Cursor::new(Vec::new()))
            }
            VolumeOpenMode::Rewrite => self
                .volumes
                .remove(&index)
                .map(Cursor::new)
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("volume {index} was never written"))),
        }
    }

    fn finish(&mut self, index: u8, volume: Self::Volume) -> io::Result<()> {
        self.volumes.insert(index, volume.into_inner());
        Ok(())
    }

    fn discard(&mut self, index: u8, _path: &Path) -> io::Result<()> {
        match self.originals.get(&index).cloned() {
            Some(bytes) => {
                self.volumes.insert(index, bytes);
            }
            None => {
                self.volumes.remove(&index);
            }
        }
        Ok(())
    }
}
