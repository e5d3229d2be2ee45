//! CLIB library reader
//!
//! Opens a library the way the engine does: either the file starts with
//! the volume signature, or the library was appended to another file and
//! the trailer at the very end points back at it.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt};

use super::{
    BEGIN_SIGNATURE, END_SIGNATURE, LIB_VERSION, LibraryEntry, LibraryIndex, SIGNATURE_SIZE,
    TRAILER_SIZE, decode_header,
};
use crate::error::{Error, Result};

/// Reads entries from a CLIB library and its continuation volumes.
pub struct ClibReader<R: Read + Seek> {
    reader: BufReader<R>,
    /// Path of the primary volume, used to find continuation volumes
    path: Option<PathBuf>,
    segment_start: u64,
    index: LibraryIndex,
    seed: i32,
    volume_readers: HashMap<u8, BufReader<File>>,
}

impl ClibReader<File> {
    /// Open the primary volume at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSignature`], [`Error::UnsupportedVersion`] or
    /// [`Error::NotPrimaryVolume`] for files that are not a readable primary
    /// volume, or an IO error.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        Self::with_path(File::open(path)?, path)
    }
}

impl<R: Read + Seek> ClibReader<R> {
    /// Read a library from `reader`.
    ///
    /// Continuation volumes cannot be located without a path.
    ///
    /// # Errors
    ///
    /// See [`ClibReader::open`].
    pub fn new(reader: R) -> Result<Self> {
        Self::load(reader, None)
    }

    /// Read a library whose primary volume lives at `path`.
    ///
    /// # Errors
    ///
    /// See [`ClibReader::open`].
    pub fn with_path(reader: R, path: impl AsRef<Path>) -> Result<Self> {
        Self::load(reader, Some(path.as_ref().to_path_buf()))
    }

    fn load(reader: R, path: Option<PathBuf>) -> Result<Self> {
        let mut reader = BufReader::new(reader);
        let segment_start = find_segment_start(&mut reader)?;

        reader.seek(SeekFrom::Start(segment_start))?;
        let mut signature = [0u8; 7];
        reader.read_exact(&mut signature).map_err(eof)?;
        if signature[..5] != BEGIN_SIGNATURE {
            return Err(Error::InvalidSignature);
        }
        if signature[5] != LIB_VERSION {
            return Err(Error::UnsupportedVersion {
                version: signature[5],
                supported: LIB_VERSION,
            });
        }
        if signature[6] != 0 {
            return Err(Error::NotPrimaryVolume { index: signature[6] });
        }

        let (index, seed) = decode_header(&mut reader)?;
        tracing::debug!(
            "Read library header: {} entries, {} volume(s), segment start {}",
            index.entries.len(),
            index.volume_names.len(),
            segment_start
        );

        Ok(Self {
            reader,
            path,
            segment_start,
            index,
            seed,
            volume_readers: HashMap::new(),
        })
    }

    /// The decoded table of contents
    #[must_use]
    pub fn index(&self) -> &LibraryIndex {
        &self.index
    }

    /// Entries in table order
    #[must_use]
    pub fn entries(&self) -> &[LibraryEntry] {
        &self.index.entries
    }

    /// Seed the header was obfuscated with
    #[must_use]
    pub fn seed(&self) -> i32 {
        self.seed
    }

    /// Where the library starts inside the primary file
    #[must_use]
    pub fn segment_start(&self) -> u64 {
        self.segment_start
    }

    /// Whether the library was appended to another file (e.g. an executable)
    #[must_use]
    pub fn is_appended(&self) -> bool {
        self.segment_start > 0
    }

    /// Expected path of continuation volume `volume`.
    ///
    /// Continuation volumes sit next to the primary one.
    #[must_use]
    pub fn volume_path(&self, volume: u8) -> Option<PathBuf> {
        let name = self.index.volume_names.get(usize::from(volume))?;
        let dir = self
            .path
            .as_deref()
            .and_then(Path::parent)
            .unwrap_or_else(|| Path::new(""));
        Some(dir.join(name))
    }

    /// Read an entry by name (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns [`Error::EntryNotFound`] if no entry has this name, or the
    /// errors of [`ClibReader::read_entry_at`].
    pub fn read_entry(&mut self, name: &str) -> Result<Vec<u8>> {
        let (i, _) = self
            .index
            .find(name)
            .ok_or_else(|| Error::EntryNotFound(name.to_string()))?;
        self.read_entry_at(i)
    }

    /// Read the entry at table position `i`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::VolumeMissing`] if its volume cannot be found, or
    /// [`Error::UnexpectedEof`] if the volume is shorter than the table says.
    pub fn read_entry_at(&mut self, i: usize) -> Result<Vec<u8>> {
        let length = self
            .index
            .entries
            .get(i)
            .map(|e| e.length as usize)
            .ok_or_else(|| Error::EntryNotFound(format!("#{i}")))?;
        let mut data = Vec::with_capacity(length);
        self.copy_entry_to(i, &mut data)?;
        Ok(data)
    }

    /// Stream the entry at table position `i` into `dest`.
    ///
    /// # Errors
    ///
    /// See [`ClibReader::read_entry_at`].
    pub fn copy_entry_to<W: Write>(&mut self, i: usize, dest: &mut W) -> Result<u64> {
        let entry = self
            .index
            .entries
            .get(i)
            .cloned()
            .ok_or_else(|| Error::EntryNotFound(format!("#{i}")))?;
        let length = u64::from(entry.length);

        let copied = if entry.volume == 0 {
            self.reader
                .seek(SeekFrom::Start(self.segment_start + u64::from(entry.offset)))?;
            io::copy(&mut (&mut self.reader).take(length), dest)?
        } else {
            let volume = self.volume_reader(entry.volume)?;
            volume.seek(SeekFrom::Start(u64::from(entry.offset)))?;
            io::copy(&mut volume.take(length), dest)?
        };

        if copied != length {
            return Err(Error::UnexpectedEof);
        }
        Ok(copied)
    }

    fn volume_reader(&mut self, volume: u8) -> Result<&mut BufReader<File>> {
        if !self.volume_readers.contains_key(&volume) {
            let path = self.volume_path(volume).ok_or_else(|| {
                Error::InvalidFormat(format!("no data file name for volume {volume}"))
            })?;
            let file = File::open(&path).map_err(|_| Error::VolumeMissing { path: path.clone() })?;
            let mut reader = BufReader::new(file);

            let mut signature = [0u8; SIGNATURE_SIZE as usize];
            reader.read_exact(&mut signature).map_err(eof)?;
            if signature[..5] != BEGIN_SIGNATURE {
                return Err(Error::InvalidSignature);
            }
            if signature[6] != volume {
                tracing::warn!(
                    "{} claims to be volume {}, expected {}",
                    path.display(),
                    signature[6],
                    volume
                );
            }
            self.volume_readers.insert(volume, reader);
        }

        self.volume_readers
            .get_mut(&volume)
            .ok_or_else(|| Error::InvalidFormat(format!("volume {volume} not open")))
    }
}

/// Locate the start of the library: 0 for a standalone volume, or the
/// offset stored in the trailer of an appended one.
fn find_segment_start<R: Read + Seek>(reader: &mut R) -> Result<u64> {
    let mut magic = [0u8; 5];
    let len = reader.seek(SeekFrom::End(0))?;
    reader.seek(SeekFrom::Start(0))?;
    if len >= magic.len() as u64 {
        reader.read_exact(&mut magic)?;
        if magic == BEGIN_SIGNATURE {
            return Ok(0);
        }
    }

    if len < TRAILER_SIZE {
        return Err(Error::InvalidSignature);
    }
    reader.seek(SeekFrom::End(-(TRAILER_SIZE as i64)))?;
    let start = reader.read_i32::<LittleEndian>()?;
    let mut end = [0u8; END_SIGNATURE.len()];
    reader.read_exact(&mut end)?;
    if end != END_SIGNATURE {
        return Err(Error::InvalidSignature);
    }

    u64::try_from(start)
        .ok()
        .filter(|s| s + SIGNATURE_SIZE <= len)
        .ok_or(Error::InvalidSignature)
}

fn eof(err: io::Error) -> Error {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        Error::UnexpectedEof
    } else {
        Error::Io(err)
    }
}
