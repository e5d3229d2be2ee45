//! Types for CLIB data file handling

use std::path::{Path, PathBuf};

/// One packaged source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Name recorded in the library table
    pub name: String,
    /// Path the payload is read from at build time
    pub source: PathBuf,
    /// Volume holding the payload (0 = primary)
    pub volume: u8,
    /// Payload offset from the start of the volume segment; 0 until written
    pub offset: u32,
    /// Exact payload length captured at scan time
    pub length: u32,
}

/// The library being built: volume names plus the ordered entry table.
///
/// Constructed fresh for every build and never shared between builds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VolumeSet {
    /// One name per volume, as recorded in the header
    pub volume_names: Vec<String>,
    /// Entries in input order
    pub entries: Vec<ArchiveEntry>,
}

impl VolumeSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of volumes the entries are spread over.
    #[must_use]
    pub fn volume_count(&self) -> usize {
        self.entries
            .iter()
            .map(|e| usize::from(e.volume) + 1)
            .max()
            .unwrap_or(1)
    }

    /// Entries stored in `volume`, with their table index, in table order.
    pub fn entries_in(&self, volume: u8) -> impl Iterator<Item = (usize, &ArchiveEntry)> {
        self.entries
            .iter()
            .enumerate()
            .filter(move |(_, e)| e.volume == volume)
    }

    /// Total payload bytes stored in `volume`.
    #[must_use]
    pub fn payload_size(&self, volume: u8) -> u64 {
        self.entries_in(volume).map(|(_, e)| u64::from(e.length)).sum()
    }

    /// Header table view of this set.
    #[must_use]
    pub fn to_index(&self) -> LibraryIndex {
        LibraryIndex {
            volume_names: self.volume_names.clone(),
            entries: self
                .entries
                .iter()
                .map(|e| LibraryEntry {
                    name: e.name.clone(),
                    offset: e.offset,
                    length: e.length,
                    volume: e.volume,
                })
                .collect(),
        }
    }
}

/// Volume names for a library of `count` volumes.
///
/// EXE bundling names volume 0 `<base>.exe` and the rest `<base>.001`,
/// `<base>.002`, ... Otherwise every volume shares the base file name.
#[must_use]
pub fn volume_file_names(base_name: &Path, exe_bundle: bool, count: usize) -> Vec<String> {
    let file_name = base_name
        .file_name()
        .map_or_else(|| base_name.to_string_lossy(), |n| n.to_string_lossy())
        .into_owned();

    (0..count)
        .map(|i| {
            if !exe_bundle {
                file_name.clone()
            } else if i == 0 {
                format!("{file_name}.exe")
            } else {
                format!("{file_name}.{i:03}")
            }
        })
        .collect()
}

/// Entry of a decoded (or to-be-encoded) library table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryEntry {
    /// Recorded name
    pub name: String,
    /// Offset from the start of the volume segment
    pub offset: u32,
    /// Payload length
    pub length: u32,
    /// Volume index
    pub volume: u8,
}

/// The table of contents stored in the primary volume header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LibraryIndex {
    /// Volume names, index 0 is the primary volume
    pub volume_names: Vec<String>,
    /// Entries in table order
    pub entries: Vec<LibraryEntry>,
}

impl LibraryIndex {
    /// Find an entry by name, ignoring ASCII case like the engine does.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<(usize, &LibraryEntry)> {
        let wanted = name.replace('\\', "/");
        self.entries
            .iter()
            .enumerate()
            .find(|(_, e)| e.name.replace('\\', "/").eq_ignore_ascii_case(&wanted))
    }

    /// Sum of all entry lengths.
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.entries.iter().map(|e| u64::from(e.length)).sum()
    }
}

/// Progress information during library operations
#[derive(Debug, Clone)]
pub struct PakProgress {
    /// Current operation phase
    pub phase: PakPhase,
    /// Current item number (1-indexed)
    pub current: usize,
    /// Total number of items
    pub total: usize,
    /// Current file being processed (if applicable)
    pub current_file: Option<String>,
}

impl PakProgress {
    /// Create a new progress update
    #[must_use]
    pub fn new(phase: PakPhase, current: usize, total: usize) -> Self {
        Self {
            phase,
            current,
            total,
            current_file: None,
        }
    }

    /// Create a progress update with a file/item name
    #[must_use]
    pub fn with_file(
        phase: PakPhase,
        current: usize,
        total: usize,
        file: impl Into<String>,
    ) -> Self {
        Self {
            phase,
            current,
            total,
            current_file: Some(file.into()),
        }
    }

    /// Get the progress percentage (0.0 - 1.0)
    #[must_use]
    pub fn percentage(&self) -> f32 {
        if self.total == 0 {
            1.0
        } else {
            self.current as f32 / self.total as f32
        }
    }
}

/// Progress callback for library operations.
///
/// Receives a [`PakProgress`] with phase, current/total counts and optional file name.
pub type ProgressCallback<'a> = &'a (dyn Fn(&PakProgress) + Sync + Send);

/// Phase of a library operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PakPhase {
    /// Checking names and counts
    Validating,
    /// Measuring files and assigning volumes
    Planning,
    /// Locating sources in the search path
    Resolving,
    /// Opening a volume and writing its signature
    WritingVolume,
    /// Copying payloads
    CopyingFiles,
    /// Rewriting the primary header with final offsets
    Backpatching,
    /// Reading and decoding a library header
    ReadingHeader,
    /// Writing entries to disk
    Extracting,
    /// Operation complete
    Complete,
}

impl PakPhase {
    /// Get a human-readable description of this phase
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validating => "Validating",
            Self::Planning => "Planning volumes",
            Self::Resolving => "Resolving sources",
            Self::WritingVolume => "Writing volume",
            Self::CopyingFiles => "Copying files",
            Self::Backpatching => "Writing header",
            Self::ReadingHeader => "Reading header",
            Self::Extracting => "Extracting files",
            Self::Complete => "Complete",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exe_volume_names() {
        let names = volume_file_names(Path::new("game"), true, 3);
        assert_eq!(names, vec!["game.exe", "game.001", "game.002"]);
    }

    #[test]
    fn test_flat_volume_names_reuse_base() {
        let names = volume_file_names(Path::new("out/game.dat"), false, 2);
        assert_eq!(names, vec!["game.dat", "game.dat"]);
    }

    #[test]
    fn test_find_ignores_case_and_separators() {
        let index = LibraryIndex {
            volume_names: vec!["game.exe".into()],
            entries: vec![LibraryEntry {
                name: "AudioCache/Music1.ogg".into(),
                offset: 7,
                length: 3,
                volume: 0,
            }],
        };
        assert!(index.find("audiocache\\music1.OGG").is_some());
        assert!(index.find("music1.ogg").is_none());
    }

    #[test]
    fn test_volume_count_defaults_to_one() {
        assert_eq!(VolumeSet::new().volume_count(), 1);
    }
}
