//! Build manifest types for clibpak.toml

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::pak::batch::collect_input_files;
use crate::pak::clib::BuildOptions;

/// Bytes per megabyte in split sizes
pub const BYTES_PER_MB: u64 = 1_000_000;

fn default_working_dir() -> PathBuf {
    PathBuf::from(".")
}

/// The full build manifest (clibpak.toml)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildManifest {
    pub archive: ArchiveSettings,
    #[serde(default)]
    pub files: FileSettings,
}

/// Output settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArchiveSettings {
    /// Base output name
    pub output: String,
    #[serde(default)]
    pub exe_bundle: bool,
    /// Split size in megabytes; 0 disables splitting
    #[serde(default)]
    pub split_mb: u64,
    /// Exact split size in bytes, instead of `split_mb`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub split_bytes: Option<u64>,
    /// Relative to the manifest's directory
    #[serde(default = "default_working_dir")]
    pub working_dir: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<i32>,
}

/// Input files, in packing order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileSettings {
    #[serde(default)]
    pub include: Vec<String>,
    /// Folders whose files are appended after `include`
    #[serde(default)]
    pub directories: Vec<String>,
}

impl BuildManifest {
    /// Conventional manifest file name
    pub const FILE_NAME: &'static str = "clibpak.toml";

    /// Parse a manifest from TOML text
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidManifest`] for malformed TOML, unknown keys or
    /// an empty output name.
    pub fn from_toml(text: &str) -> Result<Self> {
        let manifest: Self = toml::from_str(text)?;
        if manifest.archive.output.trim().is_empty() {
            return Err(Error::InvalidManifest("archive.output is empty".to_string()));
        }
        Ok(manifest)
    }

    /// Read and parse a manifest file
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read, or the errors of
    /// [`BuildManifest::from_toml`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_toml(&std::fs::read_to_string(path)?)
    }

    /// Serialize back to TOML
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidManifest`] if serialization fails.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::InvalidManifest(e.to_string()))
    }

    /// Split threshold in bytes
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidManifest`] if both `split_mb` and `split_bytes`
    /// are set, or the size overflows.
    pub fn split_threshold(&self) -> Result<u64> {
        match (self.archive.split_mb, self.archive.split_bytes) {
            (0, Some(bytes)) => Ok(bytes),
            (mb, None) => mb.checked_mul(BYTES_PER_MB).ok_or_else(|| {
                Error::InvalidManifest(format!("split_mb is too large: {mb}"))
            }),
            (_, Some(_)) => Err(Error::InvalidManifest(
                "set either split_mb or split_bytes, not both".to_string(),
            )),
        }
    }

    /// Build options, with `working_dir` resolved against `manifest_dir`
    ///
    /// # Errors
    ///
    /// See [`BuildManifest::split_threshold`].
    pub fn build_options(&self, manifest_dir: &Path) -> Result<BuildOptions> {
        let mut options = BuildOptions::new(&self.archive.output)
            .with_exe_bundle(self.archive.exe_bundle)
            .with_split_threshold(self.split_threshold()?)
            .with_working_dir(manifest_dir.join(&self.archive.working_dir));
        options.seed = self.archive.seed;
        Ok(options)
    }

    /// Input files relative to `working_dir`: `include` first, then the
    /// contents of each directory
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidManifest`] if no files are listed, or
    /// [`Error::WalkDirError`] if a directory cannot be read.
    pub fn input_files(&self, working_dir: &Path) -> Result<Vec<PathBuf>> {
        let mut files: Vec<PathBuf> = self.files.include.iter().map(PathBuf::from).collect();
        for dir in &self.files.directories {
            files.extend(collect_input_files(working_dir, Path::new(dir))?);
        }

        if files.is_empty() {
            return Err(Error::InvalidManifest("no input files listed".to_string()));
        }
        Ok(files)
    }
}
