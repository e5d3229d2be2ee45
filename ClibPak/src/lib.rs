//! # `ClibPak`
//!
//! A pure-Rust library for building and reading CLIB game data files
//! (library format 21), the packed asset container read by the adventure
//! game engine runtime.
//!
//! ## Features
//!
//! - **Builder** - Packs an ordered file list into one library with an
//!   obfuscated table of contents
//! - **Multi-volume splitting** - Starts new volumes from the sprite set on
//!   once a size threshold is exceeded
//! - **EXE bundling** - Appends the primary volume to the engine executable
//! - **Reader** - Lists and extracts standalone and appended libraries
//!
//! ## Quick Start
//!
//! ```no_run
//! use clibpak::pak::{BuildOptions, PakOperations};
//!
//! // Build Compiled/game.exe (+ game.001, ...) from a game directory
//! let options = BuildOptions::new("game")
//!     .with_exe_bundle(true)
//!     .with_split_threshold(50_000_000)
//!     .with_working_dir("MyGame");
//! let report = PakOperations::build(&["game28.dta", "acsprset.spr", "music.vox"], &options)?;
//! println!("Wrote {} volume(s)", report.volume_count());
//!
//! // List and read it back
//! let entries = PakOperations::list(&report.volume_paths[0])?;
//! let data = PakOperations::read_file_bytes(&report.volume_paths[0], "music.vox")?;
//! # Ok::<(), clibpak::Error>(())
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` - Enables the `clibpak` command-line binary

pub mod config;
pub mod error;
pub mod pak;
pub mod utils;

// Re-exports for convenience
pub use error::{Error, ErrorCategory, Result};

/// Prelude module for common imports
pub mod prelude {
    pub use crate::config::BuildManifest;
    pub use crate::error::{Error, ErrorCategory, Result};

    // Library operations
    pub use crate::pak::{
        BatchPakResult, BuildOptions, BuildReport, ClibReader, ClibWriter, LibraryEntry,
        LibraryIndex, LibraryInfo, PakOperations, PakPhase, PakProgress, batch_extract,
        collect_input_files, find_library_files,
    };
}

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// CLI module (feature-gated)
#[cfg(feature = "cli")]
pub mod cli;
