//! CLIB data file format reader/writer
//!
//! Library format 21: every volume starts with a 7-byte signature; the
//! first volume additionally carries an obfuscated table of contents.
//!
//! ```text
//! volume 0:  "CLIB" 0x1A | 21 | 0 | seed | header (obfuscated) | payloads [| trailer]
//! volume N:  "CLIB" 0x1A | 21 | N | payloads
//! trailer:   segment start (i32) | "CLIB\x01\x02\x03\x04SIGE"
//! ```

mod copier;
mod header;
mod planner;
mod rand;
mod reader;
mod resolver;
mod store;
mod types;
mod writer;

pub use copier::{copy_payload, is_disk_full};
pub use header::{decode_header, encode_header, encoded_header_len};
pub use planner::VolumePlanner;
pub use rand::{PseudoRand, RAND_SEED_SALT};
pub use reader::ClibReader;
pub use resolver::{ResolvedSource, resolve_source};
pub use store::{FsVolumeStore, MemoryVolumeStore, VolumeOpenMode, VolumeStore};
pub use types::*;
pub use writer::{BuildOptions, BuildReport, ClibWriter};

/// Signature at the start of every volume.
pub const BEGIN_SIGNATURE: [u8; 5] = *b"CLIB\x1a";

/// Signature closing a library appended to another file.
pub const END_SIGNATURE: [u8; 12] = *b"CLIB\x01\x02\x03\x04SIGE";

/// Library format revision written and read by this crate.
pub const LIB_VERSION: u8 = 21;

/// Size of the per-volume signature (magic, version, volume index).
pub const SIGNATURE_SIZE: u64 = BEGIN_SIGNATURE.len() as u64 + 2;

/// Size of the trailer written after an appended library.
pub const TRAILER_SIZE: u64 = 4 + END_SIGNATURE.len() as u64;

/// Hard cap on the number of volumes in one library.
pub const MAX_VOLUMES: usize = 25;

/// Maximum number of entries the engine reads from one table.
pub const MAX_FILES: usize = 10000;

/// Entry names must be strictly shorter than this (bytes).
pub const MAX_FILENAME_LENGTH: usize = 100;

/// Volume names must be strictly shorter than this (bytes).
pub const MAX_DATAFILENAME_LENGTH: usize = 50;

/// Copy buffer size for payload streaming.
pub const CHUNK_SIZE: usize = 256_000;

/// The sprite set; its appearance starts volume splitting.
pub const SPRITE_SET_NAME: &str = "acsprset.spr";

/// Search folders tried after the working directory, in order.
pub const SEARCH_FOLDERS: [&str; 2] = ["AudioCache", "Speech"];

/// Output folder used in EXE-bundling mode.
pub const COMPILED_DIR: &str = "Compiled";
