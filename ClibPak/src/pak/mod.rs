//! CLIB library operations module

pub mod batch;
pub mod clib;
mod operations;

// Primary public API
pub use operations::{LibraryInfo, PakOperations};

// Re-export public library types
pub use clib::{
    BuildOptions, BuildReport, ClibReader, ClibWriter, LibraryEntry, LibraryIndex, PakPhase,
    PakProgress, ProgressCallback,
};

// Re-export batch operations
pub use batch::{
    BatchPakResult, batch_extract, collect_input_files, find_library_files, is_library_file,
};
