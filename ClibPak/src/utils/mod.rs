//! Utility functions

pub mod path;

pub use path::{entry_output_path, normalize_path, relative_path};
