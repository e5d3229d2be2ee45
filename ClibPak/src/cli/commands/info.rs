//! CLI command for library header information

use std::path::Path;

use crate::cli::progress::format_size;
use crate::pak::PakOperations;
use crate::pak::clib::LIB_VERSION;

pub fn execute(source: &Path) -> anyhow::Result<()> {
    let info = PakOperations::info(source)?;

    println!("File:        {}", info.path.display());
    println!("Version:     {LIB_VERSION}");
    if info.segment_start > 0 {
        println!("Appended at: {} bytes", info.segment_start);
    }
    println!("Seed:        {}", info.seed);
    println!("Entries:     {}", info.entry_count);
    println!("Payload:     {}", format_size(info.total_size));
    println!("Volumes:     {}", info.volume_names.len());
    for (i, name) in info.volume_names.iter().enumerate() {
        println!("  [{i}] {name}");
    }
    Ok(())
}
