//! CLI command for listing library contents

use std::path::Path;

use super::matches_entry;
use crate::cli::progress::format_size;
use crate::pak::PakOperations;

pub fn execute(
    source: &Path,
    detailed: bool,
    filter: Option<&str>,
    count: bool,
) -> anyhow::Result<()> {
    let entries = PakOperations::list(source)?;

    let filtered: Vec<_> = match filter {
        Some(pattern) => entries
            .iter()
            .filter(|e| matches_entry(pattern, &e.name))
            .collect(),
        None => entries.iter().collect(),
    };

    if count {
        println!("{}", filtered.len());
        return Ok(());
    }

    if !detailed {
        for entry in &filtered {
            println!("{}", entry.name);
        }
        return Ok(());
    }

    println!("{:>10}  {:>3}  {:>10}  NAME", "SIZE", "VOL", "OFFSET");
    for entry in &filtered {
        println!(
            "{:>10}  {:>3}  {:>10}  {}",
            format_size(u64::from(entry.length)),
            entry.volume,
            entry.offset,
            entry.name
        );
    }

    let total: u64 = filtered.iter().map(|e| u64::from(e.length)).sum();
    println!();
    println!("{} files, {} total", filtered.len(), format_size(total));
    Ok(())
}
