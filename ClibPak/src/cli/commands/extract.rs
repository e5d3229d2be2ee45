//! CLI command for library extraction

use std::path::Path;
use std::time::Instant;

use super::matches_entry;
use crate::cli::progress::{LOOKING_GLASS, PACKAGE, print_done, print_step, simple_bar};
use crate::pak::PakOperations;
use crate::pak::clib::PakPhase;

pub fn execute(
    source: &Path,
    destination: &Path,
    file: Option<&str>,
    filter: Option<&str>,
    progress: bool,
) -> anyhow::Result<()> {
    // Single file extraction
    if let Some(name) = file {
        println!("Extracting single file: {name}");
        PakOperations::extract_files(source, destination, &[name])?;
        println!("Extraction complete");
        return Ok(());
    }

    let started = Instant::now();
    if progress {
        print_step(1, 2, LOOKING_GLASS, "Reading library header...");
    }

    let names: Option<Vec<String>> = match filter {
        Some(pattern) => {
            let matching: Vec<String> = PakOperations::list(source)?
                .into_iter()
                .map(|e| e.name)
                .filter(|name| matches_entry(pattern, name))
                .collect();
            if matching.is_empty() {
                println!("No files match pattern: {pattern}");
                return Ok(());
            }
            println!("Found {} matching files", matching.len());
            Some(matching)
        }
        None => None,
    };

    if !progress {
        match &names {
            Some(names) => PakOperations::extract_files(source, destination, names)?,
            None => PakOperations::extract(source, destination)?,
        }
        return Ok(());
    }

    print_step(2, 2, PACKAGE, "Extracting files...");
    let pb = simple_bar(0, "Extracting");
    let callback = |p: &crate::pak::clib::PakProgress| {
        if p.phase == PakPhase::Extracting {
            pb.set_length(p.total as u64);
            pb.set_position(p.current as u64);
            if let Some(name) = &p.current_file {
                pb.set_message(name.clone());
            }
        }
    };
    match &names {
        Some(names) => PakOperations::extract_files_with_progress(source, destination, names, &callback)?,
        None => PakOperations::extract_with_progress(source, destination, &callback)?,
    }
    pb.finish_with_message("done");
    print_done(started.elapsed());
    Ok(())
}
