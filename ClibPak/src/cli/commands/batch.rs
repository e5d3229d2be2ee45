//! CLI commands for working on directories of libraries

use std::path::Path;
use std::time::Instant;

use crate::cli::progress::{LOOKING_GLASS, TRUCK, hidden_bar, print_done, print_step, simple_bar};
use crate::pak::{batch_extract, find_library_files};

pub fn find(dir: &Path) -> anyhow::Result<()> {
    let libraries = find_library_files(dir);
    for library in &libraries {
        println!("{}", library.display());
    }
    println!("{} libraries found", libraries.len());
    Ok(())
}

pub fn extract_all(source: &Path, destination: &Path, progress: bool) -> anyhow::Result<()> {
    let started = Instant::now();
    if progress {
        print_step(1, 2, LOOKING_GLASS, "Searching for libraries...");
    }
    let libraries = find_library_files(source);
    if libraries.is_empty() {
        println!("No libraries found in {}", source.display());
        return Ok(());
    }

    if progress {
        print_step(2, 2, TRUCK, &format!("Extracting {} libraries...", libraries.len()));
    }
    let pb = if progress {
        simple_bar(libraries.len() as u64, "Extracting")
    } else {
        hidden_bar()
    };
    let result = batch_extract(&libraries, source, destination, |p| {
        pb.set_position(p.current as u64);
        if let Some(name) = &p.current_file {
            pb.set_message(name.clone());
        }
    });
    pb.finish_and_clear();

    for line in &result.results {
        println!("{line}");
    }
    println!(
        "{} succeeded, {} failed",
        result.success_count, result.fail_count
    );
    if progress {
        print_done(started.elapsed());
    }

    if result.fail_count > 0 {
        anyhow::bail!("{} libraries failed to extract", result.fail_count);
    }
    Ok(())
}
