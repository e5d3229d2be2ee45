//! CLI command for building libraries

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;

use crate::cli::progress::{DISK, LOOKING_GLASS, format_size, hidden_bar, print_done, print_step, simple_bar};
use crate::config::{BYTES_PER_MB, BuildManifest};
use crate::pak::clib::{BuildOptions, ClibWriter, PakPhase, PakProgress};

/// Split threshold in bytes from the `--split-mb` / `--split-bytes` flags
pub fn split_threshold(split_mb: Option<u64>, split_bytes: Option<u64>) -> anyhow::Result<u64> {
    match (split_mb, split_bytes) {
        (Some(mb), _) => mb
            .checked_mul(BYTES_PER_MB)
            .with_context(|| format!("split size too large: {mb} MB")),
        (None, Some(bytes)) => Ok(bytes),
        (None, None) => Ok(0),
    }
}

pub fn execute(
    files: &[PathBuf],
    output: Option<&Path>,
    exe: bool,
    split_threshold: u64,
    dir: &Path,
    seed: Option<i32>,
    progress: bool,
) -> anyhow::Result<()> {
    let output = output.context("--output is required")?;
    if files.is_empty() {
        anyhow::bail!("no input files given");
    }

    let mut options = BuildOptions::new(output)
        .with_exe_bundle(exe)
        .with_split_threshold(split_threshold)
        .with_working_dir(dir);
    options.seed = seed;

    run(files, &options, progress)
}

pub fn execute_manifest(manifest_path: &Path, progress: bool) -> anyhow::Result<()> {
    let manifest = BuildManifest::load(manifest_path)
        .with_context(|| format!("reading {}", manifest_path.display()))?;
    let manifest_dir = manifest_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));

    let options = manifest.build_options(manifest_dir)?;
    let files = manifest.input_files(&options.working_dir)?;
    run(&files, &options, progress)
}

fn run(files: &[PathBuf], options: &BuildOptions, progress: bool) -> anyhow::Result<()> {
    let started = Instant::now();

    if progress {
        print_step(1, 2, LOOKING_GLASS, &format!("Planning {} files...", files.len()));
    }
    let pb = if progress { simple_bar(files.len() as u64, "Copying") } else { hidden_bar() };
    let on_progress = |p: &PakProgress| match p.phase {
        PakPhase::WritingVolume => {
            if let Some(name) = &p.current_file {
                pb.println(format!("{DISK}Writing {name}"));
            }
        }
        PakPhase::CopyingFiles => {
            pb.set_length(p.total as u64);
            pb.set_position(p.current as u64);
            if let Some(name) = &p.current_file {
                pb.set_message(name.clone());
            }
        }
        _ => {}
    };

    let mut writer = ClibWriter::new(options.clone());
    let planned = writer.plan_with_progress(files, &on_progress)?;

    // A standalone library is rebuilt from scratch rather than appended to
    let previous = if options.exe_bundle {
        None
    } else {
        set_aside(&options.working_dir.join(&options.base_name))?
    };

    let report = match writer.write_with_progress(planned, &on_progress) {
        Ok(report) => {
            if let Some((_, backup)) = &previous {
                std::fs::remove_file(backup)
                    .with_context(|| format!("removing {}", backup.display()))?;
            }
            report
        }
        Err(err) => {
            if let Some((original, backup)) = &previous {
                std::fs::rename(backup, original)
                    .with_context(|| format!("restoring {}", original.display()))?;
            }
            return Err(err.into());
        }
    };
    pb.finish_and_clear();

    if progress {
        print_step(2, 2, DISK, &format!("Wrote {} volume(s):", report.volume_count()));
        for (i, path) in report.volume_paths.iter().enumerate() {
            let volume = u8::try_from(i).unwrap_or(u8::MAX);
            println!(
                "    {}  {} files, {}",
                path.display(),
                report.volume_set.entries_in(volume).count(),
                format_size(report.volume_set.payload_size(volume))
            );
        }
        print_done(started.elapsed());
    }

    Ok(())
}

/// Move an existing output to `<name>.bak`, returning both paths.
fn set_aside(existing: &Path) -> anyhow::Result<Option<(PathBuf, PathBuf)>> {
    if !existing.is_file() {
        return Ok(None);
    }
    let mut backup = existing.as_os_str().to_owned();
    backup.push(".bak");
    let backup = PathBuf::from(backup);

    tracing::info!("Replacing {}", existing.display());
    std::fs::rename(existing, &backup)
        .with_context(|| format!("moving old {} aside", existing.display()))?;
    Ok(Some((existing.to_path_buf(), backup)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_threshold_flags() {
        assert_eq!(split_threshold(None, None).unwrap(), 0);
        assert_eq!(split_threshold(Some(50), None).unwrap(), 50_000_000);
        assert_eq!(split_threshold(None, Some(20000)).unwrap(), 20000);
        assert!(split_threshold(Some(u64::MAX), None).is_err());
    }

    #[test]
    fn test_rejected_build_keeps_previous_output() {
        let dir = tempfile::tempdir().unwrap();
        let long_name = format!("{}.dat", "n".repeat(96));
        std::fs::write(dir.path().join("out.dat"), b"previous library").unwrap();
        std::fs::write(dir.path().join("a.txt"), b"a").unwrap();
        std::fs::write(dir.path().join(&long_name), b"b").unwrap();

        let files = [PathBuf::from("a.txt"), PathBuf::from(&long_name)];
        let result = execute(&files, Some(Path::new("out.dat")), false, 0, dir.path(), None, false);

        assert!(result.is_err());
        assert_eq!(
            std::fs::read(dir.path().join("out.dat")).unwrap(),
            b"previous library"
        );
        assert!(!dir.path().join("out.dat.bak").exists());
    }

    #[test]
    fn test_rebuild_replaces_previous_output() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("out.dat"), b"previous library").unwrap();
        std::fs::write(dir.path().join("a.txt"), b"fresh").unwrap();

        let files = [PathBuf::from("a.txt")];
        execute(&files, Some(Path::new("out.dat")), false, 0, dir.path(), Some(1), false).unwrap();

        let rebuilt = std::fs::read(dir.path().join("out.dat")).unwrap();
        assert_eq!(&rebuilt[..5], b"CLIB\x1a");
        assert!(rebuilt.ends_with(b"fresh"));
        assert!(!dir.path().join("out.dat.bak").exists());
    }
}
