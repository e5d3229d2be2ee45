use clap::Subcommand;
use std::path::PathBuf;

pub mod batch;
pub mod build;
pub mod extract;
pub mod info;
pub mod list;

#[derive(Subcommand)]
pub enum Commands {
    /// Build a CLIB library from a list of files
    Build {
        /// Files to pack, in order, relative to --dir
        #[arg(required_unless_present = "manifest")]
        files: Vec<PathBuf>,

        /// Output base name (`<base>.exe`, `<base>.001`, ... with --exe)
        #[arg(short, long, required_unless_present = "manifest")]
        output: Option<PathBuf>,

        /// Bundle with the engine executable in `Compiled/`
        #[arg(long)]
        exe: bool,

        /// Start a new volume after this many megabytes (from the sprite set on)
        #[arg(long, conflicts_with = "split_bytes")]
        split_mb: Option<u64>,

        /// Split threshold in bytes
        #[arg(long)]
        split_bytes: Option<u64>,

        /// Game directory: sources are looked up and outputs written here
        #[arg(short = 'C', long, default_value = ".")]
        dir: PathBuf,

        /// Fixed header seed (reproducible output)
        #[arg(long, allow_negative_numbers = true)]
        seed: Option<i32>,

        /// Read settings and file list from a clibpak.toml manifest
        #[arg(short, long, conflicts_with_all = ["files", "output", "exe", "split_mb", "split_bytes", "seed"])]
        manifest: Option<PathBuf>,

        /// Suppress progress output
        #[arg(short, long)]
        quiet: bool,
    },

    /// List library contents
    List {
        /// Library file (primary volume)
        source: PathBuf,

        /// Show sizes, volumes and offsets
        #[arg(short, long)]
        detailed: bool,

        /// Only list files matching glob pattern (e.g., "*.ogg")
        #[arg(long)]
        filter: Option<String>,

        /// Only show count of matching files
        #[arg(short, long)]
        count: bool,
    },

    /// Extract files from a library
    Extract {
        /// Library file (primary volume)
        source: PathBuf,

        /// Output directory
        #[arg(short, long)]
        destination: PathBuf,

        /// Extract a single file by recorded name
        #[arg(long, conflicts_with = "filter")]
        file: Option<String>,

        /// Only extract files matching glob pattern
        #[arg(long)]
        filter: Option<String>,

        /// Suppress progress bar
        #[arg(short, long)]
        quiet: bool,
    },

    /// Show header information for a library
    Info {
        /// Library file (primary volume)
        source: PathBuf,
    },

    /// Find CLIB libraries beneath a directory
    Find {
        /// Directory to search
        dir: PathBuf,
    },

    /// Extract every library found beneath a directory
    BatchExtract {
        /// Directory to search
        source: PathBuf,

        /// Output directory (one folder per library)
        #[arg(short, long)]
        destination: PathBuf,

        /// Suppress progress bar
        #[arg(short, long)]
        quiet: bool,
    },
}

impl Commands {
    pub fn execute(&self) -> anyhow::Result<()> {
        match self {
            Commands::Build {
                files,
                output,
                exe,
                split_mb,
                split_bytes,
                dir,
                seed,
                manifest,
                quiet,
            } => match manifest {
                Some(manifest) => build::execute_manifest(manifest, !*quiet),
                None => build::execute(
                    files,
                    output.as_deref(),
                    *exe,
                    build::split_threshold(*split_mb, *split_bytes)?,
                    dir,
                    *seed,
                    !*quiet,
                ),
            },
            Commands::List {
                source,
                detailed,
                filter,
                count,
            } => list::execute(source, *detailed, filter.as_deref(), *count),
            Commands::Extract {
                source,
                destination,
                file,
                filter,
                quiet,
            } => extract::execute(source, destination, file.as_deref(), filter.as_deref(), !*quiet),
            Commands::Info { source } => info::execute(source),
            Commands::Find { dir } => batch::find(dir),
            Commands::BatchExtract {
                source,
                destination,
                quiet,
            } => batch::extract_all(source, destination, !*quiet),
        }
    }
}

/// Simple glob pattern matching (supports * and ?), case-insensitive
pub(crate) fn matches_glob(pattern: &str, text: &str) -> bool {
    let pattern_chars: Vec<char> = pattern.chars().collect();
    let text_chars: Vec<char> = text.chars().collect();
    matches_glob_recursive(&pattern_chars, &text_chars, 0, 0)
}

fn matches_glob_recursive(pattern: &[char], text: &[char], pi: usize, ti: usize) -> bool {
    if pi == pattern.len() {
        return ti == text.len();
    }

    match pattern[pi] {
        '*' => (ti..=text.len()).any(|i| matches_glob_recursive(pattern, text, pi + 1, i)),
        '?' => ti < text.len() && matches_glob_recursive(pattern, text, pi + 1, ti + 1),
        c => {
            ti < text.len()
                && text[ti].eq_ignore_ascii_case(&c)
                && matches_glob_recursive(pattern, text, pi + 1, ti + 1)
        }
    }
}

/// Whether a recorded name (or its last component) matches `pattern`
pub(crate) fn matches_entry(pattern: &str, name: &str) -> bool {
    let file_name = name.rsplit('/').next().unwrap_or(name);
    matches_glob(pattern, file_name) || matches_glob(pattern, name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_glob() {
        assert!(matches_glob("*.ogg", "music.OGG"));
        assert!(matches_glob("room?.crm", "room1.crm"));
        assert!(!matches_glob("room?.crm", "room10.crm"));
        assert!(matches_entry("*.wav", "Speech/ego1.wav"));
        assert!(!matches_entry("speech", "Speech/ego1.wav"));
    }
}
