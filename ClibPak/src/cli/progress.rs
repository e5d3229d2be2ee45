//! CLI progress display utilities
//!
//! Step indicators with emojis and simple progress bars.

use std::time::Duration;

use console::{Emoji, style};
use indicatif::{HumanDuration, ProgressBar, ProgressStyle};

// =============================================================================
// Emoji Constants (with ASCII fallbacks for terminals without emoji support)
// =============================================================================

/// Magnifying glass - for reading/scanning operations
pub static LOOKING_GLASS: Emoji<'_, '_> = Emoji("🔍 ", "");
/// Package - for extraction operations
pub static PACKAGE: Emoji<'_, '_> = Emoji("📦 ", "");
/// Floppy disk - for writing volumes
pub static DISK: Emoji<'_, '_> = Emoji("💾 ", "");
/// Sparkles - for completion
pub static SPARKLE: Emoji<'_, '_> = Emoji("✨ ", "");
/// Truck - for batch operations
pub static TRUCK: Emoji<'_, '_> = Emoji("🚚 ", "");

/// Print a step indicator: `[1/3] 📦 Message...`
pub fn print_step(current: usize, total: usize, emoji: Emoji, msg: &str) {
    println!(
        "{} {}{}",
        style(format!("[{current}/{total}]")).bold().dim(),
        emoji,
        msg
    );
}

/// Print completion message: `✨ Done in 2s`
pub fn print_done(elapsed: Duration) {
    println!("{} Done in {}", SPARKLE, HumanDuration(elapsed));
}

/// Progress bar style for determinate progress
///
/// Format: `Copying [████████░░░░░░░░] 50/100`
///
/// # Panics
/// Panics if the template string is invalid (this is a compile-time constant).
#[must_use]
pub fn bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{msg} [{bar:40.cyan/blue}] {pos}/{len}")
        .expect("valid template")
}

/// Create a simple progress bar
#[must_use]
pub fn simple_bar(total: u64, msg: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(bar_style());
    pb.set_message(msg.to_string());
    pb
}

/// Hidden bar for quiet mode
#[must_use]
pub fn hidden_bar() -> ProgressBar {
    ProgressBar::hidden()
}

/// Format byte size for human-readable output
#[must_use]
pub fn format_size(bytes: u64) -> String {
    if bytes >= 1_048_576 {
        format!("{:.1}M", bytes as f64 / 1_048_576.0)
    } else if bytes >= 1024 {
        format!("{:.1}K", bytes as f64 / 1024.0)
    } else {
        format!("{bytes}")
    }
}
