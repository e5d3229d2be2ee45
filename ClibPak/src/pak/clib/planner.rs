//! Volume assignment for multi-file libraries
//!
//! Greedy and order preserving: files are never reordered or split, the
//! planner only decides where to cut. Splitting starts at the sprite set,
//! which always opens a fresh volume.

use super::{MAX_VOLUMES, SPRITE_SET_NAME};

/// Assigns each file, in input order, to a volume.
#[derive(Debug, Clone)]
pub struct VolumePlanner {
    split_threshold: u64,
    current_volume: usize,
    accumulated: u64,
    splitting: bool,
}

impl VolumePlanner {
    /// `split_threshold` of 0 disables splitting.
    #[must_use]
    pub fn new(split_threshold: u64) -> Self {
        Self {
            split_threshold,
            current_volume: 0,
            accumulated: 0,
            splitting: false,
        }
    }

    /// Place the next file and return its volume index.
    ///
    /// `name` is the file's base name, `length` its size in bytes.
    pub fn assign(&mut self, name: &str, length: u64) -> u8 {
        if self.split_threshold > 0 {
            if name.eq_ignore_ascii_case(SPRITE_SET_NAME) {
                self.splitting = true;
                self.advance();
            } else if self.splitting
                && self.accumulated > self.split_threshold
                && self.current_volume < MAX_VOLUMES - 1
            {
                self.advance();
            }
        }

        self.accumulated += length;
        self.current_volume as u8
    }

    /// Number of volumes used so far.
    #[must_use]
    pub fn volume_count(&self) -> usize {
        self.current_volume + 1
    }

    fn advance(&mut self) {
        // A second sprite set past the cap stays in the last volume.
        if self.current_volume < MAX_VOLUMES - 1 {
            self.current_volume += 1;
        }
        self.accumulated = 0;
    }
}
