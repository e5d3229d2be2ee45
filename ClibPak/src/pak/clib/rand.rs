//! Linear-congruential generator used to obfuscate library headers
//!
//! This is the classic MSVC `rand()` recurrence. It hides file names from
//! casual inspection and nothing more; it offers no secrecy.

/// Added to the stored seed by readers, subtracted by writers.
pub const RAND_SEED_SALT: i32 = 9338638;

const MULTIPLIER: i32 = 214013;
const INCREMENT: i32 = 2531011;

/// Header obfuscation sequence.
///
/// Construct one per encode or decode pass; the sequence is fully determined
/// by the seed.
#[derive(Debug, Clone)]
pub struct PseudoRand {
    state: i32,
}

impl PseudoRand {
    /// Start a sequence from the real (unsalted) seed.
    #[must_use]
    pub fn new(seed: i32) -> Self {
        Self { state: seed }
    }

    /// Start a sequence from the 4 raw bytes stored at the start of a header.
    #[must_use]
    pub fn from_stored_seed(stored: i32) -> Self {
        Self::new(stored.wrapping_add(RAND_SEED_SALT))
    }

    /// The value written to disk in front of the obfuscated header.
    #[must_use]
    pub fn stored_seed(seed: i32) -> i32 {
        seed.wrapping_sub(RAND_SEED_SALT)
    }

    /// Advance the generator; yields a value in `0..=0x7FFF`.
    pub fn next_value(&mut self) -> i32 {
        self.state = self.state.wrapping_mul(MULTIPLIER).wrapping_add(INCREMENT);
        (self.state >> 16) & 0x7FFF
    }

    /// Obfuscate bytes in place.
    pub fn obfuscate(&mut self, data: &mut [u8]) {
        for byte in data {
            *byte = byte.wrapping_add(self.next_value() as u8);
        }
    }

    /// Undo [`obfuscate`](Self::obfuscate) in place.
    pub fn deobfuscate(&mut self, data: &mut [u8]) {
        for byte in data {
            *byte = byte.wrapping_sub(self.next_value() as u8);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_known_sequence() {
        // First outputs of the MSVC rand() recurrence seeded with 1.
        let mut rng = PseudoRand::new(1);
        let values: Vec<i32> = (0..5).map(|_| rng.next_value()).collect();
        assert_eq!(values, vec![41, 18467, 6334, 26500, 19169]);
    }

    #[test]
    fn test_stored_seed_roundtrip() {
        let seed = 1_700_000_000;
        let stored = PseudoRand::stored_seed(seed);
        assert_eq!(stored, seed - RAND_SEED_SALT);

        let mut a = PseudoRand::new(seed);
        let mut b = PseudoRand::from_stored_seed(stored);
        for _ in 0..64 {
            assert_eq!(a.next_value(), b.next_value());
        }
    }

    #[test]
    fn test_stored_seed_wraps() {
        let stored = PseudoRand::stored_seed(i32::MIN);
        let mut a = PseudoRand::new(i32::MIN);
        let mut b = PseudoRand::from_stored_seed(stored);
        assert_eq!(a.next_value(), b.next_value());
    }

    proptest! {
        #[test]
        fn prop_deobfuscate_inverts_obfuscate(seed in any::<i32>(), data in proptest::collection::vec(any::<u8>(), 0..512)) {
            let mut encoded = data.clone();
            PseudoRand::new(seed).obfuscate(&mut encoded);
            PseudoRand::new(seed).deobfuscate(&mut encoded);
            prop_assert_eq!(encoded, data);
        }

        #[test]
        fn prop_values_in_range(seed in any::<i32>()) {
            let mut rng = PseudoRand::new(seed);
            for _ in 0..32 {
                let v = rng.next_value();
                prop_assert!((0..=0x7FFF).contains(&v));
            }
        }
    }
}
