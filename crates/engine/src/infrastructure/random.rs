//! Randomness implementations.

use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::infrastructure::ports::RandomPort;

/// Entropy-seeded RNG behind a mutex (RandomPort is shared across tasks).
pub struct StdRandom {
    rng: Mutex<StdRng>,
}

impl StdRandom {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Deterministic RNG for reproducible runs.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl Default for StdRandom {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomPort for StdRandom {
    fn gen_range(&self, min: i32, max: i32) -> i32 {
        match self.rng.lock() {
            Ok(mut rng) => rng.gen_range(min..=max),
            // Poisoned lock means a panic mid-roll elsewhere; fall back to a
            // fresh RNG rather than propagating the poison.
            Err(_) => StdRng::from_entropy().gen_range(min..=max),
        }
    }
}

/// Fixed sequence of values for tests; repeats the last value when
/// exhausted.
pub struct SequenceRandom {
    values: Vec<i32>,
    cursor: Mutex<usize>,
}

impl SequenceRandom {
    pub fn new(values: Vec<i32>) -> Self {
        Self {
            values,
            cursor: Mutex::new(0),
        }
    }

    /// How many values were consumed so far.
    pub fn consumed(&self) -> usize {
        self.cursor.lock().map(|c| *c).unwrap_or(0)
    }
}

impl RandomPort for SequenceRandom {
    fn gen_range(&self, min: i32, max: i32) -> i32 {
        let mut cursor = match self.cursor.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let value = self
            .values
            .get(*cursor)
            .or_else(|| self.values.last())
            .copied()
            .unwrap_or(min);
        *cursor += 1;
        value.clamp(min, max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_std_random_in_range() {
        let random = StdRandom::seeded(7);
        for _ in 0..100 {
            let value = random.gen_range(1, 10);
            assert!((1..=10).contains(&value));
        }
    }

    #[test]
    fn test_sequence_random_replays() {
        let random = SequenceRandom::new(vec![3, 7]);
        assert_eq!(random.gen_range(1, 10), 3);
        assert_eq!(random.gen_range(1, 10), 7);
        // Exhausted: repeats the last value.
        assert_eq!(random.gen_range(1, 10), 7);
        assert_eq!(random.consumed(), 3);
    }

    #[test]
    fn test_sequence_random_clamps() {
        let random = SequenceRandom::new(vec![50]);
        assert_eq!(random.gen_range(1, 10), 10);
    }
}
