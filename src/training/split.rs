use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::error::{Error, Result};

/// Random train/validation split of `0..n`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RandomSplitter {
    valid_pct: f64,
    seed: Option<u64>,
}

impl Default for RandomSplitter {
    fn default() -> Self {
        Self {
            valid_pct: 0.2,
            seed: None,
        }
    }
}

impl RandomSplitter {
    pub fn new(valid_pct: f64, seed: Option<u64>) -> Result<Self> {
        if !(0.0..=1.0).contains(&valid_pct) {
            return Err(Error::InvalidInput(format!(
                "valid_pct must be within [0, 1], got {valid_pct}"
            )));
        }
        Ok(Self { valid_pct, seed })
    }

    pub fn valid_pct(&self) -> f64 {
        self.valid_pct
    }

    /// `(train, valid)` indices. The validation set holds the first
    /// `floor(valid_pct * n)` indices of a random permutation.
    pub fn split(&self, n: usize) -> (Vec<usize>, Vec<usize>) {
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut idx: Vec<usize> = (0..n).collect();
        idx.shuffle(&mut rng);
        let cut = (self.valid_pct * n as f64).floor() as usize;
        let train = idx.split_off(cut);
        (train, idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_follow_floor() {
        let (train, valid) = RandomSplitter::new(0.25, Some(1)).unwrap().split(10);
        assert_eq!(valid.len(), 2);
        assert_eq!(train.len(), 8);
    }

    #[test]
    fn split_is_a_partition() {
        let (mut train, valid) = RandomSplitter::default().split(37);
        train.extend(valid);
        train.sort();
        assert_eq!(train, (0..37).collect::<Vec<_>>());
    }

    #[test]
    fn seed_is_reproducible() {
        let s = RandomSplitter::new(0.3, Some(42)).unwrap();
        assert_eq!(s.split(20), s.split(20));
    }

    #[test]
    fn out_of_range_pct_rejected() {
        assert!(RandomSplitter::new(1.5, None).is_err());
        assert!(RandomSplitter::new(-0.1, None).is_err());
    }
}
