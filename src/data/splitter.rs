// ============================================================
// Layer 4 — Train/Validation Splitter
// ============================================================
// Draws the validation set uniformly at random, without
// replacement, from the original (pre-augmentation) samples:
//   - Validation: round(validation_fraction × N) samples
//   - Training:   everything else
//
// The split happens before augmentation, so no augmented copy
// of a validation image can leak into the training set.
//
// Uses Fisher-Yates shuffle via rand::seq::SliceRandom. The
// RNG is passed in so dataset builds can be reproduced.

use rand::{seq::SliceRandom, Rng};

/// Shuffle `samples` and split into (train, validation).
///
/// # Arguments
/// * `samples`             - All trainable samples (consumed)
/// * `validation_fraction` - Share drawn into validation, in [0, 1]
/// * `rng`                 - Source of randomness for the shuffle
pub fn split_validation<T, R: Rng + ?Sized>(
    mut samples: Vec<T>,
    validation_fraction: f64,
    rng: &mut R,
) -> (Vec<T>, Vec<T>) {
    samples.shuffle(rng);

    let total     = samples.len();
    debug_assert!((0.0..=1.0).contains(&validation_fraction));
    let val_count = ((total as f64) * validation_fraction).round() as usize;

    // split_off(n) keeps [0..n) and returns [n..total)
    let val = samples.split_off(total - val_count.min(total));

    tracing::debug!(
        "Dataset split: {} training, {} validation",
        samples.len(),
        val.len(),
    );

    (samples, val)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};
    use std::collections::HashSet;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    #[test]
    fn test_correct_split_sizes() {
        let items: Vec<usize> = (0..100).collect();
        let (train, val)      = split_validation(items, 0.2, &mut rng());
        assert_eq!(train.len(), 80);
        assert_eq!(val.len(),   20);
    }

    #[test]
    fn test_validation_count_is_rounded() {
        let items: Vec<usize> = (0..7).collect();
        let (train, val)      = split_validation(items, 0.25, &mut rng());
        // 7 × 0.25 = 1.75 → 2
        assert_eq!(val.len(), 2);
        assert_eq!(train.len(), 5);
    }

    #[test]
    fn test_sets_are_disjoint_and_complete() {
        let items: Vec<usize> = (0..50).collect();
        let (train, val)      = split_validation(items, 0.3, &mut rng());

        let train: HashSet<_> = train.into_iter().collect();
        let val:   HashSet<_> = val.into_iter().collect();
        assert!(train.is_disjoint(&val));
        assert_eq!(train.len() + val.len(), 50);
    }

    #[test]
    fn test_zero_fraction_gives_empty_validation() {
        let items: Vec<usize> = (0..10).collect();
        let (train, val)      = split_validation(items, 0.0, &mut rng());
        assert_eq!(train.len(), 10);
        assert!(val.is_empty());
    }

    #[test]
    fn test_empty_dataset() {
        let items: Vec<usize> = Vec::new();
        let (train, val)      = split_validation(items, 0.2, &mut rng());
        assert!(train.is_empty());
        assert!(val.is_empty());
    }
}
