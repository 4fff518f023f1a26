// ============================================================
// Layer 4 — Train/Validation Splitter
// ============================================================
// Used when the caller provides a single labelled line file:
// the samples are shuffled with a seeded RNG and the tail goes
// to validation, so the split is the same on every run with the
// same seed.

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

/// Shuffle `samples` and split off `valid_fraction` of them.
///
/// Returns `(train, valid)`. The fraction is clamped to `[0, 1]`.
pub fn split_train_valid<T>(mut samples: Vec<T>, valid_fraction: f64, seed: u64) -> (Vec<T>, Vec<T>) {
    let mut rng = StdRng::seed_from_u64(seed);
    samples.shuffle(&mut rng);

    let total      = samples.len();
    let valid_len  = ((total as f64) * valid_fraction.clamp(0.0, 1.0)).round() as usize;
    let valid      = samples.split_off(total - valid_len.min(total));

    tracing::debug!(
        "Dataset split: {} training, {} validation (seed {seed})",
        samples.len(),
        valid.len(),
    );

    (samples, valid)
}
