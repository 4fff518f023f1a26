use anyhow::{ensure, Context, Result};
use burn::data::dataset::Dataset;
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use crate::domain::{line::Sample, traits::LineSource};

/// In-memory line dataset. Every sample has the same image height,
/// checked once at construction.
pub struct LineDataset {
    samples:     Vec<Sample>,
    line_height: usize,
    rng:         StdRng,
}

impl LineDataset {
    /// Create a dataset with an explicit line height.
    /// Fails if any sample's height differs from it.
    pub fn new(samples: Vec<Sample>, line_height: usize) -> Result<Self> {
        for (i, s) in samples.iter().enumerate() {
            ensure!(
                s.image.height() == line_height,
                "sample {i} has height {} but the dataset line height is {line_height}",
                s.image.height()
            );
        }
        Ok(Self { samples, line_height, rng: StdRng::from_entropy() })
    }

    /// Create a dataset whose line height is taken from the first sample.
    pub fn from_samples(samples: Vec<Sample>) -> Result<Self> {
        let line_height = samples
            .first()
            .map(|s| s.image.height())
            .context("cannot infer the line height of an empty dataset")?;
        Self::new(samples, line_height)
    }

    /// Make shuffling reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    #[cfg(test)]
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }
}

impl Dataset<Sample> for LineDataset {
    fn get(&self, index: usize) -> Option<Sample> {
        self.samples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}

impl LineSource for LineDataset {
    fn line_height(&self) -> usize {
        self.line_height
    }

    fn shuffle(&mut self) {
        self.samples.shuffle(&mut self.rng);
    }
}
