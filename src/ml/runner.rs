// ============================================================
// Layer 5 — Runner
// ============================================================
// Loads a checkpoint once, then classifies single lines. Each
// line is wrapped as a batch of one, so no padding happens and
// the prediction matches what the trainer would compute for the
// same line alone in a batch.

use anyhow::{ensure, Context, Result};
use burn::{data::dataloader::batcher::Batcher, prelude::*};
use std::path::Path;

use crate::data::batcher::{LineBatcher, LineTensors};
use crate::domain::line::{LineImage, Sample};
use crate::infra::checkpoint;
use crate::ml::model::{predicted_classes, ScriptModel, ScriptModelConfig};

pub type InferBackend = burn::backend::Wgpu;

/// Predicted class with the full softmax distribution.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub class:         usize,
    pub probabilities: Vec<f32>,
}

impl Prediction {
    /// Probability assigned to the predicted class.
    pub fn confidence(&self) -> f32 {
        self.probabilities.get(self.class).copied().unwrap_or(0.0)
    }
}

pub struct Runner<B: Backend> {
    model:   ScriptModel<B>,
    batcher: LineBatcher<B>,
    config:  ScriptModelConfig,
}

impl<B: Backend> Runner<B> {
    /// Build a model for `line_height` from the configuration stored
    /// beside `checkpoint` and load its parameters. Fails when the
    /// checkpoint is missing or was trained for another line height.
    pub fn new(line_height: usize, checkpoint: impl AsRef<Path>, device: B::Device) -> Result<Self> {
        let checkpoint = checkpoint.as_ref();
        let stored     = checkpoint::load_config_for(checkpoint)?;
        let config     = ScriptModelConfig::new(line_height)
            .with_output_classes(stored.output_classes)
            .with_rnn_units(stored.rnn_units);
        checkpoint::ensure_compatible(&stored, &config)?;

        let model = checkpoint::load_model(config.init::<B>(&device), checkpoint, &device)?;
        Ok(Self { model, batcher: LineBatcher::new(device), config })
    }

    /// Class id of one unbatched line.
    pub fn script(&self, line: &LineImage) -> Result<usize> {
        let inputs = self.inputs(line)?;
        let logits = self.model.forward(inputs.images, inputs.widths);
        predicted_classes(logits)?
            .first()
            .copied()
            .context("model returned no prediction")
    }

    /// Class id plus softmax probabilities of one unbatched line.
    pub fn predict(&self, line: &LineImage) -> Result<Prediction> {
        let inputs = self.inputs(line)?;
        let probabilities = self
            .model
            .probabilities(inputs.images, inputs.widths)
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .map_err(|e| anyhow::anyhow!("Cannot read probabilities: {e:?}"))?;

        let class = probabilities
            .iter()
            .enumerate()
            .fold(0, |best, (i, &p)| if p > probabilities[best] { i } else { best });

        Ok(Prediction { class, probabilities })
    }

    pub fn config(&self) -> &ScriptModelConfig {
        &self.config
    }

    fn inputs(&self, line: &LineImage) -> Result<LineTensors<B>> {
        ensure!(
            line.height() == self.config.line_height,
            "line has height {} but the model expects {}",
            line.height(),
            self.config.line_height
        );
        // The label slot is never read on the prediction path.
        Ok(self.batcher.batch(vec![Sample::new(line.clone(), 0)]))
    }
}
