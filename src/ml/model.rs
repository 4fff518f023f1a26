use anyhow::{Context, Result};
use burn::{
    nn::{loss::CrossEntropyLossConfig, Linear, LinearConfig},
    prelude::*,
    tensor::activation::softmax,
};
use std::{fs, path::{Path, PathBuf}};

use crate::ml::rnn::{RnnEncoder, RnnEncoderConfig};

/// Learning rate of the optimizer step.
pub const LEARNING_RATE: f64 = 1e-4;

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize.
#[derive(Config, Debug)]
pub struct ScriptModelConfig {
    /// Height of every line image; one encoder input column
    pub line_height: usize,
    /// Number of script classes
    #[config(default = 4)]
    pub output_classes: usize,
    /// Hidden units of the recurrent encoder
    #[config(default = 100)]
    pub rnn_units: usize,
}

impl ScriptModelConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> ScriptModel<B> {
        ScriptModel {
            encoder: RnnEncoderConfig::new(self.line_height, self.rnn_units).init(device),
            head:    LinearConfig::new(self.rnn_units, self.output_classes).init(device),
        }
    }
}

/// RNN encoder over image columns followed by a dense classification head.
#[derive(Module, Debug)]
pub struct ScriptModel<B: Backend> {
    pub encoder: RnnEncoder<B>,
    pub head:    Linear<B>,
}

pub struct ScriptOutput<B: Backend> {
    /// Mean sparse cross-entropy over the batch, shape [1]
    pub loss:   Tensor<B, 1>,
    /// [batch, output_classes]
    pub logits: Tensor<B, 2>,
}

impl<B: Backend> ScriptModel<B> {
    /// images: [batch, width, line_height], widths: [batch] → logits [batch, classes]
    pub fn forward(&self, images: Tensor<B, 3>, widths: Tensor<B, 1, Int>) -> Tensor<B, 2> {
        let state = self.encoder.forward(images, widths);
        self.head.forward(state)
    }

    /// Softmax over the class axis.
    pub fn probabilities(&self, images: Tensor<B, 3>, widths: Tensor<B, 1, Int>) -> Tensor<B, 2> {
        softmax(self.forward(images, widths), 1)
    }

    pub fn forward_loss(
        &self,
        images: Tensor<B, 3>,
        widths: Tensor<B, 1, Int>,
        labels: Tensor<B, 1, Int>,
    ) -> ScriptOutput<B> {
        let logits = self.forward(images, widths);
        let loss = CrossEntropyLossConfig::new()
            .init(&logits.device())
            .forward(logits.clone(), labels);
        ScriptOutput { loss, logits }
    }

    /// Write a static description of the module tree to `<dir>/graph.txt`.
    /// Diagnostic only.
    pub fn save_graph_summary(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create summary directory '{}'", dir.display()))?;

        let path = dir.join("graph.txt");
        let text = format!("parameters: {}\n\n{}\n", self.num_params(), self);
        fs::write(&path, text)
            .with_context(|| format!("Cannot write graph summary '{}'", path.display()))?;

        tracing::debug!("Wrote graph summary to '{}'", path.display());
        Ok(path)
    }
}

/// Argmax class id of every row of `logits`.
pub fn predicted_classes<B: Backend>(logits: Tensor<B, 2>) -> Result<Vec<usize>> {
    // argmax(1) keeps the reduced axis: [batch, 1] → flatten to [batch]
    let classes = logits
        .argmax(1)
        .flatten::<1>(0, 1)
        .into_data()
        .convert::<i64>()
        .to_vec::<i64>()
        .map_err(|e| anyhow::anyhow!("Cannot read predictions: {e:?}"))?;
    Ok(classes.into_iter().map(|c| c as usize).collect())
}

/// Scalar value of a single-element loss tensor.
pub fn loss_value<B: Backend>(loss: Tensor<B, 1>) -> f64 {
    loss.into_scalar().elem::<f64>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        data::{
            batcher::{LineBatch, LineBatcher},
            dataset::LineDataset,
        },
        domain::line::{LineImage, Sample},
        TestBackend,
    };

    fn model() -> ScriptModel<TestBackend> {
        ScriptModelConfig::new(4).with_rnn_units(8).init(&Default::default())
    }

    fn batch() -> LineBatch {
        let a = LineImage::new(3, 4, (0..12).map(|i| i as f32 / 12.0).collect()).unwrap();
        let b = LineImage::new(5, 4, (0..20).map(|i| (i as f32).cos()).collect()).unwrap();
        let ds = LineDataset::new(vec![Sample::new(a, 0), Sample::new(b, 1)], 4).unwrap();
        LineBatch::from_range(&ds, 0, 2, 0.0).unwrap()
    }

    #[test]
    fn test_defaults() {
        let cfg = ScriptModelConfig::new(16);
        assert_eq!(cfg.output_classes, 4);
        assert_eq!(cfg.rnn_units, 100);
    }

    #[test]
    fn test_forward_shapes() {
        let m = model();
        let t = LineBatcher::<TestBackend>::new(Default::default()).tensors(&batch());
        let out = m.forward_loss(t.images.clone(), t.widths.clone(), t.labels);
        assert_eq!(out.logits.dims(), [2, 4]);
        assert!(loss_value(out.loss).is_finite());

        let probs = m
            .probabilities(t.images, t.widths)
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .unwrap();
        for row in probs.chunks(4) {
            assert!((row.iter().sum::<f32>() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_predicted_classes_match_argmax() {
        let logits = Tensor::<TestBackend, 2>::from_floats(
            [[0.1, 2.0, -1.0, 0.0], [3.0, 0.0, 0.0, 0.0], [0.0, 0.0, 0.0, 5.0]],
            &Default::default(),
        );
        assert_eq!(predicted_classes(logits).unwrap(), vec![1, 0, 3]);
    }

    #[test]
    fn test_graph_summary_written() {
        let dir  = tempfile::tempdir().unwrap();
        let path = model().save_graph_summary(dir.path().join("summary")).unwrap();
        let text = fs::read_to_string(path).unwrap();
        assert!(text.starts_with("parameters:"));
    }
}
