// ============================================================
// Layer 4 — Padded Line Batcher
// ============================================================
// Lines in a batch have different widths, but a tensor needs one
// width. Every line is therefore padded on the trailing side of
// the width axis up to the widest line in the batch, and the true
// widths travel alongside so the encoder can ignore the padding.
//
//   widths  = [3, 5, 2]            max_width = 5
//
//   line 0  ███░░
//   line 1  █████        ░ = padding value (0.0)
//   line 2  ██░░░
//
// Batches are cut from contiguous index ranges in dataset order.
// There is no bucketing by width: one long line inflates the
// padding for its whole batch.
//
// Building the batch happens on the host (LineBatch), turning it
// into tensors happens per backend (LineBatcher), so the same
// batch can feed the autodiff model and the validation model.

use anyhow::{ensure, Context, Result};
use burn::{data::dataloader::batcher::Batcher, prelude::*, tensor::TensorData};

use crate::domain::{line::Sample, traits::LineSource};

/// Value written into padded positions.
pub const PADDING_VALUE: f32 = 0.0;

// ─── LineBatch ────────────────────────────────────────────────────────────────
/// A padded batch in host memory.
///
/// `images` is laid out as `[batch, max_width, height]`, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct LineBatch {
    pub images:    Vec<f32>,
    pub widths:    Vec<usize>,
    pub labels:    Vec<usize>,
    pub max_width: usize,
    pub height:    usize,
}

impl LineBatch {
    /// Pad the samples `[from, to)` of `data` into a single batch.
    pub fn from_range<D: LineSource + ?Sized>(
        data:          &D,
        from:          usize,
        to:            usize,
        padding_value: f32,
    ) -> Result<Self> {
        ensure!(to > from, "empty batch range [{from}, {to})");

        let height = data.line_height();
        let mut samples = Vec::with_capacity(to - from);
        for index in from..to {
            let sample = data
                .get(index)
                .with_context(|| format!("batch index {index} is past the end ({})", data.len()))?;
            ensure!(
                sample.image.height() == height,
                "sample {index} has height {} but the batch height is {height}",
                sample.image.height()
            );
            samples.push(sample);
        }

        Ok(Self::pad(&samples, height, padding_value))
    }

    /// Every sample must have height `height`.
    fn pad(samples: &[Sample], height: usize, padding_value: f32) -> Self {
        let widths: Vec<usize> = samples.iter().map(|s| s.image.width()).collect();
        let labels: Vec<usize> = samples.iter().map(|s| s.label).collect();
        let max_width = widths.iter().copied().max().unwrap_or(0);

        // Line pixels are column-major, which is exactly one
        // [width, height] slab per sample, so copying the prefix
        // of each slab leaves the tail at the padding value.
        let stride = max_width * height;
        let mut images = vec![padding_value; samples.len() * stride];
        for (i, sample) in samples.iter().enumerate() {
            let pixels = sample.image.pixels();
            let start  = i * stride;
            images[start..start + pixels.len()].copy_from_slice(pixels);
        }

        Self { images, widths, labels, max_width, height }
    }

    /// `[batch, max_width, height]`
    pub fn shape(&self) -> [usize; 3] {
        [self.widths.len(), self.max_width, self.height]
    }

    #[cfg(test)]
    /// The padded `[max_width, height]` slab of line `i`.
    pub fn image(&self, i: usize) -> &[f32] {
        let stride = self.max_width * self.height;
        &self.images[i * stride..(i + 1) * stride]
    }
}

// ─── LineTensors ──────────────────────────────────────────────────────────────
/// A padded batch moved onto a device.
#[derive(Debug, Clone)]
pub struct LineTensors<B: Backend> {
    /// `[batch, max_width, height]`
    pub images: Tensor<B, 3>,
    /// `[batch]` true width of each line
    pub widths: Tensor<B, 1, Int>,
    /// `[batch]` class ids
    pub labels: Tensor<B, 1, Int>,
}

// ─── LineBatcher ──────────────────────────────────────────────────────────────
/// Turns host batches into tensors on a fixed device.
#[derive(Clone, Debug)]
pub struct LineBatcher<B: Backend> {
    device: B::Device,
}

impl<B: Backend> LineBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }

    pub fn tensors(&self, batch: &LineBatch) -> LineTensors<B> {
        let [batch_size, _, _] = batch.shape();
        let images = TensorData::new(batch.images.clone(), batch.shape())
            .convert::<B::FloatElem>();
        let widths = TensorData::new(to_i64(&batch.widths), [batch_size])
            .convert::<B::IntElem>();
        let labels = TensorData::new(to_i64(&batch.labels), [batch_size])
            .convert::<B::IntElem>();

        LineTensors {
            images: Tensor::from_data(images, &self.device),
            widths: Tensor::from_data(widths, &self.device),
            labels: Tensor::from_data(labels, &self.device),
        }
    }
}

// ─── Burn Batcher Trait Implementation ────────────────────────────────────────
// Pads with PADDING_VALUE. All items must share one line height,
// which holds for anything drawn from a single `LineSource`.
impl<B: Backend> Batcher<Sample, LineTensors<B>> for LineBatcher<B> {
    fn batch(&self, items: Vec<Sample>) -> LineTensors<B> {
        let height = items.first().map_or(0, |s| s.image.height());
        self.tensors(&LineBatch::pad(&items, height, PADDING_VALUE))
    }
}

fn to_i64(values: &[usize]) -> Vec<i64> {
    values.iter().map(|&v| v as i64).collect()
}
