// ============================================================
// Layer 3 — Line Image and Sample
// ============================================================
// A line image is one cropped line of text, already turned into
// a float matrix upstream. It is stored column-major along the
// width axis: the recurrent encoder reads it one column at a time.
//
//   pixels = [col_0[0..height], col_1[0..height], ..., col_{w-1}[..]]
//
// The height is fixed per dataset, the width varies per line.

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

/// One line image of `width` columns, each `height` floats tall.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineImage {
    width:  usize,
    height: usize,
    pixels: Vec<f32>,
}

impl LineImage {
    /// Build a line image from a flat column-major buffer.
    /// Fails if the buffer does not hold exactly `width * height` values.
    pub fn new(width: usize, height: usize, pixels: Vec<f32>) -> Result<Self> {
        ensure!(width > 0, "line image must have a non-zero width");
        ensure!(height > 0, "line image must have a non-zero height");
        ensure!(
            pixels.len() == width * height,
            "line image of {width}x{height} needs {} values, got {}",
            width * height,
            pixels.len()
        );
        Ok(Self { width, height, pixels })
    }

    /// Build a line image from a list of columns.
    /// Every column must have the same length (the line height).
    pub fn from_columns(columns: Vec<Vec<f32>>) -> Result<Self> {
        let width  = columns.len();
        let height = columns.first().map(Vec::len).unwrap_or(0);

        if let Some((x, col)) = columns.iter().enumerate().find(|(_, c)| c.len() != height) {
            anyhow::bail!(
                "column {x} has height {} but column 0 has height {height}",
                col.len()
            );
        }

        let pixels = columns.into_iter().flatten().collect();
        Self::new(width, height, pixels)
    }

    pub fn width(&self) -> usize { self.width }

    pub fn height(&self) -> usize { self.height }

    /// Flat column-major pixel buffer, `width * height` long.
    pub fn pixels(&self) -> &[f32] { &self.pixels }

    #[cfg(test)]
    /// The `x`-th column of the line (one timestep for the encoder).
    pub fn column(&self, x: usize) -> &[f32] {
        &self.pixels[x * self.height..(x + 1) * self.height]
    }
}

/// A labelled line: the unit the trainer iterates over.
/// Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub image: LineImage,
    pub label: usize,
}

impl Sample {
    pub fn new(image: LineImage, label: usize) -> Self {
        Self { image, label }
    }
}
