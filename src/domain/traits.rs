// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// Indexed access and length come from burn's `Dataset` trait.
// On top of that the trainer needs the shared line height and an
// in-place shuffle, which burn's datasets don't offer:
//
//   - LineDataset  → in-memory samples loaded from JSON Lines
//   - (tests)      → hand-built datasets with fixed widths

use burn::data::dataset::Dataset;

use crate::domain::line::Sample;

// ─── LineSource ───────────────────────────────────────────────────────────────
/// An ordered, shufflable collection of labelled line images
/// that all share one line height.
pub trait LineSource: Dataset<Sample> {
    /// Height (in pixels) of every line in this source.
    fn line_height(&self) -> usize;

    /// Reorder the samples in place.
    fn shuffle(&mut self);
}
