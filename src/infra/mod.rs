// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// File-backed concerns shared by training and inference:
//
//   checkpoint.rs — per-epoch parameter snapshots under
//                   <output>/model, plus the model config
//                   needed to rebuild the model for loading.
//
//   metrics.rs    — per-batch summary streams for the train
//                   and valid phases, and the per-epoch CSV.
//
//   progress.rs   — the terminal progress bar.

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Summary streams and epoch metrics CSV
pub mod metrics;

/// Per-batch progress output
pub mod progress;
