// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// All burn-specific code apart from the tensor conversion in the
// batcher lives here.
//
//   rnn.rs      — vanilla RNN encoder with explicit sequence
//                 lengths, so padded columns are ignored
//   model.rs    — encoder + dense head, softmax, argmax,
//                 sparse cross-entropy
//   accuracy.rs — streaming accuracy counter
//   history.rs  — per-epoch losses and the early-stop rule
//   trainer.rs  — epoch loop, validation, checkpoints
//   runner.rs   — checkpoint loading and single-line inference

/// Recurrent encoder over image columns
pub mod rnn;

/// Script classifier architecture
pub mod model;

/// Streaming accuracy metric
pub mod accuracy;

/// Loss history and early stopping
pub mod history;

/// Training loop with validation and checkpointing
pub mod trainer;

/// Inference on single lines
pub mod runner;
