// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// From a line file on disk to padded tensors:
//
//   lines.jsonl
//       │
//       ▼
//   JsonlLoader       → parses records into LineImage + label
//       │
//       ▼
//   split_train_valid → optional seeded train/validation split
//       │
//       ▼
//   LineDataset       → samples + line height + shuffle
//       │
//       ▼
//   LineBatch         → contiguous range, zero-padded to max width
//       │
//       ▼
//   LineBatcher       → tensors on the training or inference device

/// Reads JSON Lines files of line images
pub mod loader;

/// In-memory dataset implementing LineSource
pub mod dataset;

/// Padding of variable-width lines into batches
pub mod batcher;

/// Seeded train/validation split
pub mod splitter;
