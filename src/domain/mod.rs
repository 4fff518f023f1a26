// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust structs and traits describing what a line sample
// is. No burn types and no file I/O live here, so everything in
// this layer is testable without a backend.

// A line image and its class label
pub mod line;

// The dataset abstraction the trainer consumes
pub mod traits;
