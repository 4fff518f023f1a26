// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Workflow coordination only: load data, build the ML objects,
// run them, hand results back to the CLI. No tensor code and no
// printing here.

// The training workflow
pub mod train_use_case;

// Classifying lines with a trained checkpoint
pub mod script_use_case;
