// ============================================================
// Layer 2 — ScriptUseCase
// ============================================================
// Classifies every line in a JSON Lines file with a trained
// checkpoint. When the input lines carry labels, the overall
// accuracy is reported as well.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::data::loader::JsonlLoader;
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::{
    accuracy::StreamingAccuracy,
    runner::{InferBackend, Prediction, Runner},
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptConfig {
    pub lines_path:  PathBuf,
    pub line_height: usize,
    /// Explicit checkpoint; otherwise the best epoch under `output`
    pub checkpoint:  Option<PathBuf>,
    pub output:      PathBuf,
}

/// Prediction for one input line.
#[derive(Debug, Clone)]
pub struct LineResult {
    pub index:      usize,
    pub prediction: Prediction,
    pub label:      Option<usize>,
}

#[derive(Debug, Clone)]
pub struct ScriptReport {
    pub checkpoint: PathBuf,
    pub results:    Vec<LineResult>,
    /// Present when at least one input line was labelled
    pub accuracy:   Option<f64>,
}

pub struct ScriptUseCase {
    config: ScriptConfig,
}

impl ScriptUseCase {
    pub fn new(config: ScriptConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<ScriptReport> {
        let cfg = &self.config;
        let checkpoint = match &cfg.checkpoint {
            Some(path) => path.clone(),
            None => CheckpointManager::new(&cfg.output)?.best_checkpoint()?,
        };

        let device = burn::backend::wgpu::WgpuDevice::default();
        let runner = Runner::<InferBackend>::new(cfg.line_height, &checkpoint, device)?;
        let lines  = JsonlLoader::new(&cfg.lines_path).load_lines()?;
        tracing::info!(
            "Classifying {} lines with '{}' ({} classes)",
            lines.len(),
            checkpoint.display(),
            runner.config().output_classes
        );

        let mut accuracy = StreamingAccuracy::new();
        let mut results  = Vec::with_capacity(lines.len());
        for (index, (line, label)) in lines.into_iter().enumerate() {
            let prediction = runner.predict(&line)?;
            if let Some(label) = label {
                accuracy.update(&[prediction.class], &[label]);
            }
            results.push(LineResult { index, prediction, label });
        }

        let accuracy = (accuracy.total() > 0).then(|| accuracy.value());
        Ok(ScriptReport { checkpoint, results, accuracy })
    }
}
