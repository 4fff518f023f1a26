// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// One checkpoint per epoch, never pruned:
//
//   <output>/model/
//     0.ckpt             ← parameters after epoch 0
//     0.json             ← ScriptModelConfig that 0.ckpt was built with
//     1.ckpt
//     1.json
//     ...
//     latest_epoch.json  ← last epoch written
//     best_epoch.json    ← epoch with the lowest validation loss
//
// The .ckpt bytes are burn's named MessagePack record at full
// precision, written to the exact path given. Every checkpoint
// carries its own config, so runs with different hyper-parameters
// can share a directory. Loading reads that config first and
// refuses to load parameters into a model built differently.

use anyhow::{ensure, Context, Result};
use burn::{
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkBytesRecorder, Recorder},
};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::ml::model::{ScriptModel, ScriptModelConfig};

type CheckpointRecorder = NamedMpkBytesRecorder<FullPrecisionSettings>;

const LATEST_FILE: &str = "latest_epoch.json";
const BEST_FILE:   &str = "best_epoch.json";

/// Owns the `<output>/model` directory.
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Point at `<output>/model`, creating it if needed.
    pub fn new(output: impl AsRef<Path>) -> Result<Self> {
        let dir = output.as_ref().join("model");
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create checkpoint directory '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    /// `<output>/model/<epoch>.ckpt`
    pub fn checkpoint_path(&self, epoch: usize) -> PathBuf {
        self.dir.join(format!("{epoch}.ckpt"))
    }

    pub fn mark_latest(&self, epoch: usize) -> Result<()> {
        self.write_pointer(LATEST_FILE, epoch)
    }

    pub fn mark_best(&self, epoch: usize) -> Result<()> {
        self.write_pointer(BEST_FILE, epoch)
    }

    /// Last epoch written to this directory, if any.
    pub fn latest_epoch(&self) -> Result<Option<usize>> {
        if !self.dir.join(LATEST_FILE).exists() {
            return Ok(None);
        }
        self.read_pointer(LATEST_FILE).map(Some)
    }

    pub fn best_checkpoint(&self) -> Result<PathBuf> {
        Ok(self.checkpoint_path(self.read_pointer(BEST_FILE)?))
    }

    fn write_pointer(&self, file: &str, epoch: usize) -> Result<()> {
        let path = self.dir.join(file);
        fs::write(&path, serde_json::to_string(&epoch)?)
            .with_context(|| format!("Failed to write '{}'", path.display()))
    }

    fn read_pointer(&self, file: &str) -> Result<usize> {
        let path = self.dir.join(file);
        let s = fs::read_to_string(&path).with_context(|| {
            format!("Cannot find '{}'. Have you run 'train' first?", path.display())
        })?;
        Ok(serde_json::from_str::<usize>(&s)?)
    }
}

/// `<name>.json` next to `<name>.ckpt`.
pub fn config_path_for(checkpoint: &Path) -> PathBuf {
    checkpoint.with_extension("json")
}

/// Write all parameters of `model` to `path`, and the config it was
/// built from next to it.
pub fn save_model<B: Backend>(model: &ScriptModel<B>, config: &ScriptModelConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let config_path = config_path_for(path);
    fs::write(&config_path, serde_json::to_string_pretty(config)?)
        .with_context(|| format!("Cannot write model config to '{}'", config_path.display()))?;

    let bytes = CheckpointRecorder::default()
        .record(model.clone().into_record(), ())
        .with_context(|| format!("Failed to serialise checkpoint '{}'", path.display()))?;
    fs::write(path, bytes)
        .with_context(|| format!("Failed to save checkpoint to '{}'", path.display()))?;

    tracing::debug!("Saved checkpoint '{}'", path.display());
    Ok(())
}

/// Replace the parameters of `model` with the ones stored at `path`.
pub fn load_model<B: Backend>(
    model:  ScriptModel<B>,
    path:   &Path,
    device: &B::Device,
) -> Result<ScriptModel<B>> {
    let bytes = fs::read(path).with_context(|| {
        format!("Cannot load checkpoint '{}'. Have you trained the model first?", path.display())
    })?;
    let record = CheckpointRecorder::default()
        .load(bytes, device)
        .with_context(|| format!("Checkpoint '{}' is not a valid model record", path.display()))?;

    tracing::info!("Loaded checkpoint '{}'", path.display());
    Ok(model.load_record(record))
}

/// Read the config stored next to a checkpoint file.
pub fn load_config_for(checkpoint: &Path) -> Result<ScriptModelConfig> {
    let path = config_path_for(checkpoint);
    let json = fs::read_to_string(&path).with_context(|| {
        format!("Cannot read model config '{}' for checkpoint '{}'", path.display(), checkpoint.display())
    })?;
    Ok(serde_json::from_str(&json)?)
}

/// Fail unless a checkpoint written with `stored` fits a model built from `expected`.
pub fn ensure_compatible(stored: &ScriptModelConfig, expected: &ScriptModelConfig) -> Result<()> {
    ensure!(
        stored.line_height == expected.line_height,
        "checkpoint was trained on line height {}, model expects {}",
        stored.line_height,
        expected.line_height
    );
    ensure!(
        stored.output_classes == expected.output_classes,
        "checkpoint has {} output classes, model expects {}",
        stored.output_classes,
        expected.output_classes
    );
    ensure!(
        stored.rnn_units == expected.rnn_units,
        "checkpoint has {} RNN units, model expects {}",
        stored.rnn_units,
        expected.rnn_units
    );
    Ok(())
}
