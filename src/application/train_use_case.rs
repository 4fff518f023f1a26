// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates a training run:
//
//   Step 1: Load labelled lines          (Layer 4 - data)
//   Step 2: Split off validation if none (Layer 4 - data)
//   Step 3: Build datasets               (Layer 4 - data)
//   Step 4: Save the run config          (Layer 2)
//   Step 5: Build the trainer            (Layer 5 - ml)
//   Step 6: Optionally resume            (Layer 6 - infra)
//   Step 7: Train until early stopping   (Layer 5 - ml)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};

use crate::data::{dataset::LineDataset, loader::JsonlLoader, splitter::split_train_valid};
use crate::ml::{
    model::LEARNING_RATE,
    trainer::{optimizer_config, TrainBackend, TrainReport, Trainer, TrainerOptions},
};

/// Seed used for the train/validation split when none is given.
const DEFAULT_SPLIT_SEED: u64 = 42;

// ─── Training Configuration ──────────────────────────────────────────────────
// Everything a run needs; written to <output>/train_config.json.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub train_path:       PathBuf,
    pub valid_path:       Option<PathBuf>,
    pub valid_fraction:   f64,
    pub output:           PathBuf,
    pub batch_size:       usize,
    pub early_stop_after: usize,
    pub learning_rate:    f64,
    pub rnn_units:        usize,
    pub output_classes:   usize,
    pub max_epochs:       Option<usize>,
    pub seed:             Option<u64>,
    pub resume:           Option<PathBuf>,
    pub show_progress:    bool,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            train_path:       PathBuf::from("data/train.jsonl"),
            valid_path:       None,
            valid_fraction:   0.2,
            output:           PathBuf::from("runs/script"),
            batch_size:       32,
            early_stop_after: 4,
            learning_rate:    LEARNING_RATE,
            rnn_units:        100,
            output_classes:   4,
            max_epochs:       None,
            seed:             None,
            resume:           None,
            show_progress:    true,
        }
    }
}

impl TrainConfig {
    fn trainer_options(&self) -> TrainerOptions {
        TrainerOptions {
            batch_size:       self.batch_size,
            early_stop_after: self.early_stop_after,
            learning_rate:    self.learning_rate,
            output_classes:   self.output_classes,
            rnn_units:        self.rnn_units,
            max_epochs:       self.max_epochs,
            show_progress:    self.show_progress,
        }
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<TrainReport> {
        let cfg = &self.config;
        let (train, valid) = self.load_datasets()?;

        fs::create_dir_all(&cfg.output)
            .with_context(|| format!("Cannot create output directory '{}'", cfg.output.display()))?;
        let config_path = cfg.output.join("train_config.json");
        fs::write(&config_path, serde_json::to_string_pretty(cfg)?)
            .with_context(|| format!("Cannot write '{}'", config_path.display()))?;

        let device = burn::backend::wgpu::WgpuDevice::default();
        tracing::info!("Using WGPU device: {:?}", device);

        let mut trainer = Trainer::<TrainBackend, _>::new(
            train,
            valid,
            &cfg.output,
            cfg.trainer_options(),
            optimizer_config().init(),
            device,
        )?;

        if let Some(checkpoint) = &cfg.resume {
            tracing::info!("Resuming from '{}'", checkpoint.display());
            trainer.load(checkpoint)?;
        }

        let report = trainer.train()?;
        tracing::info!(
            "Training finished after {} epochs; best epoch {} (valid_loss={:.4})",
            report.epochs,
            report.best_epoch,
            report.best_valid_loss
        );
        Ok(report)
    }

    fn load_datasets(&self) -> Result<(LineDataset, LineDataset)> {
        let cfg = &self.config;

        tracing::info!("Loading training lines from '{}'", cfg.train_path.display());
        let samples = JsonlLoader::new(&cfg.train_path).load_samples()?;

        let (train, valid) = match &cfg.valid_path {
            Some(path) => {
                tracing::info!("Loading validation lines from '{}'", path.display());
                (samples, JsonlLoader::new(path).load_samples()?)
            }
            None => split_train_valid(
                samples,
                cfg.valid_fraction,
                cfg.seed.unwrap_or(DEFAULT_SPLIT_SEED),
            ),
        };
        tracing::info!("{} training lines, {} validation lines", train.len(), valid.len());

        let mut train = LineDataset::from_samples(train).context("training set is empty")?;
        let valid     = LineDataset::from_samples(valid).context("validation set is empty")?;
        if let Some(seed) = cfg.seed {
            train = train.with_seed(seed);
        }
        Ok((train, valid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{data::loader::LineRecord, domain::traits::LineSource};
    use burn::data::dataset::Dataset;
    use std::io::Write;

    fn write_lines(path: &std::path::Path, count: usize, height: usize) {
        let mut f = fs::File::create(path).unwrap();
        for i in 0..count {
            let record = LineRecord {
                image: vec![vec![i as f32; height]; 1 + i % 3],
                label: Some(i % 4),
            };
            writeln!(f, "{}", serde_json::to_string(&record).unwrap()).unwrap();
        }
    }

    #[test]
    fn test_split_when_no_validation_file() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("train.jsonl");
        write_lines(&path, 50, 3);

        let use_case = TrainUseCase::new(TrainConfig {
            train_path:     path,
            valid_fraction: 0.2,
            seed:           Some(1),
            ..TrainConfig::default()
        });
        let (train, valid) = use_case.load_datasets().unwrap();
        assert_eq!((train.len(), valid.len()), (40, 10));
        assert_eq!(train.line_height(), 3);
    }

    #[test]
    fn test_separate_validation_file() {
        let dir   = tempfile::tempdir().unwrap();
        let train = dir.path().join("train.jsonl");
        let valid = dir.path().join("valid.jsonl");
        write_lines(&train, 12, 2);
        write_lines(&valid, 5, 2);

        let use_case = TrainUseCase::new(TrainConfig {
            train_path: train,
            valid_path: Some(valid),
            ..TrainConfig::default()
        });
        let (train, valid) = use_case.load_datasets().unwrap();
        assert_eq!((train.len(), valid.len()), (12, 5));
    }

    #[test]
    fn test_config_serialises() {
        let json = serde_json::to_string(&TrainConfig::default()).unwrap();
        let back: TrainConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.batch_size, 32);
        assert_eq!(back.early_stop_after, 4);
    }
}
