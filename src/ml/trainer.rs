// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Runs epochs until early stopping fires:
//
//   loop {
//       train epoch      shuffle, reset accuracy, forward + backward per batch
//       validate         same batching, no backward, inner backend
//       checkpoint       <output>/model/<epoch>.ckpt
//       early stop?      best valid epoch + patience < epochs
//   }
//
// Epoch numbers continue after the latest epoch already recorded
// in <output>/model, so resuming into the same output directory
// never overwrites earlier checkpoints or metrics rows.
//
// Batches are cut by exact batch-size stride; a trailing partial
// batch is dropped. Epoch loss is the batch-size weighted sum of
// batch losses divided by batch_count * batch_size, i.e. by the
// number of lines actually evaluated.
//
// Key burn points:
//   - Training uses the AutodiffBackend model for gradients
//   - model.valid() returns the same weights on B::InnerBackend
//   - the optimizer consumes the model and hands back the update

use anyhow::{ensure, Result};
use burn::{
    module::AutodiffModule,
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::data::{
    batcher::{LineBatch, LineBatcher, PADDING_VALUE},
    dataset::LineDataset,
};
use crate::domain::traits::LineSource;
use crate::infra::{
    checkpoint::{self, CheckpointManager},
    metrics::{EpochMetrics, MetricsLogger, SummaryWriter},
    progress::ProgressBar,
};
use crate::ml::{
    accuracy::StreamingAccuracy,
    history::History,
    model::{loss_value, predicted_classes, ScriptModel, ScriptModelConfig, LEARNING_RATE},
};

pub type TrainBackend = burn::backend::Autodiff<burn::backend::Wgpu>;

/// Adam with the epsilon TF-style trainers use.
pub fn optimizer_config() -> AdamConfig {
    AdamConfig::new().with_epsilon(1e-8)
}

/// Number of full batches in `len` samples.
pub fn batch_count(len: usize, batch_size: usize) -> usize {
    len / batch_size
}

// ─── Options ──────────────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct TrainerOptions {
    pub batch_size:       usize,
    /// Epochs without a new best validation loss before stopping
    pub early_stop_after: usize,
    pub learning_rate:    f64,
    pub output_classes:   usize,
    pub rnn_units:        usize,
    /// Hard cap on epochs, on top of early stopping
    pub max_epochs:       Option<usize>,
    pub show_progress:    bool,
}

impl Default for TrainerOptions {
    fn default() -> Self {
        Self {
            batch_size:       32,
            early_stop_after: 4,
            learning_rate:    LEARNING_RATE,
            output_classes:   4,
            rnn_units:        100,
            max_epochs:       None,
            show_progress:    true,
        }
    }
}

// ─── Results ──────────────────────────────────────────────────────────────────
/// Outcome of one pass over a dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct EpochSummary {
    pub loss:     f64,
    pub accuracy: f64,
    pub batches:  usize,
    /// Lines evaluated: batches * batch_size
    pub examples: usize,
}

#[derive(Debug, Clone)]
pub struct TrainReport {
    pub epochs:          usize,
    pub best_epoch:      usize,
    pub best_valid_loss: f64,
    pub best_checkpoint: PathBuf,
}

/// Batch-size weighted running loss for one epoch.
#[derive(Debug, Clone)]
struct EpochLoss {
    sum:        f64,
    batches:    usize,
    batch_size: usize,
}

impl EpochLoss {
    fn new(batch_size: usize) -> Self {
        Self { sum: 0.0, batches: 0, batch_size }
    }

    fn add(&mut self, batch_loss: f64) {
        self.sum     += batch_loss * self.batch_size as f64;
        self.batches += 1;
    }

    fn examples(&self) -> usize {
        self.batches * self.batch_size
    }

    fn value(&self) -> f64 {
        self.sum / self.examples() as f64
    }
}

// ─── Trainer ──────────────────────────────────────────────────────────────────
/// Owns the model, its device and optimizer state, both datasets,
/// and everything written under the output directory.
pub struct Trainer<B, O, D = LineDataset>
where
    B: AutodiffBackend,
{
    model:         ScriptModel<B>,
    config:        ScriptModelConfig,
    optim:         O,
    device:        B::Device,
    options:       TrainerOptions,
    train_data:    D,
    valid_data:    D,
    checkpoints:   CheckpointManager,
    train_summary: SummaryWriter,
    valid_summary: SummaryWriter,
    metrics:       MetricsLogger,
    accuracy:      StreamingAccuracy,
    history:       History,
    /// Number given to the first epoch of this run
    first_epoch:   usize,
}

impl<B, O, D> Trainer<B, O, D>
where
    B: AutodiffBackend,
    O: Optimizer<ScriptModel<B>, B>,
    D: LineSource,
{
    /// Build a freshly initialised model sized to the datasets' line
    /// height. Both datasets must share that height.
    pub fn new(
        train_data: D,
        valid_data: D,
        output:     impl AsRef<Path>,
        options:    TrainerOptions,
        optim:      O,
        device:     B::Device,
    ) -> Result<Self> {
        ensure!(
            train_data.line_height() == valid_data.line_height(),
            "train line height {} != valid line height {}",
            train_data.line_height(),
            valid_data.line_height()
        );
        ensure!(options.batch_size > 0, "batch size must be positive");

        let output = output.as_ref();
        let config = ScriptModelConfig::new(train_data.line_height())
            .with_output_classes(options.output_classes)
            .with_rnn_units(options.rnn_units);
        let model: ScriptModel<B> = config.init(&device);
        info!(
            "Model ready: line_height={}, rnn_units={}, classes={}, {} parameters",
            config.line_height,
            config.rnn_units,
            config.output_classes,
            model.num_params()
        );

        model.save_graph_summary(output.join("summary"))?;
        let checkpoints = CheckpointManager::new(output)?;
        let first_epoch = checkpoints.latest_epoch()?.map_or(0, |latest| latest + 1);
        if first_epoch > 0 {
            info!("Output directory already has checkpoints, numbering epochs from {first_epoch}");
        }

        Ok(Self {
            model,
            config,
            optim,
            device,
            options,
            train_data,
            valid_data,
            checkpoints,
            train_summary: SummaryWriter::new(output.join("train"))?,
            valid_summary: SummaryWriter::new(output.join("valid"))?,
            metrics:       MetricsLogger::new(output)?,
            accuracy:      StreamingAccuracy::new(),
            history:       History::new(),
            first_epoch,
        })
    }

    /// Train until `early_stop_after` epochs pass without a new best
    /// validation loss (or `max_epochs` is reached).
    pub fn train(&mut self) -> Result<TrainReport> {
        self.train_with(|t| Ok((t.train_epoch()?, t.validate()?)))
    }

    /// The epoch loop. `run_epoch` performs one training epoch plus
    /// one validation pass and records both losses in the history.
    fn train_with<F>(&mut self, mut run_epoch: F) -> Result<TrainReport>
    where
        F: FnMut(&mut Self) -> Result<(EpochSummary, EpochSummary)>,
    {
        loop {
            let (train, valid) = run_epoch(self)?;
            ensure!(
                self.history.is_balanced(),
                "train history has {} epochs but valid history has {}",
                self.history.train().len(),
                self.history.valid().len()
            );

            let epochs_run = self.history.valid().len();
            let epoch      = self.first_epoch + epochs_run - 1;
            let path       = self.checkpoints.checkpoint_path(epoch);
            self.save(&path)?;
            self.checkpoints.mark_latest(epoch)?;
            if matches!(self.history.best_valid(), Some((best, _)) if best + 1 == epochs_run) {
                self.checkpoints.mark_best(epoch)?;
            }

            self.metrics.log(&EpochMetrics {
                epoch,
                train_loss: train.loss,
                valid_loss: valid.loss,
                train_acc:  train.accuracy,
                valid_acc:  valid.accuracy,
            })?;
            info!(
                "Epoch {:>3} | train_loss={:.4} | valid_loss={:.4} | train_acc={:.1}% | valid_acc={:.1}%",
                epoch,
                train.loss,
                valid.loss,
                train.accuracy * 100.0,
                valid.accuracy * 100.0,
            );

            if self.history.should_stop(self.options.early_stop_after) {
                info!("No improvement for {} epochs, stopping", self.options.early_stop_after);
                break;
            }
            if self.options.max_epochs.is_some_and(|max| epochs_run >= max) {
                info!("Reached the epoch limit, stopping");
                break;
            }
        }

        let (best, best_valid_loss) = self
            .history
            .best_valid()
            .ok_or_else(|| anyhow::anyhow!("training finished without a validation pass"))?;
        let best_epoch = self.first_epoch + best;

        Ok(TrainReport {
            epochs: self.history.valid().len(),
            best_epoch,
            best_valid_loss,
            best_checkpoint: self.checkpoints.checkpoint_path(best_epoch),
        })
    }

    /// One shuffled pass over the training set with parameter updates.
    pub fn train_epoch(&mut self) -> Result<EpochSummary> {
        self.train_data.shuffle();
        self.accuracy.reset();

        let batch_size = self.options.batch_size;
        let batches    = batch_count(self.train_data.len(), batch_size);
        ensure!(
            batches > 0,
            "training set has {} lines, fewer than one batch of {batch_size}",
            self.train_data.len()
        );

        let batcher  = LineBatcher::<B>::new(self.device.clone());
        let progress = self.progress_bar(batches, "train");
        let mut epoch_loss = EpochLoss::new(batch_size);
        let mut acc_str    = String::new();

        for batch_id in 0..batches {
            let start  = batch_id * batch_size;
            let batch  = LineBatch::from_range(&self.train_data, start, start + batch_size, PADDING_VALUE)?;
            let inputs = batcher.tensors(&batch);

            let output = self.model.forward_loss(inputs.images, inputs.widths, inputs.labels);
            let loss   = loss_value(output.loss.clone());
            self.accuracy.update(&predicted_classes(output.logits)?, &batch.labels);

            // Backward pass + optimizer update
            let grads = output.loss.backward();
            let grads = GradientsParams::from_grads(grads, &self.model);
            self.model = self.optim.step(self.options.learning_rate, self.model.clone(), grads);

            epoch_loss.add(loss);
            let acc = self.accuracy.value();
            self.train_summary.add_scalars(loss, acc)?;
            acc_str = format!("acc={acc:.2}");
            progress.show(batch_id, &acc_str);
        }

        let loss = epoch_loss.value();
        self.history.push_train(loss);
        progress.total(&format!("{acc_str} loss={loss:.2}"));

        Ok(EpochSummary {
            loss,
            accuracy: self.accuracy.value(),
            batches,
            examples: epoch_loss.examples(),
        })
    }

    /// One pass over the validation set, no parameter updates.
    pub fn validate(&mut self) -> Result<EpochSummary> {
        self.accuracy.reset();

        let batch_size = self.options.batch_size;
        let batches    = batch_count(self.valid_data.len(), batch_size);
        ensure!(
            batches > 0,
            "validation set has {} lines, fewer than one batch of {batch_size}",
            self.valid_data.len()
        );

        let model    = self.model.valid();
        let batcher  = LineBatcher::<B::InnerBackend>::new(self.device.clone());
        let progress = self.progress_bar(batches, "valid");
        let mut epoch_loss = EpochLoss::new(batch_size);
        let mut acc_str    = String::new();

        for batch_id in 0..batches {
            let start  = batch_id * batch_size;
            let batch  = LineBatch::from_range(&self.valid_data, start, start + batch_size, PADDING_VALUE)?;
            let inputs = batcher.tensors(&batch);

            let output = model.forward_loss(inputs.images, inputs.widths, inputs.labels);
            let loss   = loss_value(output.loss);
            self.accuracy.update(&predicted_classes(output.logits)?, &batch.labels);

            epoch_loss.add(loss);
            let acc = self.accuracy.value();
            self.valid_summary.add_scalars(loss, acc)?;
            acc_str = format!("acc={acc:.2}");
            progress.show(batch_id, &acc_str);
        }

        let loss = epoch_loss.value();
        self.history.push_valid(loss);
        progress.total(&format!("{acc_str} loss={loss:.2}"));

        Ok(EpochSummary {
            loss,
            accuracy: self.accuracy.value(),
            batches,
            examples: epoch_loss.examples(),
        })
    }

    /// Write the parameters and the model config next to each other.
    pub fn save(&self, checkpoint: &Path) -> Result<()> {
        checkpoint::save_model(&self.model, &self.config, checkpoint)
    }

    /// Replace the current parameters with a stored checkpoint.
    /// Fails when the checkpoint was written for a different model
    /// shape. Optimizer state and loss history are not restored.
    pub fn load(&mut self, checkpoint: &Path) -> Result<()> {
        let stored = checkpoint::load_config_for(checkpoint)?;
        checkpoint::ensure_compatible(&stored, &self.config)?;
        self.model = checkpoint::load_model(self.model.clone(), checkpoint, &self.device)?;
        Ok(())
    }

    #[cfg(test)]
    pub fn model(&self) -> &ScriptModel<B> {
        &self.model
    }

    #[cfg(test)]
    pub fn history(&self) -> &History {
        &self.history
    }

    fn progress_bar(&self, total: usize, name: &str) -> ProgressBar {
        if self.options.show_progress {
            ProgressBar::new(total, name)
        } else {
            ProgressBar::hidden(total, name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::line::{LineImage, Sample},
        TestAutodiffBackend,
    };
    use anyhow::Context;
    use burn::data::dataloader::batcher::Batcher;

    fn dataset(len: usize, height: usize) -> LineDataset {
        let samples = (0..len)
            .map(|i| {
                let label  = i % 2;
                let width  = 2 + i % 5;
                let pixels = (0..width * height)
                    .map(|p| if label == 0 { 0.1 * p as f32 } else { -0.1 * p as f32 })
                    .collect();
                Sample::new(LineImage::new(width, height, pixels).unwrap(), label)
            })
            .collect();
        LineDataset::new(samples, height).unwrap().with_seed(11)
    }

    fn options() -> TrainerOptions {
        TrainerOptions {
            batch_size:     32,
            output_classes: 2,
            rnn_units:      6,
            show_progress:  false,
            ..TrainerOptions::default()
        }
    }

    fn trainer(
        train: LineDataset,
        valid: LineDataset,
        output: &Path,
        options: TrainerOptions,
    ) -> Result<Trainer<TestAutodiffBackend, impl Optimizer<ScriptModel<TestAutodiffBackend>, TestAutodiffBackend>>> {
        Trainer::new(train, valid, output, options, optimizer_config().init(), Default::default())
    }

    #[test]
    fn test_batch_count_drops_partial_batch() {
        assert_eq!(batch_count(100, 32), 3);
        assert_eq!(batch_count(96, 32), 3);
        assert_eq!(batch_count(31, 32), 0);
    }

    #[test]
    fn test_epoch_loss_divides_by_evaluated_examples() {
        let mut loss = EpochLoss::new(32);
        for batch_loss in [1.0, 2.0, 3.0] {
            loss.add(batch_loss);
        }
        assert_eq!(loss.examples(), 96);
        assert!((loss.value() - (32.0 + 64.0 + 96.0) / 96.0).abs() < 1e-12);
    }

    #[test]
    fn test_epoch_uses_three_full_batches_of_hundred() {
        let dir = tempfile::tempdir().unwrap();
        let mut t = trainer(dataset(100, 3), dataset(40, 3), dir.path(), options()).unwrap();

        let summary = t.train_epoch().unwrap();
        assert_eq!(summary.batches, 3);
        assert_eq!(summary.examples, 96);
        assert_eq!(t.accuracy.total(), 96);
        assert_eq!(t.history().train().len(), 1);
        assert!(summary.loss.is_finite());

        let valid = t.validate().unwrap();
        assert_eq!((valid.batches, valid.examples), (1, 32));
        assert!(t.history().is_balanced());
    }

    #[test]
    fn test_mismatched_line_height_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(trainer(dataset(40, 3), dataset(40, 4), dir.path(), options()).is_err());
    }

    #[test]
    fn test_too_small_dataset_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut t = trainer(dataset(10, 3), dataset(40, 3), dir.path(), options()).unwrap();
        assert!(t.train_epoch().is_err());
    }

    #[test]
    fn test_train_writes_checkpoints_and_logs() {
        let dir = tempfile::tempdir().unwrap();
        let opts = TrainerOptions { early_stop_after: 0, ..options() };
        let mut t = trainer(dataset(64, 3), dataset(32, 3), dir.path(), opts).unwrap();

        // With zero patience the first epoch is already "stale".
        let report = t.train().unwrap();
        assert_eq!(report.epochs, 1);
        assert_eq!(report.best_epoch, 0);
        assert_eq!(report.best_checkpoint, dir.path().join("model").join("0.ckpt"));
        assert!(report.best_checkpoint.exists());
        assert!(dir.path().join("model").join("0.json").exists());
        assert!(dir.path().join("summary").join("graph.txt").exists());

        let metrics = std::fs::read_to_string(dir.path().join("metrics.csv")).unwrap();
        assert_eq!(metrics.lines().count(), 2);
        let events = std::fs::read_to_string(dir.path().join("train").join("events.csv")).unwrap();
        assert_eq!(events.lines().count(), 1 + 2);
    }

    #[test]
    fn test_max_epochs_caps_training() {
        let dir = tempfile::tempdir().unwrap();
        let opts = TrainerOptions { early_stop_after: 100, max_epochs: Some(2), ..options() };
        let mut t = trainer(dataset(32, 3), dataset(32, 3), dir.path(), opts).unwrap();
        assert_eq!(t.train().unwrap().epochs, 2);
        assert!(dir.path().join("model").join("1.ckpt").exists());
    }

    #[test]
    fn test_load_restores_saved_parameters() {
        let dir = tempfile::tempdir().unwrap();
        let mut t = trainer(dataset(32, 3), dataset(32, 3), dir.path(), options()).unwrap();
        let path = dir.path().join("model").join("snapshot.ckpt");
        t.save(&path).unwrap();

        let line   = LineImage::new(4, 3, vec![0.3; 12]).unwrap();
        let before = logits(t.model(), &line);
        t.train_epoch().unwrap();
        assert_ne!(logits(t.model(), &line), before);

        t.load(&path).unwrap();
        assert_eq!(logits(t.model(), &line), before);
    }

    /// Epoch runner that replays fixed validation losses instead of
    /// touching the model.
    fn replay<O>(losses: &[f64]) -> impl FnMut(&mut Trainer<TestAutodiffBackend, O>) -> Result<(EpochSummary, EpochSummary)> + '_
    where
        O: Optimizer<ScriptModel<TestAutodiffBackend>, TestAutodiffBackend>,
    {
        let mut losses = losses.iter().copied();
        move |t| {
            let loss = losses.next().context("loop ran past the replayed losses")?;
            t.history.push_train(loss);
            t.history.push_valid(loss);
            let summary = EpochSummary { loss, accuracy: 0.5, batches: 1, examples: 32 };
            Ok((summary.clone(), summary))
        }
    }

    #[test]
    fn test_loop_stops_once_patience_is_exceeded() {
        let dir  = tempfile::tempdir().unwrap();
        let opts = TrainerOptions { early_stop_after: 4, ..options() };
        let mut t = trainer(dataset(32, 3), dataset(32, 3), dir.path(), opts).unwrap();

        // Best is epoch 1; epochs 2..=5 fail to beat it, so the loop
        // ends after epoch 5 and never asks for the trailing 1.0.
        let report = t.train_with(replay(&[5.0, 4.0, 6.0, 7.0, 8.0, 9.0, 1.0])).unwrap();
        assert_eq!(report.epochs, 6);
        assert_eq!(report.best_epoch, 1);
        assert_eq!(report.best_valid_loss, 4.0);

        let model_dir = dir.path().join("model");
        assert!(model_dir.join("5.ckpt").exists());
        assert!(!model_dir.join("6.ckpt").exists());
        assert_eq!(std::fs::read_to_string(model_dir.join("best_epoch.json")).unwrap(), "1");
        assert_eq!(std::fs::read_to_string(model_dir.join("latest_epoch.json")).unwrap(), "5");
    }

    #[test]
    fn test_loop_continues_while_validation_improves() {
        let dir  = tempfile::tempdir().unwrap();
        let opts = TrainerOptions { early_stop_after: 2, ..options() };
        let mut t = trainer(dataset(32, 3), dataset(32, 3), dir.path(), opts).unwrap();

        let report = t.train_with(replay(&[5.0, 6.0, 4.0, 4.5, 3.0, 3.5, 3.2, 9.0])).unwrap();
        assert_eq!(report.epochs, 7);
        assert_eq!(report.best_epoch, 4);
    }

    #[test]
    fn test_rerun_continues_epoch_numbering() {
        let dir  = tempfile::tempdir().unwrap();
        let opts = TrainerOptions { max_epochs: Some(2), early_stop_after: 100, ..options() };

        let mut first = trainer(dataset(32, 3), dataset(32, 3), dir.path(), opts.clone()).unwrap();
        first.train_with(replay(&[3.0, 2.0])).unwrap();

        let mut second = trainer(dataset(32, 3), dataset(32, 3), dir.path(), opts).unwrap();
        second.load(&dir.path().join("model").join("1.ckpt")).unwrap();
        let report = second.train_with(replay(&[1.5, 1.0])).unwrap();
        assert_eq!(report.best_epoch, 3);
        assert_eq!(report.best_checkpoint, dir.path().join("model").join("3.ckpt"));

        let metrics = std::fs::read_to_string(dir.path().join("metrics.csv")).unwrap();
        let epochs: Vec<&str> = metrics.lines().skip(1).map(|l| l.split(',').next().unwrap()).collect();
        assert_eq!(epochs, vec!["0", "1", "2", "3"]);
    }

    #[test]
    fn test_load_rejects_checkpoint_of_other_shape() {
        let dir = tempfile::tempdir().unwrap();
        let small = trainer(dataset(32, 3), dataset(32, 3), dir.path(), options()).unwrap();
        let path  = dir.path().join("model").join("0.ckpt");
        small.save(&path).unwrap();

        let opts = TrainerOptions { rnn_units: 8, ..options() };
        let mut large = trainer(dataset(32, 3), dataset(32, 3), dir.path(), opts).unwrap();
        assert!(large.load(&path).is_err());
    }

    fn logits(model: &ScriptModel<TestAutodiffBackend>, line: &LineImage) -> Vec<f32> {
        let model = model.valid();
        let t = LineBatcher::new(Default::default()).batch(vec![Sample::new(line.clone(), 0)]);
        model
            .forward(t.images, t.widths)
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .unwrap()
    }
}
