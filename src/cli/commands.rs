// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// The `train` and `script` subcommands and their flags. Each
// args struct converts into its application-layer config, so
// Layer 2 never sees clap types.

use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::application::{script_use_case::ScriptConfig, train_use_case::TrainConfig};
use crate::ml::model::LEARNING_RATE;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train the classifier until validation loss stops improving
    Train(TrainArgs),

    /// Classify line images with a trained checkpoint
    Script(ScriptArgs),
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    /// JSON Lines file of labelled training lines
    #[arg(long)]
    pub train: PathBuf,

    /// JSON Lines file of labelled validation lines
    #[arg(long, conflicts_with = "valid_fraction")]
    pub valid: Option<PathBuf>,

    /// Share of the training lines held out for validation when
    /// no validation file is given
    #[arg(long, default_value_t = 0.2)]
    pub valid_fraction: f64,

    /// Run directory for checkpoints, summaries and metrics
    #[arg(long, default_value = "runs/script")]
    pub output: PathBuf,

    #[arg(long, default_value_t = 32)]
    pub batch_size: usize,

    /// Stop once this many epochs pass without a new best validation loss
    #[arg(long, default_value_t = 4)]
    pub early_stop_after: usize,

    #[arg(long, default_value_t = LEARNING_RATE)]
    pub learning_rate: f64,

    /// Hidden size of the recurrent layer
    #[arg(long, default_value_t = 100)]
    pub rnn_units: usize,

    #[arg(long, default_value_t = 4)]
    pub output_classes: usize,

    /// Hard upper bound on the number of epochs
    #[arg(long)]
    pub max_epochs: Option<usize>,

    /// Seed for the validation split and the per-epoch shuffle
    #[arg(long)]
    pub seed: Option<u64>,

    /// Checkpoint to continue training from
    #[arg(long)]
    pub resume: Option<PathBuf>,

    /// Hide the per-batch progress bar
    #[arg(long)]
    pub no_progress: bool,
}

impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            train_path:       a.train,
            valid_path:       a.valid,
            valid_fraction:   a.valid_fraction,
            output:           a.output,
            batch_size:       a.batch_size,
            early_stop_after: a.early_stop_after,
            learning_rate:    a.learning_rate,
            rnn_units:        a.rnn_units,
            output_classes:   a.output_classes,
            max_epochs:       a.max_epochs,
            seed:             a.seed,
            resume:           a.resume,
            show_progress:    !a.no_progress,
        }
    }
}

#[derive(Args, Debug)]
pub struct ScriptArgs {
    /// JSON Lines file of lines to classify; labels are optional
    #[arg(long)]
    pub lines: PathBuf,

    /// Pixel height every line was normalised to
    #[arg(long)]
    pub line_height: usize,

    /// Checkpoint file to load
    #[arg(long, conflicts_with = "output")]
    pub checkpoint: Option<PathBuf>,

    /// Run directory whose best checkpoint should be used
    #[arg(long, default_value = "runs/script")]
    pub output: PathBuf,
}

impl From<ScriptArgs> for ScriptConfig {
    fn from(a: ScriptArgs) -> Self {
        ScriptConfig {
            lines_path:  a.lines,
            line_height: a.line_height,
            checkpoint:  a.checkpoint,
            output:      a.output,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;

    #[test]
    fn test_train_defaults() {
        let cli = Cli::try_parse_from(["script-detect", "train", "--train", "t.jsonl"]).unwrap();
        let Commands::Train(args) = cli.command else { panic!("expected train") };
        let cfg: TrainConfig = args.into();
        assert_eq!(cfg.batch_size, 32);
        assert_eq!(cfg.early_stop_after, 4);
        assert_eq!(cfg.rnn_units, 100);
        assert_eq!(cfg.output_classes, 4);
        assert!((cfg.learning_rate - 1e-4).abs() < 1e-12);
        assert!(cfg.show_progress);
    }

    #[test]
    fn test_valid_and_fraction_conflict() {
        let res = Cli::try_parse_from([
            "script-detect", "train", "--train", "t.jsonl", "--valid", "v.jsonl", "--valid-fraction", "0.3",
        ]);
        assert!(res.is_err());
    }

    #[test]
    fn test_script_requires_line_height() {
        assert!(Cli::try_parse_from(["script-detect", "script", "--lines", "l.jsonl"]).is_err());
        let cli = Cli::try_parse_from([
            "script-detect", "script", "--lines", "l.jsonl", "--line-height", "32", "--checkpoint", "m/3.ckpt",
        ])
        .unwrap();
        let Commands::Script(args) = cli.command else { panic!("expected script") };
        let cfg: ScriptConfig = args.into();
        assert_eq!(cfg.line_height, 32);
        assert_eq!(cfg.checkpoint, Some(PathBuf::from("m/3.ckpt")));
    }
}
