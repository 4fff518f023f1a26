// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Entry point for all user interaction. Arguments are parsed
// with `clap`; everything else is delegated to Layer 2.
//
// Two commands are supported:
//   1. `train`  — trains the line classifier with early stopping
//   2. `script` — classifies lines with a trained checkpoint

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, ScriptArgs, TrainArgs};

#[derive(Parser, Debug)]
#[command(
    name = "script-detect",
    version,
    about = "Train an RNN that tells which script a text line image is written in."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Route the subcommand to its use case.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)  => run_train(args),
            Commands::Script(args) => run_script(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    tracing::info!("Starting training on: {}", args.train.display());
    let report = TrainUseCase::new(args.into()).execute()?;

    println!(
        "Training complete after {} epochs. Best epoch {} (valid loss {:.4}): {}",
        report.epochs,
        report.best_epoch,
        report.best_valid_loss,
        report.best_checkpoint.display()
    );
    Ok(())
}

fn run_script(args: ScriptArgs) -> Result<()> {
    use crate::application::script_use_case::ScriptUseCase;

    let report = ScriptUseCase::new(args.into()).execute()?;
    println!("Checkpoint: {}", report.checkpoint.display());

    for r in &report.results {
        match r.label {
            Some(label) => println!(
                "{}\t{}\t{:.3}\t(label {})",
                r.index,
                r.prediction.class,
                r.prediction.confidence(),
                label
            ),
            None => println!("{}\t{}\t{:.3}", r.index, r.prediction.class, r.prediction.confidence()),
        }
    }
    if let Some(accuracy) = report.accuracy {
        println!("\nAccuracy: {:.4}", accuracy);
    }
    Ok(())
}
