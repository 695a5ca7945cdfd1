// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// This is the entry point for all user interaction.
// It uses the `clap` crate to parse command line arguments.
// All business logic is delegated to Layer 2 (application).
//
// Commands:
//   1. `prepare`   — builds training and validation folders
//   2. `train`     — trains (or with --resume continues) a model
//   3. `fine-tune` — fine-tunes a model, normalisation frozen
//   4. `predict`   — writes predicted landmarks for every image

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, PredictArgs, PrepareArgs};

use crate::application::train_use_case::{TrainConfig, TrainUseCase};
use crate::domain::training::{EpochLogs, TrainingEvent};

#[derive(Parser, Debug)]
#[command(
    name = "landmark-cnn",
    version = "0.1.0",
    about = "Prepare annotated images, train a landmark CNN, then predict landmarks."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Dispatch to the matching use case.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Prepare(args)  => run_prepare(args),
            Commands::Train(args)    => run_train(args.into()),
            Commands::FineTune(args) => run_train(args.into()),
            Commands::Predict(args)  => run_predict(args),
        }
    }
}

fn run_prepare(args: PrepareArgs) -> Result<()> {
    use crate::application::prepare_use_case::PrepareUseCase;

    let summary = PrepareUseCase::new(args.into()).execute()?;
    println!(
        "Prepared {} training and {} validation images.",
        summary.training_samples, summary.validation_samples
    );
    Ok(())
}

fn run_train(config: TrainConfig) -> Result<()> {
    tracing::info!("Starting {:?} run for model '{}'", config.mode, config.model_name);

    let mut total = 0;
    let report = TrainUseCase::new(config).execute(|event| match event {
        TrainingEvent::Started { total_epochs } => total = *total_epochs,
        TrainingEvent::EpochFinished { epoch, logs, .. } => println!("{}", epoch_line(*epoch, total, logs)),
        TrainingEvent::Finished => {}
    })?;

    println!("Training complete after {} epochs. Model saved.", report.epochs);
    Ok(())
}

fn run_predict(args: PredictArgs) -> Result<()> {
    use crate::application::predict_use_case::PredictUseCase;

    let report = PredictUseCase::new(args.into()).execute()?;
    println!("Predicted {} images into '{}'.", report.images, report.output.display());
    Ok(())
}

/// One progress line: `Epoch   3/100 | mae=4.2100 | val_mae=5.0300`.
fn epoch_line(epoch: usize, total: usize, logs: &EpochLogs) -> String {
    let mut line = format!("Epoch {:>3}/{}", epoch, total);
    for (name, value) in [logs.training_precision(), logs.validation_precision()].into_iter().flatten() {
        line.push_str(&format!(" | {}={:.4}", name, value));
    }
    line
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::train_use_case::TrainMode;

    #[test]
    fn test_epoch_line_prefers_mae() {
        let line = epoch_line(3, 100, &EpochLogs::standard(9.0, 2.5, 10.0, 3.0));
        assert_eq!(line, "Epoch   3/100 | mae=2.5000 | val_mae=3.0000");
    }

    #[test]
    fn test_epoch_line_falls_back_to_loss() {
        let mut logs = EpochLogs::new();
        logs.insert("loss", 1.5);
        assert_eq!(epoch_line(1, 2, &logs), "Epoch   1/2 | mse=1.5000");
    }

    #[test]
    fn test_train_flags() {
        let cli = Cli::parse_from([
            "landmark-cnn", "train", "--resume", "--skip-prepare", "--project", "fish", "--binning", "0", "--epochs", "5",
        ]);
        let Commands::Train(args) = cli.command else { panic!("expected train") };
        let config: TrainConfig = args.into();

        assert_eq!(config.mode, TrainMode::Resume);
        assert!(config.skip_prepare);
        assert_eq!(config.epochs, 5);
        assert_eq!(config.prepare.project_dir, "fish");
        assert_eq!(config.prepare.build.binning, None);
    }

    #[test]
    fn test_fine_tune_mode() {
        let cli = Cli::parse_from(["landmark-cnn", "fine-tune", "--seed", "4"]);
        let Commands::FineTune(args) = cli.command else { panic!("expected fine-tune") };
        let config: TrainConfig = args.into();

        assert_eq!(config.mode, TrainMode::FineTune);
        assert_eq!(config.prepare.seed, Some(4));
        assert_eq!(config.prepare.build.binning, Some(10));
        assert_eq!(config.prepare.build.augmentations, 16);
    }

    #[test]
    fn test_validation_fraction_out_of_range_is_rejected() {
        for value in ["1.5", "-0.1", "NaN"] {
            let parsed = Cli::try_parse_from(["landmark-cnn", "prepare", "--validation-fraction", value]);
            assert!(parsed.is_err(), "{value} accepted");
        }
        assert!(Cli::try_parse_from(["landmark-cnn", "prepare", "--validation-fraction", "0.3"]).is_ok());
    }
}
