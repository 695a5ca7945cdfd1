// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the subcommands `prepare`, `train`, `fine-tune` and
// `predict` and all their configurable flags.
//
// clap's derive macros automatically generate:
//   - help text (--help)
//   - error messages for missing args
//   - type conversion (string → usize, f64, etc.)

use clap::{Args, Subcommand};

use crate::application::{
    predict_use_case::PredictConfig,
    prepare_use_case::PrepareConfig,
    project::PREDICTION_TABLE,
    train_use_case::{TrainConfig, TrainMode},
};
use crate::data::builder::BuildOptions;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build the training and validation folders from the annotated project
    Prepare(PrepareArgs),

    /// Train a new model, or continue training an existing one
    Train(TrainArgs),

    /// Fine-tune an existing model with its normalisation layers frozen
    FineTune(FineTuneArgs),

    /// Predict landmarks for every image of the project
    Predict(PredictArgs),
}

/// Dataset building flags, shared by `prepare`, `train` and `fine-tune`.
#[derive(Args, Debug, Clone)]
pub struct PrepareArgs {
    /// Project folder holding df_files.csv, df_model.csv and df_landmarks.csv
    #[arg(long, default_value = ".")]
    pub project: String,

    /// Augmented copies generated per training image
    #[arg(long, default_value_t = 16)]
    pub augmentations: usize,

    /// Integer downsampling factor; 0 keeps full resolution
    #[arg(long, default_value_t = 10)]
    pub binning: u32,

    /// Share of the annotated images held out for validation
    #[arg(long, default_value_t = 0.2, value_parser = parse_fraction)]
    pub validation_fraction: f64,

    /// Do not divide binned images by their positive mean
    #[arg(long)]
    pub no_normalize: bool,

    /// Seed for a reproducible split and augmentation
    #[arg(long)]
    pub seed: Option<u64>,
}

fn parse_fraction(s: &str) -> Result<f64, String> {
    let value: f64 = s.parse().map_err(|e| format!("{e}"))?;
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("{value} is not in [0, 1]"))
    }
}

/// Convert CLI PrepareArgs into the application-layer PrepareConfig.
impl From<PrepareArgs> for PrepareConfig {
    fn from(a: PrepareArgs) -> Self {
        PrepareConfig {
            project_dir: a.project,
            build: BuildOptions {
                augmentations:       a.augmentations,
                binning:             (a.binning > 0).then_some(a.binning),
                validation_fraction: a.validation_fraction,
                normalize:           !a.no_normalize,
                ..BuildOptions::default()
            },
            seed: a.seed,
        }
    }
}

/// Flags common to every training run.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Name of the model inside <project>/models
    #[arg(long, default_value = "landmark_model")]
    pub model: String,

    /// Number of full passes through the training data
    #[arg(long, default_value_t = 100)]
    pub epochs: usize,

    /// Number of images processed together in one step
    #[arg(long, default_value_t = 16)]
    pub batch_size: usize,

    /// Save the retained snapshot every N epochs (0 disables)
    #[arg(long, default_value_t = 10)]
    pub save_frequency: usize,

    /// Reuse the existing training and validation folders
    #[arg(long)]
    pub skip_prepare: bool,

    #[command(flatten)]
    pub prepare: PrepareArgs,
}

impl RunArgs {
    fn into_config(self, mode: TrainMode) -> TrainConfig {
        TrainConfig {
            model_name:     self.model,
            mode,
            epochs:         self.epochs,
            batch_size:     self.batch_size,
            save_frequency: self.save_frequency,
            skip_prepare:   self.skip_prepare,
            prepare:        self.prepare.into(),
        }
    }
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Continue training the saved model instead of starting over
    #[arg(long)]
    pub resume: bool,

    #[command(flatten)]
    pub run: RunArgs,
}

impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        let mode = if a.resume { TrainMode::Resume } else { TrainMode::Scratch };
        a.run.into_config(mode)
    }
}

#[derive(Args, Debug)]
pub struct FineTuneArgs {
    #[command(flatten)]
    pub run: RunArgs,
}

impl From<FineTuneArgs> for TrainConfig {
    fn from(a: FineTuneArgs) -> Self {
        a.run.into_config(TrainMode::FineTune)
    }
}

#[derive(Args, Debug)]
pub struct PredictArgs {
    /// Project folder holding df_files.csv and df_model.csv
    #[arg(long, default_value = ".")]
    pub project: String,

    /// Name of the model inside <project>/models
    #[arg(long, default_value = "landmark_model")]
    pub model: String,

    /// Output table, relative to the project folder
    #[arg(long, default_value = PREDICTION_TABLE)]
    pub output: String,

    /// Do not divide images by their positive mean
    #[arg(long)]
    pub no_normalize: bool,
}

impl From<PredictArgs> for PredictConfig {
    fn from(a: PredictArgs) -> Self {
        PredictConfig {
            project_dir: a.project,
            model_name:  a.model,
            output:      a.output,
            normalize:   !a.no_normalize,
        }
    }
}
