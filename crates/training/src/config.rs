use crate::losses::LossWeights;
use crate::trainer::TrainSettings;
use anyhow::Context;
use clap::{Parser, ValueEnum};
use models::SfsNetConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Config file picked up from the working directory when nothing else is given.
pub const DEFAULT_CONFIG_FILE: &str = "sfsnet-train.toml";
/// Environment variable naming a config file.
pub const CONFIG_ENV: &str = "SFSNET_TRAIN_CONFIG";

#[derive(ValueEnum, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    NdArray,
    Wgpu,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "train",
    about = "Train SfsNet on labeled synthetic faces and unlabeled CelebA faces"
)]
pub struct TrainArgs {
    /// Synthetic dataset root containing train.csv, test.csv, train/ and test/.
    #[arg(long, default_value = "data/synthetic")]
    pub syn_data: PathBuf,
    /// CelebA root containing train.csv and test.csv.
    #[arg(long, default_value = "data/celeba")]
    pub celeba_data: PathBuf,
    /// Batch size for every loader.
    #[arg(long, default_value_t = 10)]
    pub batch_size: usize,
    /// Number of epochs.
    #[arg(long, default_value_t = 10)]
    pub epochs: usize,
    /// Output directory for checkpoints, images and metrics.
    #[arg(long, default_value = "./results/metadata/")]
    pub log_path: PathBuf,
    /// Backend to use (ndarray or wgpu if enabled).
    #[arg(long, value_enum, default_value_t = BackendKind::NdArray)]
    pub backend: BackendKind,
    /// Learning rate.
    #[arg(long, default_value_t = 0.01)]
    pub lr: f64,
    /// Adam weight decay.
    #[arg(long, default_value_t = 0.005)]
    pub weight_decay: f32,
    /// Side length images are resized to.
    #[arg(long, default_value_t = 128)]
    pub image_size: u32,
    /// Percent of each training CSV held out for validation.
    #[arg(long, default_value_t = 10)]
    pub validation_percent: u32,
    /// Seed for validation splits and shuffling.
    #[arg(long, default_value_t = 0)]
    pub seed: u64,
    /// SfsNet trunk width (overrides the config file).
    #[arg(long)]
    pub hidden: Option<usize>,
    /// TOML file with loss weights, schedule and model settings.
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "eval",
    about = "Evaluate an SfsNet checkpoint on the synthetic and CelebA test splits"
)]
pub struct EvalArgs {
    #[arg(long, default_value = "data/synthetic")]
    pub syn_data: PathBuf,
    #[arg(long, default_value = "data/celeba")]
    pub celeba_data: PathBuf,
    /// Checkpoint to load; a fresh model is used when missing or unreadable.
    #[arg(long)]
    pub checkpoint: Option<PathBuf>,
    /// Where evaluation images and metrics go.
    #[arg(long, default_value = "./results/eval/")]
    pub out_dir: PathBuf,
    #[arg(long, value_enum, default_value_t = BackendKind::NdArray)]
    pub backend: BackendKind,
    #[arg(long, default_value_t = 10)]
    pub batch_size: usize,
    #[arg(long, default_value_t = 128)]
    pub image_size: u32,
    #[arg(long)]
    pub hidden: Option<usize>,
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// How often the driver validates and tests, in epochs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Schedule {
    pub val_every: usize,
    pub test_every: usize,
}

impl Default for Schedule {
    fn default() -> Self {
        Self {
            val_every: 1,
            test_every: 5,
        }
    }
}

/// Optional TOML overrides; every section and key may be omitted.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub loss: LossWeights,
    pub schedule: Schedule,
    pub model: SfsNetConfig,
}

impl ConfigFile {
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("failed to parse config {}", path.display()))
    }

    /// Load `explicit`, else the file named by `SFSNET_TRAIN_CONFIG`, else
    /// `sfsnet-train.toml` if present, else defaults.
    pub fn discover(explicit: Option<&Path>) -> anyhow::Result<Self> {
        if let Some(path) = explicit {
            return Self::from_path(path);
        }
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Self::from_path(Path::new(&path));
        }
        let fallback = Path::new(DEFAULT_CONFIG_FILE);
        if fallback.is_file() {
            return Self::from_path(fallback);
        }
        Ok(Self::default())
    }
}

/// Fully resolved settings of one training run; written to `config.json`.
#[derive(Debug, Clone, Serialize)]
pub struct RunConfig {
    pub syn_data: PathBuf,
    pub celeba_data: PathBuf,
    pub log_path: PathBuf,
    pub backend: BackendKind,
    pub batch_size: usize,
    pub epochs: usize,
    pub learning_rate: f64,
    pub weight_decay: f32,
    pub image_size: u32,
    pub validation_percent: u32,
    pub seed: u64,
    pub loss: LossWeights,
    pub schedule: Schedule,
    pub model: SfsNetConfig,
}

impl RunConfig {
    pub fn resolve(args: &TrainArgs, file: ConfigFile) -> Self {
        let mut model = file.model;
        if let Some(hidden) = args.hidden {
            model.hidden = hidden;
        }
        Self {
            syn_data: args.syn_data.clone(),
            celeba_data: args.celeba_data.clone(),
            log_path: args.log_path.clone(),
            backend: args.backend,
            batch_size: args.batch_size.max(1),
            epochs: args.epochs,
            learning_rate: args.lr,
            weight_decay: args.weight_decay,
            image_size: args.image_size.max(1),
            validation_percent: args.validation_percent.min(100),
            seed: args.seed,
            loss: file.loss,
            schedule: Schedule {
                val_every: file.schedule.val_every.max(1),
                test_every: file.schedule.test_every.max(1),
            },
            model,
        }
    }

    pub fn settings(&self) -> TrainSettings {
        TrainSettings {
            epochs: self.epochs,
            learning_rate: self.learning_rate,
            weights: self.loss,
            val_every: self.schedule.val_every,
            test_every: self.schedule.test_every,
        }
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
    }
}
