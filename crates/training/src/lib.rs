#![recursion_limit = "256"]

pub mod config;
pub mod evaluate;
pub mod export;
pub mod logging;
pub mod losses;
pub mod tracker;
pub mod trainer;
pub mod util;

pub use config::{BackendKind, ConfigFile, EvalArgs, RunConfig, Schedule, TrainArgs};
pub use evaluate::{evaluate_celeba, evaluate_synthetic, EvalContext};
pub use losses::{LossTotals, LossValues, LossWeights, SyntheticLosses};
pub use models::{Decomposition, FaceDecomposer, SfsNet, SfsNetConfig};
pub use tracker::{JsonlTracker, MetricsTracker, NoopTracker};
pub use trainer::{
    train, train_epoch, EpochReport, EpochStats, RunLayout, TrainData, TrainReport, TrainSettings,
};
pub use util::{load_sfsnet_from_checkpoint, run_eval, run_train, save_checkpoint};
/// Backend alias for training/eval (NdArray by default; WGPU if enabled).
#[cfg(feature = "backend-wgpu")]
pub type TrainBackend = burn_wgpu::Wgpu<f32>;
#[cfg(not(feature = "backend-wgpu"))]
pub type TrainBackend = burn_ndarray::NdArray<f32>;
