//! Dual-dataset training driver.
//!
//! Every loop pass takes one synthetic batch and then one real-face batch,
//! each followed by its own backward pass and optimizer step. A stream that
//! runs dry is skipped for the rest of the epoch; the epoch ends once both are
//! dry. After the epoch the driver reports, exports the first batch of each
//! stream, evaluates the validation splits and overwrites the checkpoint.

use crate::evaluate::{evaluate_celeba, evaluate_synthetic, EvalContext};
use crate::export::export_image;
use crate::losses::{
    celeba_recon_loss, mask_batch, scalar, LossTotals, LossValues, LossWeights, RunningMean,
    SyntheticLosses,
};
use crate::tracker::MetricsTracker;
use crate::util::save_checkpoint;
use anyhow::Context;
use burn::module::AutodiffModule;
use burn::optim::{GradientsParams, Optimizer};
use burn::tensor::backend::{AutodiffBackend, Backend};
use face_dataset::{CelebaBatch, CelebaIndex, DataLoader, SyntheticBatch, SyntheticIndex};
use models::{Decomposition, FaceDecomposer};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// On-disk layout of one training run under its log path.
#[derive(Debug, Clone)]
pub struct RunLayout {
    root: PathBuf,
}

impl RunLayout {
    pub const CHECKPOINT_FILE: &'static str = "sfs_net_model.bin";
    pub const SPLITS: [&'static str; 3] = ["train", "val", "test"];

    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn checkpoint_dir(&self) -> PathBuf {
        self.root.join("checkpoints")
    }

    pub fn checkpoint_path(&self) -> PathBuf {
        self.checkpoint_dir().join(Self::CHECKPOINT_FILE)
    }

    pub fn syn_images(&self, split: &str) -> PathBuf {
        self.root.join("out_images").join("syn").join(split)
    }

    pub fn celeba_images(&self, split: &str) -> PathBuf {
        self.root.join("out_images").join("celeba").join(split)
    }

    pub fn metrics_path(&self) -> PathBuf {
        self.root.join("metrics.jsonl")
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join("config.json")
    }

    /// Create every output directory; safe to call repeatedly.
    pub fn create_all(&self) -> anyhow::Result<()> {
        let mut dirs = vec![self.checkpoint_dir()];
        for split in Self::SPLITS {
            dirs.push(self.syn_images(split));
            dirs.push(self.celeba_images(split));
        }
        for dir in dirs {
            fs::create_dir_all(&dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        Ok(())
    }
}

/// Knobs the driver needs beyond the model and optimizer.
#[derive(Debug, Clone, Serialize)]
pub struct TrainSettings {
    pub epochs: usize,
    pub learning_rate: f64,
    pub weights: LossWeights,
    /// Report, evaluate validation splits and checkpoint every N epochs.
    pub val_every: usize,
    /// Evaluate the synthetic test split every N epochs.
    pub test_every: usize,
}

impl Default for TrainSettings {
    fn default() -> Self {
        Self {
            epochs: 10,
            learning_rate: 0.01,
            weights: LossWeights::default(),
            val_every: 1,
            test_every: 5,
        }
    }
}

/// Loaders for every split the driver touches.
pub struct TrainData {
    pub syn_train: DataLoader<SyntheticIndex>,
    pub syn_val: DataLoader<SyntheticIndex>,
    pub syn_test: DataLoader<SyntheticIndex>,
    pub celeba_train: DataLoader<CelebaIndex>,
    pub celeba_val: DataLoader<CelebaIndex>,
}

/// First batch of each stream in an epoch, with detached predictions.
pub struct EpochSamples<B: Backend> {
    pub syn: Option<(SyntheticBatch<B>, Decomposition<B>)>,
    pub celeba: Option<(CelebaBatch<B>, Decomposition<B>)>,
}

/// Running losses of one training epoch.
#[derive(Debug, Clone, Default)]
pub struct EpochStats {
    pub syn: LossTotals,
    pub celeba: RunningMean,
    /// Loop passes in which at least one stream produced a batch.
    pub iterations: usize,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ValidationResult {
    pub syn: LossValues,
    pub celeba: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct EpochReport {
    pub epoch: usize,
    pub iterations: usize,
    pub syn_steps: usize,
    pub celeba_steps: usize,
    pub train: LossValues,
    pub celeba_train: f32,
    pub validation: Option<ValidationResult>,
    pub test: Option<LossValues>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TrainReport {
    pub epochs: Vec<EpochReport>,
}

/// Run the alternating synthetic/real-face loop for one epoch.
pub fn train_epoch<B, M, O>(
    mut model: M,
    optim: &mut O,
    data: &TrainData,
    settings: &TrainSettings,
    epoch: usize,
    device: &B::Device,
) -> anyhow::Result<(M, EpochStats, EpochSamples<B>)>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + FaceDecomposer<B>,
    O: Optimizer<M, B>,
{
    let mut stats = EpochStats::default();
    let mut samples = EpochSamples {
        syn: None,
        celeba: None,
    };

    let mut syn_iter = data.syn_train.iter(epoch as u64);
    let mut celeba_iter = data.celeba_train.iter(epoch as u64);
    let mut syn_done = false;
    let mut celeba_done = false;

    loop {
        let mut progressed = false;

        if !syn_done {
            match syn_iter.next_batch::<B>(device)? {
                Some(batch) => {
                    let batch = mask_batch(batch);
                    let pred = model.decompose(batch.face.clone());
                    let losses = SyntheticLosses::compute(&pred, &batch, &settings.weights);
                    let values = losses.values()?;

                    let grads = GradientsParams::from_grads(losses.total.backward(), &model);
                    model = optim.step(settings.learning_rate, model, grads);

                    stats.syn.add(&values);
                    if samples.syn.is_none() {
                        samples.syn = Some((batch, pred.detach()));
                    }
                    progressed = true;
                }
                None => syn_done = true,
            }
        }

        // Runs against the parameters the synthetic step just updated.
        if !celeba_done {
            match celeba_iter.next_batch::<B>(device)? {
                Some(batch) => {
                    let pred = model.decompose(batch.face.clone());
                    let loss = celeba_recon_loss(&pred, batch.face.clone());
                    let value = scalar(loss.clone())?;

                    let grads = GradientsParams::from_grads(loss.backward(), &model);
                    model = optim.step(settings.learning_rate, model, grads);

                    stats.celeba.add(value);
                    if samples.celeba.is_none() {
                        samples.celeba = Some((batch, pred.detach()));
                    }
                    progressed = true;
                }
                None => celeba_done = true,
            }
        }

        if !progressed {
            break;
        }
        stats.iterations += 1;
    }

    Ok((model, stats, samples))
}

/// Write the captured training batches as images and report them.
pub fn export_epoch_samples<B: Backend>(
    samples: EpochSamples<B>,
    layout: &RunLayout,
    epoch: usize,
    tracker: &mut dyn MetricsTracker,
) -> anyhow::Result<()> {
    if let Some((batch, pred)) = samples.syn {
        let dir = layout.syn_images("train");
        let file = |kind: &str| dir.join(format!("train_{epoch}_{kind}.png"));
        let mask = Some(batch.mask);
        let images = [
            (pred.normal, "Train Predicted Normal", "predicted_normal", true),
            (pred.albedo, "Train Predicted Albedo", "predicted_albedo", true),
            (pred.shading, "Train Predicted Shading", "predicted_shading", false),
            (pred.recon, "Train Recon", "predicted_face", false),
            (batch.face, "Train Ground Truth", "gt_face", true),
            (batch.normal, "Train Ground Truth Normal", "gt_normal", true),
            (batch.albedo, "Train Ground Truth Albedo", "gt_albedo", true),
        ];
        for (pic, caption, kind, denormalize) in images {
            export_image(&mut *tracker, pic, mask.clone(), caption, epoch, &file(kind), denormalize)?;
        }
    }

    if let Some((batch, pred)) = samples.celeba {
        let dir = layout.celeba_images("train");
        let file = |kind: &str| dir.join(format!("train_{epoch}_c_{kind}.png"));
        let images = [
            (pred.normal, "Train CelebA Predicted Normal", "predicted_normal", true),
            (pred.albedo, "Train CelebA Predicted Albedo", "predicted_albedo", true),
            (pred.shading, "Train CelebA Predicted Shading", "predicted_shading", false),
            (pred.recon, "Train CelebA Recon", "predicted_face", false),
            (batch.face, "Train CelebA Ground Truth", "gt_face", true),
        ];
        for (pic, caption, kind, denormalize) in images {
            export_image(&mut *tracker, pic, None, caption, epoch, &file(kind), denormalize)?;
        }
    }
    Ok(())
}

/// Train for `settings.epochs` epochs, returning the final model and per-epoch reports.
pub fn train<B, M, O>(
    mut model: M,
    mut optim: O,
    data: &TrainData,
    settings: &TrainSettings,
    layout: &RunLayout,
    tracker: &mut dyn MetricsTracker,
    device: &B::Device,
) -> anyhow::Result<(M, TrainReport)>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + FaceDecomposer<B>,
    M::InnerModule: FaceDecomposer<B::InnerBackend>,
    O: Optimizer<M, B>,
{
    layout.create_all()?;
    let val_every = settings.val_every.max(1);
    let test_every = settings.test_every.max(1);
    let mut report = TrainReport::default();

    for epoch in 1..=settings.epochs {
        let (trained, stats, samples) =
            train_epoch(model, &mut optim, data, settings, epoch, device)?;
        model = trained;

        let sums = stats.syn.sums();
        let train = stats.syn.mean();
        let celeba_train = stats.celeba.mean();
        info!(
            epoch,
            total = sums.total,
            normal = sums.normal,
            albedo = sums.albedo,
            sh = sums.sh,
            recon = sums.recon,
            celeba = stats.celeba.sum(),
            iterations = stats.iterations,
            "epoch loss totals"
        );

        let mut epoch_report = EpochReport {
            epoch,
            iterations: stats.iterations,
            syn_steps: stats.syn.steps(),
            celeba_steps: stats.celeba.steps(),
            train,
            celeba_train,
            validation: None,
            test: None,
        };

        if epoch % val_every == 0 {
            info!(
                epoch,
                total = train.total,
                normal = train.normal,
                albedo = train.albedo,
                sh = train.sh,
                recon = train.recon,
                celeba = celeba_train,
                "training set results"
            );
            tracker.log_scalars(
                &[
                    ("Train Total loss".to_string(), train.total),
                    ("Train Albedo loss".to_string(), train.albedo),
                    ("Train Normal loss".to_string(), train.normal),
                    ("Train SH loss".to_string(), train.sh),
                    ("Train Recon loss".to_string(), train.recon),
                    ("Train CelebA loss".to_string(), celeba_train),
                ],
                epoch,
            )?;
            export_epoch_samples(samples, layout, epoch, &mut *tracker)?;

            let valid = model.valid();
            let syn = evaluate_synthetic::<B::InnerBackend, _>(
                &valid,
                &data.syn_val,
                &EvalContext::new(epoch, layout.syn_images("val"), "Syn_Val"),
                &settings.weights,
                &mut *tracker,
                device,
            )?;
            info!(
                epoch,
                total = syn.total,
                normal = syn.normal,
                albedo = syn.albedo,
                sh = syn.sh,
                recon = syn.recon,
                "synthetic validation results"
            );
            let celeba = evaluate_celeba::<B::InnerBackend, _>(
                &valid,
                &data.celeba_val,
                &EvalContext::new(epoch, layout.celeba_images("val"), "CelebA_Val"),
                &mut *tracker,
                device,
            )?;
            info!(epoch, total = celeba, "CelebA validation results");
            epoch_report.validation = Some(ValidationResult { syn, celeba });

            save_checkpoint::<B, M>(&model, &layout.checkpoint_path())?;
        }

        if epoch % test_every == 0 {
            let test = evaluate_synthetic::<B::InnerBackend, _>(
                &model.valid(),
                &data.syn_test,
                &EvalContext::new(epoch, layout.syn_images("test"), "Syn_Test"),
                &settings.weights,
                &mut *tracker,
                device,
            )?;
            info!(
                epoch,
                total = test.total,
                normal = test.normal,
                albedo = test.albedo,
                sh = test.sh,
                recon = test.recon,
                "synthetic test results"
            );
            epoch_report.test = Some(test);
        }

        report.epochs.push(epoch_report);
    }

    Ok((model, report))
}
