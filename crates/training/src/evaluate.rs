//! Inference-only passes over the synthetic and real-face splits.

use crate::export::{export_image, save_sh_csv};
use crate::losses::{
    celeba_recon_loss, mask_batch, scalar, LossTotals, LossValues, LossWeights, RunningMean,
    SyntheticLosses,
};
use crate::tracker::MetricsTracker;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use face_dataset::{CelebaIndex, DataLoader, SyntheticIndex};
use models::FaceDecomposer;
use std::path::PathBuf;

/// Batch whose outputs get exported.
const DUMP_BATCH: usize = 0;

/// Where and under what name an evaluation pass reports.
#[derive(Debug, Clone)]
pub struct EvalContext {
    /// Epoch the evaluation belongs to; used as the tracker step.
    pub epoch: usize,
    pub out_dir: PathBuf,
    /// Caption/file prefix, e.g. `Syn_Val`.
    pub suffix: String,
}

impl EvalContext {
    pub fn new(epoch: usize, out_dir: impl Into<PathBuf>, suffix: impl Into<String>) -> Self {
        Self {
            epoch,
            out_dir: out_dir.into(),
            suffix: suffix.into(),
        }
    }

    fn file(&self, kind: &str) -> PathBuf {
        self.out_dir.join(format!(
            "{}_{}_{}_{kind}",
            self.suffix, self.epoch, DUMP_BATCH
        ))
    }

    fn caption(&self, what: &str) -> String {
        format!("{} {what}", self.suffix)
    }
}

/// Exports one evaluation batch's images under the context's naming scheme.
struct Dump<'a> {
    tracker: &'a mut dyn MetricsTracker,
    ctx: &'a EvalContext,
}

impl Dump<'_> {
    fn image<B: Backend>(
        &mut self,
        pic: Tensor<B, 4>,
        mask: Option<Tensor<B, 4>>,
        what: &str,
        kind: &str,
        denormalize: bool,
    ) -> anyhow::Result<()> {
        export_image(
            &mut *self.tracker,
            pic,
            mask,
            &self.ctx.caption(what),
            self.ctx.epoch,
            &self.ctx.file(&format!("{kind}.png")),
            denormalize,
        )
    }
}

/// Evaluate on labeled synthetic data; returns epoch-mean (total, normal, albedo, sh, recon).
///
/// Takes the model on a plain (non-autodiff) backend, so parameters cannot change.
pub fn evaluate_synthetic<B, M>(
    model: &M,
    loader: &DataLoader<SyntheticIndex>,
    ctx: &EvalContext,
    weights: &LossWeights,
    tracker: &mut dyn MetricsTracker,
    device: &B::Device,
) -> anyhow::Result<LossValues>
where
    B: Backend,
    M: FaceDecomposer<B>,
{
    let mut totals = LossTotals::default();
    let mut iter = loader.iter(0);
    let mut bix = 0usize;
    while let Some(batch) = iter.next_batch::<B>(device)? {
        let batch = mask_batch(batch);
        let pred = model.decompose(batch.face.clone());

        if bix == DUMP_BATCH {
            let mask = Some(batch.mask.clone());
            let mut dump = Dump { tracker: &mut *tracker, ctx };
            dump.image(pred.normal.clone(), mask.clone(), "Predicted Normal", "predicted_normal", true)?;
            dump.image(pred.albedo.clone(), mask.clone(), "Predicted Albedo", "predicted_albedo", true)?;
            dump.image(pred.shading.clone(), mask.clone(), "Predicted Shading", "predicted_shading", false)?;
            dump.image(pred.recon.clone(), mask.clone(), "Predicted face", "predicted_face", false)?;
            dump.image(batch.face.clone(), mask.clone(), "Ground Truth", "gt_face", true)?;
            dump.image(batch.normal.clone(), mask.clone(), "Ground Truth Normal", "gt_normal", true)?;
            dump.image(batch.albedo.clone(), mask, "Ground Truth Albedo", "gt_albedo", true)?;
            save_sh_csv(pred.sh.clone(), &ctx.file("predicted_sh.csv"))?;
        }

        let losses = SyntheticLosses::compute(&pred, &batch, weights);
        totals.add(&losses.values()?);
        bix += 1;
    }

    if totals.steps() == 0 {
        tracing::warn!(suffix = %ctx.suffix, "synthetic evaluation split is empty");
    }
    let mean = totals.mean();
    tracker.log_scalars(
        &[
            (ctx.caption("Total loss"), mean.total),
            (ctx.caption("Albedo loss"), mean.albedo),
            (ctx.caption("Normal loss"), mean.normal),
            (ctx.caption("SH loss"), mean.sh),
            (ctx.caption("Recon loss"), mean.recon),
        ],
        ctx.epoch,
    )?;
    Ok(mean)
}

/// Evaluate reconstruction on unlabeled real faces; returns the epoch-mean loss.
pub fn evaluate_celeba<B, M>(
    model: &M,
    loader: &DataLoader<CelebaIndex>,
    ctx: &EvalContext,
    tracker: &mut dyn MetricsTracker,
    device: &B::Device,
) -> anyhow::Result<f32>
where
    B: Backend,
    M: FaceDecomposer<B>,
{
    let mut total = RunningMean::default();
    let mut iter = loader.iter(0);
    let mut bix = 0usize;
    while let Some(batch) = iter.next_batch::<B>(device)? {
        let pred = model.decompose(batch.face.clone());

        if bix == DUMP_BATCH {
            let mut dump = Dump { tracker: &mut *tracker, ctx };
            dump.image(pred.normal.clone(), None, "Predicted Normal", "predicted_normal", true)?;
            dump.image(pred.albedo.clone(), None, "Predicted Albedo", "predicted_albedo", true)?;
            dump.image(pred.shading.clone(), None, "Predicted Shading", "predicted_shading", false)?;
            dump.image(pred.recon.clone(), None, "Predicted face", "predicted_face", false)?;
            dump.image(batch.face.clone(), None, "Ground Truth", "gt_face", true)?;
            save_sh_csv(pred.sh.clone(), &ctx.file("predicted_sh.csv"))?;
        }

        total.add(scalar(celeba_recon_loss(&pred, batch.face))?);
        bix += 1;
    }

    if total.steps() == 0 {
        tracing::warn!(suffix = %ctx.suffix, "real-face evaluation split is empty");
    }
    tracker.log_scalars(&[(ctx.caption("Total loss"), total.mean())], ctx.epoch)?;
    Ok(total.mean())
}
