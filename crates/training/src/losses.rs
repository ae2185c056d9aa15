//! Loss terms, the shared weighting policy, and per-epoch accumulators.

use burn::nn::loss::{MseLoss, Reduction};
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use face_dataset::SyntheticBatch;
use models::{denorm, Decomposition};
use serde::{Deserialize, Serialize};

/// Weights combining the synthetic loss terms into one objective.
///
/// The same value drives training and both evaluators so validation losses
/// stay comparable to the training objective.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LossWeights {
    pub recon: f32,
    pub normal: f32,
    pub albedo: f32,
    pub sh: f32,
}

impl Default for LossWeights {
    fn default() -> Self {
        Self {
            recon: 0.5,
            normal: 0.5,
            albedo: 0.5,
            sh: 0.1,
        }
    }
}

impl LossWeights {
    pub fn combine<B: Backend>(
        &self,
        normal: Tensor<B, 1>,
        albedo: Tensor<B, 1>,
        sh: Tensor<B, 1>,
        recon: Tensor<B, 1>,
    ) -> Tensor<B, 1> {
        recon * self.recon + normal * self.normal + albedo * self.albedo + sh * self.sh
    }
}

/// Mean absolute error.
pub fn l1_loss<B: Backend, const D: usize>(pred: Tensor<B, D>, target: Tensor<B, D>) -> Tensor<B, 1> {
    (pred - target).abs().mean()
}

/// Mean squared error.
pub fn mse_loss<B: Backend, const D: usize>(pred: Tensor<B, D>, target: Tensor<B, D>) -> Tensor<B, 1> {
    MseLoss::new().forward(pred, target, Reduction::Mean)
}

/// Replace the batch's face by `mask * face`; the model only ever sees masked synthetic faces.
pub fn mask_batch<B: Backend>(batch: SyntheticBatch<B>) -> SyntheticBatch<B> {
    SyntheticBatch {
        face: batch.face * batch.mask.clone(),
        ..batch
    }
}

/// Read a one-element tensor back to the host.
pub fn scalar<B: Backend>(t: Tensor<B, 1>) -> anyhow::Result<f32> {
    t.into_data()
        .to_vec::<f32>()
        .map_err(|e| anyhow::anyhow!("failed to read loss tensor: {e:?}"))?
        .into_iter()
        .next()
        .ok_or_else(|| anyhow::anyhow!("loss tensor is empty"))
}

/// The four supervised terms plus their weighted total for one synthetic batch.
#[derive(Debug, Clone)]
pub struct SyntheticLosses<B: Backend> {
    pub total: Tensor<B, 1>,
    pub normal: Tensor<B, 1>,
    pub albedo: Tensor<B, 1>,
    pub sh: Tensor<B, 1>,
    pub recon: Tensor<B, 1>,
}

impl<B: Backend> SyntheticLosses<B> {
    /// `batch.face` must already be masked (see [`mask_batch`]).
    pub fn compute(pred: &Decomposition<B>, batch: &SyntheticBatch<B>, weights: &LossWeights) -> Self {
        let normal = l1_loss(pred.normal.clone(), batch.normal.clone());
        let albedo = l1_loss(pred.albedo.clone(), batch.albedo.clone());
        let sh = mse_loss(pred.sh.clone(), batch.sh.clone());
        // The renderer works in display range, so compare against the denormalized input.
        let recon = l1_loss(pred.recon.clone(), denorm(batch.face.clone()));
        let total = weights.combine(normal.clone(), albedo.clone(), sh.clone(), recon.clone());
        Self {
            total,
            normal,
            albedo,
            sh,
            recon,
        }
    }

    pub fn values(&self) -> anyhow::Result<LossValues> {
        Ok(LossValues {
            total: scalar(self.total.clone())?,
            normal: scalar(self.normal.clone())?,
            albedo: scalar(self.albedo.clone())?,
            sh: scalar(self.sh.clone())?,
            recon: scalar(self.recon.clone())?,
        })
    }
}

/// Reconstruction loss for an unlabeled face batch.
pub fn celeba_recon_loss<B: Backend>(pred: &Decomposition<B>, face: Tensor<B, 4>) -> Tensor<B, 1> {
    l1_loss(pred.recon.clone(), denorm(face))
}

/// Host-side loss report: (total, normal, albedo, sh, recon).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LossValues {
    pub total: f32,
    pub normal: f32,
    pub albedo: f32,
    pub sh: f32,
    pub recon: f32,
}

/// Running sums of [`LossValues`] over an epoch.
#[derive(Debug, Clone, Copy, Default)]
pub struct LossTotals {
    sums: [f64; 5],
    steps: usize,
}

impl LossTotals {
    pub fn add(&mut self, v: &LossValues) {
        for (sum, x) in self
            .sums
            .iter_mut()
            .zip([v.total, v.normal, v.albedo, v.sh, v.recon])
        {
            *sum += x as f64;
        }
        self.steps += 1;
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn sums(&self) -> LossValues {
        self.scaled(1.0)
    }

    /// Per-step means; zeros when nothing was accumulated.
    pub fn mean(&self) -> LossValues {
        if self.steps == 0 {
            return LossValues::default();
        }
        self.scaled(1.0 / self.steps as f64)
    }

    fn scaled(&self, k: f64) -> LossValues {
        let [total, normal, albedo, sh, recon] = self.sums.map(|s| (s * k) as f32);
        LossValues {
            total,
            normal,
            albedo,
            sh,
            recon,
        }
    }
}

/// Running mean of a single loss.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunningMean {
    sum: f64,
    steps: usize,
}

impl RunningMean {
    pub fn add(&mut self, v: f32) {
        self.sum += v as f64;
        self.steps += 1;
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn sum(&self) -> f32 {
        self.sum as f32
    }

    pub fn mean(&self) -> f32 {
        if self.steps == 0 {
            0.0
        } else {
            (self.sum / self.steps as f64) as f32
        }
    }
}
