//! Burn models for face intrinsics decomposition.
//!
//! `SfsNet` maps a normalized face image to surface normals, albedo and
//! spherical-harmonic lighting, then renders shading and a reconstructed face
//! from those three. Consumers depend on the [`FaceDecomposer`] trait, so the
//! training loop and evaluators do not care which concrete network they drive.

pub mod render;

use burn::module::Module;
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::{Linear, LinearConfig, PaddingConfig2d};
use burn::tensor::activation::{relu, tanh};
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use serde::{Deserialize, Serialize};

pub use render::{denorm, reconstruct, render_shading, SH_BASIS, SH_COEFFS};

/// Everything one forward pass predicts for a batch.
#[derive(Debug, Clone)]
pub struct Decomposition<B: Backend> {
    /// Surface normals in [-1, 1], [B, 3, H, W].
    pub normal: Tensor<B, 4>,
    /// Albedo in [-1, 1], [B, 3, H, W].
    pub albedo: Tensor<B, 4>,
    /// SH lighting coefficients, [B, 27].
    pub sh: Tensor<B, 2>,
    pub shading: Tensor<B, 4>,
    /// Reconstructed face in [0, 1] display range.
    pub recon: Tensor<B, 4>,
}

impl<B: Backend> Decomposition<B> {
    /// Drop the autodiff graph from every output.
    pub fn detach(self) -> Self {
        Self {
            normal: self.normal.detach(),
            albedo: self.albedo.detach(),
            sh: self.sh.detach(),
            shading: self.shading.detach(),
            recon: self.recon.detach(),
        }
    }
}

/// A network that splits a face image into intrinsic components.
pub trait FaceDecomposer<B: Backend> {
    fn decompose(&self, face: Tensor<B, 4>) -> Decomposition<B>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SfsNetConfig {
    /// Channels in the shared trunk.
    pub hidden: usize,
    /// Convolutions in the shared trunk after the stem.
    pub depth: usize,
    /// Channels in each of the normal/albedo heads.
    pub head_hidden: usize,
}

impl Default for SfsNetConfig {
    fn default() -> Self {
        Self {
            hidden: 32,
            depth: 2,
            head_hidden: 16,
        }
    }
}

#[derive(Debug, Module)]
pub struct SfsNet<B: Backend> {
    stem: Conv2d<B>,
    trunk: Vec<Conv2d<B>>,
    normal_head: Conv2d<B>,
    normal_out: Conv2d<B>,
    albedo_head: Conv2d<B>,
    albedo_out: Conv2d<B>,
    light_fc: Linear<B>,
}

fn conv3x3<B: Backend>(channels_in: usize, channels_out: usize, device: &B::Device) -> Conv2d<B> {
    Conv2dConfig::new([channels_in, channels_out], [3, 3])
        .with_padding(PaddingConfig2d::Same)
        .init(device)
}

impl<B: Backend> SfsNet<B> {
    pub fn new(cfg: SfsNetConfig, device: &B::Device) -> Self {
        let hidden = cfg.hidden.max(1);
        let head = cfg.head_hidden.max(1);
        let stem = conv3x3(3, hidden, device);
        let trunk = (0..cfg.depth)
            .map(|_| conv3x3(hidden, hidden, device))
            .collect();
        Self {
            stem,
            trunk,
            normal_head: conv3x3(hidden, head, device),
            normal_out: conv3x3(head, 3, device),
            albedo_head: conv3x3(hidden, head, device),
            albedo_out: conv3x3(head, 3, device),
            light_fc: LinearConfig::new(hidden + 2 * head, SH_COEFFS).init(device),
        }
    }

    pub fn forward(&self, face: Tensor<B, 4>) -> Decomposition<B> {
        let mut features = relu(self.stem.forward(face));
        for conv in &self.trunk {
            features = relu(conv.forward(features));
        }

        let normal_features = relu(self.normal_head.forward(features.clone()));
        let albedo_features = relu(self.albedo_head.forward(features.clone()));
        let normal = tanh(self.normal_out.forward(normal_features.clone()));
        let albedo = tanh(self.albedo_out.forward(albedo_features.clone()));

        // Light is regressed from globally pooled trunk + head features.
        let pooled = Tensor::cat(vec![features, normal_features, albedo_features], 1)
            .mean_dim(3)
            .mean_dim(2);
        let [batch, channels, _, _] = pooled.dims();
        let sh = self.light_fc.forward(pooled.reshape([batch, channels]));

        let shading = render_shading(normal.clone(), sh.clone());
        let recon = reconstruct(albedo.clone(), shading.clone());
        Decomposition {
            normal,
            albedo,
            sh,
            shading,
            recon,
        }
    }
}

impl<B: Backend> FaceDecomposer<B> for SfsNet<B> {
    fn decompose(&self, face: Tensor<B, 4>) -> Decomposition<B> {
        self.forward(face)
    }
}
