//! Batch iteration for training and evaluation.

use crate::load::{load_image_chw, load_sh, PixelRange};
use crate::splits::split_validation;
use crate::types::{
    CelebaIndex, CelebaSample, DatasetConfig, DatasetResult, SyntheticIndex, SyntheticSample,
    SH_COEFFS,
};
use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, TensorData};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;

/// Labeled synthetic batch. Images are [B, 3, H, W]; `sh` is [B, 27].
#[derive(Debug, Clone)]
pub struct SyntheticBatch<B: Backend> {
    pub albedo: Tensor<B, 4>,
    pub normal: Tensor<B, 4>,
    pub mask: Tensor<B, 4>,
    pub sh: Tensor<B, 2>,
    pub face: Tensor<B, 4>,
}

/// Unlabeled real-face batch, [B, 3, H, W].
#[derive(Debug, Clone)]
pub struct CelebaBatch<B: Backend> {
    pub face: Tensor<B, 4>,
}

/// A dataset row that knows how to decode itself and stack into a batch.
pub trait FaceIndex: Clone + Send + Sync {
    type Sample: Send;
    type Batch<B: Backend>;

    fn load(&self, image_size: u32) -> DatasetResult<Self::Sample>;

    fn collate<B: Backend>(
        samples: Vec<Self::Sample>,
        image_size: u32,
        device: &B::Device,
    ) -> Self::Batch<B>;
}

fn image_tensor<B: Backend>(
    data: Vec<f32>,
    batch: usize,
    image_size: u32,
    device: &B::Device,
) -> Tensor<B, 4> {
    let side = image_size as usize;
    Tensor::from_data(TensorData::new(data, [batch, 3, side, side]), device)
}

impl FaceIndex for SyntheticIndex {
    type Sample = SyntheticSample;
    type Batch<B: Backend> = SyntheticBatch<B>;

    fn load(&self, image_size: u32) -> DatasetResult<SyntheticSample> {
        Ok(SyntheticSample {
            albedo: load_image_chw(&self.albedo, image_size, PixelRange::Symmetric)?,
            normal: load_image_chw(&self.normal, image_size, PixelRange::Symmetric)?,
            mask: load_image_chw(&self.mask, image_size, PixelRange::Unit)?,
            sh: load_sh(&self.sh, SH_COEFFS)?,
            face: load_image_chw(&self.face, image_size, PixelRange::Symmetric)?,
        })
    }

    fn collate<B: Backend>(
        samples: Vec<SyntheticSample>,
        image_size: u32,
        device: &B::Device,
    ) -> SyntheticBatch<B> {
        let batch = samples.len();
        let mut albedo = Vec::new();
        let mut normal = Vec::new();
        let mut mask = Vec::new();
        let mut sh = Vec::with_capacity(batch * SH_COEFFS);
        let mut face = Vec::new();
        for s in samples {
            albedo.extend(s.albedo);
            normal.extend(s.normal);
            mask.extend(s.mask);
            sh.extend(s.sh);
            face.extend(s.face);
        }
        SyntheticBatch {
            albedo: image_tensor(albedo, batch, image_size, device),
            normal: image_tensor(normal, batch, image_size, device),
            mask: image_tensor(mask, batch, image_size, device),
            sh: Tensor::from_data(TensorData::new(sh, [batch, SH_COEFFS]), device),
            face: image_tensor(face, batch, image_size, device),
        }
    }
}

impl FaceIndex for CelebaIndex {
    type Sample = CelebaSample;
    type Batch<B: Backend> = CelebaBatch<B>;

    fn load(&self, image_size: u32) -> DatasetResult<CelebaSample> {
        Ok(CelebaSample {
            face: load_image_chw(&self.face, image_size, PixelRange::Symmetric)?,
        })
    }

    fn collate<B: Backend>(
        samples: Vec<CelebaSample>,
        image_size: u32,
        device: &B::Device,
    ) -> CelebaBatch<B> {
        let batch = samples.len();
        let face = samples.into_iter().flat_map(|s| s.face).collect();
        CelebaBatch {
            face: image_tensor(face, batch, image_size, device),
        }
    }
}

/// Batching view over a list of dataset rows.
#[derive(Debug, Clone)]
pub struct DataLoader<I: FaceIndex> {
    indices: Vec<I>,
    cfg: DatasetConfig,
}

impl<I: FaceIndex> DataLoader<I> {
    pub fn new(indices: Vec<I>, cfg: DatasetConfig) -> Self {
        Self { indices, cfg }
    }

    pub fn config(&self) -> &DatasetConfig {
        &self.cfg
    }

    pub fn num_samples(&self) -> usize {
        self.indices.len()
    }

    /// Number of batches one pass yields.
    pub fn len(&self) -> usize {
        let bs = self.cfg.batch_size.max(1);
        if self.cfg.drop_last {
            self.indices.len() / bs
        } else {
            self.indices.len().div_ceil(bs)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Start a pass over the data. `pass` varies the shuffle order between epochs.
    pub fn iter(&self, pass: u64) -> BatchIter<'_, I> {
        let mut order: Vec<usize> = (0..self.indices.len()).collect();
        if self.cfg.shuffle {
            let mut rng = match self.cfg.seed {
                Some(seed) => rand::rngs::StdRng::seed_from_u64(seed.wrapping_add(pass)),
                None => rand::rngs::StdRng::from_rng(&mut rand::rng()),
            };
            order.shuffle(&mut rng);
        }
        BatchIter {
            loader: self,
            order,
            cursor: 0,
        }
    }
}

/// One pass over a [`DataLoader`]. `next_batch` returns `Ok(None)` once exhausted.
pub struct BatchIter<'a, I: FaceIndex> {
    loader: &'a DataLoader<I>,
    order: Vec<usize>,
    cursor: usize,
}

impl<I: FaceIndex> BatchIter<'_, I> {
    pub fn next_batch<B: Backend>(
        &mut self,
        device: &B::Device,
    ) -> DatasetResult<Option<I::Batch<B>>> {
        let cfg = &self.loader.cfg;
        let batch_size = cfg.batch_size.max(1);
        if self.cursor >= self.order.len() {
            return Ok(None);
        }
        let end = (self.cursor + batch_size).min(self.order.len());
        if cfg.drop_last && end - self.cursor < batch_size {
            self.cursor = self.order.len();
            return Ok(None);
        }
        let slice = &self.order[self.cursor..end];
        self.cursor = end;

        let samples = slice
            .par_iter()
            .map(|&i| self.loader.indices[i].load(cfg.image_size))
            .collect::<DatasetResult<Vec<_>>>()?;
        Ok(Some(I::collate(samples, cfg.image_size, device)))
    }
}

/// Split rows into train/validation loaders. Validation never shuffles.
pub fn build_train_val_loaders<I: FaceIndex>(
    indices: Vec<I>,
    validation_percent: u32,
    split_seed: u64,
    train_cfg: DatasetConfig,
) -> (DataLoader<I>, DataLoader<I>) {
    let (train, val) = split_validation(indices, validation_percent, split_seed);
    tracing::debug!(
        train = train.len(),
        val = val.len(),
        validation_percent,
        "split training rows"
    );
    let val_cfg = DatasetConfig {
        shuffle: false,
        drop_last: false,
        ..train_cfg.clone()
    };
    (DataLoader::new(train, train_cfg), DataLoader::new(val, val_cfg))
}
