//! Core types, error definitions, and data structures for face_dataset.

use serde::Deserialize;
use std::path::PathBuf;
use thiserror::Error;

pub type DatasetResult<T> = Result<T, FaceDatasetError>;

/// SH lighting coefficients stored per synthetic sample (9 per RGB channel).
pub const SH_COEFFS: usize = 27;

#[derive(Debug, Error)]
pub enum FaceDatasetError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("csv error at {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("image decode error at {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("invalid SH file {path}: {msg}")]
    Sh { path: PathBuf, msg: String },
}

/// One row of a synthetic dataset CSV, paths as written in the file.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SyntheticRecord {
    pub(crate) albedo: String,
    pub(crate) normal: String,
    pub(crate) mask: String,
    pub(crate) sh: String,
    pub(crate) face: String,
}

/// One row of a real-face dataset CSV.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CelebaRecord {
    pub(crate) face: String,
}

/// Resolved file locations for one synthetic sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntheticIndex {
    pub albedo: PathBuf,
    pub normal: PathBuf,
    pub mask: PathBuf,
    pub sh: PathBuf,
    pub face: PathBuf,
}

/// Resolved file location for one real-face sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CelebaIndex {
    pub face: PathBuf,
}

/// Decoded synthetic sample; images are CHW.
#[derive(Debug, Clone)]
pub struct SyntheticSample {
    /// Albedo in [-1, 1].
    pub albedo: Vec<f32>,
    /// Normal in [-1, 1].
    pub normal: Vec<f32>,
    /// Mask in [0, 1].
    pub mask: Vec<f32>,
    pub sh: Vec<f32>,
    /// Face in [-1, 1].
    pub face: Vec<f32>,
}

#[derive(Debug, Clone)]
pub struct CelebaSample {
    /// Face in [-1, 1], CHW.
    pub face: Vec<f32>,
}

#[derive(Debug, Clone)]
pub struct DatasetConfig {
    /// Square edge every image is resized to.
    pub image_size: u32,
    pub batch_size: usize,
    /// Reshuffle sample order at the start of every pass.
    pub shuffle: bool,
    /// Seed for reproducible shuffling; the pass number is mixed in.
    pub seed: Option<u64>,
    /// Drop the last partial batch.
    pub drop_last: bool,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            image_size: 128,
            batch_size: 10,
            shuffle: true,
            seed: None,
            drop_last: false,
        }
    }
}
