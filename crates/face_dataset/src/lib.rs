//! Dataset loading, splitting, and Burn-compatible batching for face intrinsics training.
//!
//! Two sources are supported:
//! - Synthetic faces with ground-truth albedo, normal, mask and SH lighting.
//! - Real (CelebA) faces with no labels.
//!
//! Both are indexed by a CSV file, split into train/validation by percentage,
//! and iterated in batches through [`DataLoader`].

pub mod batch;
pub mod index;
pub mod load;
pub mod splits;
pub mod types;

pub use batch::{build_train_val_loaders, BatchIter, CelebaBatch, DataLoader, FaceIndex, SyntheticBatch};
pub use index::{read_celeba_index, read_synthetic_index};
pub use load::{load_image_chw, load_sh, PixelRange};
pub use splits::split_validation;
pub use types::*;
