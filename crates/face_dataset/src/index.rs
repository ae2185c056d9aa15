//! CSV index readers.

use crate::types::{
    CelebaIndex, CelebaRecord, DatasetResult, FaceDatasetError, SyntheticIndex, SyntheticRecord,
};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

fn resolve(base: &Path, entry: &str) -> PathBuf {
    let path = Path::new(entry.trim());
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

fn read_records<T: DeserializeOwned>(csv_path: &Path) -> DatasetResult<Vec<T>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(csv_path)
        .map_err(|e| FaceDatasetError::Csv {
            path: csv_path.to_path_buf(),
            source: e,
        })?;
    reader
        .deserialize()
        .collect::<Result<Vec<T>, _>>()
        .map_err(|e| FaceDatasetError::Csv {
            path: csv_path.to_path_buf(),
            source: e,
        })
}

/// Read a synthetic CSV (`albedo,normal,mask,sh,face`); relative entries resolve against `dir`.
pub fn read_synthetic_index(dir: &Path, csv_path: &Path) -> DatasetResult<Vec<SyntheticIndex>> {
    let records: Vec<SyntheticRecord> = read_records(csv_path)?;
    Ok(records
        .into_iter()
        .map(|r| SyntheticIndex {
            albedo: resolve(dir, &r.albedo),
            normal: resolve(dir, &r.normal),
            mask: resolve(dir, &r.mask),
            sh: resolve(dir, &r.sh),
            face: resolve(dir, &r.face),
        })
        .collect())
}

/// Read a real-face CSV (`face`); relative entries resolve against the CSV's directory.
pub fn read_celeba_index(csv_path: &Path) -> DatasetResult<Vec<CelebaIndex>> {
    let base = csv_path.parent().unwrap_or_else(|| Path::new("."));
    let records: Vec<CelebaRecord> = read_records(csv_path)?;
    Ok(records
        .into_iter()
        .map(|r| CelebaIndex {
            face: resolve(base, &r.face),
        })
        .collect())
}
