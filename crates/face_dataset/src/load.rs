//! Image and SH file decoding.

use crate::types::{DatasetResult, FaceDatasetError};
use image::imageops::FilterType;
use std::fs;
use std::path::Path;

/// Value range an image is mapped into after decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelRange {
    /// [0, 1]; used for masks.
    Unit,
    /// [-1, 1]; used for faces, albedo and normals.
    Symmetric,
}

/// Decode an RGB image, resize it to `size`x`size`, and return CHW floats.
pub fn load_image_chw(path: &Path, size: u32, range: PixelRange) -> DatasetResult<Vec<f32>> {
    let img = image::open(path).map_err(|e| FaceDatasetError::Image {
        path: path.to_path_buf(),
        source: e,
    })?;
    let rgb = if img.width() != size || img.height() != size {
        img.resize_exact(size, size, FilterType::Triangle).to_rgb8()
    } else {
        img.to_rgb8()
    };

    let (width, height) = rgb.dimensions();
    let mut out = Vec::with_capacity(3 * (width * height) as usize);
    for c in 0..3 {
        for y in 0..height {
            for x in 0..width {
                let v = rgb.get_pixel(x, y)[c] as f32 / 255.0;
                out.push(match range {
                    PixelRange::Unit => v,
                    PixelRange::Symmetric => v * 2.0 - 1.0,
                });
            }
        }
    }
    Ok(out)
}

/// Parse an SH lighting file: `expected` floats separated by whitespace or commas.
pub fn load_sh(path: &Path, expected: usize) -> DatasetResult<Vec<f32>> {
    let raw = fs::read_to_string(path).map_err(|e| FaceDatasetError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let coeffs = raw
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|tok| !tok.is_empty())
        .map(|tok| {
            tok.parse::<f32>().map_err(|e| FaceDatasetError::Sh {
                path: path.to_path_buf(),
                msg: format!("bad value {tok:?}: {e}"),
            })
        })
        .collect::<DatasetResult<Vec<f32>>>()?;
    if coeffs.len() != expected {
        return Err(FaceDatasetError::Sh {
            path: path.to_path_buf(),
            msg: format!("expected {expected} coefficients, found {}", coeffs.len()),
        });
    }
    Ok(coeffs)
}
