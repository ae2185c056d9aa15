//! Writing tensors to disk as image grids and SH tables.

use crate::tracker::MetricsTracker;
use anyhow::Context;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use models::denorm;
use std::path::Path;

/// Images per grid row.
pub const GRID_COLUMNS: usize = 8;
/// Black border between grid cells, in pixels.
pub const GRID_PADDING: usize = 2;

/// (columns, rows, width, height) of the grid for `count` cells of `h`x`w`.
pub fn grid_layout(count: usize, height: usize, width: usize) -> (usize, usize, usize, usize) {
    let cols = count.clamp(1, GRID_COLUMNS);
    let rows = count.div_ceil(cols).max(1);
    let grid_w = cols * (width + GRID_PADDING) + GRID_PADDING;
    let grid_h = rows * (height + GRID_PADDING) + GRID_PADDING;
    (cols, rows, grid_w, grid_h)
}

/// Save a [B, C, H, W] batch as one PNG grid.
///
/// With `denormalize` the batch is mapped from [-1, 1]; otherwise it is taken
/// to already be in [0, 1] and only clamped. `mask` multiplies after that.
pub fn save_image<B: Backend>(
    pic: Tensor<B, 4>,
    path: &Path,
    mask: Option<Tensor<B, 4>>,
    denormalize: bool,
) -> anyhow::Result<()> {
    let pic = if denormalize {
        denorm(pic)
    } else {
        pic.clamp(0.0, 1.0)
    };
    let pic = match mask {
        Some(mask) => pic * mask,
        None => pic,
    };

    let [count, channels, height, width] = pic.dims();
    let data = pic
        .into_data()
        .to_vec::<f32>()
        .map_err(|e| anyhow::anyhow!("failed to read image tensor: {e:?}"))?;
    let (cols, _rows, grid_w, grid_h) = grid_layout(count, height, width);

    let mut grid = image::RgbImage::new(grid_w as u32, grid_h as u32);
    let plane = height * width;
    for n in 0..count {
        let x0 = (n % cols) * (width + GRID_PADDING) + GRID_PADDING;
        let y0 = (n / cols) * (height + GRID_PADDING) + GRID_PADDING;
        let base = n * channels * plane;
        for y in 0..height {
            for x in 0..width {
                let mut px = [0u8; 3];
                for (c, out) in px.iter_mut().enumerate() {
                    // Single-channel maps are replicated to gray.
                    let src = if channels == 1 { 0 } else { c.min(channels - 1) };
                    let v = data[base + src * plane + y * width + x];
                    *out = (v * 255.0).round().clamp(0.0, 255.0) as u8;
                }
                grid.put_pixel((x0 + x) as u32, (y0 + y) as u32, image::Rgb(px));
            }
        }
    }

    grid.save(path)
        .with_context(|| format!("failed to write image {}", path.display()))
}

/// Save an image grid and report it to the tracker under `caption`.
pub fn export_image<B: Backend>(
    tracker: &mut dyn MetricsTracker,
    pic: Tensor<B, 4>,
    mask: Option<Tensor<B, 4>>,
    caption: &str,
    step: usize,
    path: &Path,
    denormalize: bool,
) -> anyhow::Result<()> {
    save_image(pic, path, mask, denormalize)?;
    tracker.log_image(caption, step, path)
}

/// Write predicted SH coefficients ([B, K]) as CSV, one row per sample.
pub fn save_sh_csv<B: Backend>(sh: Tensor<B, 2>, path: &Path) -> anyhow::Result<()> {
    let [count, coeffs] = sh.dims();
    let data = sh
        .into_data()
        .to_vec::<f32>()
        .map_err(|e| anyhow::anyhow!("failed to read SH tensor: {e:?}"))?;

    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    let mut header = vec!["sample".to_string()];
    header.extend((0..coeffs).map(|k| format!("sh_{k}")));
    writer.write_record(&header)?;
    for n in 0..count {
        let mut row = vec![n.to_string()];
        row.extend(data[n * coeffs..(n + 1) * coeffs].iter().map(|v| v.to_string()));
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::tensor::TensorData;
    use burn_ndarray::NdArray;

    type B = NdArray<f32>;

    #[test]
    fn grid_wraps_after_eight_columns() {
        assert_eq!(grid_layout(3, 4, 4), (3, 1, 20, 8));
        assert_eq!(grid_layout(9, 4, 4), (8, 2, 50, 14));
    }

    #[test]
    fn denormalized_mask_export_writes_expected_pixels() {
        let temp = tempfile::tempdir().unwrap();
        let device = Default::default();
        let pic = Tensor::<B, 4>::ones([2, 3, 2, 2], &device);
        let mut mask_data = vec![1.0f32; 2 * 3 * 4];
        mask_data[0] = 0.0;
        let mask = Tensor::<B, 4>::from_data(TensorData::new(mask_data, [2, 3, 2, 2]), &device);

        let path = temp.path().join("grid.png");
        save_image(pic, &path, Some(mask), true).unwrap();

        let img = image::open(&path).unwrap().to_rgb8();
        assert_eq!(img.dimensions(), (10, 6));
        assert_eq!(img.get_pixel(0, 0).0, [0, 0, 0]);
        // First cell, first pixel: red channel masked out.
        assert_eq!(img.get_pixel(2, 2).0, [0, 255, 255]);
        assert_eq!(img.get_pixel(3, 2).0, [255, 255, 255]);
        assert_eq!(img.get_pixel(6, 3).0, [255, 255, 255]);
    }

    #[test]
    fn sh_table_has_header_and_one_row_per_sample() {
        let temp = tempfile::tempdir().unwrap();
        let device = Default::default();
        let sh = Tensor::<B, 2>::zeros([2, 27], &device);
        let path = temp.path().join("sh.csv");
        save_sh_csv(sh, &path).unwrap();
        let raw = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = raw.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("sample,sh_0,"));
        assert_eq!(lines[2].split(',').count(), 28);
    }
}
