#![allow(dead_code)]

use burn::backend::Autodiff;
use burn_ndarray::NdArray;
use face_dataset::{
    read_celeba_index, read_synthetic_index, CelebaIndex, DataLoader, DatasetConfig,
    SyntheticIndex, SH_COEFFS,
};
use models::SfsNetConfig;
use std::fs;
use std::path::Path;

pub type Backend = NdArray<f32>;
pub type ADBackend = Autodiff<Backend>;

pub const IMAGE_SIZE: u32 = 4;

pub fn tiny_config() -> SfsNetConfig {
    SfsNetConfig {
        hidden: 4,
        depth: 1,
        head_hidden: 2,
    }
}

fn write_rgb(path: &Path, seed: usize) {
    let img = image::RgbImage::from_fn(IMAGE_SIZE, IMAGE_SIZE, |x, y| {
        let v = ((seed * 37 + x as usize * 11 + y as usize * 23) % 256) as u8;
        image::Rgb([v, v.wrapping_add(40), v.wrapping_add(90)])
    });
    img.save(path).unwrap();
}

fn write_mask(path: &Path) {
    let img = image::RgbImage::from_fn(IMAGE_SIZE, IMAGE_SIZE, |x, _y| {
        let v = if x == 0 { 0 } else { 255 };
        image::Rgb([v, v, v])
    });
    img.save(path).unwrap();
}

/// Writes `<root>/<split>.csv` and `count` samples under `<root>/<split>/`.
pub fn synthetic_split(root: &Path, split: &str, count: usize) {
    let dir = root.join(split);
    fs::create_dir_all(&dir).unwrap();
    let mut csv = String::from("albedo,normal,mask,sh,face\n");
    for i in 0..count {
        write_rgb(&dir.join(format!("albedo_{i}.png")), i);
        write_rgb(&dir.join(format!("normal_{i}.png")), i + 7);
        write_mask(&dir.join(format!("mask_{i}.png")));
        write_rgb(&dir.join(format!("face_{i}.png")), i + 13);
        let sh: Vec<String> = (0..SH_COEFFS)
            .map(|k| format!("{}", ((k + i) % 5) as f32 * 0.1))
            .collect();
        fs::write(dir.join(format!("sh_{i}.txt")), sh.join("\n")).unwrap();
        csv.push_str(&format!(
            "albedo_{i}.png,normal_{i}.png,mask_{i}.png,sh_{i}.txt,face_{i}.png\n"
        ));
    }
    fs::write(root.join(format!("{split}.csv")), csv).unwrap();
}

/// Writes `<root>/<split>.csv` and `count` face images next to it.
pub fn celeba_split(root: &Path, split: &str, count: usize) {
    let dir = root.join("images");
    fs::create_dir_all(&dir).unwrap();
    let mut csv = String::from("face\n");
    for i in 0..count {
        let name = format!("{split}_{i}.png");
        write_rgb(&dir.join(&name), i + 101);
        csv.push_str(&format!("images/{name}\n"));
    }
    fs::write(root.join(format!("{split}.csv")), csv).unwrap();
}

pub fn loader_config(batch_size: usize) -> DatasetConfig {
    DatasetConfig {
        image_size: IMAGE_SIZE,
        batch_size,
        shuffle: false,
        seed: Some(11),
        drop_last: false,
    }
}

/// Loader over a freshly written synthetic split of `count` samples.
pub fn synthetic_loader(root: &Path, split: &str, count: usize, batch_size: usize) -> DataLoader<SyntheticIndex> {
    synthetic_split(root, split, count);
    let index = read_synthetic_index(&root.join(split), &root.join(format!("{split}.csv"))).unwrap();
    DataLoader::new(index, loader_config(batch_size))
}

pub fn celeba_loader(root: &Path, split: &str, count: usize, batch_size: usize) -> DataLoader<CelebaIndex> {
    celeba_split(root, split, count);
    let index = read_celeba_index(&root.join(format!("{split}.csv"))).unwrap();
    DataLoader::new(index, loader_config(batch_size))
}
