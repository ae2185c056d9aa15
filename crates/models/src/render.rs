//! Second-order spherical-harmonic shading and face recombination.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use std::f32::consts::PI;

/// Basis functions per color channel.
pub const SH_BASIS: usize = 9;
/// Lighting coefficients per sample (9 per RGB channel).
pub const SH_COEFFS: usize = 3 * SH_BASIS;

/// Map a tensor from the symmetric [-1, 1] training range into [0, 1].
pub fn denorm<B: Backend, const D: usize>(x: Tensor<B, D>) -> Tensor<B, D> {
    x.add_scalar(1.0).div_scalar(2.0).clamp(0.0, 1.0)
}

/// Lambertian-attenuated normalization constants for the 9 SH bands.
fn sh_constants() -> [f32; 5] {
    let att = [PI, 2.0 * PI / 3.0, PI / 4.0];
    [
        att[0] * (1.0 / (4.0 * PI)).sqrt(),
        att[1] * (3.0 / (4.0 * PI)).sqrt(),
        att[2] * 0.5 * (5.0 / (4.0 * PI)).sqrt(),
        att[2] * 3.0 * (5.0 / (12.0 * PI)).sqrt(),
        att[2] * 3.0 * (5.0 / (48.0 * PI)).sqrt(),
    ]
}

/// Evaluate the SH basis at every pixel of `normal` ([B, 3, H, W], xyz order).
///
/// Returns [B, 9, H, W].
pub fn sh_basis<B: Backend>(normal: Tensor<B, 4>) -> Tensor<B, 4> {
    let [batch, _, height, width] = normal.dims();
    let [c1, c2, c3, c4, c5] = sh_constants();

    let nx = normal.clone().slice([0..batch, 0..1, 0..height, 0..width]);
    let ny = normal.clone().slice([0..batch, 1..2, 0..height, 0..width]);
    let nz = normal.slice([0..batch, 2..3, 0..height, 0..width]);

    let nx2 = nx.clone().powf_scalar(2.0);
    let ny2 = ny.clone().powf_scalar(2.0);
    let nz2 = nz.clone().powf_scalar(2.0);

    Tensor::cat(
        vec![
            nx.ones_like() * c1,
            nz.clone() * c2,
            nx.clone() * c2,
            ny.clone() * c2,
            (nz2 * 2.0 - nx2.clone() - ny2.clone()) * c3,
            nx.clone() * nz.clone() * c4,
            ny.clone() * nz * c4,
            (nx2 - ny2) * c5,
            nx * ny * c4,
        ],
        1,
    )
}

/// Render per-pixel RGB shading from normals ([B, 3, H, W]) and SH lighting ([B, 27]).
pub fn render_shading<B: Backend>(normal: Tensor<B, 4>, sh: Tensor<B, 2>) -> Tensor<B, 4> {
    let [batch, _, height, width] = normal.dims();
    let basis = sh_basis(normal).reshape([batch, SH_BASIS, height * width]);
    let light = sh.reshape([batch, 3, SH_BASIS]);
    light.matmul(basis).reshape([batch, 3, height, width])
}

/// Recombine albedo (in [-1, 1]) with shading into a face in display range.
pub fn reconstruct<B: Backend>(albedo: Tensor<B, 4>, shading: Tensor<B, 4>) -> Tensor<B, 4> {
    denorm(albedo) * shading
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::tensor::TensorData;
    use burn_ndarray::NdArray;

    type B = NdArray<f32>;

    #[test]
    fn denorm_maps_range_endpoints_and_clamps() {
        let device = Default::default();
        let x = Tensor::<B, 1>::from_data(
            TensorData::new(vec![-1.0f32, 0.0, 1.0, -3.0, 2.5], [5]),
            &device,
        );
        let out = denorm(x).into_data().to_vec::<f32>().unwrap();
        assert_eq!(out, vec![0.0, 0.5, 1.0, 0.0, 1.0]);
    }

    #[test]
    fn dc_band_is_constant_over_normals() {
        let device = Default::default();
        let normal = Tensor::<B, 4>::random(
            [2, 3, 4, 4],
            burn::tensor::Distribution::Uniform(-1.0, 1.0),
            &device,
        );
        let basis = sh_basis(normal);
        assert_eq!(basis.dims(), [2, 9, 4, 4]);
        let dc = basis
            .slice([0..2, 0..1, 0..4, 0..4])
            .into_data()
            .to_vec::<f32>()
            .unwrap();
        let expected = sh_constants()[0];
        assert!(dc.iter().all(|v| (v - expected).abs() < 1e-6));
    }
}
