use burn::tensor::{Distribution, Tensor, TensorData};
use burn_ndarray::NdArray;
use models::{render_shading, FaceDecomposer, SfsNet, SfsNetConfig, SH_COEFFS};

type Backend = NdArray<f32>;

fn tiny_config() -> SfsNetConfig {
    SfsNetConfig {
        hidden: 4,
        depth: 1,
        head_hidden: 2,
    }
}

#[test]
fn sfsnet_forward_shapes() {
    let device = Default::default();
    let model = SfsNet::<Backend>::new(tiny_config(), &device);
    let face = Tensor::<Backend, 4>::random([2, 3, 8, 8], Distribution::Uniform(-1.0, 1.0), &device);

    let out = model.decompose(face);
    assert_eq!(out.normal.dims(), [2, 3, 8, 8]);
    assert_eq!(out.albedo.dims(), [2, 3, 8, 8]);
    assert_eq!(out.sh.dims(), [2, SH_COEFFS]);
    assert_eq!(out.shading.dims(), [2, 3, 8, 8]);
    assert_eq!(out.recon.dims(), [2, 3, 8, 8]);
}

#[test]
fn zero_lighting_renders_black() {
    let device = Default::default();
    let normal = Tensor::<Backend, 4>::random([1, 3, 4, 4], Distribution::Uniform(-1.0, 1.0), &device);
    let sh = Tensor::<Backend, 2>::zeros([1, SH_COEFFS], &device);
    let shading = render_shading(normal, sh).into_data().to_vec::<f32>().unwrap();
    assert!(shading.iter().all(|v| v.abs() < 1e-7));
}

#[test]
fn ambient_only_lighting_is_flat_per_channel() {
    let device = Default::default();
    let normal = Tensor::<Backend, 4>::random([1, 3, 4, 4], Distribution::Uniform(-1.0, 1.0), &device);
    let mut coeffs = vec![0.0f32; SH_COEFFS];
    coeffs[0] = 1.0;
    coeffs[9] = 2.0;
    coeffs[18] = 3.0;
    let sh = Tensor::<Backend, 2>::from_data(TensorData::new(coeffs, [1, SH_COEFFS]), &device);

    let shading = render_shading(normal, sh).into_data().to_vec::<f32>().unwrap();
    let dc = std::f32::consts::PI * (1.0 / (4.0 * std::f32::consts::PI)).sqrt();
    for (channel, scale) in [1.0f32, 2.0, 3.0].iter().enumerate() {
        let plane = &shading[channel * 16..(channel + 1) * 16];
        assert!(plane.iter().all(|v| (v - dc * scale).abs() < 1e-5));
    }
}
