mod common;

use burn::tensor::{Distribution, Tensor};
use common::Backend;
use face_dataset::SyntheticBatch;
use models::{denorm, Decomposition};
use training::losses::{scalar, LossTotals, LossValues};
use training::{LossWeights, SyntheticLosses};

fn random_batch(device: &<Backend as burn::tensor::backend::Backend>::Device) -> SyntheticBatch<Backend> {
    let image = || Tensor::<Backend, 4>::random([2, 3, 4, 4], Distribution::Uniform(-1.0, 1.0), device);
    SyntheticBatch {
        albedo: image(),
        normal: image(),
        mask: Tensor::ones([2, 3, 4, 4], device),
        sh: Tensor::random([2, 27], Distribution::Uniform(-1.0, 1.0), device),
        face: image(),
    }
}

#[test]
fn perfect_prediction_has_zero_loss() {
    let device = Default::default();
    let batch = random_batch(&device);
    let pred = Decomposition {
        normal: batch.normal.clone(),
        albedo: batch.albedo.clone(),
        sh: batch.sh.clone(),
        shading: Tensor::ones([2, 3, 4, 4], &device),
        recon: denorm(batch.face.clone()),
    };
    let values = SyntheticLosses::compute(&pred, &batch, &LossWeights::default()).values().unwrap();
    assert_eq!(values, LossValues::default());
}

#[test]
fn total_is_the_weighted_sum_of_terms() {
    let device = Default::default();
    let batch = random_batch(&device);
    let other = random_batch(&device);
    let pred = Decomposition {
        normal: other.normal,
        albedo: other.albedo,
        sh: other.sh,
        shading: Tensor::zeros([2, 3, 4, 4], &device),
        recon: denorm(other.face),
    };
    let v = SyntheticLosses::compute(&pred, &batch, &LossWeights::default()).values().unwrap();
    let expected = 0.5 * v.recon + 0.5 * v.normal + 0.5 * v.albedo + 0.1 * v.sh;
    assert!((v.total - expected).abs() < 1e-5, "{} vs {expected}", v.total);
    assert!(v.normal > 0.0 && v.albedo > 0.0 && v.sh > 0.0 && v.recon > 0.0);
}

#[test]
fn custom_weights_drive_the_total() {
    let device = Default::default();
    let batch = random_batch(&device);
    let pred = Decomposition {
        normal: batch.normal.clone(),
        albedo: batch.albedo.clone(),
        sh: batch.sh.clone() + 1.0,
        shading: Tensor::zeros([2, 3, 4, 4], &device),
        recon: denorm(batch.face.clone()),
    };
    let weights = LossWeights {
        sh: 2.0,
        ..LossWeights::default()
    };
    let losses = SyntheticLosses::compute(&pred, &batch, &weights);
    assert!((scalar(losses.sh).unwrap() - 1.0).abs() < 1e-5);
    assert!((scalar(losses.total).unwrap() - 2.0).abs() < 1e-5);
}

#[test]
fn totals_average_per_step_and_are_zero_when_empty() {
    let mut totals = LossTotals::default();
    assert_eq!(totals.mean(), LossValues::default());

    totals.add(&LossValues { total: 1.0, normal: 2.0, albedo: 0.0, sh: 4.0, recon: 1.0 });
    totals.add(&LossValues { total: 3.0, normal: 0.0, albedo: 2.0, sh: 0.0, recon: 1.0 });
    assert_eq!(totals.steps(), 2);
    assert_eq!(totals.sums().total, 4.0);
    assert_eq!(
        totals.mean(),
        LossValues { total: 2.0, normal: 1.0, albedo: 1.0, sh: 2.0, recon: 1.0 }
    );
}

#[test]
fn empty_loss_tensor_is_an_error_not_zero() {
    let device = Default::default();
    let empty = Tensor::<Backend, 1>::zeros([0], &device);
    let err = scalar(empty).unwrap_err();
    assert!(err.to_string().contains("empty"));

    let one = Tensor::<Backend, 1>::from_floats([0.75], &device);
    assert_eq!(scalar(one).unwrap(), 0.75);
}
