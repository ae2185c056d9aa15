use burn::backend::Autodiff;
use burn::module::Module;
use burn::optim::decay::WeightDecayConfig;
use burn::optim::AdamConfig;
use burn::record::{BinFileRecorder, FullPrecisionSettings, RecorderError};
use burn::tensor::backend::Backend;
use face_dataset::{
    build_train_val_loaders, read_celeba_index, read_synthetic_index, CelebaIndex, DataLoader,
    DatasetConfig, SyntheticIndex,
};
use models::{SfsNet, SfsNetConfig};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

use crate::config::{BackendKind, ConfigFile, EvalArgs, RunConfig, TrainArgs};
use crate::evaluate::{evaluate_celeba, evaluate_synthetic, EvalContext};
use crate::tracker::JsonlTracker;
use crate::trainer::{train, RunLayout, TrainData};
use crate::TrainBackend;

type ADBackend = Autodiff<TrainBackend>;

pub fn save_checkpoint<B: Backend, M: Module<B>>(model: &M, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
    model
        .clone()
        .save_file(path, &recorder)
        .map_err(|e| anyhow::anyhow!("failed to save checkpoint: {e}"))
}

pub fn load_sfsnet_from_checkpoint<B: Backend, P: AsRef<Path>>(
    path: P,
    cfg: SfsNetConfig,
    device: &B::Device,
) -> Result<SfsNet<B>, RecorderError> {
    let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
    SfsNet::<B>::new(cfg, device).load_file(path.as_ref(), &recorder, device)
}

pub fn validate_backend_choice(kind: BackendKind) -> anyhow::Result<()> {
    let built_wgpu = cfg!(feature = "backend-wgpu");
    match (kind, built_wgpu) {
        (BackendKind::Wgpu, false) => {
            anyhow::bail!("backend-wgpu feature not enabled; rebuild with --features backend-wgpu or choose ndarray backend")
        }
        (BackendKind::NdArray, true) => {
            warn!("built with backend-wgpu; the WGPU backend is used despite --backend ndarray");
        }
        _ => {}
    }
    Ok(())
}

fn loader_config(batch_size: usize, image_size: u32, shuffle: bool, seed: u64) -> DatasetConfig {
    DatasetConfig {
        image_size,
        batch_size,
        shuffle,
        seed: Some(seed),
        drop_last: false,
    }
}

fn synthetic_split(root: &Path, split: &str) -> anyhow::Result<Vec<SyntheticIndex>> {
    let csv_path = root.join(format!("{split}.csv"));
    Ok(read_synthetic_index(&root.join(split), &csv_path)?)
}

fn celeba_split(root: &Path, split: &str) -> anyhow::Result<Vec<CelebaIndex>> {
    Ok(read_celeba_index(&root.join(format!("{split}.csv")))?)
}

/// Build every loader the training driver consumes from the configured roots.
pub fn load_train_data(run: &RunConfig) -> anyhow::Result<TrainData> {
    let train_cfg = loader_config(run.batch_size, run.image_size, true, run.seed);
    let test_cfg = loader_config(run.batch_size, run.image_size, false, run.seed);

    let (syn_train, syn_val) = build_train_val_loaders(
        synthetic_split(&run.syn_data, "train")?,
        run.validation_percent,
        run.seed,
        train_cfg.clone(),
    );
    let syn_test = DataLoader::new(synthetic_split(&run.syn_data, "test")?, test_cfg);
    let (celeba_train, celeba_val) = build_train_val_loaders(
        celeba_split(&run.celeba_data, "train")?,
        run.validation_percent,
        run.seed,
        train_cfg,
    );

    info!(
        syn_train = syn_train.num_samples(),
        syn_val = syn_val.num_samples(),
        syn_test = syn_test.num_samples(),
        celeba_train = celeba_train.num_samples(),
        celeba_val = celeba_val.num_samples(),
        "datasets loaded"
    );
    if syn_train.is_empty() && celeba_train.is_empty() {
        anyhow::bail!("both training splits are empty; nothing to train on");
    }

    Ok(TrainData {
        syn_train,
        syn_val,
        syn_test,
        celeba_train,
        celeba_val,
    })
}

pub fn run_train(args: TrainArgs) -> anyhow::Result<()> {
    validate_backend_choice(args.backend)?;

    let file = ConfigFile::discover(args.config.as_deref())?;
    let run = RunConfig::resolve(&args, file);
    let layout = RunLayout::new(&run.log_path);
    layout.create_all()?;
    run.save(&layout.config_path())?;

    let data = load_train_data(&run)?;
    let device = <ADBackend as Backend>::Device::default();
    let model = SfsNet::<ADBackend>::new(run.model.clone(), &device);
    let optim = AdamConfig::new()
        .with_weight_decay(Some(WeightDecayConfig::new(run.weight_decay)))
        .init::<ADBackend, SfsNet<ADBackend>>();
    let mut tracker = JsonlTracker::create(layout.metrics_path())?;

    let (_model, report) = train(
        model,
        optim,
        &data,
        &run.settings(),
        &layout,
        &mut tracker,
        &device,
    )?;

    if let Some(last) = report.epochs.last() {
        info!(
            epoch = last.epoch,
            total = last.train.total,
            celeba = last.celeba_train,
            "training finished"
        );
    }
    info!(
        checkpoint = %layout.checkpoint_path().display(),
        metrics = %tracker.path().display(),
        "run artifacts"
    );
    Ok(())
}

pub fn run_eval(args: EvalArgs) -> anyhow::Result<()> {
    validate_backend_choice(args.backend)?;

    let mut cfg = ConfigFile::discover(args.config.as_deref())?;
    if let Some(hidden) = args.hidden {
        cfg.model.hidden = hidden;
    }
    let device = <TrainBackend as Backend>::Device::default();
    let model = match args.checkpoint {
        Some(ref p) => load_sfsnet_from_checkpoint::<TrainBackend, _>(p, cfg.model.clone(), &device)
            .unwrap_or_else(|e| {
                warn!(checkpoint = %p.display(), error = %e, "failed to load checkpoint; using fresh model");
                SfsNet::new(cfg.model.clone(), &device)
            }),
        None => {
            warn!("no checkpoint provided; using fresh SfsNet");
            SfsNet::new(cfg.model.clone(), &device)
        }
    };

    let test_cfg = loader_config(args.batch_size.max(1), args.image_size.max(1), false, 0);
    let syn_test = DataLoader::new(synthetic_split(&args.syn_data, "test")?, test_cfg.clone());
    let celeba_test = DataLoader::new(celeba_split(&args.celeba_data, "test")?, test_cfg);

    let syn_dir = args.out_dir.join("syn");
    let celeba_dir = args.out_dir.join("celeba");
    fs::create_dir_all(&syn_dir)?;
    fs::create_dir_all(&celeba_dir)?;
    let mut tracker = JsonlTracker::create(args.out_dir.join("metrics.jsonl"))?;

    let syn = evaluate_synthetic::<TrainBackend, _>(
        &model,
        &syn_test,
        &EvalContext::new(0, syn_dir, "Syn_Test"),
        &cfg.loss,
        &mut tracker,
        &device,
    )?;
    info!(
        total = syn.total,
        normal = syn.normal,
        albedo = syn.albedo,
        sh = syn.sh,
        recon = syn.recon,
        "synthetic test results"
    );
    let celeba = evaluate_celeba::<TrainBackend, _>(
        &model,
        &celeba_test,
        &EvalContext::new(0, celeba_dir, "CelebA_Test"),
        &mut tracker,
        &device,
    )?;
    info!(total = celeba, "CelebA test results");
    Ok(())
}
