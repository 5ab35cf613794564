use anyhow::Context;
use burn::module::AutodiffModule;
use burn::tensor::backend::Backend;
use clap::Parser;
use inference::save_inference_samples;
use models::{load_vgg, DecoderConfig, FcnSegmenter};
use road_dataset::{check_kitti_layout, training_root, BatchGenerator};
use std::path::PathBuf;

use crate::checkpoint::save_checkpoint;
use crate::config::RunConfig;
use crate::download::ensure_pretrained_vgg;
use crate::train_loop::{train_nn, TrainReport};
use crate::{ADBackend, TrainBackend};

#[derive(Parser, Debug)]
#[command(
    name = "train",
    about = "Fine-tune an FCN-8 road segmenter on KITTI and write inference samples"
)]
pub struct TrainArgs {
    /// TOML run config (falls back to $FCN_ROAD_CONFIG, then ./fcn-road.toml).
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Directory holding data_road/ and vgg/.
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
    /// Where timestamped sample directories are written.
    #[arg(long)]
    pub runs_dir: Option<PathBuf>,
    #[arg(long)]
    pub epochs: Option<usize>,
    #[arg(long)]
    pub batch_size: Option<usize>,
    #[arg(long)]
    pub learning_rate: Option<f64>,
    /// Dropout keep probability during training.
    #[arg(long)]
    pub keep_prob: Option<f64>,
    /// Save the trained model here.
    #[arg(long)]
    pub checkpoint_out: Option<PathBuf>,
}

impl TrainArgs {
    /// Load the config file and apply command-line overrides on top.
    pub fn resolve(&self) -> anyhow::Result<RunConfig> {
        let mut cfg = RunConfig::load(self.config.as_deref())?;
        self.apply(&mut cfg);
        Ok(cfg)
    }

    pub fn apply(&self, cfg: &mut RunConfig) {
        if let Some(v) = &self.data_dir {
            cfg.data_dir = v.clone();
        }
        if let Some(v) = &self.runs_dir {
            cfg.runs_dir = v.clone();
        }
        if let Some(v) = self.epochs {
            cfg.epochs = v;
        }
        if let Some(v) = self.batch_size {
            cfg.batch_size = v;
        }
        if let Some(v) = self.learning_rate {
            cfg.learning_rate = v;
        }
        if let Some(v) = self.keep_prob {
            cfg.keep_prob = v;
        }
        if let Some(v) = &self.checkpoint_out {
            cfg.checkpoint_out = Some(v.clone());
        }
    }
}

/// What the build can say about GPU availability before any kernel runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpuStatus {
    /// Built with `backend-wgpu`; the adapter is only acquired on first use.
    WgpuAssumed,
    CpuOnly,
}

impl GpuStatus {
    pub fn for_build(built_wgpu: bool) -> Self {
        if built_wgpu {
            GpuStatus::WgpuAssumed
        } else {
            GpuStatus::CpuOnly
        }
    }
}

/// Log the numeric backend and warn when training would run on the CPU.
pub fn check_gpu(device: &<TrainBackend as Backend>::Device) -> GpuStatus {
    tracing::info!(backend = std::any::type_name::<TrainBackend>(), "burn backend");
    let status = GpuStatus::for_build(cfg!(feature = "backend-wgpu"));
    match status {
        GpuStatus::WgpuAssumed => tracing::info!(
            "Default GPU device: {device:?} (assumed; a missing adapter fails on first use)"
        ),
        GpuStatus::CpuOnly => {
            tracing::warn!("No GPU found. Please use a GPU to train your neural network.")
        }
    }
    status
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub report: TrainReport,
    pub samples_dir: PathBuf,
    pub checkpoint: Option<PathBuf>,
}

pub fn run_train(cfg: &RunConfig) -> anyhow::Result<RunOutcome> {
    let device = <TrainBackend as Backend>::Device::default();
    check_gpu(&device);
    cfg.validate()?;

    check_kitti_layout(&cfg.data_dir)
        .with_context(|| format!("KITTI road data not found under {}", cfg.data_dir.display()))?;
    let vgg_dir = cfg.vgg_dir();
    ensure_pretrained_vgg(&vgg_dir, cfg.vgg_url.as_deref())?;

    let handles = load_vgg::<ADBackend>(&vgg_dir, &device)?;
    for endpoint in handles.endpoints() {
        tracing::debug!(
            name = %endpoint.name,
            channels = endpoint.channels,
            stride = endpoint.stride,
            "resolved endpoint"
        );
    }
    let model = FcnSegmenter::new(handles.backbone, DecoderConfig::new(cfg.num_classes), &device);

    let mut generator =
        BatchGenerator::from_training_root(&training_root(&cfg.data_dir), cfg.dataset_config())?;
    if generator.is_empty() {
        anyhow::bail!("no training pairs under {}", training_root(&cfg.data_dir).display());
    }
    let (model, report) = train_nn(model, &mut generator, &cfg.loop_config(), &device)?;

    if let Some(path) = &cfg.checkpoint_out {
        save_checkpoint(&model, cfg.image_shape, path)?;
    }

    let model = model.valid();
    let samples_dir =
        save_inference_samples(&cfg.runs_dir, &cfg.data_dir, &model, cfg.image_shape, &device)?;

    Ok(RunOutcome {
        report,
        samples_dir,
        checkpoint: cfg.checkpoint_out.clone(),
    })
}
