//! Training for the FCN-8 road segmenter.
//!
//! - `objective`: per-pixel cross-entropy and the Adam update.
//! - `train_loop`: epoch/batch loop reporting every loss.
//! - `config`: TOML run configuration with CLI overrides.
//! - `download`: fetches the pretrained backbone bundle when absent.
//! - `run`: the end-to-end driver used by the `train` binary.

#![recursion_limit = "256"]

pub mod checkpoint;
pub mod config;
pub mod download;
pub mod objective;
pub mod run;
pub mod train_loop;

pub use checkpoint::{load_checkpoint, save_checkpoint, CheckpointMeta};
pub use config::{ConfigError, RunConfig};
pub use download::ensure_pretrained_vgg;
pub use objective::{flatten_logits, ObjectiveError, ObjectiveOutputs, SegmentationObjective, UpdateOp};
pub use run::{run_train, RunOutcome, TrainArgs};
pub use train_loop::{train_nn, EpochLosses, LoopConfig, TrainError, TrainReport};

/// Backend alias for training/eval (NdArray by default; WGPU if enabled).
#[cfg(feature = "backend-wgpu")]
pub type TrainBackend = burn_wgpu::Wgpu<f32>;
#[cfg(not(feature = "backend-wgpu"))]
pub type TrainBackend = burn_ndarray::NdArray<f32>;

pub type ADBackend = burn::backend::Autodiff<TrainBackend>;

/// Install the fmt subscriber; `RUST_LOG` overrides the `info` default.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
