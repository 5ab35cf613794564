//! Trained segmenter checkpoints: a burn record plus a JSON sidecar holding the
//! architecture needed to rebuild the module before loading it.

use anyhow::Context;
use burn::module::Module;
use burn::record::{BinFileRecorder, FullPrecisionSettings};
use burn::tensor::backend::Backend;
use models::{BackboneConfig, DecoderConfig, FcnSegmenter};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointMeta {
    pub backbone: BackboneConfig,
    pub decoder: DecoderConfig,
    /// (height, width) the model was trained at.
    pub image_shape: (u32, u32),
}

pub fn meta_path(path: &Path) -> PathBuf {
    path.with_extension("json")
}

pub fn save_checkpoint<B: Backend>(
    model: &FcnSegmenter<B>,
    image_shape: (u32, u32),
    path: &Path,
) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let meta = CheckpointMeta {
        backbone: model.backbone.config.0.clone(),
        decoder: model.decoder.config.0.clone(),
        image_shape,
    };
    let sidecar = meta_path(path);
    fs::write(&sidecar, serde_json::to_vec_pretty(&meta)?)
        .with_context(|| format!("failed to write {}", sidecar.display()))?;

    let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
    model
        .clone()
        .save_file(path, &recorder)
        .map_err(|e| anyhow::anyhow!("failed to save checkpoint: {e}"))?;
    tracing::info!(path = %path.display(), "saved checkpoint");
    Ok(())
}

pub fn load_checkpoint<B: Backend>(
    path: &Path,
    device: &B::Device,
) -> anyhow::Result<(FcnSegmenter<B>, CheckpointMeta)> {
    let sidecar = meta_path(path);
    let raw = fs::read(&sidecar)
        .with_context(|| format!("failed to read checkpoint metadata {}", sidecar.display()))?;
    let meta: CheckpointMeta = serde_json::from_slice(&raw)
        .with_context(|| format!("malformed checkpoint metadata {}", sidecar.display()))?;

    let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
    let model = FcnSegmenter::<B>::init(meta.backbone.clone(), meta.decoder.clone(), device)
        .load_file(path, &recorder, device)
        .map_err(|e| anyhow::anyhow!("failed to load checkpoint {}: {e}", path.display()))?;
    Ok((model, meta))
}
