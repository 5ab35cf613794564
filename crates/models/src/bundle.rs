//! Pretrained backbone bundles: a manifest plus a burn parameter record.
//!
//! Layout of a bundle directory:
//! - `saved_model.json`: tag, backbone architecture, exported tensor names
//! - `variables.bin`: `BinFileRecorder` record (full precision)

use burn::module::Module;
use burn::record::{BinFileRecorder, FullPrecisionSettings};
use burn::tensor::backend::Backend;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::backbone::{BackboneConfig, Vgg16Backbone};

pub const VGG_TAG: &str = "vgg16";
pub const MANIFEST_FILE: &str = "saved_model.json";
pub const VARIABLES_FILE: &str = "variables.bin";

pub const IMAGE_INPUT_TENSOR: &str = "image_input:0";
pub const KEEP_PROB_TENSOR: &str = "keep_prob:0";
pub const LAYER3_OUT_TENSOR: &str = "layer3_out:0";
pub const LAYER4_OUT_TENSOR: &str = "layer4_out:0";
pub const LAYER7_OUT_TENSOR: &str = "layer7_out:0";

/// Entry points every bundle must export, in resolution order.
pub const REQUIRED_TENSORS: [&str; 5] = [
    IMAGE_INPUT_TENSOR,
    KEEP_PROB_TENSOR,
    LAYER3_OUT_TENSOR,
    LAYER4_OUT_TENSOR,
    LAYER7_OUT_TENSOR,
];

pub type BundleResult<T> = Result<T, BundleError>;

#[derive(Debug, Error)]
pub enum BundleError {
    #[error("pretrained bundle file missing: {path}")]
    MissingFile { path: PathBuf },
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed manifest at {path}: {source}")]
    Manifest {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("bundle tag {found:?} does not match expected {expected:?}")]
    TagMismatch { expected: String, found: String },
    #[error("bundle does not export tensor {name}")]
    MissingTensor { name: String },
    #[error("failed to load parameter record {path}: {msg}")]
    Record { path: PathBuf, msg: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleManifest {
    pub tag: String,
    pub backbone: BackboneConfig,
    pub tensors: Vec<String>,
}

impl BundleManifest {
    pub fn for_backbone(backbone: BackboneConfig) -> Self {
        Self {
            tag: VGG_TAG.to_string(),
            backbone,
            tensors: REQUIRED_TENSORS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointKind {
    Input,
    Scalar,
    FeatureMap,
}

/// A resolved named entry point of the backbone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub name: String,
    pub kind: EndpointKind,
    /// Channel count (0 for scalars).
    pub channels: usize,
    /// Spatial stride relative to the input image (0 for scalars).
    pub stride: usize,
}

/// Loaded backbone and its five resolved entry points.
#[derive(Debug)]
pub struct VggHandles<B: Backend> {
    pub backbone: Vgg16Backbone<B>,
    pub image_input: Endpoint,
    pub keep_prob: Endpoint,
    pub layer3_out: Endpoint,
    pub layer4_out: Endpoint,
    pub layer7_out: Endpoint,
}

impl<B: Backend> VggHandles<B> {
    pub fn endpoints(&self) -> [&Endpoint; 5] {
        [
            &self.image_input,
            &self.keep_prob,
            &self.layer3_out,
            &self.layer4_out,
            &self.layer7_out,
        ]
    }
}

pub fn read_manifest(vgg_path: &Path) -> BundleResult<BundleManifest> {
    let path = vgg_path.join(MANIFEST_FILE);
    if !path.exists() {
        return Err(BundleError::MissingFile { path });
    }
    let raw = fs::read(&path).map_err(|e| BundleError::Io {
        path: path.clone(),
        source: e,
    })?;
    serde_json::from_slice(&raw).map_err(|e| BundleError::Manifest { path, source: e })
}

fn resolve(manifest: &BundleManifest, name: &str) -> BundleResult<Endpoint> {
    if !manifest.tensors.iter().any(|t| t == name) {
        return Err(BundleError::MissingTensor {
            name: name.to_string(),
        });
    }
    let cfg = &manifest.backbone;
    let (kind, channels, stride) = match name {
        IMAGE_INPUT_TENSOR => (EndpointKind::Input, cfg.in_channels, 1),
        KEEP_PROB_TENSOR => (EndpointKind::Scalar, 0, 0),
        LAYER3_OUT_TENSOR => (EndpointKind::FeatureMap, cfg.layer3_channels(), 8),
        LAYER4_OUT_TENSOR => (EndpointKind::FeatureMap, cfg.layer4_channels(), 16),
        _ => (EndpointKind::FeatureMap, cfg.layer7_channels(), 32),
    };
    Ok(Endpoint {
        name: name.to_string(),
        kind,
        channels,
        stride,
    })
}

/// Load a pretrained backbone bundle and resolve its named entry points.
pub fn load_vgg<B: Backend>(vgg_path: &Path, device: &B::Device) -> BundleResult<VggHandles<B>> {
    let manifest = read_manifest(vgg_path)?;
    if manifest.tag != VGG_TAG {
        return Err(BundleError::TagMismatch {
            expected: VGG_TAG.to_string(),
            found: manifest.tag,
        });
    }
    let image_input = resolve(&manifest, IMAGE_INPUT_TENSOR)?;
    let keep_prob = resolve(&manifest, KEEP_PROB_TENSOR)?;
    let layer3_out = resolve(&manifest, LAYER3_OUT_TENSOR)?;
    let layer4_out = resolve(&manifest, LAYER4_OUT_TENSOR)?;
    let layer7_out = resolve(&manifest, LAYER7_OUT_TENSOR)?;

    let variables = vgg_path.join(VARIABLES_FILE);
    if !variables.exists() {
        return Err(BundleError::MissingFile { path: variables });
    }
    let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
    let backbone = Vgg16Backbone::<B>::new(manifest.backbone.clone(), device)
        .load_file(&variables, &recorder, device)
        .map_err(|e| BundleError::Record {
            path: variables.clone(),
            msg: e.to_string(),
        })?;
    tracing::info!(
        path = %vgg_path.display(),
        params = backbone.num_params(),
        "loaded pretrained backbone"
    );

    Ok(VggHandles {
        backbone,
        image_input,
        keep_prob,
        layer3_out,
        layer4_out,
        layer7_out,
    })
}

/// Write `backbone` as a bundle loadable by [`load_vgg`].
pub fn write_bundle<B: Backend>(dir: &Path, backbone: &Vgg16Backbone<B>) -> BundleResult<()> {
    fs::create_dir_all(dir).map_err(|e| BundleError::Io {
        path: dir.to_path_buf(),
        source: e,
    })?;
    let manifest = BundleManifest::for_backbone(backbone.config.0.clone());
    let manifest_path = dir.join(MANIFEST_FILE);
    let json = serde_json::to_vec_pretty(&manifest).map_err(|e| BundleError::Manifest {
        path: manifest_path.clone(),
        source: e,
    })?;
    fs::write(&manifest_path, json).map_err(|e| BundleError::Io {
        path: manifest_path,
        source: e,
    })?;

    let variables = dir.join(VARIABLES_FILE);
    let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
    backbone
        .clone()
        .save_file(&variables, &recorder)
        .map_err(|e| BundleError::Record {
            path: variables,
            msg: e.to_string(),
        })
}
