//! Core types and error definitions for road_dataset.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

pub type DatasetResult<T> = Result<T, DatasetError>;

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("dataset directory missing: {path}")]
    MissingDirectory { path: PathBuf },
    #[error("dataset directory contains no png files: {path}")]
    EmptyDirectory { path: PathBuf },
    #[error("no ground-truth label for {image} (expected {expected})")]
    MissingLabel { image: PathBuf, expected: PathBuf },
    #[error("image decode error at {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("label {label} is {label_w}x{label_h} but image {image} is {image_w}x{image_h}")]
    SizeMismatch {
        image: PathBuf,
        label: PathBuf,
        image_w: u32,
        image_h: u32,
        label_w: u32,
        label_h: u32,
    },
    #[error("unsupported class count {0}; expected 2 or 3")]
    UnsupportedClasses(usize),
    #[error("{0}")]
    Other(String),
}

/// A training image and its ground-truth label image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplePair {
    pub image: PathBuf,
    pub label: PathBuf,
}

#[derive(Debug, Clone)]
pub struct RoadSample {
    /// Image in CHW layout, normalized to [0, 1].
    pub image_chw: Vec<f32>,
    /// One-hot label in CHW layout (`num_classes` planes).
    pub label_chw: Vec<f32>,
    pub width: u32,
    pub height: u32,
}

/// File counts found under a KITTI road data directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutSummary {
    pub training_images: usize,
    pub training_labels: usize,
    pub testing_images: usize,
}
