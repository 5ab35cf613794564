//! KITTI road dataset indexing, label encoding and Burn-compatible batching.
//!
//! This crate provides utilities for:
//! - Pairing training images with their ground-truth label images
//! - Decoding label colours into one-hot class planes
//! - Resize/flip augmentation of image/label pairs
//! - Restartable per-epoch batch iteration producing burn tensors

pub mod aug;
pub mod batch;
pub mod kitti;
pub mod labels;
pub mod types;
pub mod validation;

pub use aug::{DatasetConfig, TransformPipeline};
pub use batch::{BatchGenerator, BatchIter, RoadBatch};
pub use kitti::{index_pairs, list_pngs, load_sample, testing_images_dir, training_root};
pub use labels::{encode_label, BACKGROUND_COLOR, ROAD_COLOR};
pub use types::*;
pub use validation::{check_kitti_layout, KITTI_COUNTS};
