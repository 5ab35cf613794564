//! Burn models for KITTI road segmentation.
//!
//! - `Vgg16Backbone`: VGG16-style encoder exposing pool3, pool4 and fc7 taps.
//! - `Fcn8Decoder`: FCN-8 head that scores, upsamples and fuses those taps.
//! - `FcnSegmenter`: the two composed, producing `[B, classes, H, W]` scores.
//! - `bundle`: loading/writing pretrained backbone bundles.

#![recursion_limit = "256"]

pub mod backbone;
pub mod bundle;
pub mod decoder;
pub mod segmenter;

pub use backbone::{dropout, BackboneConfig, BackboneFeatures, Vgg16Backbone, OUTPUT_STRIDE};
pub use bundle::{load_vgg, write_bundle, BundleError, BundleResult, Endpoint, EndpointKind, VggHandles};
pub use decoder::{DecoderConfig, Fcn8Decoder, DEFAULT_L2_SCALE};
pub use segmenter::{check_image_shape, FcnSegmenter, ShapeError};
