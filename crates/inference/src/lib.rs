#![recursion_limit = "256"]

pub mod overlay;
pub mod sampler;

pub use overlay::{paint_mask, ROAD_OVERLAY};
pub use sampler::{gen_test_output, road_mask, save_inference_samples, ROAD_THRESHOLD};
