use burn::module::Module;
use burn::tensor::{backend::Backend, Tensor};
use thiserror::Error;

use crate::backbone::{BackboneConfig, Vgg16Backbone, OUTPUT_STRIDE};
use crate::decoder::{DecoderConfig, Fcn8Decoder};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ShapeError {
    #[error("input {height}x{width} is not a multiple of {} on both sides", OUTPUT_STRIDE)]
    NotDivisible { height: usize, width: usize },
    #[error("input has {actual} channels, backbone expects {expected}")]
    Channels { actual: usize, expected: usize },
}

/// Reject image sizes whose skip maps would not line up after upsampling.
pub fn check_image_shape(height: usize, width: usize) -> Result<(), ShapeError> {
    if height == 0 || width == 0 || height % OUTPUT_STRIDE != 0 || width % OUTPUT_STRIDE != 0 {
        return Err(ShapeError::NotDivisible { height, width });
    }
    Ok(())
}

/// Backbone plus FCN-8 decoder: images `[B, 3, H, W]` to scores `[B, C, H, W]`.
#[derive(Module, Debug)]
pub struct FcnSegmenter<B: Backend> {
    pub backbone: Vgg16Backbone<B>,
    pub decoder: Fcn8Decoder<B>,
}

impl<B: Backend> FcnSegmenter<B> {
    /// Attach a freshly initialized decoder to a (usually pretrained) backbone.
    pub fn new(backbone: Vgg16Backbone<B>, decoder: DecoderConfig, device: &B::Device) -> Self {
        let decoder = Fcn8Decoder::new(decoder, &backbone.config, device);
        Self { backbone, decoder }
    }

    /// Randomly initialized model; used when restoring from a checkpoint record.
    pub fn init(backbone: BackboneConfig, decoder: DecoderConfig, device: &B::Device) -> Self {
        Self::new(Vgg16Backbone::new(backbone, device), decoder, device)
    }

    pub fn num_classes(&self) -> usize {
        self.decoder.num_classes()
    }

    pub fn check_input(&self, dims: [usize; 4]) -> Result<(), ShapeError> {
        let expected = self.backbone.config.in_channels;
        if dims[1] != expected {
            return Err(ShapeError::Channels {
                actual: dims[1],
                expected,
            });
        }
        check_image_shape(dims[2], dims[3])
    }

    pub fn forward(&self, images: Tensor<B, 4>, keep_prob: f64) -> Tensor<B, 4> {
        self.decoder.forward(self.backbone.forward(images, keep_prob))
    }
}
