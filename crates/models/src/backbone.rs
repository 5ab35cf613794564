//! VGG16-style feature extractor exposing the three taps FCN-8 decodes from.
//!
//! Shapes (channels-first):
//! - Input images: `[B, 3, H, W]`, values in 0..1
//! - `layer3_out`: `[B, block_channels[2], H/8, W/8]` (pool3)
//! - `layer4_out`: `[B, block_channels[3], H/16, W/16]` (pool4)
//! - `layer7_out`: `[B, fc_channels, H/32, W/32]` (fc7 as a convolution)

use burn::module::{Ignored, Module};
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::pool::{MaxPool2d, MaxPool2dConfig};
use burn::nn::PaddingConfig2d;
use burn::tensor::activation::relu;
use burn::tensor::{backend::Backend, Distribution, Tensor};
use serde::{Deserialize, Serialize};

/// Total downsampling of the deepest tap; input sides must be multiples of this.
pub const OUTPUT_STRIDE: usize = 32;

/// Architecture description persisted alongside the backbone weights.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackboneConfig {
    pub in_channels: usize,
    /// Output channels of the five conv blocks.
    pub block_channels: [usize; 5],
    /// Number of 3x3 convolutions per block.
    pub block_depths: [usize; 5],
    /// Width of fc6/fc7 (expressed as convolutions).
    pub fc_channels: usize,
    /// Kernel size of fc6; must be odd.
    pub fc6_kernel: usize,
}

impl BackboneConfig {
    pub fn vgg16() -> Self {
        Self {
            in_channels: 3,
            block_channels: [64, 128, 256, 512, 512],
            block_depths: [2, 2, 3, 3, 3],
            fc_channels: 4096,
            fc6_kernel: 7,
        }
    }

    /// Narrow variant with the same topology; cheap enough for CPU smoke runs.
    pub fn tiny() -> Self {
        Self {
            in_channels: 3,
            block_channels: [4, 4, 8, 8, 8],
            block_depths: [1, 1, 1, 1, 1],
            fc_channels: 8,
            fc6_kernel: 3,
        }
    }

    pub fn layer3_channels(&self) -> usize {
        self.block_channels[2]
    }

    pub fn layer4_channels(&self) -> usize {
        self.block_channels[3]
    }

    pub fn layer7_channels(&self) -> usize {
        self.fc_channels
    }
}

impl Default for BackboneConfig {
    fn default() -> Self {
        Self::vgg16()
    }
}

#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    convs: Vec<Conv2d<B>>,
}

impl<B: Backend> ConvBlock<B> {
    fn new(in_channels: usize, out_channels: usize, depth: usize, device: &B::Device) -> Self {
        let mut convs = Vec::with_capacity(depth.max(1));
        let mut channels = in_channels;
        for _ in 0..depth.max(1) {
            convs.push(
                Conv2dConfig::new([channels, out_channels], [3, 3])
                    .with_padding(PaddingConfig2d::Same)
                    .init(device),
            );
            channels = out_channels;
        }
        Self { convs }
    }

    fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        self.convs
            .iter()
            .fold(input, |x, conv| relu(conv.forward(x)))
    }
}

/// Feature maps handed to the decoder.
#[derive(Debug, Clone)]
pub struct BackboneFeatures<B: Backend> {
    pub layer3_out: Tensor<B, 4>,
    pub layer4_out: Tensor<B, 4>,
    pub layer7_out: Tensor<B, 4>,
}

#[derive(Module, Debug)]
pub struct Vgg16Backbone<B: Backend> {
    block1: ConvBlock<B>,
    block2: ConvBlock<B>,
    block3: ConvBlock<B>,
    block4: ConvBlock<B>,
    block5: ConvBlock<B>,
    fc6: Conv2d<B>,
    fc7: Conv2d<B>,
    pool: MaxPool2d,
    pub config: Ignored<BackboneConfig>,
}

impl<B: Backend> Vgg16Backbone<B> {
    pub fn new(config: BackboneConfig, device: &B::Device) -> Self {
        let ch = config.block_channels;
        let depth = config.block_depths;
        let block1 = ConvBlock::new(config.in_channels, ch[0], depth[0], device);
        let block2 = ConvBlock::new(ch[0], ch[1], depth[1], device);
        let block3 = ConvBlock::new(ch[1], ch[2], depth[2], device);
        let block4 = ConvBlock::new(ch[2], ch[3], depth[3], device);
        let block5 = ConvBlock::new(ch[3], ch[4], depth[4], device);
        let fc6 = Conv2dConfig::new(
            [ch[4], config.fc_channels],
            [config.fc6_kernel, config.fc6_kernel],
        )
        .with_padding(PaddingConfig2d::Same)
        .init(device);
        let fc7 = Conv2dConfig::new([config.fc_channels, config.fc_channels], [1, 1])
            .with_padding(PaddingConfig2d::Valid)
            .init(device);
        let pool = MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init();

        Self {
            block1,
            block2,
            block3,
            block4,
            block5,
            fc6,
            fc7,
            pool,
            config: Ignored(config),
        }
    }

    /// Run the extractor. `keep_prob` feeds the fc6/fc7 dropout; pass 1.0 for inference.
    pub fn forward(&self, images: Tensor<B, 4>, keep_prob: f64) -> BackboneFeatures<B> {
        let x = self.pool.forward(self.block1.forward(images));
        let x = self.pool.forward(self.block2.forward(x));
        let layer3_out = self.pool.forward(self.block3.forward(x));
        let layer4_out = self.pool.forward(self.block4.forward(layer3_out.clone()));
        let x = self.pool.forward(self.block5.forward(layer4_out.clone()));

        let x = dropout(relu(self.fc6.forward(x)), keep_prob);
        let layer7_out = dropout(relu(self.fc7.forward(x)), keep_prob);

        BackboneFeatures {
            layer3_out,
            layer4_out,
            layer7_out,
        }
    }
}

/// Inverted dropout driven by a per-call keep probability.
pub fn dropout<B: Backend, const D: usize>(x: Tensor<B, D>, keep_prob: f64) -> Tensor<B, D> {
    if keep_prob >= 1.0 {
        return x;
    }
    let keep_prob = keep_prob.max(f64::EPSILON);
    let mask = x.random_like(Distribution::Bernoulli(keep_prob));
    (x * mask).div_scalar(keep_prob)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type B = NdArray<f32>;

    #[test]
    fn taps_have_expected_strides_and_channels() {
        let device = Default::default();
        let cfg = BackboneConfig::tiny();
        let backbone = Vgg16Backbone::<B>::new(cfg.clone(), &device);
        let images = Tensor::<B, 4>::zeros([2, 3, 64, 96], &device);

        let feats = backbone.forward(images, 1.0);

        assert_eq!(feats.layer3_out.dims(), [2, cfg.layer3_channels(), 8, 12]);
        assert_eq!(feats.layer4_out.dims(), [2, cfg.layer4_channels(), 4, 6]);
        assert_eq!(feats.layer7_out.dims(), [2, cfg.layer7_channels(), 2, 3]);
    }

    #[test]
    fn dropout_keep_one_is_identity() {
        let device = Default::default();
        let x = Tensor::<B, 2>::ones([3, 4], &device);
        let y = dropout(x.clone(), 1.0);
        assert_eq!(
            x.into_data().to_vec::<f32>().unwrap(),
            y.into_data().to_vec::<f32>().unwrap()
        );
    }

    #[test]
    fn dropout_rescales_kept_units() {
        let device = Default::default();
        let x = Tensor::<B, 2>::ones([16, 16], &device);
        let values = dropout(x, 0.5).into_data().to_vec::<f32>().unwrap();
        assert!(values.iter().all(|v| *v == 0.0 || (*v - 2.0).abs() < 1e-6));
    }
}
