//! FCN-8 decoder: 1x1 class scoring, transposed-conv upsampling and skip additions.

use burn::module::{Ignored, Module};
use burn::nn::conv::{Conv2d, Conv2dConfig, ConvTranspose2d, ConvTranspose2dConfig};
use burn::nn::PaddingConfig2d;
use burn::tensor::{backend::Backend, Tensor};
use serde::{Deserialize, Serialize};

use crate::backbone::{BackboneConfig, BackboneFeatures};

/// Weight penalty applied to every decoder kernel.
pub const DEFAULT_L2_SCALE: f32 = 1e-3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecoderConfig {
    pub num_classes: usize,
    pub l2_scale: f32,
}

impl DecoderConfig {
    pub fn new(num_classes: usize) -> Self {
        Self {
            num_classes,
            l2_scale: DEFAULT_L2_SCALE,
        }
    }
}

#[derive(Module, Debug)]
pub struct Fcn8Decoder<B: Backend> {
    score7: Conv2d<B>,
    upscore2: ConvTranspose2d<B>,
    score4: Conv2d<B>,
    upscore4: ConvTranspose2d<B>,
    score3: Conv2d<B>,
    upscore8: ConvTranspose2d<B>,
    pub config: Ignored<DecoderConfig>,
}

fn score_layer<B: Backend>(in_channels: usize, classes: usize, device: &B::Device) -> Conv2d<B> {
    Conv2dConfig::new([in_channels, classes], [1, 1])
        .with_padding(PaddingConfig2d::Valid)
        .init(device)
}

/// Transposed conv that multiplies height and width by exactly `factor`.
fn upsample_layer<B: Backend>(classes: usize, factor: usize, device: &B::Device) -> ConvTranspose2d<B> {
    let kernel = factor * 2;
    let padding = factor / 2;
    ConvTranspose2dConfig::new([classes, classes], [kernel, kernel])
        .with_stride([factor, factor])
        .with_padding([padding, padding])
        .init(device)
}

impl<B: Backend> Fcn8Decoder<B> {
    pub fn new(config: DecoderConfig, backbone: &BackboneConfig, device: &B::Device) -> Self {
        let classes = config.num_classes.max(1);
        Self {
            score7: score_layer(backbone.layer7_channels(), classes, device),
            upscore2: upsample_layer(classes, 2, device),
            score4: score_layer(backbone.layer4_channels(), classes, device),
            upscore4: upsample_layer(classes, 2, device),
            score3: score_layer(backbone.layer3_channels(), classes, device),
            upscore8: upsample_layer(classes, 8, device),
            config: Ignored(config),
        }
    }

    pub fn num_classes(&self) -> usize {
        self.config.num_classes.max(1)
    }

    /// Decode backbone taps into per-pixel class scores `[B, num_classes, H, W]`.
    ///
    /// The skip maps are scored to `num_classes` channels before each addition.
    pub fn forward(&self, features: BackboneFeatures<B>) -> Tensor<B, 4> {
        let x = self.score7.forward(features.layer7_out);
        let x = self.upscore2.forward(x) + self.score4.forward(features.layer4_out);
        let x = self.upscore4.forward(x) + self.score3.forward(features.layer3_out);
        self.upscore8.forward(x)
    }

    /// `l2_scale * sum(w^2) / 2` over every decoder kernel.
    pub fn l2_penalty(&self) -> Tensor<B, 1> {
        let squared = |w: Tensor<B, 4>| w.powf_scalar(2.0).sum();
        let total = squared(self.score7.weight.val())
            + squared(self.upscore2.weight.val())
            + squared(self.score4.weight.val())
            + squared(self.upscore4.weight.val())
            + squared(self.score3.weight.val())
            + squared(self.upscore8.weight.val());
        total.mul_scalar(self.config.l2_scale * 0.5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backbone::Vgg16Backbone;
    use burn_ndarray::NdArray;

    type B = NdArray<f32>;

    #[test]
    fn output_matches_input_resolution_for_several_class_counts() {
        let device = Default::default();
        let backbone_cfg = BackboneConfig::tiny();
        let backbone = Vgg16Backbone::<B>::new(backbone_cfg.clone(), &device);
        for classes in [1usize, 2, 3, 5] {
            let decoder = Fcn8Decoder::<B>::new(DecoderConfig::new(classes), &backbone_cfg, &device);
            let images = Tensor::<B, 4>::zeros([1, 3, 64, 128], &device);
            let scores = decoder.forward(backbone.forward(images, 1.0));
            assert_eq!(scores.dims(), [1, classes, 64, 128]);
        }
    }

    #[test]
    fn l2_penalty_is_positive_and_scales() {
        let device = Default::default();
        let backbone_cfg = BackboneConfig::tiny();
        let mut cfg = DecoderConfig::new(2);
        let decoder = Fcn8Decoder::<B>::new(cfg.clone(), &backbone_cfg, &device);
        let base = decoder.l2_penalty().into_data().to_vec::<f32>().unwrap()[0];
        assert!(base > 0.0);

        cfg.l2_scale = 0.0;
        let silent = Fcn8Decoder::<B>::new(cfg, &backbone_cfg, &device);
        let zero = silent.l2_penalty().into_data().to_vec::<f32>().unwrap()[0];
        assert_eq!(zero, 0.0);
    }
}
