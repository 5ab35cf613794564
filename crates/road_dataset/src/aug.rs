//! Resize and augmentation applied to image/label pairs.

use image::imageops::FilterType;
use image::RgbImage;
use rand::{Rng, SeedableRng};

#[derive(Debug, Clone)]
pub struct DatasetConfig {
    /// Model input as (height, width); images and labels are resized to it.
    pub image_shape: (u32, u32),
    /// Number of label planes (2 or 3).
    pub num_classes: usize,
    /// Probability of mirroring a pair horizontally.
    pub flip_horizontal_prob: f32,
    /// Shuffle samples at the start of every epoch.
    pub shuffle: bool,
    /// Seed for reproducible shuffling and augmentation.
    pub seed: Option<u64>,
    /// Drop the last partial batch of an epoch.
    pub drop_last: bool,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            image_shape: (160, 576),
            num_classes: 2,
            flip_horizontal_prob: 0.0,
            shuffle: true,
            seed: None,
            drop_last: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransformPipeline {
    pub image_shape: (u32, u32),
    pub flip_horizontal_prob: f32,
    pub seed: Option<u64>,
}

impl TransformPipeline {
    pub fn from_config(cfg: &DatasetConfig) -> Self {
        Self {
            image_shape: cfg.image_shape,
            flip_horizontal_prob: cfg.flip_horizontal_prob,
            seed: cfg.seed,
        }
    }

    pub fn describe(&self) -> String {
        let (h, w) = self.image_shape;
        format!(
            "image_shape={}x{} flip_p={:.2} seed={}",
            h,
            w,
            self.flip_horizontal_prob,
            self.seed
                .map(|s| s.to_string())
                .unwrap_or_else(|| "none".to_string())
        )
    }

    /// Resize both images to `image_shape` and apply the random flip.
    ///
    /// `sample_key` mixes into the seed so each sample draws independently.
    pub fn apply(&self, img: &RgbImage, gt: &RgbImage, sample_key: u64) -> (RgbImage, RgbImage) {
        let (h, w) = self.image_shape;
        let mut img = resize_image(img, w, h);
        let mut gt = resize_label(gt, w, h);

        if self.flip_horizontal_prob > 0.0 {
            let flip = match self.seed {
                Some(seed) => rand::rngs::StdRng::seed_from_u64(seed ^ sample_key)
                    .random::<f32>()
                    < self.flip_horizontal_prob,
                None => rand::rng().random::<f32>() < self.flip_horizontal_prob,
            };
            if flip {
                image::imageops::flip_horizontal_in_place(&mut img);
                image::imageops::flip_horizontal_in_place(&mut gt);
            }
        }
        (img, gt)
    }
}

pub fn resize_image(img: &RgbImage, width: u32, height: u32) -> RgbImage {
    if img.dimensions() == (width, height) {
        return img.clone();
    }
    image::imageops::resize(img, width, height, FilterType::Triangle)
}

/// Nearest-neighbour resize so label colours stay exact.
pub fn resize_label(gt: &RgbImage, width: u32, height: u32) -> RgbImage {
    if gt.dimensions() == (width, height) {
        return gt.clone();
    }
    image::imageops::resize(gt, width, height, FilterType::Nearest)
}

/// CHW float planes in [0, 1].
pub fn image_to_chw(img: &RgbImage) -> Vec<f32> {
    let (width, height) = img.dimensions();
    let mut out = Vec::with_capacity((width * height * 3) as usize);
    for c in 0..3 {
        for y in 0..height {
            for x in 0..width {
                out.push(img.get_pixel(x, y)[c] as f32 / 255.0);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn resizes_pair_to_image_shape() {
        let pipeline = TransformPipeline::from_config(&DatasetConfig {
            image_shape: (32, 64),
            ..Default::default()
        });
        let img = RgbImage::from_pixel(100, 40, Rgb([10, 20, 30]));
        let gt = RgbImage::from_pixel(100, 40, Rgb([255, 0, 0]));
        let (img, gt) = pipeline.apply(&img, &gt, 0);
        assert_eq!(img.dimensions(), (64, 32));
        assert_eq!(gt.dimensions(), (64, 32));
        assert!(gt.pixels().all(|p| p.0 == [255, 0, 0]));
    }

    #[test]
    fn certain_flip_mirrors_image_and_label_together() {
        let pipeline = TransformPipeline {
            image_shape: (1, 2),
            flip_horizontal_prob: 1.0,
            seed: Some(7),
        };
        let img = RgbImage::from_fn(2, 1, |x, _| Rgb([x as u8, 0, 0]));
        let gt = RgbImage::from_fn(2, 1, |x, _| Rgb([0, x as u8, 0]));
        let (img, gt) = pipeline.apply(&img, &gt, 3);
        assert_eq!(img.get_pixel(0, 0).0, [1, 0, 0]);
        assert_eq!(gt.get_pixel(0, 0).0, [0, 1, 0]);
    }

    #[test]
    fn chw_layout_is_planar() {
        let img = RgbImage::from_fn(2, 1, |x, _| Rgb([255 * x as u8, 0, 255]));
        assert_eq!(image_to_chw(&img), vec![0.0, 1.0, 0.0, 0.0, 1.0, 1.0]);
    }
}
