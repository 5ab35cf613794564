//! Ground-truth colour decoding.
//!
//! KITTI road labels paint non-road pixels red and road pixels magenta; anything
//! else (black) is an unlabeled region.

use crate::types::{DatasetError, DatasetResult};
use image::RgbImage;

pub const BACKGROUND_COLOR: [u8; 3] = [255, 0, 0];
pub const ROAD_COLOR: [u8; 3] = [255, 0, 255];

/// Class planes produced for a given class count.
///
/// - 2 classes: `[background, not background]`
/// - 3 classes: `[background, road, other]`
pub fn check_num_classes(num_classes: usize) -> DatasetResult<()> {
    match num_classes {
        2 | 3 => Ok(()),
        n => Err(DatasetError::UnsupportedClasses(n)),
    }
}

fn class_of(px: [u8; 3], num_classes: usize) -> usize {
    if px == BACKGROUND_COLOR {
        0
    } else if num_classes == 2 || px == ROAD_COLOR {
        1
    } else {
        2
    }
}

/// Encode a label image as one-hot planes in CHW order.
pub fn encode_label(gt: &RgbImage, num_classes: usize) -> DatasetResult<Vec<f32>> {
    check_num_classes(num_classes)?;
    let (w, h) = gt.dimensions();
    let plane = (w * h) as usize;
    let mut out = vec![0.0f32; plane * num_classes];
    for (x, y, px) in gt.enumerate_pixels() {
        let class = class_of(px.0, num_classes);
        let offset = (y * w + x) as usize;
        out[class * plane + offset] = 1.0;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn sample_label() -> RgbImage {
        // Left column background, middle road, right unlabeled.
        RgbImage::from_fn(3, 1, |x, _| match x {
            0 => Rgb(BACKGROUND_COLOR),
            1 => Rgb(ROAD_COLOR),
            _ => Rgb([0, 0, 0]),
        })
    }

    #[test]
    fn two_class_encoding_splits_background() {
        let planes = encode_label(&sample_label(), 2).unwrap();
        assert_eq!(planes, vec![1.0, 0.0, 0.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn three_class_encoding_separates_road() {
        let planes = encode_label(&sample_label(), 3).unwrap();
        assert_eq!(
            planes,
            vec![1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0]
        );
    }

    #[test]
    fn every_pixel_is_one_hot() {
        let img = RgbImage::from_fn(4, 4, |x, y| Rgb([(x * 60) as u8, 0, (y * 80) as u8]));
        for classes in [2, 3] {
            let planes = encode_label(&img, classes).unwrap();
            for p in 0..16 {
                let sum: f32 = (0..classes).map(|c| planes[c * 16 + p]).sum();
                assert_eq!(sum, 1.0);
            }
        }
    }

    #[test]
    fn rejects_other_class_counts() {
        assert!(matches!(
            encode_label(&sample_label(), 4),
            Err(DatasetError::UnsupportedClasses(4))
        ));
    }
}
