//! Indexing and loading of the KITTI road dataset layout.
//!
//! ```text
//! <data_dir>/data_road/training/image_2/um_000000.png
//! <data_dir>/data_road/training/gt_image_2/um_road_000000.png
//! <data_dir>/data_road/testing/image_2/um_000000.png
//! ```

use crate::aug::{image_to_chw, TransformPipeline};
use crate::labels::encode_label;
use crate::types::{DatasetError, DatasetResult, RoadSample, SamplePair};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const TRAINING_DIR: &str = "data_road/training";
pub const TESTING_DIR: &str = "data_road/testing";
pub const IMAGE_SUBDIR: &str = "image_2";
pub const LABEL_SUBDIR: &str = "gt_image_2";

pub fn training_root(data_dir: &Path) -> PathBuf {
    data_dir.join(TRAINING_DIR)
}

pub fn testing_images_dir(data_dir: &Path) -> PathBuf {
    data_dir.join(TESTING_DIR).join(IMAGE_SUBDIR)
}

/// Sorted `*.png` files directly under `dir`.
pub fn list_pngs(dir: &Path) -> DatasetResult<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(DatasetError::MissingDirectory {
            path: dir.to_path_buf(),
        });
    }
    let entries = fs::read_dir(dir).map_err(|e| DatasetError::Io {
        path: dir.to_path_buf(),
        source: e,
    })?;
    let mut paths: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|p| {
            p.extension()
                .and_then(|s| s.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("png"))
        })
        .collect();
    paths.sort();
    Ok(paths)
}

/// Map a ground-truth file name to the image file name it annotates
/// (`um_road_000000.png` -> `um_000000.png`).
pub fn image_name_for_label(label_name: &str) -> Option<String> {
    ["_road_", "_lane_"]
        .iter()
        .find_map(|tag| label_name.find(tag).map(|pos| (pos, tag.len())))
        .map(|(pos, len)| format!("{}_{}", &label_name[..pos], &label_name[pos + len..]))
}

/// Pair every training image with its `*_road_*` label.
pub fn index_pairs(training_root: &Path) -> DatasetResult<Vec<SamplePair>> {
    let images = list_pngs(&training_root.join(IMAGE_SUBDIR))?;
    let label_dir = training_root.join(LABEL_SUBDIR);
    let labels: HashMap<String, PathBuf> = list_pngs(&label_dir)?
        .into_iter()
        .filter_map(|path| {
            let name = path.file_name()?.to_str()?.to_string();
            if !name.contains("_road_") {
                return None;
            }
            image_name_for_label(&name).map(|key| (key, path))
        })
        .collect();

    let mut pairs = Vec::with_capacity(images.len());
    for image in images {
        let name = image
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        match labels.get(&name) {
            Some(label) => pairs.push(SamplePair {
                image,
                label: label.clone(),
            }),
            None => {
                let expected = label_dir.join(name.replacen('_', "_road_", 1));
                return Err(DatasetError::MissingLabel { image, expected });
            }
        }
    }
    Ok(pairs)
}

fn open_rgb(path: &Path) -> DatasetResult<image::RgbImage> {
    Ok(image::open(path)
        .map_err(|e| DatasetError::Image {
            path: path.to_path_buf(),
            source: e,
        })?
        .to_rgb8())
}

/// Decode, resize/augment and encode one pair.
pub fn load_sample(
    pair: &SamplePair,
    pipeline: &TransformPipeline,
    num_classes: usize,
    sample_key: u64,
) -> DatasetResult<RoadSample> {
    let img = open_rgb(&pair.image)?;
    let gt = open_rgb(&pair.label)?;
    if img.dimensions() != gt.dimensions() {
        let (image_w, image_h) = img.dimensions();
        let (label_w, label_h) = gt.dimensions();
        return Err(DatasetError::SizeMismatch {
            image: pair.image.clone(),
            label: pair.label.clone(),
            image_w,
            image_h,
            label_w,
            label_h,
        });
    }
    let (img, gt) = pipeline.apply(&img, &gt, sample_key);
    let (width, height) = img.dimensions();
    Ok(RoadSample {
        image_chw: image_to_chw(&img),
        label_chw: encode_label(&gt, num_classes)?,
        width,
        height,
    })
}
