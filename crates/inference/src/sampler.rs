use anyhow::Context;
use burn::tensor::activation::softmax;
use burn::tensor::{backend::Backend, Tensor, TensorData};
use image::RgbImage;
use models::FcnSegmenter;
use road_dataset::aug::{image_to_chw, resize_image};
use road_dataset::{list_pngs, testing_images_dir};
use std::fs;
use std::path::{Path, PathBuf};

use crate::overlay::{paint_mask, ROAD_OVERLAY};

/// Softmax probability above which a pixel is drawn as road.
pub const ROAD_THRESHOLD: f32 = 0.5;

/// Class plane treated as road (the "not background" plane).
pub const ROAD_CLASS: usize = 1;

/// Per-pixel road mask for an image already at model resolution.
pub fn road_mask<B: Backend>(
    model: &FcnSegmenter<B>,
    image: &RgbImage,
    device: &B::Device,
) -> anyhow::Result<Vec<bool>> {
    let (w, h) = image.dimensions();
    let (w, h) = (w as usize, h as usize);
    model.check_input([1, 3, h, w])?;
    let input = Tensor::<B, 4>::from_data(TensorData::new(image_to_chw(image), [1, 3, h, w]), device);

    let probs = softmax(model.forward(input, 1.0), 1);
    let road = probs.slice([0..1, ROAD_CLASS..ROAD_CLASS + 1, 0..h, 0..w]);
    let values = road
        .into_data()
        .to_vec::<f32>()
        .map_err(|e| anyhow::anyhow!("failed to read road probabilities: {e:?}"))?;
    Ok(values.into_iter().map(|p| p > ROAD_THRESHOLD).collect())
}

/// Run the model over every testing image, yielding `(file name, overlay)`.
///
/// `image_shape` is (height, width) of the model input.
pub fn gen_test_output<B: Backend>(
    model: &FcnSegmenter<B>,
    data_dir: &Path,
    image_shape: (u32, u32),
    device: &B::Device,
) -> anyhow::Result<Vec<(String, RgbImage)>> {
    let (height, width) = image_shape;
    let images = list_pngs(&testing_images_dir(data_dir))?;
    let mut outputs = Vec::with_capacity(images.len());
    for path in images {
        let name = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("sample.png")
            .to_string();
        let img = image::open(&path)
            .with_context(|| format!("failed to open test image {}", path.display()))?
            .to_rgb8();
        let img = resize_image(&img, width, height);
        let mask = road_mask(model, &img, device)?;
        let overlay = paint_mask(&img, &mask, ROAD_OVERLAY)
            .with_context(|| format!("failed to paint {}", path.display()))?;
        outputs.push((name, overlay));
    }
    Ok(outputs)
}

/// Write overlays for the testing split under `runs_dir/<timestamp>/` and return that directory.
pub fn save_inference_samples<B: Backend>(
    runs_dir: &Path,
    data_dir: &Path,
    model: &FcnSegmenter<B>,
    image_shape: (u32, u32),
    device: &B::Device,
) -> anyhow::Result<PathBuf> {
    let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%S%.3f").to_string();
    let output_dir = runs_dir.join(stamp);
    if output_dir.exists() {
        fs::remove_dir_all(&output_dir)
            .with_context(|| format!("failed to clear {}", output_dir.display()))?;
    }
    fs::create_dir_all(&output_dir)
        .with_context(|| format!("failed to create {}", output_dir.display()))?;

    tracing::info!(dir = %output_dir.display(), "training finished; saving test images");
    let outputs = gen_test_output(model, data_dir, image_shape, device)?;
    for (name, img) in &outputs {
        let path = output_dir.join(name);
        img.save(&path)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }
    tracing::info!(count = outputs.len(), dir = %output_dir.display(), "saved inference samples");
    Ok(output_dir)
}
