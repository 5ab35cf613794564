use image::{Rgb, RgbImage};
use burn_ndarray::NdArray;
use inference::save_inference_samples;
use models::{BackboneConfig, DecoderConfig, FcnSegmenter};
use std::fs;

#[test]
fn writes_one_overlay_per_test_image() {
    let tmp = tempfile::tempdir().unwrap();
    let data_dir = tmp.path().join("data");
    let testing = data_dir.join("data_road/testing/image_2");
    fs::create_dir_all(&testing).unwrap();
    for name in ["um_000000.png", "umm_000001.png"] {
        RgbImage::from_pixel(70, 30, Rgb([120, 130, 140]))
            .save(testing.join(name))
            .unwrap();
    }

    let device = Default::default();
    let model = FcnSegmenter::<NdArray<f32>>::init(
        BackboneConfig::tiny(),
        DecoderConfig::new(2),
        &device,
    );
    let runs_dir = tmp.path().join("runs");
    let out = save_inference_samples(&runs_dir, &data_dir, &model, (32, 64), &device).unwrap();

    assert!(out.starts_with(&runs_dir));
    let mut written: Vec<String> = fs::read_dir(&out)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    written.sort();
    assert_eq!(written, vec!["um_000000.png", "umm_000001.png"]);
    let sample = image::open(out.join("um_000000.png")).unwrap();
    assert_eq!((sample.width(), sample.height()), (64, 32));
}

#[test]
fn missing_testing_dir_fails() {
    let tmp = tempfile::tempdir().unwrap();
    let device = Default::default();
    let model = FcnSegmenter::<NdArray<f32>>::init(
        BackboneConfig::tiny(),
        DecoderConfig::new(2),
        &device,
    );
    let result = save_inference_samples(tmp.path(), tmp.path(), &model, (32, 32), &device);
    assert!(result.is_err());
}
