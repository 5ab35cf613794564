use burn::backend::Autodiff;
use burn_ndarray::NdArray;
use image::{Rgb, RgbImage};
use models::{write_bundle, BackboneConfig, DecoderConfig, FcnSegmenter, Vgg16Backbone};
use road_dataset::{training_root, BatchGenerator, DatasetConfig, BACKGROUND_COLOR, ROAD_COLOR};
use std::fs;
use std::path::Path;
use training::{
    load_checkpoint, run_train, train_nn, LoopConfig, ObjectiveError, RunConfig, TrainError,
};

type B = NdArray<f32>;
type AD = Autodiff<NdArray<f32>>;

/// KITTI-style tree with `count` training pairs and one testing image.
fn synthetic_kitti(data_dir: &Path, count: usize, width: u32, height: u32) {
    let train = data_dir.join("data_road/training");
    let images = train.join("image_2");
    let labels = train.join("gt_image_2");
    let testing = data_dir.join("data_road/testing/image_2");
    for dir in [&images, &labels, &testing] {
        fs::create_dir_all(dir).unwrap();
    }
    for i in 0..count {
        let img = RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, (i * 40) as u8])
        });
        img.save(images.join(format!("um_{i:06}.png"))).unwrap();
        let gt = RgbImage::from_fn(width, height, |_, y| {
            if y >= height / 2 {
                Rgb(ROAD_COLOR)
            } else {
                Rgb(BACKGROUND_COLOR)
            }
        });
        gt.save(labels.join(format!("um_road_{i:06}.png"))).unwrap();
    }
    RgbImage::from_pixel(width, height, Rgb([60, 60, 60]))
        .save(testing.join("um_000000.png"))
        .unwrap();
}

fn tiny_segmenter(num_classes: usize) -> FcnSegmenter<AD> {
    FcnSegmenter::init(
        BackboneConfig::tiny(),
        DecoderConfig::new(num_classes),
        &Default::default(),
    )
}

#[test]
fn single_pair_run_trains_one_step_and_writes_samples() {
    let tmp = tempfile::tempdir().unwrap();
    let data_dir = tmp.path().join("data");
    synthetic_kitti(&data_dir, 1, 576, 160);
    let backbone = Vgg16Backbone::<B>::new(BackboneConfig::tiny(), &Default::default());
    write_bundle(&data_dir.join("vgg"), &backbone).unwrap();

    let checkpoint = tmp.path().join("checkpoints/fcn_road.bin");
    let cfg = RunConfig {
        data_dir: data_dir.clone(),
        runs_dir: tmp.path().join("runs"),
        epochs: 1,
        batch_size: 1,
        seed: Some(5),
        checkpoint_out: Some(checkpoint.clone()),
        ..RunConfig::default()
    };
    let outcome = run_train(&cfg).unwrap();

    assert_eq!(outcome.report.total_steps(), 1);
    let loss = outcome.report.final_loss().unwrap();
    assert!(loss.is_finite() && loss >= 0.0, "loss {loss}");

    let written: Vec<_> = fs::read_dir(&outcome.samples_dir).unwrap().collect();
    assert_eq!(written.len(), 1);
    assert!(outcome.samples_dir.starts_with(tmp.path().join("runs")));

    let (model, meta) = load_checkpoint::<B>(&checkpoint, &Default::default()).unwrap();
    assert_eq!(meta.image_shape, (160, 576));
    assert_eq!(model.num_classes(), 2);
}

#[test]
fn reports_one_loss_per_batch_per_epoch() {
    let tmp = tempfile::tempdir().unwrap();
    synthetic_kitti(tmp.path(), 3, 80, 40);
    let cfg = DatasetConfig {
        image_shape: (32, 64),
        seed: Some(1),
        ..Default::default()
    };
    let mut generator = BatchGenerator::from_training_root(&training_root(tmp.path()), cfg).unwrap();
    let loop_cfg = LoopConfig {
        epochs: 2,
        batch_size: 2,
        ..LoopConfig::default()
    };
    let per_epoch = generator.batches_per_epoch(loop_cfg.batch_size);
    assert_eq!(per_epoch, 2);

    let (_, report) = train_nn(tiny_segmenter(2), &mut generator, &loop_cfg, &Default::default()).unwrap();
    assert_eq!(report.total_steps(), loop_cfg.epochs * per_epoch);
    assert_eq!(report.epochs.len(), 2);
    assert!(report.losses().all(|l| l.is_finite() && l >= 0.0));
}

#[test]
fn decoder_and_label_class_counts_must_agree() {
    let tmp = tempfile::tempdir().unwrap();
    synthetic_kitti(tmp.path(), 1, 64, 32);
    let cfg = DatasetConfig {
        image_shape: (32, 64),
        num_classes: 2,
        ..Default::default()
    };
    let mut generator = BatchGenerator::from_training_root(&training_root(tmp.path()), cfg).unwrap();
    let loop_cfg = LoopConfig {
        epochs: 1,
        batch_size: 1,
        ..LoopConfig::default()
    };
    let err = train_nn(tiny_segmenter(3), &mut generator, &loop_cfg, &Default::default())
        .err()
        .unwrap();
    assert!(matches!(
        err,
        TrainError::Objective(ObjectiveError::ShapeMismatch { .. })
    ));
}

#[test]
fn non_finite_loss_stops_training() {
    let tmp = tempfile::tempdir().unwrap();
    synthetic_kitti(tmp.path(), 4, 64, 32);
    let cfg = DatasetConfig {
        image_shape: (32, 64),
        seed: Some(9),
        ..Default::default()
    };
    let mut generator = BatchGenerator::from_training_root(&training_root(tmp.path()), cfg).unwrap();
    let loop_cfg = LoopConfig {
        epochs: 1,
        batch_size: 1,
        keep_prob: 1.0,
        learning_rate: 1e30,
    };
    let err = train_nn(tiny_segmenter(2), &mut generator, &loop_cfg, &Default::default())
        .err()
        .unwrap();
    assert!(matches!(err, TrainError::Diverged { epoch: 0, .. }), "{err}");
    if let TrainError::Diverged { batch, loss, .. } = err {
        assert!(batch >= 1);
        assert!(!loss.is_finite());
    }
}

#[test]
fn run_fails_fast_without_dataset() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = RunConfig {
        data_dir: tmp.path().join("missing"),
        runs_dir: tmp.path().join("runs"),
        ..RunConfig::default()
    };
    let err = run_train(&cfg).unwrap_err();
    assert!(format!("{err:#}").contains("KITTI road data not found"));
    assert!(!tmp.path().join("runs").exists());
}
