use std::path::PathBuf;
use training::{ConfigError, RunConfig};

#[test]
fn reads_sections_and_expands_paths() {
    std::env::set_var("FCN_ROAD_IT_DATA", "/mnt/kitti");
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("fcn-road.toml");
    std::fs::write(
        &path,
        r#"
data_dir = "${FCN_ROAD_IT_DATA}/data"
runs_dir = "out/runs"
vgg_url = "https://example.invalid/vgg"
checkpoint_out = "checkpoints/fcn.bin"

[model]
num_classes = 3
image_shape = [96, 320]

[train]
epochs = 12
batch_size = 8
learning_rate = 0.0005
keep_prob = 0.5
seed = 42
flip_horizontal_prob = 0.5
"#,
    )
    .unwrap();

    let cfg = RunConfig::load(Some(&path)).unwrap();
    assert_eq!(cfg.data_dir, PathBuf::from("/mnt/kitti/data"));
    assert_eq!(cfg.runs_dir, PathBuf::from("out/runs"));
    assert_eq!(cfg.num_classes, 3);
    assert_eq!(cfg.image_shape, (96, 320));
    assert_eq!((cfg.epochs, cfg.batch_size), (12, 8));
    assert_eq!(cfg.learning_rate, 0.0005);
    assert_eq!(cfg.keep_prob, 0.5);
    assert_eq!(cfg.seed, Some(42));
    assert_eq!(cfg.vgg_url.as_deref(), Some("https://example.invalid/vgg"));
    assert_eq!(cfg.checkpoint_out, Some(PathBuf::from("checkpoints/fcn.bin")));
    assert!(cfg.validate().is_ok());

    let loop_cfg = cfg.loop_config();
    assert_eq!(loop_cfg.keep_prob, 0.5);
    let ds = cfg.dataset_config();
    assert_eq!(ds.image_shape, (96, 320));
    assert_eq!(ds.num_classes, 3);
}

#[test]
fn explicit_missing_file_and_bad_toml_are_errors() {
    let tmp = tempfile::tempdir().unwrap();
    let missing = tmp.path().join("nope.toml");
    assert!(matches!(
        RunConfig::load(Some(&missing)),
        Err(ConfigError::Io { .. })
    ));

    let bad = tmp.path().join("bad.toml");
    std::fs::write(&bad, "[train]\nepochs = \"many\"\n").unwrap();
    assert!(matches!(
        RunConfig::from_path(&bad),
        Err(ConfigError::Parse { .. })
    ));

    let unknown = tmp.path().join("unknown.toml");
    std::fs::write(&unknown, "[train]\nepoch = 3\n").unwrap();
    assert!(RunConfig::from_path(&unknown).is_err());
}

#[test]
fn shapes_that_are_not_multiples_of_32_fail_validation() {
    let cfg = RunConfig::from_toml_str("[model]\nimage_shape = [160, 570]\n").unwrap();
    let err = cfg.validate().unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));
}
