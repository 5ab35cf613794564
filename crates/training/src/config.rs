use std::path::{Path, PathBuf};

use models::check_image_shape;
use road_dataset::DatasetConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::train_loop::{LoopConfig, DEFAULT_KEEP_PROB, DEFAULT_LEARNING_RATE};

const DEFAULT_CONFIG_NAME: &str = "fcn-road.toml";
pub const CONFIG_ENV: &str = "FCN_ROAD_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Settings for one training run; fixed once the run starts.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub data_dir: PathBuf,
    pub runs_dir: PathBuf,
    pub num_classes: usize,
    /// Model input as (height, width).
    pub image_shape: (u32, u32),
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    pub keep_prob: f64,
    pub seed: Option<u64>,
    pub flip_horizontal_prob: f32,
    /// Base URL holding `saved_model.json` and `variables.bin`.
    pub vgg_url: Option<String>,
    pub checkpoint_out: Option<PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            runs_dir: PathBuf::from("./runs"),
            num_classes: 2,
            image_shape: (160, 576),
            epochs: 5,
            batch_size: 100,
            learning_rate: DEFAULT_LEARNING_RATE,
            keep_prob: DEFAULT_KEEP_PROB,
            seed: None,
            flip_horizontal_prob: 0.0,
            vgg_url: None,
            checkpoint_out: None,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct RunConfigFile {
    data_dir: Option<String>,
    runs_dir: Option<String>,
    vgg_url: Option<String>,
    checkpoint_out: Option<String>,
    model: Option<ModelSection>,
    train: Option<TrainSection>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ModelSection {
    num_classes: Option<usize>,
    image_shape: Option<[u32; 2]>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct TrainSection {
    epochs: Option<usize>,
    batch_size: Option<usize>,
    learning_rate: Option<f64>,
    keep_prob: Option<f64>,
    seed: Option<u64>,
    flip_horizontal_prob: Option<f32>,
}

impl RunConfig {
    /// Resolve the config file: `explicit`, then `$FCN_ROAD_CONFIG`, then
    /// `fcn-road.toml` if present, else defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let cfg = if let Some(path) = explicit {
            Self::from_path(path)?
        } else if let Ok(path) = std::env::var(CONFIG_ENV) {
            Self::from_path(&expand_path(&path))?
        } else if Path::new(DEFAULT_CONFIG_NAME).exists() {
            Self::from_path(Path::new(DEFAULT_CONFIG_NAME))?
        } else {
            Self::default()
        };
        cfg.warn_if_invalid();
        Ok(cfg)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let file: RunConfigFile = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "loaded run config");
        Ok(Self::from_file(file))
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let file: RunConfigFile = toml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: PathBuf::from("<inline>"),
            source,
        })?;
        Ok(Self::from_file(file))
    }

    fn from_file(file: RunConfigFile) -> Self {
        let defaults = Self::default();
        let model = file.model.unwrap_or_default();
        let train = file.train.unwrap_or_default();
        RunConfig {
            data_dir: file
                .data_dir
                .map(|v| expand_path(&v))
                .unwrap_or(defaults.data_dir),
            runs_dir: file
                .runs_dir
                .map(|v| expand_path(&v))
                .unwrap_or(defaults.runs_dir),
            num_classes: model.num_classes.unwrap_or(defaults.num_classes),
            image_shape: model
                .image_shape
                .map(|[h, w]| (h, w))
                .unwrap_or(defaults.image_shape),
            epochs: train.epochs.unwrap_or(defaults.epochs),
            batch_size: train.batch_size.unwrap_or(defaults.batch_size),
            learning_rate: train.learning_rate.unwrap_or(defaults.learning_rate),
            keep_prob: train.keep_prob.unwrap_or(defaults.keep_prob),
            seed: train.seed,
            flip_horizontal_prob: train
                .flip_horizontal_prob
                .unwrap_or(defaults.flip_horizontal_prob),
            vgg_url: file
                .vgg_url
                .map(|v| expand_env(&v))
                .filter(|v| !v.trim().is_empty()),
            checkpoint_out: file.checkpoint_out.map(|v| expand_path(&v)),
        }
    }

    fn problems(&self) -> Vec<String> {
        let mut out = Vec::new();
        if self.epochs == 0 {
            out.push("epochs must be at least 1".to_string());
        }
        if self.batch_size == 0 {
            out.push("batch_size must be at least 1".to_string());
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            out.push(format!("learning_rate must be positive, got {}", self.learning_rate));
        }
        if !(self.keep_prob > 0.0 && self.keep_prob <= 1.0) {
            out.push(format!("keep_prob must be in (0, 1], got {}", self.keep_prob));
        }
        if !(0.0..=1.0).contains(&self.flip_horizontal_prob) {
            out.push(format!(
                "flip_horizontal_prob must be in [0, 1], got {}",
                self.flip_horizontal_prob
            ));
        }
        if !matches!(self.num_classes, 2 | 3) {
            out.push(format!("num_classes must be 2 or 3, got {}", self.num_classes));
        }
        let (h, w) = self.image_shape;
        if let Err(e) = check_image_shape(h as usize, w as usize) {
            out.push(format!("image_shape: {e}"));
        }
        out
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let problems = self.problems();
        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(problems.join("; ")))
        }
    }

    fn warn_if_invalid(&self) {
        for problem in self.problems() {
            tracing::warn!("run config: {problem}");
        }
    }

    pub fn vgg_dir(&self) -> PathBuf {
        self.data_dir.join("vgg")
    }

    pub fn loop_config(&self) -> LoopConfig {
        LoopConfig {
            epochs: self.epochs,
            batch_size: self.batch_size,
            keep_prob: self.keep_prob,
            learning_rate: self.learning_rate,
        }
    }

    pub fn dataset_config(&self) -> DatasetConfig {
        DatasetConfig {
            image_shape: self.image_shape,
            num_classes: self.num_classes,
            flip_horizontal_prob: self.flip_horizontal_prob,
            shuffle: true,
            seed: self.seed,
            drop_last: false,
        }
    }
}

pub(crate) fn expand_path(raw: &str) -> PathBuf {
    let mut out = raw.to_string();
    if let Some(stripped) = out.strip_prefix("~") {
        if let Ok(home) = std::env::var("HOME") {
            out = format!("{home}{stripped}");
        }
    }
    PathBuf::from(expand_env(&out))
}

/// Substitute `${VAR}`; unknown variables are left as written.
fn expand_env(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let key = &after[..end];
                match std::env::var(key) {
                    Ok(val) => out.push_str(&val),
                    Err(_) => out.push_str(&rest[start..start + 3 + end]),
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let cfg = RunConfig::from_toml_str("").unwrap();
        assert_eq!(cfg, RunConfig::default());
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.vgg_dir(), PathBuf::from("./data").join("vgg"));
    }

    #[test]
    fn expands_known_env_vars_and_keeps_unknown() {
        std::env::set_var("FCN_ROAD_TEST_ROOT", "/srv/kitti");
        assert_eq!(expand_env("${FCN_ROAD_TEST_ROOT}/data"), "/srv/kitti/data");
        assert_eq!(
            expand_env("${FCN_ROAD_SURELY_UNSET_VAR}/x"),
            "${FCN_ROAD_SURELY_UNSET_VAR}/x"
        );
        assert_eq!(expand_env("plain/${unterminated"), "plain/${unterminated");
    }

    #[test]
    fn validate_collects_every_problem() {
        let cfg = RunConfig {
            epochs: 0,
            num_classes: 4,
            image_shape: (100, 576),
            keep_prob: 0.0,
            ..RunConfig::default()
        };
        let msg = cfg.validate().unwrap_err().to_string();
        for needle in ["epochs", "num_classes", "image_shape", "keep_prob"] {
            assert!(msg.contains(needle), "{needle} missing from {msg}");
        }
    }
}
