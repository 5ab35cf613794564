//! Restartable per-epoch batch iteration.

use crate::aug::{DatasetConfig, TransformPipeline};
use crate::kitti::{index_pairs, load_sample};
use crate::labels::check_num_classes;
use crate::types::{DatasetError, DatasetResult, SamplePair};
use burn::tensor::{backend::Backend, Tensor, TensorData};
use rand::{seq::SliceRandom, SeedableRng};
use rayon::prelude::*;
use std::path::Path;
use std::time::{Duration, Instant};

pub struct RoadBatch<B: Backend> {
    /// `[batch, 3, H, W]`, values in 0..1.
    pub images: Tensor<B, 4>,
    /// `[batch, num_classes, H, W]`, one-hot.
    pub labels: Tensor<B, 4>,
}

/// Indexed training pairs that hand out a fresh [`BatchIter`] per epoch.
#[derive(Debug, Clone)]
pub struct BatchGenerator {
    pairs: Vec<SamplePair>,
    cfg: DatasetConfig,
    pipeline: TransformPipeline,
    epochs_started: u64,
}

impl BatchGenerator {
    /// Index `<training_root>/image_2` against `<training_root>/gt_image_2`.
    pub fn from_training_root(training_root: &Path, cfg: DatasetConfig) -> DatasetResult<Self> {
        let pairs = index_pairs(training_root)?;
        tracing::info!(
            root = %training_root.display(),
            samples = pairs.len(),
            "indexed training pairs"
        );
        Self::from_pairs(pairs, cfg)
    }

    pub fn from_pairs(pairs: Vec<SamplePair>, cfg: DatasetConfig) -> DatasetResult<Self> {
        check_num_classes(cfg.num_classes)?;
        let (h, w) = cfg.image_shape;
        if h == 0 || w == 0 {
            return Err(DatasetError::Other(format!(
                "image_shape must be non-zero, got {h}x{w}"
            )));
        }
        let pipeline = TransformPipeline::from_config(&cfg);
        tracing::debug!(pipeline = %pipeline.describe(), "dataset transform");
        Ok(Self {
            pairs,
            cfg,
            pipeline,
            epochs_started: 0,
        })
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn config(&self) -> &DatasetConfig {
        &self.cfg
    }

    pub fn batches_per_epoch(&self, batch_size: usize) -> usize {
        let batch_size = batch_size.max(1);
        if self.cfg.drop_last {
            self.pairs.len() / batch_size
        } else {
            self.pairs.len().div_ceil(batch_size)
        }
    }

    /// Start a new pass over the data, reshuffling if configured.
    pub fn epoch(&mut self, batch_size: usize) -> BatchIter {
        let epoch = self.epochs_started;
        self.epochs_started += 1;
        let mut order = self.pairs.clone();
        if self.cfg.shuffle {
            let mut rng = match self.cfg.seed {
                Some(seed) => rand::rngs::StdRng::seed_from_u64(seed.wrapping_add(epoch)),
                None => rand::rngs::StdRng::from_rng(&mut rand::rng()),
            };
            order.shuffle(&mut rng);
        }
        BatchIter {
            order,
            cursor: 0,
            epoch,
            batch_size: batch_size.max(1),
            num_classes: self.cfg.num_classes,
            drop_last: self.cfg.drop_last,
            pipeline: self.pipeline.clone(),
            images_buf: Vec::new(),
            labels_buf: Vec::new(),
            processed_batches: 0,
            total_load_time: Duration::ZERO,
        }
    }
}

pub struct BatchIter {
    order: Vec<SamplePair>,
    cursor: usize,
    epoch: u64,
    batch_size: usize,
    num_classes: usize,
    drop_last: bool,
    pipeline: TransformPipeline,
    images_buf: Vec<f32>,
    labels_buf: Vec<f32>,
    processed_batches: usize,
    total_load_time: Duration,
}

impl BatchIter {
    /// Load the next batch, or `None` once the epoch is exhausted.
    pub fn next_batch<B: Backend>(
        &mut self,
        device: &B::Device,
    ) -> DatasetResult<Option<RoadBatch<B>>> {
        if self.cursor >= self.order.len() {
            return Ok(None);
        }
        let end = (self.cursor + self.batch_size).min(self.order.len());
        if self.drop_last && end - self.cursor < self.batch_size {
            self.cursor = self.order.len();
            return Ok(None);
        }
        let start = self.cursor;
        self.cursor = end;

        let t_load = Instant::now();
        let epoch_key = self.epoch << 32;
        let loaded: Vec<_> = self.order[start..end]
            .par_iter()
            .enumerate()
            .map(|(i, pair)| {
                let key = epoch_key ^ (start + i) as u64;
                load_sample(pair, &self.pipeline, self.num_classes, key)
            })
            .collect();
        let load_elapsed = t_load.elapsed();

        self.images_buf.clear();
        self.labels_buf.clear();
        let mut size: Option<(u32, u32)> = None;
        for sample in loaded {
            let sample = sample?;
            match size {
                None => size = Some((sample.width, sample.height)),
                Some(sz) if sz != (sample.width, sample.height) => {
                    return Err(DatasetError::Other(
                        "batch contains varying image sizes".to_string(),
                    ));
                }
                _ => {}
            }
            self.images_buf.extend_from_slice(&sample.image_chw);
            self.labels_buf.extend_from_slice(&sample.label_chw);
        }
        let Some((width, height)) = size else {
            return Ok(None);
        };

        let batch_len = end - start;
        let (h, w) = (height as usize, width as usize);
        let images = Tensor::<B, 4>::from_data(
            TensorData::new(self.images_buf.clone(), [batch_len, 3, h, w]),
            device,
        );
        let labels = Tensor::<B, 4>::from_data(
            TensorData::new(self.labels_buf.clone(), [batch_len, self.num_classes, h, w]),
            device,
        );

        self.processed_batches += 1;
        self.total_load_time += load_elapsed;
        tracing::debug!(
            epoch = self.epoch,
            batch = self.processed_batches,
            samples = batch_len,
            load_ms = load_elapsed.as_secs_f64() * 1000.0,
            "loaded batch"
        );

        Ok(Some(RoadBatch { images, labels }))
    }

    pub fn average_load_time(&self) -> Duration {
        if self.processed_batches == 0 {
            Duration::ZERO
        } else {
            self.total_load_time / self.processed_batches as u32
        }
    }
}
