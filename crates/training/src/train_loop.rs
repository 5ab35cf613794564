use burn::tensor::backend::{AutodiffBackend, Backend};
use burn::tensor::Tensor;
use models::{FcnSegmenter, ShapeError};
use road_dataset::{BatchGenerator, DatasetError};
use serde::Serialize;
use std::time::Instant;
use thiserror::Error;

use crate::objective::{ObjectiveError, SegmentationObjective};

pub const DEFAULT_KEEP_PROB: f64 = 0.75;
pub const DEFAULT_LEARNING_RATE: f64 = 1e-3;

#[derive(Debug, Error)]
pub enum TrainError {
    #[error(transparent)]
    Dataset(#[from] DatasetError),
    #[error(transparent)]
    Shape(#[from] ShapeError),
    #[error(transparent)]
    Objective(#[from] ObjectiveError),
    #[error("loss became {loss} at epoch {epoch}, batch {batch}")]
    Diverged { epoch: usize, batch: usize, loss: f32 },
    #[error("could not read loss value: {0}")]
    Readback(String),
}

pub type TrainResult<T> = Result<T, TrainError>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopConfig {
    pub epochs: usize,
    pub batch_size: usize,
    /// Dropout keep probability fed to every training forward pass.
    pub keep_prob: f64,
    pub learning_rate: f64,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            epochs: 5,
            batch_size: 100,
            keep_prob: DEFAULT_KEEP_PROB,
            learning_rate: DEFAULT_LEARNING_RATE,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EpochLosses {
    pub epoch: usize,
    pub losses: Vec<f32>,
}

impl EpochLosses {
    pub fn mean(&self) -> Option<f32> {
        if self.losses.is_empty() {
            return None;
        }
        Some(self.losses.iter().sum::<f32>() / self.losses.len() as f32)
    }
}

/// Every loss reported during a run, grouped by epoch.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrainReport {
    pub epochs: Vec<EpochLosses>,
}

impl TrainReport {
    pub fn total_steps(&self) -> usize {
        self.epochs.iter().map(|e| e.losses.len()).sum()
    }

    pub fn losses(&self) -> impl Iterator<Item = f32> + '_ {
        self.epochs.iter().flat_map(|e| e.losses.iter().copied())
    }

    pub fn final_loss(&self) -> Option<f32> {
        self.losses().last()
    }
}

fn read_scalar<B: Backend>(t: Tensor<B, 1>) -> TrainResult<f32> {
    let values = t
        .into_data()
        .to_vec::<f32>()
        .map_err(|e| TrainError::Readback(format!("{e:?}")))?;
    values
        .first()
        .copied()
        .ok_or_else(|| TrainError::Readback("empty loss tensor".to_string()))
}

/// Run `cfg.epochs` passes over `generator`, one Adam step per batch.
///
/// The reported loss is the cross-entropy term; the penalized total is what
/// the optimizer minimizes. A non-finite value aborts the run.
pub fn train_nn<B: AutodiffBackend>(
    mut model: FcnSegmenter<B>,
    generator: &mut BatchGenerator,
    cfg: &LoopConfig,
    device: &B::Device,
) -> TrainResult<(FcnSegmenter<B>, TrainReport)> {
    let objective = SegmentationObjective::new(model.num_classes(), cfg.learning_rate);
    let mut update = objective.update_op::<B, FcnSegmenter<B>>();
    let mut report = TrainReport::default();

    tracing::info!(
        epochs = cfg.epochs,
        batch_size = cfg.batch_size,
        keep_prob = cfg.keep_prob,
        learning_rate = cfg.learning_rate,
        samples = generator.len(),
        "training..."
    );
    for epoch in 0..cfg.epochs {
        tracing::info!("EPOCH {} ...", epoch + 1);
        let started = Instant::now();
        let mut iter = generator.epoch(cfg.batch_size);
        let mut losses = Vec::new();

        while let Some(batch) = iter.next_batch::<B>(device)? {
            model.check_input(batch.images.dims())?;
            let scores = model.forward(batch.images, cfg.keep_prob);
            let outputs = objective.evaluate(scores, batch.labels, model.decoder.l2_penalty())?;

            let loss = read_scalar(outputs.cross_entropy)?;
            if !loss.is_finite() {
                return Err(TrainError::Diverged {
                    epoch,
                    batch: losses.len(),
                    loss,
                });
            }
            model = update.step(model, outputs.loss);
            tracing::info!("Loss = {:.3}", loss);
            losses.push(loss);
        }

        let summary = EpochLosses { epoch, losses };
        tracing::info!(
            epoch = epoch + 1,
            batches = summary.losses.len(),
            mean_loss = summary.mean().unwrap_or(f32::NAN),
            elapsed_s = started.elapsed().as_secs_f64(),
            avg_load_ms = iter.average_load_time().as_secs_f64() * 1000.0,
            "epoch finished"
        );
        report.epochs.push(summary);
    }
    Ok((model, report))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_reference_hyperparameters() {
        let cfg = LoopConfig::default();
        assert_eq!(cfg.keep_prob, 0.75);
        assert_eq!(cfg.learning_rate, 0.001);
        assert_eq!((cfg.epochs, cfg.batch_size), (5, 100));
    }

    #[test]
    fn report_counts_and_orders_losses() {
        let report = TrainReport {
            epochs: vec![
                EpochLosses {
                    epoch: 0,
                    losses: vec![0.9, 0.7],
                },
                EpochLosses {
                    epoch: 1,
                    losses: vec![0.5],
                },
            ],
        };
        assert_eq!(report.total_steps(), 3);
        assert_eq!(report.final_loss(), Some(0.5));
        let mean = report.epochs[0].mean().unwrap();
        assert!((mean - 0.8).abs() < 1e-6);
        assert_eq!(EpochLosses::default().mean(), None);
    }
}
