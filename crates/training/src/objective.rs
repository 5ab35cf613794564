//! Per-pixel softmax cross-entropy and the Adam update that minimizes it.

use burn::module::AutodiffModule;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::tensor::activation::log_softmax;
use burn::tensor::backend::{AutodiffBackend, Backend};
use burn::tensor::Tensor;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ObjectiveError {
    #[error("score shape {scores:?} does not match label shape {labels:?}")]
    ShapeMismatch {
        scores: [usize; 4],
        labels: [usize; 4],
    },
    #[error("decoder produces {actual} class planes but the objective expects {expected}")]
    ClassCount { expected: usize, actual: usize },
}

pub struct ObjectiveOutputs<B: Backend> {
    /// `[pixels, num_classes]`, one row per pixel in batch/row/column order.
    pub logits: Tensor<B, 2>,
    /// Mean softmax cross-entropy over all pixels.
    pub cross_entropy: Tensor<B, 1>,
    /// `cross_entropy` plus the weight penalty; the value the update minimizes.
    pub loss: Tensor<B, 1>,
}

/// `[B, C, H, W]` scores to `[B*H*W, C]` rows.
pub fn flatten_logits<B: Backend>(
    scores: Tensor<B, 4>,
    num_classes: usize,
) -> Result<Tensor<B, 2>, ObjectiveError> {
    let [batch, classes, height, width] = scores.dims();
    if classes != num_classes {
        return Err(ObjectiveError::ClassCount {
            expected: num_classes,
            actual: classes,
        });
    }
    Ok(scores
        .permute([0, 2, 3, 1])
        .reshape([batch * height * width, classes]))
}

/// Mean of `-sum(labels * log_softmax(logits))` over rows.
pub fn softmax_cross_entropy<B: Backend>(logits: Tensor<B, 2>, labels: Tensor<B, 2>) -> Tensor<B, 1> {
    let log_probs = log_softmax(logits, 1);
    (labels * log_probs).sum_dim(1).neg().mean()
}

/// First-order adaptive update bound to a fixed learning rate.
pub struct UpdateOp<O> {
    optim: O,
    learning_rate: f64,
}

impl<O> UpdateOp<O> {
    /// Backpropagate `loss` and apply one optimizer step to `model`.
    pub fn step<B, M>(&mut self, model: M, loss: Tensor<B, 1>) -> M
    where
        B: AutodiffBackend,
        M: AutodiffModule<B>,
        O: Optimizer<M, B>,
    {
        let grads = GradientsParams::from_grads(loss.backward(), &model);
        self.optim.step(self.learning_rate, model, grads)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentationObjective {
    pub num_classes: usize,
    pub learning_rate: f64,
}

impl SegmentationObjective {
    pub fn new(num_classes: usize, learning_rate: f64) -> Self {
        Self {
            num_classes,
            learning_rate,
        }
    }

    pub fn evaluate<B: Backend>(
        &self,
        scores: Tensor<B, 4>,
        labels: Tensor<B, 4>,
        penalty: Tensor<B, 1>,
    ) -> Result<ObjectiveOutputs<B>, ObjectiveError> {
        let score_dims = scores.dims();
        let label_dims = labels.dims();
        if score_dims != label_dims {
            return Err(ObjectiveError::ShapeMismatch {
                scores: score_dims,
                labels: label_dims,
            });
        }
        let logits = flatten_logits(scores, self.num_classes)?;
        let targets = flatten_logits(labels, self.num_classes)?;
        let cross_entropy = softmax_cross_entropy(logits.clone(), targets);
        let loss = cross_entropy.clone() + penalty;
        Ok(ObjectiveOutputs {
            logits,
            cross_entropy,
            loss,
        })
    }

    pub fn update_op<B, M>(&self) -> UpdateOp<impl Optimizer<M, B>>
    where
        B: AutodiffBackend,
        M: AutodiffModule<B>,
    {
        UpdateOp {
            optim: AdamConfig::new().init::<B, M>(),
            learning_rate: self.learning_rate,
        }
    }
}
