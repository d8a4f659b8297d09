//! Contract of the learned forward-dynamics model.
//!
//! The buffer knows nothing about the model beyond the tensors exchanged here:
//! stacked observations and one-hot actions go in, per-step predictions and the
//! next recurrent state come out.
use anyhow::Result;
use ndarray::{Array3, ArrayD, ArrayView3, ArrayViewD};
use std::collections::HashMap;

/// Prediction heads of a dynamics model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputHead {
    /// Probability of a collision after each action, `[B, H, 1]`.
    CollisionProb,
    /// Probability of leaving the road after each action, `[B, H, 1]`.
    OffroadProb,
    /// Predicted distance progress, `[B, H, 1]`.
    Distance,
    /// Predicted lateral position, `[B, H, 1]`.
    Position,
    /// Predicted heading angle, `[B, H, 1]`.
    Angle,
    /// Predicted speed, `[B, H, 1]`.
    Speed,
    /// Predicted world coordinates, `[B, H, 3]`.
    Xyz,
}

/// Per-step outputs of a dynamics model, keyed by head.
///
/// Every array is laid out as `[batch_size, horizon, k]`.
#[derive(Debug, Clone, Default)]
pub struct ModelOutput(HashMap<OutputHead, Array3<f32>>);

impl ModelOutput {
    /// Creates an output without any head.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the prediction of a head.
    pub fn insert(&mut self, head: OutputHead, value: Array3<f32>) {
        self.0.insert(head, value);
    }

    /// Gets the prediction of a head, if the model produces it.
    pub fn get(&self, head: OutputHead) -> Option<&Array3<f32>> {
        self.0.get(&head)
    }

    /// Returns `true` if the model produces the given head.
    pub fn contains(&self, head: OutputHead) -> bool {
        self.0.contains_key(&head)
    }
}

/// Hidden and cell state of a recurrent model.
#[derive(Debug, Clone, PartialEq)]
pub struct RecurrentState {
    /// Hidden state.
    pub hidden: ArrayD<f32>,
    /// Cell state.
    pub cell: ArrayD<f32>,
}

/// A forward-dynamics model predicting outcomes of action sequences.
pub trait DynamicsModel {
    /// Rolls the model over the horizon of a batch.
    ///
    /// * `obs` - Normalized stacked observations, `[B, H, ...]`.
    /// * `actions` - One-hot actions, `[B, H, action_dim]`.
    /// * `state` - Recurrent state to start from; `None` starts from zeros.
    fn predict(
        &mut self,
        obs: ArrayViewD<f32>,
        actions: ArrayView3<f32>,
        state: Option<RecurrentState>,
    ) -> Result<(ModelOutput, RecurrentState)>;
}
