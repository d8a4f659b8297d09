//! This module is used for tests.
use crate::{error::MpcError, DynamicsModel, ModelOutput, OutputHead, RecurrentState};
use anyhow::Result;
use ndarray::{Array3, ArrayD, ArrayView3, ArrayViewD, IxDyn};

/// Dynamics model with constant predictions.
///
/// Both probabilities are 0.5 and every regression head predicts zero. The
/// recurrent state passed in is returned unchanged, or zeros of
/// `[B, hidden_dim]` if none is given.
#[derive(Clone, Debug)]
pub struct DummyDynamicsModel {
    hidden_dim: usize,
}

impl DummyDynamicsModel {
    /// Creates a model with the given size of the recurrent state.
    pub fn new(hidden_dim: usize) -> Self {
        Self { hidden_dim }
    }
}

impl DynamicsModel for DummyDynamicsModel {
    fn predict(
        &mut self,
        obs: ArrayViewD<f32>,
        actions: ArrayView3<f32>,
        state: Option<RecurrentState>,
    ) -> Result<(ModelOutput, RecurrentState)> {
        let (b, h, _) = actions.dim();
        if obs.ndim() < 2 || obs.shape()[..2] != [b, h] {
            return Err(MpcError::ShapeMismatch {
                expected: vec![b, h],
                found: obs.shape().to_vec(),
            }
            .into());
        }

        let mut output = ModelOutput::new();
        output.insert(OutputHead::CollisionProb, Array3::from_elem((b, h, 1), 0.5));
        output.insert(OutputHead::OffroadProb, Array3::from_elem((b, h, 1), 0.5));
        for head in [
            OutputHead::Distance,
            OutputHead::Position,
            OutputHead::Angle,
            OutputHead::Speed,
        ] {
            output.insert(head, Array3::zeros((b, h, 1)));
        }
        output.insert(OutputHead::Xyz, Array3::zeros((b, h, 3)));

        let state = state.unwrap_or_else(|| RecurrentState {
            hidden: ArrayD::zeros(IxDyn(&[b, self.hidden_dim])),
            cell: ArrayD::zeros(IxDyn(&[b, self.hidden_dim])),
        });

        Ok((output, state))
    }
}
