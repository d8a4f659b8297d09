//! Utilities for training a dynamics model on sampled windows.
use crate::{error::MpcError, trajectory_buffer::TrajectoryBatch, ModelOutput, OutputHead};
use ndarray::Array3;

const PROB_EPS: f32 = 1e-7;

// Prediction of a head, checked against the batch and horizon of `batch`.
fn get_head<'a>(
    output: &'a ModelOutput,
    head: OutputHead,
    batch: &TrajectoryBatch,
) -> Result<&'a Array3<f32>, MpcError> {
    let x = output
        .get(head)
        .ok_or_else(|| MpcError::MissingOutput(format!("{:?}", head)))?;
    let (b, h, _) = x.dim();
    if (b, h) != (batch.len(), batch.horizon()) {
        return Err(MpcError::ShapeMismatch {
            expected: vec![batch.len(), batch.horizon(), 1],
            found: x.shape().to_vec(),
        });
    }
    Ok(x)
}

fn binary_cross_entropy(p: f32, target: f32) -> f32 {
    let p = p.clamp(PROB_EPS, 1.0 - PROB_EPS);
    -(target * p.ln() + (1.0 - target) * (1.0 - p).ln())
}

/// Per-window loss of a model's predictions on a batch.
///
/// For every step of the horizon it adds the binary cross-entropy of the
/// collision and off-road probabilities and the squared error of the predicted
/// distance against the distance after the action, then averages over the
/// horizon. The result is index-aligned with `batch.ix_sample` and can be fed
/// to [`TrajectoryRingBuffer::store_loss`](crate::trajectory_buffer::TrajectoryRingBuffer::store_loss).
pub fn prediction_loss(
    batch: &TrajectoryBatch,
    output: &ModelOutput,
) -> Result<Vec<f32>, MpcError> {
    let coll = get_head(output, OutputHead::CollisionProb, batch)?;
    let offroad = get_head(output, OutputHead::OffroadProb, batch)?;
    let dist = get_head(output, OutputHead::Distance, batch)?;
    let h = batch.horizon();

    let losses = (0..batch.len())
        .map(|j| {
            let sum = (0..h)
                .map(|t| {
                    let coll_loss =
                        binary_cross_entropy(coll[[j, t, 0]], batch.collision[[j, t, 1]]);
                    let offroad_loss =
                        binary_cross_entropy(offroad[[j, t, 0]], batch.offroad[[j, t, 1]]);
                    let dist_loss = (dist[[j, t, 0]] - batch.distance[[j, t + 1, 0]]).powi(2);
                    coll_loss + offroad_loss + dist_loss
                })
                .sum::<f32>();
            sum / h.max(1) as f32
        })
        .collect();

    Ok(losses)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trajectory_buffer::{StepEffect, TrajectoryBufferConfig, TrajectoryRingBuffer};
    use ndarray::{ArrayD, IxDyn};
    use std::f32::consts::LN_2;

    fn batch() -> TrajectoryBatch {
        let config = TrajectoryBufferConfig::default()
            .capacity(40)
            .frame_history_len(1)
            .horizon(2)
            .action_dim(2);
        let mut buffer = TrajectoryRingBuffer::new(&config).unwrap();
        for step in 0..40 {
            let ix = buffer
                .store_frame(ArrayD::<u8>::zeros(IxDyn(&[2, 2])).view())
                .unwrap();
            let effect = StepEffect {
                collision: step == 21,
                speed: 1.0,
                ..StepEffect::default()
            };
            buffer.store_effect(ix, &effect).unwrap();
        }
        buffer.encode_batch(&[10, 20]).unwrap()
    }

    fn output(coll: f32, offroad: f32, dist: f32) -> ModelOutput {
        let mut output = ModelOutput::new();
        output.insert(OutputHead::CollisionProb, Array3::from_elem((2, 2, 1), coll));
        output.insert(OutputHead::OffroadProb, Array3::from_elem((2, 2, 1), offroad));
        output.insert(OutputHead::Distance, Array3::from_elem((2, 2, 1), dist));
        output
    }

    #[test]
    fn test_prediction_loss() {
        let batch = batch();

        // Uninformed probabilities and exact distances
        let losses = prediction_loss(&batch, &output(0.5, 0.5, 1.0)).unwrap();
        assert_eq!(losses.len(), 2);
        for loss in losses {
            assert!((loss - 2.0 * LN_2).abs() < 1e-5);
        }

        // Confident predictions are cheap except for the missed collision
        let losses = prediction_loss(&batch, &output(1e-3, 1e-3, 1.0)).unwrap();
        assert!(losses[0] < 0.01);
        assert!(losses[1] > 3.0);
    }

    #[test]
    fn test_prediction_loss_checks_heads() {
        let batch = batch();
        let mut partial = ModelOutput::new();
        partial.insert(OutputHead::CollisionProb, Array3::zeros((2, 2, 1)));
        assert!(matches!(
            prediction_loss(&batch, &partial),
            Err(MpcError::MissingOutput(_))
        ));

        let mut wrong = output(0.5, 0.5, 0.0);
        wrong.insert(OutputHead::Distance, Array3::zeros((3, 2, 1)));
        assert!(matches!(
            prediction_loss(&batch, &wrong),
            Err(MpcError::ShapeMismatch { .. })
        ));
    }
}
