//! Items pushed into and batches drawn from the trajectory buffer.
use ndarray::{Array3, ArrayD};

/// Outcome of one simulator step, stored with
/// [`TrajectoryRingBuffer::store_effect`](super::TrajectoryRingBuffer::store_effect).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StepEffect {
    /// Index of the discrete action taken.
    pub action: usize,
    /// `true` on the last step of an episode.
    pub terminal: bool,
    /// `true` if the vehicle collided.
    pub collision: bool,
    /// `true` if the vehicle left the road.
    pub offroad: bool,
    /// Speed of the vehicle.
    pub speed: f32,
    /// Angle between heading and road direction, in radians.
    pub angle: f32,
    /// Lateral position relative to the lane center.
    pub position: f32,
}

/// A frame together with the outcome of the action taken on it.
///
/// This is the item of [`ExperienceBufferBase`](crate::ExperienceBufferBase)
/// for [`TrajectoryRingBuffer`](super::TrajectoryRingBuffer).
#[derive(Debug, Clone)]
pub struct Transition {
    /// Raw frame, `[height, width, channels]`, `[height, width]` or `[dim]`.
    pub frame: ArrayD<u8>,
    /// Outcome of the step.
    pub effect: StepEffect,
}

/// Multi-step windows drawn from the buffer.
///
/// `B` is the number of windows and `H` the horizon. State signals carry one
/// step more than actions: the state after the last action of the window.
#[derive(Debug, Clone)]
pub struct TrajectoryBatch {
    /// Stacked observations, `[B, H, ...encoded_shape]`.
    pub obs: ArrayD<u8>,

    /// Stacked observations one step later, `[B, H, ...encoded_shape]`.
    pub next_obs: ArrayD<u8>,

    /// One-hot actions, `[B, H, action_dim]`.
    pub action: Array3<f32>,

    /// One-hot collision flags, `[B, H, 2]`.
    pub collision: Array3<f32>,

    /// One-hot off-road flags, `[B, H, 2]`.
    pub offroad: Array3<f32>,

    /// Speed, `[B, H + 1, 1]`.
    pub speed: Array3<f32>,

    /// Angle to the road direction, `[B, H + 1, 1]`.
    pub angle: Array3<f32>,

    /// Lateral position, `[B, H + 1, 1]`.
    pub position: Array3<f32>,

    /// Distance target derived from speed, angle and position, `[B, H + 1, 1]`.
    pub distance: Array3<f32>,

    /// Start slot of every window.
    pub ix_sample: Vec<usize>,
}

impl TrajectoryBatch {
    /// Number of windows in the batch.
    pub fn len(&self) -> usize {
        self.ix_sample.len()
    }

    /// Returns `true` if the batch has no window.
    pub fn is_empty(&self) -> bool {
        self.ix_sample.is_empty()
    }

    /// Prediction steps per window.
    pub fn horizon(&self) -> usize {
        self.action.shape()[1]
    }
}
