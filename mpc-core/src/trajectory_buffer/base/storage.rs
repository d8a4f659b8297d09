//! Index-aligned per-slot arrays.
use crate::{error::MpcError, observation::ObservationKind};
use ndarray::{Array2, ArrayD, ArrayViewD, Axis, IxDyn};

/// Backing storage of the buffer.
///
/// Nothing is allocated before the first frame arrives, because the shape of
/// the observation array is only known then.
#[derive(Debug)]
pub enum Storage {
    /// No frame stored yet.
    Unallocated,
    /// Arrays sized to the capacity.
    Active(Slots),
}

/// Per-slot arrays. Slot `i` of every array describes the same timestep.
#[derive(Debug)]
pub struct Slots {
    pub kind: ObservationKind,
    /// `[capacity, ...stored_shape]`
    pub obs: ArrayD<u8>,
    /// One-hot, `[capacity, action_dim]`
    pub action: Array2<f32>,
    pub terminal: Vec<bool>,
    /// One-hot over {no collision, collision}, `[capacity, 2]`
    pub collision: Array2<f32>,
    /// One-hot over {on road, off road}, `[capacity, 2]`
    pub offroad: Array2<f32>,
    pub speed: Vec<f32>,
    pub angle: Vec<f32>,
    pub position: Vec<f32>,
}

impl Slots {
    pub fn new(kind: ObservationKind, capacity: usize, action_dim: usize) -> Self {
        let mut obs_shape = vec![capacity];
        obs_shape.extend(kind.stored_shape());

        Self {
            kind,
            obs: ArrayD::zeros(IxDyn(&obs_shape)),
            action: Array2::zeros((capacity, action_dim)),
            terminal: vec![false; capacity],
            collision: Array2::zeros((capacity, 2)),
            offroad: Array2::zeros((capacity, 2)),
            speed: vec![0.0; capacity],
            angle: vec![0.0; capacity],
            position: vec![0.0; capacity],
        }
    }

    pub fn write_frame(&mut self, idx: usize, frame: ArrayViewD<u8>) -> Result<(), MpcError> {
        let stored = self.kind.to_stored(frame)?;
        self.obs.index_axis_mut(Axis(0), idx).assign(&stored);
        Ok(())
    }

    pub fn frame(&self, idx: usize) -> ArrayViewD<u8> {
        self.obs.index_axis(Axis(0), idx)
    }
}

/// Clears a one-hot row and sets its hot entry.
pub fn set_one_hot(arr: &mut Array2<f32>, row: usize, hot: usize) {
    let mut row = arr.row_mut(row);
    row.fill(0.0);
    row[hot] = 1.0;
}
