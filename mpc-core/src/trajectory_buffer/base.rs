//! Fixed-capacity ring of driving transitions.
mod storage;
mod sum_tree;
use super::{priority, PriorityConfig, StepEffect, TrajectoryBatch, TrajectoryBufferConfig, Transition};
use crate::{
    error::MpcError,
    observation::ObservationKind,
    record::{Record, RecordValue},
    ExperienceBufferBase, ReplayBufferBase,
};
use anyhow::Result;
use log::{debug, info, trace};
use ndarray::{s, Array3, ArrayD, ArrayViewD, Axis, IxDyn, Slice};
use rand::{rngs::StdRng, SeedableRng};
use segment_tree::{ops::MinIgnoreNaN, SegmentPoint};
use storage::{set_one_hot, Slots, Storage};
use sum_tree::SumTree;

#[cfg_attr(doc, aquamarine::aquamarine)]
/// A circular log of driving transitions with prioritized multi-step sampling.
///
/// A simulation driver appends one step at a time, a training driver draws
/// overlapping windows of `horizon` steps and feeds the loss of the dynamics
/// model back:
///
/// ```mermaid
/// graph LR
///     Sim -- store_frame --> Buffer
///     Sim -- store_effect --> Buffer
///     Buffer -- sample --> Batch
///     Batch --> Model
///     Model -- store_loss --> Buffer
/// ```
///
/// Slot `i` of every per-slot array describes the same timestep. Storage is
/// allocated on the first [`store_frame`](Self::store_frame), which also fixes
/// the [`ObservationKind`].
///
/// Windows are drawn without replacement with weights
/// $w_i \propto \log(r_i - \min_j r_j + c)$, where $r$ is the reward priority
/// and $c$ is [`PriorityConfig::weight_offset`]. The loss priority updated by
/// [`store_loss`](Self::store_loss) does not take part in sampling.
///
/// The buffer is not synchronized. Writers and readers must not interleave.
pub struct TrajectoryRingBuffer {
    capacity: usize,
    frame_history_len: usize,
    horizon: usize,
    action_dim: usize,
    priority: PriorityConfig,

    /// Next slot to overwrite.
    cursor: usize,

    /// Number of valid slots, saturating at `capacity`.
    size: usize,

    last_written: Option<usize>,
    storage: Storage,
    loss_priority: Vec<f32>,
    reward_priority: Vec<f32>,

    /// Minimum of `reward_priority` over a prefix, for shifting the weights.
    reward_min_tree: SegmentPoint<f32, MinIgnoreNaN>,

    rng: StdRng,
}

impl TrajectoryRingBuffer {
    /// Creates an empty buffer.
    pub fn new(config: &TrajectoryBufferConfig) -> Result<Self, MpcError> {
        config.validate()?;
        let capacity = config.capacity;
        info!(
            "Build trajectory buffer: capacity={}, frame_history_len={}, horizon={}, action_dim={}",
            capacity, config.frame_history_len, config.horizon, config.action_dim
        );

        Ok(Self {
            capacity,
            frame_history_len: config.frame_history_len,
            horizon: config.horizon,
            action_dim: config.action_dim,
            priority: config.priority.clone(),
            cursor: 0,
            size: 0,
            last_written: None,
            storage: Storage::Unallocated,
            loss_priority: vec![config.priority.initial_loss_priority; capacity],
            reward_priority: vec![1.0; capacity],
            reward_min_tree: SegmentPoint::build(vec![1.0; capacity], MinIgnoreNaN),
            rng: StdRng::seed_from_u64(config.seed),
        })
    }

    fn slots(&self) -> Result<&Slots, MpcError> {
        match &self.storage {
            Storage::Active(slots) => Ok(slots),
            Storage::Unallocated => Err(MpcError::EmptyBuffer),
        }
    }

    fn check_index(&self, idx: usize) -> Result<(), MpcError> {
        if idx >= self.capacity {
            return Err(MpcError::InvalidIndex {
                index: idx,
                bound: self.capacity,
            });
        }
        Ok(())
    }

    fn set_reward_priority(&mut self, idx: usize, v: f32) {
        self.reward_priority[idx] = v;
        self.reward_min_tree.modify(idx, v);
    }

    /// Stores a frame at the write cursor and returns its slot.
    ///
    /// The first call allocates all per-slot arrays. Later frames must have the
    /// shape of the first one.
    pub fn store_frame(&mut self, frame: ArrayViewD<u8>) -> Result<usize, MpcError> {
        if let Storage::Unallocated = self.storage {
            let kind = ObservationKind::from_frame_shape(frame.shape())?;
            info!("Allocate {} slots of {:?}", self.capacity, kind);
            self.storage = Storage::Active(Slots::new(kind, self.capacity, self.action_dim));
        }

        let ix = self.cursor;
        match &mut self.storage {
            Storage::Active(slots) => slots.write_frame(ix, frame)?,
            Storage::Unallocated => return Err(MpcError::EmptyBuffer),
        }

        self.last_written = Some(ix);
        self.cursor = (self.cursor + 1) % self.capacity;
        self.size = (self.size + 1).min(self.capacity);
        trace!("Stored frame at slot {}", ix);

        Ok(ix)
    }

    /// Stores the outcome of the step whose frame is at slot `idx`.
    ///
    /// Also recomputes the reward priority of the window ending at `idx`.
    pub fn store_effect(&mut self, idx: usize, effect: &StepEffect) -> Result<(), MpcError> {
        self.check_index(idx)?;
        if effect.action >= self.action_dim {
            return Err(MpcError::InvalidAction {
                action: effect.action,
                action_dim: self.action_dim,
            });
        }

        let slots = match &mut self.storage {
            Storage::Active(slots) => slots,
            Storage::Unallocated => return Err(MpcError::EmptyBuffer),
        };
        set_one_hot(&mut slots.action, idx, effect.action);
        set_one_hot(&mut slots.collision, idx, effect.collision as usize);
        set_one_hot(&mut slots.offroad, idx, effect.offroad as usize);
        slots.terminal[idx] = effect.terminal;
        slots.speed[idx] = effect.speed;
        slots.angle[idx] = effect.angle;
        slots.position[idx] = effect.position;

        let window = priority::reward_window(idx, self.priority.window_len);
        let reward = priority::window_reward(
            &slots.speed[window.clone()],
            &slots.angle[window.clone()],
            &slots.position[window.clone()],
            &self.priority,
        );
        self.set_reward_priority(window.start, reward);

        Ok(())
    }

    /// Returns `true` if the buffer holds enough steps for `batch_size`
    /// windows.
    pub fn can_sample(&self, batch_size: usize) -> bool {
        batch_size
            .checked_mul(self.horizon)
            .map_or(false, |n| n < self.size)
    }

    /// Returns `true` if a window can start at slot `idx`.
    ///
    /// A start is rejected if it is within the edge margin of either end of the
    /// valid range, if an episode ends within the horizon counted from the
    /// first frame of its history, or, once the ring wraps, if its window spans
    /// the seam at the write cursor.
    pub fn is_valid_start(&self, idx: usize) -> bool {
        let margin = self.priority.edge_margin;
        if idx < margin || idx + self.horizon + margin >= self.size {
            return false;
        }

        let slots = match &self.storage {
            Storage::Active(slots) => slots,
            Storage::Unallocated => return false,
        };

        // Signed so that the history of an early start wraps once the ring is full,
        // as in `encode_observation`
        let capacity = self.capacity as isize;
        let mut first = idx as isize + 1 - self.frame_history_len as isize;
        if first < 0 && !self.is_full() {
            first = 0;
        }
        let slot = |k: isize| k.rem_euclid(capacity) as usize;

        if (first..(first + self.horizon as isize)).any(|k| slots.terminal[slot(k)]) {
            return false;
        }

        // The newest slot is followed by the oldest one
        let last = (idx + self.horizon) as isize;
        if self.is_full() && ((first + 1)..=last).any(|k| slot(k) == self.cursor) {
            return false;
        }

        true
    }

    /// Draws `batch_size` distinct valid start indices and encodes their
    /// windows.
    ///
    /// Candidates are `[0, len - 2)`, or the earliest third of the buffer
    /// `[0, len / 3 - 2)` if `sample_early` is set.
    pub fn sample(
        &mut self,
        batch_size: usize,
        sample_early: bool,
    ) -> Result<(TrajectoryBatch, Vec<usize>), MpcError> {
        if !self.can_sample(batch_size) {
            return Err(MpcError::InsufficientData {
                requested: batch_size.saturating_mul(self.horizon).saturating_add(1),
                available: self.size,
            });
        }

        let pool_len = if sample_early {
            (self.size / 3).saturating_sub(2)
        } else {
            self.size.saturating_sub(2)
        };
        let candidates = (0..pool_len)
            .filter(|&ix| self.is_valid_start(ix))
            .collect::<Vec<_>>();
        if candidates.len() < batch_size {
            return Err(MpcError::SamplingExhausted {
                requested: batch_size,
                available: candidates.len(),
            });
        }

        let ixs = if batch_size == 0 {
            vec![]
        } else {
            let min_priority = self.reward_min_tree.query(0, pool_len);
            let weights = candidates
                .iter()
                .map(|&ix| {
                    priority::sampling_weight(
                        self.reward_priority[ix],
                        min_priority,
                        self.priority.weight_offset,
                    )
                })
                .collect::<Vec<_>>();
            let mut sum_tree = SumTree::build(&weights)?;
            sum_tree
                .sample_without_replacement(batch_size, &mut self.rng)?
                .into_iter()
                .map(|leaf| candidates[leaf])
                .collect::<Vec<_>>()
        };
        debug!(
            "Sampled {} windows from {} candidates (sample_early={})",
            ixs.len(),
            candidates.len(),
            sample_early
        );

        let batch = self.encode_batch(&ixs)?;
        Ok((batch, ixs))
    }

    /// Returns the observation at slot `idx` stacked with its history.
    ///
    /// Image frames are concatenated along the channel axis, oldest first.
    /// Frames before the start of the episode, or before the first stored frame,
    /// are zero-filled. Vector observations are returned as stored.
    pub fn encode_observation(&self, idx: usize) -> Result<ArrayD<u8>, MpcError> {
        self.check_index(idx)?;
        let slots = self.slots()?;

        let channels = match slots.kind {
            ObservationKind::Vector { .. } => return Ok(slots.frame(idx).to_owned()),
            ObservationKind::Image { channels, .. } => channels,
        };

        let capacity = self.capacity as isize;
        let end = idx as isize + 1;
        let mut start = end - self.frame_history_len as isize;
        if start < 0 && !self.is_full() {
            start = 0;
        }
        for i in start..(end - 1) {
            if slots.terminal[i.rem_euclid(capacity) as usize] {
                start = i + 1;
            }
        }
        let missing = self.frame_history_len - (end - start) as usize;

        let mut out = ArrayD::zeros(IxDyn(&slots.kind.encoded_shape(self.frame_history_len)));
        for (k, i) in (start..end).enumerate() {
            let c0 = (missing + k) * channels;
            out.slice_axis_mut(Axis(0), Slice::from(c0..(c0 + channels)))
                .assign(&slots.frame(i.rem_euclid(capacity) as usize));
        }

        Ok(out)
    }

    /// Encodes the most recently stored frame with its history.
    pub fn encode_recent_observation(&self) -> Result<ArrayD<u8>, MpcError> {
        match self.last_written {
            Some(ix) => self.encode_observation(ix),
            None => Err(MpcError::EmptyBuffer),
        }
    }

    /// Materializes the windows starting at `ixs`.
    ///
    /// Every start must leave `horizon` stored steps after it.
    pub fn encode_batch(&self, ixs: &[usize]) -> Result<TrajectoryBatch, MpcError> {
        let slots = self.slots()?;
        let h = self.horizon;
        if let Some(&ix) = ixs.iter().find(|&&ix| ix + h >= self.size) {
            return Err(MpcError::InvalidIndex {
                index: ix,
                bound: self.size.saturating_sub(h),
            });
        }

        let b = ixs.len();
        let mut obs_shape = vec![b, h];
        obs_shape.extend(slots.kind.encoded_shape(self.frame_history_len));
        let mut obs = ArrayD::zeros(IxDyn(&obs_shape));
        let mut next_obs = ArrayD::zeros(IxDyn(&obs_shape));
        let mut action = Array3::zeros((b, h, self.action_dim));
        let mut collision = Array3::zeros((b, h, 2));
        let mut offroad = Array3::zeros((b, h, 2));
        let mut speed = Array3::zeros((b, h + 1, 1));
        let mut angle = Array3::zeros((b, h + 1, 1));
        let mut position = Array3::zeros((b, h + 1, 1));
        let mut distance = Array3::zeros((b, h + 1, 1));

        for (j, &ix) in ixs.iter().enumerate() {
            let mut obs_j = obs.index_axis_mut(Axis(0), j);
            let mut next_obs_j = next_obs.index_axis_mut(Axis(0), j);
            for t in 0..h {
                let k = ix + t;
                obs_j
                    .index_axis_mut(Axis(0), t)
                    .assign(&self.encode_observation(k)?);
                next_obs_j
                    .index_axis_mut(Axis(0), t)
                    .assign(&self.encode_observation(k + 1)?);
                action.slice_mut(s![j, t, ..]).assign(&slots.action.row(k));
                collision.slice_mut(s![j, t, ..]).assign(&slots.collision.row(k));
                offroad.slice_mut(s![j, t, ..]).assign(&slots.offroad.row(k));
            }
            for t in 0..=h {
                let k = ix + t;
                speed[[j, t, 0]] = slots.speed[k];
                angle[[j, t, 0]] = slots.angle[k];
                position[[j, t, 0]] = slots.position[k];
                distance[[j, t, 0]] = priority::distance(
                    slots.speed[k],
                    slots.angle[k],
                    slots.position[k],
                    &self.priority,
                );
            }
        }

        Ok(TrajectoryBatch {
            obs,
            next_obs,
            action,
            collision,
            offroad,
            speed,
            angle,
            position,
            distance,
            ix_sample: ixs.to_vec(),
        })
    }

    /// Averages `losses` into the loss priority of the slots `ixs`.
    pub fn store_loss(&mut self, losses: &[f32], ixs: &[usize]) -> Result<(), MpcError> {
        if losses.len() != ixs.len() {
            return Err(MpcError::LengthMismatch {
                expected: ixs.len(),
                found: losses.len(),
            });
        }
        for &ix in ixs.iter() {
            self.check_index(ix)?;
        }

        for (&ix, &loss) in ixs.iter().zip(losses.iter()) {
            self.loss_priority[ix] = (self.loss_priority[ix] + loss) / 2.0;
        }
        Ok(())
    }

    /// Number of valid slots.
    pub fn len(&self) -> usize {
        self.size
    }

    /// Returns `true` if nothing has been stored.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Number of slots of the ring.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns `true` once the ring has been filled and starts overwriting.
    pub fn is_full(&self) -> bool {
        self.size == self.capacity
    }

    /// Prediction steps per window.
    pub fn horizon(&self) -> usize {
        self.horizon
    }

    /// Frames stacked into one encoded observation.
    pub fn frame_history_len(&self) -> usize {
        self.frame_history_len
    }

    /// Number of discrete actions.
    pub fn action_dim(&self) -> usize {
        self.action_dim
    }

    /// Slot returned by the latest [`store_frame`](Self::store_frame).
    pub fn last_written_index(&self) -> Option<usize> {
        self.last_written
    }

    /// Kind of the stored observations, known after the first frame.
    pub fn observation_kind(&self) -> Option<ObservationKind> {
        self.slots().ok().map(|slots| slots.kind)
    }

    /// Loss priority of a slot.
    pub fn loss_priority(&self, idx: usize) -> Option<f32> {
        self.loss_priority.get(idx).copied()
    }

    /// Reward priority of a slot.
    pub fn reward_priority(&self, idx: usize) -> Option<f32> {
        self.reward_priority.get(idx).copied()
    }

    /// Number of valid slots flagged terminal.
    pub fn num_terminal_flags(&self) -> usize {
        match &self.storage {
            Storage::Active(slots) => slots.terminal[..self.size].iter().filter(|&&t| t).count(),
            Storage::Unallocated => 0,
        }
    }

    /// Summary of the buffer state.
    pub fn record(&self) -> Record {
        let n = self.size.max(1) as f32;
        let mean_reward = self.reward_priority[..self.size].iter().sum::<f32>() / n;
        let mean_loss = self.loss_priority[..self.size].iter().sum::<f32>() / n;

        Record::from_slice(&[
            ("len", RecordValue::Scalar(self.size as f32)),
            ("capacity", RecordValue::Scalar(self.capacity as f32)),
            ("terminal_flags", RecordValue::Scalar(self.num_terminal_flags() as f32)),
            ("mean_reward_priority", RecordValue::Scalar(mean_reward)),
            ("mean_loss_priority", RecordValue::Scalar(mean_loss)),
        ])
    }
}

impl ExperienceBufferBase for TrajectoryRingBuffer {
    type Item = Transition;

    fn push(&mut self, tr: Self::Item) -> Result<()> {
        let ix = self.store_frame(tr.frame.view())?;
        self.store_effect(ix, &tr.effect)?;
        Ok(())
    }

    fn len(&self) -> usize {
        self.size
    }
}

impl ReplayBufferBase for TrajectoryRingBuffer {
    type Config = TrajectoryBufferConfig;
    type Batch = TrajectoryBatch;

    fn build(config: &Self::Config) -> Result<Self> {
        Ok(Self::new(config)?)
    }

    fn can_sample(&self, size: usize) -> bool {
        TrajectoryRingBuffer::can_sample(self, size)
    }

    fn batch(&mut self, size: usize) -> Result<Self::Batch> {
        let (batch, _) = self.sample(size, false)?;
        Ok(batch)
    }

    fn update_priority(&mut self, ixs: &[usize], losses: &[f32]) -> Result<()> {
        self.store_loss(losses, ixs)?;
        Ok(())
    }
}
