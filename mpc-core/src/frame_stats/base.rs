//! Ring of raw frames and the statistics derived from it.
use super::FrameStatsConfig;
use crate::{error::MpcError, observation::ObservationKind, ExperienceBufferBase};
use anyhow::Result;
use log::info;
use ndarray::{concatenate, ArrayD, ArrayViewD, Axis, IxDyn, Slice};

const NORMALIZE_EPS: f32 = 1e-6;

/// Elementwise statistics of the stored frames.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameStats {
    /// Mean in the raw frame layout.
    pub mean: ArrayD<f32>,

    /// Population standard deviation in the raw frame layout.
    pub std: ArrayD<f32>,

    /// Mean in the layout of an encoded observation.
    ///
    /// For images this is the channel-first mean repeated `frame_history_len`
    /// times along the channel axis. For vectors it equals `mean`.
    pub stacked_mean: ArrayD<f32>,

    /// Standard deviation in the layout of an encoded observation.
    pub stacked_std: ArrayD<f32>,
}

impl FrameStats {
    /// Normalizes encoded observations as `(x - mean) / (std + eps)`.
    ///
    /// The trailing axes of `obs` must match the encoded layout. Leading axes,
    /// such as batch and horizon, are broadcast over.
    pub fn normalize(&self, obs: ArrayViewD<u8>) -> Result<ArrayD<f32>, MpcError> {
        let shape = self.stacked_mean.shape();
        let n = obs.ndim();
        if n < shape.len() || &obs.shape()[(n - shape.len())..] != shape {
            return Err(MpcError::ShapeMismatch {
                expected: shape.to_vec(),
                found: obs.shape().to_vec(),
            });
        }

        let denom = self.stacked_std.mapv(|s| s + NORMALIZE_EPS);
        Ok((obs.mapv(|v| v as f32) - &self.stacked_mean) / &denom)
    }
}

/// Accumulates raw frames for normalization statistics.
///
/// The shape of the first frame is fixed for the lifetime of the accumulator.
pub struct FrameStatsAccumulator {
    capacity: usize,
    frame_history_len: usize,
    cursor: usize,
    size: usize,

    /// `[capacity, ...raw frame shape]`, allocated on the first frame.
    frames: Option<ArrayD<u8>>,
    kind: Option<ObservationKind>,
}

impl FrameStatsAccumulator {
    /// Creates an empty accumulator.
    pub fn new(config: &FrameStatsConfig) -> Result<Self, MpcError> {
        config.validate()?;
        Ok(Self {
            capacity: config.capacity,
            frame_history_len: config.frame_history_len,
            cursor: 0,
            size: 0,
            frames: None,
            kind: None,
        })
    }

    /// Stores a raw frame, overwriting the oldest one once full.
    pub fn append(&mut self, frame: ArrayViewD<u8>) -> Result<(), MpcError> {
        let capacity = self.capacity;
        if self.frames.is_none() {
            self.kind = Some(ObservationKind::from_frame_shape(frame.shape())?);
            info!(
                "Allocate frame statistics ring: capacity={}, frame shape={:?}",
                capacity,
                frame.shape()
            );
            let mut shape = vec![capacity];
            shape.extend_from_slice(frame.shape());
            self.frames = Some(ArrayD::zeros(IxDyn(&shape)));
        }

        let frames = match &mut self.frames {
            Some(frames) => frames,
            None => return Err(MpcError::EmptyBuffer),
        };
        if &frames.shape()[1..] != frame.shape() {
            return Err(MpcError::ShapeMismatch {
                expected: frames.shape()[1..].to_vec(),
                found: frame.shape().to_vec(),
            });
        }

        frames.index_axis_mut(Axis(0), self.cursor).assign(&frame);
        self.cursor = (self.cursor + 1) % capacity;
        self.size = (self.size + 1).min(capacity);
        Ok(())
    }

    /// Number of stored frames.
    pub fn len(&self) -> usize {
        self.size
    }

    /// Returns `true` if no frame has been stored.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Maximum number of stored frames.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Shape of the stored frames, known after the first frame.
    pub fn frame_shape(&self) -> Option<&[usize]> {
        self.frames.as_ref().map(|frames| &frames.shape()[1..])
    }

    /// Computes mean and standard deviation over the stored frames.
    pub fn compute_stats(&self) -> Result<FrameStats, MpcError> {
        let (frames, kind) = match (&self.frames, self.kind) {
            (Some(frames), Some(kind)) if self.size > 0 => (frames, kind),
            _ => return Err(MpcError::EmptyBuffer),
        };

        let valid = frames
            .slice_axis(Axis(0), Slice::from(..self.size))
            .mapv(|v| v as f32);
        let mean = valid.mean_axis(Axis(0)).ok_or(MpcError::EmptyBuffer)?;
        let std = valid.std_axis(Axis(0), 0.0);

        let stacked_mean = self.stack(kind, &mean)?;
        let stacked_std = self.stack(kind, &std)?;

        Ok(FrameStats {
            mean,
            std,
            stacked_mean,
            stacked_std,
        })
    }

    // Converts to the encoded observation layout.
    fn stack(&self, kind: ObservationKind, x: &ArrayD<f32>) -> Result<ArrayD<f32>, MpcError> {
        let stored = kind.to_stored(x.view())?;
        if !kind.is_image() {
            return Ok(stored);
        }

        let views = vec![stored.view(); self.frame_history_len];
        concatenate(Axis(0), &views).map_err(|_| MpcError::UnsupportedShape(stored.shape().to_vec()))
    }
}

impl ExperienceBufferBase for FrameStatsAccumulator {
    type Item = ArrayD<u8>;

    fn push(&mut self, frame: Self::Item) -> Result<()> {
        self.append(frame.view())?;
        Ok(())
    }

    fn len(&self) -> usize {
        self.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array, Array1};

    fn accumulator(capacity: usize, frame_history_len: usize) -> FrameStatsAccumulator {
        let config = FrameStatsConfig::default()
            .capacity(capacity)
            .frame_history_len(frame_history_len);
        FrameStatsAccumulator::new(&config).unwrap()
    }

    #[test]
    fn test_empty() {
        let stats = accumulator(4, 3);
        assert!(stats.is_empty());
        assert_eq!(stats.frame_shape(), None);
        assert_eq!(stats.compute_stats(), Err(MpcError::EmptyBuffer));
    }

    #[test]
    fn test_shape_is_fixed_by_first_frame() {
        let mut stats = accumulator(4, 3);
        stats
            .append(ArrayD::zeros(IxDyn(&[2, 3, 3])).view())
            .unwrap();
        assert_eq!(stats.frame_shape(), Some(&[2, 3, 3][..]));
        assert_eq!(
            stats.append(ArrayD::zeros(IxDyn(&[3, 2, 3])).view()),
            Err(MpcError::ShapeMismatch {
                expected: vec![2, 3, 3],
                found: vec![3, 2, 3]
            })
        );
        assert_eq!(stats.len(), 1);
    }

    #[test]
    fn test_stats_over_valid_prefix() {
        let mut stats = accumulator(10, 2);
        stats.append(ArrayD::from_elem(IxDyn(&[2, 2, 3]), 2).view()).unwrap();
        stats.append(ArrayD::from_elem(IxDyn(&[2, 2, 3]), 6).view()).unwrap();

        let s = stats.compute_stats().unwrap();
        // Unwritten slots do not contribute
        assert!(s.mean.iter().all(|&m| m == 4.0));
        assert!(s.std.iter().all(|&v| v == 2.0));
        assert_eq!(s.stacked_mean.shape(), &[6, 2, 2]);
        assert_eq!(s.stacked_std.shape(), &[6, 2, 2]);
    }

    #[test]
    fn test_stacked_stats_are_channel_first() {
        let mut stats = accumulator(4, 2);
        // Channel c holds the value c
        let frame = Array::from_shape_fn(IxDyn(&[2, 2, 3]), |ix| ix[2] as u8);
        stats.append(frame.view()).unwrap();

        let s = stats.compute_stats().unwrap();
        for c in 0..6 {
            assert!(s
                .stacked_mean
                .index_axis(Axis(0), c)
                .iter()
                .all(|&m| m == (c % 3) as f32));
        }
    }

    #[test]
    fn test_ring_overwrites_oldest() {
        let mut stats = accumulator(2, 1);
        for v in [100u8, 1, 3] {
            stats.append(ArrayD::from_elem(IxDyn(&[1, 1]), v).view()).unwrap();
        }
        assert_eq!(stats.len(), 2);
        let s = stats.compute_stats().unwrap();
        assert_eq!(s.mean.shape(), &[1, 1]);
        assert_eq!(s.mean[[0, 0]], 2.0);
        assert_eq!(s.stacked_mean.shape(), &[1, 1, 1]);
    }

    #[test]
    fn test_vector_stats_are_not_stacked() {
        let mut stats = accumulator(4, 3);
        stats.push(Array1::from(vec![1u8, 2, 3]).into_dyn()).unwrap();
        stats.push(Array1::from(vec![3u8, 2, 1]).into_dyn()).unwrap();

        let s = stats.compute_stats().unwrap();
        assert_eq!(s.stacked_mean, s.mean);
        assert_eq!(s.mean.into_raw_vec(), vec![2.0, 2.0, 2.0]);
    }

    #[test]
    fn test_normalize() {
        let mut stats = accumulator(4, 2);
        stats.append(ArrayD::from_elem(IxDyn(&[2, 2]), 10).view()).unwrap();
        stats.append(ArrayD::from_elem(IxDyn(&[2, 2]), 30).view()).unwrap();
        let s = stats.compute_stats().unwrap();

        // [batch, horizon, channels * history, height, width]
        let obs = ArrayD::from_elem(IxDyn(&[3, 4, 2, 2, 2]), 30u8);
        let normalized = s.normalize(obs.view()).unwrap();
        assert_eq!(normalized.shape(), obs.shape());
        assert!(normalized.iter().all(|&x| (x - 1.0).abs() < 1e-4));

        let wrong = ArrayD::<u8>::zeros(IxDyn(&[3, 2, 2]));
        assert!(matches!(
            s.normalize(wrong.view()),
            Err(MpcError::ShapeMismatch { .. })
        ));
    }
}
