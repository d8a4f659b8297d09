//! Per-pixel statistics of recent frames for input normalization.
//!
//! [`FrameStatsAccumulator`] keeps a ring of raw frames, independent of the
//! trajectory buffer, and derives the elementwise mean and standard deviation
//! that the dynamics model uses to normalize its input.
//!
//! ```rust
//! use mpc_core::frame_stats::{FrameStatsAccumulator, FrameStatsConfig};
//! use ndarray::{ArrayD, IxDyn};
//!
//! let config = FrameStatsConfig::default().capacity(10).frame_history_len(3);
//! let mut stats = FrameStatsAccumulator::new(&config).unwrap();
//! for v in [10u8, 20, 30] {
//!     stats.append(ArrayD::from_elem(IxDyn(&[8, 8, 3]), v).view()).unwrap();
//! }
//!
//! let stats = stats.compute_stats().unwrap();
//! assert_eq!(stats.mean.shape(), &[8, 8, 3]);
//! assert_eq!(stats.stacked_mean.shape(), &[9, 8, 8]);
//! assert_eq!(stats.mean[[0, 0, 0]], 20.0);
//! ```
mod base;
mod config;
pub use base::{FrameStats, FrameStatsAccumulator};
pub use config::FrameStatsConfig;
