//! Replay buffer of driving trajectories for training a dynamics model.
//!
//! [`TrajectoryRingBuffer`] keeps the most recent `capacity` simulator steps in
//! a ring. Each step consists of a raw frame, stored with
//! [`TrajectoryRingBuffer::store_frame`], and its outcome ([`StepEffect`]),
//! stored with [`TrajectoryRingBuffer::store_effect`]. Training draws windows of
//! `horizon` consecutive steps that do not cross an episode boundary, weighted
//! by a reward priority that favors fast driving along the road.
//!
//! # Examples
//!
//! ```rust
//! use mpc_core::trajectory_buffer::{StepEffect, TrajectoryBufferConfig, TrajectoryRingBuffer};
//! use ndarray::{ArrayD, IxDyn};
//!
//! let config = TrajectoryBufferConfig::default()
//!     .capacity(100)
//!     .frame_history_len(2)
//!     .horizon(3)
//!     .action_dim(3);
//! let mut buffer = TrajectoryRingBuffer::new(&config).unwrap();
//!
//! for step in 0..100 {
//!     let frame = ArrayD::<u8>::from_elem(IxDyn(&[4, 4, 3]), step as u8);
//!     let ix = buffer.store_frame(frame.view()).unwrap();
//!     let effect = StepEffect {
//!         action: step % 3,
//!         speed: 1.0,
//!         ..StepEffect::default()
//!     };
//!     buffer.store_effect(ix, &effect).unwrap();
//! }
//!
//! let (batch, ixs) = buffer.sample(8, false).unwrap();
//! assert_eq!(batch.obs.shape(), &[8, 3, 6, 4, 4]);
//!
//! // Feed the per-window losses back
//! buffer.store_loss(&vec![0.5; 8], &ixs).unwrap();
//! ```
mod base;
mod batch;
mod config;
pub mod priority;
pub use base::TrajectoryRingBuffer;
pub use batch::{StepEffect, TrajectoryBatch, Transition};
pub use config::{PriorityConfig, TrajectoryBufferConfig};
