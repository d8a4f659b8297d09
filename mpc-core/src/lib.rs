#![warn(missing_docs)]
//! Replay buffers for training the dynamics model of a model-predictive
//! driving controller.
//!
//! * [`trajectory_buffer`] - Ring of driving transitions with history-aware
//!   observation encoding and reward-prioritized multi-step sampling.
//! * [`frame_stats`] - Ring of raw frames giving normalization statistics.
//! * [`DynamicsModel`] - Contract of the model trained on sampled windows.
pub mod dummy;
pub mod error;
pub mod frame_stats;
pub mod observation;
pub mod record;
pub mod trajectory_buffer;
pub mod util;

mod base;
pub use base::{
    DynamicsModel, ExperienceBufferBase, ModelOutput, OutputHead, RecurrentState,
    ReplayBufferBase,
};
