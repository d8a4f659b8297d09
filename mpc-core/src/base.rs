//! Core interfaces.
mod dynamics;
mod replay_buffer;
pub use dynamics::{DynamicsModel, ModelOutput, OutputHead, RecurrentState};
pub use replay_buffer::{ExperienceBufferBase, ReplayBufferBase};
