//! Configuration of [`TrajectoryRingBuffer`](super::TrajectoryRingBuffer).
use crate::error::MpcError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    default::Default,
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Constants of the reward-priority signal and of prioritized sampling.
///
/// # Examples
///
/// ```rust
/// use mpc_core::trajectory_buffer::PriorityConfig;
///
/// let config = PriorityConfig::default().window_len(20).edge_margin(5);
/// assert_eq!(config.window_len, 20);
/// ```
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct PriorityConfig {
    /// Number of slots aggregated into one reward priority.
    pub window_len: usize,

    /// Divisor of the summed per-step reward.
    pub reward_speed_scale: f32,

    /// Lateral deviation that costs one unit of speed in the reward priority.
    pub reward_position_scale: f32,

    /// Lateral deviation that costs one unit of speed in the distance target.
    pub distance_position_scale: f32,

    /// Added to the shifted reward priority before taking the log.
    /// Must be larger than 1 to keep all weights positive.
    pub weight_offset: f32,

    /// Loss priority of slots that were never trained on.
    pub initial_loss_priority: f32,

    /// Start indices closer than this to either end of the valid range are
    /// never sampled.
    pub edge_margin: usize,
}

impl Default for PriorityConfig {
    fn default() -> Self {
        Self {
            window_len: 15,
            reward_speed_scale: 40.0,
            reward_position_scale: 9.0,
            distance_position_scale: 7.0,
            weight_offset: 2.0,
            initial_loss_priority: 1000.0,
            edge_margin: 10,
        }
    }
}

impl PriorityConfig {
    /// Sets the length of the reward-priority window.
    pub fn window_len(mut self, v: usize) -> Self {
        self.window_len = v;
        self
    }

    /// Sets the divisor of the summed per-step reward.
    pub fn reward_speed_scale(mut self, v: f32) -> Self {
        self.reward_speed_scale = v;
        self
    }

    /// Sets the lateral scale of the reward priority.
    pub fn reward_position_scale(mut self, v: f32) -> Self {
        self.reward_position_scale = v;
        self
    }

    /// Sets the lateral scale of the distance target.
    pub fn distance_position_scale(mut self, v: f32) -> Self {
        self.distance_position_scale = v;
        self
    }

    /// Sets the offset of the sampling weight.
    pub fn weight_offset(mut self, v: f32) -> Self {
        self.weight_offset = v;
        self
    }

    /// Sets the initial loss priority.
    pub fn initial_loss_priority(mut self, v: f32) -> Self {
        self.initial_loss_priority = v;
        self
    }

    /// Sets the margin excluded from sampling at both ends.
    pub fn edge_margin(mut self, v: usize) -> Self {
        self.edge_margin = v;
        self
    }
}

/// Configuration of [`TrajectoryRingBuffer`](super::TrajectoryRingBuffer).
///
/// # Examples
///
/// ```rust
/// use mpc_core::trajectory_buffer::TrajectoryBufferConfig;
///
/// let config = TrajectoryBufferConfig::default()
///     .capacity(50_000)
///     .frame_history_len(3)
///     .horizon(10)
///     .action_dim(9)
///     .seed(7);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct TrajectoryBufferConfig {
    /// Number of slots of the ring.
    pub capacity: usize,

    /// Frames of context stacked into one encoded observation.
    pub frame_history_len: usize,

    /// Prediction steps per sampled window.
    pub horizon: usize,

    /// Number of discrete actions.
    pub action_dim: usize,

    /// Seed of the sampling random number generator.
    pub seed: u64,

    /// Reward-priority and sampling constants.
    #[serde(default)]
    pub priority: PriorityConfig,
}

impl Default for TrajectoryBufferConfig {
    fn default() -> Self {
        Self {
            capacity: 100_000,
            frame_history_len: 3,
            horizon: 10,
            action_dim: 9,
            seed: 42,
            priority: PriorityConfig::default(),
        }
    }
}

impl TrajectoryBufferConfig {
    /// Sets the capacity.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the number of stacked frames.
    pub fn frame_history_len(mut self, frame_history_len: usize) -> Self {
        self.frame_history_len = frame_history_len;
        self
    }

    /// Sets the prediction horizon.
    pub fn horizon(mut self, horizon: usize) -> Self {
        self.horizon = horizon;
        self
    }

    /// Sets the number of discrete actions.
    pub fn action_dim(mut self, action_dim: usize) -> Self {
        self.action_dim = action_dim;
        self
    }

    /// Sets the random seed.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Sets the priority constants.
    pub fn priority(mut self, priority: PriorityConfig) -> Self {
        self.priority = priority;
        self
    }

    /// Checks that a buffer can be built from this configuration.
    pub fn validate(&self) -> Result<(), MpcError> {
        let positive = [
            ("capacity", self.capacity),
            ("frame_history_len", self.frame_history_len),
            ("horizon", self.horizon),
            ("action_dim", self.action_dim),
            ("priority.window_len", self.priority.window_len),
        ];
        for (name, v) in positive.iter() {
            if *v == 0 {
                return Err(MpcError::InvalidConfig(format!("{} must be positive", name)));
            }
        }
        if !(self.priority.weight_offset > 1.0) {
            return Err(MpcError::InvalidConfig(format!(
                "priority.weight_offset must be larger than 1, got {}",
                self.priority.weight_offset
            )));
        }
        Ok(())
    }

    /// Loads the configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves the configuration to a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_serde_trajectory_buffer_config() -> Result<()> {
        let config = TrajectoryBufferConfig::default()
            .capacity(2000)
            .horizon(5)
            .priority(PriorityConfig::default().edge_margin(3));

        let dir = TempDir::new("trajectory_buffer_config")?;
        let path = dir.path().join("trajectory_buffer.yaml");
        config.save(&path)?;
        let config_ = TrajectoryBufferConfig::load(&path)?;
        assert_eq!(config, config_);
        Ok(())
    }

    #[test]
    fn test_priority_defaults_when_missing() -> Result<()> {
        let yaml = "capacity: 10\nframe_history_len: 2\nhorizon: 1\naction_dim: 3\nseed: 0\n";
        let config: TrajectoryBufferConfig = serde_yaml::from_str(yaml)?;
        assert_eq!(config.priority, PriorityConfig::default());
        Ok(())
    }

    #[test]
    fn test_validate() {
        assert!(TrajectoryBufferConfig::default().validate().is_ok());
        assert!(matches!(
            TrajectoryBufferConfig::default().horizon(0).validate(),
            Err(MpcError::InvalidConfig(_))
        ));
        let config = TrajectoryBufferConfig::default()
            .priority(PriorityConfig::default().weight_offset(1.0));
        assert!(matches!(config.validate(), Err(MpcError::InvalidConfig(_))));
    }
}
