//! Configuration of [`FrameStatsAccumulator`](super::FrameStatsAccumulator).
use crate::error::MpcError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    default::Default,
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`FrameStatsAccumulator`](super::FrameStatsAccumulator).
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct FrameStatsConfig {
    /// Number of frames kept for the statistics.
    pub capacity: usize,

    /// Number of frames stacked into one encoded observation.
    /// The stacked statistics are replicated this many times.
    pub frame_history_len: usize,
}

impl Default for FrameStatsConfig {
    fn default() -> Self {
        Self {
            capacity: 100_000,
            frame_history_len: 3,
        }
    }
}

impl FrameStatsConfig {
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

    /// Checks that an accumulator can be built from this configuration.
    pub fn validate(&self) -> Result<(), MpcError> {
        if self.capacity == 0 {
            return Err(MpcError::InvalidConfig("capacity must be positive".into()));
        }
        if self.frame_history_len == 0 {
            return Err(MpcError::InvalidConfig(
                "frame_history_len must be positive".into(),
            ));
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
