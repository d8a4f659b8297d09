//! Replay buffer interface.
//!
//! The simulation driver feeds a buffer through [`ExperienceBufferBase`] and the
//! training driver draws batches through [`ReplayBufferBase`]. The two sides
//! never run concurrently on the same buffer.
use anyhow::Result;

/// Interface for buffers that store experiences from a simulator.
///
/// # Examples
///
/// ```ignore
/// struct SimpleBuffer<T> {
///     items: Vec<T>,
/// }
///
/// impl<T> ExperienceBufferBase for SimpleBuffer<T> {
///     type Item = T;
///
///     fn push(&mut self, tr: T) -> Result<()> {
///         self.items.push(tr);
///         Ok(())
///     }
///
///     fn len(&self) -> usize {
///         self.items.len()
///     }
/// }
/// ```
pub trait ExperienceBufferBase {
    /// The type of items stored in the buffer.
    type Item;

    /// Pushes an experience into the buffer.
    fn push(&mut self, tr: Self::Item) -> Result<()>;

    /// Returns the number of valid experiences in the buffer.
    fn len(&self) -> usize;

    /// Returns `true` if nothing has been stored yet.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Interface for replay buffers that generate batches for training.
pub trait ReplayBufferBase {
    /// Configuration parameters for the replay buffer.
    type Config: Clone;

    /// The type of batch generated for training.
    type Batch;

    /// Builds a replay buffer from the given configuration.
    fn build(config: &Self::Config) -> Result<Self>
    where
        Self: Sized;

    /// Returns `true` if the buffer holds enough data for a batch of `size`.
    fn can_sample(&self, size: usize) -> bool;

    /// Samples a batch for training.
    fn batch(&mut self, size: usize) -> Result<Self::Batch>;

    /// Feeds per-sample losses of a previous batch back into the buffer.
    ///
    /// `ixs` are the slot indices of the batch and `losses` are index-aligned
    /// with them.
    fn update_priority(&mut self, ixs: &[usize], losses: &[f32]) -> Result<()>;
}
