//! Errors in the library.
use thiserror::Error;

/// Errors in the library.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MpcError {
    /// A stored item's shape disagrees with the shape fixed at first allocation.
    #[error("Shape mismatch: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        /// Shape fixed by the first stored item.
        expected: Vec<usize>,
        /// Shape of the rejected item.
        found: Vec<usize>,
    },

    /// The shape cannot be interpreted as an image or a flat vector.
    #[error("Unsupported observation shape: {0:?}")]
    UnsupportedShape(Vec<usize>),

    /// The operation needs at least one stored item.
    #[error("Buffer is empty")]
    EmptyBuffer,

    /// The buffer does not hold enough items for the request.
    #[error("Insufficient data: requested {requested}, available {available}")]
    InsufficientData {
        /// Number of items the caller asked for.
        requested: usize,
        /// Number of items the buffer can serve.
        available: usize,
    },

    /// Index outside of the addressable range.
    #[error("Invalid index {index}, must be less than {bound}")]
    InvalidIndex {
        /// The rejected index.
        index: usize,
        /// Exclusive upper bound.
        bound: usize,
    },

    /// Discrete action outside of `[0, action_dim)`.
    #[error("Invalid action {action}, must be less than {action_dim}")]
    InvalidAction {
        /// The rejected action.
        action: usize,
        /// Number of discrete actions.
        action_dim: usize,
    },

    /// Two index-aligned inputs have different lengths.
    #[error("Length mismatch: expected {expected}, found {found}")]
    LengthMismatch {
        /// Expected length.
        expected: usize,
        /// Actual length.
        found: usize,
    },

    /// Prioritized sampling cannot collect enough distinct valid start indices.
    #[error("Sampling exhausted: requested {requested} unique indices, only {available} valid")]
    SamplingExhausted {
        /// Number of indices requested.
        requested: usize,
        /// Size of the valid candidate pool.
        available: usize,
    },

    /// Sampling weights are not finite or sum to zero.
    #[error("Degenerate sampling weights: {0}")]
    DegenerateWeights(String),

    /// Configuration values that cannot build a buffer.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A model output lacks a head needed by the caller.
    #[error("Missing model output: {0}")]
    MissingOutput(String),

    /// Record key error.
    #[error("Record key error: {0}")]
    RecordKeyError(String),

    /// Record value type error.
    #[error("Record value type error: {0}")]
    RecordValueTypeError(String),
}
