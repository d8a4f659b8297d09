//! Records of buffer and training metrics.
//!
//! A [`Record`] is a bag of named values. Buffers report their state through
//! [`TrajectoryRingBuffer::record`](crate::trajectory_buffer::TrajectoryRingBuffer::record)
//! and drivers pass records to a [`Recorder`].
//!
//! ```rust
//! use mpc_core::record::{Record, RecordValue};
//!
//! let mut record = Record::from_scalar("loss", 0.25);
//! record.insert("sampled_indices", RecordValue::Array1(vec![11.0, 42.0]));
//! assert_eq!(record.get_scalar("loss").unwrap(), 0.25);
//! ```
mod base;
mod buffered_recorder;
mod recorder;

pub use base::{Record, RecordValue};
pub use buffered_recorder::BufferedRecorder;
pub use recorder::{AggregateRecorder, Recorder};
