use super::Record;

/// Writes a record to an output destination with [`Recorder::write`].
pub trait Recorder {
    /// Writes a record.
    fn write(&mut self, record: Record);
}

/// A recorder that keeps records and writes aggregated values on flush.
pub trait AggregateRecorder {
    /// Stores a record for later aggregation.
    fn store(&mut self, record: Record);

    /// Writes values aggregated from the stored records.
    fn flush(&mut self, step: i64);
}
