use super::{AggregateRecorder, Record, RecordValue, Recorder};
use chrono::Local;
use log::info;
use std::collections::BTreeMap;

/// Keeps records in memory.
///
/// Written records are kept as they are. Stored records are averaged per key
/// on [`AggregateRecorder::flush`]; the averages are logged and appended to the
/// written records with `step` and `datetime` entries.
#[derive(Default)]
pub struct BufferedRecorder {
    buf: Vec<Record>,
    pending: Vec<Record>,
}

impl BufferedRecorder {
    /// Constructs the recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns an iterator over the written records.
    pub fn iter(&self) -> std::slice::Iter<Record> {
        self.buf.iter()
    }

    /// Number of written records.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns `true` if nothing was written.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

impl Recorder for BufferedRecorder {
    fn write(&mut self, record: Record) {
        self.buf.push(record);
    }
}

impl AggregateRecorder for BufferedRecorder {
    fn store(&mut self, record: Record) {
        self.pending.push(record);
    }

    fn flush(&mut self, step: i64) {
        if self.pending.is_empty() {
            return;
        }

        // Only scalars are aggregated
        let mut sums: BTreeMap<String, (f32, usize)> = BTreeMap::new();
        for record in self.pending.drain(..) {
            for (k, v) in record.into_iter_in_record() {
                if let RecordValue::Scalar(v) = v {
                    let e = sums.entry(k).or_insert((0.0, 0));
                    e.0 += v;
                    e.1 += 1;
                }
            }
        }

        let mut record = Record::from_scalar("step", step as f32);
        record.insert("datetime", RecordValue::DateTime(Local::now()));
        for (k, (sum, n)) in sums.into_iter() {
            let mean = sum / n as f32;
            info!("step {}: {} = {}", step, k, mean);
            record.insert(k, RecordValue::Scalar(mean));
        }
        self.buf.push(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flush_averages_scalars() {
        let mut recorder = BufferedRecorder::new();
        recorder.store(Record::from_scalar("loss", 1.0));
        recorder.store(Record::from_scalar("loss", 3.0));
        recorder.flush(7);

        assert_eq!(recorder.len(), 1);
        let record = recorder.iter().next().unwrap();
        assert_eq!(record.get_scalar("loss").unwrap(), 2.0);
        assert_eq!(record.get_scalar("step").unwrap(), 7.0);
        assert!(matches!(record.get("datetime"), Some(RecordValue::DateTime(_))));

        // Nothing pending, nothing written
        recorder.flush(8);
        assert_eq!(recorder.len(), 1);
    }
}
