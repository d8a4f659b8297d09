//! Record container.
use crate::error::MpcError;
use chrono::prelude::{DateTime, Local};
use std::collections::{
    hash_map::{IntoIter, Iter, Keys},
    HashMap,
};

/// Possible types of values in a [`Record`].
#[derive(Debug, Clone, PartialEq)]
pub enum RecordValue {
    /// A single value, typically a metric like a loss or a priority.
    Scalar(f32),

    /// A timestamp.
    DateTime(DateTime<Local>),

    /// A 1-dimensional array, e.g. the per-sample losses of a batch.
    Array1(Vec<f32>),

    /// A text value.
    String(String),
}

/// Key-value pairs of [`RecordValue`].
#[derive(Debug, Clone, Default)]
pub struct Record(HashMap<String, RecordValue>);

impl Record {
    /// Creates an empty record.
    pub fn empty() -> Self {
        Self(HashMap::new())
    }

    /// Creates a record holding a single scalar.
    pub fn from_scalar(name: impl Into<String>, value: f32) -> Self {
        Self(HashMap::from([(name.into(), RecordValue::Scalar(value))]))
    }

    /// Creates a record from key-value pairs.
    pub fn from_slice<K: Into<String> + Clone>(s: &[(K, RecordValue)]) -> Self {
        Self(
            s.iter()
                .map(|(k, v)| (k.clone().into(), v.clone()))
                .collect(),
        )
    }

    /// Returns an iterator over the keys.
    pub fn keys(&self) -> Keys<String, RecordValue> {
        self.0.keys()
    }

    /// Inserts a key-value pair, replacing an existing value.
    pub fn insert(&mut self, k: impl Into<String>, v: RecordValue) {
        self.0.insert(k.into(), v);
    }

    /// Returns an iterator over the key-value pairs.
    pub fn iter(&self) -> Iter<'_, String, RecordValue> {
        self.0.iter()
    }

    /// Returns an iterator that consumes the record.
    pub fn into_iter_in_record(self) -> IntoIter<String, RecordValue> {
        self.0.into_iter()
    }

    /// Gets a reference to the value of the given key.
    pub fn get(&self, k: &str) -> Option<&RecordValue> {
        self.0.get(k)
    }

    /// Merges two records. Values of `record` win on key collision.
    pub fn merge(self, record: Record) -> Self {
        Record(self.0.into_iter().chain(record.0).collect())
    }

    /// Merges `record` into `self`. Values of `record` win on key collision.
    pub fn merge_inplace(&mut self, record: Record) {
        self.0.extend(record.0);
    }

    /// Gets a scalar value.
    pub fn get_scalar(&self, k: &str) -> Result<f32, MpcError> {
        match self.0.get(k) {
            Some(RecordValue::Scalar(v)) => Ok(*v),
            Some(_) => Err(MpcError::RecordValueTypeError("Scalar".to_string())),
            None => Err(MpcError::RecordKeyError(k.to_string())),
        }
    }

    /// Gets a 1-dimensional array.
    pub fn get_array1(&self, k: &str) -> Result<Vec<f32>, MpcError> {
        match self.0.get(k) {
            Some(RecordValue::Array1(v)) => Ok(v.clone()),
            Some(_) => Err(MpcError::RecordValueTypeError("Array1".to_string())),
            None => Err(MpcError::RecordKeyError(k.to_string())),
        }
    }

    /// Gets a string value.
    pub fn get_string(&self, k: &str) -> Result<String, MpcError> {
        match self.0.get(k) {
            Some(RecordValue::String(s)) => Ok(s.clone()),
            Some(_) => Err(MpcError::RecordValueTypeError("String".to_string())),
            None => Err(MpcError::RecordKeyError(k.to_string())),
        }
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the record has no entries.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_getters() {
        let mut record = Record::from_scalar("len", 12.0);
        record.insert("note", RecordValue::String("warmup".to_string()));

        assert_eq!(record.get_scalar("len").unwrap(), 12.0);
        assert_eq!(record.get_string("note").unwrap(), "warmup");
        assert_eq!(
            record.get_scalar("note"),
            Err(MpcError::RecordValueTypeError("Scalar".to_string()))
        );
        assert_eq!(
            record.get_array1("missing"),
            Err(MpcError::RecordKeyError("missing".to_string()))
        );
    }

    #[test]
    fn test_merge_overwrites() {
        let a = Record::from_slice(&[
            ("x", RecordValue::Scalar(1.0)),
            ("y", RecordValue::Scalar(2.0)),
        ]);
        let b = Record::from_scalar("y", 3.0);
        let mut merged = a.merge(b);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged.get_scalar("y").unwrap(), 3.0);

        merged.merge_inplace(Record::from_slice(&[
            ("x", RecordValue::Scalar(4.0)),
            ("z", RecordValue::Array1(vec![1.0, 2.0])),
        ]));
        let mut keys = merged.keys().cloned().collect::<Vec<_>>();
        keys.sort();
        assert_eq!(keys, vec!["x", "y", "z"]);
        assert_eq!(merged.get_array1("z").unwrap(), vec![1.0, 2.0]);
        let sum = merged
            .iter()
            .filter_map(|(_, v)| match v {
                RecordValue::Scalar(v) => Some(*v),
                _ => None,
            })
            .sum::<f32>();
        assert_eq!(sum, 7.0);
    }
}
