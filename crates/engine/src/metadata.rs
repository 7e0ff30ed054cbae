//! Cached dataset statistics
//!
//! Viewers need global extrema (for colour bars) of arrays that may be far
//! larger than memory. The extrema are therefore computed when an array is
//! written and kept in the dataset's metadata group under `Minimum` and
//! `Maximum`.

use std::collections::BTreeMap;

use neostore_core::{NdArray, Result, Value};
use neostore_storage::StorageManager;

/// Metadata key of the cached minimum
pub const MINIMUM_KEY: &str = "Minimum";
/// Metadata key of the cached maximum
pub const MAXIMUM_KEY: &str = "Maximum";

/// Cached `{min, max}` of a dataset
///
/// Both are `None` for string arrays, empty arrays and datasets written
/// before statistics were recorded.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataSetMetaData {
    /// Smallest element
    pub min: Option<Value>,
    /// Largest element
    pub max: Option<Value>,
}

impl DataSetMetaData {
    /// Statistics of a whole array
    pub fn from_array(array: &NdArray) -> Self {
        match array.min_max() {
            Some((min, max)) => DataSetMetaData {
                min: Some(min),
                max: Some(max),
            },
            None => DataSetMetaData::default(),
        }
    }

    /// Statistics read back from a metadata group
    pub fn from_map(map: &BTreeMap<String, Value>) -> Self {
        DataSetMetaData {
            min: map.get(MINIMUM_KEY).cloned(),
            max: map.get(MAXIMUM_KEY).cloned(),
        }
    }

    /// Metadata entries; absent statistics map to `Null`, which clears the key
    pub fn to_map(&self) -> BTreeMap<String, Value> {
        let mut map = BTreeMap::new();
        map.insert(
            MINIMUM_KEY.to_string(),
            self.min.clone().unwrap_or(Value::Null),
        );
        map.insert(
            MAXIMUM_KEY.to_string(),
            self.max.clone().unwrap_or(Value::Null),
        );
        map
    }

    /// Read the statistics stored for `dataset`
    pub fn read(storage: &StorageManager, dataset: &str) -> Self {
        Self::from_map(&storage.get_metadata(dataset))
    }

    /// Persist the statistics for `dataset`
    pub fn write(&self, storage: &mut StorageManager, dataset: &str) -> Result<()> {
        storage.set_metadata(dataset, self.to_map())
    }

    /// True when both extrema are known
    pub fn is_known(&self) -> bool {
        self.min.is_some() && self.max.is_some()
    }

    /// Statistics after appending a chunk with statistics `chunk`
    ///
    /// Unknown statistics stay unknown: they mean the existing data has no
    /// numeric extrema, and a chunk cannot recover them.
    pub fn merge(&self, chunk: &DataSetMetaData) -> DataSetMetaData {
        if !chunk.is_known() {
            return self.clone();
        }
        match (&self.min, &self.max, &chunk.min, &chunk.max) {
            (Some(a_min), Some(a_max), Some(b_min), Some(b_max)) => DataSetMetaData {
                min: Some(extremum(a_min, b_min, false)),
                max: Some(extremum(a_max, b_max, true)),
            },
            _ => DataSetMetaData::default(),
        }
    }
}

/// Smaller (or larger) of two statistics of the same array
///
/// NaN is sticky, integers widen to floats when mixed with them, and
/// booleans order `false < true`.
fn extremum(a: &Value, b: &Value, larger: bool) -> Value {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => Value::Int(if larger { *x.max(y) } else { *x.min(y) }),
        (Value::Bool(x), Value::Bool(y)) => Value::Bool(if larger { *x || *y } else { *x && *y }),
        _ => match (a.as_float(), b.as_float()) {
            (Some(x), Some(y)) if x.is_nan() || y.is_nan() => Value::Float(f64::NAN),
            (Some(x), Some(y)) => Value::Float(if larger { x.max(y) } else { x.min(y) }),
            _ => a.clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(min: f64, max: f64) -> DataSetMetaData {
        DataSetMetaData {
            min: Some(Value::Float(min)),
            max: Some(Value::Float(max)),
        }
    }

    #[test]
    fn test_from_array_numeric_and_string() {
        let a = NdArray::from_vec(vec![3i64, -1, 7]);
        let m = DataSetMetaData::from_array(&a);
        assert_eq!(m.min, Some(Value::Int(-1)));
        assert_eq!(m.max, Some(Value::Int(7)));

        let s = NdArray::from_vec(vec!["a", "b"]);
        assert!(!DataSetMetaData::from_array(&s).is_known());
    }

    #[test]
    fn test_map_roundtrip_absent_clears() {
        let map = DataSetMetaData::default().to_map();
        assert_eq!(map.get(MINIMUM_KEY), Some(&Value::Null));
        let back = DataSetMetaData::from_map(&stats(1.0, 2.0).to_map());
        assert_eq!(back, stats(1.0, 2.0));
    }

    #[test]
    fn test_merge_widens_range() {
        let merged = stats(0.0, 2.0).merge(&stats(-1.0, 1.0));
        assert_eq!(merged, stats(-1.0, 2.0));
    }

    #[test]
    fn test_merge_nan_is_sticky() {
        let merged = stats(0.0, 2.0).merge(&stats(f64::NAN, f64::NAN));
        assert!(matches!(merged.min, Some(Value::Float(x)) if x.is_nan()));
        assert!(matches!(merged.max, Some(Value::Float(x)) if x.is_nan()));
    }

    #[test]
    fn test_merge_with_unknown() {
        assert_eq!(stats(0.0, 1.0).merge(&DataSetMetaData::default()), stats(0.0, 1.0));
        assert!(!DataSetMetaData::default().merge(&stats(0.0, 1.0)).is_known());
    }

    #[test]
    fn test_merge_mixed_int_float() {
        let ints = DataSetMetaData {
            min: Some(Value::Int(1)),
            max: Some(Value::Int(5)),
        };
        assert_eq!(ints.merge(&stats(0.5, 2.0)), stats(0.5, 5.0));
    }
}
