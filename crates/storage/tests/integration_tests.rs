//! Storage manager integration tests
//!
//! Persisting across reopen, append monotonicity and chunked slicing.

use neostore_core::{AxisSlice, DType, DataSlice, NdArray, Value};
use neostore_storage::StorageManager;
use proptest::prelude::*;
use std::collections::BTreeMap;
use tempfile::tempdir;

#[test]
fn test_streamed_chunks_survive_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("Spectrum_1.h5");
    {
        let mut m = StorageManager::open(&path).unwrap();
        m.append_data("array_data", &NdArray::from_vec(vec![1.0, 2.0]), Some(0))
            .unwrap();
        m.append_data("array_data", &NdArray::from_vec(vec![3.0]), None)
            .unwrap();
        m.seal("FooH5").unwrap();
    }

    let m = StorageManager::open_read(&path).unwrap();
    assert!(m.is_sealed());
    assert_eq!(m.get_data_shape("array_data").unwrap(), vec![3]);
    let info = m.dataset_info("array_data").unwrap();
    assert_eq!(info.chunk_count, 2);
    assert_eq!(info.expand_dim, Some(0));
    assert_eq!(
        m.get_full_data("array_data").unwrap().as_f64().unwrap(),
        &[1.0, 2.0, 3.0]
    );
}

#[test]
fn test_groups_persist() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("a.h5");
    {
        let mut m = StorageManager::open(&path).unwrap();
        let mut stats = BTreeMap::new();
        stats.insert("Minimum".to_string(), Value::Float(-1.0));
        stats.insert("Maximum".to_string(), Value::Float(4.0));
        m.set_metadata("weights", stats).unwrap();
        m.set_meta_value("", "number_of_regions", Value::Int(2)).unwrap();
    }
    let m = StorageManager::open_read(&path).unwrap();
    let groups: Vec<&str> = m.groups().collect();
    assert_eq!(groups, vec!["", "weights"]);
    assert_eq!(m.get_metadata("weights").len(), 2);
    assert!(m.get_metadata("absent").is_empty());
}

#[test]
fn test_string_dataset_roundtrip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("a.h5");
    {
        let mut m = StorageManager::open(&path).unwrap();
        m.store_data("region_labels", &NdArray::from_vec(vec!["a", "bb"]), None)
            .unwrap();
    }
    let m = StorageManager::open_read(&path).unwrap();
    let labels = m.get_full_data("region_labels").unwrap();
    assert_eq!(labels.dtype(), DType::Str(2));
    assert_eq!(labels.as_strings().unwrap(), &["a".to_string(), "bb".to_string()]);
}

#[test]
fn test_empty_dataset_keeps_shape() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("a.h5");
    {
        let mut m = StorageManager::open(&path).unwrap();
        let empty = NdArray::empty(DType::F64, vec![0, 3]).unwrap();
        m.store_data("data", &empty, Some(0)).unwrap();
    }
    let m = StorageManager::open_read(&path).unwrap();
    let data = m.get_full_data("data").unwrap();
    assert_eq!(data.shape(), &[0, 3]);
    assert_eq!(data.dtype(), DType::F64);
}

#[test]
fn test_store_then_append_along_axis() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("a.h5");
    let mut m = StorageManager::open(&path).unwrap();
    let first = NdArray::from_shape_vec(vec![2, 2], vec![1.0, 2.0, 3.0, 4.0]).unwrap();
    m.store_data("data", &first, Some(1)).unwrap();
    let shape = m
        .append_data("data", &NdArray::from_vec(vec![5.0, 6.0]), None)
        .unwrap();
    assert_eq!(shape, vec![2, 3]);

    let row = m
        .get_data("data", &DataSlice::new(vec![AxisSlice::Index(1)]))
        .unwrap();
    assert_eq!(row.as_f64().unwrap(), &[3.0, 4.0, 6.0]);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Any range read over appended chunks equals the same range of the
    /// concatenated array.
    #[test]
    fn prop_chunked_slice_matches_contiguous(
        sizes in prop::collection::vec(1usize..5, 1..6),
        start in 0usize..20,
        len in 0usize..20,
        step in 1usize..4,
    ) {
        let dir = tempdir().unwrap();
        let mut m = StorageManager::open(dir.path().join("p.h5")).unwrap();
        let mut all = Vec::new();
        for size in sizes {
            let part: Vec<f64> = (all.len()..all.len() + size).map(|x| x as f64).collect();
            all.extend_from_slice(&part);
            m.append_data("t", &NdArray::from_vec(part), Some(0)).unwrap();
        }

        let slice = DataSlice::new(vec![AxisSlice::step_range(start, start + len, step)]);
        let got = m.get_data("t", &slice).unwrap();
        let expected = NdArray::from_vec(all).slice(&slice).unwrap();
        prop_assert_eq!(got, expected);
    }
}
