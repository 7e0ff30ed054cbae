//! Container Tests
//!
//! End-to-end behaviour of typed containers over real files:
//! - streamed appends survive close and reopen
//! - shape grows monotonically along the expandable axis
//! - optional and required absence
//! - cached statistics after store and append
//! - references come back as ids, never resolved
//! - storing an entity that lacks a declared field
//! - derived formats dispatch with their base accessors

mod common;

use common::{array, registry, Stream, StreamH5, STREAM_WRITTEN_BY};
use neostore_core::{AxisSlice, DataSlice, Error, FieldValue, Gid, HasTraits, Link, NdArray, Value};
use neostore_engine::datatypes::{
    Connectivity, ConnectivityH5, TimeSeries, TimeSeriesH5, TimeSeriesRegion, TimeSeriesRegionH5,
};
use neostore_engine::{H5File, H5Format, Mode};
use proptest::prelude::*;
use tempfile::TempDir;

#[test]
fn test_streamed_spectrum_scenario() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("stream.h5");

    {
        let mut f = StreamH5::create(&path).unwrap();
        let stream = Stream::labelled("alpha");
        f.h5file_mut().store(&stream, true).unwrap();
        assert_eq!(f.h5file_mut().append("values", &array(&[1.0, 2.0])).unwrap(), vec![2]);
        assert_eq!(f.h5file_mut().append("values", &array(&[3.0])).unwrap(), vec![3]);
        f.h5file_mut().close().unwrap();
    }

    let f = StreamH5::open_read(&path).unwrap();
    let file = f.h5file();
    assert!(file.is_complete());
    assert_eq!(file.shape("values").unwrap(), vec![3]);
    let values = file.load_field("values").unwrap().into_array("values").unwrap();
    assert_eq!(values.as_f64().unwrap(), &[1.0, 2.0, 3.0]);

    let stats = file.cached_stats("values").unwrap();
    assert_eq!(stats.min, Some(Value::Float(1.0)));
    assert_eq!(stats.max, Some(Value::Float(3.0)));

    let tail = file
        .read_slice("values", &DataSlice::new(vec![AxisSlice::from(1)]))
        .unwrap();
    assert_eq!(tail.as_f64().unwrap(), &[2.0, 3.0]);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_append_grows_by_chunk_length(chunks in prop::collection::vec(1usize..6, 1..6)) {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("grow.h5");
        let mut expected = 0;
        {
            let mut f = StreamH5::create(&path).unwrap();
            for len in &chunks {
                expected += len;
                let shape = f.h5file_mut().append("values", &NdArray::zeros(vec![*len])).unwrap();
                prop_assert_eq!(shape, vec![expected]);
            }
            f.h5file_mut().close().unwrap();
        }
        let f = StreamH5::open_read(&path).unwrap();
        prop_assert_eq!(f.h5file().shape("values").unwrap(), vec![expected]);
    }
}

#[test]
fn test_optional_fields_absent() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("empty.h5");
    let stream = Stream::default();
    {
        let mut f = StreamH5::create(&path).unwrap();
        f.h5file_mut().store(&stream, false).unwrap();
        f.h5file_mut().close().unwrap();
    }

    let f = StreamH5::open_read(&path).unwrap();
    let mut loaded = Stream::default();
    f.h5file().load_into(&mut loaded).unwrap();
    assert_eq!(loaded.gid, stream.gid);
    assert_eq!(loaded.label, None);
    assert!(loaded.values.is_none());
    assert!(loaded.upstream.is_unset());
    assert!(f.h5file().load_field("upstream").unwrap().is_none());
}

#[test]
fn test_required_field_absent_is_missing_data() {
    let temp_dir = TempDir::new().unwrap();
    let f = TimeSeriesH5::create(temp_dir.path().join("ts.h5")).unwrap();
    let err = f.load_field("sample_period").unwrap_err();
    assert!(err.is_missing_data());

    let mut ts = TimeSeries::default();
    assert!(f.load_into(&mut ts).unwrap_err().is_missing_data());
}

#[test]
fn test_reference_not_resolved() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("ref.h5");
    let target = Gid::new();
    let stream = Stream {
        upstream: Link::to(target),
        ..Stream::labelled("child")
    };
    {
        let mut f = StreamH5::create(&path).unwrap();
        f.h5file_mut().store(&stream, false).unwrap();
        f.h5file_mut().close().unwrap();
    }

    let f = StreamH5::open_read(&path).unwrap();
    assert_eq!(f.h5file().reference("upstream").unwrap(), Some(target));
    assert_eq!(f.h5file().gather_references().unwrap(), vec![("upstream", target)]);
    match f.h5file().load_field("upstream").unwrap() {
        FieldValue::Id(gid) => assert_eq!(gid, target),
        other => panic!("expected an id, got {:?}", other),
    }
}

#[test]
fn test_store_overwrites_stats() {
    let temp_dir = TempDir::new().unwrap();
    let mut f = StreamH5::create(temp_dir.path().join("stats.h5")).unwrap();
    let mut stream = Stream {
        values: Some(array(&[4.0, -1.0, 2.0])),
        ..Default::default()
    };
    f.h5file_mut().store(&stream, false).unwrap();
    let stats = f.h5file().cached_stats("values").unwrap();
    assert_eq!(stats.min, Some(Value::Float(-1.0)));
    assert_eq!(stats.max, Some(Value::Float(4.0)));

    stream.values = Some(array(&[10.0]));
    f.h5file_mut().store(&stream, false).unwrap();
    let stats = f.h5file().cached_stats("values").unwrap();
    assert_eq!(stats.min, Some(Value::Float(10.0)));
    assert_eq!(stats.max, Some(Value::Float(10.0)));

    f.h5file_mut().append("values", &array(&[-5.0])).unwrap();
    let stats = f.h5file().cached_stats("values").unwrap();
    assert_eq!(stats.min, Some(Value::Float(-5.0)));
    assert_eq!(stats.max, Some(Value::Float(10.0)));
}

#[test]
fn test_invalid_appends() {
    let temp_dir = TempDir::new().unwrap();

    let mut conn = ConnectivityH5::create(temp_dir.path().join("conn.h5")).unwrap();
    let err = conn.append("weights", &NdArray::zeros(vec![1, 2])).unwrap_err();
    assert!(matches!(err, Error::InvalidAppend(_)));

    let path = temp_dir.path().join("ro.h5");
    {
        let mut f = StreamH5::create(&path).unwrap();
        f.h5file_mut().append("values", &array(&[1.0])).unwrap();
        f.h5file_mut().close().unwrap();
    }
    let mut f = StreamH5::open_read(&path).unwrap();
    let err = f.h5file_mut().append("values", &array(&[2.0])).unwrap_err();
    assert!(matches!(err, Error::InvalidAppend(_)));
}

#[test]
fn test_from_file_dispatches_on_provenance() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("dispatch.h5");
    let stream = Stream::labelled("beta");
    {
        let mut f = StreamH5::create(&path).unwrap();
        f.h5file_mut().store(&stream, false).unwrap();
        f.h5file_mut().close().unwrap();
    }

    let provenance = H5File::read_provenance(&path).unwrap().unwrap();
    assert_eq!(provenance.written_by, STREAM_WRITTEN_BY);
    assert!(provenance.written_at.is_some());

    let registry = registry();
    let file = H5File::from_file(&path, &registry, Mode::ReadOnly).unwrap();
    assert_eq!(file.written_by(), STREAM_WRITTEN_BY);
    assert_eq!(file.stored_gid().unwrap(), stream.gid());

    let builtin_only = neostore_engine::builtin();
    let err = H5File::from_file(&path, &builtin_only, Mode::ReadOnly).unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn test_store_entity_lacking_declared_field() {
    let temp_dir = TempDir::new().unwrap();
    let mut f = TimeSeriesH5::create(temp_dir.path().join("mismatch.neo5")).unwrap();
    let err = f.store(&Connectivity::default(), false).unwrap_err();
    match err {
        Error::SchemaMismatch { container, field } => {
            assert_eq!(container, TimeSeriesH5::WRITTEN_BY);
            assert_eq!(field, "title");
        }
        other => panic!("expected SchemaMismatch, got {:?}", other),
    }
}

#[test]
fn test_derived_format_dispatch() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("TimeSeriesRegion_dispatch.neo5");
    let connectivity = Gid::new();
    let ts = TimeSeriesRegion::new(NdArray::zeros(vec![3, 1, 2, 1]), 0.25, connectivity);
    {
        let mut f = TimeSeriesRegionH5::create(&path).unwrap();
        f.store(&ts, false).unwrap();
        f.close().unwrap();
    }

    let file = H5File::from_file(&path, &neostore_engine::builtin(), Mode::ReadOnly).unwrap();
    assert_eq!(file.written_by(), TimeSeriesRegionH5::WRITTEN_BY);
    assert_eq!(file.shape("data").unwrap(), vec![3, 1, 2, 1]);
    assert_eq!(file.reference("connectivity").unwrap(), Some(connectivity));

    let mut loaded = TimeSeriesRegion::default();
    file.load_into(&mut loaded).unwrap();
    assert_eq!(loaded.gid(), ts.gid());
    assert_eq!(loaded.series.sample_period, 0.25);
}
