//! neostore - Typed container persistence for traited scientific datatypes
//!
//! An entity (a [`HasTraits`] implementation) is stored as one container file
//! holding scalar metadata, N-dimensional datasets and references to other
//! entities by [`Gid`]. Containers grow incrementally, so large arrays can be
//! streamed chunk by chunk, and loaders resolve entity graphs from a flat
//! directory or from catalog-backed operation folders.
//!
//! # Quick Start
//!
//! ```ignore
//! use neostore::datatypes::TimeSeries;
//! use neostore::{builtin, DirLoader, NdArray};
//!
//! let loader = DirLoader::new("data", builtin(), false)?;
//! let ts = TimeSeries::new(NdArray::zeros(vec![100, 1, 4, 1]), 0.5);
//! let path = loader.store(&ts)?;
//! let loaded = loader.load(ts.gid)?;
//! ```
//!
//! # Architecture
//!
//! - `neostore-core`: ids, values, arrays, attribute descriptors, errors
//! - `neostore-storage`: the record-log container format
//! - `neostore-engine`: accessors, containers, registry and loaders

pub use neostore_core::{
    ArrayData, Attr, AttrKind, AxisSlice, DType, DataSlice, EntityHandle, Error, FieldValue, Gid,
    HasTraits, Link, NdArray, Result, ScalarKind, Value,
};
pub use neostore_engine::*;
pub use neostore_storage::{StorageManager, CONTAINER_FORMAT_VERSION};
