//! Typed containers and loaders for neostore
//!
//! This crate binds traited entities to container files:
//! - Accessors: one per declared field (Scalar, DataSet, Reference, Json, Uuid)
//! - H5File: a container holding an ordered accessor list over one file
//! - Datatypes: bundled entities and their container formats
//! - Registry: datatype ↔ format ↔ index type lookups
//! - Loaders: Loader, DirLoader and the catalog-backed TvbLoader
//!
//! Lower layers (record framing, chunk index, checksums) live in
//! `neostore-storage`; this crate never touches raw records.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod accessor;
pub mod catalog;
pub mod config;
pub mod datatypes;
pub mod generic_attributes;
pub mod h5file;
pub mod loader;
pub mod metadata;
pub mod registry;

pub use accessor::{Accessor, AccessorKind, DataSet, Json, Reference, Scalar, Uuid, ROOT_GROUP};
pub use catalog::{Catalog, InMemoryCatalog, IndexRecord, OperationInfo};
pub use config::{LoaderConfig, NeostoreConfig, StorageConfig, CONFIG_FILE_NAME};
pub use generic_attributes::GenericAttributes;
pub use h5file::{open_format, H5File, H5Format, Mode, Provenance};
pub use loader::{DirLoader, Loader, TvbLoader};
pub use metadata::DataSetMetaData;
pub use registry::{builtin, Registry, RegistryEntry};
