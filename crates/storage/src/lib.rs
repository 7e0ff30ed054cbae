//! Storage layer for neostore
//!
//! This crate implements the on-disk container engine:
//! - format: 32-byte header and checksummed, self-delimiting records
//! - codec: little-endian array bodies for chunk records
//! - StorageManager: record scan, chunk index, metadata side tables,
//!   append-only writes and torn-tail handling
//!
//! A container is a log: nothing is rewritten in place, later records
//! override earlier ones, and a trailing seal record marks a clean close.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod format;
pub mod manager;

pub use format::{ContainerHeader, Record, RecordError, Seal, CONTAINER_FORMAT_VERSION};
pub use manager::{now_micros, DataSetInfo, StorageManager};
