//! On-disk byte formats for container files.
//!
//! Keeping serialization separate from operational logic (how records are
//! indexed and replayed) makes format evolution easier to manage.
//!
//! # Module Structure
//!
//! - `header`: 32-byte container header
//! - `record`: self-delimiting, checksummed records

pub mod header;
pub mod record;

pub use header::{
    ContainerHeader, CONTAINER_FORMAT_VERSION, CONTAINER_HEADER_SIZE, CONTAINER_MAGIC,
};
pub use record::{
    decode_chunk_meta, ChunkMeta, DataSetSpec, Record, RecordError, RecordKind, RecordPrefix,
    Seal, SetMeta, MIN_RECORD_LENGTH, RECORD_FORMAT_VERSION, RECORD_PREFIX_SIZE,
};
