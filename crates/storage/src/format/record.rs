//! Container record format.
//!
//! Every change to a container is one self-delimiting record appended after
//! the header. Records are never rewritten; later records override earlier
//! ones.
//!
//! # Record Layout
//!
//! ```text
//! ┌────────────┬─────────┬──────────┬──────────────┬────────────┬────────────┬──────────┐
//! │ Length (4) │ Ver (1) │ Kind (1) │ Meta Len (4) │ Meta (var) │ Body (var) │ CRC32 (4)│
//! └────────────┴─────────┴──────────┴──────────────┴────────────┴────────────┴──────────┘
//! ```
//!
//! `Length` covers everything after itself. The CRC covers `Ver..Body`.
//! `Meta` is MessagePack; `Body` is only present on chunk records and holds
//! raw little-endian array elements.

use std::collections::BTreeMap;

use crc32fast::Hasher;
use serde::{Deserialize, Serialize};

use neostore_core::{DType, Error, Value};

/// Current record format version
pub const RECORD_FORMAT_VERSION: u8 = 1;

/// Bytes before the metadata: length + version + kind + meta length
pub const RECORD_PREFIX_SIZE: usize = 10;

/// Smallest legal value of the length field: version + kind + meta length + crc
pub const MIN_RECORD_LENGTH: usize = 10;

/// Record kind tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordKind {
    /// Metadata side-table update
    SetMeta = 1,
    /// Dataset declaration (resets the dataset's chunk list)
    CreateDataSet = 2,
    /// Dataset chunk with a body
    Chunk = 3,
    /// Completion marker
    Seal = 4,
}

impl RecordKind {
    /// Parse a kind tag
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(RecordKind::SetMeta),
            2 => Some(RecordKind::CreateDataSet),
            3 => Some(RecordKind::Chunk),
            4 => Some(RecordKind::Seal),
            _ => None,
        }
    }
}

/// Entries written into one metadata group. A `Null` value removes the key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetMeta {
    /// Group name ("" is the root side table)
    pub group: String,
    /// Entries to merge into the group
    pub entries: BTreeMap<String, Value>,
}

/// Dataset declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSetSpec {
    /// Dataset name
    pub name: String,
    /// Element type
    pub dtype: DType,
    /// Shape at declaration; the extent along `expand_dim` grows with chunks
    pub shape: Vec<usize>,
    /// Axis along which chunks are appended
    pub expand_dim: Option<usize>,
}

/// Chunk metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMeta {
    /// Dataset the chunk belongs to
    pub name: String,
    /// Element type of the body
    pub dtype: DType,
    /// Chunk shape (same rank as the dataset)
    pub shape: Vec<usize>,
    /// Offset of the chunk along the dataset's expand axis
    pub start: usize,
}

/// Completion marker written by a clean close.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seal {
    /// Format that wrote the container
    pub written_by: String,
    /// Seal timestamp (microseconds since epoch)
    pub sealed_at: u64,
}

/// A decoded container record.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    /// Metadata update
    SetMeta(SetMeta),
    /// Dataset declaration
    CreateDataSet(DataSetSpec),
    /// Dataset chunk: metadata and raw body
    Chunk(ChunkMeta, Vec<u8>),
    /// Completion marker
    Seal(Seal),
}

impl Record {
    /// Kind tag of this record
    pub fn kind(&self) -> RecordKind {
        match self {
            Record::SetMeta(_) => RecordKind::SetMeta,
            Record::CreateDataSet(_) => RecordKind::CreateDataSet,
            Record::Chunk(..) => RecordKind::Chunk,
            Record::Seal(_) => RecordKind::Seal,
        }
    }

    /// Serialize record to bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, RecordError> {
        let meta = match self {
            Record::SetMeta(m) => rmp_serde::to_vec_named(m),
            Record::CreateDataSet(m) => rmp_serde::to_vec_named(m),
            Record::Chunk(m, _) => rmp_serde::to_vec_named(m),
            Record::Seal(m) => rmp_serde::to_vec_named(m),
        }
        .map_err(|e| RecordError::Meta(e.to_string()))?;
        let body: &[u8] = match self {
            Record::Chunk(_, body) => body,
            _ => &[],
        };

        let mut payload = Vec::with_capacity(6 + meta.len() + body.len());
        payload.push(RECORD_FORMAT_VERSION);
        payload.push(self.kind() as u8);
        payload.extend_from_slice(&(meta.len() as u32).to_le_bytes());
        payload.extend_from_slice(&meta);
        payload.extend_from_slice(body);

        let crc = compute_crc(&payload);

        let total_len = payload.len() + 4;
        let mut record = Vec::with_capacity(4 + total_len);
        record.extend_from_slice(&(total_len as u32).to_le_bytes());
        record.extend_from_slice(&payload);
        record.extend_from_slice(&crc.to_le_bytes());
        Ok(record)
    }

    /// Deserialize record from bytes, verifying the checksum.
    ///
    /// Returns (record, bytes_consumed) on success.
    pub fn from_bytes(bytes: &[u8]) -> Result<(Self, usize), RecordError> {
        let prefix = RecordPrefix::parse(bytes)?;
        let total = 4 + prefix.length;
        if bytes.len() < total {
            return Err(RecordError::InsufficientData);
        }

        let payload = &bytes[4..total - 4];
        let stored_crc = read_u32(&bytes[total - 4..total]);
        let computed_crc = compute_crc(payload);
        if computed_crc != stored_crc {
            return Err(RecordError::ChecksumMismatch {
                expected: stored_crc,
                computed: computed_crc,
            });
        }

        let meta = &bytes[RECORD_PREFIX_SIZE..RECORD_PREFIX_SIZE + prefix.meta_len];
        let body = &bytes[RECORD_PREFIX_SIZE + prefix.meta_len..total - 4];
        let record = match prefix.kind {
            RecordKind::SetMeta => Record::SetMeta(decode_meta(meta)?),
            RecordKind::CreateDataSet => Record::CreateDataSet(decode_meta(meta)?),
            RecordKind::Chunk => Record::Chunk(decode_meta(meta)?, body.to_vec()),
            RecordKind::Seal => Record::Seal(decode_meta(meta)?),
        };
        if prefix.kind != RecordKind::Chunk && !body.is_empty() {
            return Err(RecordError::InvalidFormat(format!(
                "{:?} record carries a body",
                prefix.kind
            )));
        }
        Ok((record, total))
    }
}

/// Fixed-size prefix of a record, readable without the rest of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordPrefix {
    /// Value of the length field
    pub length: usize,
    /// Record kind
    pub kind: RecordKind,
    /// Metadata length in bytes
    pub meta_len: usize,
}

impl RecordPrefix {
    /// Parse the first [`RECORD_PREFIX_SIZE`] bytes of a record.
    pub fn parse(bytes: &[u8]) -> Result<Self, RecordError> {
        if bytes.len() < RECORD_PREFIX_SIZE {
            return Err(RecordError::InsufficientData);
        }
        let length = read_u32(&bytes[0..4]) as usize;
        if length < MIN_RECORD_LENGTH {
            return Err(RecordError::InvalidFormat(format!(
                "record length {} below minimum",
                length
            )));
        }
        let version = bytes[4];
        if version != RECORD_FORMAT_VERSION {
            return Err(RecordError::UnsupportedVersion(version));
        }
        let kind = RecordKind::from_byte(bytes[5]).ok_or(RecordError::UnknownKind(bytes[5]))?;
        let meta_len = read_u32(&bytes[6..10]) as usize;
        if meta_len > length - MIN_RECORD_LENGTH {
            return Err(RecordError::InvalidFormat(format!(
                "metadata length {} exceeds record length {}",
                meta_len, length
            )));
        }
        Ok(RecordPrefix {
            length,
            kind,
            meta_len,
        })
    }

    /// Offset of the body from the record start
    pub fn body_offset(&self) -> usize {
        RECORD_PREFIX_SIZE + self.meta_len
    }

    /// Body length in bytes
    pub fn body_len(&self) -> usize {
        self.length - MIN_RECORD_LENGTH - self.meta_len
    }

    /// Total record size including the length field
    pub fn total_len(&self) -> usize {
        4 + self.length
    }
}

/// Decode the metadata section of a chunk record without its body.
pub fn decode_chunk_meta(meta: &[u8]) -> Result<ChunkMeta, RecordError> {
    decode_meta(meta)
}

/// Decode a metadata section.
fn decode_meta<T: serde::de::DeserializeOwned>(meta: &[u8]) -> Result<T, RecordError> {
    rmp_serde::from_slice(meta).map_err(|e| RecordError::Meta(e.to_string()))
}

fn read_u32(bytes: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[..4]);
    u32::from_le_bytes(buf)
}

/// Compute CRC32 checksum of data.
fn compute_crc(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Record parsing errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    /// Not enough data to parse record
    #[error("Insufficient data to parse record")]
    InsufficientData,

    /// Record framing is invalid
    #[error("Invalid record format: {0}")]
    InvalidFormat(String),

    /// Checksum verification failed
    #[error("Checksum mismatch: expected {expected:08x}, computed {computed:08x}")]
    ChecksumMismatch {
        /// Expected checksum from record
        expected: u32,
        /// Computed checksum
        computed: u32,
    },

    /// Unsupported format version
    #[error("Unsupported record format version: {0}")]
    UnsupportedVersion(u8),

    /// Unknown record kind tag
    #[error("Unknown record kind: {0}")]
    UnknownKind(u8),

    /// Metadata could not be encoded or decoded
    #[error("Record metadata error: {0}")]
    Meta(String),
}

impl From<RecordError> for Error {
    fn from(e: RecordError) -> Self {
        match e {
            RecordError::UnsupportedVersion(_) => Error::StorageError(e.to_string()),
            other => Error::Corruption(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(body: Vec<u8>) -> Record {
        Record::Chunk(
            ChunkMeta {
                name: "data".to_string(),
                dtype: DType::U8,
                shape: vec![body.len()],
                start: 0,
            },
            body,
        )
    }

    #[test]
    fn test_set_meta_roundtrip() {
        let mut entries = BTreeMap::new();
        entries.insert("title".to_string(), Value::from("rest"));
        entries.insert("sample_period".to_string(), Value::Float(0.5));
        let record = Record::SetMeta(SetMeta {
            group: String::new(),
            entries,
        });

        let bytes = record.to_bytes().unwrap();
        let (parsed, consumed) = Record::from_bytes(&bytes).unwrap();
        assert_eq!(parsed, record);
        assert_eq!(consumed, bytes.len());
    }

    #[test]
    fn test_chunk_prefix_locates_body() {
        let record = chunk(vec![1, 2, 3, 4]);
        let bytes = record.to_bytes().unwrap();

        let prefix = RecordPrefix::parse(&bytes).unwrap();
        assert_eq!(prefix.kind, RecordKind::Chunk);
        assert_eq!(prefix.body_len(), 4);
        assert_eq!(prefix.total_len(), bytes.len());
        assert_eq!(
            &bytes[prefix.body_offset()..prefix.body_offset() + 4],
            &[1, 2, 3, 4]
        );

        let meta = &bytes[RECORD_PREFIX_SIZE..prefix.body_offset()];
        assert_eq!(decode_chunk_meta(meta).unwrap().name, "data");
    }

    #[test]
    fn test_checksum_failure() {
        let mut bytes = chunk(vec![9; 16]).to_bytes().unwrap();
        let last_body_byte = bytes.len() - 5;
        bytes[last_body_byte] ^= 0xFF;

        assert!(matches!(
            Record::from_bytes(&bytes),
            Err(RecordError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_insufficient_data() {
        assert!(matches!(
            Record::from_bytes(&[1, 2, 3]),
            Err(RecordError::InsufficientData)
        ));

        let bytes = chunk(vec![0; 8]).to_bytes().unwrap();
        assert!(matches!(
            Record::from_bytes(&bytes[..bytes.len() - 1]),
            Err(RecordError::InsufficientData)
        ));
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let mut bytes = Record::Seal(Seal {
            written_by: "FooH5".to_string(),
            sealed_at: 1,
        })
        .to_bytes()
        .unwrap();
        bytes[5] = 0x7F;
        assert!(matches!(
            RecordPrefix::parse(&bytes),
            Err(RecordError::UnknownKind(0x7F))
        ));
    }

    #[test]
    fn test_error_conversion() {
        let err: Error = RecordError::InsufficientData.into();
        assert!(matches!(err, Error::Corruption(_)));
        let err: Error = RecordError::UnsupportedVersion(9).into();
        assert!(matches!(err, Error::StorageError(_)));
    }

    #[test]
    fn test_multiple_records_in_sequence() {
        let records = vec![
            Record::CreateDataSet(DataSetSpec {
                name: "data".to_string(),
                dtype: DType::U8,
                shape: vec![0],
                expand_dim: Some(0),
            }),
            chunk(vec![1, 2]),
            chunk(vec![3]),
            Record::Seal(Seal {
                written_by: "FooH5".to_string(),
                sealed_at: 42,
            }),
        ];

        let mut all_bytes = Vec::new();
        for record in &records {
            all_bytes.extend_from_slice(&record.to_bytes().unwrap());
        }

        let mut offset = 0;
        for expected in &records {
            let (parsed, consumed) = Record::from_bytes(&all_bytes[offset..]).unwrap();
            assert_eq!(&parsed, expected);
            offset += consumed;
        }
        assert_eq!(offset, all_bytes.len());
    }
}
