//! Container file header.
//!
//! # Header Layout
//!
//! ```text
//! ┌──────────────┬──────────────────┬────────────────────┬──────────────────┐
//! │ Magic (4)    │ Format Ver (4)   │ File UUID (16)     │ Created At (8)   │
//! └──────────────┴──────────────────┴────────────────────┴──────────────────┘
//! ```
//!
//! All integers are little-endian. `created_at` is microseconds since the
//! Unix epoch.

/// Magic bytes identifying a container file: "NEO5"
pub const CONTAINER_MAGIC: [u8; 4] = *b"NEO5";

/// Current container format version
pub const CONTAINER_FORMAT_VERSION: u32 = 1;

/// Size of the container header in bytes
pub const CONTAINER_HEADER_SIZE: usize = 32;

/// Container header (32 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerHeader {
    /// Magic bytes: "NEO5"
    pub magic: [u8; 4],

    /// Format version for forward compatibility
    pub format_version: u32,

    /// Random id of this physical file (not the entity gid)
    pub file_uuid: [u8; 16],

    /// Creation timestamp (microseconds since epoch)
    pub created_at: u64,
}

impl ContainerHeader {
    /// Create a header for a new file.
    pub fn new(file_uuid: [u8; 16], created_at: u64) -> Self {
        ContainerHeader {
            magic: CONTAINER_MAGIC,
            format_version: CONTAINER_FORMAT_VERSION,
            file_uuid,
            created_at,
        }
    }

    /// Serialize header to bytes.
    pub fn to_bytes(&self) -> [u8; CONTAINER_HEADER_SIZE] {
        let mut bytes = [0u8; CONTAINER_HEADER_SIZE];
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4..8].copy_from_slice(&self.format_version.to_le_bytes());
        bytes[8..24].copy_from_slice(&self.file_uuid);
        bytes[24..32].copy_from_slice(&self.created_at.to_le_bytes());
        bytes
    }

    /// Deserialize header from bytes.
    pub fn from_bytes(bytes: &[u8; CONTAINER_HEADER_SIZE]) -> Option<Self> {
        Some(ContainerHeader {
            magic: bytes[0..4].try_into().ok()?,
            format_version: u32::from_le_bytes(bytes[4..8].try_into().ok()?),
            file_uuid: bytes[8..24].try_into().ok()?,
            created_at: u64::from_le_bytes(bytes[24..32].try_into().ok()?),
        })
    }

    /// Validate the header has correct magic bytes.
    pub fn is_valid(&self) -> bool {
        self.magic == CONTAINER_MAGIC
    }

    /// Whether this build can read the header's format version.
    pub fn is_supported(&self) -> bool {
        self.format_version <= CONTAINER_FORMAT_VERSION
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_roundtrip() {
        let header = ContainerHeader::new([0xAB; 16], 1_700_000_000_000_000);

        let bytes = header.to_bytes();
        let parsed = ContainerHeader::from_bytes(&bytes).unwrap();

        assert_eq!(parsed.magic, CONTAINER_MAGIC);
        assert_eq!(parsed.format_version, CONTAINER_FORMAT_VERSION);
        assert_eq!(parsed.file_uuid, [0xAB; 16]);
        assert_eq!(parsed.created_at, 1_700_000_000_000_000);
        assert!(parsed.is_valid());
        assert!(parsed.is_supported());
    }

    #[test]
    fn test_header_invalid_magic() {
        let mut header = ContainerHeader::new([0; 16], 0);
        header.magic = *b"HDF5";
        assert!(!header.is_valid());
    }

    #[test]
    fn test_header_future_version_unsupported() {
        let mut header = ContainerHeader::new([0; 16], 0);
        header.format_version = CONTAINER_FORMAT_VERSION + 1;
        assert!(!header.is_supported());
    }
}
