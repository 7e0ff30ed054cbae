//! Identity types for neostore
//!
//! This module defines:
//! - Gid: Global unique identifier of a persisted entity

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::Error;

/// Global unique identifier of an entity
///
/// A Gid is a wrapper around a UUID v4. It is generated once when an entity
/// is created and never changes. Cross-entity references are stored as Gids,
/// never as handles to in-memory objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Gid(Uuid);

impl Gid {
    /// Create a new random Gid using UUID v4
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a Gid from raw bytes
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }

    /// Wrap an existing UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Parse a Gid from a URN (`urn:uuid:...`), hyphenated or simple hex form
    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s.trim()).ok().map(Self)
    }

    /// Canonical storage encoding: `urn:uuid:<hyphenated>`
    pub fn urn(&self) -> String {
        self.0.urn().to_string()
    }

    /// 32 lowercase hex digits, used in file names
    pub fn hex(&self) -> String {
        self.0.simple().to_string()
    }

    /// Get the raw bytes of this Gid
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }

    /// Get the wrapped UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for Gid {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Gid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Gid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Gid::parse(s).ok_or_else(|| Error::SerializationError(format!("invalid gid '{}'", s)))
    }
}

impl From<Uuid> for Gid {
    fn from(uuid: Uuid) -> Self {
        Gid(uuid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gid_unique() {
        assert_ne!(Gid::new(), Gid::new());
    }

    #[test]
    fn test_gid_urn_roundtrip() {
        let gid = Gid::new();
        let urn = gid.urn();
        assert!(urn.starts_with("urn:uuid:"));
        assert_eq!(Gid::parse(&urn), Some(gid));
    }

    #[test]
    fn test_gid_hex_roundtrip() {
        let gid = Gid::new();
        let hex = gid.hex();
        assert_eq!(hex.len(), 32);
        assert!(!hex.contains('-'));
        assert_eq!(Gid::parse(&hex), Some(gid));
    }

    #[test]
    fn test_gid_from_str_rejects_garbage() {
        assert!("not-a-gid".parse::<Gid>().is_err());
        let known = "3e551cbd-47ca-11e4-9f21-3c075431bf56";
        let gid: Gid = known.parse().unwrap();
        assert_eq!(gid.to_string(), known);
        assert_eq!(gid.hex(), "3e551cbd47ca11e49f213c075431bf56");
    }
}
