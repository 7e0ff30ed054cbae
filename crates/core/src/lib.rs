//! Core types and traits for neostore
//!
//! This crate defines the foundational types used throughout the system:
//! - Gid: Global unique identifier of an entity
//! - Value: Scalar metadata value
//! - NdArray / DType: N-dimensional arrays and their element types
//! - DataSlice: Hyperslab selection over arrays
//! - Attr: Declared field descriptors with validation and coercion
//! - Traits: HasTraits, FieldValue and Link for traited entities
//! - Error: Error type hierarchy

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod array;
pub mod attr;
pub mod error;
pub mod slice;
pub mod traits;
pub mod types;
pub mod value;

pub use array::{ArrayData, DType, NdArray};
pub use attr::{Attr, AttrKind, ScalarKind};
pub use error::{Error, Result};
pub use slice::{AxisSlice, DataSlice};
pub use traits::{EntityHandle, FieldValue, HasTraits, Link, GID_FIELD};
pub use types::Gid;
pub use value::Value;
