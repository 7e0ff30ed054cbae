//! Core trait definitions for traited entities
//!
//! An entity ("datatype") exposes its fields by name through [`HasTraits`].
//! Containers never reflect over Rust structs: they ask for a field by its
//! declared name and get a [`FieldValue`] back.

use std::any::Any;
use std::borrow::Cow;
use std::fmt;

use crate::array::NdArray;
use crate::error::{Error, Result};
use crate::types::Gid;
use crate::value::Value;

/// Name of the identity field every entity carries
pub const GID_FIELD: &str = "gid";

/// An in-memory typed scientific record with named fields
///
/// Implementations must be constructible empty (`Default` on the concrete
/// type) so loaders can build a fresh instance before `load_into`.
pub trait HasTraits: fmt::Debug + Send + 'static {
    /// Stable type name, used in file names and registry lookups
    fn type_name(&self) -> &'static str;

    /// Global unique identifier
    fn gid(&self) -> Gid;

    /// Whether the entity counts as `type_name` for reference targets
    ///
    /// Specialised datatypes also answer for the type they extend.
    fn is_a(&self, type_name: &str) -> bool {
        self.type_name() == type_name
    }

    /// Read a field by name
    ///
    /// Returns `None` when the entity has no such field, which a container
    /// reports as a schema mismatch. An unset optional field is
    /// `Some(FieldValue::None)`.
    fn field(&self, name: &str) -> Option<FieldValue<'_>>;

    /// Assign a field by name
    ///
    /// # Errors
    /// `SchemaMismatch` for an unknown field, `TypeMismatch` for a value of
    /// the wrong shape.
    fn set_field(&mut self, name: &str, value: FieldValue<'static>) -> Result<()>;

    /// Upcast for downcasting to the concrete type
    fn as_any(&self) -> &dyn Any;

    /// Mutable upcast for downcasting to the concrete type
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl dyn HasTraits {
    /// Downcast to a concrete datatype
    pub fn downcast_ref<T: HasTraits>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    /// Mutable downcast to a concrete datatype
    pub fn downcast_mut<T: HasTraits>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }
}

/// A related entity, either borrowed from its owner or owned outright
pub enum EntityHandle<'a> {
    /// Borrowed from the referencing entity
    Borrowed(&'a dyn HasTraits),
    /// Owned, e.g. freshly loaded by a recursive loader
    Owned(Box<dyn HasTraits>),
}

impl EntityHandle<'_> {
    /// Access the entity
    pub fn get(&self) -> &dyn HasTraits {
        match self {
            EntityHandle::Borrowed(e) => *e,
            EntityHandle::Owned(e) => e.as_ref(),
        }
    }

    /// Get the entity's gid
    pub fn gid(&self) -> Gid {
        self.get().gid()
    }
}

impl fmt::Debug for EntityHandle<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityHandle::Borrowed(e) => f.debug_tuple("Borrowed").field(e).finish(),
            EntityHandle::Owned(e) => f.debug_tuple("Owned").field(e).finish(),
        }
    }
}

/// Value of one entity field as it flows between entity and container
#[derive(Debug)]
pub enum FieldValue<'a> {
    /// Unset optional field
    None,
    /// Scalar metadata value
    Scalar(Value),
    /// JSON document
    Json(serde_json::Value),
    /// N-dimensional array
    Array(Cow<'a, NdArray>),
    /// Bare entity id (own gid or an unresolved reference)
    Id(Gid),
    /// A related entity
    Entity(EntityHandle<'a>),
}

impl<'a> FieldValue<'a> {
    /// True for an unset field
    pub fn is_none(&self) -> bool {
        matches!(self, FieldValue::None)
    }

    /// Short kind name for error messages
    pub fn kind_name(&self) -> &'static str {
        match self {
            FieldValue::None => "None",
            FieldValue::Scalar(_) => "Scalar",
            FieldValue::Json(_) => "Json",
            FieldValue::Array(_) => "Array",
            FieldValue::Id(_) => "Id",
            FieldValue::Entity(_) => "Entity",
        }
    }

    /// Borrowed array view
    pub fn array(array: &'a NdArray) -> Self {
        FieldValue::Array(Cow::Borrowed(array))
    }

    /// Borrowed array view of an optional array
    pub fn optional_array(array: Option<&'a NdArray>) -> Self {
        match array {
            Some(a) => FieldValue::Array(Cow::Borrowed(a)),
            None => FieldValue::None,
        }
    }

    /// Scalar or `None` from an optional value
    pub fn optional_scalar(value: Option<impl Into<Value>>) -> Self {
        match value {
            Some(v) => FieldValue::Scalar(v.into()),
            None => FieldValue::None,
        }
    }

    /// Gid carried by an `Id` or `Entity` value
    pub fn gid(&self) -> Option<Gid> {
        match self {
            FieldValue::Id(gid) => Some(*gid),
            FieldValue::Entity(handle) => Some(handle.gid()),
            _ => None,
        }
    }

    /// Detach from any borrow
    pub fn into_owned(self) -> Result<FieldValue<'static>> {
        Ok(match self {
            FieldValue::None => FieldValue::None,
            FieldValue::Scalar(v) => FieldValue::Scalar(v),
            FieldValue::Json(v) => FieldValue::Json(v),
            FieldValue::Array(a) => FieldValue::Array(Cow::Owned(a.into_owned())),
            FieldValue::Id(gid) => FieldValue::Id(gid),
            FieldValue::Entity(EntityHandle::Owned(e)) => FieldValue::Entity(EntityHandle::Owned(e)),
            FieldValue::Entity(EntityHandle::Borrowed(e)) => {
                // Borrowed entities cannot be cloned through the trait object
                FieldValue::Id(e.gid())
            }
        })
    }

    // ------------------------------------------------------------------
    // Typed extraction used by `HasTraits::set_field` implementations
    // ------------------------------------------------------------------

    /// Extract a required scalar
    pub fn into_value(self, field: &str) -> Result<Value> {
        match self {
            FieldValue::Scalar(v) => Ok(v),
            other => Err(Error::type_mismatch(
                field,
                format!("expected a scalar, got {}", other.kind_name()),
            )),
        }
    }

    /// Extract an optional scalar
    pub fn into_optional_value(self, field: &str) -> Result<Option<Value>> {
        match self {
            FieldValue::None | FieldValue::Scalar(Value::Null) => Ok(None),
            other => other.into_value(field).map(Some),
        }
    }

    /// Extract a required float, widening integers
    pub fn into_f64(self, field: &str) -> Result<f64> {
        let v = self.into_value(field)?;
        v.as_float()
            .ok_or_else(|| Error::type_mismatch(field, format!("expected Float, got {}", v.type_name())))
    }

    /// Extract an optional float
    pub fn into_optional_f64(self, field: &str) -> Result<Option<f64>> {
        match self.into_optional_value(field)? {
            None => Ok(None),
            Some(v) => v.as_float().map(Some).ok_or_else(|| {
                Error::type_mismatch(field, format!("expected Float, got {}", v.type_name()))
            }),
        }
    }

    /// Extract a required integer
    pub fn into_i64(self, field: &str) -> Result<i64> {
        let v = self.into_value(field)?;
        v.as_int()
            .ok_or_else(|| Error::type_mismatch(field, format!("expected Int, got {}", v.type_name())))
    }

    /// Extract a required bool
    pub fn into_bool(self, field: &str) -> Result<bool> {
        let v = self.into_value(field)?;
        v.as_bool()
            .ok_or_else(|| Error::type_mismatch(field, format!("expected Bool, got {}", v.type_name())))
    }

    /// Extract a required string
    pub fn into_string(self, field: &str) -> Result<String> {
        match self.into_value(field)? {
            Value::String(s) => Ok(s),
            v => Err(Error::type_mismatch(
                field,
                format!("expected String, got {}", v.type_name()),
            )),
        }
    }

    /// Extract an optional string
    pub fn into_optional_string(self, field: &str) -> Result<Option<String>> {
        match self.into_optional_value(field)? {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(v) => Err(Error::type_mismatch(
                field,
                format!("expected String, got {}", v.type_name()),
            )),
        }
    }

    /// Extract a required array
    pub fn into_array(self, field: &str) -> Result<NdArray> {
        match self {
            FieldValue::Array(a) => Ok(a.into_owned()),
            other => Err(Error::type_mismatch(
                field,
                format!("expected an array, got {}", other.kind_name()),
            )),
        }
    }

    /// Extract an optional array
    pub fn into_optional_array(self, field: &str) -> Result<Option<NdArray>> {
        match self {
            FieldValue::None => Ok(None),
            other => other.into_array(field).map(Some),
        }
    }

    /// Extract a JSON document (`None` maps to JSON null)
    pub fn into_json(self, field: &str) -> Result<serde_json::Value> {
        match self {
            FieldValue::None => Ok(serde_json::Value::Null),
            FieldValue::Json(v) => Ok(v),
            other => Err(Error::type_mismatch(
                field,
                format!("expected Json, got {}", other.kind_name()),
            )),
        }
    }

    /// Extract an entity id
    pub fn into_gid(self, field: &str) -> Result<Gid> {
        match self {
            FieldValue::Id(gid) => Ok(gid),
            other => Err(Error::type_mismatch(
                field,
                format!("expected an Id, got {}", other.kind_name()),
            )),
        }
    }

    /// Extract a reference slot
    pub fn into_link(self, field: &str) -> Result<Link> {
        match self {
            FieldValue::None => Ok(Link::Unset),
            FieldValue::Id(gid) => Ok(Link::Id(gid)),
            FieldValue::Entity(EntityHandle::Owned(e)) => Ok(Link::Loaded(e)),
            FieldValue::Entity(EntityHandle::Borrowed(e)) => Ok(Link::Id(e.gid())),
            other => Err(Error::type_mismatch(
                field,
                format!("expected a reference, got {}", other.kind_name()),
            )),
        }
    }
}

impl From<Value> for FieldValue<'_> {
    fn from(v: Value) -> Self {
        FieldValue::Scalar(v)
    }
}

impl From<NdArray> for FieldValue<'_> {
    fn from(a: NdArray) -> Self {
        FieldValue::Array(Cow::Owned(a))
    }
}

impl From<Gid> for FieldValue<'_> {
    fn from(gid: Gid) -> Self {
        FieldValue::Id(gid)
    }
}

/// Reference slot held by an entity field
///
/// A reference is a relation plus a lookup, never ownership of the target's
/// storage. After `load_into` it holds the id only; a recursive loader may
/// replace it with the loaded entity.
#[derive(Debug, Default)]
pub enum Link {
    /// No reference
    #[default]
    Unset,
    /// Known id, content not loaded
    Id(Gid),
    /// Loaded entity
    Loaded(Box<dyn HasTraits>),
}

impl Link {
    /// Reference an entity by id
    pub fn to(gid: Gid) -> Self {
        Link::Id(gid)
    }

    /// Hold a loaded entity
    pub fn loaded(entity: impl HasTraits) -> Self {
        Link::Loaded(Box::new(entity))
    }

    /// Referenced id, if any
    pub fn gid(&self) -> Option<Gid> {
        match self {
            Link::Unset => None,
            Link::Id(gid) => Some(*gid),
            Link::Loaded(e) => Some(e.gid()),
        }
    }

    /// True if no reference is set
    pub fn is_unset(&self) -> bool {
        matches!(self, Link::Unset)
    }

    /// True if the target entity is loaded
    pub fn is_loaded(&self) -> bool {
        matches!(self, Link::Loaded(_))
    }

    /// The loaded entity, if any
    pub fn entity(&self) -> Option<&dyn HasTraits> {
        match self {
            Link::Loaded(e) => Some(e.as_ref()),
            _ => None,
        }
    }

    /// The loaded entity as a concrete datatype
    pub fn downcast_ref<T: HasTraits>(&self) -> Option<&T> {
        self.entity().and_then(|e| e.downcast_ref::<T>())
    }

    /// Borrow as a field value
    pub fn as_field(&self) -> FieldValue<'_> {
        match self {
            Link::Unset => FieldValue::None,
            Link::Id(gid) => FieldValue::Id(*gid),
            Link::Loaded(e) => FieldValue::Entity(EntityHandle::Borrowed(e.as_ref())),
        }
    }
}

impl From<Gid> for Link {
    fn from(gid: Gid) -> Self {
        Link::Id(gid)
    }
}
