//! Attribute descriptors
//!
//! An [`Attr`] describes one declared field of a datatype: its name, its
//! semantic kind, whether it is required, an optional default and an
//! optional list of allowed values. Accessors validate every value through
//! [`Attr::validate_and_coerce`] before it reaches storage.
//!
//! ## Coercions
//!
//! - an `Int` stored into a `Float` scalar field becomes a `Float`
//! - arrays are widened to the declared element type when the cast is
//!   lossless (see [`DType::can_cast_to`]); narrowing is rejected
//! - a reference accepts either an entity (its gid is used) or a bare id

use std::borrow::Cow;

use crate::array::{DType, NdArray};
use crate::error::{Error, Result};
use crate::traits::{FieldValue, GID_FIELD};
use crate::value::Value;

/// Primitive scalar kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    /// Boolean
    Bool,
    /// Signed integer
    Int,
    /// Floating point
    Float,
    /// UTF-8 string
    Str,
}

/// Semantic kind of a declared field
#[derive(Debug, Clone, PartialEq)]
pub enum AttrKind {
    /// Single primitive value
    Scalar(ScalarKind),
    /// N-dimensional array
    Array {
        /// Required element type (`None` accepts any)
        dtype: Option<DType>,
        /// Required number of dimensions (`None` accepts any)
        ndim: Option<usize>,
    },
    /// JSON document
    Json,
    /// Reference to another entity
    Reference {
        /// Required type name of the target (`None` accepts any)
        target: Option<&'static str>,
    },
    /// The entity's own identity
    Gid,
}

/// Declared field of a datatype
#[derive(Debug, Clone, PartialEq)]
pub struct Attr {
    /// Field name; also the storage key
    pub field_name: &'static str,
    /// Semantic kind
    pub kind: AttrKind,
    /// Whether a value must be present
    pub required: bool,
    /// Value assumed when storage has none
    pub default: Option<Value>,
    /// Allowed scalar values
    pub choices: Option<Vec<Value>>,
    /// One-line description
    pub doc: &'static str,
}

impl Attr {
    fn with_kind(field_name: &'static str, kind: AttrKind) -> Self {
        Attr {
            field_name,
            kind,
            required: true,
            default: None,
            choices: None,
            doc: "",
        }
    }

    /// Scalar field of the given kind, required by default
    pub fn scalar(field_name: &'static str, kind: ScalarKind) -> Self {
        Attr::with_kind(field_name, AttrKind::Scalar(kind))
    }

    /// Float scalar field
    pub fn float(field_name: &'static str) -> Self {
        Attr::scalar(field_name, ScalarKind::Float)
    }

    /// Integer scalar field
    pub fn int(field_name: &'static str) -> Self {
        Attr::scalar(field_name, ScalarKind::Int)
    }

    /// Boolean scalar field
    pub fn bool(field_name: &'static str) -> Self {
        Attr::scalar(field_name, ScalarKind::Bool)
    }

    /// String scalar field
    pub fn string(field_name: &'static str) -> Self {
        Attr::scalar(field_name, ScalarKind::Str)
    }

    /// Array field accepting any element type and rank
    pub fn array(field_name: &'static str) -> Self {
        Attr::with_kind(
            field_name,
            AttrKind::Array {
                dtype: None,
                ndim: None,
            },
        )
    }

    /// JSON document field
    pub fn json(field_name: &'static str) -> Self {
        Attr::with_kind(field_name, AttrKind::Json)
    }

    /// Reference to another entity
    pub fn reference(field_name: &'static str) -> Self {
        Attr::with_kind(field_name, AttrKind::Reference { target: None })
    }

    /// The identity field every datatype has
    pub fn gid() -> Self {
        Attr::with_kind(GID_FIELD, AttrKind::Gid).doc("global unique identifier")
    }

    /// Mark the field optional
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Set a default value
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Restrict scalar values to a fixed set
    pub fn choices(mut self, choices: Vec<Value>) -> Self {
        self.choices = Some(choices);
        self
    }

    /// Required element type for array fields
    pub fn dtype(mut self, dtype: DType) -> Self {
        if let AttrKind::Array { dtype: d, .. } = &mut self.kind {
            *d = Some(dtype);
        }
        self
    }

    /// Required rank for array fields
    pub fn ndim(mut self, ndim: usize) -> Self {
        if let AttrKind::Array { ndim: n, .. } = &mut self.kind {
            *n = Some(ndim);
        }
        self
    }

    /// Required target type name for reference fields
    pub fn target(mut self, type_name: &'static str) -> Self {
        if let AttrKind::Reference { target } = &mut self.kind {
            *target = Some(type_name);
        }
        self
    }

    /// Attach a description
    pub fn doc(mut self, doc: &'static str) -> Self {
        self.doc = doc;
        self
    }

    /// Value used when storage has none: the default, or `None`
    pub fn absent_value(&self) -> FieldValue<'static> {
        match &self.default {
            Some(v) => FieldValue::Scalar(v.clone()),
            None => FieldValue::None,
        }
    }

    /// Validate a value for this field, coercing where allowed
    ///
    /// `None` is returned unchanged for optional fields.
    ///
    /// # Errors
    /// `TypeMismatch` if the value is `None` for a required field, has the
    /// wrong kind, the wrong element type or rank, or is not among `choices`.
    pub fn validate_and_coerce<'a>(&self, value: FieldValue<'a>) -> Result<FieldValue<'a>> {
        if value.is_none() || matches!(value, FieldValue::Scalar(Value::Null)) {
            if self.required {
                return Err(self.mismatch("required field has no value"));
            }
            return Ok(FieldValue::None);
        }

        match &self.kind {
            AttrKind::Scalar(kind) => {
                let v = match value {
                    FieldValue::Scalar(v) => v,
                    other => return Err(self.mismatch(format!("expected a scalar, got {}", other.kind_name()))),
                };
                let v = self.coerce_scalar(*kind, v)?;
                if let Some(choices) = &self.choices {
                    if !choices.contains(&v) {
                        return Err(self.mismatch(format!("{} is not one of the allowed values", v)));
                    }
                }
                Ok(FieldValue::Scalar(v))
            }
            AttrKind::Array { dtype, ndim } => {
                let array = match value {
                    FieldValue::Array(a) => a,
                    other => return Err(self.mismatch(format!("expected an array, got {}", other.kind_name()))),
                };
                if let Some(ndim) = ndim {
                    if array.ndim() != *ndim {
                        return Err(self.mismatch(format!(
                            "expected {} dimensions, got {}",
                            ndim,
                            array.ndim()
                        )));
                    }
                }
                match dtype {
                    Some(dtype) if !array.dtype().same_kind(dtype) => {
                        let cast = self.cast_array(&array, *dtype)?;
                        Ok(FieldValue::Array(Cow::Owned(cast)))
                    }
                    _ => Ok(FieldValue::Array(array)),
                }
            }
            AttrKind::Json => match value {
                FieldValue::Json(v) => Ok(FieldValue::Json(v)),
                FieldValue::Scalar(v) => Ok(FieldValue::Json(v.to_json())),
                other => Err(self.mismatch(format!("expected Json, got {}", other.kind_name()))),
            },
            AttrKind::Reference { target } => match value {
                FieldValue::Id(gid) => Ok(FieldValue::Id(gid)),
                FieldValue::Entity(handle) => {
                    if let Some(target) = target {
                        let actual = handle.get().type_name();
                        if !handle.get().is_a(target) {
                            return Err(self.mismatch(format!(
                                "expected a reference to {}, got {}",
                                target, actual
                            )));
                        }
                    }
                    Ok(FieldValue::Entity(handle))
                }
                other => Err(self.mismatch(format!(
                    "expected an entity or a gid, got {}",
                    other.kind_name()
                ))),
            },
            AttrKind::Gid => match value {
                FieldValue::Id(gid) => Ok(FieldValue::Id(gid)),
                other => Err(self.mismatch(format!("expected a gid, got {}", other.kind_name()))),
            },
        }
    }

    fn coerce_scalar(&self, kind: ScalarKind, v: Value) -> Result<Value> {
        match (kind, v) {
            (ScalarKind::Bool, Value::Bool(b)) => Ok(Value::Bool(b)),
            (ScalarKind::Int, Value::Int(i)) => Ok(Value::Int(i)),
            (ScalarKind::Float, Value::Float(f)) => Ok(Value::Float(f)),
            (ScalarKind::Float, Value::Int(i)) => Ok(Value::Float(i as f64)),
            (ScalarKind::Str, Value::String(s)) => Ok(Value::String(s)),
            (kind, v) => Err(self.mismatch(format!("expected {:?}, got {}", kind, v.type_name()))),
        }
    }

    fn cast_array(&self, array: &NdArray, dtype: DType) -> Result<NdArray> {
        array.cast(dtype).map_err(|_| {
            self.mismatch(format!("cannot store {} data as {}", array.dtype(), dtype))
        })
    }

    fn mismatch(&self, reason: impl Into<String>) -> Error {
        Error::type_mismatch(self.field_name, reason)
    }
}
