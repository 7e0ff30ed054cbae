//! Accessors bind one declared field to one piece of stored data
//!
//! | Accessor | Stored as | Loaded by `load_into` |
//! |----------|-----------|-----------------------|
//! | [`Scalar`] | root side-table entry | yes |
//! | [`Json`] | root side-table entry holding JSON text | yes |
//! | [`Uuid`] | root side-table entry holding the gid URN | yes |
//! | [`Reference`] | root side-table entry holding the target URN | no, id only via `gather_references` |
//! | [`DataSet`] | named dataset, stats in the dataset's group | yes |
//!
//! Accessors are descriptors: they hold the field's [`Attr`] and operate on
//! the container's [`StorageManager`] passed in by the owning `H5File`.

use std::borrow::Cow;
use std::fmt;

use neostore_core::{Attr, DataSlice, Error, FieldValue, Gid, NdArray, Result, Value};
use neostore_storage::StorageManager;

use crate::metadata::DataSetMetaData;

/// Group name of the root side table
pub const ROOT_GROUP: &str = "";

/// Accessor variant tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessorKind {
    /// Primitive side-table value
    Scalar,
    /// JSON document
    Json,
    /// The entity's own gid
    Uuid,
    /// Id of another entity
    Reference,
    /// N-dimensional array
    DataSet,
}

impl AccessorKind {
    /// Whether the accessor lives in the root side table
    pub fn is_scalar_like(&self) -> bool {
        !matches!(self, AccessorKind::DataSet)
    }
}

/// Load/store strategy for one declared field
pub trait Accessor: fmt::Debug + Send {
    /// The field's descriptor
    fn attr(&self) -> &Attr;

    /// Variant tag
    fn kind(&self) -> AccessorKind;

    /// Field name, also the storage key
    fn field_name(&self) -> &'static str {
        self.attr().field_name
    }

    /// Validate and write a value
    ///
    /// # Errors
    /// `TypeMismatch` if the descriptor rejects the value (including `None`
    /// for a required field).
    fn store(&self, storage: &mut StorageManager, value: FieldValue<'_>) -> Result<()>;

    /// Read the value back
    ///
    /// # Errors
    /// `MissingData` if the field is required and absent.
    fn load(&self, storage: &StorageManager) -> Result<FieldValue<'static>>;

    /// Downcast to a dataset accessor
    fn as_dataset(&self) -> Option<&DataSet> {
        None
    }
}

/// Absent value: `MissingData` when required, the default or `None` otherwise
fn absent(attr: &Attr, group: &str) -> Result<FieldValue<'static>> {
    if attr.required && attr.default.is_none() {
        return Err(Error::missing(group, attr.field_name));
    }
    Ok(attr.absent_value())
}

fn unexpected(attr: &Attr, value: &FieldValue<'_>) -> Error {
    Error::type_mismatch(
        attr.field_name,
        format!("unexpected {} value", value.kind_name()),
    )
}

/// A primitive value in the root side table
#[derive(Debug, Clone)]
pub struct Scalar {
    attr: Attr,
}

impl Scalar {
    /// Accessor for a scalar field
    pub fn new(attr: Attr) -> Self {
        Scalar { attr }
    }
}

impl Accessor for Scalar {
    fn attr(&self) -> &Attr {
        &self.attr
    }

    fn kind(&self) -> AccessorKind {
        AccessorKind::Scalar
    }

    fn store(&self, storage: &mut StorageManager, value: FieldValue<'_>) -> Result<()> {
        match self.attr.validate_and_coerce(value)? {
            FieldValue::None => Ok(()),
            FieldValue::Scalar(v) => storage.set_meta_value(ROOT_GROUP, self.field_name(), v),
            other => Err(unexpected(&self.attr, &other)),
        }
    }

    fn load(&self, storage: &StorageManager) -> Result<FieldValue<'static>> {
        match storage.meta_value(ROOT_GROUP, self.field_name()) {
            Some(v) => Ok(FieldValue::Scalar(v.clone())),
            None => absent(&self.attr, ROOT_GROUP),
        }
    }
}

/// A JSON document kept as text in the root side table
#[derive(Debug, Clone)]
pub struct Json {
    attr: Attr,
}

impl Json {
    /// Accessor for a JSON field
    pub fn new(attr: Attr) -> Self {
        Json { attr }
    }
}

impl Accessor for Json {
    fn attr(&self) -> &Attr {
        &self.attr
    }

    fn kind(&self) -> AccessorKind {
        AccessorKind::Json
    }

    fn store(&self, storage: &mut StorageManager, value: FieldValue<'_>) -> Result<()> {
        match self.attr.validate_and_coerce(value)? {
            FieldValue::None => Ok(()),
            FieldValue::Json(doc) => {
                let text = serde_json::to_string(&doc)?;
                storage.set_meta_value(ROOT_GROUP, self.field_name(), Value::String(text))
            }
            other => Err(unexpected(&self.attr, &other)),
        }
    }

    fn load(&self, storage: &StorageManager) -> Result<FieldValue<'static>> {
        match storage.meta_value(ROOT_GROUP, self.field_name()) {
            Some(Value::String(text)) => Ok(FieldValue::Json(serde_json::from_str(text)?)),
            Some(other) => Err(Error::type_mismatch(
                self.field_name(),
                format!("expected JSON text, found {}", other.type_name()),
            )),
            None => absent(&self.attr, ROOT_GROUP),
        }
    }
}

/// The entity's own gid, stored as a URN
#[derive(Debug, Clone)]
pub struct Uuid {
    attr: Attr,
}

impl Uuid {
    /// Accessor for the `gid` field
    pub fn gid() -> Self {
        Uuid { attr: Attr::gid() }
    }
}

impl Accessor for Uuid {
    fn attr(&self) -> &Attr {
        &self.attr
    }

    fn kind(&self) -> AccessorKind {
        AccessorKind::Uuid
    }

    fn store(&self, storage: &mut StorageManager, value: FieldValue<'_>) -> Result<()> {
        match self.attr.validate_and_coerce(value)? {
            FieldValue::Id(gid) => {
                storage.set_meta_value(ROOT_GROUP, self.field_name(), Value::String(gid.urn()))
            }
            other => Err(unexpected(&self.attr, &other)),
        }
    }

    fn load(&self, storage: &StorageManager) -> Result<FieldValue<'static>> {
        match storage.meta_value(ROOT_GROUP, self.field_name()) {
            Some(v) => parse_gid(self.field_name(), v).map(FieldValue::Id),
            None => absent(&self.attr, ROOT_GROUP),
        }
    }
}

/// Id of another entity, stored as a URN
///
/// Loading yields the id only; the target's content is never read.
#[derive(Debug, Clone)]
pub struct Reference {
    attr: Attr,
}

impl Reference {
    /// Accessor for a reference field
    pub fn new(attr: Attr) -> Self {
        Reference { attr }
    }

    /// The stored id, `None` when an optional reference is absent
    pub fn load_gid(&self, storage: &StorageManager) -> Result<Option<Gid>> {
        match self.load(storage)? {
            FieldValue::Id(gid) => Ok(Some(gid)),
            _ => Ok(None),
        }
    }
}

impl Accessor for Reference {
    fn attr(&self) -> &Attr {
        &self.attr
    }

    fn kind(&self) -> AccessorKind {
        AccessorKind::Reference
    }

    fn store(&self, storage: &mut StorageManager, value: FieldValue<'_>) -> Result<()> {
        let validated = self.attr.validate_and_coerce(value)?;
        if validated.is_none() {
            return Ok(());
        }
        match validated.gid() {
            Some(gid) => {
                storage.set_meta_value(ROOT_GROUP, self.field_name(), Value::String(gid.urn()))
            }
            None => Err(unexpected(&self.attr, &validated)),
        }
    }

    fn load(&self, storage: &StorageManager) -> Result<FieldValue<'static>> {
        match storage.meta_value(ROOT_GROUP, self.field_name()) {
            Some(v) => parse_gid(self.field_name(), v).map(FieldValue::Id),
            None => absent(&self.attr, ROOT_GROUP),
        }
    }
}

fn parse_gid(field: &str, value: &Value) -> Result<Gid> {
    value.as_str().and_then(Gid::parse).ok_or_else(|| {
        Error::type_mismatch(field, format!("stored value {} is not a URN", value))
    })
}

/// An N-dimensional array stored as a named dataset
#[derive(Debug, Clone)]
pub struct DataSet {
    attr: Attr,
    expand_dimension: Option<usize>,
}

impl DataSet {
    /// Accessor for a fixed-size array field
    pub fn new(attr: Attr) -> Self {
        DataSet {
            attr,
            expand_dimension: None,
        }
    }

    /// Accessor for an array field that grows along `dim`
    pub fn expandable(attr: Attr, dim: usize) -> Self {
        DataSet {
            attr,
            expand_dimension: Some(dim),
        }
    }

    /// Axis along which `append` grows the dataset
    pub fn expand_dimension(&self) -> Option<usize> {
        self.expand_dimension
    }

    /// Grow the dataset by one chunk and update the cached statistics.
    ///
    /// Returns the new shape.
    ///
    /// # Errors
    /// `InvalidAppend` without an expandable axis, on a read-only container,
    /// or when the chunk does not fit the dataset.
    pub fn append(&self, storage: &mut StorageManager, chunk: &NdArray) -> Result<Vec<usize>> {
        let dim = self.expand_dimension.ok_or_else(|| {
            Error::InvalidAppend(format!(
                "field '{}' has no expandable dimension",
                self.field_name()
            ))
        })?;
        if !storage.is_writable() {
            return Err(Error::InvalidAppend(format!(
                "container {} is read-only",
                storage.path().display()
            )));
        }

        let declared_ndim = match &self.attr.kind {
            neostore_core::AttrKind::Array { ndim, .. } => *ndim,
            _ => None,
        };
        let chunk = match declared_ndim {
            Some(ndim) if chunk.ndim() + 1 == ndim => chunk.clone().insert_axis(dim)?,
            _ => chunk.clone(),
        };
        let chunk = match self.attr.validate_and_coerce(FieldValue::Array(Cow::Owned(chunk))) {
            Ok(FieldValue::Array(a)) => a.into_owned(),
            Ok(other) => return Err(unexpected(&self.attr, &other)),
            Err(e) => return Err(Error::InvalidAppend(e.to_string())),
        };

        let prior_empty = storage
            .get_data_shape(self.field_name())
            .map(|shape| shape.iter().product::<usize>() == 0)
            .unwrap_or(true);

        let shape = storage.append_data(self.field_name(), &chunk, Some(dim))?;

        let chunk_stats = DataSetMetaData::from_array(&chunk);
        let stats = if prior_empty {
            chunk_stats
        } else {
            DataSetMetaData::read(storage, self.field_name()).merge(&chunk_stats)
        };
        stats.write(storage, self.field_name())?;
        Ok(shape)
    }

    /// Read a hyperslab without loading the whole array
    pub fn read_slice(&self, storage: &StorageManager, slice: &DataSlice) -> Result<NdArray> {
        storage.get_data(self.field_name(), slice)
    }

    /// Current extent without loading data
    pub fn shape(&self, storage: &StorageManager) -> Result<Vec<usize>> {
        storage.get_data_shape(self.field_name())
    }

    /// Cached `{min, max}` of the stored array
    pub fn get_cached_stats(&self, storage: &StorageManager) -> DataSetMetaData {
        DataSetMetaData::read(storage, self.field_name())
    }
}

impl Accessor for DataSet {
    fn attr(&self) -> &Attr {
        &self.attr
    }

    fn kind(&self) -> AccessorKind {
        AccessorKind::DataSet
    }

    fn store(&self, storage: &mut StorageManager, value: FieldValue<'_>) -> Result<()> {
        let array = match self.attr.validate_and_coerce(value)? {
            FieldValue::None => return Ok(()),
            FieldValue::Array(a) => a,
            other => return Err(unexpected(&self.attr, &other)),
        };
        storage.store_data(self.field_name(), &array, self.expand_dimension)?;
        DataSetMetaData::from_array(&array).write(storage, self.field_name())
    }

    fn load(&self, storage: &StorageManager) -> Result<FieldValue<'static>> {
        if !storage.has_dataset(self.field_name()) {
            return absent(&self.attr, self.field_name());
        }
        let array = storage.get_full_data(self.field_name())?;
        Ok(FieldValue::Array(Cow::Owned(array)))
    }

    fn as_dataset(&self) -> Option<&DataSet> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use neostore_core::{AxisSlice, DType};
    use tempfile::{tempdir, TempDir};

    fn storage() -> (TempDir, StorageManager) {
        let dir = tempdir().unwrap();
        let storage = StorageManager::open(dir.path().join("t.h5")).unwrap();
        (dir, storage)
    }

    #[test]
    fn test_scalar_roundtrip_and_absence() {
        let (_dir, mut s) = storage();
        let required = Scalar::new(Attr::float("sample_period"));
        let optional = Scalar::new(Attr::float("sample_rate").optional());

        assert!(required.load(&s).unwrap_err().is_missing_data());
        assert!(optional.load(&s).unwrap().is_none());

        required.store(&mut s, FieldValue::Scalar(Value::Int(2))).unwrap();
        assert!(matches!(
            required.load(&s).unwrap(),
            FieldValue::Scalar(Value::Float(f)) if f == 2.0
        ));
    }

    #[test]
    fn test_scalar_required_none_is_type_mismatch() {
        let (_dir, mut s) = storage();
        let acc = Scalar::new(Attr::string("title"));
        let err = acc.store(&mut s, FieldValue::None).unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }));
    }

    #[test]
    fn test_scalar_default_used_when_absent() {
        let (_dir, s) = storage();
        let acc = Scalar::new(Attr::string("sample_period_unit").default_value("ms"));
        assert!(matches!(
            acc.load(&s).unwrap(),
            FieldValue::Scalar(Value::String(u)) if u == "ms"
        ));
    }

    #[test]
    fn test_reference_stores_urn_and_loads_id() {
        let (_dir, mut s) = storage();
        let acc = Reference::new(Attr::reference("source"));
        let gid = Gid::new();
        acc.store(&mut s, FieldValue::Id(gid)).unwrap();

        assert_eq!(
            s.meta_value(ROOT_GROUP, "source"),
            Some(&Value::String(gid.urn()))
        );
        assert_eq!(acc.load_gid(&s).unwrap(), Some(gid));
    }

    #[test]
    fn test_reference_rejects_non_entity() {
        let (_dir, mut s) = storage();
        let acc = Reference::new(Attr::reference("source"));
        let err = acc
            .store(&mut s, FieldValue::Scalar(Value::from("not a gid")))
            .unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }));
    }

    #[test]
    fn test_optional_reference_absent() {
        let (_dir, mut s) = storage();
        let acc = Reference::new(Attr::reference("parent_connectivity").optional());
        acc.store(&mut s, FieldValue::None).unwrap();
        assert_eq!(acc.load_gid(&s).unwrap(), None);
    }

    #[test]
    fn test_json_roundtrip() {
        let (_dir, mut s) = storage();
        let acc = Json::new(Attr::json("labels_dimensions").optional());
        let doc = serde_json::json!({"space": ["a", "b"]});
        acc.store(&mut s, FieldValue::Json(doc.clone())).unwrap();
        match acc.load(&s).unwrap() {
            FieldValue::Json(back) => assert_eq!(back, doc),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_dataset_store_records_stats() {
        let (_dir, mut s) = storage();
        let acc = DataSet::new(Attr::array("weights").dtype(DType::F64));
        acc.store(&mut s, FieldValue::from(NdArray::from_vec(vec![1i32, 5, -2])))
            .unwrap();

        let stats = acc.get_cached_stats(&s);
        assert_eq!(stats.min, Some(Value::Float(-2.0)));
        assert_eq!(stats.max, Some(Value::Float(5.0)));
        assert_eq!(s.dataset_info("weights").unwrap().dtype, DType::F64);
    }

    #[test]
    fn test_dataset_string_array_has_no_stats() {
        let (_dir, mut s) = storage();
        let acc = DataSet::new(Attr::array("region_labels"));
        acc.store(&mut s, FieldValue::from(NdArray::from_vec(vec!["a", "b"])))
            .unwrap();
        assert!(!acc.get_cached_stats(&s).is_known());
    }

    #[test]
    fn test_dataset_optional_absent() {
        let (_dir, s) = storage();
        let optional = DataSet::new(Attr::array("areas").optional());
        assert!(optional.load(&s).unwrap().is_none());
        let required = DataSet::new(Attr::array("weights"));
        assert!(required.load(&s).unwrap_err().is_missing_data());
    }

    #[test]
    fn test_append_updates_stats_incrementally() {
        let (_dir, mut s) = storage();
        let acc = DataSet::expandable(Attr::array("power").ndim(1), 0);
        acc.append(&mut s, &NdArray::from_vec(vec![2.0, 3.0])).unwrap();
        acc.append(&mut s, &NdArray::from_vec(vec![-1.0])).unwrap();
        let shape = acc.append(&mut s, &NdArray::from_vec(vec![9.0, 0.0])).unwrap();

        assert_eq!(shape, vec![5]);
        let stats = acc.get_cached_stats(&s);
        assert_eq!(stats.min, Some(Value::Float(-1.0)));
        assert_eq!(stats.max, Some(Value::Float(9.0)));
    }

    #[test]
    fn test_append_slab_to_declared_rank() {
        let (_dir, mut s) = storage();
        let acc = DataSet::expandable(Attr::array("data").ndim(2), 0);
        acc.append(&mut s, &NdArray::from_vec(vec![1.0, 2.0])).unwrap();
        let shape = acc.append(&mut s, &NdArray::from_vec(vec![3.0, 4.0])).unwrap();
        assert_eq!(shape, vec![2, 2]);

        let second = acc
            .read_slice(&s, &DataSlice::new(vec![AxisSlice::Index(1)]))
            .unwrap();
        assert_eq!(second.as_f64().unwrap(), &[3.0, 4.0]);
    }

    #[test]
    fn test_append_requires_expandable_dimension() {
        let (_dir, mut s) = storage();
        let acc = DataSet::new(Attr::array("weights"));
        let err = acc.append(&mut s, &NdArray::zeros(vec![2])).unwrap_err();
        assert!(matches!(err, Error::InvalidAppend(_)));
    }

    #[test]
    fn test_uuid_roundtrip() {
        let (_dir, mut s) = storage();
        let acc = Uuid::gid();
        let gid = Gid::new();
        acc.store(&mut s, FieldValue::Id(gid)).unwrap();
        assert_eq!(acc.load(&s).unwrap().gid(), Some(gid));
    }
}
