//! Containers: the on-disk counterpart of one entity
//!
//! An [`H5File`] owns a [`StorageManager`] and an ordered list of
//! [`Accessor`]s, one per persisted field. A concrete container format
//! ([`H5Format`]) is nothing more than the accessors it registers and a
//! `written_by` name recorded in the provenance block.
//!
//! # Lifecycle
//!
//! ```text
//! open ──> store ──> append* ──> close (provenance + seal)
//!                                  │
//!                 open_read ──> load_into / gather_references
//! ```
//!
//! Dropping a writable container without `close` syncs what was written but
//! leaves it unsealed, so loaders can tell an aborted write from a finished
//! one.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use neostore_core::{
    DataSlice, Error, FieldValue, Gid, HasTraits, NdArray, Result, Value, GID_FIELD,
};
use neostore_storage::{now_micros, StorageManager, CONTAINER_FORMAT_VERSION};
use tracing::{debug, warn};

use crate::accessor::{Accessor, AccessorKind, DataSet, Uuid, ROOT_GROUP};
use crate::generic_attributes::GenericAttributes;
use crate::metadata::DataSetMetaData;
use crate::registry::Registry;

/// Provenance key naming the container format
pub const WRITTEN_BY_KEY: &str = "written_by";
/// Provenance key holding the on-disk format version
pub const FORMAT_VERSION_KEY: &str = "format_version";
/// Provenance key holding the close time in microseconds
pub const WRITTEN_AT_KEY: &str = "written_at";

/// How a container file is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Create if missing, allow writes
    ReadWrite,
    /// Start an empty container, discarding an existing file
    Create,
    /// Existing file, reads only
    ReadOnly,
}

/// Provenance block of a container
///
/// `written_by` is recorded at creation; the rest is written by
/// [`H5File::close`] and stays `None` in an unsealed file.
#[derive(Debug, Clone, PartialEq)]
pub struct Provenance {
    /// Container format name
    pub written_by: String,
    /// On-disk format version
    pub format_version: Option<i64>,
    /// Close time in microseconds since the epoch
    pub written_at: Option<i64>,
}

/// A container bound to one file
pub struct H5File {
    path: PathBuf,
    storage: StorageManager,
    accessors: Vec<Box<dyn Accessor>>,
    written_by: &'static str,
    sync_on_close: bool,
    closed: bool,
}

impl H5File {
    /// Open a container for `written_by` in the given mode
    ///
    /// Every container starts with a [`Uuid`] accessor for the `gid` field.
    /// A writable container records `written_by` immediately, so even an
    /// unsealed file can be dispatched to its format.
    pub fn open(path: impl AsRef<Path>, written_by: &'static str, mode: Mode) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let storage = match mode {
            Mode::ReadWrite => {
                let mut storage = StorageManager::open(&path)?;
                if storage.meta_value(ROOT_GROUP, WRITTEN_BY_KEY).is_none() {
                    storage.set_meta_value(ROOT_GROUP, WRITTEN_BY_KEY, Value::from(written_by))?;
                }
                storage
            }
            Mode::Create => {
                let mut storage = StorageManager::create(&path)?;
                storage.set_meta_value(ROOT_GROUP, WRITTEN_BY_KEY, Value::from(written_by))?;
                storage
            }
            Mode::ReadOnly => StorageManager::open_read(&path)?,
        };
        debug!(path = %path.display(), written_by, ?mode, "Opened container");
        let mut file = H5File {
            path,
            storage,
            accessors: Vec::new(),
            written_by,
            sync_on_close: true,
            closed: false,
        };
        file.register(Uuid::gid())?;
        Ok(file)
    }

    /// Whether `close` fsyncs the file
    pub fn set_sync_on_close(&mut self, sync: bool) {
        self.sync_on_close = sync;
    }

    /// Add an accessor
    ///
    /// # Errors
    /// `SchemaMismatch` if another accessor already uses the field name.
    pub fn register(&mut self, accessor: impl Accessor + 'static) -> Result<()> {
        let name = accessor.field_name();
        if self.accessors.iter().any(|a| a.field_name() == name) {
            return Err(Error::schema_mismatch(
                self.written_by,
                format!("{} (declared twice)", name),
            ));
        }
        self.accessors.push(Box::new(accessor));
        Ok(())
    }

    /// File path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Container format name
    pub fn written_by(&self) -> &'static str {
        self.written_by
    }

    /// Accessors in declaration order
    pub fn accessors(&self) -> impl Iterator<Item = &dyn Accessor> {
        self.accessors.iter().map(|a| a.as_ref())
    }

    /// Accessor for a field
    pub fn accessor(&self, field: &str) -> Option<&dyn Accessor> {
        self.accessors
            .iter()
            .find(|a| a.field_name() == field)
            .map(|a| a.as_ref())
    }

    /// Underlying storage manager
    pub fn storage(&self) -> &StorageManager {
        &self.storage
    }

    /// Mutable storage manager, for maintenance tools
    pub fn storage_mut(&mut self) -> &mut StorageManager {
        &mut self.storage
    }

    // ------------------------------------------------------------------
    // Whole-entity operations
    // ------------------------------------------------------------------

    /// Write every declared field of `entity`
    ///
    /// With `scalars_only` the datasets are skipped; everything kept in the
    /// side table is still written.
    ///
    /// # Errors
    /// `SchemaMismatch` if the entity lacks a declared field, or whatever
    /// the failing accessor reports. Accessors before the failing one have
    /// already been written.
    pub fn store(&mut self, entity: &dyn HasTraits, scalars_only: bool) -> Result<()> {
        self.ensure_open()?;
        for accessor in &self.accessors {
            if scalars_only && accessor.kind() == AccessorKind::DataSet {
                continue;
            }
            let value = entity
                .field(accessor.field_name())
                .ok_or_else(|| Error::schema_mismatch(self.written_by, accessor.field_name()))?;
            accessor.store(&mut self.storage, value)?;
        }
        debug!(
            path = %self.path.display(),
            type_name = entity.type_name(),
            gid = %entity.gid(),
            scalars_only,
            "Stored entity"
        );
        Ok(())
    }

    /// Read every declared field except references into `entity`
    ///
    /// References come back only through [`gather_references`](Self::gather_references).
    pub fn load_into(&self, entity: &mut dyn HasTraits) -> Result<()> {
        for accessor in &self.accessors {
            if accessor.kind() == AccessorKind::Reference {
                continue;
            }
            let value = accessor.load(&self.storage)?;
            entity.set_field(accessor.field_name(), value)?;
        }
        Ok(())
    }

    /// `(field, gid)` for every reference whose id is stored
    pub fn gather_references(&self) -> Result<Vec<(&'static str, Gid)>> {
        let mut refs = Vec::new();
        for accessor in &self.accessors {
            if accessor.kind() != AccessorKind::Reference {
                continue;
            }
            if let Some(gid) = accessor.load(&self.storage)?.gid() {
                refs.push((accessor.field_name(), gid));
            }
        }
        Ok(refs)
    }

    /// Load a single declared field
    ///
    /// # Errors
    /// `MissingData` if no accessor is declared for `field`, or if it is
    /// required and absent.
    pub fn load_field(&self, field: &str) -> Result<FieldValue<'static>> {
        self.accessor(field)
            .ok_or_else(|| Error::missing(ROOT_GROUP, field))?
            .load(&self.storage)
    }

    /// The stored gid of the entity
    pub fn stored_gid(&self) -> Result<Gid> {
        let accessor = self
            .accessor(GID_FIELD)
            .ok_or_else(|| Error::schema_mismatch(self.written_by, GID_FIELD))?;
        accessor.load(&self.storage)?.into_gid(GID_FIELD)
    }

    // ------------------------------------------------------------------
    // Datasets
    // ------------------------------------------------------------------

    fn find_dataset<'a>(accessors: &'a [Box<dyn Accessor>], field: &str) -> Result<&'a DataSet> {
        accessors
            .iter()
            .find(|a| a.field_name() == field)
            .and_then(|a| a.as_dataset())
            .ok_or_else(|| Error::missing(ROOT_GROUP, field))
    }

    /// Dataset accessor for a field
    pub fn dataset(&self, field: &str) -> Result<&DataSet> {
        Self::find_dataset(&self.accessors, field)
    }

    /// Append a chunk to an expandable dataset field, returning its new shape
    ///
    /// # Errors
    /// `InvalidAppend` on a closed or read-only container.
    pub fn append(&mut self, field: &str, chunk: &NdArray) -> Result<Vec<usize>> {
        if self.closed {
            return Err(Error::InvalidAppend(format!(
                "container {} is closed",
                self.path.display()
            )));
        }
        let dataset = Self::find_dataset(&self.accessors, field)?;
        dataset.append(&mut self.storage, chunk)
    }

    /// Read part of a dataset field
    pub fn read_slice(&self, field: &str, slice: &DataSlice) -> Result<NdArray> {
        self.dataset(field)?.read_slice(&self.storage, slice)
    }

    /// Extent of a dataset field without loading it
    pub fn shape(&self, field: &str) -> Result<Vec<usize>> {
        self.dataset(field)?.shape(&self.storage)
    }

    /// Cached statistics of a dataset field
    pub fn cached_stats(&self, field: &str) -> Result<DataSetMetaData> {
        Ok(self.dataset(field)?.get_cached_stats(&self.storage))
    }

    /// Id stored by a reference field, without reading the target
    pub fn reference(&self, field: &str) -> Result<Option<Gid>> {
        match self.accessor(field) {
            Some(accessor) if accessor.kind() == AccessorKind::Reference => {
                Ok(accessor.load(&self.storage)?.gid())
            }
            _ => Err(Error::missing(ROOT_GROUP, field)),
        }
    }

    // ------------------------------------------------------------------
    // Side tables
    // ------------------------------------------------------------------

    /// Write entries into a metadata group (`""` is the root table)
    ///
    /// A `Null` value removes the key.
    pub fn set_metadata(&mut self, entries: BTreeMap<String, Value>, group: &str) -> Result<()> {
        self.ensure_open()?;
        self.storage.set_metadata(group, entries)
    }

    /// All entries of a metadata group
    pub fn get_metadata(&self, group: &str) -> BTreeMap<String, Value> {
        self.storage.get_metadata(group)
    }

    /// Persist the generic attributes into the root table
    pub fn store_generic_attributes(&mut self, attributes: &GenericAttributes) -> Result<()> {
        self.set_metadata(attributes.to_entries(), ROOT_GROUP)
    }

    /// Generic attributes from the root table, defaults for absent keys
    pub fn load_generic_attributes(&self) -> Result<GenericAttributes> {
        GenericAttributes::from_entries(&self.storage.get_metadata(ROOT_GROUP))
    }

    // ------------------------------------------------------------------
    // Completion
    // ------------------------------------------------------------------

    /// Write the provenance block and seal the container
    ///
    /// Closing twice is a no-op. A read-only container is only marked closed.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        if !self.storage.is_writable() {
            return Ok(());
        }

        let mut provenance = BTreeMap::new();
        provenance.insert(
            WRITTEN_BY_KEY.to_string(),
            Value::from(self.written_by),
        );
        provenance.insert(
            FORMAT_VERSION_KEY.to_string(),
            Value::Int(i64::from(CONTAINER_FORMAT_VERSION)),
        );
        provenance.insert(
            WRITTEN_AT_KEY.to_string(),
            Value::Int(now_micros() as i64),
        );
        self.storage.set_metadata(ROOT_GROUP, provenance)?;
        self.storage.seal(self.written_by)?;
        if self.sync_on_close {
            self.storage.sync()?;
        }
        Ok(())
    }

    /// Whether `close` has run on this instance
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Whether the file ends with a seal, i.e. a writer closed it cleanly
    pub fn is_complete(&self) -> bool {
        self.storage.is_sealed()
    }

    /// Provenance block of this container, if one was written
    pub fn provenance(&self) -> Option<Provenance> {
        Self::provenance_of(&self.storage)
    }

    fn provenance_of(storage: &StorageManager) -> Option<Provenance> {
        let written_by = storage.meta_value(ROOT_GROUP, WRITTEN_BY_KEY)?.as_str()?;
        Some(Provenance {
            written_by: written_by.to_string(),
            format_version: storage
                .meta_value(ROOT_GROUP, FORMAT_VERSION_KEY)
                .and_then(Value::as_int),
            written_at: storage
                .meta_value(ROOT_GROUP, WRITTEN_AT_KEY)
                .and_then(Value::as_int),
        })
    }

    /// Read the provenance of a file without binding a format
    pub fn read_provenance(path: impl AsRef<Path>) -> Result<Option<Provenance>> {
        let storage = StorageManager::open_read(path)?;
        Ok(Self::provenance_of(&storage))
    }

    /// Open an existing file with the format named in its provenance
    ///
    /// # Errors
    /// `NotFound` if the file names no format or an unregistered one.
    pub fn from_file(path: impl AsRef<Path>, registry: &Registry, mode: Mode) -> Result<H5File> {
        let path = path.as_ref();
        let provenance = Self::read_provenance(path)?.ok_or_else(|| {
            Error::NotFound(format!("{} has no provenance block", path.display()))
        })?;
        let entry = registry.by_written_by(&provenance.written_by).ok_or_else(|| {
            Error::NotFound(format!(
                "no container format registered as '{}'",
                provenance.written_by
            ))
        })?;
        (entry.open)(path, mode)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(Error::StorageError(format!(
                "container {} is closed",
                self.path.display()
            )));
        }
        Ok(())
    }
}

impl Drop for H5File {
    fn drop(&mut self) {
        if self.closed || !self.storage.is_writable() {
            return;
        }
        warn!(
            path = %self.path.display(),
            written_by = self.written_by,
            "Container dropped without close; leaving it unsealed"
        );
        if let Err(e) = self.storage.sync() {
            warn!(path = %self.path.display(), error = %e, "Sync on drop failed");
        }
    }
}

impl fmt::Debug for H5File {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<&str> = self.accessors.iter().map(|a| a.field_name()).collect();
        f.debug_struct("H5File")
            .field("path", &self.path)
            .field("written_by", &self.written_by)
            .field("fields", &fields)
            .field("closed", &self.closed)
            .finish()
    }
}

/// A concrete container format
///
/// Implementations wrap an [`H5File`] and register their accessors in
/// [`declare`](H5Format::declare).
pub trait H5Format: Sized {
    /// Name recorded in the provenance block
    const WRITTEN_BY: &'static str;

    /// Register the format's accessors
    fn declare(file: &mut H5File) -> Result<()>;

    /// Wrap a declared container
    fn from_h5file(file: H5File) -> Self;

    /// The wrapped container
    fn h5file(&self) -> &H5File;

    /// The wrapped container, mutably
    fn h5file_mut(&mut self) -> &mut H5File;

    /// Unwrap
    fn into_h5file(self) -> H5File;

    /// Open or create a file for writing
    fn create(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::from_h5file(open_format::<Self>(path.as_ref(), Mode::ReadWrite)?))
    }

    /// Open an existing file for reading
    fn open_read(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::from_h5file(open_format::<Self>(path.as_ref(), Mode::ReadOnly)?))
    }
}

/// Open `path` with the accessors of format `F`
pub fn open_format<F: H5Format>(path: &Path, mode: Mode) -> Result<H5File> {
    let mut file = H5File::open(path, F::WRITTEN_BY, mode)?;
    F::declare(&mut file)?;
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accessor::{Reference, Scalar};
    use neostore_core::Attr;
    use std::any::Any;
    use tempfile::tempdir;

    #[derive(Debug, Default)]
    struct Sample {
        gid: Gid,
        title: String,
        level: Option<f64>,
        values: Option<NdArray>,
        source: Option<Gid>,
    }

    impl HasTraits for Sample {
        fn type_name(&self) -> &'static str {
            "Sample"
        }
        fn gid(&self) -> Gid {
            self.gid
        }
        fn field(&self, name: &str) -> Option<FieldValue<'_>> {
            Some(match name {
                "gid" => FieldValue::Id(self.gid),
                "title" => FieldValue::Scalar(Value::from(self.title.as_str())),
                "level" => FieldValue::optional_scalar(self.level),
                "values" => FieldValue::optional_array(self.values.as_ref()),
                "source" => self.source.map(FieldValue::Id).unwrap_or(FieldValue::None),
                _ => return None,
            })
        }
        fn set_field(&mut self, name: &str, value: FieldValue<'static>) -> Result<()> {
            match name {
                "gid" => self.gid = value.into_gid(name)?,
                "title" => self.title = value.into_string(name)?,
                "level" => self.level = value.into_optional_f64(name)?,
                "values" => self.values = value.into_optional_array(name)?,
                "source" => self.source = value.gid(),
                _ => return Err(Error::schema_mismatch("Sample", name)),
            }
            Ok(())
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    struct SampleH5(H5File);

    impl H5Format for SampleH5 {
        const WRITTEN_BY: &'static str = "tests.SampleH5";

        fn declare(file: &mut H5File) -> Result<()> {
            file.register(Scalar::new(Attr::string("title")))?;
            file.register(Scalar::new(Attr::float("level").optional()))?;
            file.register(DataSet::expandable(Attr::array("values").optional().ndim(1), 0))?;
            file.register(Reference::new(Attr::reference("source").optional()))
        }
        fn from_h5file(file: H5File) -> Self {
            SampleH5(file)
        }
        fn h5file(&self) -> &H5File {
            &self.0
        }
        fn h5file_mut(&mut self) -> &mut H5File {
            &mut self.0
        }
        fn into_h5file(self) -> H5File {
            self.0
        }
    }

    fn sample() -> Sample {
        Sample {
            gid: Gid::new(),
            title: "sample".to_string(),
            level: Some(0.5),
            values: Some(NdArray::from_vec(vec![1.0, 2.0])),
            source: Some(Gid::new()),
        }
    }

    #[test]
    fn test_store_load_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("Sample_1.h5");
        let original = sample();
        {
            let mut f = SampleH5::create(&path).unwrap();
            f.h5file_mut().store(&original, false).unwrap();
            f.h5file_mut().close().unwrap();
        }

        let f = SampleH5::open_read(&path).unwrap();
        assert!(f.h5file().is_complete());
        let mut loaded = Sample::default();
        f.h5file().load_into(&mut loaded).unwrap();
        assert_eq!(loaded.gid, original.gid);
        assert_eq!(loaded.title, "sample");
        assert_eq!(loaded.level, Some(0.5));
        assert_eq!(loaded.values, original.values);
        // references are not loaded
        assert_eq!(loaded.source, None);
        assert_eq!(
            f.h5file().gather_references().unwrap(),
            vec![("source", original.source.unwrap())]
        );
    }

    #[test]
    fn test_scalars_only_skips_datasets() {
        let dir = tempdir().unwrap();
        let mut f = SampleH5::create(dir.path().join("p.h5")).unwrap();
        f.h5file_mut().store(&sample(), true).unwrap();
        assert!(!f.h5file().storage().has_dataset("values"));
        assert!(f.h5file().reference("source").unwrap().is_some());
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let dir = tempdir().unwrap();
        let mut f = SampleH5::create(dir.path().join("p.h5")).unwrap();
        let err = f
            .h5file_mut()
            .register(Scalar::new(Attr::string("title")))
            .unwrap_err();
        assert!(matches!(err, Error::SchemaMismatch { .. }));
    }

    #[test]
    fn test_drop_without_close_leaves_unsealed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("p.h5");
        {
            let mut f = SampleH5::create(&path).unwrap();
            f.h5file_mut().store(&sample(), false).unwrap();
        }
        let f = SampleH5::open_read(&path).unwrap();
        assert!(!f.h5file().is_complete());
        let provenance = f.h5file().provenance().unwrap();
        assert_eq!(provenance.written_by, "tests.SampleH5");
        assert_eq!(provenance.written_at, None);
        // the data written before the drop is intact
        assert_eq!(f.h5file().shape("values").unwrap(), vec![2]);
    }

    #[test]
    fn test_append_after_close_rejected() {
        let dir = tempdir().unwrap();
        let mut f = SampleH5::create(dir.path().join("p.h5")).unwrap();
        f.h5file_mut()
            .append("values", &NdArray::from_vec(vec![1.0]))
            .unwrap();
        f.h5file_mut().close().unwrap();
        let err = f
            .h5file_mut()
            .append("values", &NdArray::from_vec(vec![2.0]))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidAppend(_)));
    }

    #[test]
    fn test_provenance_written_on_close() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("p.h5");
        {
            let mut f = SampleH5::create(&path).unwrap();
            f.h5file_mut().store(&sample(), false).unwrap();
            f.h5file_mut().close().unwrap();
        }
        let provenance = H5File::read_provenance(&path).unwrap().unwrap();
        assert_eq!(provenance.written_by, "tests.SampleH5");
        assert_eq!(provenance.format_version, Some(1));
        assert!(provenance.written_at.unwrap() > 0);
    }

    #[test]
    fn test_generic_attributes_roundtrip() {
        let dir = tempdir().unwrap();
        let mut f = SampleH5::create(dir.path().join("p.h5")).unwrap();
        let ga = GenericAttributes {
            subject: "John Doe".to_string(),
            ..Default::default()
        };
        f.h5file_mut().store_generic_attributes(&ga).unwrap();
        assert_eq!(f.h5file().load_generic_attributes().unwrap(), ga);
    }

    #[test]
    fn test_required_field_missing_on_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("p.h5");
        {
            let mut f = SampleH5::create(&path).unwrap();
            f.h5file_mut().close().unwrap();
        }
        let f = SampleH5::open_read(&path).unwrap();
        let err = f.h5file().load_into(&mut Sample::default()).unwrap_err();
        assert!(err.is_missing_data());
    }
}
