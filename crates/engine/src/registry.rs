//! Lookup table between datatypes, container formats and catalog index types
//!
//! Loaders never guess a format from a type: every `(datatype, format,
//! index type)` triple is registered explicitly, and a registry is built once
//! and shared behind an `Arc`.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use neostore_core::{Error, HasTraits, Result};
use once_cell::sync::Lazy;

use crate::h5file::{open_format, H5File, H5Format, Mode};

/// Constructor of an empty datatype instance
pub type NewEntityFn = fn() -> Box<dyn HasTraits>;
/// Constructor of a declared container for a path
pub type OpenFn = fn(&Path, Mode) -> Result<H5File>;

/// One registered datatype
#[derive(Clone)]
pub struct RegistryEntry {
    /// Datatype name, as returned by `HasTraits::type_name`
    pub type_name: &'static str,
    /// Container format name recorded in provenance
    pub written_by: &'static str,
    /// Prefix of container file names
    pub file_name_base: &'static str,
    /// Catalog index type
    pub index_type: &'static str,
    /// Fresh instance for `load_into`
    pub new_entity: NewEntityFn,
    /// Container constructor
    pub open: OpenFn,
}

impl RegistryEntry {
    /// Entry for datatype `D` stored with format `F`
    ///
    /// The file name base is the datatype name.
    pub fn of<D, F>(index_type: &'static str) -> Self
    where
        D: HasTraits + Default,
        F: H5Format,
    {
        let type_name = D::default().type_name();
        RegistryEntry {
            type_name,
            written_by: F::WRITTEN_BY,
            file_name_base: type_name,
            index_type,
            new_entity: new_boxed::<D>,
            open: open_format::<F>,
        }
    }

    /// Override the file name base
    pub fn with_file_name_base(mut self, base: &'static str) -> Self {
        self.file_name_base = base;
        self
    }
}

impl fmt::Debug for RegistryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryEntry")
            .field("type_name", &self.type_name)
            .field("written_by", &self.written_by)
            .field("file_name_base", &self.file_name_base)
            .field("index_type", &self.index_type)
            .finish()
    }
}

fn new_boxed<D: HasTraits + Default>() -> Box<dyn HasTraits> {
    Box::new(D::default())
}

/// Process-wide registry of the bundled formats, built on first use
static BUILTIN_REGISTRY: Lazy<Arc<Registry>> =
    Lazy::new(|| Arc::new(Registry::with_builtin_formats()));

/// Shared registry of the bundled formats
pub fn builtin() -> Arc<Registry> {
    Arc::clone(&BUILTIN_REGISTRY)
}

/// Registered datatypes with lookups by each key
#[derive(Debug, Clone, Default)]
pub struct Registry {
    entries: Vec<RegistryEntry>,
    by_type: HashMap<&'static str, usize>,
    by_written_by: HashMap<&'static str, usize>,
    by_index: HashMap<&'static str, usize>,
}

impl Registry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the bundled datatypes
    pub fn with_builtin_formats() -> Self {
        let mut registry = Registry::new();
        for entry in crate::datatypes::builtin_entries() {
            // builtin keys are distinct
            if let Err(e) = registry.register(entry) {
                tracing::error!(error = %e, "Builtin format registration failed");
            }
        }
        registry
    }

    /// Add an entry
    ///
    /// # Errors
    /// `SchemaMismatch` if its datatype, format or index type is taken.
    pub fn register(&mut self, entry: RegistryEntry) -> Result<()> {
        for (key, map) in [
            (entry.type_name, &self.by_type),
            (entry.written_by, &self.by_written_by),
            (entry.index_type, &self.by_index),
        ] {
            if map.contains_key(key) {
                return Err(Error::schema_mismatch(
                    entry.written_by,
                    format!("{} (already registered)", key),
                ));
            }
        }
        let idx = self.entries.len();
        self.by_type.insert(entry.type_name, idx);
        self.by_written_by.insert(entry.written_by, idx);
        self.by_index.insert(entry.index_type, idx);
        self.entries.push(entry);
        Ok(())
    }

    /// Entry for a datatype name
    pub fn by_datatype(&self, type_name: &str) -> Option<&RegistryEntry> {
        self.by_type.get(type_name).map(|&i| &self.entries[i])
    }

    /// Entry for a container format name
    pub fn by_written_by(&self, written_by: &str) -> Option<&RegistryEntry> {
        self.by_written_by.get(written_by).map(|&i| &self.entries[i])
    }

    /// Entry for a catalog index type
    pub fn by_index_type(&self, index_type: &str) -> Option<&RegistryEntry> {
        self.by_index.get(index_type).map(|&i| &self.entries[i])
    }

    /// Entry for a datatype, or `NotFound`
    pub fn require_datatype(&self, type_name: &str) -> Result<&RegistryEntry> {
        self.by_datatype(type_name)
            .ok_or_else(|| Error::NotFound(format!("no format registered for datatype '{}'", type_name)))
    }

    /// Entry for an index type, or `NotFound`
    pub fn require_index_type(&self, index_type: &str) -> Result<&RegistryEntry> {
        self.by_index_type(index_type)
            .ok_or_else(|| Error::NotFound(format!("no datatype registered for index '{}'", index_type)))
    }

    /// All entries in registration order
    pub fn entries(&self) -> &[RegistryEntry] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatypes::{Connectivity, ConnectivityH5, TimeSeries, TimeSeriesH5};

    #[test]
    fn test_builtin_lookups() {
        let registry = Registry::with_builtin_formats();
        assert_eq!(registry.entries().len(), 10);

        let entry = registry.by_datatype("TimeSeries").unwrap();
        assert_eq!(entry.written_by, TimeSeriesH5::WRITTEN_BY);
        assert_eq!(entry.file_name_base, "TimeSeries");
        assert_eq!(
            registry.by_written_by(TimeSeriesH5::WRITTEN_BY).unwrap().type_name,
            "TimeSeries"
        );
        assert_eq!(
            registry.by_index_type("ConnectivityIndex").unwrap().type_name,
            "Connectivity"
        );
        assert_eq!((entry.new_entity)().type_name(), "TimeSeries");
    }

    #[test]
    fn test_builtin_covers_derived_datatypes() {
        let registry = Registry::with_builtin_formats();
        for (index_type, type_name) in [
            ("TimeSeriesRegionIndex", "TimeSeriesRegion"),
            ("TimeSeriesSurfaceIndex", "TimeSeriesSurface"),
            ("TimeSeriesVolumeIndex", "TimeSeriesVolume"),
            ("WaveletCoefficientsIndex", "WaveletCoefficients"),
            ("ComplexCoherenceSpectrumIndex", "ComplexCoherenceSpectrum"),
            ("FcdIndex", "Fcd"),
        ] {
            let entry = registry.by_index_type(index_type).unwrap();
            assert_eq!(entry.type_name, type_name);
            assert_eq!((entry.new_entity)().type_name(), type_name);
        }
        assert_eq!(
            registry.by_datatype("TimeSeriesRegion").unwrap().written_by,
            "neostore.datatypes.TimeSeriesRegionH5"
        );
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut registry = Registry::new();
        registry
            .register(RegistryEntry::of::<Connectivity, ConnectivityH5>("ConnectivityIndex"))
            .unwrap();
        let err = registry
            .register(RegistryEntry::of::<Connectivity, ConnectivityH5>("OtherIndex"))
            .unwrap_err();
        assert!(matches!(err, Error::SchemaMismatch { .. }));

        // a distinct datatype on a taken index type fails as well
        let err = registry
            .register(RegistryEntry::of::<TimeSeries, TimeSeriesH5>("ConnectivityIndex"))
            .unwrap_err();
        assert!(matches!(err, Error::SchemaMismatch { .. }));
        assert!(registry.by_datatype("TimeSeries").is_none());
    }

    #[test]
    fn test_builtin_is_shared() {
        let a = builtin();
        let b = builtin();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(a.by_datatype("FourierSpectrum").is_some());
    }

    #[test]
    fn test_require_unknown_is_not_found() {
        let registry = Registry::new();
        assert!(registry.require_datatype("Nope").unwrap_err().is_not_found());
        assert!(registry.require_index_type("NopeIndex").unwrap_err().is_not_found());
    }
}
