use std::path::{Path, PathBuf};
use std::sync::Arc;

use neostore_core::{EntityHandle, Error, FieldValue, Gid, HasTraits, Result};
use tracing::debug;

use super::{container_file_name, ensure_complete, load_entity, open_for_read};
use crate::catalog::{Catalog, IndexRecord};
use crate::config::NeostoreConfig;
use crate::generic_attributes::GenericAttributes;
use crate::h5file::Mode;
use crate::registry::Registry;

/// Loader for containers kept in the operation folders of projects
///
/// The catalog says which operation owns an entity; the operation folder is
/// `project_folder/<operation_id>`.
#[derive(Clone)]
pub struct TvbLoader {
    catalog: Arc<dyn Catalog>,
    registry: Arc<Registry>,
    extension: String,
    allow_incomplete: bool,
    sync_on_close: bool,
}

impl std::fmt::Debug for TvbLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TvbLoader")
            .field("extension", &self.extension)
            .field("allow_incomplete", &self.allow_incomplete)
            .finish_non_exhaustive()
    }
}

impl TvbLoader {
    /// Loader with default storage settings
    pub fn new(catalog: Arc<dyn Catalog>, registry: Arc<Registry>) -> Self {
        Self::with_config(catalog, registry, &NeostoreConfig::default())
    }

    /// Loader with the `[storage]` settings of `config`
    pub fn with_config(
        catalog: Arc<dyn Catalog>,
        registry: Arc<Registry>,
        config: &NeostoreConfig,
    ) -> Self {
        TvbLoader {
            catalog,
            registry,
            extension: config.storage.file_extension.clone(),
            allow_incomplete: config.storage.allow_incomplete,
            sync_on_close: config.storage.sync_on_close,
        }
    }

    /// Path of the container for an entity of `type_name` in `operation_dir`
    ///
    /// # Errors
    /// `NotFound` if the datatype is not registered.
    pub fn path_for(&self, operation_dir: &Path, type_name: &str, gid: Gid) -> Result<PathBuf> {
        let entry = self.registry.require_datatype(type_name)?;
        Ok(operation_dir.join(container_file_name(entry.file_name_base, gid, &self.extension)))
    }

    /// Path of the container behind a catalog record
    ///
    /// # Errors
    /// `NotFound` if the catalog has no owning operation or the index type is
    /// not registered.
    pub fn path_for_stored_index(&self, record: &IndexRecord) -> Result<PathBuf> {
        let entry = self.registry.require_index_type(&record.index_type)?;
        let operation = self.catalog.get_owning_operation(record.gid)?;
        Ok(operation
            .folder()
            .join(container_file_name(entry.file_name_base, record.gid, &self.extension)))
    }

    /// Load the entity behind `record`
    ///
    /// The container is read with the format of the record's index type, into
    /// a fresh `as_type` entity when given or the indexed datatype otherwise.
    /// References come back as ids.
    pub fn load_from_index(
        &self,
        record: &IndexRecord,
        as_type: Option<&str>,
    ) -> Result<Box<dyn HasTraits>> {
        let index_entry = self.registry.require_index_type(&record.index_type)?;
        let target = match as_type {
            Some(type_name) => self.registry.require_datatype(type_name)?,
            None => index_entry,
        };
        let path = self.path_for_stored_index(record)?;
        debug!(gid = %record.gid, index_type = %record.index_type, path = %path.display(), "Loading from index");
        if !path.is_file() {
            return Err(Error::NotFound(format!(
                "no container at {}",
                path.display()
            )));
        }
        let file = (index_entry.open)(&path, Mode::ReadOnly)?;
        ensure_complete(&file, self.allow_incomplete)?;
        load_entity(&file, target)
    }

    /// Load the entity at `path` with its generic attributes, resolving every
    /// reference through the catalog
    ///
    /// Referenced entities may live in other operation folders.
    pub fn load_with_references(
        &self,
        path: impl AsRef<Path>,
    ) -> Result<(Box<dyn HasTraits>, GenericAttributes)> {
        let (file, entry) = open_for_read(&self.registry, path.as_ref(), self.allow_incomplete)?;
        let mut entity = load_entity(&file, entry)?;
        let attributes = file.load_generic_attributes()?;
        let references = file.gather_references()?;
        drop(file);

        for (field, gid) in references {
            let record = self.catalog.get_record(gid)?;
            let target = self.load_from_index(&record, None)?;
            entity.set_field(field, FieldValue::Entity(EntityHandle::Owned(target)))?;
        }
        Ok((entity, attributes))
    }

    /// Store `entity` with its generic attributes into `operation_dir`
    pub fn store(
        &self,
        entity: &dyn HasTraits,
        operation_dir: &Path,
        attributes: &GenericAttributes,
    ) -> Result<PathBuf> {
        let entry = self.registry.require_datatype(entity.type_name())?;
        let path = operation_dir.join(container_file_name(
            entry.file_name_base,
            entity.gid(),
            &self.extension,
        ));
        let mut file = (entry.open)(&path, Mode::Create)?;
        file.set_sync_on_close(self.sync_on_close);
        file.store(entity, false)?;
        file.store_generic_attributes(attributes)?;
        file.close()?;
        debug!(gid = %entity.gid(), path = %path.display(), "Stored entity in operation folder");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::InMemoryCatalog;
    use crate::datatypes::{FourierSpectrum, TimeSeries};
    use crate::registry::builtin;
    use neostore_core::{Link, NdArray};
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_load_across_operation_folders() {
        let project = tempdir().unwrap();
        let catalog = Arc::new(InMemoryCatalog::new());
        catalog.add_operation(1, project.path());
        catalog.add_operation(2, project.path());
        let loader = TvbLoader::new(catalog.clone(), builtin());

        let ts = TimeSeries::new(NdArray::zeros(vec![2, 1, 1, 1]), 1.0);
        let op1 = project.path().join("1");
        fs::create_dir_all(&op1).unwrap();
        loader.store(&ts, &op1, &GenericAttributes::default()).unwrap();
        catalog.add_record(IndexRecord {
            index_type: "TimeSeriesIndex".to_string(),
            gid: ts.gid,
            fk_from_operation: 1,
        });

        let spectrum = FourierSpectrum::new(ts.gid, NdArray::zeros(vec![1, 1, 2, 1]));
        let op2 = project.path().join("2");
        fs::create_dir_all(&op2).unwrap();
        let attributes = GenericAttributes {
            subject: "s01".to_string(),
            ..Default::default()
        };
        let path = loader.store(&spectrum, &op2, &attributes).unwrap();

        let (loaded, loaded_attributes) = loader.load_with_references(&path).unwrap();
        assert_eq!(loaded_attributes.subject, "s01");
        let loaded = loaded.downcast_ref::<FourierSpectrum>().unwrap();
        assert!(matches!(loaded.source, Link::Loaded(_)));
        assert_eq!(loaded.source.downcast_ref::<TimeSeries>(), Some(&ts));
    }

    #[test]
    fn test_unknown_record_is_not_found() {
        let catalog = Arc::new(InMemoryCatalog::new());
        let loader = TvbLoader::new(catalog, builtin());
        let record = IndexRecord {
            index_type: "TimeSeriesIndex".to_string(),
            gid: Gid::new(),
            fk_from_operation: 7,
        };
        assert!(loader.path_for_stored_index(&record).unwrap_err().is_not_found());
        assert!(loader.load_from_index(&record, None).unwrap_err().is_not_found());
    }
}
