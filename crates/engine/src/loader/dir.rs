use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use neostore_core::{EntityHandle, Error, FieldValue, Gid, HasTraits, Result};
use tracing::debug;

use super::{container_file_name, load_entity, open_for_read, write_entity};
use crate::accessor::AccessorKind;
use crate::config::NeostoreConfig;
use crate::registry::Registry;

/// Loader over a flat directory of containers named `{TypeName}_{gid}.{ext}`
///
/// With `recursive` set, loading follows stored references and storing
/// writes every loaded entity reachable through reference fields.
#[derive(Debug, Clone)]
pub struct DirLoader {
    base_dir: PathBuf,
    registry: Arc<Registry>,
    recursive: bool,
    extension: String,
    allow_incomplete: bool,
    sync_on_close: bool,
}

impl DirLoader {
    /// Loader over `base_dir` with default storage settings
    ///
    /// # Errors
    /// `NotFound` if `base_dir` is not a directory.
    pub fn new(base_dir: impl Into<PathBuf>, registry: Arc<Registry>, recursive: bool) -> Result<Self> {
        let mut config = NeostoreConfig::default();
        config.loader.recursive = recursive;
        Self::with_config(base_dir, registry, &config)
    }

    /// Loader over `base_dir` configured by `config`
    pub fn with_config(
        base_dir: impl Into<PathBuf>,
        registry: Arc<Registry>,
        config: &NeostoreConfig,
    ) -> Result<Self> {
        let base_dir = base_dir.into();
        if !base_dir.is_dir() {
            return Err(Error::NotFound(format!(
                "{} is not a directory",
                base_dir.display()
            )));
        }
        Ok(DirLoader {
            base_dir,
            registry,
            recursive: config.loader.recursive,
            extension: config.storage.file_extension.clone(),
            allow_incomplete: config.storage.allow_incomplete,
            sync_on_close: config.storage.sync_on_close,
        })
    }

    /// Directory holding the containers
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Whether references are followed
    pub fn is_recursive(&self) -> bool {
        self.recursive
    }

    /// Path of the container for an entity of `type_name`
    ///
    /// # Errors
    /// `NotFound` if the datatype is not registered.
    pub fn path_for(&self, type_name: &str, gid: Gid) -> Result<PathBuf> {
        let entry = self.registry.require_datatype(type_name)?;
        Ok(self
            .base_dir
            .join(container_file_name(entry.file_name_base, gid, &self.extension)))
    }

    /// Find the container of `gid` without knowing its type
    ///
    /// # Errors
    /// `NotFound` if no file name in the directory ends with the gid.
    pub fn find_file_name(&self, gid: Gid) -> Result<PathBuf> {
        let suffix = format!("{}.{}", gid.hex(), self.extension);
        let mut matches = Vec::new();
        for entry in fs::read_dir(&self.base_dir)? {
            let entry = entry?;
            if entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.ends_with(&suffix))
            {
                matches.push(entry.path());
            }
        }
        matches.sort();
        matches.into_iter().next().ok_or_else(|| {
            Error::NotFound(format!(
                "no container for {} in {}",
                gid,
                self.base_dir.display()
            ))
        })
    }

    /// Load the entity `gid`
    ///
    /// When recursive, every stored reference is loaded and attached, except
    /// one pointing back to an entity already on the path from the root,
    /// which stays a bare id.
    pub fn load(&self, gid: Gid) -> Result<Box<dyn HasTraits>> {
        let mut path = HashSet::new();
        self.load_guarded(gid, &mut path)
    }

    fn load_guarded(&self, gid: Gid, path: &mut HashSet<Gid>) -> Result<Box<dyn HasTraits>> {
        let file_path = self.find_file_name(gid)?;
        let (file, entry) = open_for_read(&self.registry, &file_path, self.allow_incomplete)?;
        let mut entity = load_entity(&file, entry)?;
        let references = file.gather_references()?;
        drop(file);

        if !self.recursive || references.is_empty() {
            return Ok(entity);
        }
        path.insert(gid);
        for (field, ref_gid) in references {
            if path.contains(&ref_gid) {
                debug!(%gid, field, target = %ref_gid, "Reference cycle, keeping id");
                continue;
            }
            debug!(%gid, field, target = %ref_gid, "Loading reference");
            let target = self.load_guarded(ref_gid, path)?;
            entity.set_field(field, FieldValue::Entity(EntityHandle::Owned(target)))?;
        }
        path.remove(&gid);
        Ok(entity)
    }

    /// Store `entity` in its container and return the path
    ///
    /// When recursive, loaded entities in reference fields are stored too,
    /// each at most once per call.
    pub fn store(&self, entity: &dyn HasTraits) -> Result<PathBuf> {
        let mut written = HashSet::new();
        self.store_guarded(entity, &mut written)
    }

    fn store_guarded(&self, entity: &dyn HasTraits, written: &mut HashSet<Gid>) -> Result<PathBuf> {
        let path = self.path_for(entity.type_name(), entity.gid())?;
        if !written.insert(entity.gid()) {
            return Ok(path);
        }
        let file = write_entity(&self.registry, entity, &path, self.sync_on_close)?;
        if !self.recursive {
            return Ok(path);
        }

        let reference_fields: Vec<&'static str> = file
            .accessors()
            .filter(|a| a.kind() == AccessorKind::Reference)
            .map(|a| a.field_name())
            .collect();
        drop(file);
        for field in reference_fields {
            if let Some(FieldValue::Entity(handle)) = entity.field(field) {
                debug!(gid = %entity.gid(), field, target = %handle.gid(), "Storing reference");
                self.store_guarded(handle.get(), written)?;
            }
        }
        Ok(path)
    }
}
