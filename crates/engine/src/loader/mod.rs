//! Loaders: turn ids and paths into entities and back
//!
//! - [`Loader`]: one entity per explicit path
//! - [`DirLoader`]: a flat directory of containers named by gid, optionally
//!   following references
//! - [`TvbLoader`]: containers placed in operation folders of a project,
//!   located through a [`Catalog`](crate::catalog::Catalog)
//!
//! Every loader opens a container with the format named in its provenance
//! block and rejects containers that were never sealed, unless configured
//! to accept them.

mod dir;
mod tvb;

pub use dir::DirLoader;
pub use tvb::TvbLoader;

use std::path::Path;
use std::sync::Arc;

use neostore_core::{Error, FieldValue, Gid, HasTraits, Result};
use tracing::debug;

use crate::config::NeostoreConfig;
use crate::h5file::{H5File, Mode};
use crate::registry::{Registry, RegistryEntry};

/// `{base}_{hex}.{extension}`
pub(crate) fn container_file_name(base: &str, gid: Gid, extension: &str) -> String {
    format!("{}_{}.{}", base, gid.hex(), extension)
}

/// Open `path` for reading with the format its provenance names
pub(crate) fn open_for_read<'r>(
    registry: &'r Registry,
    path: &Path,
    allow_incomplete: bool,
) -> Result<(H5File, &'r RegistryEntry)> {
    if !path.is_file() {
        return Err(Error::NotFound(format!("no container at {}", path.display())));
    }
    let provenance = H5File::read_provenance(path)?.ok_or_else(|| {
        Error::NotFound(format!("{} has no provenance block", path.display()))
    })?;
    let entry = registry.by_written_by(&provenance.written_by).ok_or_else(|| {
        Error::NotFound(format!(
            "no container format registered as '{}'",
            provenance.written_by
        ))
    })?;
    let file = (entry.open)(path, Mode::ReadOnly)?;
    ensure_complete(&file, allow_incomplete)?;
    debug!(path = %path.display(), written_by = entry.written_by, "Opened container");
    Ok((file, entry))
}

pub(crate) fn ensure_complete(file: &H5File, allow_incomplete: bool) -> Result<()> {
    if !allow_incomplete && !file.is_complete() {
        return Err(Error::IncompleteContainer(file.path().to_path_buf()));
    }
    Ok(())
}

/// Fresh entity of `entry`'s datatype filled from `file`
///
/// Each stored reference is attached as a bare id.
pub(crate) fn load_entity(file: &H5File, entry: &RegistryEntry) -> Result<Box<dyn HasTraits>> {
    let mut entity = (entry.new_entity)();
    file.load_into(entity.as_mut())?;
    for (field, gid) in file.gather_references()? {
        entity.set_field(field, FieldValue::Id(gid))?;
    }
    Ok(entity)
}

/// Write `entity` into a new container at `path`, then seal it
///
/// A file already at `path` is replaced, so fields cleared since the last
/// store do not come back.
pub(crate) fn write_entity(
    registry: &Registry,
    entity: &dyn HasTraits,
    path: &Path,
    sync_on_close: bool,
) -> Result<H5File> {
    let entry = registry.require_datatype(entity.type_name())?;
    let mut file = (entry.open)(path, Mode::Create)?;
    file.set_sync_on_close(sync_on_close);
    file.store(entity, false)?;
    file.close()?;
    debug!(path = %path.display(), gid = %entity.gid(), "Stored entity");
    Ok(file)
}

/// Non-recursive loader over explicit paths
#[derive(Debug, Clone)]
pub struct Loader {
    registry: Arc<Registry>,
    allow_incomplete: bool,
    sync_on_close: bool,
}

impl Loader {
    /// Loader with default storage settings
    pub fn new(registry: Arc<Registry>) -> Self {
        Self::with_config(registry, &NeostoreConfig::default())
    }

    /// Loader with the `[storage]` settings of `config`
    pub fn with_config(registry: Arc<Registry>, config: &NeostoreConfig) -> Self {
        Loader {
            registry,
            allow_incomplete: config.storage.allow_incomplete,
            sync_on_close: config.storage.sync_on_close,
        }
    }

    /// Load the entity stored at `path`
    ///
    /// References come back as ids.
    ///
    /// # Errors
    /// `NotFound` if there is no file or its format is not registered,
    /// `IncompleteContainer` if it was never sealed.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<Box<dyn HasTraits>> {
        let (file, entry) = open_for_read(&self.registry, path.as_ref(), self.allow_incomplete)?;
        load_entity(&file, entry)
    }

    /// Store `entity` at `path` and seal the container
    ///
    /// # Errors
    /// `NotFound` if the entity's datatype is not registered.
    pub fn store(&self, entity: &dyn HasTraits, path: impl AsRef<Path>) -> Result<()> {
        write_entity(&self.registry, entity, path.as_ref(), self.sync_on_close).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accessor::Scalar;
    use crate::datatypes::{TimeSeries, TimeSeriesH5};
    use crate::h5file::open_format;
    use crate::registry::builtin;
    use neostore_core::{Attr, NdArray};
    use tempfile::tempdir;

    #[test]
    fn test_store_then_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ts.h5");
        let loader = Loader::new(builtin());
        let ts = TimeSeries::new(NdArray::zeros(vec![3, 1, 2, 1]), 0.5);

        loader.store(&ts, &path).unwrap();
        let loaded = loader.load(&path).unwrap();
        assert_eq!(loaded.downcast_ref::<TimeSeries>(), Some(&ts));
    }

    #[test]
    fn test_missing_path_is_not_found() {
        let dir = tempdir().unwrap();
        let loader = Loader::new(builtin());
        assert!(loader.load(dir.path().join("absent.h5")).unwrap_err().is_not_found());
    }

    #[test]
    fn test_unsealed_container_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ts.h5");
        {
            let mut file = open_format::<TimeSeriesH5>(&path, Mode::ReadWrite).unwrap();
            file.store(&TimeSeries::default(), false).unwrap();
            // dropped without close
        }

        let strict = Loader::new(builtin());
        assert!(matches!(
            strict.load(&path),
            Err(Error::IncompleteContainer(_))
        ));

        let mut config = NeostoreConfig::default();
        config.storage.allow_incomplete = true;
        let lenient = Loader::with_config(builtin(), &config);
        assert!(lenient.load(&path).is_ok());
    }

    #[test]
    fn test_unregistered_format_is_not_found() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("other.h5");
        {
            let mut file = H5File::open(&path, "someone.else.Format", Mode::ReadWrite).unwrap();
            file.register(Scalar::new(Attr::float("x").optional())).unwrap();
            file.close().unwrap();
        }
        assert!(Loader::new(builtin()).load(&path).unwrap_err().is_not_found());
    }
}
