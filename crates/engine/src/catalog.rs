//! Metadata catalog consulted by [`TvbLoader`](crate::loader::TvbLoader)
//!
//! The catalog knows which operation produced each stored entity and which
//! index type it was filed under. The loader turns that into a file path.

use std::collections::HashMap;
use std::path::PathBuf;

use neostore_core::{Error, Gid, Result};
use parking_lot::RwLock;

/// The operation that owns a stored entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationInfo {
    /// Folder of the owning project
    pub project_folder: PathBuf,
    /// Operation id, also the name of its folder inside the project
    pub operation_id: u64,
}

impl OperationInfo {
    /// Folder holding the operation's containers
    pub fn folder(&self) -> PathBuf {
        self.project_folder.join(self.operation_id.to_string())
    }
}

/// Catalog record of one stored entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexRecord {
    /// Index type, mapped to a datatype by the registry
    pub index_type: String,
    /// Entity id
    pub gid: Gid,
    /// Producing operation
    pub fk_from_operation: u64,
}

/// Read-only view of the catalog
pub trait Catalog: Send + Sync {
    /// Operation owning `gid`
    ///
    /// # Errors
    /// `NotFound` if the catalog has no such entity.
    fn get_owning_operation(&self, gid: Gid) -> Result<OperationInfo>;

    /// Index record of `gid`
    ///
    /// # Errors
    /// `NotFound` if the catalog has no such entity.
    fn get_record(&self, gid: Gid) -> Result<IndexRecord>;
}

#[derive(Debug, Default)]
struct CatalogState {
    records: HashMap<Gid, IndexRecord>,
    operations: HashMap<u64, PathBuf>,
}

/// Catalog kept in memory, shared between loaders
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    state: RwLock<CatalogState>,
}

impl InMemoryCatalog {
    /// Empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an operation and its project folder
    pub fn add_operation(&self, operation_id: u64, project_folder: impl Into<PathBuf>) {
        self.state
            .write()
            .operations
            .insert(operation_id, project_folder.into());
    }

    /// Record a stored entity
    pub fn add_record(&self, record: IndexRecord) {
        self.state.write().records.insert(record.gid, record);
    }

    /// Forget a stored entity
    pub fn remove_record(&self, gid: Gid) -> Option<IndexRecord> {
        self.state.write().records.remove(&gid)
    }

    /// Number of recorded entities
    pub fn len(&self) -> usize {
        self.state.read().records.len()
    }

    /// True when no entity is recorded
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Catalog for InMemoryCatalog {
    fn get_owning_operation(&self, gid: Gid) -> Result<OperationInfo> {
        let state = self.state.read();
        let record = state
            .records
            .get(&gid)
            .ok_or_else(|| Error::NotFound(format!("no catalog record for {}", gid)))?;
        let project_folder = state
            .operations
            .get(&record.fk_from_operation)
            .ok_or_else(|| {
                Error::NotFound(format!(
                    "operation {} owning {} is not in the catalog",
                    record.fk_from_operation, gid
                ))
            })?;
        Ok(OperationInfo {
            project_folder: project_folder.clone(),
            operation_id: record.fk_from_operation,
        })
    }

    fn get_record(&self, gid: Gid) -> Result<IndexRecord> {
        self.state
            .read()
            .records
            .get(&gid)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("no catalog record for {}", gid)))
    }
}
