//! Action execution against container files.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use neostore_core::{Error, Result, Value};
use neostore_storage::StorageManager;
use serde::Serialize;
use tracing::debug;

use crate::parse::CliAction;

/// Summary of one dataset.
#[derive(Debug, Serialize)]
pub struct DataSetReport {
    pub name: String,
    pub dtype: String,
    pub shape: Vec<usize>,
    pub expand_dim: Option<usize>,
    pub chunks: usize,
}

/// Summary of one container.
#[derive(Debug, Serialize)]
pub struct ContainerReport {
    pub path: String,
    pub format_version: u32,
    pub file_uuid: String,
    pub created_at: String,
    pub records: usize,
    pub valid_bytes: u64,
    pub complete: bool,
    pub sealed_by: Option<String>,
    pub sealed_at: Option<String>,
    pub torn_tail: bool,
    pub groups: BTreeMap<String, BTreeMap<String, serde_json::Value>>,
    pub datasets: Vec<DataSetReport>,
}

/// Result of a successful action.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Output {
    Report(ContainerReport),
    MetaWritten {
        path: String,
        group: String,
        written: usize,
        resealed: bool,
    },
}

/// Run one action.
pub fn execute(action: CliAction) -> Result<Output> {
    match action {
        CliAction::Inspect { path } => inspect(&path).map(Output::Report),
        CliAction::SetMeta {
            path,
            group,
            entries,
        } => set_meta(&path, &group, entries),
    }
}

fn require_file(path: &Path) -> Result<()> {
    if !path.is_file() {
        return Err(Error::NotFound(format!("no container at {}", path.display())));
    }
    Ok(())
}

/// Describe a container without binding a format.
pub fn inspect(path: &Path) -> Result<ContainerReport> {
    require_file(path)?;
    let storage = StorageManager::open_read(path)?;
    let header = storage.header();

    let mut groups = BTreeMap::new();
    for group in storage.groups() {
        let entries = storage
            .get_metadata(group)
            .into_iter()
            .map(|(k, v)| (k, v.to_json()))
            .collect();
        groups.insert(group.to_string(), entries);
    }

    let mut datasets = Vec::new();
    for name in storage.datasets() {
        if let Some(info) = storage.dataset_info(name) {
            datasets.push(DataSetReport {
                name: name.to_string(),
                dtype: info.dtype.to_string(),
                shape: info.shape,
                expand_dim: info.expand_dim,
                chunks: info.chunk_count,
            });
        }
    }
    datasets.sort_by(|a, b| a.name.cmp(&b.name));

    let seal = storage.seal_info();
    Ok(ContainerReport {
        path: path.display().to_string(),
        format_version: header.format_version,
        file_uuid: uuid::Uuid::from_bytes(header.file_uuid).to_string(),
        created_at: format_micros(header.created_at),
        records: storage.record_count(),
        valid_bytes: storage.valid_len(),
        complete: storage.is_sealed(),
        sealed_by: seal.map(|s| s.written_by.clone()),
        sealed_at: seal.map(|s| format_micros(s.sealed_at)),
        torn_tail: storage.has_torn_tail(),
        groups,
        datasets,
    })
}

/// Write entries into `group`, re-sealing a container that was complete.
pub fn set_meta(path: &Path, group: &str, entries: BTreeMap<String, Value>) -> Result<Output> {
    require_file(path)?;
    let mut storage = StorageManager::open(path)?;
    let sealed_by = storage.seal_info().map(|s| s.written_by.clone());
    let written = entries.len();
    storage.set_metadata(group, entries)?;
    if let Some(written_by) = &sealed_by {
        storage.seal(written_by)?;
    }
    storage.sync()?;
    debug!(path = %path.display(), group, written, "Updated metadata");
    Ok(Output::MetaWritten {
        path: path.display().to_string(),
        group: group.to_string(),
        written,
        resealed: sealed_by.is_some(),
    })
}

fn format_micros(micros: u64) -> String {
    let secs = (micros / 1_000_000) as i64;
    let nanos = ((micros % 1_000_000) * 1_000) as u32;
    DateTime::<Utc>::from_timestamp(secs, nanos)
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Micros, true))
        .unwrap_or_else(|| micros.to_string())
}
