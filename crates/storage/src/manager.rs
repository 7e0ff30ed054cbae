//! Container storage manager.
//!
//! A `StorageManager` owns one container file. Opening a file scans its
//! records once and builds an in-memory index:
//!
//! - metadata groups (the side tables), with later keys overriding earlier ones
//! - datasets, each a declaration plus the file offsets of its chunks
//! - whether the last record is a seal
//!
//! Chunk bodies are not read during the scan. They are read, and their
//! checksum verified, only when a slice intersecting them is requested.
//!
//! # Torn tails
//!
//! A record cut short by a crash is detected during the scan. Readers ignore
//! it; a writer truncates it before writing its first new record.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use uuid::Uuid;

use neostore_core::{DType, DataSlice, Error, NdArray, Result, Value};

use crate::codec::{decode_body, encode_body};
use crate::format::{
    decode_chunk_meta, ChunkMeta, ContainerHeader, DataSetSpec, Record, RecordKind,
    RecordPrefix, Seal, SetMeta, CONTAINER_HEADER_SIZE, RECORD_PREFIX_SIZE,
};

/// Current time in microseconds since the Unix epoch
pub fn now_micros() -> u64 {
    chrono::Utc::now().timestamp_micros().max(0) as u64
}

/// Location of one chunk record in the file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ChunkLocation {
    /// Offset of the record's length field
    offset: u64,
    /// Total record size
    len: usize,
    /// First position along the expand axis
    start: usize,
    /// Extent along the expand axis
    extent: usize,
}

#[derive(Debug, Clone)]
struct DataSetIndex {
    dtype: DType,
    shape: Vec<usize>,
    expand_dim: Option<usize>,
    chunks: Vec<ChunkLocation>,
}

impl DataSetIndex {
    fn declare(spec: DataSetSpec) -> Self {
        DataSetIndex {
            dtype: spec.dtype,
            shape: spec.shape,
            expand_dim: spec.expand_dim,
            chunks: Vec::new(),
        }
    }

    fn add_chunk(&mut self, meta: &ChunkMeta, offset: u64, len: usize) {
        let extent = match self.expand_dim {
            Some(d) => {
                let extent = meta.shape.get(d).copied().unwrap_or(0);
                self.shape[d] = self.shape[d].max(meta.start + extent);
                extent
            }
            None => 0,
        };
        if let (DType::Str(have), DType::Str(got)) = (self.dtype, meta.dtype) {
            self.dtype = DType::Str(have.max(got));
        }
        self.chunks.push(ChunkLocation {
            offset,
            len,
            start: meta.start,
            extent,
        });
    }
}

/// Summary of a stored dataset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSetInfo {
    /// Element type
    pub dtype: DType,
    /// Current shape
    pub shape: Vec<usize>,
    /// Declared expandable axis
    pub expand_dim: Option<usize>,
    /// Number of chunks on disk
    pub chunk_count: usize,
}

/// Storage engine for one container file.
///
/// Not `Sync`: one logical user at a time.
pub struct StorageManager {
    path: PathBuf,
    file: File,
    header: ContainerHeader,
    writable: bool,
    /// End of the last complete record
    write_position: u64,
    /// Original file size when a torn tail awaits truncation
    torn_tail: Option<u64>,
    record_count: usize,
    groups: BTreeMap<String, BTreeMap<String, Value>>,
    datasets: BTreeMap<String, DataSetIndex>,
    seal: Option<Seal>,
}

impl StorageManager {
    /// Open a container for reading and writing, creating it if missing.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)?;

        if file.metadata()?.len() == 0 {
            return Self::init(path, file);
        }
        Self::load(path, file, true)
    }

    /// Create an empty container, discarding any file already at `path`.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;
        Self::init(path, file)
    }

    fn init(path: PathBuf, mut file: File) -> Result<Self> {
        let header = ContainerHeader::new(*Uuid::new_v4().as_bytes(), now_micros());
        file.write_all(&header.to_bytes())?;
        file.sync_all()?;
        debug!(path = %path.display(), "Created container");
        Ok(StorageManager {
            path,
            file,
            header,
            writable: true,
            write_position: CONTAINER_HEADER_SIZE as u64,
            torn_tail: None,
            record_count: 0,
            groups: BTreeMap::new(),
            datasets: BTreeMap::new(),
            seal: None,
        })
    }

    /// Open an existing container read-only.
    pub fn open_read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        Self::load(path, file, false)
    }

    fn load(path: PathBuf, file: File, writable: bool) -> Result<Self> {
        let file_len = file.metadata()?.len();
        if file_len < CONTAINER_HEADER_SIZE as u64 {
            return Err(Error::Corruption(format!(
                "{} is too short for a container header",
                path.display()
            )));
        }

        let mut header_bytes = [0u8; CONTAINER_HEADER_SIZE];
        (&file).seek(SeekFrom::Start(0))?;
        (&file).read_exact(&mut header_bytes)?;
        let header = ContainerHeader::from_bytes(&header_bytes)
            .filter(ContainerHeader::is_valid)
            .ok_or_else(|| {
                Error::Corruption(format!("{} is not a neostore container", path.display()))
            })?;
        if !header.is_supported() {
            return Err(Error::StorageError(format!(
                "{} uses unsupported container format version {}",
                path.display(),
                header.format_version
            )));
        }

        let mut manager = StorageManager {
            path,
            file,
            header,
            writable,
            write_position: CONTAINER_HEADER_SIZE as u64,
            torn_tail: None,
            record_count: 0,
            groups: BTreeMap::new(),
            datasets: BTreeMap::new(),
            seal: None,
        };
        manager.scan(file_len)?;

        if manager.write_position < file_len {
            warn!(
                path = %manager.path.display(),
                valid_end = manager.write_position,
                file_size = file_len,
                "Container has a torn tail, ignoring incomplete record"
            );
            manager.torn_tail = Some(file_len);
        }
        debug!(
            path = %manager.path.display(),
            records = manager.record_count,
            datasets = manager.datasets.len(),
            sealed = manager.seal.is_some(),
            writable,
            "Opened container"
        );
        Ok(manager)
    }

    /// Replay every complete record after the header.
    fn scan(&mut self, file_len: u64) -> Result<()> {
        let mut reader = BufReader::new(self.file.try_clone()?);
        reader.seek(SeekFrom::Start(CONTAINER_HEADER_SIZE as u64))?;
        let mut pos = CONTAINER_HEADER_SIZE as u64;
        let mut prefix_bytes = [0u8; RECORD_PREFIX_SIZE];

        while pos < file_len {
            let remaining = file_len - pos;
            if remaining < RECORD_PREFIX_SIZE as u64 {
                break;
            }
            reader.read_exact(&mut prefix_bytes)?;
            let prefix = RecordPrefix::parse(&prefix_bytes)
                .map_err(|e| corruption_at(&self.path, pos, e))?;
            if prefix.total_len() as u64 > remaining {
                break;
            }

            let record = match prefix.kind {
                RecordKind::Chunk => {
                    let mut meta = vec![0u8; prefix.meta_len];
                    reader.read_exact(&mut meta)?;
                    let chunk = decode_chunk_meta(&meta)
                        .map_err(|e| corruption_at(&self.path, pos, e))?;
                    reader.seek_relative((prefix.body_len() + 4) as i64)?;
                    ScannedRecord::Chunk(chunk, prefix.total_len())
                }
                _ => {
                    let mut bytes = vec![0u8; prefix.total_len()];
                    bytes[..RECORD_PREFIX_SIZE].copy_from_slice(&prefix_bytes);
                    reader.read_exact(&mut bytes[RECORD_PREFIX_SIZE..])?;
                    let (record, _) = Record::from_bytes(&bytes)
                        .map_err(|e| corruption_at(&self.path, pos, e))?;
                    ScannedRecord::Full(record)
                }
            };

            match record {
                ScannedRecord::Chunk(meta, len) => self.apply_chunk(&meta, pos, len)?,
                ScannedRecord::Full(record) => self.apply(record),
            }
            pos += prefix.total_len() as u64;
            self.write_position = pos;
            self.record_count += 1;
        }
        Ok(())
    }

    fn apply(&mut self, record: Record) {
        if !matches!(record, Record::Seal(_)) {
            self.seal = None;
        }
        match record {
            Record::SetMeta(SetMeta { group, entries }) => {
                let table = self.groups.entry(group).or_default();
                for (key, value) in entries {
                    if value.is_null() {
                        table.remove(&key);
                    } else {
                        table.insert(key, value);
                    }
                }
            }
            Record::CreateDataSet(spec) => {
                self.datasets
                    .insert(spec.name.clone(), DataSetIndex::declare(spec));
            }
            Record::Seal(seal) => self.seal = Some(seal),
            // Chunks are indexed by location, see `apply_chunk`
            Record::Chunk(..) => {}
        }
    }

    fn apply_chunk(&mut self, meta: &ChunkMeta, offset: u64, len: usize) -> Result<()> {
        self.seal = None;
        let index = self.datasets.get_mut(&meta.name).ok_or_else(|| {
            Error::Corruption(format!(
                "chunk at offset {} for undeclared dataset '{}'",
                offset, meta.name
            ))
        })?;
        index.add_chunk(meta, offset, len);
        Ok(())
    }

    /// Append one record at the end of the valid data.
    fn append_record(&mut self, record: &Record) -> Result<(u64, usize)> {
        if !self.writable {
            return Err(Error::StorageError(format!(
                "container {} is open read-only",
                self.path.display()
            )));
        }
        if let Some(file_size) = self.torn_tail.take() {
            warn!(
                path = %self.path.display(),
                valid_end = self.write_position,
                file_size,
                "Truncating torn tail before write"
            );
            self.file.set_len(self.write_position)?;
        }

        let bytes = record.to_bytes()?;
        let offset = self.write_position;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(&bytes)?;
        self.write_position += bytes.len() as u64;
        self.record_count += 1;
        Ok((offset, bytes.len()))
    }

    // ------------------------------------------------------------------
    // Side tables
    // ------------------------------------------------------------------

    /// Merge entries into a metadata group. A `Null` value removes its key.
    pub fn set_metadata(&mut self, group: &str, entries: BTreeMap<String, Value>) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let record = Record::SetMeta(SetMeta {
            group: group.to_string(),
            entries,
        });
        self.append_record(&record)?;
        self.apply(record);
        Ok(())
    }

    /// Set a single metadata entry
    pub fn set_meta_value(&mut self, group: &str, key: &str, value: Value) -> Result<()> {
        let mut entries = BTreeMap::new();
        entries.insert(key.to_string(), value);
        self.set_metadata(group, entries)
    }

    /// All entries of a metadata group (empty if the group does not exist)
    pub fn get_metadata(&self, group: &str) -> BTreeMap<String, Value> {
        self.groups.get(group).cloned().unwrap_or_default()
    }

    /// One metadata entry
    pub fn meta_value(&self, group: &str, key: &str) -> Option<&Value> {
        self.groups.get(group).and_then(|table| table.get(key))
    }

    /// Names of all metadata groups
    pub fn groups(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    // ------------------------------------------------------------------
    // Datasets
    // ------------------------------------------------------------------

    /// Write a whole dataset, replacing any previous one of the same name.
    pub fn store_data(
        &mut self,
        name: &str,
        array: &NdArray,
        expand_dim: Option<usize>,
    ) -> Result<()> {
        if let Some(d) = expand_dim {
            if d >= array.ndim() {
                return Err(Error::ShapeError(format!(
                    "expandable axis {} out of range for {}-d dataset '{}'",
                    d,
                    array.ndim(),
                    name
                )));
            }
        }
        let spec = DataSetSpec {
            name: name.to_string(),
            dtype: array.dtype(),
            shape: array.shape().to_vec(),
            expand_dim,
        };
        let declare = Record::CreateDataSet(spec);
        self.append_record(&declare)?;
        self.apply(declare);

        if !array.is_empty() {
            self.write_chunk(name, array, 0)?;
        }
        Ok(())
    }

    /// Grow a dataset along its expandable axis.
    ///
    /// A missing dataset is created with `expand_dim`. A chunk with one
    /// dimension fewer than the dataset is a single slab along the axis.
    /// Returns the new shape.
    ///
    /// # Errors
    /// `InvalidAppend` if the dataset has no expandable axis, the chunk's
    /// other dimensions disagree, or its element type cannot be widened to
    /// the dataset's.
    pub fn append_data(
        &mut self,
        name: &str,
        chunk: &NdArray,
        expand_dim: Option<usize>,
    ) -> Result<Vec<usize>> {
        let (axis, chunk) = match self.datasets.get(name) {
            Some(index) => {
                let axis = index.expand_dim.ok_or_else(|| {
                    Error::InvalidAppend(format!("dataset '{}' has no expandable axis", name))
                })?;
                if let Some(requested) = expand_dim {
                    if requested != axis {
                        return Err(Error::InvalidAppend(format!(
                            "dataset '{}' expands along axis {}, not {}",
                            name, axis, requested
                        )));
                    }
                }
                (axis, conform_chunk(name, index, axis, chunk)?)
            }
            None => {
                let axis = expand_dim.ok_or_else(|| {
                    Error::InvalidAppend(format!("dataset '{}' has no expandable axis", name))
                })?;
                if axis >= chunk.ndim() {
                    return Err(Error::InvalidAppend(format!(
                        "expandable axis {} out of range for {}-d chunk",
                        axis,
                        chunk.ndim()
                    )));
                }
                let mut shape = chunk.shape().to_vec();
                shape[axis] = 0;
                let declare = Record::CreateDataSet(DataSetSpec {
                    name: name.to_string(),
                    dtype: chunk.dtype(),
                    shape,
                    expand_dim: Some(axis),
                });
                self.append_record(&declare)?;
                self.apply(declare);
                (axis, chunk.clone())
            }
        };

        let start = self.datasets.get(name).map(|ix| ix.shape[axis]).unwrap_or(0);
        if !chunk.is_empty() {
            self.write_chunk(name, &chunk, start)?;
        }
        self.get_data_shape(name)
    }

    fn write_chunk(&mut self, name: &str, array: &NdArray, start: usize) -> Result<()> {
        let meta = ChunkMeta {
            name: name.to_string(),
            dtype: array.dtype(),
            shape: array.shape().to_vec(),
            start,
        };
        let record = Record::Chunk(meta, encode_body(array)?);
        let (offset, len) = self.append_record(&record)?;
        if let Record::Chunk(meta, _) = &record {
            self.apply_chunk(meta, offset, len)?;
        }
        Ok(())
    }

    /// Whether a dataset exists
    pub fn has_dataset(&self, name: &str) -> bool {
        self.datasets.contains_key(name)
    }

    /// Names of all datasets
    pub fn datasets(&self) -> impl Iterator<Item = &str> {
        self.datasets.keys().map(String::as_str)
    }

    /// Summary of one dataset
    pub fn dataset_info(&self, name: &str) -> Option<DataSetInfo> {
        self.datasets.get(name).map(|index| DataSetInfo {
            dtype: index.dtype,
            shape: index.shape.clone(),
            expand_dim: index.expand_dim,
            chunk_count: index.chunks.len(),
        })
    }

    /// Current shape of a dataset without reading it
    pub fn get_data_shape(&self, name: &str) -> Result<Vec<usize>> {
        self.datasets
            .get(name)
            .map(|index| index.shape.clone())
            .ok_or_else(|| Error::missing("", name))
    }

    /// Read a whole dataset
    pub fn get_full_data(&self, name: &str) -> Result<NdArray> {
        self.get_data(name, &DataSlice::all())
    }

    /// Read a hyperslab of a dataset.
    ///
    /// Only chunks intersecting the selection along the expandable axis are
    /// read from disk.
    pub fn get_data(&self, name: &str, slice: &DataSlice) -> Result<NdArray> {
        let index = self
            .datasets
            .get(name)
            .ok_or_else(|| Error::missing("", name))?;
        let selection = slice.resolve(&index.shape)?;
        let selected_shape: Vec<usize> = selection.iter().map(Vec::len).collect();

        let mut pieces = Vec::new();
        match index.expand_dim {
            Some(axis) => {
                for loc in &index.chunks {
                    let local: Vec<usize> = selection[axis]
                        .iter()
                        .filter(|&&p| p >= loc.start && p < loc.start + loc.extent)
                        .map(|&p| p - loc.start)
                        .collect();
                    if local.is_empty() {
                        continue;
                    }
                    let chunk = self.read_chunk(loc)?;
                    let mut chunk_selection = selection.clone();
                    chunk_selection[axis] = local;
                    pieces.push(chunk.select(&chunk_selection)?);
                }
            }
            None => {
                if let Some(loc) = index.chunks.last() {
                    pieces.push(self.read_chunk(loc)?.select(&selection)?);
                }
            }
        }

        let selected = match pieces.len() {
            0 => NdArray::empty(index.dtype, selected_shape.clone())?,
            1 => pieces.remove(0),
            _ => {
                let axis = index.expand_dim.unwrap_or(0);
                let refs: Vec<&NdArray> = pieces.iter().collect();
                NdArray::concat(axis, &refs)?
            }
        };

        let dropped = slice.dropped_axes();
        if dropped.is_empty() {
            return Ok(selected);
        }
        let shape = selected_shape
            .iter()
            .enumerate()
            .filter(|(axis, _)| !dropped.contains(axis))
            .map(|(_, &len)| len)
            .collect();
        selected.reshape(shape)
    }

    fn read_chunk(&self, loc: &ChunkLocation) -> Result<NdArray> {
        let mut file = &self.file;
        file.seek(SeekFrom::Start(loc.offset))?;
        let mut bytes = vec![0u8; loc.len];
        file.read_exact(&mut bytes)?;
        match Record::from_bytes(&bytes).map_err(|e| corruption_at(&self.path, loc.offset, e))? {
            (Record::Chunk(meta, body), _) => decode_body(meta.dtype, &meta.shape, &body),
            (other, _) => Err(Error::Corruption(format!(
                "expected a chunk at offset {}, found {:?}",
                loc.offset,
                other.kind()
            ))),
        }
    }

    // ------------------------------------------------------------------
    // Completion
    // ------------------------------------------------------------------

    /// Write the seal record
    ///
    /// The seal is not fsynced; callers that need durability call
    /// [`sync`](Self::sync) afterwards.
    pub fn seal(&mut self, written_by: &str) -> Result<()> {
        let record = Record::Seal(Seal {
            written_by: written_by.to_string(),
            sealed_at: now_micros(),
        });
        self.append_record(&record)?;
        self.apply(record);
        debug!(path = %self.path.display(), written_by, "Sealed container");
        Ok(())
    }

    /// Whether the last record is a seal
    pub fn is_sealed(&self) -> bool {
        self.seal.is_some()
    }

    /// The seal record, if the container is complete
    pub fn seal_info(&self) -> Option<&Seal> {
        self.seal.as_ref()
    }

    /// Flush written records to disk
    pub fn sync(&mut self) -> Result<()> {
        if self.writable {
            self.file.sync_all()?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// Path of the container file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File header
    pub fn header(&self) -> &ContainerHeader {
        &self.header
    }

    /// Whether writes are allowed
    pub fn is_writable(&self) -> bool {
        self.writable
    }

    /// Whether an incomplete trailing record was found and not yet truncated
    pub fn has_torn_tail(&self) -> bool {
        self.torn_tail.is_some()
    }

    /// Number of complete records
    pub fn record_count(&self) -> usize {
        self.record_count
    }

    /// Size of the valid data in bytes
    pub fn valid_len(&self) -> u64 {
        self.write_position
    }
}

impl std::fmt::Debug for StorageManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageManager")
            .field("path", &self.path)
            .field("writable", &self.writable)
            .field("records", &self.record_count)
            .field("sealed", &self.seal.is_some())
            .finish()
    }
}

enum ScannedRecord {
    Chunk(ChunkMeta, usize),
    Full(Record),
}

/// Validate a chunk against an existing dataset and bring it to its rank and type.
fn conform_chunk(name: &str, index: &DataSetIndex, axis: usize, chunk: &NdArray) -> Result<NdArray> {
    let ndim = index.shape.len();
    let chunk = if chunk.ndim() + 1 == ndim {
        chunk.clone().insert_axis(axis)?
    } else if chunk.ndim() == ndim {
        chunk.clone()
    } else {
        return Err(Error::InvalidAppend(format!(
            "cannot append a {}-d chunk to {}-d dataset '{}'",
            chunk.ndim(),
            ndim,
            name
        )));
    };

    for (i, (&have, &got)) in index.shape.iter().zip(chunk.shape()).enumerate() {
        if i != axis && have != got {
            return Err(Error::InvalidAppend(format!(
                "chunk shape {:?} does not match dataset '{}' shape {:?} on axis {}",
                chunk.shape(),
                name,
                index.shape,
                i
            )));
        }
    }

    let dtype = chunk.dtype();
    if dtype.same_kind(&index.dtype) {
        return Ok(chunk);
    }
    if !dtype.can_cast_to(&index.dtype) {
        return Err(Error::InvalidAppend(format!(
            "cannot append {} data to {} dataset '{}'",
            dtype, index.dtype, name
        )));
    }
    chunk.cast(index.dtype)
}

fn corruption_at(path: &Path, offset: u64, err: impl std::fmt::Display) -> Error {
    Error::Corruption(format!("{} at offset {} in {}", err, offset, path.display()))
}
