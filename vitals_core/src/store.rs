//! Persistent record store with file locking.
//!
//! Records live in a single JSON document inside the store directory,
//! alongside a lock file. Every operation runs as a transaction:
//! - Reads take a shared lock on the lock file
//! - Writes take an exclusive lock, load the document, mutate it and
//!   atomically replace it (temp file, fsync, rename)
//!
//! The exclusive lock makes the date-index lookup in `save` and the
//! following insert/update one atomic step, across threads and processes.

use crate::{DateRange, Error, HealthRecord, HealthRecordInput, RecordId, Result};
use chrono::NaiveDate;
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Latest document version this build reads and writes
pub const STORE_VERSION: u32 = 1;

const DOCUMENT_FILE: &str = "records.json";
const LOCK_FILE: &str = "records.lock";

/// On-disk layout: the record collection keyed by id plus a non-unique
/// secondary index on date.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
struct StoreDocument {
    version: u32,
    next_id: RecordId,
    records: BTreeMap<RecordId, HealthRecord>,
    date_index: BTreeMap<NaiveDate, Vec<RecordId>>,
}

impl StoreDocument {
    fn empty() -> Self {
        Self {
            version: STORE_VERSION,
            next_id: 1,
            records: BTreeMap::new(),
            date_index: BTreeMap::new(),
        }
    }

    /// First (lowest) id recorded for a date
    fn first_for_date(&self, date: NaiveDate) -> Option<RecordId> {
        self.date_index
            .get(&date)
            .and_then(|ids| ids.first().copied())
    }

    fn upsert(&mut self, input: &HealthRecordInput) -> RecordId {
        if let Some(id) = self.first_for_date(input.date) {
            if let Some(existing) = self.records.get_mut(&id) {
                existing.merge_from(input);
                tracing::debug!("Updated record {} for {}", id, input.date);
                return id;
            }
        }

        let id = self.next_id;
        self.next_id += 1;
        self.records.insert(id, HealthRecord::from_input(id, input));
        self.date_index.entry(input.date).or_default().push(id);
        tracing::debug!("Inserted record {} for {}", id, input.date);
        id
    }

    /// Returns whether a record was removed
    fn remove(&mut self, id: RecordId) -> bool {
        let Some(record) = self.records.remove(&id) else {
            return false;
        };

        if let Some(ids) = self.date_index.get_mut(&record.date) {
            ids.retain(|other| *other != id);
            if ids.is_empty() {
                self.date_index.remove(&record.date);
            }
        }
        true
    }

    /// Records for every indexed date in `range` (all dates when `None`),
    /// ascending by date and by id within a date.
    fn collect_range(&self, range: Option<DateRange>) -> Vec<HealthRecord> {
        let ids: Vec<RecordId> = match range {
            // BTreeMap::range panics on an inverted range
            Some(range) if range.is_empty() => return Vec::new(),
            Some(range) => Self::ids_in(self.date_index.range(range.start..=range.end)),
            None => Self::ids_in(self.date_index.iter()),
        };

        ids.iter()
            .filter_map(|id| self.records.get(id).cloned())
            .collect()
    }

    fn ids_in<'a>(
        entries: impl Iterator<Item = (&'a NaiveDate, &'a Vec<RecordId>)>,
    ) -> Vec<RecordId> {
        entries.flat_map(|(_, ids)| ids.iter().copied()).collect()
    }

    fn build_index(records: &BTreeMap<RecordId, HealthRecord>) -> BTreeMap<NaiveDate, Vec<RecordId>> {
        let mut index: BTreeMap<NaiveDate, Vec<RecordId>> = BTreeMap::new();
        // BTreeMap iteration is ordered by id, so each bucket stays sorted
        for record in records.values() {
            index.entry(record.date).or_default().push(record.id);
        }
        index
    }

    /// Bring the index and id counter back in line with the records.
    ///
    /// Returns true if anything had to change.
    fn repair(&mut self) -> bool {
        let mut repaired = false;

        let index = Self::build_index(&self.records);
        if index != self.date_index {
            tracing::warn!(
                "Date index disagrees with {} stored records, rebuilding",
                self.records.len()
            );
            self.date_index = index;
            repaired = true;
        }

        let floor = self.records.keys().next_back().map_or(1, |max| max + 1);
        if self.next_id < floor {
            tracing::warn!("Id counter {} behind stored records, advancing to {}", self.next_id, floor);
            self.next_id = floor;
            repaired = true;
        }

        repaired
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum StoreState {
    Uninitialized,
    Ready,
}

/// Handle to the on-disk health record store
///
/// Created uninitialized; `init` must succeed before any other operation.
#[derive(Debug)]
pub struct RecordStore {
    dir: PathBuf,
    state: StoreState,
}

impl RecordStore {
    /// Create a handle for the store rooted at `dir`. Performs no I/O.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            state: StoreState::Uninitialized,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn is_ready(&self) -> bool {
        self.state == StoreState::Ready
    }

    fn document_path(&self) -> PathBuf {
        self.dir.join(DOCUMENT_FILE)
    }

    /// Open the store, provisioning an empty document on first use
    ///
    /// Reopening a provisioned store leaves its data alone. On failure the
    /// handle stays uninitialized and `init` can be called again.
    pub fn init(&mut self) -> Result<()> {
        if self.is_ready() {
            return Ok(());
        }

        match self.provision() {
            Ok(()) => {
                self.state = StoreState::Ready;
                tracing::debug!("Record store ready at {:?}", self.dir);
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Failed to open record store at {:?}: {}", self.dir, e);
                Err(e)
            }
        }
    }

    fn provision(&self) -> Result<()> {
        std::fs::create_dir_all(&self.dir).map_err(|e| {
            Error::StorageUnavailable(format!("cannot create {:?}: {}", self.dir, e))
        })?;

        let lock = self.open_lock().map_err(unavailable)?;
        lock.lock_exclusive().map_err(|e| {
            Error::StorageUnavailable(format!("cannot lock {:?}: {}", self.dir, e))
        })?;

        let path = self.document_path();
        if path.exists() {
            let mut document = load_document(&path).map_err(unavailable)?;

            if document.version > STORE_VERSION {
                return Err(Error::StorageUnavailable(format!(
                    "store version {} is newer than supported {}",
                    document.version, STORE_VERSION
                )));
            }

            let mut dirty = document.repair();
            if document.version < STORE_VERSION {
                tracing::info!(
                    "Upgrading record store from version {} to {}",
                    document.version,
                    STORE_VERSION
                );
                document.version = STORE_VERSION;
                dirty = true;
            }

            if dirty {
                persist_document(&self.dir, &path, &document).map_err(unavailable)?;
            }

            tracing::debug!(
                "Opened record store with {} records",
                document.records.len()
            );
        } else {
            persist_document(&self.dir, &path, &StoreDocument::empty()).map_err(unavailable)?;
            tracing::info!("Provisioned new record store at {:?}", self.dir);
        }

        FileExt::unlock(&lock)?;
        Ok(())
    }

    /// Insert or update the record for `input.date`
    ///
    /// If a record already exists for the date its id is kept and every
    /// other field is overwritten. Otherwise a new id is assigned.
    pub fn save(&self, input: &HealthRecordInput) -> Result<RecordId> {
        self.ensure_ready()?;
        input.validate()?;

        self.write_transaction(|document| {
            let id = document.upsert(input);
            (id, true)
        })
    }

    /// Every record, ascending by date
    pub fn get_all(&self) -> Result<Vec<HealthRecord>> {
        self.ensure_ready()?;
        let records = self.read_transaction(|document| document.collect_range(None))?;
        tracing::debug!("Read {} records", records.len());
        Ok(records)
    }

    /// Records dated within `[start, end]` inclusive, ascending by date
    ///
    /// An inverted range (`start > end`) matches nothing.
    pub fn get_by_date_range(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<HealthRecord>> {
        self.get_in_range(DateRange::new(start, end))
    }

    /// Same as `get_by_date_range`, taking the bounds as a `DateRange`
    pub fn get_in_range(&self, range: DateRange) -> Result<Vec<HealthRecord>> {
        self.ensure_ready()?;
        let records = self.read_transaction(|document| document.collect_range(Some(range)))?;
        tracing::debug!(
            "Read {} records between {} and {}",
            records.len(),
            range.start,
            range.end
        );
        Ok(records)
    }

    /// Remove the record with `id`. Unknown ids are not an error.
    pub fn delete_by_id(&self, id: RecordId) -> Result<()> {
        self.ensure_ready()?;
        let removed = self.write_transaction(|document| {
            let removed = document.remove(id);
            (removed, removed)
        })?;

        if removed {
            tracing::debug!("Deleted record {}", id);
        } else {
            tracing::debug!("Delete of unknown record {} ignored", id);
        }
        Ok(())
    }

    fn ensure_ready(&self) -> Result<()> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(Error::NotInitialized)
        }
    }

    fn open_lock(&self) -> Result<File> {
        let path = self.dir.join(LOCK_FILE);
        OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| Error::StorageWriteFailure(format!("cannot open {:?}: {}", path, e)))
    }

    fn read_transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&StoreDocument) -> T,
    {
        let lock = self.open_lock().map_err(read_failure)?;
        FileExt::lock_shared(&lock).map_err(|e| {
            Error::StorageReadFailure(format!("cannot lock {:?}: {}", self.dir, e))
        })?;

        let document = load_document(&self.document_path())?;
        let result = f(&document);

        FileExt::unlock(&lock)?;
        Ok(result)
    }

    /// Run `f` under the exclusive lock. `f` returns its result and whether
    /// the document changed and must be written back.
    fn write_transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut StoreDocument) -> (T, bool),
    {
        let lock = self.open_lock()?;
        lock.lock_exclusive().map_err(|e| {
            Error::StorageWriteFailure(format!("cannot lock {:?}: {}", self.dir, e))
        })?;

        let path = self.document_path();
        let mut document = load_document(&path)?;
        let (result, changed) = f(&mut document);
        if changed {
            persist_document(&self.dir, &path, &document)?;
        }

        FileExt::unlock(&lock)?;
        Ok(result)
    }
}

fn load_document(path: &Path) -> Result<StoreDocument> {
    let mut contents = String::new();
    File::open(path)
        .and_then(|file| std::io::BufReader::new(file).read_to_string(&mut contents))
        .map_err(|e| Error::StorageReadFailure(format!("cannot read {:?}: {}", path, e)))?;

    serde_json::from_str(&contents)
        .map_err(|e| Error::StorageReadFailure(format!("cannot parse {:?}: {}", path, e)))
}

/// Atomically replace the document: temp file in the same directory,
/// sync to disk, rename over the original.
fn persist_document(dir: &Path, path: &Path, document: &StoreDocument) -> Result<()> {
    let write_failure = |e: std::io::Error| {
        Error::StorageWriteFailure(format!("cannot write {:?}: {}", path, e))
    };

    let temp = NamedTempFile::new_in(dir).map_err(write_failure)?;
    {
        let mut writer = std::io::BufWriter::new(temp.as_file());
        let contents = serde_json::to_string(document)
            .map_err(|e| Error::StorageWriteFailure(format!("cannot encode records: {}", e)))?;
        writer.write_all(contents.as_bytes()).map_err(write_failure)?;
        writer.flush().map_err(write_failure)?;
    }
    temp.as_file().sync_all().map_err(write_failure)?;
    temp.persist(path).map_err(|e| write_failure(e.error))?;

    tracing::debug!("Persisted {} records to {:?}", document.records.len(), path);
    Ok(())
}

fn unavailable(e: Error) -> Error {
    match e {
        Error::StorageUnavailable(_) => e,
        other => Error::StorageUnavailable(other.to_string()),
    }
}

fn read_failure(e: Error) -> Error {
    match e {
        Error::StorageWriteFailure(message) => Error::StorageReadFailure(message),
        other => other,
    }
}
