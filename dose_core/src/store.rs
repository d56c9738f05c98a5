//! Medicine record persistence.
//!
//! The engine only sees the [`MedicineStore`] trait. Two backends exist:
//! an in-memory map and a JSON file guarded by file locks.

use crate::{Error, Medicine, MedicineId, Result, UserId};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tempfile::NamedTempFile;

/// Load/save access to medicine records
pub trait MedicineStore: Send + Sync {
    fn load_all(&self) -> Result<Vec<Medicine>>;

    fn find_by_id(&self, id: MedicineId) -> Result<Option<Medicine>>;

    /// Insert or replace the record with the same id
    fn save(&self, medicine: &Medicine) -> Result<()>;

    /// Returns whether a record was removed
    fn delete(&self, id: MedicineId) -> Result<bool>;

    fn load_active(&self) -> Result<Vec<Medicine>> {
        Ok(self.load_all()?.into_iter().filter(|m| m.active).collect())
    }

    fn load_by_user(&self, user_id: UserId) -> Result<Vec<Medicine>> {
        Ok(self
            .load_all()?
            .into_iter()
            .filter(|m| m.user_id == user_id)
            .collect())
    }
}

fn sort_for_display(medicines: &mut [Medicine]) {
    medicines.sort_by(|a, b| (a.user_id, &a.name, a.id).cmp(&(b.user_id, &b.name, b.id)));
}

// ============================================================================
// In-memory store
// ============================================================================

/// Process-local store, used for tests and embedding
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<MedicineId, Medicine>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_medicines(medicines: impl IntoIterator<Item = Medicine>) -> Self {
        let records = medicines.into_iter().map(|m| (m.id, m)).collect();
        Self {
            records: RwLock::new(records),
        }
    }
}

impl MedicineStore for MemoryStore {
    fn load_all(&self) -> Result<Vec<Medicine>> {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        let mut all: Vec<_> = records.values().cloned().collect();
        sort_for_display(&mut all);
        Ok(all)
    }

    fn find_by_id(&self, id: MedicineId) -> Result<Option<Medicine>> {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        Ok(records.get(&id).cloned())
    }

    fn save(&self, medicine: &Medicine) -> Result<()> {
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        records.insert(medicine.id, medicine.clone());
        Ok(())
    }

    fn delete(&self, id: MedicineId) -> Result<bool> {
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        Ok(records.remove(&id).is_some())
    }
}

// ============================================================================
// JSON file store
// ============================================================================

/// On-disk layout of the store file
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    #[serde(default)]
    medicines: Vec<Medicine>,
}

/// Medicines kept in a single JSON file
///
/// Reads take a shared lock on the data file. Writes serialize on an
/// exclusive lock of a sibling `.lock` file, then atomically replace the
/// data file through a temp file in the same directory.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `<data_dir>/medicines.json`
    pub fn in_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join("medicines.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".lock");
        PathBuf::from(name)
    }

    /// Read the whole file with a shared lock; a missing file is an empty store
    fn read_file(&self) -> Result<StoreFile> {
        if !self.path.exists() {
            tracing::debug!("No store file at {:?}, starting empty", self.path);
            return Ok(StoreFile::default());
        }

        let file = File::open(&self.path)?;
        file.lock_shared()?;

        let mut contents = String::new();
        let read = std::io::BufReader::new(&file).read_to_string(&mut contents);
        let _ = file.unlock();
        read?;

        if contents.trim().is_empty() {
            return Ok(StoreFile::default());
        }

        // Unlike the config file, a corrupted store is not replaced with
        // defaults: the next save would overwrite every record.
        serde_json::from_str(&contents)
            .map_err(|e| Error::Store(format!("corrupted store file {:?}: {}", self.path, e)))
    }

    fn write_file(&self, data: &StoreFile) -> Result<()> {
        let parent = self
            .path
            .parent()
            .ok_or_else(|| Error::Store(format!("store path {:?} has no parent", self.path)))?;
        std::fs::create_dir_all(parent)?;

        let temp = NamedTempFile::new_in(parent)?;
        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            let contents = serde_json::to_string_pretty(data)?;
            writer.write_all(contents.as_bytes())?;
            writer.flush()?;
        }
        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|e| Error::Io(e.error))?;
        Ok(())
    }

    /// Load, modify and write back while holding the writer lock
    fn update<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut StoreFile) -> T,
    {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.lock_path())?;
        lock.lock_exclusive()?;

        let result = self.read_file().and_then(|mut data| {
            let out = f(&mut data);
            self.write_file(&data)?;
            Ok(out)
        });

        let _ = lock.unlock();
        result
    }
}

impl MedicineStore for JsonFileStore {
    fn load_all(&self) -> Result<Vec<Medicine>> {
        let mut medicines = self.read_file()?.medicines;
        sort_for_display(&mut medicines);
        tracing::debug!("Loaded {} medicines from {:?}", medicines.len(), self.path);
        Ok(medicines)
    }

    fn find_by_id(&self, id: MedicineId) -> Result<Option<Medicine>> {
        Ok(self.read_file()?.medicines.into_iter().find(|m| m.id == id))
    }

    fn save(&self, medicine: &Medicine) -> Result<()> {
        self.update(|data| {
            match data.medicines.iter_mut().find(|m| m.id == medicine.id) {
                Some(existing) => *existing = medicine.clone(),
                None => data.medicines.push(medicine.clone()),
            }
        })?;
        tracing::debug!(medicine_id = %medicine.id, "Saved medicine");
        Ok(())
    }

    fn delete(&self, id: MedicineId) -> Result<bool> {
        self.update(|data| {
            let before = data.medicines.len();
            data.medicines.retain(|m| m.id != id);
            data.medicines.len() != before
        })
    }
}
