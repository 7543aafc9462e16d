// src/store.rs
//! Key-value blob store. Each collection lives under one fixed key and is
//! always read and rewritten as a whole.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tempfile::NamedTempFile;
use tracing::{debug, error, info, warn};

use crate::auth;
use crate::error::StoreError;
use crate::records::Employee;
use crate::settings::SystemSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Employees,
    Attendance,
    Requests,
    Tasks,
    Payroll,
    SystemSettings,
}

impl Collection {
    pub const ALL: [Collection; 6] = [
        Collection::Employees,
        Collection::Attendance,
        Collection::Requests,
        Collection::Tasks,
        Collection::Payroll,
        Collection::SystemSettings,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Collection::Employees => "employees",
            Collection::Attendance => "attendance",
            Collection::Requests => "requests",
            Collection::Tasks => "tasks",
            Collection::Payroll => "payroll",
            Collection::SystemSettings => "systemSettings",
        }
    }

    /// File name of the bundled seed document for this collection.
    pub fn seed_file(self) -> &'static str {
        match self {
            Collection::Employees => "employees.json",
            Collection::Attendance => "attendance.json",
            Collection::Requests => "requests.json",
            Collection::Tasks => "tasks.json",
            Collection::Payroll => "payroll.json",
            Collection::SystemSettings => "settings.json",
        }
    }
}

pub trait Repository {
    fn get(&self, collection: Collection) -> Result<Option<Value>, StoreError>;
    fn put(&mut self, collection: Collection, value: Value) -> Result<(), StoreError>;

    /// Writes every collection in `batch` or, on failure, puts back the ones
    /// already written and returns the error.
    fn put_many(&mut self, batch: Vec<(Collection, Value)>) -> Result<(), StoreError> {
        let mut pending = Vec::with_capacity(batch.len());
        for (collection, value) in batch {
            pending.push((collection, self.get(collection)?, value));
        }

        let mut written = Vec::with_capacity(pending.len());
        for (collection, before, value) in pending {
            if let Err(e) = self.put(collection, value) {
                restore(self, written);
                return Err(e);
            }
            written.push((collection, before));
        }
        Ok(())
    }
}

fn restore<R: Repository + ?Sized>(repo: &mut R, written: Vec<(Collection, Option<Value>)>) {
    for (collection, before) in written.into_iter().rev() {
        let value = match before {
            Some(value) => value,
            None => match empty_value(collection) {
                Ok(value) => value,
                Err(e) => {
                    error!("Cannot roll back '{}': {}", collection.key(), e);
                    continue;
                }
            },
        };
        match repo.put(collection, value) {
            Ok(()) => warn!("Rolled back '{}' after a failed batch write", collection.key()),
            Err(e) => error!("Rollback of '{}' failed: {}", collection.key(), e),
        }
    }
}

// --- Typed helpers ---

pub fn load_all<T, R>(repo: &R, collection: Collection) -> Result<Vec<T>, StoreError>
where
    T: DeserializeOwned,
    R: Repository + ?Sized,
{
    match repo.get(collection)? {
        None => Ok(Vec::new()),
        Some(value @ Value::Array(_)) => {
            serde_json::from_value(value).map_err(|e| StoreError::Malformed {
                collection: collection.key().to_string(),
                detail: e.to_string(),
            })
        }
        Some(other) => Err(StoreError::Malformed {
            collection: collection.key().to_string(),
            detail: format!("expected an array, found {}", json_kind(&other)),
        }),
    }
}

pub fn save_all<T, R>(repo: &mut R, collection: Collection, records: &[T]) -> Result<(), StoreError>
where
    T: Serialize,
    R: Repository + ?Sized,
{
    let value = serde_json::to_value(records)?;
    repo.put(collection, value)?;
    debug!("Wrote {} record(s) to '{}'", records.len(), collection.key());
    Ok(())
}

/// Serializes `records` as one entry of a `put_many` batch.
pub fn encode<T: Serialize>(collection: Collection, records: &[T]) -> Result<(Collection, Value), StoreError> {
    Ok((collection, serde_json::to_value(records)?))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// --- In-memory store ---

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    blobs: HashMap<Collection, Value>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Repository for MemoryStore {
    fn get(&self, collection: Collection) -> Result<Option<Value>, StoreError> {
        Ok(self.blobs.get(&collection).cloned())
    }

    fn put(&mut self, collection: Collection, value: Value) -> Result<(), StoreError> {
        self.blobs.insert(collection, value);
        Ok(())
    }
}

// --- JSON file store ---

/// One `<key>.json` file per collection inside `dir`.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        info!("Using JSON file store at {}", dir.display());
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, collection: Collection) -> PathBuf {
        self.dir.join(format!("{}.json", collection.key()))
    }

    // Fully written and synced temp file in the store directory, not yet in place.
    fn stage(&self, value: &Value) -> Result<NamedTempFile, StoreError> {
        let json_string = serde_json::to_string_pretty(value)?;
        let mut temp_file = NamedTempFile::new_in(&self.dir)?;
        temp_file.write_all(json_string.as_bytes())?;
        temp_file.as_file().sync_all()?;
        Ok(temp_file)
    }
}

impl Repository for JsonFileStore {
    fn get(&self, collection: Collection) -> Result<Option<Value>, StoreError> {
        let path = self.path_for(collection);
        if !path.exists() {
            return Ok(None);
        }
        let json_string = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&json_string)?))
    }

    // Written to a temp file in the same directory, then renamed over the target.
    fn put(&mut self, collection: Collection, value: Value) -> Result<(), StoreError> {
        let path = self.path_for(collection);
        let temp_file = self.stage(&value)?;
        temp_file.persist(&path).map_err(|e| {
            error!("Failed to move collection '{}' into place: {}", collection.key(), e);
            StoreError::Io(e.error)
        })?;
        Ok(())
    }

    // Every file is staged before any rename, so a serialization or disk-full
    // failure leaves all collections untouched.
    fn put_many(&mut self, batch: Vec<(Collection, Value)>) -> Result<(), StoreError> {
        let mut staged = Vec::with_capacity(batch.len());
        for (collection, value) in batch {
            let before = self.get(collection)?;
            staged.push((collection, before, self.stage(&value)?));
        }

        let mut written = Vec::with_capacity(staged.len());
        for (collection, before, temp_file) in staged {
            if let Err(e) = temp_file.persist(self.path_for(collection)) {
                error!("Failed to move collection '{}' into place: {}", collection.key(), e);
                restore(self, written);
                return Err(StoreError::Io(e.error));
            }
            written.push((collection, before));
        }
        Ok(())
    }
}

// --- Bootstrap ---

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BootstrapReport {
    pub seeded: Vec<Collection>,
    pub defaulted: Vec<Collection>,
    pub already_present: Vec<Collection>,
    pub passwords_hashed: usize,
}

/// Seeds every missing collection from `seed_dir`. Seed problems are logged and
/// replaced by empty data (or default settings); only a failing write is an error.
pub fn bootstrap<R: Repository + ?Sized>(
    repo: &mut R,
    seed_dir: &Path,
) -> Result<BootstrapReport, StoreError> {
    let mut report = BootstrapReport::default();

    for collection in Collection::ALL {
        match repo.get(collection) {
            Ok(Some(value)) => {
                if collection == Collection::Employees {
                    report.passwords_hashed += upgrade_stored_passwords(repo, value)?;
                }
                report.already_present.push(collection);
                continue;
            }
            Ok(None) => {}
            Err(e) => {
                warn!(
                    "Collection '{}' could not be read ({}); leaving it untouched",
                    collection.key(),
                    e
                );
                report.already_present.push(collection);
                continue;
            }
        }

        let seed_path = seed_dir.join(collection.seed_file());
        let value = match read_seed(&seed_path, collection) {
            Ok(value) => {
                report.seeded.push(collection);
                value
            }
            Err(e) => {
                warn!(
                    "Seed for '{}' unavailable ({}); starting empty",
                    collection.key(),
                    e
                );
                report.defaulted.push(collection);
                empty_value(collection)?
            }
        };

        let value = match collection {
            Collection::Employees => {
                let mut employees: Vec<Employee> = match serde_json::from_value(value) {
                    Ok(employees) => employees,
                    Err(e) => {
                        warn!("Seed employees are malformed ({}); starting empty", e);
                        Vec::new()
                    }
                };
                report.passwords_hashed += auth::upgrade_legacy_passwords(&mut employees);
                serde_json::to_value(employees)?
            }
            Collection::SystemSettings => {
                let settings = SystemSettings::merged_with_defaults(Some(value)).unwrap_or_else(|e| {
                    warn!("Seed settings are malformed ({}); using defaults", e);
                    SystemSettings::default()
                });
                serde_json::to_value(settings)?
            }
            _ => value,
        };

        repo.put(collection, value)?;
    }

    info!(
        "Bootstrap finished: {} seeded, {} defaulted, {} already present, {} password(s) hashed",
        report.seeded.len(),
        report.defaulted.len(),
        report.already_present.len(),
        report.passwords_hashed
    );
    Ok(report)
}

// Rewrites the stored employees only when a plaintext password was found.
fn upgrade_stored_passwords<R: Repository + ?Sized>(repo: &mut R, value: Value) -> Result<usize, StoreError> {
    let mut employees: Vec<Employee> = match serde_json::from_value(value) {
        Ok(employees) => employees,
        Err(e) => {
            warn!("Stored employees are malformed ({}); leaving them untouched", e);
            return Ok(0);
        }
    };
    let had_plaintext = employees.iter().any(|e| e.password.is_some());
    let hashed = auth::upgrade_legacy_passwords(&mut employees);
    if had_plaintext {
        save_all(repo, Collection::Employees, &employees)?;
        info!("Hashed {} stored plaintext password(s)", hashed);
    }
    Ok(hashed)
}

fn read_seed(path: &Path, collection: Collection) -> Result<Value, StoreError> {
    let json_string = fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&json_string)?;
    let expected_array = collection != Collection::SystemSettings;
    if expected_array != value.is_array() {
        return Err(StoreError::Malformed {
            collection: collection.key().to_string(),
            detail: format!("seed file holds {}", json_kind(&value)),
        });
    }
    Ok(value)
}

fn empty_value(collection: Collection) -> Result<Value, StoreError> {
    match collection {
        Collection::SystemSettings => Ok(serde_json::to_value(SystemSettings::default())?),
        _ => Ok(Value::Array(Vec::new())),
    }
}
