//! Write-through record collection
//!
//! Holds one collection in memory, keyed by record id, and mirrors every
//! successful mutation to its JSON file. Each mutation is applied to a copy
//! and only swapped in once the file write succeeded, so a failed write
//! leaves both memory and disk unchanged.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::RwLock;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use uuid::Uuid;

use super::file_io::{read_json, write_json_atomic};
use crate::error::{LedgerError, LedgerResult};
use crate::models::{EncryptableRecord, RecordKind, SensitiveRecord, StoredFields, UserId};

#[derive(Serialize, Deserialize)]
struct CollectionFile<T> {
    #[serde(default = "Vec::new")]
    records: Vec<T>,
}

impl<T> Default for CollectionFile<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
        }
    }
}

pub(crate) struct Collection<T> {
    path: Option<PathBuf>,
    rows: RwLock<BTreeMap<Uuid, T>>,
}

impl<T> Collection<T>
where
    T: EncryptableRecord + Clone + Serialize + DeserializeOwned,
{
    /// Load the collection from its JSON file
    pub(crate) fn load(path: PathBuf) -> LedgerResult<Self> {
        let file: CollectionFile<T> = read_json(&path)?;
        let rows = file
            .records
            .into_iter()
            .map(|record| (record.record_id(), record))
            .collect();

        Ok(Self {
            path: Some(path),
            rows: RwLock::new(rows),
        })
    }

    /// A collection that is never written to disk
    pub(crate) fn in_memory() -> Self {
        Self {
            path: None,
            rows: RwLock::new(BTreeMap::new()),
        }
    }

    fn read<R>(&self, f: impl FnOnce(&BTreeMap<Uuid, T>) -> R) -> LedgerResult<R> {
        let rows = self
            .rows
            .read()
            .map_err(|e| LedgerError::Storage(format!("Failed to acquire read lock: {}", e)))?;
        Ok(f(&rows))
    }

    fn mutate<R>(
        &self,
        f: impl FnOnce(&mut BTreeMap<Uuid, T>) -> LedgerResult<R>,
    ) -> LedgerResult<R> {
        let mut rows = self
            .rows
            .write()
            .map_err(|e| LedgerError::Storage(format!("Failed to acquire write lock: {}", e)))?;

        let mut staged = rows.clone();
        let result = f(&mut staged)?;

        if let Some(path) = &self.path {
            let file = CollectionFile {
                records: staged.values().cloned().collect(),
            };
            write_json_atomic(path, &file)?;
        }

        *rows = staged;
        Ok(result)
    }

    pub(crate) fn insert(&self, record: &T) -> LedgerResult<()> {
        self.mutate(|rows| {
            let id = record.record_id();
            if rows.contains_key(&id) {
                return Err(LedgerError::Storage(format!(
                    "{} {} already exists",
                    T::KIND,
                    id
                )));
            }
            rows.insert(id, record.clone());
            Ok(())
        })
    }

    pub(crate) fn update(&self, record: &T) -> LedgerResult<()> {
        self.mutate(|rows| {
            let slot = rows
                .get_mut(&record.record_id())
                .filter(|existing| existing.owner() == record.owner())
                .ok_or_else(|| not_found::<T>(record.record_id()))?;
            *slot = record.clone();
            Ok(())
        })
    }

    pub(crate) fn get(&self, user_id: UserId, id: Uuid) -> LedgerResult<Option<T>> {
        self.read(|rows| {
            rows.get(&id)
                .filter(|record| record.owner() == user_id)
                .cloned()
        })
    }

    pub(crate) fn list(&self, user_id: UserId) -> LedgerResult<Vec<T>> {
        self.read(|rows| {
            rows.values()
                .filter(|record| record.owner() == user_id)
                .cloned()
                .collect()
        })
    }

    pub(crate) fn delete(&self, user_id: UserId, id: Uuid) -> LedgerResult<bool> {
        let owned = self.get(user_id, id)?.is_some();
        if !owned {
            return Ok(false);
        }
        self.mutate(|rows| Ok(rows.remove(&id).is_some()))
    }

    /// Apply `f` to every record of `user_id` matching `pred`; returns how many changed
    pub(crate) fn modify_where(
        &self,
        user_id: UserId,
        pred: impl Fn(&T) -> bool,
        f: impl Fn(&mut T),
    ) -> LedgerResult<usize> {
        let matching = self.read(|rows| {
            rows.values()
                .filter(|record| record.owner() == user_id && pred(record))
                .count()
        })?;
        if matching == 0 {
            return Ok(0);
        }

        self.mutate(|rows| {
            let mut changed = 0;
            for record in rows.values_mut() {
                if record.owner() == user_id && pred(record) {
                    f(record);
                    record.touch();
                    changed += 1;
                }
            }
            Ok(changed)
        })
    }

    pub(crate) fn select_by_encryption(
        &self,
        user_id: UserId,
        is_encrypted: bool,
    ) -> LedgerResult<Vec<SensitiveRecord>> {
        self.read(|rows| {
            rows.values()
                .filter(|record| {
                    record.owner() == user_id && record.fields().is_encrypted == is_encrypted
                })
                .map(SensitiveRecord::of)
                .collect()
        })
    }

    pub(crate) fn write_fields(
        &self,
        user_id: UserId,
        id: Uuid,
        fields: &StoredFields,
    ) -> LedgerResult<()> {
        self.mutate(|rows| {
            let record = rows
                .get_mut(&id)
                .filter(|record| record.owner() == user_id)
                .ok_or_else(|| not_found::<T>(id))?;
            *record.fields_mut() = fields.clone();
            record.touch();
            Ok(())
        })
    }
}

fn not_found<T: EncryptableRecord>(id: Uuid) -> LedgerError {
    match T::KIND {
        RecordKind::Transaction => LedgerError::transaction_not_found(id.to_string()),
        RecordKind::Recurring => LedgerError::recurring_not_found(id.to_string()),
    }
}
