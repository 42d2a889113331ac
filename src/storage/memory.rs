//! Generic keyed in-memory record storage
//!
//! Every store in the service keeps its records in an [`InMemoryStore`]. Each
//! public method takes the lock exactly once, so every operation is atomic with
//! respect to concurrent callers.

use crate::error::{MatchmakingError, Result};
use crate::types::{DefaultSetting, MatchDefinition, MatchPair, UserRating};
use crate::utils::current_timestamp;
use chrono::{DateTime, Utc};
use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use uuid::Uuid;

/// A record that can live in an [`InMemoryStore`]
pub trait Record: Clone + Send + Sync + 'static {
    /// Human readable record kind used in errors
    const KIND: &'static str;

    fn id(&self) -> Uuid;

    fn created_at(&self) -> DateTime<Utc>;

    /// Apply store-managed timestamps
    fn stamp(&mut self, created_at: DateTime<Utc>, modified_at: DateTime<Utc>);
}

impl Record for UserRating {
    const KIND: &'static str = "UserRating";

    fn id(&self) -> Uuid {
        self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn stamp(&mut self, created_at: DateTime<Utc>, modified_at: DateTime<Utc>) {
        self.created_at = created_at;
        self.modified_at = modified_at;
    }
}

impl Record for MatchDefinition {
    const KIND: &'static str = "MatchDefinition";

    fn id(&self) -> Uuid {
        self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn stamp(&mut self, created_at: DateTime<Utc>, modified_at: DateTime<Utc>) {
        self.created_at = created_at;
        self.modified_at = modified_at;
    }
}

impl Record for MatchPair {
    const KIND: &'static str = "MatchPair";

    fn id(&self) -> Uuid {
        self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    // Pairs are append-only and carry no modification time
    fn stamp(&mut self, created_at: DateTime<Utc>, _modified_at: DateTime<Utc>) {
        self.created_at = created_at;
    }
}

impl Record for DefaultSetting {
    const KIND: &'static str = "DefaultSetting";

    fn id(&self) -> Uuid {
        self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn stamp(&mut self, created_at: DateTime<Utc>, modified_at: DateTime<Utc>) {
        self.created_at = created_at;
        self.modified_at = modified_at;
    }
}

/// Stored record plus its insertion sequence number
#[derive(Debug, Clone)]
struct Entry<T> {
    sequence: u64,
    record: T,
}

/// Keyed storage with add/update/query/delete semantics
#[derive(Debug)]
pub struct InMemoryStore<T: Record> {
    records: RwLock<HashMap<Uuid, Entry<T>>>,
    next_sequence: AtomicU64,
}

impl<T: Record> Default for InMemoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Record> InMemoryStore<T> {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            next_sequence: AtomicU64::new(0),
        }
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, HashMap<Uuid, Entry<T>>>> {
        self.records
            .read()
            .map_err(|_| MatchmakingError::lock_poisoned(T::KIND).into())
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<Uuid, Entry<T>>>> {
        self.records
            .write()
            .map_err(|_| MatchmakingError::lock_poisoned(T::KIND).into())
    }

    fn entry_for(&self, mut record: T) -> Entry<T> {
        let now = current_timestamp();
        record.stamp(now, now);
        Entry {
            sequence: self.next_sequence.fetch_add(1, Ordering::Relaxed),
            record,
        }
    }

    /// Insert a new record, stamping its timestamps
    pub fn add(&self, record: T) -> Result<Uuid> {
        let id = record.id();
        let mut records = self.write()?;

        if records.contains_key(&id) {
            return Err(MatchmakingError::DuplicateRecord {
                kind: T::KIND.to_string(),
                id: id.to_string(),
            }
            .into());
        }

        records.insert(id, self.entry_for(record));
        Ok(id)
    }

    /// Replace an existing record, keeping its creation time
    pub fn update(&self, mut record: T) -> Result<T> {
        let id = record.id();
        let mut records = self.write()?;

        let existing = records
            .get_mut(&id)
            .ok_or_else(|| MatchmakingError::RecordNotFound {
                kind: T::KIND.to_string(),
                id: id.to_string(),
            })?;

        record.stamp(existing.record.created_at(), current_timestamp());
        existing.record = record.clone();
        Ok(record)
    }

    /// Return the earliest-inserted record matching `predicate`, inserting
    /// `record` when none does. The flag is true when `record` was inserted.
    pub fn find_or_add<P>(&self, predicate: P, record: T) -> Result<(Uuid, bool)>
    where
        P: Fn(&T) -> bool,
    {
        let mut records = self.write()?;

        let existing = records
            .values()
            .filter(|entry| predicate(&entry.record))
            .min_by_key(|entry| entry.sequence)
            .map(|entry| entry.record.id());

        if let Some(id) = existing {
            return Ok((id, false));
        }

        let id = record.id();
        records.insert(id, self.entry_for(record));
        Ok((id, true))
    }

    /// Update the earliest record matching `predicate` in place, or insert the
    /// record produced by `create` when none matches
    pub fn add_or_update_where<P, C, U>(&self, predicate: P, create: C, apply: U) -> Result<T>
    where
        P: Fn(&T) -> bool,
        C: FnOnce() -> T,
        U: FnOnce(&mut T),
    {
        let mut records = self.write()?;

        let existing = records
            .values()
            .filter(|entry| predicate(&entry.record))
            .min_by_key(|entry| entry.sequence)
            .map(|entry| entry.record.id());

        match existing.and_then(|id| records.get_mut(&id)) {
            Some(entry) => {
                apply(&mut entry.record);
                let created_at = entry.record.created_at();
                entry.record.stamp(created_at, current_timestamp());
                Ok(entry.record.clone())
            }
            None => {
                let entry = self.entry_for(create());
                let record = entry.record.clone();
                records.insert(record.id(), entry);
                Ok(record)
            }
        }
    }

    pub fn get(&self, id: Uuid) -> Result<Option<T>> {
        Ok(self.read()?.get(&id).map(|entry| entry.record.clone()))
    }

    /// Earliest-inserted record matching `predicate`
    pub fn find_first<P>(&self, predicate: P) -> Result<Option<T>>
    where
        P: Fn(&T) -> bool,
    {
        let records = self.read()?;

        Ok(records
            .values()
            .filter(|entry| predicate(&entry.record))
            .min_by_key(|entry| entry.sequence)
            .map(|entry| entry.record.clone()))
    }

    /// All matching records in insertion order
    pub fn query<P>(&self, predicate: P) -> Result<Vec<T>>
    where
        P: Fn(&T) -> bool,
    {
        let records = self.read()?;

        let mut matching: Vec<&Entry<T>> = records
            .values()
            .filter(|entry| predicate(&entry.record))
            .collect();
        matching.sort_by_key(|entry| entry.sequence);

        Ok(matching.into_iter().map(|entry| entry.record.clone()).collect())
    }

    /// All matching records, most recently created first. Records created in
    /// the same instant are ordered by insertion.
    pub fn query_newest_first<P>(&self, predicate: P) -> Result<Vec<T>>
    where
        P: Fn(&T) -> bool,
    {
        let records = self.read()?;

        let mut matching: Vec<&Entry<T>> = records
            .values()
            .filter(|entry| predicate(&entry.record))
            .collect();
        matching.sort_by_key(|entry| Reverse((entry.record.created_at(), entry.sequence)));

        Ok(matching.into_iter().map(|entry| entry.record.clone()).collect())
    }

    pub fn all(&self) -> Result<Vec<T>> {
        self.query(|_| true)
    }

    pub fn delete(&self, id: Uuid) -> Result<bool> {
        Ok(self.write()?.remove(&id).is_some())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}
