//! Persistence port for [`PhotStat`] records.
//!
//! The engine never talks to a database directly: it reads and writes records through the
//! [`PhotStatStore`] trait, which guarantees **at most one record per object** (`upsert`
//! replaces). [`InMemoryPhotStatStore`] is the reference implementation used by tests and by
//! embedders that keep statistics in memory.
use std::collections::HashMap;

use ahash::RandomState;
use parking_lot::RwLock;

use crate::constants::ObjectId;
use crate::phot_stat::PhotStat;
use crate::photstat_errors::PhotStatError;

/// Keyed storage of one [`PhotStat`] per object.
///
/// Implementations must be safe to share between threads; serialization of concurrent updates
/// to the same object is the engine's job, not the store's.
pub trait PhotStatStore: Send + Sync {
    /// A copy of the record of `obj_id`, if any.
    fn get(&self, obj_id: &ObjectId) -> Result<Option<PhotStat>, PhotStatError>;

    /// Insert or replace the record of `stat.obj_id`.
    fn upsert(&self, stat: PhotStat) -> Result<(), PhotStatError>;

    /// Remove the record of `obj_id`, returning it if it existed.
    fn remove(&self, obj_id: &ObjectId) -> Result<Option<PhotStat>, PhotStatError>;

    fn contains(&self, obj_id: &ObjectId) -> Result<bool, PhotStatError> {
        Ok(self.get(obj_id)?.is_some())
    }

    /// Identifiers of every stored record.
    fn object_ids(&self) -> Result<Vec<ObjectId>, PhotStatError>;
}

/// [`PhotStatStore`] backed by a hash map behind a read/write lock.
#[derive(Debug, Default)]
pub struct InMemoryPhotStatStore {
    records: RwLock<HashMap<ObjectId, PhotStat, RandomState>>,
}

impl InMemoryPhotStatStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl PhotStatStore for InMemoryPhotStatStore {
    fn get(&self, obj_id: &ObjectId) -> Result<Option<PhotStat>, PhotStatError> {
        Ok(self.records.read().get(obj_id).cloned())
    }

    fn upsert(&self, stat: PhotStat) -> Result<(), PhotStatError> {
        self.records.write().insert(stat.obj_id.clone(), stat);
        Ok(())
    }

    fn remove(&self, obj_id: &ObjectId) -> Result<Option<PhotStat>, PhotStatError> {
        Ok(self.records.write().remove(obj_id))
    }

    fn contains(&self, obj_id: &ObjectId) -> Result<bool, PhotStatError> {
        Ok(self.records.read().contains_key(obj_id))
    }

    fn object_ids(&self) -> Result<Vec<ObjectId>, PhotStatError> {
        let mut ids: Vec<ObjectId> = self.records.read().keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}
