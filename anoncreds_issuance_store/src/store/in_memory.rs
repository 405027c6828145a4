use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

use crate::{
    errors::error::{StoreError, StoreResult},
    store::{
        base_store::{record::Record, record_category::RecordCategory, BaseStore, StoreSession, StoreTransaction},
        record_tags::RecordTags,
    },
};

type RecordKey = (RecordCategory, String);

#[derive(Clone, Debug)]
struct StoredEntry {
    value: String,
    tags: RecordTags,
}

type RecordMap = HashMap<RecordKey, StoredEntry>;

/// Unencrypted in-process implementation of [`BaseStore`].
///
/// A transaction holds the map's write lock for its whole lifetime, so
/// writers are fully serialized; that subsumes the row-level `for_update`
/// exclusivity the trait surface carries for database-backed stores.
/// Sessions share the read lock and may run concurrently.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    records: Arc<RwLock<RecordMap>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BaseStore for InMemoryStore {
    async fn session(&self) -> StoreResult<Box<dyn StoreSession>> {
        Ok(Box::new(InMemorySession {
            records: Arc::clone(&self.records).read_owned().await,
        }))
    }

    async fn transaction(&self) -> StoreResult<Box<dyn StoreTransaction>> {
        Ok(Box::new(InMemoryTransaction {
            records: Arc::clone(&self.records).write_owned().await,
            undo: Vec::new(),
            committed: false,
        }))
    }
}

fn fetch_from(records: &RecordMap, category: RecordCategory, name: &str) -> Option<Record> {
    records
        .get(&(category, name.to_string()))
        .map(|entry| build_record(category, name, entry))
}

fn fetch_all_from(
    records: &RecordMap,
    category: RecordCategory,
    tag_filter: Option<&RecordTags>,
    limit: Option<usize>,
) -> Vec<Record> {
    let mut found: Vec<&RecordKey> = records
        .keys()
        .filter(|(cat, _)| *cat == category)
        .filter(|key| match tag_filter {
            Some(filter) => records[*key].tags.satisfies(filter),
            None => true,
        })
        .collect();
    found.sort();

    found
        .into_iter()
        .take(limit.unwrap_or(usize::MAX))
        .map(|key| build_record(category, &key.1, &records[key]))
        .collect()
}

fn build_record(category: RecordCategory, name: &str, entry: &StoredEntry) -> Record {
    Record::builder()
        .category(category)
        .name(name.to_string())
        .value(entry.value.clone())
        .tags(entry.tags.clone())
        .build()
}

struct InMemorySession {
    records: OwnedRwLockReadGuard<RecordMap>,
}

#[async_trait]
impl StoreSession for InMemorySession {
    async fn fetch(
        &mut self,
        category: RecordCategory,
        name: &str,
        _for_update: bool,
    ) -> StoreResult<Option<Record>> {
        Ok(fetch_from(&self.records, category, name))
    }

    async fn fetch_all(
        &mut self,
        category: RecordCategory,
        tag_filter: Option<&RecordTags>,
        limit: Option<usize>,
        _for_update: bool,
    ) -> StoreResult<Vec<Record>> {
        Ok(fetch_all_from(&self.records, category, tag_filter, limit))
    }
}

enum UndoOp {
    Remove(RecordKey),
    Restore(RecordKey, StoredEntry),
}

struct InMemoryTransaction {
    records: OwnedRwLockWriteGuard<RecordMap>,
    undo: Vec<UndoOp>,
    committed: bool,
}

#[async_trait]
impl StoreSession for InMemoryTransaction {
    async fn fetch(
        &mut self,
        category: RecordCategory,
        name: &str,
        _for_update: bool,
    ) -> StoreResult<Option<Record>> {
        Ok(fetch_from(&self.records, category, name))
    }

    async fn fetch_all(
        &mut self,
        category: RecordCategory,
        tag_filter: Option<&RecordTags>,
        limit: Option<usize>,
        _for_update: bool,
    ) -> StoreResult<Vec<Record>> {
        Ok(fetch_all_from(&self.records, category, tag_filter, limit))
    }
}

#[async_trait]
impl StoreTransaction for InMemoryTransaction {
    async fn insert(&mut self, record: Record) -> StoreResult<()> {
        let key = (record.category(), record.name().to_string());
        if self.records.contains_key(&key) {
            return Err(StoreError::duplicate_record(record.category(), record.name()));
        }
        self.undo.push(UndoOp::Remove(key.clone()));
        self.records.insert(
            key,
            StoredEntry {
                value: record.value().to_string(),
                tags: record.tags().clone(),
            },
        );
        Ok(())
    }

    async fn replace(&mut self, record: Record) -> StoreResult<()> {
        let key = (record.category(), record.name().to_string());
        let previous = self
            .records
            .get(&key)
            .cloned()
            .ok_or_else(|| StoreError::record_not_found(record.category(), record.name()))?;
        self.undo.push(UndoOp::Restore(key.clone(), previous));
        self.records.insert(
            key,
            StoredEntry {
                value: record.value().to_string(),
                tags: record.tags().clone(),
            },
        );
        Ok(())
    }

    async fn remove(&mut self, category: RecordCategory, name: &str) -> StoreResult<()> {
        let key = (category, name.to_string());
        let previous = self
            .records
            .remove(&key)
            .ok_or_else(|| StoreError::record_not_found(category, name))?;
        self.undo.push(UndoOp::Restore(key, previous));
        Ok(())
    }

    async fn commit(mut self: Box<Self>) -> StoreResult<()> {
        trace!("InMemoryTransaction::commit >>> {} staged op(s)", self.undo.len());
        self.committed = true;
        Ok(())
    }
}

impl Drop for InMemoryTransaction {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        if !self.undo.is_empty() {
            trace!(
                "InMemoryTransaction::drop >>> rolling back {} op(s)",
                self.undo.len()
            );
        }
        for op in self.undo.drain(..).rev() {
            match op {
                UndoOp::Remove(key) => {
                    self.records.remove(&key);
                }
                UndoOp::Restore(key, entry) => {
                    self.records.insert(key, entry);
                }
            }
        }
    }
}
