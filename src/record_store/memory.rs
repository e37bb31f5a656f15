use crate::error::StoreError;
use crate::record::{Record, RecordIdentity};
use crate::record_store::RecordStore;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default, Debug)]
pub struct InMemoryRecordStore {
    inner: RwLock<Inner>,
}

#[derive(Default, Debug)]
struct Inner {
    records: HashMap<RecordIdentity, Record>,
    last_version: u64,
}

impl Inner {
    fn next_version(&mut self) -> u64 {
        self.last_version += 1;
        self.last_version
    }
}

impl InMemoryRecordStore {
    /// Build a store pre-populated with `records`, keeping their versions.
    #[must_use]
    pub fn from_records(records: Vec<Record>) -> Self {
        let last_version = records
            .iter()
            .map(|r| r.resource_version)
            .max()
            .unwrap_or_default();
        let records = records
            .into_iter()
            .map(|r| (r.identity.clone(), r))
            .collect();
        Self {
            inner: RwLock::new(Inner {
                records,
                last_version,
            }),
        }
    }

    /// Put `identity` back to `previous` verbatim, version included. `None` removes it.
    pub(crate) async fn restore(&self, identity: &RecordIdentity, previous: Option<Record>) {
        let mut inner = self.inner.write().await;
        match previous {
            Some(record) => inner.records.insert(identity.clone(), record),
            None => inner.records.remove(identity),
        };
    }
}

#[async_trait::async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn get(&self, identity: &RecordIdentity) -> Result<Option<Record>, StoreError> {
        Ok(self.inner.read().await.records.get(identity).cloned())
    }

    async fn create(&self, mut record: Record) -> Result<Record, StoreError> {
        let mut inner = self.inner.write().await;
        if inner.records.contains_key(&record.identity) {
            return Err(StoreError::AlreadyExists(record.identity));
        }
        record.resource_version = inner.next_version();
        inner
            .records
            .insert(record.identity.clone(), record.clone());
        Ok(record)
    }

    async fn update(&self, mut record: Record) -> Result<Record, StoreError> {
        let mut inner = self.inner.write().await;
        let found = match inner.records.get(&record.identity) {
            None => return Err(StoreError::NotFound(record.identity)),
            Some(existing) => existing.resource_version,
        };
        if found != record.resource_version {
            return Err(StoreError::Conflict {
                identity: record.identity,
                expected: record.resource_version,
                found,
            });
        }
        record.resource_version = inner.next_version();
        inner
            .records
            .insert(record.identity.clone(), record.clone());
        Ok(record)
    }

    async fn delete(&self, identity: &RecordIdentity) -> Result<(), StoreError> {
        match self.inner.write().await.records.remove(identity) {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound(identity.clone())),
        }
    }

    async fn list(&self) -> Result<Vec<Record>, StoreError> {
        let mut records: Vec<Record> = self
            .inner
            .read()
            .await
            .records
            .values()
            .cloned()
            .collect();
        records.sort_by(|a, b| a.identity.cmp(&b.identity));
        Ok(records)
    }
}
