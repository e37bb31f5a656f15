//! An JSON file-backed implementation of the [`RecordStore`][super::RecordStore] trait.
//!
//! Wraps a [`InMemoryRecordStore`][super::memory::InMemoryRecordStore] instance, persisting
//! updates to a JSON file on disk that can be reloaded across restarts.
use crate::error::StoreError;
use crate::record::{Record, RecordIdentity};
use crate::record_store::memory::InMemoryRecordStore;
use crate::record_store::RecordStore;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

const EMPTY_STATE: &[u8] = b"[]";

/// An file-backed record store. After each write a JSON file on disk is updated with the full
/// set of records. This file can be reloaded across restarts so record identities, and the
/// records behind them, survive the process.
///
/// A write only takes effect once it is on disk: if the state file can't be written the
/// in-memory change is undone and the error returned, so a retry repeats the whole write.
#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub struct FileRecordStore {
    record_store: InMemoryRecordStore,
    path: PathBuf,
    // Held across a mutation and its save, so a rollback never clobbers another writer.
    write_lock: Mutex<()>,
}

impl FileRecordStore {
    /// Load the store from the JSON record state at `path`. A missing file is created holding
    /// an empty state.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidJSON`] if the JSON state file is invalid.
    ///
    /// Returns [`StoreError::IO`] if the path can't be read, or can't be created when missing.
    pub async fn try_from_file(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let state = match tokio::fs::read(&path).await {
            Ok(state) => state,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                tracing::info!("no record state at {}, starting empty", path.display());
                tokio::fs::write(&path, EMPTY_STATE).await?;
                EMPTY_STATE.to_vec()
            }
            Err(err) => return Err(StoreError::IO(err)),
        };

        let records: Vec<Record> = serde_json::from_slice(&state)?;
        tracing::debug!("loaded {} records from {}", records.len(), path.display());
        Ok(Self {
            record_store: InMemoryRecordStore::from_records(records),
            path,
            write_lock: Mutex::default(),
        })
    }

    /// Write the current state of the store to its backing file.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidJSON`] if a record can't be serialized, or
    /// [`StoreError::IO`] if the file can't be written.
    pub async fn save(&self) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        self.write_state().await
    }

    async fn write_state(&self) -> Result<(), StoreError> {
        let state = serde_json::to_vec_pretty(&self.record_store.list().await?)?;
        tokio::fs::write(&self.path, state).await?;
        Ok(())
    }

    // Persist the mutation just applied to `identity`, or put `previous` back if that fails.
    async fn commit(
        &self,
        identity: &RecordIdentity,
        previous: Option<Record>,
    ) -> Result<(), StoreError> {
        if let Err(err) = self.write_state().await {
            tracing::warn!("could not persist record {identity}, reverting: {err}");
            self.record_store.restore(identity, previous).await;
            return Err(err);
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl RecordStore for FileRecordStore {
    async fn get(&self, identity: &RecordIdentity) -> Result<Option<Record>, StoreError> {
        self.record_store.get(identity).await
    }

    async fn create(&self, record: Record) -> Result<Record, StoreError> {
        let _guard = self.write_lock.lock().await;
        let record = self.record_store.create(record).await?;
        self.commit(&record.identity, None).await?;
        Ok(record)
    }

    async fn update(&self, record: Record) -> Result<Record, StoreError> {
        let _guard = self.write_lock.lock().await;
        let previous = self.record_store.get(&record.identity).await?;
        let record = self.record_store.update(record).await?;
        self.commit(&record.identity, previous).await?;
        Ok(record)
    }

    async fn delete(&self, identity: &RecordIdentity) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let previous = self.record_store.get(identity).await?;
        self.record_store.delete(identity).await?;
        self.commit(identity, previous).await
    }

    async fn list(&self) -> Result<Vec<Record>, StoreError> {
        self.record_store.list().await
    }
}
