//! Challenge record storage.
//!
//! The [`RecordStore`] trait is the capability the [solver][crate::solver] publishes records
//! through. Real deployments back it with an eventually-consistent API whose contents are
//! mirrored into DNS by a separate [sync loop][crate::sync]; each stored [`Record`] is addressed
//! by its [`RecordIdentity`] and guarded by an optimistic `resource_version`.
//!
//! Two implementations are provided, [`memory::InMemoryRecordStore`] and
//! [`file::FileRecordStore`]. The former is not durable across restarts. The latter will write
//! its state to disk for each update and load this state again on startup.

use crate::error::StoreError;
use crate::record::{Endpoint, Record, RecordIdentity};
use std::sync::Arc;

pub mod file;
pub mod memory;

#[allow(clippy::module_name_repetitions)]
pub use file::FileRecordStore;
#[allow(clippy::module_name_repetitions)]
pub use memory::InMemoryRecordStore;

/// `DynRecordStore` is a type alias for a [`RecordStore`] shared between the solver and the sync
/// loop. Implementations handle their own locking.
#[allow(clippy::module_name_repetitions)]
pub type DynRecordStore = Arc<dyn RecordStore>;

/// What [`RecordStore::create_or_patch`] did to reach the desired state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Created,
    Updated,
    /// The record already held the desired endpoints.
    Unchanged,
}

/// An async trait describing a store of [`Record`]s keyed by [`RecordIdentity`].
#[async_trait::async_trait]
#[allow(clippy::module_name_repetitions)]
pub trait RecordStore: Send + Sync {
    /// Get the record at `identity` (if any).
    async fn get(&self, identity: &RecordIdentity) -> Result<Option<Record>, StoreError>;

    /// Create a new record, returning it with its assigned `resource_version`.
    ///
    /// Fails with [`StoreError::AlreadyExists`] if a record exists at the same identity.
    async fn create(&self, record: Record) -> Result<Record, StoreError>;

    /// Replace an existing record.
    ///
    /// Fails with [`StoreError::Conflict`] if `record.resource_version` is not the stored
    /// version, and with [`StoreError::NotFound`] if there is nothing to replace.
    async fn update(&self, record: Record) -> Result<Record, StoreError>;

    /// Delete the record at `identity`. Fails with [`StoreError::NotFound`] if there is none.
    async fn delete(&self, identity: &RecordIdentity) -> Result<(), StoreError>;

    /// List every stored record.
    async fn list(&self) -> Result<Vec<Record>, StoreError>;

    /// Make the record at `identity` hold exactly `endpoints`, creating it if absent.
    ///
    /// Re-asserting content the record already holds doesn't write. Concurrent writers to the
    /// same identity race on `resource_version`; the loser gets [`StoreError::Conflict`].
    async fn create_or_patch(
        &self,
        identity: &RecordIdentity,
        endpoints: Vec<Endpoint>,
    ) -> Result<Outcome, StoreError> {
        match self.get(identity).await? {
            None => {
                self.create(Record::new(identity.clone(), endpoints))
                    .await?;
                Ok(Outcome::Created)
            }
            Some(existing) if existing.endpoints == endpoints => Ok(Outcome::Unchanged),
            Some(mut existing) => {
                existing.endpoints = endpoints;
                self.update(existing).await?;
                Ok(Outcome::Updated)
            }
        }
    }
}
