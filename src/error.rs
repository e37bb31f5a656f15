//! Error types.

use crate::record::RecordIdentity;
use std::time::Duration;
use trust_dns_proto::error::ProtoError;
use trust_dns_proto::rr::RecordType;

/// Error enumerates the possible acmehook error states.
///
/// None of these are fatal to the process: each is surfaced to the caller of the operation that
/// produced it, and the caller owns any retry policy.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Returned by [`Reconciler::present`][crate::solver::Reconciler::present] when the
    /// challenge's provider configuration can't be decoded. No record is touched.
    #[error("could not load provider specific config: {0}")]
    ConfigDecode(#[source] serde_json::Error),

    /// Returned when the [`RecordStore`][crate::record_store::RecordStore] fails an operation.
    #[error("could not {op} record {identity}")]
    Store {
        op: &'static str,
        identity: RecordIdentity,
        #[source]
        source: StoreError,
    },

    /// Returned when the [`RecordStore`][crate::record_store::RecordStore] can't be listed.
    #[error("could not list records")]
    StoreList(#[source] StoreError),

    /// Returned when a persisted record store can't be loaded at startup.
    #[error("could not load record store state")]
    StoreLoad(#[source] StoreError),

    /// Returned when an operation doesn't complete within its deadline.
    #[error("deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),

    /// Returned when the process-wide stop signal fires while an operation is in flight.
    #[error("operation cancelled")]
    Cancelled,

    /// Returned by the DNS [`Handler`][crate::dns::handlers::Handler] for a query type it does
    /// not answer. Mapped to a `SERVFAIL` response.
    #[error("unimplemented record type {0}")]
    UnsupportedQueryType(RecordType),

    /// Returned when a generic IO error occurs.
    #[error("an IO error occurred")]
    IO(#[from] std::io::Error),

    /// Returned when [trying to load a `Config`][crate::config::Config::try_from_file] fails due
    /// to invalid JSON content.
    #[error("invalid JSON")]
    InvalidJSON(#[from] serde_json::Error),

    /// Returned when the DNS responder encounters a generic DNS protocol error.
    #[error("DNS error")]
    DNSError(#[from] ProtoError),
}

/// StoreError enumerates the failures of a [`RecordStore`][crate::record_store::RecordStore].
#[derive(thiserror::Error, Debug)]
#[allow(clippy::module_name_repetitions)]
pub enum StoreError {
    #[error("record {0} not found")]
    NotFound(RecordIdentity),

    #[error("record {0} already exists")]
    AlreadyExists(RecordIdentity),

    /// Returned when an update carries a stale `resource_version`, i.e. another writer updated
    /// the same record first.
    #[error("conflict updating {identity}: expected version {expected}, found {found}")]
    Conflict {
        identity: RecordIdentity,
        expected: u64,
        found: u64,
    },

    #[error("an IO error occurred")]
    IO(#[from] std::io::Error),

    #[error("invalid JSON")]
    InvalidJSON(#[from] serde_json::Error),
}

impl StoreError {
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

impl Error {
    pub(crate) fn store(op: &'static str, identity: &RecordIdentity, source: StoreError) -> Self {
        Error::Store {
            op,
            identity: identity.clone(),
            source,
        }
    }
}
