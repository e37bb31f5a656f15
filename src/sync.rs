//! Mirroring the record store into the DNS responder.
//!
//! [`SyncLoop`] periodically lists the store, plans the difference against the responder's
//! [`Registry`] and applies it as one [`Changes`] batch. The responder is therefore only
//! eventually consistent with the store: a record becomes resolvable on the first pass after it
//! is written.

use crate::dns::{Changes, Registry};
use crate::error::Error;
use crate::record::{normalize_dns_name, Endpoint, EndpointKey};
use crate::record_store::DynRecordStore;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use trust_dns_proto::rr::RecordType;

const MANAGED_RECORD_TYPES: [RecordType; 4] = [
    RecordType::A,
    RecordType::AAAA,
    RecordType::CNAME,
    RecordType::TXT,
];

/// Restricts which names are mirrored. An empty filter accepts every name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomainFilter {
    domains: Vec<String>,
}

impl DomainFilter {
    pub fn new<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            domains: domains
                .into_iter()
                .map(|d| normalize_dns_name(d.as_ref()))
                .filter(|d| !d.is_empty())
                .collect(),
        }
    }

    /// Whether `name` is one of the filter's domains or a subdomain of one.
    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        if self.domains.is_empty() {
            return true;
        }
        let name = normalize_dns_name(name);
        self.domains.iter().any(|domain| {
            name == *domain
                || name
                    .strip_suffix(domain.as_str())
                    .is_some_and(|prefix| prefix.ends_with('.'))
        })
    }
}

pub struct SyncLoop {
    store: DynRecordStore,
    registry: Arc<Registry>,
    interval: Duration,
    domain_filter: DomainFilter,
}

impl SyncLoop {
    #[must_use]
    pub fn new(
        store: DynRecordStore,
        registry: Arc<Registry>,
        interval: Duration,
        domain_filter: DomainFilter,
    ) -> Self {
        Self {
            store,
            registry,
            interval,
            domain_filter,
        }
    }

    /// Run one pass: list the store, plan against the registry and apply the plan.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StoreList`] if the store can't be listed.
    pub async fn run_once(&self) -> Result<Changes, Error> {
        let records = self.store.list().await.map_err(Error::StoreList)?;
        let desired: Vec<Endpoint> = records
            .into_iter()
            .flat_map(|r| r.endpoints)
            .filter(|e| MANAGED_RECORD_TYPES.contains(&e.record_type))
            .filter(|e| self.domain_filter.matches(&e.dns_name))
            .collect();

        let changes = plan(self.registry.records().await, desired);
        if !changes.is_empty() {
            self.registry.apply_changes(&changes).await;
        }
        Ok(changes)
    }

    /// Run a pass every interval until `stop` fires. A failed pass is logged and the next tick
    /// proceeds.
    pub async fn run(self, stop: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                () = stop.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(err) = self.run_once().await {
                        tracing::warn!("record sync failed: {err}");
                    }
                }
            }
        }
        tracing::debug!("record sync stopped");
    }
}

/// The changes that turn `current` into `desired`.
///
/// The registry holds one endpoint per key, so when several desired endpoints share a key the
/// first one listed is kept and the rest are ignored.
fn plan(current: Vec<Endpoint>, desired: Vec<Endpoint>) -> Changes {
    let mut current: HashMap<EndpointKey, Endpoint> =
        current.into_iter().map(|e| (e.key(), e)).collect();
    let mut planned = HashSet::new();

    let mut changes = Changes::default();
    for endpoint in desired {
        let key = endpoint.key();
        if !planned.insert(key.clone()) {
            tracing::debug!("ignoring duplicate endpoint {key:?}");
            continue;
        }
        match current.remove(&key) {
            None => changes.create.push(endpoint),
            Some(existing) if existing != endpoint => changes.update_new.push(endpoint),
            Some(_) => {}
        }
    }
    changes.delete = current.into_values().collect();
    changes
}
