use crate::record::{Endpoint, EndpointKey};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// A batch of record table mutations, applied atomically by [`Registry::apply_changes`].
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct Changes {
    pub create: Vec<Endpoint>,
    pub update_new: Vec<Endpoint>,
    pub delete: Vec<Endpoint>,
}

impl Changes {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.create.is_empty() && self.update_new.is_empty() && self.delete.is_empty()
    }
}

/// The record table the DNS responder answers from, keyed by [`EndpointKey`].
///
/// Readers share the lock. [`Registry::apply_changes`] is the only writer and holds the lock
/// exclusively for a whole batch, so readers see either none or all of it.
#[derive(Default, Debug)]
pub struct Registry {
    records: RwLock<HashMap<EndpointKey, Endpoint>>,
}

impl Registry {
    /// A deep copy of every entry in the table.
    pub async fn records(&self) -> Vec<Endpoint> {
        let records: Vec<Endpoint> = self.records.read().await.values().cloned().collect();

        tracing::debug!("registry returning {} records", records.len());
        for record in &records {
            tracing::debug!(
                "  - {} {} {:?}",
                record.dns_name,
                record.record_type,
                record.targets
            );
        }
        records
    }

    /// Upsert every endpoint in `create` and `update_new`, then remove every endpoint in
    /// `delete`, by key.
    pub async fn apply_changes(&self, changes: &Changes) {
        let mut records = self.records.write().await;

        tracing::debug!(
            "registry applying changes - create: {}, update: {}, delete: {}",
            changes.create.len(),
            changes.update_new.len(),
            changes.delete.len()
        );

        for change in &changes.create {
            tracing::debug!("  CREATE: {} {} {:?}", change.dns_name, change.record_type, change.targets);
            records.insert(change.key(), change.clone());
        }

        for change in &changes.update_new {
            tracing::debug!("  UPDATE: {} {} {:?}", change.dns_name, change.record_type, change.targets);
            records.insert(change.key(), change.clone());
        }

        for change in &changes.delete {
            tracing::debug!("  DELETE: {} {} {:?}", change.dns_name, change.record_type, change.targets);
            records.remove(&change.key());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use trust_dns_proto::rr::RecordType;

    fn txt(name: &str, set_identifier: &str, value: &str) -> Endpoint {
        Endpoint::new(name, RecordType::TXT, vec![value.to_string()])
            .with_set_identifier(set_identifier)
    }

    #[tokio::test]
    async fn update_replaces_by_key() {
        let registry = Registry::default();
        registry
            .apply_changes(&Changes {
                create: vec![txt("example.com.", "a", "one")],
                ..Changes::default()
            })
            .await;
        registry
            .apply_changes(&Changes {
                update_new: vec![txt("example.com.", "a", "two")],
                ..Changes::default()
            })
            .await;

        assert_eq!(registry.records().await, vec![txt("example.com.", "a", "two")]);
    }

    #[tokio::test]
    async fn set_identifier_separates_entries() {
        let registry = Registry::default();
        registry
            .apply_changes(&Changes {
                create: vec![txt("example.com.", "a", "one"), txt("example.com.", "b", "two")],
                ..Changes::default()
            })
            .await;
        assert_eq!(registry.records().await.len(), 2);

        registry
            .apply_changes(&Changes {
                delete: vec![txt("example.com.", "a", "one")],
                ..Changes::default()
            })
            .await;
        assert_eq!(registry.records().await, vec![txt("example.com.", "b", "two")]);
    }

    #[tokio::test]
    async fn records_are_copies() {
        let registry = Registry::default();
        let x = txt("example.com.", "x", "one");
        registry
            .apply_changes(&Changes {
                create: vec![x.clone()],
                ..Changes::default()
            })
            .await;

        let mut snapshot = registry.records().await;
        snapshot[0].targets.push("mutated".to_string());
        assert_eq!(registry.records().await, vec![x]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn batches_apply_atomically() {
        let registry = Arc::new(Registry::default());
        let x = txt("x.example.com.", "x", "x");
        let y = txt("y.example.com.", "y", "y");
        registry
            .apply_changes(&Changes {
                create: vec![y.clone()],
                ..Changes::default()
            })
            .await;

        let reader = {
            let registry = registry.clone();
            let (x, y) = (x.clone(), y.clone());
            tokio::spawn(async move {
                for _ in 0..2_000 {
                    let records = registry.records().await;
                    let has_x = records.contains(&x);
                    let has_y = records.contains(&y);
                    // Exactly one of the two states: before the batch, or after it.
                    assert!(has_x != has_y, "observed partial batch: {records:?}");
                    tokio::task::yield_now().await;
                }
            })
        };

        // Flip back and forth between {Y} and {X}.
        for i in 0..500 {
            let (create, delete) = if i % 2 == 0 { (&x, &y) } else { (&y, &x) };
            registry
                .apply_changes(&Changes {
                    create: vec![create.clone()],
                    update_new: vec![],
                    delete: vec![delete.clone()],
                })
                .await;
            tokio::task::yield_now().await;
        }
        reader.await.unwrap();

        let records = registry.records().await;
        assert!(records.contains(&y) && !records.contains(&x));
    }
}
