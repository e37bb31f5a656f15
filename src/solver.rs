//! Presenting and cleaning up ACME DNS-01 challenge records.
//!
//! The [`Reconciler`] turns a [`ChallengeRequest`] into a single TXT [`Record`][crate::record::Record]
//! in a [`RecordStore`][crate::record_store::RecordStore], addressed by the challenge's
//! [`RecordIdentity`]. Both operations are idempotent: callers deliver them at least once and
//! own any retry policy, so nothing is retried here.

use crate::error::Error;
use crate::record::{ChallengeRequest, Endpoint, ProviderSpecific, RecordIdentity};
use crate::record_store::{DynRecordStore, Outcome};
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use trust_dns_proto::rr::RecordType;

/// The default deadline for each [`Reconciler::present`] and [`Reconciler::clean_up`] call.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct Reconciler {
    store: DynRecordStore,
    stop: CancellationToken,
    timeout: Duration,
}

impl Reconciler {
    /// Create a reconciler publishing through `store`. Calls in flight when `stop` is cancelled
    /// return [`Error::Cancelled`].
    #[must_use]
    pub fn new(store: DynRecordStore, stop: CancellationToken) -> Self {
        Self {
            store,
            stop,
            timeout: REQUEST_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Publish the challenge's TXT record, creating it or bringing it up to date.
    ///
    /// Safe to call repeatedly with the same request: the second call finds the record already
    /// in the desired state and returns [`Outcome::Unchanged`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigDecode`] if the request's config is malformed, before the store is
    /// touched. Returns [`Error::Store`] if the store fails, [`Error::DeadlineExceeded`] or
    /// [`Error::Cancelled`] if the call doesn't finish in time.
    pub async fn present(&self, ch: &ChallengeRequest) -> Result<Outcome, Error> {
        let provider_specific = load_provider_specific_config(ch.config.as_ref())?;

        let identity = RecordIdentity::for_challenge(ch);
        let endpoint = Endpoint::new(
            ch.resolved_fqdn.clone(),
            RecordType::TXT,
            vec![ch.key.clone()],
        )
        .with_set_identifier(identity.name.clone())
        .with_provider_specific(provider_specific);

        let outcome = self
            .bounded(async {
                self.store
                    .create_or_patch(&identity, vec![endpoint])
                    .await
                    .map_err(|err| Error::store("create/patch", &identity, err))
            })
            .await?;

        match outcome {
            Outcome::Created => tracing::info!(
                request = %ch.uid,
                namespace = %identity.namespace,
                name = %identity.name,
                "created challenge record"
            ),
            Outcome::Updated => tracing::info!(
                request = %ch.uid,
                namespace = %identity.namespace,
                name = %identity.name,
                "updated challenge record"
            ),
            Outcome::Unchanged => tracing::debug!(
                request = %ch.uid,
                "challenge record {identity} already up to date"
            ),
        }
        Ok(outcome)
    }

    /// Delete the challenge's TXT record. Only the record for this request's key is removed,
    /// so other challenges for the same domain are unaffected.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Store`] if the store fails for any reason other than the record being
    /// absent, [`Error::DeadlineExceeded`] or [`Error::Cancelled`] if the call doesn't finish in
    /// time.
    pub async fn clean_up(&self, ch: &ChallengeRequest) -> Result<(), Error> {
        let identity = RecordIdentity::for_challenge(ch);

        self.bounded(async {
            match self.store.delete(&identity).await {
                Ok(()) => {
                    tracing::info!(request = %ch.uid, "deleted challenge record {identity}");
                    Ok(())
                }
                Err(err) if err.is_not_found() => {
                    tracing::debug!(request = %ch.uid, "challenge record {identity} already gone");
                    Ok(())
                }
                Err(err) => Err(Error::store("delete", &identity, err)),
            }
        })
        .await
    }

    // Run `fut` until the stop token fires or the configured timeout elapses. Dropping `fut`
    // aborts the in-flight store operation.
    async fn bounded<T, F>(&self, fut: F) -> Result<T, Error>
    where
        F: Future<Output = Result<T, Error>>,
    {
        tokio::select! {
            biased;
            () = self.stop.cancelled() => Err(Error::Cancelled),
            res = tokio::time::timeout(self.timeout, fut) => {
                res.map_err(|_| Error::DeadlineExceeded(self.timeout))?
            }
        }
    }
}

/// Decode the `providerSpecific` attributes from a challenge's solver config. A missing or null
/// config yields no attributes.
fn load_provider_specific_config(
    config: Option<&serde_json::Value>,
) -> Result<ProviderSpecific, Error> {
    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct ProviderSpecificConfig {
        #[serde(default)]
        provider_specific: ProviderSpecific,
    }

    match config {
        None | Some(serde_json::Value::Null) => Ok(ProviderSpecific::default()),
        Some(value) => {
            let config = ProviderSpecificConfig::deserialize(value).map_err(Error::ConfigDecode)?;
            Ok(config.provider_specific)
        }
    }
}
