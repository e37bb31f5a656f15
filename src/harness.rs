//! A self-contained validation setup: a [`Reconciler`] publishing into a record store, a
//! [`SyncLoop`] mirroring that store into a [`Registry`], and a [`Responder`] serving the
//! registry over DNS. Presenting a challenge through the harness makes it resolvable at
//! [`Harness::dns_addr`] within one sync interval.

use crate::config::Config;
use crate::dns::{Handler, Registry, Responder};
use crate::error::Error;
use crate::record::{ChallengeRequest, Endpoint};
use crate::record_store::{DynRecordStore, Outcome};
use crate::solver::Reconciler;
use crate::sync::{DomainFilter, SyncLoop};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub struct Harness {
    reconciler: Reconciler,
    registry: Arc<Registry>,
    responder: Responder,
    sync_task: JoinHandle<()>,
    stop: CancellationToken,
}

impl Harness {
    /// Bind the responder and start the sync loop. Everything is torn down when `stop` fires or
    /// [`Harness::stop`] is called.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IO`] if the DNS socket can't be bound.
    pub async fn start(
        config: &Config,
        store: DynRecordStore,
        stop: &CancellationToken,
    ) -> Result<Self, Error> {
        let stop = stop.child_token();
        let registry = Arc::new(Registry::default());

        let responder = Responder::bind(
            config.dns_udp_bind_addr,
            Handler::new(registry.clone()),
            &stop,
        )
        .await?;

        let sync = SyncLoop::new(
            store.clone(),
            registry.clone(),
            config.sync_interval,
            DomainFilter::new(&config.domains),
        );
        let sync_task = tokio::spawn(sync.run(stop.clone()));

        let reconciler = Reconciler::new(store, stop.clone()).with_timeout(config.request_timeout);

        Ok(Self {
            reconciler,
            registry,
            responder,
            sync_task,
            stop,
        })
    }

    /// See [`Reconciler::present`].
    ///
    /// # Errors
    ///
    /// As [`Reconciler::present`].
    pub async fn present(&self, ch: &ChallengeRequest) -> Result<Outcome, Error> {
        self.reconciler.present(ch).await
    }

    /// See [`Reconciler::clean_up`].
    ///
    /// # Errors
    ///
    /// As [`Reconciler::clean_up`].
    pub async fn clean_up(&self, ch: &ChallengeRequest) -> Result<(), Error> {
        self.reconciler.clean_up(ch).await
    }

    /// The records the responder is currently serving. The sync loop owns this table, so it
    /// trails the store by up to one sync interval.
    pub async fn records(&self) -> Vec<Endpoint> {
        self.registry.records().await
    }

    #[must_use]
    pub fn dns_addr(&self) -> SocketAddr {
        self.responder.local_addr()
    }

    /// Stop the sync loop and the responder and wait for both to finish.
    pub async fn stop(self) {
        self.stop.cancel();
        self.responder.stop().await;
        if let Err(err) = self.sync_task.await {
            tracing::error!("record sync task failed: {err}");
        }
    }
}
