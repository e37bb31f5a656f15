use crate::error::Error;
use crate::record_store::{DynRecordStore, FileRecordStore, InMemoryRecordStore};
use crate::solver::REQUEST_TIMEOUT;
use serde::Deserialize;
use serde_with::{serde_as, DurationSeconds};
use std::fs::File;
use std::io::BufReader;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub type SharedConfig = Arc<Config>;

#[serde_as]
#[derive(Deserialize, Debug, Clone)]
pub struct Config {
    pub dns_udp_bind_addr: SocketAddr,
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(default = "default_request_timeout")]
    pub request_timeout: Duration,
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(default = "default_sync_interval")]
    pub sync_interval: Duration,
    /// Only records under these domains are served. Empty serves everything.
    #[serde(default)]
    pub domains: Vec<String>,
    /// Persist records to this JSON file. Records are kept in memory only when unset.
    pub record_store_state_path: Option<String>,
}

fn default_request_timeout() -> Duration {
    REQUEST_TIMEOUT
}

fn default_sync_interval() -> Duration {
    Duration::from_secs(1)
}

impl Config {
    pub fn try_from_file(p: impl AsRef<Path>) -> Result<Self, Error> {
        let f = File::open(p)?;
        let reader = BufReader::new(f);
        let conf: Config = serde_json::from_reader(reader)?;
        Ok(conf)
    }

    /// Build the record store this config describes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StoreLoad`] if a file-backed store's state can't be loaded.
    pub async fn record_store(&self) -> Result<DynRecordStore, Error> {
        match &self.record_store_state_path {
            None => Ok(Arc::new(InMemoryRecordStore::default())),
            Some(path) => {
                let store = FileRecordStore::try_from_file(path)
                    .await
                    .map_err(Error::StoreLoad)?;
                Ok(Arc::new(store))
            }
        }
    }
}
