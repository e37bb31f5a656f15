//! Test doubles and common utilities for the integration tests.

#![allow(dead_code)]

use acmehook::error::StoreError;
use acmehook::record::{ChallengeRequest, Record, RecordIdentity};
use acmehook::record_store::{InMemoryRecordStore, RecordStore};
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use trust_dns_proto::op::{Message, MessageType, OpCode, Query};
use trust_dns_proto::rr::{Name, RData, RecordType};

/// A RecordStore wrapping an in-memory store that counts calls and can be made slow or failing.
#[derive(Default)]
pub struct InstrumentedStore {
    inner: InMemoryRecordStore,
    calls: AtomicUsize,
    writes: AtomicUsize,
    fail_writes: AtomicBool,
    delay: std::sync::Mutex<Option<Duration>>,
}

impl InstrumentedStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Total number of store calls of any kind.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of successful create/update/delete calls.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    async fn enter(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn check_write(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::IO(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "store unavailable",
            )));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait::async_trait]
impl RecordStore for InstrumentedStore {
    async fn get(&self, identity: &RecordIdentity) -> Result<Option<Record>, StoreError> {
        self.enter().await;
        self.inner.get(identity).await
    }

    async fn create(&self, record: Record) -> Result<Record, StoreError> {
        self.enter().await;
        self.check_write()?;
        self.inner.create(record).await
    }

    async fn update(&self, record: Record) -> Result<Record, StoreError> {
        self.enter().await;
        self.check_write()?;
        self.inner.update(record).await
    }

    async fn delete(&self, identity: &RecordIdentity) -> Result<(), StoreError> {
        self.enter().await;
        self.check_write()?;
        self.inner.delete(identity).await
    }

    async fn list(&self) -> Result<Vec<Record>, StoreError> {
        self.enter().await;
        self.inner.list().await
    }
}

pub fn challenge(dns_name: &str, key: &str) -> ChallengeRequest {
    let fqdn = format!("_acme-challenge.{}", dns_name.trim_start_matches("*."));
    ChallengeRequest {
        uid: format!("test-{key}"),
        dns_name: dns_name.to_string(),
        resolved_fqdn: fqdn,
        key: key.to_string(),
        resource_namespace: "default".to_string(),
        config: None,
    }
}

/// Send one query to `server` and wait for the response.
pub async fn query(server: SocketAddr, name: &str, query_type: RecordType) -> Message {
    let mut request = Message::new();
    request
        .set_id(rand_id(name))
        .set_message_type(MessageType::Query)
        .set_op_code(OpCode::Query)
        .add_query(Query::query(Name::from_str(name).unwrap(), query_type));

    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    socket
        .send_to(&request.to_vec().unwrap(), server)
        .await
        .unwrap();
    let mut buf = vec![0; 4096];
    let (len, _) = tokio::time::timeout(Duration::from_secs(2), socket.recv_from(&mut buf))
        .await
        .expect("DNS response within timeout")
        .unwrap();
    let response = Message::from_vec(&buf[..len]).unwrap();
    assert_eq!(response.id(), request.id());
    response
}

pub fn txt_values(response: &Message) -> Vec<String> {
    response
        .answers()
        .iter()
        .filter_map(|r| match r.data() {
            Some(RData::TXT(txt)) => Some(
                txt.txt_data()
                    .iter()
                    .map(|b| String::from_utf8_lossy(b).into_owned())
                    .collect::<String>(),
            ),
            _ => None,
        })
        .collect()
}

/// Poll `check` every 50ms until it returns true or `limit` elapses.
pub async fn eventually<F, Fut>(limit: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    check().await
}

fn rand_id(name: &str) -> u16 {
    name.bytes()
        .fold(0u16, |acc, b| acc.wrapping_mul(31).wrapping_add(u16::from(b)))
}
