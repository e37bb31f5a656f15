//! Challenge requests and the records published for them.

use crate::naming::generate_name;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use trust_dns_proto::rr::RecordType;

/// Opaque provider-specific attributes attached to a published record, passed through to the
/// record store untouched.
pub type ProviderSpecific = BTreeMap<String, String>;

/// An ACME DNS-01 challenge to present or clean up.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeRequest {
    /// Request identifier, used only for diagnostics.
    pub uid: String,
    /// The domain the certificate is requested for, e.g. `*.example.com.`.
    pub dns_name: String,
    /// The fully-qualified name the TXT record must be published under.
    #[serde(rename = "resolvedFQDN")]
    pub resolved_fqdn: String,
    /// The TXT record value.
    pub key: String,
    pub resource_namespace: String,
    /// Solver configuration, as supplied on the issuer.
    pub config: Option<serde_json::Value>,
}

/// The `(namespace, name)` pair a [`Record`] is addressed by in the record store.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordIdentity {
    pub namespace: String,
    pub name: String,
}

impl RecordIdentity {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// The identity for a challenge. Identical `(dns_name, key)` pairs always map to the same
    /// identity within a namespace.
    #[must_use]
    pub fn for_challenge(ch: &ChallengeRequest) -> Self {
        Self::new(
            ch.resource_namespace.clone(),
            generate_name(&ch.dns_name, &ch.key),
        )
    }
}

impl fmt::Display for RecordIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// A single DNS entry.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    pub dns_name: String,
    pub record_type: RecordType,
    pub targets: Vec<String>,
    #[serde(default)]
    pub set_identifier: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub provider_specific: ProviderSpecific,
}

impl Endpoint {
    pub fn new(dns_name: impl Into<String>, record_type: RecordType, targets: Vec<String>) -> Self {
        Self {
            dns_name: dns_name.into(),
            record_type,
            targets,
            set_identifier: String::new(),
            provider_specific: ProviderSpecific::default(),
        }
    }

    #[must_use]
    pub fn with_set_identifier(mut self, set_identifier: impl Into<String>) -> Self {
        self.set_identifier = set_identifier.into();
        self
    }

    #[must_use]
    pub fn with_provider_specific(mut self, provider_specific: ProviderSpecific) -> Self {
        self.provider_specific = provider_specific;
        self
    }

    #[must_use]
    pub fn key(&self) -> EndpointKey {
        EndpointKey {
            dns_name: self.dns_name.clone(),
            record_type: self.record_type,
            set_identifier: self.set_identifier.clone(),
        }
    }
}

/// Uniquely identifies an [`Endpoint`] in the DNS responder's record table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[allow(clippy::module_name_repetitions)]
pub struct EndpointKey {
    pub dns_name: String,
    pub record_type: RecordType,
    pub set_identifier: String,
}

/// The object stored in and exchanged with the record store.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub identity: RecordIdentity,
    /// Assigned by the store on every write. Updates carrying a stale version are rejected.
    #[serde(default)]
    pub resource_version: u64,
    pub endpoints: Vec<Endpoint>,
}

impl Record {
    #[must_use]
    pub fn new(identity: RecordIdentity, endpoints: Vec<Endpoint>) -> Self {
        Self {
            identity,
            resource_version: 0,
            endpoints,
        }
    }
}

/// Strip the trailing root label and lowercase, so names from queries and records compare equal.
#[must_use]
pub fn normalize_dns_name(name: &str) -> String {
    name.strip_suffix('.').unwrap_or(name).to_ascii_lowercase()
}
