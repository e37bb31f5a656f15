//! acmehook
//!
//! Solves [RFC-8555][RFC-8555] [DNS-01] challenges by publishing TXT records through an
//! eventually-consistent record store, and proves them resolvable with a local authoritative
//! DNS responder.
//!
//! A challenge maps to exactly one stored record whose name is derived from the challenge's
//! domain and key (see [`naming`]), so presenting and cleaning up are idempotent and safe to
//! repeat. A [sync loop][sync] mirrors the store into the [DNS responder][dns].
//!
//! [RFC-8555]: https://www.rfc-editor.org/rfc/rfc8555
//! [DNS-01]: https://www.rfc-editor.org/rfc/rfc8555#section-8.4
//!
#![warn(clippy::pedantic)]

pub mod config;
pub mod dns;
pub mod error;
pub mod harness;
pub mod naming;
pub mod record;
pub mod record_store;
pub mod solver;
pub mod sync;

use crate::record_store::{file, memory};
pub use config::{Config, SharedConfig};
pub use file::FileRecordStore;
pub use harness::Harness;
pub use memory::InMemoryRecordStore;
pub use record::{ChallengeRequest, RecordIdentity};
pub use solver::Reconciler;
