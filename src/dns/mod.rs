//! Authoritative DNS responder used to validate published challenge records.
//!
//! The responder answers as if it owned every zone, which is enough for an ACME client's
//! propagation check but makes it useless as a real nameserver. It serves UDP only and every
//! answer carries a TTL of 5 seconds.
//!
//! # TXT
//!
//! `TXT` queries are answered from the [`Registry`][registry::Registry], which the
//! [sync loop][crate::sync] keeps in step with the record store. Names are compared
//! case-insensitively and without the trailing root label. Each target of each matching entry is
//! one answer record:
//!
//! ```bash
//! ❯ dig @127.0.0.1 -p 59351 +short _acme-challenge.example.com TXT
//! "abc123"
//! ```
//!
//! A name with no `TXT` entries gets an `NXDOMAIN` response.
//!
//! # A
//!
//! Every `A` query is answered with `127.0.0.1`, whatever the name.
//!
//! # NS / SOA
//!
//! `NS` and `SOA` queries get a single placeholder record naming `ns.acmehook.invalid.`, enough
//! to satisfy authority discovery.
//!
//! Any other query type gets `SERVFAIL`.

pub mod handlers;
pub mod registry;
pub mod server;

pub use handlers::Handler;
pub use registry::{Changes, Registry};
pub use server::Responder;
