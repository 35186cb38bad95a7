//! A TLS server which proves, inside its own handshake, which DNS records justify the
//! certificate it presents.
//!
//! At start-up the server looks up the DANE TLSA record for its own name and port
//! (`_<port>._tcp.<hostname>.`) with full DNSSEC validation, collects the answer along with every
//! DNSKEY, DS and RRSIG record needed to authenticate it back to the root, and serializes all of
//! them into the DNSSEC authentication chain extension defined in RFC 9102. That extension is
//! then offered, unchanged, in every handshake the server performs, allowing clients to validate
//! the DANE binding offline.
//!
//! The pipeline is split into small pieces:
//!  * [`resolver`] defines the validating-resolver capability the pipeline consumes, and
//!    [`query`] implements it by querying a recursive resolver over TCP and checking the
//!    signatures locally with the [`validation`] module.
//!  * [`chain::resolve_chain`] performs one validated query and appends the answer and its
//!    validation chain to a [`ledger::Ledger`].
//!  * [`encode::encode`] serializes a ledger into the type/length/value extension blob.
//!  * [`tls`] and [`server`] register that blob with OpenSSL and run the accept loop.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]

pub mod rr;
pub mod ser;
pub mod validation;
pub mod resolver;
pub mod query;
pub mod ledger;
pub mod chain;
pub mod encode;
pub mod tls;
pub mod server;
pub mod config;

#[cfg(test)]
mod test;

/// The TLS extension type of the DNSSEC authentication chain extension (RFC 9102).
pub const DNSSEC_CHAIN_EXT_TYPE: u16 = 53;

/// The maximum number of zones walked while validating, and the maximum number of queries made
/// while gathering a validation chain.
pub const MAX_PROOF_STEPS: usize = 20;
