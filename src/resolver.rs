//! The interface to a validating resolver: something which can look up a name with DNSSEC
//! validation and hand back both the answer and the records which authenticate it.
//!
//! [`crate::chain::resolve_chain`] only talks to resolvers through these traits. The
//! [`crate::query`] module provides an implementation backed by a recursive resolver reachable
//! over TCP, tests provide canned ones.

use std::io;

use thiserror::Error;

use crate::rr::Name;

/// Per-query switches understood by a [`ValidatingResolver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extensions {
	/// Only return answers which validated as DNSSEC-secure. Answers which are provably insecure
	/// are reported as [`ResponseStatus::NoSecureAnswers`] instead.
	pub dnssec_return_only_secure: bool,
	/// Return the DNSKEY, DS and RRSIG records used to validate the answer in
	/// [`Response::validation_chain`].
	pub dnssec_return_validation_chain: bool,
}

impl Extensions {
	/// The extensions needed to build a DNSSEC authentication chain: secure answers only, with
	/// the full validation chain.
	pub const AUTHENTICATION_CHAIN: Extensions = Extensions {
		dnssec_return_only_secure: true,
		dnssec_return_validation_chain: true,
	};
}

/// The overall outcome of a query, as reported by the resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseStatus {
	/// At least one response was returned.
	Good,
	/// The queried name does not exist.
	NoName,
	/// No server answered before the resolver gave up.
	AllTimeout,
	/// An answer exists, but it is not DNSSEC-secured.
	NoSecureAnswers,
	/// Every answer failed DNSSEC validation.
	AllBogusAnswers,
	/// Any other status code.
	Other(u32),
}

impl ResponseStatus {
	/// The numeric status code, using the getdns `GETDNS_RESPSTATUS_*` numbering.
	pub fn code(&self) -> u32 {
		match self {
			ResponseStatus::Good => 900,
			ResponseStatus::NoName => 901,
			ResponseStatus::AllTimeout => 902,
			ResponseStatus::NoSecureAnswers => 903,
			ResponseStatus::AllBogusAnswers => 904,
			ResponseStatus::Other(code) => *code,
		}
	}
}

impl From<u32> for ResponseStatus {
	fn from(code: u32) -> Self {
		match code {
			900 => ResponseStatus::Good,
			901 => ResponseStatus::NoName,
			902 => ResponseStatus::AllTimeout,
			903 => ResponseStatus::NoSecureAnswers,
			904 => ResponseStatus::AllBogusAnswers,
			code => ResponseStatus::Other(code),
		}
	}
}

/// One reply which contributed to a [`Response`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply<R> {
	/// The answer section, in the order the server sent it.
	pub answer: Vec<R>,
}

/// The structured result of [`ResolverContext::query`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response<R> {
	/// Overall status. Only [`ResponseStatus::Good`] responses carry usable records.
	pub status: ResponseStatus,
	/// Every reply which was used to build this response.
	pub replies_tree: Vec<Reply<R>>,
	/// The DNSKEY, DS and RRSIG records used in validating the answers, in the order they were
	/// gathered. Empty unless [`Extensions::dnssec_return_validation_chain`] was requested.
	pub validation_chain: Vec<R>,
}

impl<R> Response<R> {
	/// A response carrying only a status and no records.
	pub fn with_status(status: ResponseStatus) -> Self {
		Response { status, replies_tree: Vec::new(), validation_chain: Vec::new() }
	}
}

/// A record could not be converted to DNS wire format.
#[derive(Debug, Error)]
#[error("failed to convert record to wire format: {0}")]
pub struct EncodingError(pub String);

/// A DNS resolution capability which performs DNSSEC validation on our behalf.
pub trait ValidatingResolver {
	/// The context queries are issued against.
	type Context: ResolverContext;

	/// Acquires a resolution context configured with `extensions`.
	///
	/// The context is released when dropped.
	fn context(&self, extensions: Extensions) -> io::Result<Self::Context>;
}

/// A configured resolution context, see [`ValidatingResolver::context`].
pub trait ResolverContext {
	/// The structured records this context returns.
	type Record;

	/// Synchronously resolves `name`/`ty`.
	///
	/// DNS-level failures are reported in [`Response::status`]; an `Err` means the query could
	/// not be carried out at all.
	fn query(&mut self, name: &Name, ty: u16) -> io::Result<Response<Self::Record>>;

	/// Converts one of the records returned by [`Self::query`] into uncompressed DNS wire format.
	fn to_wire(&self, record: &Self::Record) -> Result<Vec<u8>, EncodingError>;
}
