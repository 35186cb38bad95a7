//! Resolves a name with DNSSEC validation and records the answer, along with the records which
//! authenticate it, in a [`Ledger`].

use std::io;

use thiserror::Error;
use tracing::debug;

use crate::ledger::{Ledger, WireRecord};
use crate::resolver::*;
use crate::rr::Name;

/// The reasons [`resolve_chain`] can fail.
#[derive(Debug, Error)]
pub enum ResolveError {
	/// A resolution context could not be created.
	#[error("failed to create resolution context: {0}")]
	Context(#[source] io::Error),
	/// The query could not be carried out at all.
	#[error("query for {qname} failed: {source}")]
	Transport {
		/// The name being queried.
		qname: Name,
		/// The underlying failure.
		source: io::Error,
	},
	/// The queried name does not exist.
	#[error("{qname} does not exist")]
	NameError {
		/// The name being queried.
		qname: Name,
	},
	/// The name exists, but has no records of the requested type.
	#[error("{qname} has no records of type {qtype}")]
	NoData {
		/// The name being queried.
		qname: Name,
		/// The type being queried.
		qtype: u16,
	},
	/// No server answered the query.
	#[error("query for {qname} timed out")]
	Timeout {
		/// The name being queried.
		qname: Name,
	},
	/// An answer exists, but it is not secured by DNSSEC.
	#[error("no DNSSEC-secure answers for {qname}")]
	Insecure {
		/// The name being queried.
		qname: Name,
	},
	/// Every answer failed DNSSEC validation.
	#[error("DNSSEC validation failed for {qname}")]
	Bogus {
		/// The name being queried.
		qname: Name,
	},
	/// The resolver returned a status we don't know how to handle.
	#[error("unknown response status {status} for {qname}")]
	UnknownStatus {
		/// The name being queried.
		qname: Name,
		/// The raw status code.
		status: u32,
	},
	/// A returned record could not be converted to wire format.
	#[error(transparent)]
	Encoding(#[from] EncodingError),
}

/// Resolves `qname`/`qtype` through `resolver` with DNSSEC validation and appends the result to
/// `ledger`.
///
/// On success every answer record (in the order the resolver returned them) is followed in the
/// ledger by every validation chain record (again in resolver order). On failure `ledger` is left
/// exactly as it was.
pub fn resolve_chain<R: ValidatingResolver>(
	resolver: &R, ledger: &mut Ledger, qname: &Name, qtype: u16,
) -> Result<(), ResolveError> {
	let mut context = resolver.context(Extensions::AUTHENTICATION_CHAIN)
		.map_err(ResolveError::Context)?;
	let response = context.query(qname, qtype)
		.map_err(|source| ResolveError::Transport { qname: qname.clone(), source })?;

	let qname = qname.clone();
	match response.status {
		ResponseStatus::Good => {},
		ResponseStatus::NoName => return Err(ResolveError::NameError { qname }),
		ResponseStatus::AllTimeout => return Err(ResolveError::Timeout { qname }),
		ResponseStatus::NoSecureAnswers => return Err(ResolveError::Insecure { qname }),
		ResponseStatus::AllBogusAnswers => return Err(ResolveError::Bogus { qname }),
		ResponseStatus::Other(status) => return Err(ResolveError::UnknownStatus { qname, status }),
	}

	// Records are staged and only committed once everything converted.
	let mut staged = Vec::new();
	for reply in response.replies_tree.iter() {
		if reply.answer.is_empty() {
			return Err(ResolveError::NoData { qname, qtype });
		}
		for record in reply.answer.iter() {
			staged.push(WireRecord::new(context.to_wire(record)?));
		}
	}
	let answers = staged.len();
	for record in response.validation_chain.iter() {
		staged.push(WireRecord::new(context.to_wire(record)?));
	}
	debug!(event = "resolved", qname = %qname, answers = answers, chain = staged.len() - answers);

	ledger.extend(staged);
	Ok(())
}
