//! A [`ValidatingResolver`] which queries a recursive resolver over TCP and checks the DNSSEC
//! signatures on what it gets back itself, using the [`crate::validation`] module.
//!
//! The recursive resolver is trusted for nothing but availability: we ask it for the answer, then
//! walk the signer names of every RRSIG we see, fetching the DNSKEY and DS sets up to the root,
//! and finally verify the whole lot against our own trust anchors.

use std::io::{self, Read, Write, ErrorKind};
use std::net::{SocketAddr, TcpStream};
use std::time::{Duration, SystemTime};

use tracing::{debug, trace};

use crate::MAX_PROOF_STEPS;
use crate::resolver::*;
use crate::rr::*;
use crate::ser::*;
use crate::validation::{root_hints, verify_rr_stream_with_anchors, ValidationError};

// We don't care about transaction IDs as we're only going to accept signed data, and only one
// query is ever in flight per connection.
const TXID: u16 = 0;

const RCODE_SERVFAIL: u8 = 2;
const RCODE_NXDOMAIN: u8 = 3;

pub(crate) fn build_query(domain: &Name, ty: u16) -> Vec<u8> {
	let mut query = Vec::with_capacity(64);
	query.extend_from_slice(&TXID.to_be_bytes());
	query.extend_from_slice(&[0x01, 0x20]); // Flags: Recursive, Authenticated Data
	query.extend_from_slice(&[0, 1, 0, 0, 0, 0, 0, 1]); // One question, One additional
	write_name(&mut query, domain);
	query.extend_from_slice(&ty.to_be_bytes());
	query.extend_from_slice(&1u16.to_be_bytes()); // INternet class
	query.extend_from_slice(&[0, 0, 0x29]); // . OPT
	query.extend_from_slice(&0u16.to_be_bytes()); // 0 UDP payload size
	query.extend_from_slice(&[0, 0]); // EDNS version 0
	query.extend_from_slice(&0x8000u16.to_be_bytes()); // Accept DNSSEC RRs
	query.extend_from_slice(&0u16.to_be_bytes()); // No additional data
	query
}

/// A record returned by a [`TcpResolverContext`], along with the TTL it was served with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRR {
	/// The record itself.
	pub rr: RR,
	/// The TTL the resolver returned.
	pub ttl: u32,
}

#[derive(Debug)]
pub(crate) struct ParsedResponse {
	pub(crate) rcode: u8,
	pub(crate) answers: Vec<ResolvedRR>,
}

pub(crate) fn parse_response(resp: &[u8]) -> Result<ParsedResponse, ()> {
	let mut read: &[u8] = resp;
	if read_u16(&mut read)? != TXID { return Err(()); }
	let flags = read_u16(&mut read)?;
	if flags & 0b1000_0000_0000_0000 == 0 {
		return Err(()); // Not a response
	}
	if flags & 0b0111_1010_0000_0000 != 0 {
		return Err(()); // Unknown opcode or truncated
	}
	let rcode = (flags & 0b1111) as u8;
	let questions = read_u16(&mut read)?;
	if questions != 1 { return Err(()); }
	let answers = read_u16(&mut read)?;
	let _authorities = read_u16(&mut read)?;
	let _additional = read_u16(&mut read)?;

	read_wire_packet_name(&mut read, resp)?;
	read_u16(&mut read)?; // type
	read_u16(&mut read)?; // class

	if rcode != 0 {
		return Ok(ParsedResponse { rcode, answers: Vec::new() });
	}
	// Only the answer section matters, authority and additional are skipped entirely.
	let mut parsed = Vec::with_capacity(answers as usize);
	for _ in 0..answers {
		let (rr, ttl) = parse_wire_packet_rr(&mut read, resp)?;
		parsed.push(ResolvedRR { rr, ttl });
	}
	Ok(ParsedResponse { rcode, answers: parsed })
}

fn signer_names<'a>(records: &'a [ResolvedRR]) -> impl Iterator<Item = &'a Name> {
	records.iter().filter_map(|rec| if let RR::RRSig(sig) = &rec.rr { Some(&sig.key_name) } else { None })
}

fn is_timeout(err: &io::Error) -> bool {
	matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
}

/// A [`ValidatingResolver`] which sends its queries over TCP to a recursive resolver.
#[derive(Debug, Clone)]
pub struct TcpResolver {
	resolver: SocketAddr,
	timeout: Duration,
	trust_anchors: Vec<DS>,
}

impl TcpResolver {
	/// Builds a resolver querying `resolver`, giving up on any single connect, read or write after
	/// `timeout`. Answers are validated against the IANA root trust anchors.
	pub fn new(resolver: SocketAddr, timeout: Duration) -> Self {
		TcpResolver { resolver, timeout, trust_anchors: root_hints() }
	}

	/// Replaces the trust anchors answers are validated against.
	pub fn with_trust_anchors(mut self, trust_anchors: Vec<DS>) -> Self {
		self.trust_anchors = trust_anchors;
		self
	}
}

impl ValidatingResolver for TcpResolver {
	type Context = TcpResolverContext;

	fn context(&self, extensions: Extensions) -> io::Result<TcpResolverContext> {
		let stream = TcpStream::connect_timeout(&self.resolver, self.timeout)?;
		stream.set_read_timeout(Some(self.timeout))?;
		stream.set_write_timeout(Some(self.timeout))?;
		debug!(event = "connected", resolver = %self.resolver);
		Ok(TcpResolverContext { stream, extensions, trust_anchors: self.trust_anchors.clone() })
	}
}

/// An open connection to a recursive resolver, see [`TcpResolver`].
///
/// The connection is closed when this is dropped.
#[derive(Debug)]
pub struct TcpResolverContext {
	stream: TcpStream,
	extensions: Extensions,
	trust_anchors: Vec<DS>,
}

impl TcpResolverContext {
	fn exchange(&mut self, name: &Name, ty: u16) -> io::Result<ParsedResponse> {
		trace!(event = "query", qname = %name, qtype = ty);
		let query = build_query(name, ty);
		self.stream.write_all(&(query.len() as u16).to_be_bytes())?;
		self.stream.write_all(&query)?;

		let mut len_bytes = [0; 2];
		self.stream.read_exact(&mut len_bytes)?;
		let mut buf = vec![0; u16::from_be_bytes(len_bytes) as usize];
		self.stream.read_exact(&mut buf)?;
		parse_response(&buf).map_err(|()| io::Error::new(ErrorKind::InvalidData, "Bad response"))
	}

	/// Fetches the DNSKEY (and, below the root, DS) sets of every zone which signed something in
	/// `answers`, and of every zone which signed those in turn.
	fn gather_chain(&mut self, answers: &[ResolvedRR]) -> io::Result<Result<Vec<ResolvedRR>, ResponseStatus>> {
		let mut chain = Vec::new();
		let mut requested: Vec<Name> = Vec::new();
		let mut pending: Vec<Name> = signer_names(answers).cloned().collect();
		let mut queries_made = 1;
		while let Some(zone) = pending.pop() {
			if requested.iter().any(|z| z.eq_ignore_case(&zone)) { continue; }
			let mut tys = vec![DnsKey::TYPE];
			if !zone.is_root() { tys.push(DS::TYPE); }
			for ty in tys {
				queries_made += 1;
				if queries_made > MAX_PROOF_STEPS {
					return Err(io::Error::new(ErrorKind::Other, "Too many requests required"));
				}
				let resp = self.exchange(&zone, ty)?;
				if resp.rcode != 0 || resp.answers.is_empty() {
					return Ok(Err(ResponseStatus::AllBogusAnswers));
				}
				pending.extend(signer_names(&resp.answers).cloned());
				chain.extend(resp.answers);
			}
			requested.push(zone);
		}
		Ok(Ok(chain))
	}

	fn validate(&self, answers: &[ResolvedRR], chain: &[ResolvedRR]) -> ResponseStatus {
		let rrs = answers.iter().chain(chain.iter()).map(|rec| rec.rr.clone()).collect::<Vec<_>>();
		let verified = match verify_rr_stream_with_anchors(&rrs, &self.trust_anchors) {
			Ok(verified) => verified,
			Err(ValidationError::UnsupportedAlgorithm) => return ResponseStatus::NoSecureAnswers,
			Err(ValidationError::Invalid) => return ResponseStatus::AllBogusAnswers,
		};
		let now = SystemTime::now().duration_since(SystemTime::UNIX_EPOCH)
			.map(|d| d.as_secs()).unwrap_or(0);
		if now < verified.valid_from || now >= verified.expires {
			return ResponseStatus::AllBogusAnswers;
		}
		let all_answers_verified = answers.iter()
			.filter(|rec| !matches!(rec.rr, RR::RRSig(_)))
			.all(|rec| verified.verified_rrs.contains(&&rec.rr));
		if all_answers_verified { ResponseStatus::Good } else { ResponseStatus::AllBogusAnswers }
	}
}

impl ResolverContext for TcpResolverContext {
	type Record = ResolvedRR;

	fn query(&mut self, name: &Name, ty: u16) -> io::Result<Response<ResolvedRR>> {
		let resp = match self.exchange(name, ty) {
			Ok(resp) => resp,
			Err(e) if is_timeout(&e) => return Ok(Response::with_status(ResponseStatus::AllTimeout)),
			Err(e) => return Err(e),
		};
		match resp.rcode {
			0 => {},
			RCODE_SERVFAIL => return Ok(Response::with_status(ResponseStatus::AllBogusAnswers)),
			RCODE_NXDOMAIN => return Ok(Response::with_status(ResponseStatus::NoName)),
			rcode => return Ok(Response::with_status(ResponseStatus::Other(rcode.into()))),
		}

		let answers = resp.answers;
		let good = |answers: Vec<ResolvedRR>, validation_chain: Vec<ResolvedRR>| Response {
			status: ResponseStatus::Good, replies_tree: vec![Reply { answer: answers }], validation_chain,
		};
		if answers.is_empty() {
			return Ok(good(answers, Vec::new()));
		}
		if signer_names(&answers).next().is_none() {
			if self.extensions.dnssec_return_only_secure {
				return Ok(Response::with_status(ResponseStatus::NoSecureAnswers));
			}
			return Ok(good(answers, Vec::new()));
		}

		let chain = match self.gather_chain(&answers) {
			Ok(Ok(chain)) => chain,
			Ok(Err(status)) => return Ok(Response::with_status(status)),
			Err(e) if is_timeout(&e) => return Ok(Response::with_status(ResponseStatus::AllTimeout)),
			Err(e) => return Err(e),
		};
		let status = self.validate(&answers, &chain);
		debug!(event = "validated", qname = %name, status = status.code());
		if status != ResponseStatus::Good && self.extensions.dnssec_return_only_secure {
			return Ok(Response::with_status(status));
		}

		let chain = if self.extensions.dnssec_return_validation_chain { chain } else { Vec::new() };
		Ok(good(answers, chain))
	}

	fn to_wire(&self, record: &ResolvedRR) -> Result<Vec<u8>, EncodingError> {
		let mut out = Vec::new();
		write_rr(&record.rr, record.ttl, &mut out).map_err(|()| EncodingError(format!(
			"rdata of type {} record at {} does not fit in a record", record.rr.ty(), record.rr.name())))?;
		Ok(out)
	}
}
