//! Building chains through [`TcpResolver`] against the fake resolver.

use std::net::TcpListener;
use std::time::Duration;

use crate::chain::ResolveError;
use crate::ledger::Ledger;
use crate::query::TcpResolver;
use crate::rr::*;
use crate::ser::parse_rr_stream;
use crate::server::{build_chain, ChainError};
use crate::validation::verify_rr_stream_with_anchors;
use crate::DNSSEC_CHAIN_EXT_TYPE;

use super::fake_resolver::{serve, Behaviour};
use super::zone::Hierarchy;

const TLSA_NAME: &str = "_443._tcp.example.test.";

fn resolver_for(hierarchy: &Hierarchy, behaviour: Behaviour) -> TcpResolver {
	TcpResolver::new(serve(behaviour), Duration::from_secs(5))
		.with_trust_anchors(hierarchy.trust_anchors())
}

fn resolve(hierarchy: &Hierarchy, behaviour: Behaviour) -> Result<Ledger, ResolveError> {
	let resolver = resolver_for(hierarchy, behaviour);
	let mut ledger = Ledger::new();
	crate::chain::resolve_chain(&resolver, &mut ledger, &hierarchy.tlsa_name, TLSA::TYPE)?;
	Ok(ledger)
}

#[test]
fn chain_for_signed_zone() {
	let hierarchy = Hierarchy::new(TLSA_NAME);
	let resolver = resolver_for(&hierarchy, Behaviour::Answer(hierarchy.rrsets.clone()));
	let blob = build_chain(&resolver, &hierarchy.tlsa_name).unwrap();
	assert_eq!(blob.extension_type(), DNSSEC_CHAIN_EXT_TYPE);
	assert_eq!(blob.payload().len(), blob.payload_length() as usize);

	let rrs = parse_rr_stream(blob.payload()).unwrap();
	assert_eq!(rrs, hierarchy.expected_chain());
	assert!(matches!(&rrs[0], RR::TLSA(tlsa) if tlsa.name.as_str() == TLSA_NAME));
	assert!(rrs[2..].iter().all(|rr| !matches!(rr, RR::TLSA(_))));

	let verified = verify_rr_stream_with_anchors(&rrs, &hierarchy.trust_anchors()).unwrap();
	assert_eq!(verified.verified_rrs.len(), 1);
}

#[test]
fn ledger_matches_blob() {
	let hierarchy = Hierarchy::new(TLSA_NAME);
	let ledger = resolve(&hierarchy, Behaviour::Answer(hierarchy.rrsets.clone())).unwrap();
	assert_eq!(ledger.len(), 12);
	let blob = crate::encode::encode(ledger.snapshot(), DNSSEC_CHAIN_EXT_TYPE).unwrap();
	assert_eq!(blob.payload_length() as usize, ledger.total_size());
	let concatenated = ledger.snapshot().iter().flat_map(|rec| rec.bytes().iter().copied()).collect::<Vec<_>>();
	assert_eq!(blob.payload(), &concatenated[..]);
}

#[test]
fn tampered_tlsa_is_bogus() {
	let mut hierarchy = Hierarchy::new(TLSA_NAME);
	let name = hierarchy.tlsa_name.clone();
	for rr in hierarchy.rrset_mut(&name, TLSA::TYPE).unwrap() {
		if let RR::TLSA(tlsa) = rr { tlsa.data[0] ^= 0xff; }
	}
	assert!(matches!(resolve(&hierarchy, Behaviour::Answer(hierarchy.rrsets.clone())),
		Err(ResolveError::Bogus { .. })));
}

#[test]
fn wrong_trust_anchor_is_bogus() {
	let hierarchy = Hierarchy::new(TLSA_NAME);
	let other = Hierarchy::new(TLSA_NAME);
	let resolver = TcpResolver::new(serve(Behaviour::Answer(hierarchy.rrsets.clone())), Duration::from_secs(5))
		.with_trust_anchors(other.trust_anchors());
	assert!(matches!(build_chain(&resolver, &hierarchy.tlsa_name),
		Err(ChainError::Resolve(ResolveError::Bogus { .. }))));
}

#[test]
fn unsigned_answer_is_insecure() {
	let mut hierarchy = Hierarchy::new(TLSA_NAME);
	let name = hierarchy.tlsa_name.clone();
	hierarchy.rrset_mut(&name, TLSA::TYPE).unwrap().retain(|rr| !matches!(rr, RR::RRSig(_)));
	assert!(matches!(resolve(&hierarchy, Behaviour::Answer(hierarchy.rrsets.clone())),
		Err(ResolveError::Insecure { .. })));
}

#[test]
fn missing_delegation_is_bogus() {
	let mut hierarchy = Hierarchy::new(TLSA_NAME);
	let zone: Name = "example.test.".try_into().unwrap();
	hierarchy.rrsets.retain(|((name, ty), _)| !(name == &zone && *ty == DS::TYPE));
	// example.test. still exists, so the DS query gets an empty NOERROR answer.
	assert!(matches!(resolve(&hierarchy, Behaviour::Answer(hierarchy.rrsets.clone())),
		Err(ResolveError::Bogus { .. })));
}

#[test]
fn unknown_name_is_name_error() {
	let hierarchy = Hierarchy::new("_8443._tcp.example.test.");
	let resolver = resolver_for(&hierarchy, Behaviour::Answer(hierarchy.rrsets.clone()));
	let mut ledger = Ledger::new();
	let qname = "_443._tcp.example.test.".try_into().unwrap();
	assert!(matches!(crate::chain::resolve_chain(&resolver, &mut ledger, &qname, TLSA::TYPE),
		Err(ResolveError::NameError { .. })));
	assert!(ledger.is_empty());
}

#[test]
fn other_type_is_no_data() {
	let hierarchy = Hierarchy::new(TLSA_NAME);
	let resolver = resolver_for(&hierarchy, Behaviour::Answer(hierarchy.rrsets.clone()));
	let mut ledger = Ledger::new();
	assert!(matches!(crate::chain::resolve_chain(&resolver, &mut ledger, &hierarchy.tlsa_name, Txt::TYPE),
		Err(ResolveError::NoData { qtype: 16, .. })));
	assert!(ledger.is_empty());
}

#[test]
fn rcodes() {
	let hierarchy = Hierarchy::new(TLSA_NAME);
	assert!(matches!(resolve(&hierarchy, Behaviour::Rcode(2)), Err(ResolveError::Bogus { .. })));
	assert!(matches!(resolve(&hierarchy, Behaviour::Rcode(3)), Err(ResolveError::NameError { .. })));
	assert!(matches!(resolve(&hierarchy, Behaviour::Rcode(5)),
		Err(ResolveError::UnknownStatus { status: 5, .. })));
}

#[test]
fn silent_resolver_times_out() {
	let hierarchy = Hierarchy::new(TLSA_NAME);
	let resolver = TcpResolver::new(serve(Behaviour::Silent), Duration::from_millis(200))
		.with_trust_anchors(hierarchy.trust_anchors());
	let mut ledger = Ledger::new();
	assert!(matches!(crate::chain::resolve_chain(&resolver, &mut ledger, &hierarchy.tlsa_name, TLSA::TYPE),
		Err(ResolveError::Timeout { .. })));
}

#[test]
fn unreachable_resolver_is_context_error() {
	let addr = {
		let listener = TcpListener::bind("127.0.0.1:0").unwrap();
		listener.local_addr().unwrap()
	};
	let resolver = TcpResolver::new(addr, Duration::from_secs(1));
	let mut ledger = Ledger::new();
	assert!(matches!(crate::chain::resolve_chain(&resolver, &mut ledger, &"_443._tcp.example.test.".try_into().unwrap(), TLSA::TYPE),
		Err(ResolveError::Context(_))));
}
