//! DNSSEC validation of a set of resource records, walking from a set of trust anchors down to the
//! records being proven.

use core::cmp;

use ring::digest;
use ring::signature;

use crate::MAX_PROOF_STEPS;
use crate::rr::*;
use crate::ser::write_name;

/// Gets the trusted root anchors
///
/// These are available at <https://data.iana.org/root-anchors/root-anchors.xml>
pub fn root_hints() -> Vec<DS> {
	vec![DS {
		name: Name::root(), key_tag: 19036, alg: 8, digest_type: 2,
		digest: hex_lit::hex!("49AAC11D7B6F6446702E54A1607371607A1A41855200FD2CE1CDDE32F24E8FB5").to_vec(),
	}, DS {
		name: Name::root(), key_tag: 20326, alg: 8, digest_type: 2,
		digest: hex_lit::hex!("E06D44B80B8F1D39A95C0B0D7C65D08458E880409BBC683457104237C7F8EC8D").to_vec(),
	}]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// An error when validating DNSSEC signatures or other data
pub enum ValidationError {
	/// An algorithm used in signing was not supported.
	///
	/// The zone is signed, but not in a way we can check, so the records cannot be treated as
	/// secure.
	UnsupportedAlgorithm,
	/// The provided data was invalid or signatures did not validate.
	Invalid,
}

// RFC 4034 section 2.1.1
const ZONE_KEY_FLAG: u16 = 0b1_0000_0000;

fn bytes_to_rsa_pk(pubkey: &[u8]) -> Result<signature::RsaPublicKeyComponents<&[u8]>, ()> {
	if pubkey.len() <= 3 { return Err(()); }

	let (exponent_length, pos) = if pubkey[0] == 0 {
		(((pubkey[1] as usize) << 8) | (pubkey[2] as usize), 3)
	} else {
		(pubkey[0] as usize, 1)
	};

	if pubkey.len() <= pos + exponent_length { return Err(()); }
	Ok(signature::RsaPublicKeyComponents {
		n: &pubkey[pos + exponent_length..],
		e: &pubkey[pos..pos + exponent_length]
	})
}

/// Builds the data an [`RRSig`] signs over: its own fields followed by the covered RRset in
/// canonical form and order (RFC 4034 section 6).
pub(crate) fn signed_data<R: Record>(sig: &RRSig, records: &[&R]) -> Result<Vec<u8>, ValidationError> {
	let mut rdatas = Vec::with_capacity(records.len());
	for record in records {
		if record.ty() != sig.ty { return Err(ValidationError::Invalid); }
		let mut rdata = Vec::new();
		record.write_u16_len_prefixed_data(&mut rdata);
		rdatas.push((*record, rdata));
	}
	rdatas.sort_unstable_by(|a, b| a.1[2..].cmp(&b.1[2..]));
	rdatas.dedup_by(|a, b| a.1 == b.1);

	let mut data = Vec::with_capacity(2048);
	sig.write_signed_fields(&mut data);
	for (record, rdata) in rdatas {
		let owner_labels = record.name().label_count();
		if owner_labels < sig.labels { return Err(ValidationError::Invalid); }
		if owner_labels > sig.labels {
			// Expanded from a wildcard: sign over "*." plus the rightmost `labels` labels.
			let skip = (owner_labels - sig.labels) as usize;
			let closest_encloser = record.name().splitn(skip + 1, '.').last().ok_or(ValidationError::Invalid)?;
			data.extend_from_slice(b"\x01*");
			write_name(&mut data, if closest_encloser.is_empty() { "." } else { closest_encloser });
		} else {
			write_name(&mut data, record.name());
		}
		data.extend_from_slice(&record.ty().to_be_bytes());
		data.extend_from_slice(&1u16.to_be_bytes()); // The INternet class
		data.extend_from_slice(&sig.orig_ttl.to_be_bytes());
		data.extend_from_slice(&rdata);
	}
	Ok(data)
}

fn check_signature(dnskey: &DnsKey, sig: &RRSig, signed_data: &[u8]) -> Result<(), ValidationError> {
	let res = match sig.alg {
		8|10 => {
			let alg = if sig.alg == 8 {
				&signature::RSA_PKCS1_1024_8192_SHA256_FOR_LEGACY_USE_ONLY
			} else {
				&signature::RSA_PKCS1_1024_8192_SHA512_FOR_LEGACY_USE_ONLY
			};
			bytes_to_rsa_pk(&dnskey.pubkey).map_err(|_| ValidationError::Invalid)?
				.verify(alg, signed_data, &sig.signature)
		},
		13|14 => {
			let alg = if sig.alg == 13 {
				&signature::ECDSA_P256_SHA256_FIXED
			} else {
				&signature::ECDSA_P384_SHA384_FIXED
			};
			// ring wants the uncompressed SEC1 point, DNSSEC omits the 0x04 prefix.
			let mut key = Vec::with_capacity(dnskey.pubkey.len() + 1);
			key.push(0x4);
			key.extend_from_slice(&dnskey.pubkey);
			signature::UnparsedPublicKey::new(alg, &key).verify(signed_data, &sig.signature)
		},
		15 => {
			signature::UnparsedPublicKey::new(&signature::ED25519, &dnskey.pubkey)
				.verify(signed_data, &sig.signature)
		},
		_ => return Err(ValidationError::UnsupportedAlgorithm),
	};
	res.map_err(|_| ValidationError::Invalid)
}

fn verify_rrsig<'a, R: Record, Keys>(sig: &RRSig, dnskeys: Keys, records: &[&R])
-> Result<(), ValidationError>
where Keys: IntoIterator<Item = &'a DnsKey> {
	if records.is_empty() { return Err(ValidationError::Invalid); }
	let signed_data = signed_data(sig, records)?;
	for dnskey in dnskeys {
		if dnskey.key_tag() != sig.key_tag || dnskey.alg != sig.alg { continue; }
		// Protocol must be 3, otherwise its not DNSSEC
		if dnskey.protocol != 3 { continue; }
		if dnskey.flags & ZONE_KEY_FLAG == 0 { continue; }
		match check_signature(dnskey, sig, &signed_data) {
			Ok(()) => return Ok(()),
			Err(ValidationError::UnsupportedAlgorithm) => return Err(ValidationError::UnsupportedAlgorithm),
			// Key tags may collide, so keep looking.
			Err(ValidationError::Invalid) => {},
		}
	}
	Err(ValidationError::Invalid)
}

/// Computes the digest a [`DS`] record with the given digest type carries for `dnskey`.
pub(crate) fn dnskey_digest(dnskey: &DnsKey, digest_type: u8) -> Option<digest::Digest> {
	let alg = match digest_type {
		1 => &digest::SHA1_FOR_LEGACY_USE_ONLY,
		2 => &digest::SHA256,
		4 => &digest::SHA384,
		_ => return None,
	};
	let mut ctx = digest::Context::new(alg);
	write_name(&mut ctx, &dnskey.name);
	ctx.update(&dnskey.flags.to_be_bytes());
	ctx.update(&[dnskey.protocol, dnskey.alg]);
	ctx.update(&dnskey.pubkey);
	Some(ctx.finish())
}

fn verify_dnskey_rrsig(sig: &RRSig, dses: &[&DS], dnskeys: &[&DnsKey]) -> Result<(), ValidationError> {
	if dses.is_empty() { return Err(ValidationError::Invalid); }
	if !dses.iter().any(|ds| matches!(ds.digest_type, 1 | 2 | 4)) {
		return Err(ValidationError::UnsupportedAlgorithm);
	}
	// Only use SHA1 DS records if we don't have any SHA256/SHA384 DS RRs.
	let trust_sha1 = dses.iter().all(|ds| ds.digest_type != 2 && ds.digest_type != 4);

	let anchored_keys = dnskeys.iter().copied().filter(|dnskey| {
		dses.iter().any(|ds| {
			if ds.alg != dnskey.alg || ds.key_tag != dnskey.key_tag() { return false; }
			if ds.digest_type == 1 && !trust_sha1 { return false; }
			dnskey_digest(dnskey, ds.digest_type)
				.map_or(false, |digest| digest.as_ref() == &ds.digest[..])
		})
	});
	verify_rrsig(sig, anchored_keys, dnskeys)
}

/// Given a set of [`RR`]s, [`verify_rr_stream`] checks what it can and returns the set of
/// non-[`RRSig`]/[`DnsKey`]/[`DS`] records which it was able to verify using this struct.
///
/// It also contains signing and expiry times, which must be validated before considering the
/// contained records verified.
#[derive(Debug, Clone)]
pub struct VerifiedRRStream<'a> {
	/// The set of verified [`RR`]s.
	pub verified_rrs: Vec<&'a RR>,
	/// The latest [`RRSig::inception`] of all the [`RRSig`]s validated to verify
	/// [`Self::verified_rrs`].
	pub valid_from: u64,
	/// The earliest [`RRSig::expiration`] of all the [`RRSig`]s validated to verify
	/// [`Self::verified_rrs`].
	pub expires: u64,
	/// The minimum [`RRSig::orig_ttl`] of all the [`RRSig`]s validated to verify
	/// [`Self::verified_rrs`].
	pub max_cache_ttl: u32,
}
impl<'a> VerifiedRRStream<'a> {
	fn record_signature(&mut self, rrsig: &RRSig) {
		self.valid_from = cmp::max(self.valid_from, resolve_time(rrsig.inception));
		self.expires = cmp::min(self.expires, resolve_time(rrsig.expiration));
		self.max_cache_ttl = cmp::min(self.max_cache_ttl, rrsig.orig_ttl);
	}
}

fn resolve_time(time: u32) -> u64 {
	// RFC 2065 was published in January 1997, so we arbitrarily use that as a cutoff and assume
	// any timestamps before then are actually past 2106 instead.
	if time < 60*60*24*365*27 {
		(time as u64) + (u32::MAX as u64)
	} else {
		time.into()
	}
}

fn is_in_zone(name: &Name, zone: &Name) -> bool {
	if zone.is_root() { return true; }
	let (name, zone) = (name.to_ascii_lowercase(), zone.to_ascii_lowercase());
	name == zone || name.ends_with(&format!(".{}", zone))
}

fn rrsigs(inp: &[RR]) -> impl Iterator<Item = &RRSig> {
	inp.iter().filter_map(|rr| if let RR::RRSig(sig) = rr { Some(sig) } else { None })
}

/// Verifies the given set of resource records against the IANA root trust anchors.
///
/// See [`verify_rr_stream_with_anchors`].
pub fn verify_rr_stream(inp: &[RR]) -> Result<VerifiedRRStream<'_>, ValidationError> {
	verify_rr_stream_with_anchors(inp, &root_hints())
}

/// Verifies the given set of resource records.
///
/// Starting from the root zone, whose keys must match one of `trust_anchors`, each zone's
/// [`DnsKey`] set is authenticated, every [`RRSig`] made by those keys is checked, and any signed
/// [`DS`] sets are used to authenticate the child zone in turn. Record order in `inp` does not
/// matter.
///
/// All records which could be validated are returned, though if any signature made by an
/// authenticated key fails to verify, only `Err` will be returned.
///
/// You MUST check that the current UNIX time is between [`VerifiedRRStream::valid_from`] and
/// [`VerifiedRRStream::expires`].
pub fn verify_rr_stream_with_anchors<'a>(inp: &'a [RR], trust_anchors: &[DS])
-> Result<VerifiedRRStream<'a>, ValidationError> {
	let mut res = VerifiedRRStream {
		verified_rrs: Vec::new(), valid_from: 0, expires: u64::MAX, max_cache_ttl: u32::MAX,
	};
	let root = Name::root();
	let mut pending_zones: Vec<(&Name, Vec<&DS>)> = vec![(&root, trust_anchors.iter().collect())];
	let mut validated_zones: Vec<&Name> = Vec::new();

	while let Some((zone, dses)) = pending_zones.pop() {
		if validated_zones.len() >= MAX_PROOF_STEPS { return Err(ValidationError::Invalid); }
		validated_zones.push(zone);

		let dnskeys = inp.iter()
			.filter_map(|rr| if let RR::DnsKey(dnskey) = rr { Some(dnskey) } else { None })
			.filter(|dnskey| dnskey.name.eq_ignore_case(zone))
			.collect::<Vec<_>>();

		let mut found_unsupported_alg = false;
		let mut keys_verified = false;
		for rrsig in rrsigs(inp).filter(|sig| sig.ty == DnsKey::TYPE && sig.name.eq_ignore_case(zone)) {
			match verify_dnskey_rrsig(rrsig, &dses, &dnskeys) {
				Ok(()) => {
					res.record_signature(rrsig);
					keys_verified = true;
					break;
				},
				// There may be redundant signatures by different keys, where one we don't support
				// and another we do.
				Err(ValidationError::UnsupportedAlgorithm) => found_unsupported_alg = true,
				Err(ValidationError::Invalid) => {},
			}
		}
		if !keys_verified {
			return Err(if found_unsupported_alg {
				ValidationError::UnsupportedAlgorithm
			} else {
				ValidationError::Invalid
			});
		}

		for rrsig in rrsigs(inp).filter(|sig| sig.key_name.eq_ignore_case(zone) && sig.ty != DnsKey::TYPE) {
			if !is_in_zone(&rrsig.name, zone) { return Err(ValidationError::Invalid); }
			let signed_records = inp.iter()
				.filter(|rr| rr.name().eq_ignore_case(&rrsig.name) && rr.ty() == rrsig.ty)
				.collect::<Vec<_>>();
			verify_rrsig(rrsig, dnskeys.iter().copied(), &signed_records)?;
			res.record_signature(rrsig);
			match rrsig.ty {
				// RRSigs shouldn't cover child `DnsKey`s or other `RRSig`s
				RRSig::TYPE|DnsKey::TYPE => return Err(ValidationError::Invalid),
				DS::TYPE => {
					let child = &rrsig.name;
					let already_seen = validated_zones.iter().chain(pending_zones.iter().map(|(z, _)| z))
						.any(|z| z.eq_ignore_case(child));
					if !already_seen {
						let child_dses = signed_records.iter()
							.filter_map(|rr| if let RR::DS(ds) = rr { Some(ds) } else { None })
							.collect();
						pending_zones.push((child, child_dses));
					}
				},
				_ => {
					for record in signed_records {
						if !res.verified_rrs.contains(&record) { res.verified_rrs.push(record); }
					}
				},
			}
		}
	}

	if res.verified_rrs.is_empty() || res.valid_from >= res.expires {
		return Err(ValidationError::Invalid);
	}
	Ok(res)
}
