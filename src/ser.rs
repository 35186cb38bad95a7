//! Serialization/Deserialization logic lives here

use crate::rr::*;

pub(crate) fn read_u8(inp: &mut &[u8]) -> Result<u8, ()> {
	let res = *inp.first().ok_or(())?;
	*inp = &inp[1..];
	Ok(res)
}
pub(crate) fn read_u16(inp: &mut &[u8]) -> Result<u16, ()> {
	if inp.len() < 2 { return Err(()); }
	let mut bytes = [0; 2];
	bytes.copy_from_slice(&inp[..2]);
	*inp = &inp[2..];
	Ok(u16::from_be_bytes(bytes))
}
pub(crate) fn read_u32(inp: &mut &[u8]) -> Result<u32, ()> {
	if inp.len() < 4 { return Err(()); }
	let mut bytes = [0; 4];
	bytes.copy_from_slice(&inp[..4]);
	*inp = &inp[4..];
	Ok(u32::from_be_bytes(bytes))
}

// A compression pointer always points backwards, so a chain of pointers longer than this can only
// be a loop.
const MAX_NAME_POINTERS: usize = 64;

/// Reads a name which may contain compression pointers into `wire_packet`.
///
/// When reading from a bare record stream (which may not contain pointers) pass an empty
/// `wire_packet`.
pub(crate) fn read_wire_packet_name(inp: &mut &[u8], wire_packet: &[u8]) -> Result<Name, ()> {
	let mut name = String::with_capacity(256);
	let orig: &[u8] = *inp;
	let mut read = orig;
	let mut pointers_followed = 0;
	loop {
		let len = read_u8(&mut read)? as usize;
		if len == 0 { break; }
		if len & 0xc0 == 0xc0 {
			let offset = ((len & 0x3f) << 8) | read_u8(&mut read)? as usize;
			if pointers_followed == 0 { *inp = &orig[orig.len() - read.len()..]; }
			pointers_followed += 1;
			if pointers_followed > MAX_NAME_POINTERS { return Err(()); }
			if offset >= wire_packet.len() { return Err(()); }
			read = &wire_packet[offset..];
			continue;
		}
		if len > 63 { return Err(()); }
		if read.len() < len { return Err(()); }
		name += core::str::from_utf8(&read[..len]).map_err(|_| ())?;
		name.push('.');
		read = &read[len..];
		if name.len() > 255 { return Err(()); }
	}
	if pointers_followed == 0 { *inp = &orig[orig.len() - read.len()..]; }
	if name.is_empty() { name.push('.'); }
	name.try_into()
}

pub(crate) trait Writer { fn write(&mut self, buf: &[u8]); }
impl Writer for Vec<u8> { fn write(&mut self, buf: &[u8]) { self.extend_from_slice(buf); } }
impl Writer for ring::digest::Context { fn write(&mut self, buf: &[u8]) { self.update(buf); } }
/// Writes `name` uncompressed and in canonical (lowercase) form.
pub(crate) fn write_name<W: Writer>(out: &mut W, name: &str) {
	let canonical_name = name.to_ascii_lowercase();
	if canonical_name == "." {
		out.write(&[0]);
	} else {
		for label in canonical_name.split('.') {
			out.write(&(label.len() as u8).to_be_bytes());
			out.write(label.as_bytes());
		}
	}
}
pub(crate) fn name_len(name: &Name) -> u16 {
	if name.is_root() {
		1
	} else {
		name.split('.').map(|label| 1 + label.len() as u16).sum()
	}
}

/// Parses a single resource record, returning it along with its TTL.
///
/// Names in the record may be compressed against `wire_packet`.
pub(crate) fn parse_wire_packet_rr(inp: &mut &[u8], wire_packet: &[u8]) -> Result<(RR, u32), ()> {
	let name = read_wire_packet_name(inp, wire_packet)?;
	let ty = read_u16(inp)?;
	let class = read_u16(inp)?;
	if class != 1 { return Err(()); } // We only support the INternet
	let ttl = read_u32(inp)?;
	let data_len = read_u16(inp)? as usize;
	if inp.len() < data_len { return Err(()); }
	let data = &inp[..data_len];
	*inp = &inp[data_len..];

	let rr = match ty {
		A::TYPE => RR::A(A::read_from_data(name, data, wire_packet)?),
		AAAA::TYPE => RR::AAAA(AAAA::read_from_data(name, data, wire_packet)?),
		NS::TYPE => RR::NS(NS::read_from_data(name, data, wire_packet)?),
		Txt::TYPE => RR::Txt(Txt::read_from_data(name, data, wire_packet)?),
		CName::TYPE => RR::CName(CName::read_from_data(name, data, wire_packet)?),
		DName::TYPE => RR::DName(DName::read_from_data(name, data, wire_packet)?),
		TLSA::TYPE => RR::TLSA(TLSA::read_from_data(name, data, wire_packet)?),
		DnsKey::TYPE => RR::DnsKey(DnsKey::read_from_data(name, data, wire_packet)?),
		DS::TYPE => RR::DS(DS::read_from_data(name, data, wire_packet)?),
		RRSig::TYPE => RR::RRSig(RRSig::read_from_data(name, data, wire_packet)?),
		_ => return Err(()),
	};
	Ok((rr, ttl))
}

/// Parses a stream of uncompressed resource records, as found in the DNSSEC chain extension.
pub fn parse_rr_stream(mut inp: &[u8]) -> Result<Vec<RR>, ()> {
	let mut res = Vec::with_capacity(32);
	while !inp.is_empty() {
		let (rr, _ttl) = parse_wire_packet_rr(&mut inp, &[])?;
		res.push(rr);
	}
	Ok(res)
}

/// Writes `rr` to `out` in uncompressed DNS wire format with the given TTL.
///
/// Fails, leaving `out` untouched, if the record's data is too long to be described by the u16
/// rdata length field.
pub fn write_rr<RR: Record>(rr: &RR, ttl: u32, out: &mut Vec<u8>) -> Result<(), ()> {
	let start = out.len();
	write_name(out, rr.name());
	out.extend_from_slice(&rr.ty().to_be_bytes());
	out.extend_from_slice(&1u16.to_be_bytes()); // The INternet class
	out.extend_from_slice(&ttl.to_be_bytes());
	let len_pos = out.len();
	rr.write_u16_len_prefixed_data(out);
	let declared_len = u16::from_be_bytes([out[len_pos], out[len_pos + 1]]) as usize;
	if declared_len != out.len() - len_pos - 2 {
		out.truncate(start);
		return Err(());
	}
	Ok(())
}
