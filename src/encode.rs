//! Serializes a ledger of wire-format records into the DNSSEC authentication chain extension.
//!
//! The layout is `[type: u16 BE][length: u16 BE][records...]`, where the records are simply
//! concatenated, each one self-delimiting by way of its own rdata length field.

use thiserror::Error;

use crate::ledger::WireRecord;

/// The records don't fit in the 16-bit extension length field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("chain data is {size} bytes, more than the {max} an extension can carry", max = u16::MAX)]
pub struct OverflowError {
	/// The total size of the records which were to be encoded.
	pub size: usize,
}

const HEADER_LEN: usize = 4;

/// An encoded chain extension, header included.
///
/// Once built it is never modified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainBlob {
	bytes: Vec<u8>,
}

impl ChainBlob {
	/// The extension type from the header.
	pub fn extension_type(&self) -> u16 {
		u16::from_be_bytes([self.bytes[0], self.bytes[1]])
	}

	/// The payload length from the header.
	pub fn payload_length(&self) -> u16 {
		u16::from_be_bytes([self.bytes[2], self.bytes[3]])
	}

	/// The concatenated records, without the header.
	pub fn payload(&self) -> &[u8] {
		&self.bytes[HEADER_LEN..]
	}

	/// The full blob, header included.
	pub fn as_bytes(&self) -> &[u8] {
		&self.bytes
	}
}

/// Builds the extension blob for `records`, in order, tagged with `extension_type`.
pub fn encode(records: &[WireRecord], extension_type: u16) -> Result<ChainBlob, OverflowError> {
	let size: usize = records.iter().map(WireRecord::len).sum();
	let payload_length = u16::try_from(size).map_err(|_| OverflowError { size })?;

	let mut bytes = Vec::with_capacity(HEADER_LEN + size);
	bytes.extend_from_slice(&extension_type.to_be_bytes());
	bytes.extend_from_slice(&payload_length.to_be_bytes());
	for record in records {
		bytes.extend_from_slice(record.bytes());
	}
	Ok(ChainBlob { bytes })
}
