//! An append-only, ordered collection of wire-format resource records.
//!
//! The order records are inserted in is the order their bytes appear in the DNSSEC chain
//! extension, so a [`Ledger`] never reorders, deduplicates or removes anything.

/// A single resource record already encoded in DNS wire format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireRecord {
	bytes: Vec<u8>,
}

impl WireRecord {
	/// Wraps already-encoded record bytes.
	pub fn new(bytes: Vec<u8>) -> Self {
		WireRecord { bytes }
	}

	/// The encoded record.
	pub fn bytes(&self) -> &[u8] {
		&self.bytes
	}

	/// The length of the encoded record, in bytes.
	pub fn len(&self) -> usize {
		self.bytes.len()
	}

	/// Whether the record is empty (which no valid DNS record is).
	pub fn is_empty(&self) -> bool {
		self.bytes.is_empty()
	}
}

impl From<Vec<u8>> for WireRecord {
	fn from(bytes: Vec<u8>) -> Self {
		WireRecord::new(bytes)
	}
}

/// The ordered sequence of [`WireRecord`]s making up a DNSSEC authentication chain, along with
/// their total size.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ledger {
	records: Vec<WireRecord>,
	total_size: usize,
}

impl Ledger {
	/// Creates an empty ledger.
	pub fn new() -> Self {
		Ledger::default()
	}

	/// Appends `record` after every record inserted so far.
	pub fn insert(&mut self, record: WireRecord) {
		self.total_size += record.len();
		self.records.push(record);
	}

	/// The sum of the lengths of every record inserted so far.
	pub fn total_size(&self) -> usize {
		self.total_size
	}

	/// The records, in insertion order.
	pub fn snapshot(&self) -> &[WireRecord] {
		&self.records
	}

	/// The number of records held.
	pub fn len(&self) -> usize {
		self.records.len()
	}

	/// Whether no record has been inserted yet.
	pub fn is_empty(&self) -> bool {
		self.records.is_empty()
	}
}

impl Extend<WireRecord> for Ledger {
	fn extend<I: IntoIterator<Item = WireRecord>>(&mut self, records: I) {
		for record in records {
			self.insert(record);
		}
	}
}
