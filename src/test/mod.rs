//! Fixtures and end-to-end tests which span several modules.

use std::fs;
use std::path::PathBuf;

use openssl::asn1::Asn1Time;
use openssl::bn::BigNum;
use openssl::ec::{EcGroup, EcKey};
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::PKey;
use openssl::x509::{X509, X509NameBuilder};
use temp_dir::TempDir;

mod resolution;
mod handshake;

/// Writes a fresh self-signed P-256 certificate and its key into `dir`, returning their paths.
pub(crate) fn write_self_signed(dir: &TempDir, name: &str) -> (PathBuf, PathBuf) {
	let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
	let key = PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap();

	let mut subject = X509NameBuilder::new().unwrap();
	subject.append_entry_by_text("CN", name).unwrap();
	let subject = subject.build();

	let mut builder = X509::builder().unwrap();
	builder.set_version(2).unwrap();
	let serial = BigNum::from_u32(1).unwrap().to_asn1_integer().unwrap();
	builder.set_serial_number(&serial).unwrap();
	builder.set_subject_name(&subject).unwrap();
	builder.set_issuer_name(&subject).unwrap();
	builder.set_pubkey(&key).unwrap();
	builder.set_not_before(&Asn1Time::days_from_now(0).unwrap()).unwrap();
	builder.set_not_after(&Asn1Time::days_from_now(30).unwrap()).unwrap();
	builder.sign(&key, MessageDigest::sha256()).unwrap();
	let cert = builder.build();

	let cert_path = dir.child(format!("{}.crt", name));
	fs::write(&cert_path, cert.to_pem().unwrap()).unwrap();
	let key_path = dir.child(format!("{}.key", name));
	fs::write(&key_path, key.private_key_to_pem_pkcs8().unwrap()).unwrap();
	(cert_path, key_path)
}
