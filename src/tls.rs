//! OpenSSL server context construction, including registration of the DNSSEC chain extension.

use std::path::PathBuf;
use std::sync::Arc;

use openssl::error::ErrorStack;
use openssl::ssl::{
	ExtensionContext, SslAcceptor, SslAcceptorBuilder, SslContextBuilder, SslFiletype, SslMethod,
	SslVerifyMode,
};

use crate::encode::ChainBlob;

const VERIFY_DEPTH: u32 = 10;
const SESSION_ID_CONTEXT: &[u8] = b"chainserver";

/// Where the server's credentials live and how clients are authenticated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsSettings {
	/// PEM file holding the server certificate, optionally followed by its chain.
	pub cert: PathBuf,
	/// PEM file holding the server private key.
	pub key: PathBuf,
	/// PEM file of trusted CAs for verifying clients. The system default store is used if unset.
	pub ca_file: Option<PathBuf>,
	/// Require clients to present a certificate.
	pub client_auth: bool,
}

/// Hands OpenSSL the shared chain without copying it for every handshake.
struct ChainPayload(Arc<ChainBlob>);

impl AsRef<[u8]> for ChainPayload {
	fn as_ref(&self) -> &[u8] { self.0.payload() }
}

/// Makes every handshake on `builder` carry `chain` as a TLS extension, provided the client asked
/// for it in its ClientHello.
///
/// OpenSSL writes the type/length header itself from the blob's type and payload, so the
/// extension on the wire is byte-for-byte the blob. In TLS 1.2 it goes in the ServerHello, in TLS
/// 1.3 in the end-entity certificate's CertificateEntry.
pub fn register_chain_extension(builder: &mut SslContextBuilder, chain: Arc<ChainBlob>) -> Result<(), ErrorStack> {
	let context = ExtensionContext::TLS_ONLY | ExtensionContext::CLIENT_HELLO
		| ExtensionContext::TLS1_2_SERVER_HELLO | ExtensionContext::TLS1_3_CERTIFICATE;
	let ext_type = chain.extension_type();
	builder.add_custom_ext(
		ext_type, context,
		move |_ssl, ctx, cert| {
			if ctx.contains(ExtensionContext::TLS1_3_CERTIFICATE) && !matches!(cert, Some((0, _))) {
				return Ok(None);
			}
			Ok(Some(ChainPayload(Arc::clone(&chain))))
		},
		// The client's ExtSupportLifetime is irrelevant as the chain is never cached by us.
		|_ssl, _ctx, _data, _cert| Ok(()),
	)
}

/// Builds the server-side TLS context: Mozilla's intermediate profile, the configured credentials
/// and, if resolution succeeded, the DNSSEC chain extension.
///
/// The returned acceptor is shared, read-only, by every connection.
pub fn build_acceptor(settings: &TlsSettings, chain: Option<Arc<ChainBlob>>) -> Result<SslAcceptor, ErrorStack> {
	let mut builder: SslAcceptorBuilder = SslAcceptor::mozilla_intermediate_v5(SslMethod::tls())?;

	match &settings.ca_file {
		Some(ca_file) => builder.set_ca_file(ca_file)?,
		None => builder.set_default_verify_paths()?,
	}
	builder.set_verify_depth(VERIFY_DEPTH);
	if settings.client_auth {
		builder.set_verify(SslVerifyMode::PEER | SslVerifyMode::FAIL_IF_NO_PEER_CERT);
	}

	builder.set_certificate_chain_file(&settings.cert)?;
	builder.set_private_key_file(&settings.key, SslFiletype::PEM)?;
	builder.check_private_key()?;

	if let Some(chain) = chain {
		register_chain_extension(&mut builder, chain)?;
	}
	builder.set_session_id_context(SESSION_ID_CONTEXT)?;
	Ok(builder.build())
}
