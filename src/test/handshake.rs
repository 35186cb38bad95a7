//! Full server start-up and TLS handshakes, driven by an OpenSSL client which asks for the
//! DNSSEC chain extension and records what the server sent.

use std::net::{IpAddr, SocketAddr};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use openssl::ssl::{ExtensionContext, SslConnector, SslMethod, SslVerifyMode, SslVersion};
use temp_dir::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_openssl::SslStream;

use crate::chain::tests::CannedResolver;
use crate::config::ServerConfig;
use crate::query::TcpResolver;
use crate::resolver::{ResponseStatus, ValidatingResolver};
use crate::server::{handle_connection, start, ChainPolicy, ConnectionState, ServerError};
use crate::ser::parse_rr_stream;
use crate::tls::{build_acceptor, TlsSettings};
use crate::DNSSEC_CHAIN_EXT_TYPE;

use super::fake_resolver::{serve, Behaviour};
use super::write_self_signed;
use super::zone::Hierarchy;

fn config(dir: &TempDir, port: u16, policy: ChainPolicy) -> ServerConfig {
	let (cert, key) = write_self_signed(dir, "example.test");
	ServerConfig {
		port,
		server_name: "example.test".to_owned(),
		bind: IpAddr::from([127, 0, 0, 1]),
		resolver: SocketAddr::from(([127, 0, 0, 1], 53)),
		resolver_timeout: Duration::from_secs(1),
		tls: TlsSettings { cert, key, ca_file: None, client_auth: false },
		chain_policy: policy,
		debug: true,
	}
}

async fn spawn_server<R>(config: &ServerConfig, resolver: R) -> SocketAddr
where R: ValidatingResolver + Send + 'static {
	let server = start(config, resolver).await.unwrap();
	let addr = server.local_addr().unwrap();
	tokio::spawn(server.run());
	addr
}

/// Handshakes with the server at `addr`, returning the chain extension data it sent, if any.
async fn fetch_chain(addr: SocketAddr, max_version: Option<SslVersion>) -> Result<Option<Vec<u8>>, openssl::ssl::Error> {
	let seen = Arc::new(Mutex::new(None));
	let mut builder = SslConnector::builder(SslMethod::tls()).unwrap();
	builder.set_verify(SslVerifyMode::NONE);
	builder.set_max_proto_version(max_version).unwrap();
	let seen_by_cb = Arc::clone(&seen);
	builder.add_custom_ext(
		DNSSEC_CHAIN_EXT_TYPE,
		ExtensionContext::TLS_ONLY | ExtensionContext::CLIENT_HELLO
			| ExtensionContext::TLS1_2_SERVER_HELLO | ExtensionContext::TLS1_3_CERTIFICATE,
		|_ssl, ctx, _cert| {
			// An ExtSupportLifetime of zero: don't pin.
			if ctx.contains(ExtensionContext::CLIENT_HELLO) { Ok(Some(vec![0u8, 0])) } else { Ok(None) }
		},
		move |_ssl, _ctx, data, _cert| {
			*seen_by_cb.lock().unwrap() = Some(data.to_vec());
			Ok(())
		},
	).unwrap();
	let connector = builder.build();

	let ssl = connector.configure().unwrap().verify_hostname(false).into_ssl("example.test").unwrap();
	let tcp = TcpStream::connect(addr).await.unwrap();
	let mut stream = SslStream::new(ssl, tcp).unwrap();
	Pin::new(&mut stream).connect().await?;
	// Wait for the server to close the session.
	let mut buf = [0; 16];
	let _ = stream.read(&mut buf).await;
	let data = seen.lock().unwrap().take();
	Ok(data)
}

#[tokio::test]
async fn chain_offered_identically_to_every_client() {
	let dir = TempDir::new().unwrap();
	let resolver = CannedResolver::new(ResponseStatus::Good, vec![vec![3, 4, 5, 6]], vec![vec![1, 2]]);
	let addr = spawn_server(&config(&dir, 0, ChainPolicy::Optional), resolver).await;

	let first = fetch_chain(addr, None).await.unwrap();
	let second = fetch_chain(addr, None).await.unwrap();
	assert_eq!(first, Some(vec![3, 4, 5, 6, 1, 2]));
	assert_eq!(first, second);

	let tls12 = fetch_chain(addr, Some(SslVersion::TLS1_2)).await.unwrap();
	assert_eq!(tls12, first);
}

#[tokio::test]
async fn insecure_answer_serves_without_chain() {
	let dir = TempDir::new().unwrap();
	let resolver = CannedResolver::new(ResponseStatus::NoSecureAnswers, vec![vec![3, 4]], Vec::new());
	let addr = spawn_server(&config(&dir, 0, ChainPolicy::Optional), resolver).await;
	assert_eq!(fetch_chain(addr, None).await.unwrap(), None);
	assert_eq!(fetch_chain(addr, Some(SslVersion::TLS1_2)).await.unwrap(), None);
}

#[tokio::test]
async fn required_chain_refuses_to_start() {
	let dir = TempDir::new().unwrap();
	let resolver = CannedResolver::new(ResponseStatus::AllBogusAnswers, Vec::new(), Vec::new());
	match start(&config(&dir, 0, ChainPolicy::Required), resolver).await {
		Err(ServerError::Chain { qname, .. }) => assert_eq!(qname.as_str(), "_0._tcp.example.test."),
		Err(err) => panic!("{}", err),
		Ok(_) => panic!("started without a chain"),
	}
}

#[tokio::test]
async fn unusable_server_name_serves_without_chain() {
	let dir = TempDir::new().unwrap();
	let mut config = config(&dir, 0, ChainPolicy::Optional);
	config.server_name = format!("{}.example.test", "a".repeat(64));
	let resolver = CannedResolver::new(ResponseStatus::Good, vec![vec![1]], Vec::new());
	let addr = spawn_server(&config, resolver).await;
	assert_eq!(fetch_chain(addr, None).await.unwrap(), None);

	config.server_name = String::new();
	let resolver = CannedResolver::new(ResponseStatus::Good, vec![vec![1]], Vec::new());
	let addr = spawn_server(&config, resolver).await;
	assert_eq!(fetch_chain(addr, None).await.unwrap(), None);
}

#[tokio::test]
async fn unusable_server_name_with_required_chain_refuses_to_start() {
	let dir = TempDir::new().unwrap();
	let mut config = config(&dir, 0, ChainPolicy::Required);
	config.server_name = ".".to_owned();
	let resolver = CannedResolver::new(ResponseStatus::Good, vec![vec![1]], Vec::new());
	assert!(matches!(start(&config, resolver).await, Err(ServerError::InvalidServerName(_))));
}

#[tokio::test]
async fn bad_key_refuses_to_start() {
	let dir = TempDir::new().unwrap();
	let mut config = config(&dir, 0, ChainPolicy::Optional);
	config.tls.key = dir.child("missing.key");
	let resolver = CannedResolver::new(ResponseStatus::Good, vec![vec![1]], Vec::new());
	assert!(matches!(start(&config, resolver).await, Err(ServerError::Tls(_))));
}

#[tokio::test]
async fn failed_handshake_keeps_serving() {
	let dir = TempDir::new().unwrap();
	let resolver = CannedResolver::new(ResponseStatus::Good, vec![vec![7, 7]], vec![vec![8]]);
	let addr = spawn_server(&config(&dir, 0, ChainPolicy::Optional), resolver).await;

	let mut garbage = TcpStream::connect(addr).await.unwrap();
	garbage.write_all(b"GET / HTTP/1.0\r\n\r\n").await.unwrap();
	let mut buf = Vec::new();
	let _ = garbage.read_to_end(&mut buf).await;

	// A client which gives up halfway through.
	drop(TcpStream::connect(addr).await.unwrap());

	assert_eq!(fetch_chain(addr, None).await.unwrap(), Some(vec![7, 7, 8]));
}

#[tokio::test]
async fn connection_states() {
	let dir = TempDir::new().unwrap();
	let settings = config(&dir, 0, ChainPolicy::Optional).tls;
	let acceptor = build_acceptor(&settings, None).unwrap();
	let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
	let addr = listener.local_addr().unwrap();

	tokio::spawn(async move {
		let mut garbage = TcpStream::connect(addr).await.unwrap();
		garbage.write_all(b"not a client hello").await.unwrap();
		let mut buf = Vec::new();
		let _ = garbage.read_to_end(&mut buf).await;
	});
	let (stream, _) = listener.accept().await.unwrap();
	assert_eq!(handle_connection(&acceptor, stream).await, [
		ConnectionState::Accepted, ConnectionState::Handshaking,
		ConnectionState::Failed, ConnectionState::Closed,
	]);

	let client = tokio::spawn(fetch_chain(addr, None));
	let (stream, _) = listener.accept().await.unwrap();
	assert_eq!(handle_connection(&acceptor, stream).await, [
		ConnectionState::Accepted, ConnectionState::Handshaking,
		ConnectionState::Established, ConnectionState::Closed,
	]);
	assert_eq!(client.await.unwrap().unwrap(), None);
}

#[tokio::test]
async fn end_to_end_with_signed_zone() {
	let dir = TempDir::new().unwrap();
	// The TLSA name carries the port, so pick one up front.
	let port = std::net::TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();
	let hierarchy = Hierarchy::new(&format!("_{}._tcp.example.test.", port));
	let mut config = config(&dir, port, ChainPolicy::Required);
	config.resolver = serve(Behaviour::Answer(hierarchy.rrsets.clone()));
	let resolver = TcpResolver::new(config.resolver, config.resolver_timeout)
		.with_trust_anchors(hierarchy.trust_anchors());
	let addr = spawn_server(&config, resolver).await;
	assert_eq!(addr.port(), port);

	let data = fetch_chain(addr, None).await.unwrap().unwrap();
	assert_eq!(parse_rr_stream(&data).unwrap(), hierarchy.expected_chain());
}
