//! The server itself: builds the DNSSEC chain once at start-up, hands it to OpenSSL and then
//! serves every connection with it from its own task.

use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;

use hex_conservative::DisplayHex;
use openssl::error::ErrorStack;
use openssl::ssl::{Ssl, SslAcceptor};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio_openssl::SslStream;
use tracing::{debug, error, info, warn, Instrument};

use crate::DNSSEC_CHAIN_EXT_TYPE;
use crate::chain::{resolve_chain, ResolveError};
use crate::config::ServerConfig;
use crate::encode::{encode, ChainBlob, OverflowError};
use crate::ledger::Ledger;
use crate::query::TcpResolver;
use crate::resolver::ValidatingResolver;
use crate::rr::{Name, StaticRecord, TLSA};
use crate::tls::build_acceptor;

/// Building the DNSSEC chain failed.
#[derive(Debug, Error)]
pub enum ChainError {
	/// The TLSA record or its validation chain could not be resolved.
	#[error(transparent)]
	Resolve(#[from] ResolveError),
	/// The chain is too large to fit in the extension.
	#[error(transparent)]
	Overflow(#[from] OverflowError),
}

/// A condition which prevents the server from serving at all.
#[derive(Debug, Error)]
pub enum ServerError {
	/// The configured server name does not form a valid TLSA name and
	/// [`ChainPolicy::Required`] is in effect.
	#[error("invalid server name {0:?}")]
	InvalidServerName(String),
	/// The TLS context could not be set up, e.g. the certificate or key failed to load.
	#[error("failed to set up TLS: {0}")]
	Tls(#[from] ErrorStack),
	/// The listening socket could not be bound.
	#[error("failed to bind to {addr}: {source}")]
	Bind {
		/// The address we tried to listen on.
		addr: SocketAddr,
		/// The underlying failure.
		source: io::Error,
	},
	/// The chain could not be built and [`ChainPolicy::Required`] is in effect.
	#[error("no DNSSEC chain for {qname}: {source}")]
	Chain {
		/// The TLSA name queried.
		qname: Name,
		/// Why the chain could not be built.
		source: ChainError,
	},
	/// The start-up resolution task died.
	#[error("chain resolution task failed: {0}")]
	Task(#[from] tokio::task::JoinError),
}

/// What to do when the DNSSEC chain cannot be built at start-up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChainPolicy {
	/// Serve TLS without the chain extension.
	#[default]
	Optional,
	/// Refuse to start.
	Required,
}

/// Builds the name of the TLSA record for a service on TCP `port` at `server_name`, i.e.
/// `_<port>._tcp.<server_name>.`.
pub fn tlsa_query_name(port: u16, server_name: &str) -> Result<Name, ServerError> {
	if server_name.trim_end_matches('.').is_empty() {
		return Err(ServerError::InvalidServerName(server_name.to_owned()));
	}
	let mut name = format!("_{}._tcp.{}", port, server_name);
	if !name.ends_with('.') { name.push('.'); }
	Name::try_from(name).map_err(|()| ServerError::InvalidServerName(server_name.to_owned()))
}

/// Resolves the TLSA record at `qname` along with its validation chain and encodes the lot as a
/// DNSSEC chain extension.
pub fn build_chain<R: ValidatingResolver>(resolver: &R, qname: &Name) -> Result<ChainBlob, ChainError> {
	let mut ledger = Ledger::new();
	resolve_chain(resolver, &mut ledger, qname, TLSA::TYPE)?;
	Ok(encode(ledger.snapshot(), DNSSEC_CHAIN_EXT_TYPE)?)
}

/// Runs [`build_chain`], reporting the outcome, and applies `policy` to failures.
///
/// Blocks until the resolver has answered or given up.
pub fn prepare_chain<R: ValidatingResolver>(resolver: &R, qname: &Name, policy: ChainPolicy)
-> Result<Option<ChainBlob>, ServerError> {
	match build_chain(resolver, qname) {
		Ok(chain) => {
			info!(
				event = "chain",
				qname = %qname,
				size = chain.payload_length(),
				"Got DNSSEC chain data for {}, size={} octets", qname, chain.payload_length()
			);
			debug!(event = "chain-data", data = %chain.as_bytes().as_hex());
			Ok(Some(chain))
		},
		Err(source) => match policy {
			ChainPolicy::Optional => {
				warn!(
					event = "chain",
					qname = %qname,
					reason = %source,
					"Failed to get DNSSEC chain data for {}", qname
				);
				Ok(None)
			},
			ChainPolicy::Required => Err(ServerError::Chain { qname: qname.clone(), source }),
		},
	}
}

/// The life of a single connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
	/// The TCP connection was accepted.
	Accepted,
	/// The TLS handshake is in progress.
	Handshaking,
	/// The handshake completed.
	Established,
	/// The handshake failed.
	Failed,
	/// The connection was closed.
	Closed,
}

impl ConnectionState {
	fn can_become(self, next: ConnectionState) -> bool {
		use ConnectionState::*;
		matches!((self, next),
			(Accepted, Handshaking) | (Handshaking, Established) | (Handshaking, Failed) |
			(Established, Closed) | (Failed, Closed))
	}
}

/// Tracks the state of one connection, logging each transition.
#[derive(Debug)]
struct Connection {
	history: Vec<ConnectionState>,
}

impl Connection {
	fn new() -> Self {
		debug!(event = "state", state = ?ConnectionState::Accepted);
		Connection { history: vec![ConnectionState::Accepted] }
	}

	fn state(&self) -> ConnectionState {
		*self.history.last().unwrap_or(&ConnectionState::Closed)
	}

	fn become_(&mut self, next: ConnectionState) {
		debug_assert!(self.state().can_become(next), "{:?} -> {:?}", self.state(), next);
		debug!(event = "state", state = ?next);
		self.history.push(next);
	}
}

/// Drives one accepted connection through its TLS handshake and closes it again, returning every
/// state it passed through.
///
/// No application protocol is spoken; once established the session is reported and shut down.
pub async fn handle_connection(acceptor: &SslAcceptor, stream: TcpStream) -> Vec<ConnectionState> {
	let mut conn = Connection::new();
	conn.become_(ConnectionState::Handshaking);

	let mut stream = match Ssl::new(acceptor.context()).and_then(|ssl| SslStream::new(ssl, stream)) {
		Ok(stream) => stream,
		Err(err) => {
			debug!(event = "error", class = "tls", "Failed to create TLS session: {}", err);
			conn.become_(ConnectionState::Failed);
			conn.become_(ConnectionState::Closed);
			return conn.history;
		},
	};
	if let Err(err) = Pin::new(&mut stream).accept().await {
		debug!(event = "error", class = "tls", "TLS connection failed: {}", err);
		conn.become_(ConnectionState::Failed);
		conn.become_(ConnectionState::Closed);
		return conn.history;
	}
	conn.become_(ConnectionState::Established);

	{
		let ssl = stream.ssl();
		let cipher = ssl.current_cipher().map_or("none", |cipher| cipher.name());
		info!(event = "established", version = ssl.version_str(), cipher = cipher,
			"{} Cipher: {}", ssl.version_str(), cipher);
	}

	if let Err(err) = stream.shutdown().await {
		debug!(event = "error", class = "io", "Failed to shut down TLS session: {}", err);
	}
	conn.become_(ConnectionState::Closed);
	conn.history
}

/// A bound listener ready to serve TLS connections.
pub struct Server {
	listener: TcpListener,
	acceptor: Arc<SslAcceptor>,
}

impl Server {
	/// Binds to `addr`, serving connections with `acceptor`.
	pub async fn bind(addr: SocketAddr, acceptor: SslAcceptor) -> Result<Server, ServerError> {
		let listener = TcpListener::bind(addr).await
			.map_err(|source| ServerError::Bind { addr, source })?;
		Ok(Server { listener, acceptor: Arc::new(acceptor) })
	}

	/// The address actually bound, which differs from the requested one when binding port 0.
	pub fn local_addr(&self) -> io::Result<SocketAddr> {
		self.listener.local_addr()
	}

	/// Accepts connections forever, handling each in its own task.
	///
	/// A failure on one connection, including a failure to accept it, never stops the loop.
	pub async fn run(self) {
		let listener_span = match self.local_addr() {
			Ok(addr) => tracing::info_span!("listener", bind.ip = %addr.ip(), bind.port = addr.port()),
			Err(_) => tracing::info_span!("listener"),
		};
		loop {
			match self.listener.accept().await {
				Ok((stream, remote_addr)) => {
					let span = tracing::info_span!(
						"session",
						remote.ip = %remote_addr.ip(),
						remote.port = remote_addr.port(),
					);
					span.follows_from(&listener_span);
					info!(parent: &span, event = "connect",
						"Connection from {} port={}", remote_addr.ip(), remote_addr.port());

					let acceptor = Arc::clone(&self.acceptor);
					tokio::spawn(async move {
						handle_connection(&acceptor, stream).await;
					}.instrument(span));
				},
				Err(err) => {
					error!(parent: &listener_span, event = "error", class = "io",
						"Failed to accept TCP connection: {}", err);
				},
			}
		}
	}
}

/// Runs the start-up sequence against `resolver`: resolve and encode the chain, build the TLS
/// context and bind the listener. Nothing is accepted until the chain is settled.
pub async fn start<R>(config: &ServerConfig, resolver: R) -> Result<Server, ServerError>
where R: ValidatingResolver + Send + 'static {
	let policy = config.chain_policy;
	let chain = match tlsa_query_name(config.port, &config.server_name) {
		Ok(qname) => tokio::task::spawn_blocking(move || prepare_chain(&resolver, &qname, policy)).await??,
		Err(err) if policy == ChainPolicy::Optional => {
			warn!(event = "chain", reason = %err,
				"Failed to get DNSSEC chain data for _{}._tcp.{}", config.port, config.server_name);
			None
		},
		Err(err) => return Err(err),
	};

	let acceptor = build_acceptor(&config.tls, chain.map(Arc::new))?;
	let server = Server::bind(SocketAddr::new(config.bind, config.port), acceptor).await?;
	match server.local_addr() {
		Ok(addr) => info!(event = "listening", "Server listening on port {}", addr.port()),
		Err(_) => info!(event = "listening", "Server listening on port {}", config.port),
	}
	Ok(server)
}

/// Starts the server described by `config`, resolving through its configured recursive resolver,
/// and serves until the process exits.
pub async fn run(config: ServerConfig) -> Result<(), ServerError> {
	let resolver = TcpResolver::new(config.resolver, config.resolver_timeout);
	start(&config, resolver).await?.run().await;
	Ok(())
}
