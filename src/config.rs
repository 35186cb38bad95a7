//! Command-line and environment configuration.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::server::ChainPolicy;
use crate::tls::TlsSettings;

/// A TLS server which offers a DNSSEC authentication chain for its own TLSA record in every
/// handshake (RFC 9102).
#[derive(Parser, Debug)]
#[command(name = "chainserver")]
#[command(author, version, about, long_about = None)]
pub struct Args {
	/// TCP port to listen on
	pub port: u16,

	/// Server name, used to look up `_<port>._tcp.<sname>` TLSA (defaults to this host's name)
	#[arg(long, env = "HOSTNAME")]
	pub sname: Option<String>,

	/// Server certificate (chain) in PEM format
	#[arg(long, default_value = "server.crt")]
	pub cert: PathBuf,

	/// Server private key in PEM format
	#[arg(long, default_value = "server.key")]
	pub key: PathBuf,

	/// CA certificates used to verify clients (defaults to the system store)
	#[arg(long = "ca-file")]
	pub ca_file: Option<PathBuf>,

	/// Require clients to authenticate with a certificate
	#[arg(long)]
	pub client_auth: bool,

	/// Debug logging
	#[arg(short, long)]
	pub debug: bool,

	/// Recursive DNS resolver to query, over TCP
	#[arg(long, env = "RESOLVER", default_value = "127.0.0.1:53")]
	pub resolver: SocketAddr,

	/// Seconds to wait on the resolver before giving up
	#[arg(long, default_value_t = 5)]
	pub resolver_timeout: u64,

	/// Address to listen on
	#[arg(long, default_value = "0.0.0.0")]
	pub bind: IpAddr,

	/// Refuse to start if the DNSSEC chain cannot be built
	#[arg(long)]
	pub require_chain: bool,
}

/// Everything the server needs to start, see [`crate::server::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
	/// The port to listen on, which is also the port in the TLSA name.
	pub port: u16,
	/// The name whose TLSA record is proven.
	pub server_name: String,
	/// The address to listen on.
	pub bind: IpAddr,
	/// The recursive resolver queried for the chain.
	pub resolver: SocketAddr,
	/// Timeout for each interaction with [`Self::resolver`].
	pub resolver_timeout: Duration,
	/// Certificates and client authentication.
	pub tls: TlsSettings,
	/// What to do if the chain cannot be built.
	pub chain_policy: ChainPolicy,
	/// Whether debug logging was requested.
	pub debug: bool,
}

/// The name this host knows itself by, or an empty string if it can't be determined.
fn local_hostname() -> String {
	hostname::get().map_or_else(|_| String::new(), |h| h.to_string_lossy().into_owned())
}

impl From<Args> for ServerConfig {
	fn from(args: Args) -> Self {
		ServerConfig {
			port: args.port,
			server_name: args.sname.unwrap_or_else(local_hostname),
			bind: args.bind,
			resolver: args.resolver,
			resolver_timeout: Duration::from_secs(args.resolver_timeout),
			tls: TlsSettings {
				cert: args.cert,
				key: args.key,
				ca_file: args.ca_file,
				client_auth: args.client_auth,
			},
			chain_policy: if args.require_chain { ChainPolicy::Required } else { ChainPolicy::Optional },
			debug: args.debug,
		}
	}
}
