//! `chainserver`: a TLS server offering the DNSSEC authentication chain for its own TLSA record.

use std::process::ExitCode;

use clap::Parser;

use dnssec_chainserver::config::{Args, ServerConfig};
use dnssec_chainserver::server;

#[tokio::main]
async fn main() -> ExitCode {
	let config = ServerConfig::from(Args::parse());

	// Enable logging
	let level = if config.debug { tracing::Level::DEBUG } else { tracing::Level::INFO };
	if let Err(err) = tracing::subscriber::set_global_default(
		tracing_subscriber::FmtSubscriber::builder()
			.with_max_level(level)
			.finish(),
	) {
		eprintln!("Failed to set subscriber: {}", err);
		return ExitCode::FAILURE;
	}

	tracing::info!("Starting chainserver v{}...", env!("CARGO_PKG_VERSION"));
	match server::run(config).await {
		Ok(()) => ExitCode::SUCCESS,
		Err(err) => {
			tracing::error!(event = "error", "{}", err);
			ExitCode::FAILURE
		},
	}
}
