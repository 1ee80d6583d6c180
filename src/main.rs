//! tag-echo: a single-threaded readiness-driven TCP echo server
//!
//! One thread multiplexes the listening socket and all client connections
//! over a bounded readiness poll. Each readable client gets one bounded
//! read and a write-back of its bytes prefixed with a serving tag.

mod config;
mod conn;
mod handler;
mod mux;
mod server;

use config::Config;
use server::EchoServer;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(
        host = %config.host,
        port = config.port,
        poll_interval_ms = config.poll_interval.as_millis() as u64,
        "Starting tag-echo server"
    );

    let mut server = EchoServer::bind(&config)?;
    server.run()?;

    Ok(())
}
