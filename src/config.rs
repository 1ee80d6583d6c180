//! Configuration for the echo server.
//!
//! Only host and port are exposed on the command line; the remaining knobs
//! (backlog, poll interval, buffer sizing) are fixed server defaults.

use clap::Parser;
use std::time::Duration;

/// Command-line arguments for the echo server
#[derive(Parser, Debug)]
#[command(name = "tag-echo")]
#[command(version = "0.1.0")]
#[command(about = "A single-threaded readiness-driven TCP echo server", long_about = None)]
pub struct CliArgs {
    /// Host to bind to
    #[arg(long, default_value = "localhost")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = 2222)]
    pub port: u16,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Accept queue depth passed to listen()
    pub backlog: i32,
    /// Bound on each readiness poll, so the loop can interleave periodic
    /// work later instead of blocking indefinitely
    pub poll_interval: Duration,
    /// Upper bound on a single read from a client socket
    pub read_buffer_size: usize,
    /// Cap on simultaneously open client connections
    pub max_connections: usize,
    pub log_level: String,
}

impl Config {
    /// Load configuration from CLI arguments.
    pub fn load() -> Self {
        Self::from_args(CliArgs::parse())
    }

    fn from_args(cli: CliArgs) -> Self {
        Config {
            host: cli.host,
            port: cli.port,
            backlog: default_backlog(),
            poll_interval: default_poll_interval(),
            read_buffer_size: default_read_buffer_size(),
            max_connections: default_max_connections(),
            log_level: cli.log_level,
        }
    }
}

fn default_backlog() -> i32 {
    100
}

fn default_poll_interval() -> Duration {
    Duration::from_millis(500)
}

fn default_read_buffer_size() -> usize {
    1024
}

fn default_max_connections() -> usize {
    10_000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cli = CliArgs::try_parse_from(["tag-echo"]).unwrap();
        let config = Config::from_args(cli);
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 2222);
        assert_eq!(config.backlog, 100);
        assert_eq!(config.poll_interval, Duration::from_millis(500));
        assert_eq!(config.read_buffer_size, 1024);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_cli_overrides() {
        let cli = CliArgs::try_parse_from([
            "tag-echo",
            "--host",
            "0.0.0.0",
            "--port",
            "9000",
            "--log-level",
            "debug",
        ])
        .unwrap();
        let config = Config::from_args(cli);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 9000);
        assert_eq!(config.log_level, "debug");
    }
}
