use anyhow::bail;
use clap::Parser;
use core::time::Duration;
use std::path::PathBuf;

pub const DEFAULT_SERVER_ADDR: &str = "0.0.0.0:50051";
pub const DEFAULT_STREAM_BUFFER_SIZE: usize = 16;
pub const DEFAULT_GREET_COUNT: usize = 10;
pub const DEFAULT_DEADLINE_WORK_MS: u64 = 3000;
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 3;

/// Runtime configuration for the `courier-server` binary.
///
/// These settings control buffering, pacing, and shutdown behavior of the
/// streaming handlers. All values are parsed from CLI arguments or
/// environment variables (a `.env` file is loaded first).
#[derive(Parser, Debug, Clone)]
#[command(
    name = "courier-server",
    version,
    about = "A gRPC server demonstrating every streaming interaction shape"
)]
pub struct CliArgs {
    /// Address to listen on (TCP or Unix socket path; use --uds for Unix
    /// socket).
    ///
    /// Example: "0.0.0.0:50051" or "/tmp/courier.sock"
    ///
    /// Environment variable: `SERVER_ADDR`
    #[arg(long, env = "SERVER_ADDR", default_value_t = String::from(DEFAULT_SERVER_ADDR))]
    pub server_addr: String,

    /// Listen on a Unix socket instead of TCP. If set, `SERVER_ADDR` must be a
    /// file path.
    #[arg(short, long, default_value_t = false)]
    pub uds: bool,

    /// Capacity of the buffer between a streaming handler's producer task and
    /// the gRPC response stream.
    ///
    /// Lower values make producers feel client backpressure sooner; higher
    /// values allow deeper pipelining.
    ///
    /// Environment variable: `STREAM_BUFFER_SIZE`
    #[arg(long, env = "STREAM_BUFFER_SIZE", default_value_t = DEFAULT_STREAM_BUFFER_SIZE)]
    pub stream_buffer_size: usize,

    /// Pause between two emitted prime factors, in milliseconds.
    ///
    /// Environment variable: `FACTOR_DELAY_MS`
    #[arg(long, env = "FACTOR_DELAY_MS", default_value_t = 0)]
    pub factor_delay_ms: u64,

    /// Number of greetings `GreetManyTimes` streams back.
    ///
    /// Environment variable: `GREET_COUNT`
    #[arg(long, env = "GREET_COUNT", default_value_t = DEFAULT_GREET_COUNT)]
    pub greet_count: usize,

    /// Pause between two `GreetManyTimes` greetings, in milliseconds.
    ///
    /// Environment variable: `GREET_INTERVAL_MS`
    #[arg(long, env = "GREET_INTERVAL_MS", default_value_t = 0)]
    pub greet_interval_ms: u64,

    /// Simulated processing time of `GreetWithDeadline`, in milliseconds.
    ///
    /// Callers with a shorter deadline receive `DEADLINE_EXCEEDED`.
    ///
    /// Environment variable: `DEADLINE_WORK_MS`
    #[arg(long, env = "DEADLINE_WORK_MS", default_value_t = DEFAULT_DEADLINE_WORK_MS)]
    pub deadline_work_ms: u64,

    /// Seconds to wait for in-flight calls to drain during shutdown before
    /// cancelling them.
    ///
    /// Environment variable: `SHUTDOWN_TIMEOUT`
    #[arg(long, env = "SHUTDOWN_TIMEOUT", default_value_t = DEFAULT_SHUTDOWN_TIMEOUT_SECS)]
    pub shutdown_timeout: u64,

    /// PEM certificate chain for TLS. Requires `--tls-key` and the `tls`
    /// feature.
    ///
    /// Environment variable: `TLS_CERT`
    #[arg(long, env = "TLS_CERT")]
    pub tls_cert: Option<PathBuf>,

    /// PEM private key for TLS. Requires `--tls-cert` and the `tls` feature.
    ///
    /// Environment variable: `TLS_KEY`
    #[arg(long, env = "TLS_KEY")]
    pub tls_key: Option<PathBuf>,
}

/// Certificate and key locations for serving over TLS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub server_addr: String,
    pub uds: bool,
    pub stream_buffer_size: usize,
    pub factor_delay: Duration,
    pub greet_count: usize,
    pub greet_interval: Duration,
    pub deadline_work: Duration,
    pub shutdown_timeout: Duration,
    pub tls: Option<TlsPaths>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server_addr: String::from(DEFAULT_SERVER_ADDR),
            uds: false,
            stream_buffer_size: DEFAULT_STREAM_BUFFER_SIZE,
            factor_delay: Duration::ZERO,
            greet_count: DEFAULT_GREET_COUNT,
            greet_interval: Duration::ZERO,
            deadline_work: Duration::from_millis(DEFAULT_DEADLINE_WORK_MS),
            shutdown_timeout: Duration::from_secs(DEFAULT_SHUTDOWN_TIMEOUT_SECS),
            tls: None,
        }
    }
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.stream_buffer_size == 0 {
            bail!("STREAM_BUFFER_SIZE must be greater than 0");
        }

        if args.greet_count == 0 {
            bail!("GREET_COUNT must be greater than 0");
        }

        let tls = match (args.tls_cert, args.tls_key) {
            (Some(cert), Some(key)) => Some(TlsPaths { cert, key }),
            (None, None) => None,
            _ => bail!("TLS_CERT and TLS_KEY must be provided together"),
        };

        if tls.is_some() && !cfg!(feature = "tls") {
            bail!("TLS was requested but the server was built without the `tls` feature");
        }

        Ok(Self {
            server_addr: args.server_addr,
            uds: args.uds,
            stream_buffer_size: args.stream_buffer_size,
            factor_delay: Duration::from_millis(args.factor_delay_ms),
            greet_count: args.greet_count,
            greet_interval: Duration::from_millis(args.greet_interval_ms),
            deadline_work: Duration::from_millis(args.deadline_work_ms),
            shutdown_timeout: Duration::from_secs(args.shutdown_timeout),
            tls,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> anyhow::Result<ServerConfig> {
        let args = CliArgs::try_parse_from(
            core::iter::once("courier-server").chain(extra.iter().copied()),
        )?;
        ServerConfig::try_from(args)
    }

    #[test]
    fn defaults_match_default_impl() {
        let parsed = parse(&[]).unwrap();
        let default = ServerConfig::default();
        assert_eq!(parsed.server_addr, default.server_addr);
        assert_eq!(parsed.stream_buffer_size, default.stream_buffer_size);
        assert_eq!(parsed.greet_count, default.greet_count);
        assert_eq!(parsed.deadline_work, default.deadline_work);
        assert_eq!(parsed.shutdown_timeout, default.shutdown_timeout);
        assert_eq!(parsed.tls, None);
    }

    #[test]
    fn durations_are_converted() {
        let config = parse(&[
            "--factor-delay-ms",
            "25",
            "--greet-interval-ms",
            "40",
            "--deadline-work-ms",
            "500",
        ])
        .unwrap();
        assert_eq!(config.factor_delay, Duration::from_millis(25));
        assert_eq!(config.greet_interval, Duration::from_millis(40));
        assert_eq!(config.deadline_work, Duration::from_millis(500));
    }

    #[test]
    fn rejects_zero_buffer_and_count() {
        assert!(parse(&["--stream-buffer-size", "0"]).is_err());
        assert!(parse(&["--greet-count", "0"]).is_err());
    }

    #[test]
    fn tls_paths_must_come_in_pairs() {
        let err = parse(&["--tls-cert", "server.crt"]).unwrap_err();
        assert!(err.to_string().contains("together"));
    }
}
