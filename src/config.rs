//! Command-line and environment configuration.

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::filter::LevelFilter;

/// Default HTTPS port for the webhook listener
pub const DEFAULT_HTTPS_PORT: u16 = 443;

/// Log level used when none is configured or the configured one is invalid
pub const DEFAULT_LOG_LEVEL: LevelFilter = LevelFilter::DEBUG;

/// Admission webhook for GMSA credential specs
#[derive(Parser, Debug, Clone)]
#[command(name = "gmsa-webhook", version, about)]
pub struct Config {
    /// Path to the PEM-encoded serving certificate
    #[arg(long = "tls-crt", env = "TLS_CRT")]
    pub tls_crt: PathBuf,

    /// Path to the PEM-encoded private key
    #[arg(long = "tls-key", env = "TLS_KEY")]
    pub tls_key: PathBuf,

    /// Port to serve HTTPS on
    #[arg(long = "https-port", env = "HTTPS_PORT", default_value_t = DEFAULT_HTTPS_PORT)]
    pub https_port: u16,

    /// Reload the certificate when the certificate or key file changes
    #[arg(long = "cert-reload", env = "CERT_RELOAD", default_value_t = false)]
    pub cert_reload: bool,

    /// Give pods using a credential spec a random hostname
    #[arg(long = "random-hostname", env = "RANDOM_HOSTNAME", default_value_t = false)]
    pub random_hostname: bool,

    /// Log level (trace, debug, info, warn, error, fatal or panic)
    #[arg(long = "log-level", env = "LOG_LEVEL", default_value = "debug")]
    pub log_level: String,
}

impl Config {
    /// Effective log level and whether the configured value was understood
    pub fn level_filter(&self) -> (LevelFilter, bool) {
        match parse_log_level(&self.log_level) {
            Some(level) => (level, true),
            None => (DEFAULT_LOG_LEVEL, false),
        }
    }
}

/// Parse a log level name.
///
/// `fatal` and `panic` have no tracing counterpart and map to `error`.
pub fn parse_log_level(value: &str) -> Option<LevelFilter> {
    match value.trim().to_ascii_lowercase().as_str() {
        "trace" => Some(LevelFilter::TRACE),
        "debug" => Some(LevelFilter::DEBUG),
        "info" => Some(LevelFilter::INFO),
        "warn" | "warning" => Some(LevelFilter::WARN),
        "error" | "fatal" | "panic" => Some(LevelFilter::ERROR),
        _ => None,
    }
}
