//! Hot-reloadable TLS identity for the webhook listener.
//!
//! [`CertificateReloader`] owns the serving certificate and hands it to
//! rustls on every handshake. [`watch_certificate_files`] reloads it when
//! the certificate or key file changes on disk.

mod reloader;
mod watcher;

use std::path::PathBuf;
use std::sync::Arc;

use rustls::ServerConfig;
use rustls::crypto::aws_lc_rs;
use thiserror::Error;

pub use reloader::CertificateReloader;
pub use watcher::{CertificateLoader, watch_certificate_files};

/// ALPN protocols offered by the webhook listener
const ALPN_PROTOCOLS: [&[u8]; 2] = [b"h2", b"http/1.1"];

/// Errors loading or watching the serving certificate
#[derive(Error, Debug)]
pub enum CertificateError {
    #[error("unable to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("no certificate found in {}", path.display())]
    NoCertificate { path: PathBuf },

    #[error("invalid PEM in {}: {reason}", path.display())]
    Pem { path: PathBuf, reason: String },

    #[error("unsupported private key: {0}")]
    Key(rustls::Error),

    #[error("certificate and private key do not match: {0}")]
    Mismatch(rustls::Error),

    #[error("unable to watch {}: {source}", path.display())]
    Watch {
        path: PathBuf,
        source: notify::Error,
    },

    #[error("TLS configuration error: {0}")]
    Config(rustls::Error),
}

/// Build a server configuration whose certificate is chosen by `reloader`
/// at handshake time.
pub fn server_config(reloader: Arc<CertificateReloader>) -> Result<ServerConfig, CertificateError> {
    let mut config = ServerConfig::builder_with_provider(Arc::new(aws_lc_rs::default_provider()))
        .with_safe_default_protocol_versions()
        .map_err(CertificateError::Config)?
        .with_no_client_auth()
        .with_cert_resolver(reloader);
    config.alpn_protocols = ALPN_PROTOCOLS.iter().map(|p| p.to_vec()).collect();
    Ok(config)
}
