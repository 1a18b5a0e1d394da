use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;
use rustls::crypto::aws_lc_rs::sign::any_supported_type;
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::server::{ClientHello, ResolvesServerCert};
use rustls::sign::CertifiedKey;
use rustls::{Error as TlsError, InconsistentKeys};
use tracing::info;

use super::CertificateError;
use super::watcher::CertificateLoader;

/// Owner of the serving certificate.
///
/// The certified key is immutable and replaced as a whole, so a handshake
/// sees either the previous or the new identity, never a mix. Loads are
/// serialized; selection takes no lock.
pub struct CertificateReloader {
    cert_path: PathBuf,
    key_path: PathBuf,
    current: ArcSwap<CertifiedKey>,
    reload_lock: Mutex<()>,
}

impl CertificateReloader {
    /// Load the initial certificate from `cert_path` and `key_path`.
    ///
    /// Fails if the pair cannot be loaded; there is no previous identity to
    /// fall back to at startup.
    pub fn new(
        cert_path: impl Into<PathBuf>,
        key_path: impl Into<PathBuf>,
    ) -> Result<Self, CertificateError> {
        let cert_path = cert_path.into();
        let key_path = key_path.into();
        let initial = load_certified_key(&cert_path, &key_path)?;

        Ok(Self {
            cert_path,
            key_path,
            current: ArcSwap::from_pointee(initial),
            reload_lock: Mutex::new(()),
        })
    }

    /// Reload the certificate pair from disk and swap it in.
    ///
    /// On failure the active certificate is left untouched.
    pub fn load(&self) -> Result<(), CertificateError> {
        // a poisoned lock only means a previous load panicked; the slot is still whole
        let _guard = self
            .reload_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let key = load_certified_key(&self.cert_path, &self.key_path)?;
        self.current.store(Arc::new(key));
        info!(
            cert = %self.cert_path.display(),
            key = %self.key_path.display(),
            "Loaded TLS certificate"
        );
        Ok(())
    }

    /// The currently active certificate
    pub fn select_certificate(&self) -> Arc<CertifiedKey> {
        self.current.load_full()
    }
}

impl fmt::Debug for CertificateReloader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CertificateReloader")
            .field("cert_path", &self.cert_path)
            .field("key_path", &self.key_path)
            .finish_non_exhaustive()
    }
}

impl ResolvesServerCert for CertificateReloader {
    fn resolve(&self, _client_hello: ClientHello<'_>) -> Option<Arc<CertifiedKey>> {
        Some(self.select_certificate())
    }
}

impl CertificateLoader for CertificateReloader {
    fn cert_path(&self) -> &Path {
        &self.cert_path
    }

    fn key_path(&self) -> &Path {
        &self.key_path
    }

    fn reload(&self) -> Result<(), CertificateError> {
        self.load()
    }
}

fn read(path: &Path) -> Result<Vec<u8>, CertificateError> {
    std::fs::read(path).map_err(|source| CertificateError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Parse a PEM certificate chain and private key into a validated key pair
fn load_certified_key(cert_path: &Path, key_path: &Path) -> Result<CertifiedKey, CertificateError> {
    let cert_pem = read(cert_path)?;
    let key_pem = read(key_path)?;

    let chain = CertificateDer::pem_slice_iter(&cert_pem)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| CertificateError::Pem {
            path: cert_path.to_path_buf(),
            reason: e.to_string(),
        })?;
    if chain.is_empty() {
        return Err(CertificateError::NoCertificate {
            path: cert_path.to_path_buf(),
        });
    }

    let key_der = PrivateKeyDer::from_pem_slice(&key_pem).map_err(|e| CertificateError::Pem {
        path: key_path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let signing_key = any_supported_type(&key_der).map_err(CertificateError::Key)?;

    let certified = CertifiedKey::new(chain, signing_key);
    match certified.keys_match() {
        Ok(()) | Err(TlsError::InconsistentKeys(InconsistentKeys::Unknown)) => Ok(certified),
        Err(e) => Err(CertificateError::Mismatch(e)),
    }
}
