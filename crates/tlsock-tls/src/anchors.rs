//! Trusted root certificates.

use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use rustls::RootCertStore;
use rustls::pki_types::CertificateDer;
use thiserror::Error;
use tracing::debug;

/// Errors raised while building a [`TrustAnchors`] set.
#[derive(Debug, Error)]
pub enum AnchorError {
    #[error("failed to read CA file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid PEM: {0}")]
    Pem(#[source] std::io::Error),

    #[error("invalid trust anchor: {0}")]
    Certificate(#[from] rustls::Error),

    #[error("trust anchor set is empty")]
    Empty,
}

/// Immutable set of trusted root certificates.
///
/// Clones share the underlying store.
#[derive(Debug, Clone)]
pub struct TrustAnchors {
    roots: Arc<RootCertStore>,
}

impl TrustAnchors {
    /// Wrap an existing root store. Empty stores are rejected.
    pub fn new(roots: RootCertStore) -> Result<Self, AnchorError> {
        if roots.is_empty() {
            return Err(AnchorError::Empty);
        }
        Ok(Self {
            roots: Arc::new(roots),
        })
    }

    /// Build from DER-encoded certificates. Any unusable certificate fails the whole set.
    pub fn from_der<I>(certs: I) -> Result<Self, AnchorError>
    where
        I: IntoIterator<Item = CertificateDer<'static>>,
    {
        let mut roots = RootCertStore::empty();
        for cert in certs {
            roots.add(cert)?;
        }
        Self::new(roots)
    }

    /// Build from every `CERTIFICATE` block in a PEM bundle.
    pub fn from_pem(pem: &[u8]) -> Result<Self, AnchorError> {
        let mut reader = BufReader::new(pem);
        let certs = rustls_pemfile::certs(&mut reader)
            .collect::<Result<Vec<_>, _>>()
            .map_err(AnchorError::Pem)?;
        Self::from_der(certs)
    }

    pub fn from_pem_file(path: impl AsRef<Path>) -> Result<Self, AnchorError> {
        let path = path.as_ref();
        let pem = std::fs::read(path).map_err(|source| AnchorError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let anchors = Self::from_pem(&pem)?;
        debug!(path = %path.display(), count = anchors.len(), "loaded trust anchors");
        Ok(anchors)
    }

    /// The Mozilla root program bundled with `webpki-roots`.
    pub fn webpki_roots() -> Self {
        let mut roots = RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        Self {
            roots: Arc::new(roots),
        }
    }

    /// Shared handle to the root store.
    pub fn roots(&self) -> Arc<RootCertStore> {
        self.roots.clone()
    }

    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn ca_cert() -> rcgen::Certificate {
        let key = rcgen::KeyPair::generate().unwrap();
        let mut params = rcgen::CertificateParams::new(Vec::<String>::new()).unwrap();
        params.is_ca = rcgen::IsCa::Ca(rcgen::BasicConstraints::Unconstrained);
        params.self_signed(&key).unwrap()
    }

    #[test]
    fn from_pem_reads_all_certificates() {
        let pem = format!("{}{}", ca_cert().pem(), ca_cert().pem());
        let anchors = TrustAnchors::from_pem(pem.as_bytes()).unwrap();
        assert_eq!(anchors.len(), 2);
    }

    #[test]
    fn from_pem_file_round_trips_through_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(ca_cert().pem().as_bytes()).unwrap();
        let anchors = TrustAnchors::from_pem_file(file.path()).unwrap();
        assert_eq!(anchors.len(), 1);
    }

    #[test]
    fn missing_file_is_read_error() {
        let err = TrustAnchors::from_pem_file("/nonexistent/roots.pem").unwrap_err();
        assert!(matches!(err, AnchorError::Read { .. }));
    }

    #[test]
    fn empty_inputs_are_rejected() {
        assert!(matches!(TrustAnchors::from_pem(b""), Err(AnchorError::Empty)));
        assert!(matches!(
            TrustAnchors::from_der(Vec::new()),
            Err(AnchorError::Empty)
        ));
    }

    #[test]
    fn webpki_roots_are_not_empty() {
        let anchors = TrustAnchors::webpki_roots();
        assert!(!anchors.is_empty());
        // Clones share the store.
        let clone = anchors.clone();
        assert!(Arc::ptr_eq(&anchors.roots(), &clone.roots()));
    }
}
