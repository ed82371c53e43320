//! Hostname verification policy.
//!
//! The policy is stricter than the engine's own name check: besides a valid
//! chain whose SAN covers the hostname, the leaf certificate's subject common
//! name must equal the hostname exactly. No wildcard expansion, no case
//! folding, no SAN or IP fallback.

use std::sync::Arc;

use parking_lot::Mutex;
use rustls::client::WebPkiServerVerifier;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{AlertDescription, CertificateError, DigitallySignedStruct, SignatureScheme};
use tracing::{debug, warn};
use x509_parser::prelude::{FromDer, X509Certificate};

/// Outcome of certificate verification at one point of the chain walk.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Verified,
    /// The engine's chain validation failed.
    Invalid(rustls::Error),
    /// The policy overrode the engine's outcome.
    Rejected {
        alert: AlertDescription,
        message: String,
    },
}

impl Verdict {
    pub fn is_verified(&self) -> bool {
        matches!(self, Self::Verified)
    }
}

/// Apply the common-name policy to the certificate at `depth` of the chain.
///
/// Depth 0 is the leaf. Only the leaf can change the verdict: a leaf whose
/// subject CN is missing, unparsable or different from `hostname` yields
/// [`Verdict::Rejected`] with `bad_certificate`, whatever `prior` was.
pub fn check_common_name(
    depth: usize,
    cert: &CertificateDer<'_>,
    hostname: &str,
    prior: Verdict,
) -> Verdict {
    if depth != 0 {
        return prior;
    }
    match common_name(cert) {
        Some(cn) if cn == hostname => prior,
        found => Verdict::Rejected {
            alert: AlertDescription::BadCertificate,
            message: match found {
                Some(cn) => format!(
                    "certificate common name {cn:?} does not match hostname {hostname:?}"
                ),
                None => format!("certificate has no common name to match hostname {hostname:?}"),
            },
        },
    }
}

/// First subject common name of a DER certificate.
pub fn common_name(cert: &CertificateDer<'_>) -> Option<String> {
    let (_, parsed) = X509Certificate::from_der(cert.as_ref()).ok()?;
    let cn = parsed.subject().iter_common_name().next()?;
    cn.as_str().ok().map(str::to_owned)
}

/// rustls verifier running the library's chain validation, then the
/// common-name policy.
///
/// A policy rejection is reported to rustls as
/// [`CertificateError::NotValidForName`], which rustls answers with a
/// `bad_certificate` alert. The rejection message is kept for
/// [`take_rejection`](Self::take_rejection).
///
/// The library validation includes its own name check: the certificate's
/// subject alternative names must cover the hostname. A certificate that
/// names the host only in its common name is therefore rejected, even though
/// the common-name policy alone would accept it.
#[derive(Debug)]
pub struct HostnameVerifier {
    inner: Arc<WebPkiServerVerifier>,
    hostname: String,
    rejection: Mutex<Option<String>>,
}

impl HostnameVerifier {
    pub fn new(inner: Arc<WebPkiServerVerifier>, hostname: impl Into<String>) -> Self {
        Self {
            inner,
            hostname: hostname.into(),
            rejection: Mutex::new(None),
        }
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Message of the last policy rejection, if any.
    pub fn take_rejection(&self) -> Option<String> {
        self.rejection.lock().take()
    }
}

impl ServerCertVerifier for HostnameVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        let prior = match self.inner.verify_server_cert(
            end_entity,
            intermediates,
            server_name,
            ocsp_response,
            now,
        ) {
            Ok(_) => Verdict::Verified,
            Err(e) => Verdict::Invalid(e),
        };

        let verdict = std::iter::once(end_entity)
            .chain(intermediates)
            .enumerate()
            .fold(prior, |verdict, (depth, cert)| {
                check_common_name(depth, cert, &self.hostname, verdict)
            });

        match verdict {
            Verdict::Verified => Ok(ServerCertVerified::assertion()),
            Verdict::Invalid(e) => {
                debug!(hostname = %self.hostname, error = %e, "certificate chain rejected");
                Err(e)
            }
            Verdict::Rejected { alert, message } => {
                warn!(hostname = %self.hostname, alert = ?alert, "{message}");
                *self.rejection.lock() = Some(message);
                Err(rustls::Error::InvalidCertificate(
                    CertificateError::NotValidForName,
                ))
            }
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.inner.supported_verify_schemes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcgen::{CertificateParams, DistinguishedName, DnType, KeyPair};

    fn cert_with_cn(cn: Option<&str>) -> CertificateDer<'static> {
        let key = KeyPair::generate().unwrap();
        let mut params = CertificateParams::new(vec!["example.com".to_string()]).unwrap();
        params.distinguished_name = DistinguishedName::new();
        if let Some(cn) = cn {
            params.distinguished_name.push(DnType::CommonName, cn);
        }
        params.self_signed(&key).unwrap().der().clone()
    }

    fn invalid() -> Verdict {
        Verdict::Invalid(rustls::Error::InvalidCertificate(
            CertificateError::UnknownIssuer,
        ))
    }

    #[test]
    fn matching_leaf_keeps_prior() {
        let cert = cert_with_cn(Some("example.com"));
        assert_eq!(
            check_common_name(0, &cert, "example.com", Verdict::Verified),
            Verdict::Verified
        );
        assert_eq!(check_common_name(0, &cert, "example.com", invalid()), invalid());
    }

    #[test]
    fn mismatched_leaf_is_rejected_even_if_chain_valid() {
        let cert = cert_with_cn(Some("attacker.com"));
        match check_common_name(0, &cert, "example.com", Verdict::Verified) {
            Verdict::Rejected { alert, message } => {
                assert_eq!(alert, AlertDescription::BadCertificate);
                assert!(message.contains("attacker.com"));
            }
            other => panic!("unexpected verdict: {other:?}"),
        }
    }

    #[test]
    fn mismatched_leaf_overrides_invalid_prior() {
        let cert = cert_with_cn(Some("attacker.com"));
        let verdict = check_common_name(0, &cert, "example.com", invalid());
        assert!(matches!(verdict, Verdict::Rejected { .. }));
    }

    #[test]
    fn intermediates_never_change_the_verdict() {
        let cert = cert_with_cn(Some("Some Intermediate CA"));
        assert_eq!(
            check_common_name(1, &cert, "example.com", Verdict::Verified),
            Verdict::Verified
        );
        assert_eq!(check_common_name(2, &cert, "example.com", invalid()), invalid());
    }

    #[test]
    fn comparison_is_exact() {
        let upper = cert_with_cn(Some("EXAMPLE.COM"));
        assert!(!check_common_name(0, &upper, "example.com", Verdict::Verified).is_verified());

        let wildcard = cert_with_cn(Some("*.example.com"));
        assert!(
            !check_common_name(0, &wildcard, "www.example.com", Verdict::Verified).is_verified()
        );
    }

    #[test]
    fn missing_common_name_is_a_mismatch() {
        let cert = cert_with_cn(None);
        assert_eq!(common_name(&cert), None);
        assert!(matches!(
            check_common_name(0, &cert, "example.com", Verdict::Verified),
            Verdict::Rejected { .. }
        ));
    }

    #[test]
    fn unparsable_leaf_is_a_mismatch() {
        let garbage = CertificateDer::from(vec![0x30, 0x03, 0x02, 0x01]);
        assert!(matches!(
            check_common_name(0, &garbage, "example.com", Verdict::Verified),
            Verdict::Rejected { .. }
        ));
    }

    #[test]
    fn common_name_reads_subject() {
        let cert = cert_with_cn(Some("example.com"));
        assert_eq!(common_name(&cert).as_deref(), Some("example.com"));
    }
}
