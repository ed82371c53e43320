//! Offline hostname policy check for a PEM certificate chain.

use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use tlsock_tls::rustls::client::WebPkiServerVerifier;
use tlsock_tls::rustls::client::danger::ServerCertVerifier;
use tlsock_tls::rustls::crypto::CryptoProvider;
use tlsock_tls::rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use tlsock_tls::verify::common_name;
use tlsock_tls::{HostnameVerifier, TrustAnchors, Verdict, check_common_name};

use crate::error::ClientError;

/// Result of checking a certificate chain against a hostname.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckReport {
    pub hostname: String,
    /// Subject common name of the leaf.
    pub common_name: Option<String>,
    /// Whether the chain was also validated against trust anchors.
    pub chain_checked: bool,
    pub verdict: Verdict,
}

impl CheckReport {
    pub fn accepted(&self) -> bool {
        self.verdict.is_verified()
    }
}

/// Read every certificate in a PEM file, leaf first.
pub fn read_chain(path: impl AsRef<Path>) -> Result<Vec<CertificateDer<'static>>, ClientError> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)?;
    let chain = rustls_pemfile::certs(&mut BufReader::new(file)).collect::<Result<Vec<_>, _>>()?;
    if chain.is_empty() {
        return Err(ClientError::NoCertificate(path.display().to_string()));
    }
    Ok(chain)
}

/// Check `chain` for `hostname`.
///
/// Without `anchors` only the common-name policy runs. With `anchors` the
/// full verifier runs: chain validation first, then the policy.
pub fn check_chain(
    chain: &[CertificateDer<'static>],
    hostname: &str,
    anchors: Option<&TrustAnchors>,
) -> Result<CheckReport, ClientError> {
    let Some((leaf, intermediates)) = chain.split_first() else {
        return Err(ClientError::NoCertificate(hostname.to_string()));
    };

    let verdict = match anchors {
        None => chain
            .iter()
            .enumerate()
            .fold(Verdict::Verified, |verdict, (depth, cert)| {
                check_common_name(depth, cert, hostname, verdict)
            }),
        Some(anchors) => verify_with_anchors(leaf, intermediates, hostname, anchors)?,
    };

    Ok(CheckReport {
        hostname: hostname.to_string(),
        common_name: common_name(leaf),
        chain_checked: anchors.is_some(),
        verdict,
    })
}

fn verify_with_anchors(
    leaf: &CertificateDer<'static>,
    intermediates: &[CertificateDer<'static>],
    hostname: &str,
    anchors: &TrustAnchors,
) -> Result<Verdict, ClientError> {
    let server_name = ServerName::try_from(hostname)
        .map_err(|e| ClientError::Usage(format!("invalid hostname {hostname:?}: {e}")))?;
    let provider = CryptoProvider::get_default()
        .cloned()
        .unwrap_or_else(|| Arc::new(tlsock_tls::rustls::crypto::aws_lc_rs::default_provider()));
    let webpki = WebPkiServerVerifier::builder_with_provider(anchors.roots(), provider)
        .build()
        .map_err(|e| ClientError::Usage(format!("cannot build verifier: {e}")))?;
    let verifier = HostnameVerifier::new(webpki, hostname);

    match verifier.verify_server_cert(leaf, intermediates, &server_name, &[], UnixTime::now()) {
        Ok(_) => Ok(Verdict::Verified),
        Err(e) => Ok(match verifier.take_rejection() {
            Some(message) => Verdict::Rejected {
                alert: tlsock_tls::rustls::AlertDescription::BadCertificate,
                message,
            },
            None => Verdict::Invalid(e),
        }),
    }
}
