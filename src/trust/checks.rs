// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Elementary trust checks: deny-all, CA path validation and pinned
//! self-signed certificates.

use std::sync::Arc;

use rustls::client::verify_server_cert_signed_by_trust_anchor;
use rustls::crypto::WebPkiSupportedAlgorithms;
use rustls::pki_types::{CertificateDer, UnixTime};
use rustls::server::ParsedCertificate;
use rustls::RootCertStore;

use super::TrustCheck;
use crate::chain::{AuthType, CertificateChain};
use crate::error::TrustError;

const PEM_CERTIFICATE_TAG: &str = "CERTIFICATE";

/// Extract every `CERTIFICATE` block from PEM text.
///
/// # Errors
/// `TrustError::Configuration` when the input is not PEM or holds no
/// certificate.
pub(crate) fn parse_pem_certificates(pem: &[u8]) -> Result<Vec<CertificateDer<'static>>, TrustError> {
    let blocks = pem::parse_many(pem)
        .map_err(|e| TrustError::Configuration(format!("invalid PEM input: {e}")))?;
    let certs: Vec<_> = blocks
        .into_iter()
        .filter(|block| block.tag() == PEM_CERTIFICATE_TAG)
        .map(|block| CertificateDer::from(block.into_contents()))
        .collect();
    if certs.is_empty() {
        return Err(TrustError::Configuration(
            "PEM input contains no CERTIFICATE block".to_string(),
        ));
    }
    Ok(certs)
}

/// Rejects every chain.
#[derive(Debug, Clone, Default)]
pub struct DenyAllCheck;

impl DenyAllCheck {
    pub const NAME: &'static str = "deny-all";

    pub fn new() -> Self {
        Self
    }
}

impl TrustCheck for DenyAllCheck {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn check_trusted(&self, _chain: &CertificateChain, _auth_type: &AuthType) -> Result<(), TrustError> {
        Err(TrustError::untrusted(Self::NAME, "all certificates are denied"))
    }
}

/// Accepts chains that validate to one of a set of trust anchors.
///
/// Path building and signature checks are delegated to webpki through
/// rustls. The server name is not checked here.
#[derive(Debug, Clone)]
pub struct CaTrustCheck {
    name: String,
    roots: Arc<RootCertStore>,
    algorithms: WebPkiSupportedAlgorithms,
}

impl CaTrustCheck {
    /// Check against an existing root store, e.g. the platform roots.
    ///
    /// # Errors
    /// `TrustError::Configuration` if `roots` is empty.
    pub fn new(name: impl Into<String>, roots: impl Into<Arc<RootCertStore>>) -> Result<Self, TrustError> {
        let name = name.into();
        let roots = roots.into();
        if roots.is_empty() {
            return Err(TrustError::Configuration(format!(
                "{name}: trust anchor set is empty"
            )));
        }
        Ok(Self {
            name,
            roots,
            algorithms: rustls::crypto::ring::default_provider().signature_verification_algorithms,
        })
    }

    /// Check against the given DER-encoded CA certificates.
    ///
    /// # Errors
    /// `TrustError::Configuration` if any certificate cannot be used as a
    /// trust anchor, or none were given.
    pub fn from_der(
        name: impl Into<String>,
        certs: impl IntoIterator<Item = CertificateDer<'static>>,
    ) -> Result<Self, TrustError> {
        let name = name.into();
        let mut roots = RootCertStore::empty();
        for cert in certs {
            roots.add(cert).map_err(|e| {
                TrustError::Configuration(format!("{name}: invalid CA certificate: {e}"))
            })?;
        }
        Self::new(name, roots)
    }

    /// Check against the CA certificates in a PEM bundle.
    pub fn from_pem(name: impl Into<String>, pem: &[u8]) -> Result<Self, TrustError> {
        Self::from_der(name, parse_pem_certificates(pem)?)
    }

    pub fn anchor_count(&self) -> usize {
        self.roots.len()
    }

    /// Validates `chain` against the anchors with validity periods
    /// evaluated at `now`.
    pub fn check_trusted_at(&self, chain: &CertificateChain, now: UnixTime) -> Result<(), TrustError> {
        let leaf = chain
            .leaf()
            .ok_or_else(|| TrustError::untrusted(&self.name, "empty certificate chain"))?;
        let parsed = ParsedCertificate::try_from(leaf)
            .map_err(|e| TrustError::untrusted(&self.name, e.to_string()))?;
        verify_server_cert_signed_by_trust_anchor(
            &parsed,
            &self.roots,
            chain.intermediates(),
            now,
            self.algorithms.all,
        )
        .map_err(|e| TrustError::untrusted(&self.name, e.to_string()))
    }
}

impl TrustCheck for CaTrustCheck {
    fn name(&self) -> &str {
        &self.name
    }

    fn check_trusted(&self, chain: &CertificateChain, _auth_type: &AuthType) -> Result<(), TrustError> {
        self.check_trusted_at(chain, UnixTime::now())
    }
}

/// Accepts chains whose end-entity certificate is one of a pinned set,
/// byte for byte.
///
/// Suited to self-signed server certificates, which cannot act as their
/// own trust anchor in webpki.
#[derive(Debug, Clone)]
pub struct PinnedCertificateCheck {
    name: String,
    pinned: Arc<[CertificateDer<'static>]>,
}

impl PinnedCertificateCheck {
    /// # Errors
    /// `TrustError::Configuration` if no certificate is given.
    pub fn from_der(
        name: impl Into<String>,
        certs: impl IntoIterator<Item = CertificateDer<'static>>,
    ) -> Result<Self, TrustError> {
        let name = name.into();
        let pinned: Vec<_> = certs.into_iter().collect();
        if pinned.is_empty() {
            return Err(TrustError::Configuration(format!(
                "{name}: no pinned certificates"
            )));
        }
        Ok(Self {
            name,
            pinned: pinned.into(),
        })
    }

    pub fn from_pem(name: impl Into<String>, pem: &[u8]) -> Result<Self, TrustError> {
        Self::from_der(name, parse_pem_certificates(pem)?)
    }
}

impl TrustCheck for PinnedCertificateCheck {
    fn name(&self) -> &str {
        &self.name
    }

    fn check_trusted(&self, chain: &CertificateChain, _auth_type: &AuthType) -> Result<(), TrustError> {
        let leaf = chain
            .leaf()
            .ok_or_else(|| TrustError::untrusted(&self.name, "empty certificate chain"))?;
        if self.pinned.iter().any(|pinned| pinned == leaf) {
            Ok(())
        } else {
            Err(TrustError::untrusted(
                &self.name,
                "end-entity certificate is not pinned",
            ))
        }
    }
}
