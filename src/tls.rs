// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! rustls integration.
//!
//! [`TrustPolicyVerifier`] plugs a trust policy into a rustls client. Policy
//! failures are returned as `CertificateError::Other` so the caller can
//! recover the [`TrustError`] with [`TrustError::from_tls_error`], e.g. to
//! show a `DecisionRequired` prompt and retry.

use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::client::verify_server_name;
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::server::ParsedCertificate;
use rustls::{ClientConfig, DigitallySignedStruct, SignatureScheme};

use crate::chain::{AuthType, CertificateChain};
use crate::error::TrustError;
use crate::trust::TrustCheckRef;

#[derive(Debug)]
pub struct TrustPolicyVerifier {
    policy: TrustCheckRef,
    auth_type: AuthType,
    verify_hostname: bool,
    provider: Arc<CryptoProvider>,
}

impl TrustPolicyVerifier {
    pub fn new(policy: TrustCheckRef) -> Self {
        Self {
            policy,
            auth_type: AuthType::default(),
            verify_hostname: true,
            provider: Arc::new(rustls::crypto::ring::default_provider()),
        }
    }

    /// Auth type handed to the policy. rustls does not report the key
    /// exchange at this point, so it defaults to `GENERIC`.
    pub fn with_auth_type(mut self, auth_type: AuthType) -> Self {
        self.auth_type = auth_type;
        self
    }

    /// Skip matching the server name against the leaf certificate.
    ///
    /// For servers reached by an address their pinned or memorized
    /// certificate does not name.
    pub fn without_hostname_verification(mut self) -> Self {
        self.verify_hostname = false;
        self
    }

    /// A client configuration that verifies servers with this policy.
    ///
    /// # Errors
    /// `TrustError::Configuration` if the provider supports no protocol
    /// version.
    pub fn into_client_config(self) -> Result<ClientConfig, TrustError> {
        let provider = self.provider.clone();
        let config = ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .map_err(|e| TrustError::Configuration(e.to_string()))?
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(self))
            .with_no_client_auth();
        Ok(config)
    }
}

impl ServerCertVerifier for TrustPolicyVerifier {
    /// `now` is not forwarded: `TrustCheck` carries no clock, and
    /// time-sensitive checks such as `CaTrustCheck` read the system clock
    /// when evaluated.
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        let chain = CertificateChain::from_presented(end_entity, intermediates);
        self.policy
            .check_trusted(&chain, &self.auth_type)
            .map_err(|e| {
                tracing::debug!(server_name = ?server_name, error = %e, "Server certificate refused");
                e.into_tls_error()
            })?;

        if self.verify_hostname {
            let parsed = ParsedCertificate::try_from(end_entity)?;
            verify_server_name(&parsed, server_name)?;
        }
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}
