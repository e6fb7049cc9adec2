// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Trust evaluation errors.
//!
//! Every failure of a trust check is a [`TrustError`]. The application needs
//! to tell three situations apart after a rejected connection:
//!
//! - the certificate is simply untrusted (`Untrusted` / `Rejected`)
//! - the certificate needs a one-time human decision (`DecisionRequired`)
//! - the trust store itself is broken (`StoreRead` / `StoreWrite`)
//!
//! [`TrustError::kind`] collapses the variants into exactly those buckets.

use std::fmt;
use std::sync::Arc;

use crate::chain::{CertificateChain, ChainHash};
use crate::storage::StoreError;
use crate::trust::DecisionRequest;

#[derive(Debug, thiserror::Error)]
pub enum TrustError {
    /// A single check refused the chain.
    #[error("{check} rejected the certificate chain: {reason}")]
    Untrusted { check: String, reason: String },

    /// No branch of the policy accepted the chain.
    #[error("{0}")]
    Rejected(TrustRejected),

    /// The chain is unknown and needs an explicit approval before a retry.
    #[error("certificate chain {} is not memorized; a trust decision is required", .0.chain().hash())]
    DecisionRequired(DecisionRequest),

    /// The memorized-certificate store could not be read.
    #[error("memorized certificate store unreadable: {0}")]
    StoreRead(#[source] StoreError),

    /// The memorized-certificate store could not be written.
    #[error("memorized certificate store write failed: {0}")]
    StoreWrite(#[source] StoreError),

    /// The policy or store was configured incorrectly.
    #[error("trust configuration error: {0}")]
    Configuration(String),
}

/// Coarse classification for user-facing handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustErrorKind {
    Untrusted,
    DecisionRequired,
    StoreFailure,
    Configuration,
}

impl TrustError {
    pub fn untrusted(check: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Untrusted {
            check: check.into(),
            reason: reason.into(),
        }
    }

    /// Stable machine-readable code.
    pub fn error_code(&self) -> &'static str {
        match self {
            TrustError::Untrusted { .. } => "untrusted",
            TrustError::Rejected(_) => "trust_rejected",
            TrustError::DecisionRequired(_) => "decision_required",
            TrustError::StoreRead(_) => "store_read_error",
            TrustError::StoreWrite(_) => "store_write_error",
            TrustError::Configuration(_) => "configuration_error",
        }
    }

    pub fn kind(&self) -> TrustErrorKind {
        match self {
            TrustError::Untrusted { .. } => TrustErrorKind::Untrusted,
            TrustError::Rejected(rejected) if rejected.has_store_failure() => {
                TrustErrorKind::StoreFailure
            }
            TrustError::Rejected(_) => TrustErrorKind::Untrusted,
            TrustError::DecisionRequired(_) => TrustErrorKind::DecisionRequired,
            TrustError::StoreRead(_) | TrustError::StoreWrite(_) => TrustErrorKind::StoreFailure,
            TrustError::Configuration(_) => TrustErrorKind::Configuration,
        }
    }

    /// The pending decision, if this error is one.
    pub fn decision_request(&self) -> Option<&DecisionRequest> {
        match self {
            TrustError::DecisionRequired(request) => Some(request),
            _ => None,
        }
    }

    /// Recover a `TrustError` from the error rustls reports for a failed
    /// handshake verified by [`crate::tls::TrustPolicyVerifier`].
    pub fn from_tls_error(err: &rustls::Error) -> Option<&TrustError> {
        match err {
            rustls::Error::InvalidCertificate(rustls::CertificateError::Other(other)) => {
                other.0.downcast_ref::<TrustError>()
            }
            _ => None,
        }
    }

    /// Wrap into the error rustls expects from a certificate verifier.
    pub fn into_tls_error(self) -> rustls::Error {
        rustls::Error::InvalidCertificate(rustls::CertificateError::Other(rustls::OtherError(
            Arc::new(self),
        )))
    }
}

/// Total rejection of a chain by a composite policy.
///
/// Keeps the rejected chain and every leaf-level cause so the application
/// can report which check refused the chain and why.
#[derive(Debug)]
pub struct TrustRejected {
    pub chain: CertificateChain,
    pub chain_hash: ChainHash,
    pub causes: Vec<TrustError>,
}

impl TrustRejected {
    pub fn new(chain: CertificateChain, causes: Vec<TrustError>) -> Self {
        Self {
            chain_hash: chain.hash(),
            chain,
            causes,
        }
    }

    /// Whether any leaf failed because the memorized store was unusable.
    pub fn has_store_failure(&self) -> bool {
        self.causes.iter().any(|cause| match cause {
            TrustError::StoreRead(_) | TrustError::StoreWrite(_) => true,
            TrustError::Rejected(inner) => inner.has_store_failure(),
            _ => false,
        })
    }

    /// Names of the checks that rejected the chain.
    pub fn rejecting_checks(&self) -> Vec<&str> {
        self.causes
            .iter()
            .filter_map(|cause| match cause {
                TrustError::Untrusted { check, .. } => Some(check.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl fmt::Display for TrustRejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "certificate chain {} rejected by trust policy", self.chain_hash)?;
        for (i, cause) in self.causes.iter().enumerate() {
            let sep = if i == 0 { ": " } else { "; " };
            write!(f, "{sep}{cause}")?;
        }
        Ok(())
    }
}
