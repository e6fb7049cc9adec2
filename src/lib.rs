// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Composite TLS Trust - policy-driven server certificate acceptance
//!
//! This crate decides whether a TLS server's certificate chain is trusted by
//! combining elementary checks (CA anchors, pinned self-signed certificates,
//! user-approved chains) into AND/OR policies. Unknown chains can be turned
//! into an explicit trust-on-first-use decision that the application
//! approves once or permanently.
//!
//! ## Modules
//!
//! - `chain` - Certificate chains, chain hashes, auth types
//! - `trust` - Checks, composite evaluator, memorizing check, builder
//! - `storage` - Durable memorized chains (redb)
//! - `tls` - rustls `ServerCertVerifier` adapter
//! - `config` - Environment configuration
//! - `logging` - Tracing subscriber setup

pub mod chain;
pub mod config;
pub mod error;
pub mod logging;
pub mod storage;
pub mod tls;
pub mod trust;

#[cfg(test)]
pub(crate) mod test_support;

pub use chain::{AuthType, CertificateChain, ChainHash};
pub use error::{TrustError, TrustErrorKind, TrustRejected};
pub use storage::{AccessSecret, ApprovalScope, MemorizedCertificateStore, TrustDatabase};
pub use tls::TrustPolicyVerifier;
pub use trust::{
    CompositeTrustEvaluator, DecisionRequest, MemorizingOptions, MemorizingTrustCheck, TrustCheck,
    TrustNode, TrustPolicyBuilder,
};
