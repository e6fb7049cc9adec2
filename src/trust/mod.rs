// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Trust Policy Module
//!
//! Decides whether a presented certificate chain is trusted.
//!
//! ## Evaluation Model
//!
//! A policy is a tree of [`TrustNode`]s. Leaves are elementary
//! [`TrustCheck`]s; inner nodes combine their children:
//!
//! - `All` accepts iff every child accepts (stops at the first rejection)
//! - `Any` accepts iff some child accepts (stops at the first acceptance)
//!
//! Children are evaluated left to right. A leaf rejection is folded into its
//! node's outcome and kept as a diagnostic cause. `DecisionRequired` from a
//! memorizing leaf is never folded: it ends evaluation and reaches the
//! caller unchanged.
//!
//! A policy without any leaf rejects everything.

pub mod builder;
pub mod checks;
pub mod evaluator;
pub mod memorizing;

use std::fmt;
use std::sync::Arc;

use crate::chain::{AuthType, CertificateChain};
use crate::error::TrustError;

pub use builder::TrustPolicyBuilder;
pub use checks::{CaTrustCheck, DenyAllCheck, PinnedCertificateCheck};
pub use evaluator::{CompositeTrustEvaluator, TrustNode};
pub use memorizing::{DecisionRequest, MemorizingOptions, MemorizingTrustCheck};

/// An elementary accept/reject decision over a certificate chain.
///
/// Implementations must be safe to call concurrently from many handshakes.
pub trait TrustCheck: Send + Sync + fmt::Debug {
    /// Name used in rejection causes and logs.
    fn name(&self) -> &str;

    /// `Ok(())` accepts the chain.
    ///
    /// # Errors
    /// `TrustError::Untrusted` for an ordinary rejection; other variants
    /// for decision requests and store failures.
    fn check_trusted(&self, chain: &CertificateChain, auth_type: &AuthType)
        -> Result<(), TrustError>;
}

pub type TrustCheckRef = Arc<dyn TrustCheck>;
