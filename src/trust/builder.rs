// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Trust Policy Builder
//!
//! Fluent construction of a [`CompositeTrustEvaluator`].
//!
//! The builder keeps a current root node, initially an empty `All`. Checks
//! are appended to the current root. [`TrustPolicyBuilder::or`] and
//! [`TrustPolicyBuilder::and`] start a new `Any` / `All` whose first child
//! is everything built so far:
//!
//! ```text
//! use_roots(..).or().memorize(..)        => Any(All(roots), memorized)
//! self_signed_pem(..).and().memorize(..) => All(All(pinned), memorized)
//! ```
//!
//! A subtree with no checks is dropped when wrapped, so `or()` on a fresh
//! builder cannot produce a vacuously satisfied branch.
//!
//! Certificate material is parsed eagerly. The first parse failure is kept
//! and returned by [`TrustPolicyBuilder::build`].

use std::sync::Arc;

use rustls::pki_types::CertificateDer;
use rustls::RootCertStore;

use super::{
    CaTrustCheck, CompositeTrustEvaluator, DenyAllCheck, MemorizingOptions, MemorizingTrustCheck,
    PinnedCertificateCheck, TrustCheck, TrustCheckRef, TrustNode,
};
use crate::chain::CertificateChain;
use crate::error::TrustError;
use crate::storage::TrustDatabase;

#[derive(Debug, Default)]
pub struct TrustPolicyBuilder {
    root: TrustNode,
    memorizing: Option<Arc<MemorizingTrustCheck>>,
    error: Option<String>,
}

impl TrustPolicyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make everything built so far one alternative of a new `Any`.
    pub fn or(mut self) -> Self {
        let current = std::mem::take(&mut self.root);
        self.root = TrustNode::Any(Self::carry(current));
        self
    }

    /// Make everything built so far one requirement of a new `All`.
    pub fn and(mut self) -> Self {
        let current = std::mem::take(&mut self.root);
        self.root = TrustNode::All(Self::carry(current));
        self
    }

    fn carry(current: TrustNode) -> Vec<TrustNode> {
        if current.leaf_count() == 0 {
            Vec::new()
        } else {
            vec![current]
        }
    }

    fn push(&mut self, node: TrustNode) {
        match &mut self.root {
            TrustNode::All(children) | TrustNode::Any(children) => children.push(node),
            TrustNode::Leaf(_) => {
                let current = std::mem::take(&mut self.root);
                self.root = TrustNode::All(vec![current, node]);
            }
        }
    }

    fn push_result<C: TrustCheck + 'static>(mut self, check: Result<C, TrustError>) -> Self {
        match check {
            Ok(check) => self.push(TrustNode::leaf(check)),
            Err(e) => {
                tracing::warn!(error = %e, "Invalid trust policy input");
                if self.error.is_none() {
                    self.error = Some(e.to_string());
                }
            }
        }
        self
    }

    pub fn add_check(mut self, check: impl TrustCheck + 'static) -> Self {
        self.push(TrustNode::leaf(check));
        self
    }

    pub fn add_shared(mut self, check: TrustCheckRef) -> Self {
        self.push(TrustNode::Leaf(check));
        self
    }

    pub fn deny_all(self) -> Self {
        self.add_check(DenyAllCheck::new())
    }

    /// Trust chains anchored in `roots`, typically the platform store.
    pub fn use_roots(self, roots: impl Into<Arc<RootCertStore>>) -> Self {
        self.push_result(CaTrustCheck::new("system-roots", roots))
    }

    pub fn allow_ca_der(
        self,
        name: &str,
        certs: impl IntoIterator<Item = CertificateDer<'static>>,
    ) -> Self {
        self.push_result(CaTrustCheck::from_der(name, certs))
    }

    pub fn allow_ca_pem(self, name: &str, pem: &[u8]) -> Self {
        self.push_result(CaTrustCheck::from_pem(name, pem))
    }

    pub fn self_signed_der(
        self,
        name: &str,
        certs: impl IntoIterator<Item = CertificateDer<'static>>,
    ) -> Self {
        self.push_result(PinnedCertificateCheck::from_der(name, certs))
    }

    pub fn self_signed_pem(self, name: &str, pem: &[u8]) -> Self {
        self.push_result(PinnedCertificateCheck::from_pem(name, pem))
    }

    /// Add a memorizing check over `database` and keep a handle to it.
    ///
    /// Only one memorizing check per builder is supported; a second call
    /// is a configuration error.
    pub fn memorize(mut self, database: Arc<TrustDatabase>, options: MemorizingOptions) -> Self {
        if self.memorizing.is_some() {
            return self.push_result::<DenyAllCheck>(Err(TrustError::Configuration(
                "memorize() may only be called once".to_string(),
            )));
        }
        match MemorizingTrustCheck::open(database, options) {
            Ok(check) => {
                let check = Arc::new(check);
                self.push(TrustNode::Leaf(check.clone()));
                self.memorizing = Some(check);
                self
            }
            Err(e) => self.push_result::<DenyAllCheck>(Err(e)),
        }
    }

    pub fn memorizing(&self) -> Option<&Arc<MemorizingTrustCheck>> {
        self.memorizing.as_ref()
    }

    fn memorizing_or_err(&self) -> Result<&Arc<MemorizingTrustCheck>, TrustError> {
        self.memorizing
            .as_ref()
            .ok_or_else(|| TrustError::Configuration("no memorizing check configured".to_string()))
    }

    /// Persistently approve `chain` in the memorizing check.
    pub fn memorize_chain(&self, chain: &CertificateChain) -> Result<(), TrustError> {
        self.memorizing_or_err()?.approve_and_remember(chain)
    }

    /// Approve `chain` for this process only.
    pub fn allow_chain_once(&self, chain: &CertificateChain) -> Result<(), TrustError> {
        self.memorizing_or_err()?.approve_once(chain)
    }

    pub fn clear_memorized(&self, all_namespaces: bool) -> Result<(), TrustError> {
        self.memorizing_or_err()?.clear(all_namespaces)
    }

    /// Produce an evaluator over the current tree.
    ///
    /// The builder stays usable afterwards for the memorizing conveniences.
    ///
    /// # Errors
    /// `TrustError::Configuration` with the first invalid input.
    pub fn build(&self) -> Result<CompositeTrustEvaluator, TrustError> {
        if let Some(message) = &self.error {
            return Err(TrustError::Configuration(message.clone()));
        }
        Ok(CompositeTrustEvaluator::new(self.root.clone()))
    }
}
