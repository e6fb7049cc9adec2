// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Memorizing Trust Check
//!
//! Accepts chains the user approved earlier. With trust-on-first-use
//! enabled, an unknown chain yields `TrustError::DecisionRequired` instead
//! of a plain rejection. The decision protocol is:
//!
//! 1. A handshake fails with `DecisionRequired` carrying the chain.
//! 2. The application asks the user.
//! 3. On approval it calls [`MemorizingTrustCheck::approve_and_remember`]
//!    (persistent) or [`MemorizingTrustCheck::approve_once`] (this process
//!    only) and retries the connection.
//!
//! Nothing is ever approved implicitly.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::TrustCheck;
use crate::chain::{AuthType, CertificateChain, ChainHash};
use crate::error::TrustError;
use crate::storage::{AccessSecret, ApprovalScope, MemorizedCertificateStore, TrustDatabase};

/// An unknown chain awaiting a human decision.
#[derive(Debug, Clone)]
pub struct DecisionRequest {
    chain: CertificateChain,
    cause: String,
}

impl DecisionRequest {
    pub fn new(chain: CertificateChain, cause: impl Into<String>) -> Self {
        Self {
            chain,
            cause: cause.into(),
        }
    }

    pub fn chain(&self) -> &CertificateChain {
        &self.chain
    }

    pub fn chain_hash(&self) -> ChainHash {
        self.chain.hash()
    }

    pub fn cause(&self) -> &str {
        &self.cause
    }
}

/// Settings for [`MemorizingTrustCheck::open`].
#[derive(Debug, Clone)]
pub struct MemorizingOptions {
    pub namespace: String,
    pub secret: AccessSecret,
    pub trust_on_first_use: bool,
    pub max_age: Option<Duration>,
}

impl MemorizingOptions {
    pub fn new(namespace: impl Into<String>, secret: AccessSecret) -> Self {
        Self {
            namespace: namespace.into(),
            secret,
            trust_on_first_use: false,
            max_age: None,
        }
    }

    pub fn trust_on_first_use(mut self, enabled: bool) -> Self {
        self.trust_on_first_use = enabled;
        self
    }

    pub fn max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }
}

pub struct MemorizingTrustCheck {
    name: String,
    store: Arc<MemorizedCertificateStore>,
    trust_on_first_use: AtomicBool,
}

impl MemorizingTrustCheck {
    pub const NAME: &'static str = "memorized";

    /// Wrap an open store. Trust-on-first-use starts disabled.
    pub fn new(store: Arc<MemorizedCertificateStore>) -> Self {
        Self {
            name: format!("{}:{}", Self::NAME, store.namespace()),
            store,
            trust_on_first_use: AtomicBool::new(false),
        }
    }

    /// Open the namespace described by `options` in `database`.
    ///
    /// # Errors
    /// `TrustError::Configuration` for an invalid namespace.
    pub fn open(database: Arc<TrustDatabase>, options: MemorizingOptions) -> Result<Self, TrustError> {
        let mut store = MemorizedCertificateStore::open(database, options.namespace, options.secret)
            .map_err(|e| TrustError::Configuration(e.to_string()))?;
        if let Some(max_age) = options.max_age {
            store = store.with_max_age(max_age);
        }
        let check = Self::new(Arc::new(store));
        check.set_trust_on_first_use(options.trust_on_first_use);
        Ok(check)
    }

    pub fn store(&self) -> &Arc<MemorizedCertificateStore> {
        &self.store
    }

    pub fn trust_on_first_use(&self) -> bool {
        self.trust_on_first_use.load(Ordering::Acquire)
    }

    /// Toggle whether unknown chains ask for a decision or are rejected.
    pub fn set_trust_on_first_use(&self, enabled: bool) {
        self.trust_on_first_use.store(enabled, Ordering::Release);
        tracing::info!(namespace = %self.store.namespace(), enabled, "Trust-on-first-use updated");
    }

    /// Approve `chain` permanently.
    ///
    /// # Errors
    /// `TrustError::StoreWrite` if the approval could not be persisted; the
    /// chain is then still unknown.
    pub fn approve_and_remember(&self, chain: &CertificateChain) -> Result<(), TrustError> {
        self.store
            .remember(chain, ApprovalScope::Persistent)
            .map_err(TrustError::StoreWrite)
    }

    /// Approve `chain` for the lifetime of this process only.
    pub fn approve_once(&self, chain: &CertificateChain) -> Result<(), TrustError> {
        self.store
            .remember(chain, ApprovalScope::Once)
            .map_err(TrustError::StoreWrite)
    }

    pub fn forget(&self, chain: &CertificateChain) -> Result<(), TrustError> {
        self.store.forget(chain).map_err(TrustError::StoreWrite)
    }

    /// Drop every approval in this namespace, or in all namespaces.
    pub fn clear(&self, all_namespaces: bool) -> Result<(), TrustError> {
        self.store.clear(all_namespaces).map_err(TrustError::StoreWrite)
    }

    fn not_memorized(&self, hash: &ChainHash) -> String {
        format!(
            "certificate chain {hash} is not memorized in namespace {}",
            self.store.namespace()
        )
    }
}

impl fmt::Debug for MemorizingTrustCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemorizingTrustCheck")
            .field("name", &self.name)
            .field("trust_on_first_use", &self.trust_on_first_use())
            .finish_non_exhaustive()
    }
}

impl TrustCheck for MemorizingTrustCheck {
    fn name(&self) -> &str {
        &self.name
    }

    fn check_trusted(&self, chain: &CertificateChain, _auth_type: &AuthType) -> Result<(), TrustError> {
        let hash = chain.hash();
        match self.store.contains(&hash) {
            Ok(true) => Ok(()),
            Ok(false) if self.trust_on_first_use() => {
                tracing::info!(
                    chain_hash = %hash,
                    namespace = %self.store.namespace(),
                    "Unknown certificate chain, decision required"
                );
                Err(TrustError::DecisionRequired(DecisionRequest::new(
                    chain.clone(),
                    self.not_memorized(&hash),
                )))
            }
            Ok(false) => Err(TrustError::untrusted(&self.name, self.not_memorized(&hash))),
            Err(e) => {
                tracing::warn!(
                    chain_hash = %hash,
                    namespace = %self.store.namespace(),
                    error = %e,
                    "Memorized certificate store unreadable"
                );
                Err(TrustError::StoreRead(e))
            }
        }
    }
}
