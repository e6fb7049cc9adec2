// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Memorized Certificate Storage
//!
//! Durable storage for certificate chains an operator approved, plus the
//! per-process overlay for chains approved only once.
//!
//! ## Storage Layout
//!
//! ```text
//! {root}/
//!   memorized-chains.redb
//!     memorized_chains   # ns_len | namespace | chain_hash -> JSON record
//!     namespace_keys     # namespace -> access-secret verifier
//! ```
//!
//! Several namespaces share one database file. Each namespace is guarded by
//! its own access secret: every record carries an HMAC-SHA256 tag keyed by
//! that secret, so a wrong secret or a tampered record reads as an error
//! rather than as "not memorized".

pub mod database;
pub mod memorized;
pub mod paths;

pub use database::{StoreError, StoreResult, TrustDatabase};
pub use memorized::{AccessSecret, ApprovalScope, MemorizedCertificateStore, MemorizedEntry};
pub use paths::StoragePaths;
