// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Memorized certificate store.
//!
//! Keeps the set of certificate chains an operator approved, keyed by
//! [`ChainHash`]. `Persistent` approvals are written through to the
//! [`TrustDatabase`] before `remember` returns; `Once` approvals live only in
//! this process, in the store's overlay.
//!
//! ## Concurrency
//!
//! Readers work on an immutable snapshot swapped in with `arc-swap` and
//! never wait on writers. `remember`, `forget` and `clear` are serialized by
//! a mutex around the durable mutation; the snapshot is replaced only after
//! the durable write committed, so a failed write leaves the store as it was.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::database::{validate_namespace, StoreError, StoreResult, TrustDatabase};
use crate::chain::{CertificateChain, ChainHash};

type HmacSha256 = Hmac<Sha256>;

/// How long an approval lasts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalScope {
    /// For the lifetime of this store instance only; never written to disk.
    Once,
    /// Written to durable storage; survives a restart.
    Persistent,
}

/// An approved certificate chain.
#[derive(Debug, Clone)]
pub struct MemorizedEntry {
    pub hash: ChainHash,
    pub chain: CertificateChain,
    pub approved_at: DateTime<Utc>,
    pub scope: ApprovalScope,
}

impl MemorizedEntry {
    pub fn new(chain: CertificateChain, scope: ApprovalScope) -> Self {
        Self {
            hash: chain.hash(),
            chain,
            approved_at: Utc::now(),
            scope,
        }
    }
}

/// Secret guarding one namespace of the durable store.
///
/// Opaque to the store beyond keying the HMAC tags on its records.
#[derive(Clone)]
pub struct AccessSecret(Arc<[u8]>);

impl AccessSecret {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self(Arc::from(secret.as_ref()))
    }

    fn mac(&self, parts: &[&[u8]]) -> StoreResult<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(&self.0)
            .map_err(|e| StoreError::Encoding(format!("unusable access secret: {e}")))?;
        for part in parts {
            mac.update(&(part.len() as u64).to_be_bytes());
            mac.update(part);
        }
        Ok(mac)
    }

    pub(crate) fn tag(&self, parts: &[&[u8]]) -> StoreResult<Vec<u8>> {
        Ok(self.mac(parts)?.finalize().into_bytes().to_vec())
    }

    /// Constant-time check of `expected` against the tag over `parts`.
    pub(crate) fn verify(&self, parts: &[&[u8]], expected: &[u8]) -> StoreResult<()> {
        self.mac(parts)?
            .verify_slice(expected)
            .map_err(|_| StoreError::Integrity("tag mismatch".to_string()))
    }
}

impl fmt::Debug for AccessSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessSecret(<redacted>)")
    }
}

/// Immutable view of the store, replaced wholesale on every change.
#[derive(Debug, Default)]
struct Snapshot {
    /// Database generation `persistent` was loaded at; `None` until loaded.
    loaded_at: Option<u64>,
    /// Database clear epoch `once` belongs to.
    clear_epoch: u64,
    persistent: HashMap<ChainHash, MemorizedEntry>,
    once: HashMap<ChainHash, MemorizedEntry>,
}

impl Snapshot {
    fn lookup(&self, hash: &ChainHash) -> Option<&MemorizedEntry> {
        self.persistent.get(hash).or_else(|| self.once.get(hash))
    }
}

/// Namespaced set of approved chains over a shared [`TrustDatabase`].
pub struct MemorizedCertificateStore {
    database: Arc<TrustDatabase>,
    namespace: String,
    secret: AccessSecret,
    max_age: Option<Duration>,
    snapshot: ArcSwap<Snapshot>,
    write_lock: Mutex<()>,
}

impl MemorizedCertificateStore {
    /// Open the `namespace` partition of `database`.
    ///
    /// Does not touch the disk; the secret is checked on first use.
    pub fn open(
        database: Arc<TrustDatabase>,
        namespace: impl Into<String>,
        secret: AccessSecret,
    ) -> StoreResult<Self> {
        let namespace = namespace.into();
        validate_namespace(&namespace)?;
        let clear_epoch = database.clear_epoch();
        Ok(Self {
            database,
            namespace,
            secret,
            max_age: None,
            snapshot: ArcSwap::from_pointee(Snapshot {
                clear_epoch,
                ..Snapshot::default()
            }),
            write_lock: Mutex::new(()),
        })
    }

    /// Treat approvals older than `max_age` as absent.
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Whether a live approval exists for `hash`.
    ///
    /// # Errors
    /// Returns an error when the durable store cannot be read or fails
    /// verification. This is never reported as `false`.
    pub fn contains(&self, hash: &ChainHash) -> StoreResult<bool> {
        let snapshot = self.current_snapshot()?;
        Ok(snapshot
            .lookup(hash)
            .is_some_and(|entry| self.is_live(entry)))
    }

    /// All live approvals, oldest first.
    pub fn entries(&self) -> StoreResult<Vec<MemorizedEntry>> {
        let snapshot = self.current_snapshot()?;
        let mut entries: Vec<MemorizedEntry> = snapshot
            .once
            .iter()
            .filter(|(hash, _)| !snapshot.persistent.contains_key(*hash))
            .map(|(_, entry)| entry)
            .chain(snapshot.persistent.values())
            .filter(|entry| self.is_live(entry))
            .cloned()
            .collect();
        entries.sort_by_key(|entry| entry.approved_at);
        Ok(entries)
    }

    /// Approve `chain` with the given scope.
    ///
    /// A `Persistent` approval upgrades an earlier `Once` approval. A `Once`
    /// approval of a chain that is already persisted changes nothing.
    pub fn remember(&self, chain: &CertificateChain, scope: ApprovalScope) -> StoreResult<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = MemorizedEntry::new(chain.clone(), scope);
        let hash = entry.hash;

        match scope {
            ApprovalScope::Persistent => {
                self.database.insert(&self.namespace, &self.secret, &entry)?;
                self.update_once(|once| {
                    once.remove(&hash);
                });
            }
            ApprovalScope::Once => {
                if self.current_snapshot()?.persistent.contains_key(&hash) {
                    return Ok(());
                }
                self.update_once(|once| {
                    once.entry(hash).or_insert_with(|| entry.clone());
                });
            }
        }

        tracing::info!(
            namespace = %self.namespace,
            chain_hash = %hash,
            scope = ?scope,
            "Memorized certificate chain"
        );
        Ok(())
    }

    /// Drop the approval for `chain`, whatever its scope. No-op if absent.
    pub fn forget(&self, chain: &CertificateChain) -> StoreResult<()> {
        self.forget_hash(&chain.hash())
    }

    /// Drop the approval for `hash`, whatever its scope. No-op if absent.
    pub fn forget_hash(&self, hash: &ChainHash) -> StoreResult<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let persisted = self.database.remove(&self.namespace, &self.secret, hash)?;
        self.update_once(|once| {
            once.remove(hash);
        });

        tracing::info!(
            namespace = %self.namespace,
            chain_hash = %hash,
            persisted,
            "Forgot memorized certificate chain"
        );
        Ok(())
    }

    /// Remove every approval of this namespace, or of every namespace in the
    /// shared database when `all_namespaces` is set.
    ///
    /// Either every targeted durable entry is removed or none is.
    pub fn clear(&self, all_namespaces: bool) -> StoreResult<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let removed = if all_namespaces {
            self.database.clear_all(&self.namespace, &self.secret)?
        } else {
            self.database.clear_namespace(&self.namespace, &self.secret)?
        };
        self.update_once(|once| once.clear());

        tracing::info!(
            namespace = %self.namespace,
            all_namespaces,
            removed,
            "Cleared memorized certificate chains"
        );
        Ok(())
    }

    fn is_live(&self, entry: &MemorizedEntry) -> bool {
        match self.max_age {
            // A timestamp in the future fails `to_std`; keep such entries.
            Some(max_age) => (Utc::now() - entry.approved_at)
                .to_std()
                .map_or(true, |age| age <= max_age),
            None => true,
        }
    }

    /// Current snapshot, reloading the durable part if another write
    /// committed since it was loaded.
    fn current_snapshot(&self) -> StoreResult<Arc<Snapshot>> {
        let snapshot = self.snapshot.load_full();
        // Read before loading: a commit racing the load only forces one more
        // reload later.
        let generation = self.database.generation();
        let clear_epoch = self.database.clear_epoch();
        if snapshot.loaded_at == Some(generation) && snapshot.clear_epoch == clear_epoch {
            return Ok(snapshot);
        }

        let persistent = self
            .database
            .load_namespace(&self.namespace, &self.secret)
            .inspect_err(|e| {
                tracing::warn!(
                    namespace = %self.namespace,
                    error = %e,
                    "Failed to load memorized certificate chains"
                );
            })?;

        self.snapshot.rcu(|current| {
            if current.loaded_at.is_some_and(|loaded| loaded >= generation)
                && current.clear_epoch >= clear_epoch
            {
                Arc::clone(current)
            } else {
                // Another store cleared every namespace: once-approvals go too.
                let once = if current.clear_epoch < clear_epoch {
                    HashMap::new()
                } else {
                    current.once.clone()
                };
                Arc::new(Snapshot {
                    loaded_at: Some(generation),
                    clear_epoch: clear_epoch.max(current.clear_epoch),
                    persistent: persistent.clone(),
                    once,
                })
            }
        });
        Ok(self.snapshot.load_full())
    }

    fn update_once<F>(&self, mut f: F)
    where
        F: FnMut(&mut HashMap<ChainHash, MemorizedEntry>),
    {
        self.snapshot.rcu(|current| {
            let mut once = current.once.clone();
            f(&mut once);
            Arc::new(Snapshot {
                loaded_at: current.loaded_at,
                clear_epoch: current.clear_epoch,
                persistent: current.persistent.clone(),
                once,
            })
        });
    }
}

impl fmt::Debug for MemorizedCertificateStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemorizedCertificateStore")
            .field("namespace", &self.namespace)
            .field("max_age", &self.max_age)
            .finish_non_exhaustive()
    }
}
