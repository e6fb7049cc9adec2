// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded memorized-chain database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `memorized_chains`: composite key (ns_len_be|namespace|chain_hash) → JSON record
//! - `namespace_keys`: namespace → HMAC verifier of the namespace's access secret
//!
//! Every committed write bumps an in-process generation counter so that
//! stores caching a namespace snapshot know when to reload it. Clearing all
//! namespaces also bumps a clear epoch, which tells every store to drop its
//! in-memory `Once` approvals.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use base64ct::{Base64, Encoding};
use chrono::{DateTime, Utc};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};

use super::memorized::{AccessSecret, ApprovalScope, MemorizedEntry};
use super::StoragePaths;
use crate::chain::{CertificateChain, ChainHash};

// =============================================================================
// Table Definitions
// =============================================================================

/// Primary table: composite key → serialized StoredChain (JSON bytes).
const MEMORIZED_CHAINS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("memorized_chains");

/// Namespace → HMAC over a fixed label, keyed by the namespace's secret.
const NAMESPACE_KEYS: TableDefinition<&str, &[u8]> = TableDefinition::new("namespace_keys");

const NAMESPACE_VERIFIER_LABEL: &[u8] = b"memorized-chain-store/namespace-verifier/v1";

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("encoding error: {0}")]
    Encoding(String),

    /// A record does not match its key or its tag.
    #[error("integrity violation: {0}")]
    Integrity(String),

    /// The access secret does not match the one the namespace was created with.
    #[error("access denied for namespace {namespace}")]
    AccessDenied { namespace: String },

    #[error("invalid namespace: {0}")]
    InvalidNamespace(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// On-disk representation of one memorized chain.
#[derive(Debug, Serialize, Deserialize)]
struct StoredChain {
    /// Base64 DER certificates, leaf first.
    certificates: Vec<String>,
    approved_at: DateTime<Utc>,
    /// Base64 HMAC-SHA256 over the record key and approval time.
    tag: String,
}

// =============================================================================
// Key Helpers
// =============================================================================

fn make_prefix(namespace: &str) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(2 + namespace.len());
    // Length is validated by `validate_namespace`.
    prefix.extend_from_slice(&(namespace.len() as u16).to_be_bytes());
    prefix.extend_from_slice(namespace.as_bytes());
    prefix
}

/// Build a composite key for the memorized_chains table.
///
/// Format: `u16_be(namespace.len()) | namespace | chain_hash`
fn make_entry_key(namespace: &str, hash: &ChainHash) -> Vec<u8> {
    let mut key = make_prefix(namespace);
    key.extend_from_slice(hash.as_bytes());
    key
}

/// Upper bound for a range scan over one namespace.
fn make_prefix_end(namespace: &str) -> Vec<u8> {
    let mut end = make_prefix(namespace);
    end.extend_from_slice(&[0xFF; ChainHash::LEN + 1]);
    end
}

/// Extract the chain hash from a composite key.
fn extract_hash_from_key(key: &[u8]) -> Option<ChainHash> {
    let start = key.len().checked_sub(ChainHash::LEN)?;
    let bytes: [u8; ChainHash::LEN] = key[start..].try_into().ok()?;
    Some(ChainHash::from_bytes(bytes))
}

pub(crate) fn validate_namespace(namespace: &str) -> StoreResult<()> {
    if namespace.is_empty() {
        return Err(StoreError::InvalidNamespace(
            "namespace must not be empty".to_string(),
        ));
    }
    if namespace.len() > u16::MAX as usize {
        return Err(StoreError::InvalidNamespace(format!(
            "namespace is {} bytes, at most {} allowed",
            namespace.len(),
            u16::MAX
        )));
    }
    Ok(())
}

/// Check `secret` against the namespace's stored verifier.
///
/// Returns `false` if the namespace has no verifier yet.
fn check_namespace_secret<T>(keys: &T, namespace: &str, secret: &AccessSecret) -> StoreResult<bool>
where
    T: ReadableTable<&'static str, &'static [u8]>,
{
    let Some(stored) = keys.get(namespace)? else {
        return Ok(false);
    };
    secret
        .verify(&[NAMESPACE_VERIFIER_LABEL, namespace.as_bytes()], stored.value())
        .map_err(|_| StoreError::AccessDenied {
            namespace: namespace.to_string(),
        })?;
    Ok(true)
}

fn entry_tag(secret: &AccessSecret, key: &[u8], approved_at: &DateTime<Utc>) -> StoreResult<Vec<u8>> {
    secret.tag(&[key, &approved_at.timestamp_millis().to_be_bytes()])
}

// =============================================================================
// TrustDatabase
// =============================================================================

/// Durable backing shared by every namespace stored in one file.
pub struct TrustDatabase {
    db: Database,
    generation: AtomicU64,
    clear_epoch: AtomicU64,
}

impl TrustDatabase {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(MEMORIZED_CHAINS)?;
            let _ = write_txn.open_table(NAMESPACE_KEYS)?;
        }
        write_txn.commit()?;

        tracing::debug!(path = %path.display(), "Opened memorized certificate database");

        Ok(Self {
            db,
            generation: AtomicU64::new(0),
            clear_epoch: AtomicU64::new(0),
        })
    }

    /// Open the database at its standard location under `paths`.
    pub fn open_in(paths: &StoragePaths) -> StoreResult<Self> {
        Self::open(&paths.database_file())
    }

    /// Number of writes committed through this handle.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Number of `clear_all` calls committed through this handle.
    pub fn clear_epoch(&self) -> u64 {
        self.clear_epoch.load(Ordering::Acquire)
    }

    fn bump_generation(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Load every memorized chain of a namespace, verifying each record.
    pub(crate) fn load_namespace(
        &self,
        namespace: &str,
        secret: &AccessSecret,
    ) -> StoreResult<HashMap<ChainHash, MemorizedEntry>> {
        let read_txn = self.db.begin_read()?;

        let keys = read_txn.open_table(NAMESPACE_KEYS)?;
        check_namespace_secret(&keys, namespace, secret)?;

        let table = read_txn.open_table(MEMORIZED_CHAINS)?;
        let prefix = make_prefix(namespace);
        let prefix_end = make_prefix_end(namespace);

        let mut entries = HashMap::new();
        for item in table.range(prefix.as_slice()..prefix_end.as_slice())? {
            let (key, value) = item?;
            let key = key.value();
            let hash = extract_hash_from_key(key)
                .ok_or_else(|| StoreError::Integrity("truncated record key".to_string()))?;
            let entry = decode_entry(secret, key, hash, value.value())?;
            entries.insert(hash, entry);
        }

        Ok(entries)
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Insert or replace a persistent entry.
    pub(crate) fn insert(
        &self,
        namespace: &str,
        secret: &AccessSecret,
        entry: &MemorizedEntry,
    ) -> StoreResult<()> {
        let key = make_entry_key(namespace, &entry.hash);
        let record = StoredChain {
            certificates: entry
                .chain
                .certificates()
                .iter()
                .map(|cert| Base64::encode_string(cert.as_ref()))
                .collect(),
            approved_at: entry.approved_at,
            tag: Base64::encode_string(&entry_tag(secret, &key, &entry.approved_at)?),
        };
        let json = serde_json::to_vec(&record)?;
        let verifier = secret.tag(&[NAMESPACE_VERIFIER_LABEL, namespace.as_bytes()])?;

        let write_txn = self.db.begin_write()?;
        {
            let mut keys = write_txn.open_table(NAMESPACE_KEYS)?;
            if !check_namespace_secret(&keys, namespace, secret)? {
                keys.insert(namespace, verifier.as_slice())?;
            }

            let mut table = write_txn.open_table(MEMORIZED_CHAINS)?;
            table.insert(key.as_slice(), json.as_slice())?;
        }
        write_txn.commit()?;
        self.bump_generation();
        Ok(())
    }

    /// Remove one entry. Returns whether it existed.
    pub(crate) fn remove(
        &self,
        namespace: &str,
        secret: &AccessSecret,
        hash: &ChainHash,
    ) -> StoreResult<bool> {
        let key = make_entry_key(namespace, hash);
        let write_txn = self.db.begin_write()?;
        check_namespace_secret(&write_txn.open_table(NAMESPACE_KEYS)?, namespace, secret)?;
        let removed = {
            let mut table = write_txn.open_table(MEMORIZED_CHAINS)?;
            let removed = table.remove(key.as_slice())?.is_some();
            removed
        };
        write_txn.commit()?;
        self.bump_generation();
        Ok(removed)
    }

    /// Remove every entry of one namespace in a single transaction.
    pub(crate) fn clear_namespace(&self, namespace: &str, secret: &AccessSecret) -> StoreResult<usize> {
        let prefix = make_prefix(namespace);
        let prefix_end = make_prefix_end(namespace);

        let write_txn = self.db.begin_write()?;
        check_namespace_secret(&write_txn.open_table(NAMESPACE_KEYS)?, namespace, secret)?;
        let removed = {
            let mut table = write_txn.open_table(MEMORIZED_CHAINS)?;
            let keys = table
                .range(prefix.as_slice()..prefix_end.as_slice())?
                .map(|item| item.map(|(k, _)| k.value().to_vec()))
                .collect::<Result<Vec<_>, _>>()?;
            for key in &keys {
                table.remove(key.as_slice())?;
            }
            keys.len()
        };
        write_txn.commit()?;
        self.bump_generation();
        Ok(removed)
    }

    /// Remove every entry of every namespace in a single transaction.
    ///
    /// The caller must hold the secret of `namespace`, its own namespace.
    pub(crate) fn clear_all(&self, namespace: &str, secret: &AccessSecret) -> StoreResult<usize> {
        let write_txn = self.db.begin_write()?;
        check_namespace_secret(&write_txn.open_table(NAMESPACE_KEYS)?, namespace, secret)?;
        let removed = {
            let mut table = write_txn.open_table(MEMORIZED_CHAINS)?;
            let keys = table
                .iter()?
                .map(|item| item.map(|(k, _)| k.value().to_vec()))
                .collect::<Result<Vec<_>, _>>()?;
            for key in &keys {
                table.remove(key.as_slice())?;
            }
            keys.len()
        };
        write_txn.commit()?;
        // Epoch first: a reader that sees the new generation sees the new epoch.
        self.clear_epoch.fetch_add(1, Ordering::AcqRel);
        self.bump_generation();
        Ok(removed)
    }

    /// Overwrite a raw record. Used by tests to simulate on-disk tampering.
    #[cfg(test)]
    pub(crate) fn put_raw(&self, namespace: &str, hash: &ChainHash, value: &[u8]) -> StoreResult<()> {
        let key = make_entry_key(namespace, hash);
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(MEMORIZED_CHAINS)?;
            table.insert(key.as_slice(), value)?;
        }
        write_txn.commit()?;
        self.bump_generation();
        Ok(())
    }
}

fn decode_entry(
    secret: &AccessSecret,
    key: &[u8],
    hash: ChainHash,
    value: &[u8],
) -> StoreResult<MemorizedEntry> {
    let record: StoredChain = serde_json::from_slice(value)?;

    let tag = Base64::decode_vec(&record.tag).map_err(|e| StoreError::Encoding(e.to_string()))?;
    secret
        .verify(&[key, &record.approved_at.timestamp_millis().to_be_bytes()], &tag)
        .map_err(|_| StoreError::Integrity(format!("tag mismatch for chain {hash}")))?;

    let certificates = record
        .certificates
        .iter()
        .map(|der| Base64::decode_vec(der).map_err(|e| StoreError::Encoding(e.to_string())))
        .collect::<StoreResult<Vec<_>>>()?;
    let chain = CertificateChain::from_der(certificates);
    if chain.hash() != hash {
        return Err(StoreError::Integrity(format!(
            "stored certificates do not match chain {hash}"
        )));
    }

    Ok(MemorizedEntry {
        hash,
        chain,
        approved_at: record.approved_at,
        scope: ApprovalScope::Persistent,
    })
}

// =============================================================================
// Tests
// =============================================================================
