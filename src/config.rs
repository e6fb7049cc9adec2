// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Environment variable names, defaults, and the memorized store settings
//! derived from them.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `TRUST_STORE_DIR` | Directory holding the memorized chain database | `/data/trust` |
//! | `TRUST_STORE_NAMESPACE` | Namespace of this application's approvals | `default` |
//! | `TRUST_STORE_SECRET` | Access secret for the namespace | Required |
//! | `TRUST_STORE_MAX_AGE_SECS` | Approvals older than this are ignored | Unset (no expiry) |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info` |

use std::sync::Arc;
use std::time::Duration;

use crate::error::TrustError;
use crate::storage::{AccessSecret, StoragePaths, TrustDatabase};
use crate::trust::MemorizingOptions;

/// Directory holding the memorized chain database.
///
/// # Default
/// `/data/trust`
pub const TRUST_STORE_DIR_ENV: &str = "TRUST_STORE_DIR";

/// Namespace of this application's approvals within the shared database.
pub const TRUST_STORE_NAMESPACE_ENV: &str = "TRUST_STORE_NAMESPACE";

/// Default namespace.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Access secret for the namespace.
///
/// # Security
/// Anyone holding the database file and this secret can add approvals.
/// Without the secret, entries can neither be read nor forged.
pub const TRUST_STORE_SECRET_ENV: &str = "TRUST_STORE_SECRET";

/// Maximum approval age in seconds. Unset means approvals never expire.
pub const TRUST_STORE_MAX_AGE_ENV: &str = "TRUST_STORE_MAX_AGE_SECS";

/// Log output format: `json` for structured logs, anything else for
/// human-readable output.
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// Settings for the memorized certificate store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub paths: StoragePaths,
    pub namespace: String,
    pub secret: AccessSecret,
    pub max_age: Option<Duration>,
}

impl StoreConfig {
    /// Load from the process environment.
    ///
    /// # Errors
    /// `TrustError::Configuration` when the secret is missing or a value is
    /// malformed.
    pub fn from_env() -> Result<Self, TrustError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, TrustError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let paths = lookup(TRUST_STORE_DIR_ENV)
            .filter(|dir| !dir.is_empty())
            .map(StoragePaths::new)
            .unwrap_or_default();

        let namespace = lookup(TRUST_STORE_NAMESPACE_ENV)
            .filter(|ns| !ns.is_empty())
            .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());

        let secret = lookup(TRUST_STORE_SECRET_ENV)
            .filter(|secret| !secret.is_empty())
            .map(AccessSecret::new)
            .ok_or_else(|| {
                TrustError::Configuration(format!("{TRUST_STORE_SECRET_ENV} must be set"))
            })?;

        let max_age = lookup(TRUST_STORE_MAX_AGE_ENV)
            .map(|raw| {
                raw.trim().parse::<u64>().map(Duration::from_secs).map_err(|_| {
                    TrustError::Configuration(format!(
                        "{TRUST_STORE_MAX_AGE_ENV} must be a whole number of seconds, got {raw:?}"
                    ))
                })
            })
            .transpose()?;

        Ok(Self {
            paths,
            namespace,
            secret,
            max_age,
        })
    }

    /// Open (creating if needed) the database under the configured root.
    pub fn open_database(&self) -> Result<Arc<TrustDatabase>, TrustError> {
        std::fs::create_dir_all(self.paths.root()).map_err(|e| {
            TrustError::Configuration(format!(
                "cannot create {}: {e}",
                self.paths.root().display()
            ))
        })?;
        let database = TrustDatabase::open_in(&self.paths).map_err(TrustError::StoreRead)?;
        Ok(Arc::new(database))
    }

    /// Memorizing options for this namespace. Trust-on-first-use is off.
    pub fn memorizing_options(&self) -> MemorizingOptions {
        let options = MemorizingOptions::new(&self.namespace, self.secret.clone());
        match self.max_age {
            Some(max_age) => options.max_age(max_age),
            None => options,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_apply() {
        let config = StoreConfig::from_lookup(lookup(&[(TRUST_STORE_SECRET_ENV, "s3cret")])).unwrap();
        assert_eq!(config.paths.root(), std::path::Path::new("/data/trust"));
        assert_eq!(config.namespace, DEFAULT_NAMESPACE);
        assert!(config.max_age.is_none());
    }

    #[test]
    fn secret_is_required() {
        let err = StoreConfig::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, TrustError::Configuration(_)));

        let err = StoreConfig::from_lookup(lookup(&[(TRUST_STORE_SECRET_ENV, "")])).unwrap_err();
        assert!(err.to_string().contains(TRUST_STORE_SECRET_ENV));
    }

    #[test]
    fn explicit_values() {
        let config = StoreConfig::from_lookup(lookup(&[
            (TRUST_STORE_DIR_ENV, "/tmp/trust"),
            (TRUST_STORE_NAMESPACE_ENV, "mail"),
            (TRUST_STORE_SECRET_ENV, "s3cret"),
            (TRUST_STORE_MAX_AGE_ENV, "3600"),
        ]))
        .unwrap();
        assert_eq!(config.paths.root(), std::path::Path::new("/tmp/trust"));
        assert_eq!(config.namespace, "mail");
        assert_eq!(config.max_age, Some(Duration::from_secs(3600)));
        assert_eq!(config.memorizing_options().max_age, Some(Duration::from_secs(3600)));
    }

    #[test]
    fn malformed_max_age() {
        let err = StoreConfig::from_lookup(lookup(&[
            (TRUST_STORE_SECRET_ENV, "s3cret"),
            (TRUST_STORE_MAX_AGE_ENV, "soon"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains(TRUST_STORE_MAX_AGE_ENV));
    }

    #[test]
    fn open_database_creates_root() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("nested").join("trust");
        let config = StoreConfig::from_lookup(lookup(&[
            (TRUST_STORE_DIR_ENV, root.to_str().unwrap()),
            (TRUST_STORE_SECRET_ENV, "s3cret"),
        ]))
        .unwrap();
        config.open_database().unwrap();
        assert!(config.paths.database_file().exists());
    }
}
