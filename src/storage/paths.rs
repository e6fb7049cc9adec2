// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Path constants and utilities for the durable trust store layout.

use std::path::{Path, PathBuf};

/// Default directory for the durable memorized-certificate database.
pub const DATA_ROOT: &str = "/data/trust";

/// File name of the redb database holding memorized chains.
pub const DATABASE_FILE: &str = "memorized-chains.redb";

/// Storage path utilities for the trust store.
#[derive(Debug, Clone)]
pub struct StoragePaths {
    root: PathBuf,
}

impl Default for StoragePaths {
    fn default() -> Self {
        Self::new(DATA_ROOT)
    }
}

impl StoragePaths {
    /// Create a new StoragePaths with a custom root (useful for testing).
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Root directory for all trust store data.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path to the memorized-chain database.
    pub fn database_file(&self) -> PathBuf {
        self.root.join(DATABASE_FILE)
    }
}
