// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Certificate chains as presented by the TLS stack, and their identity.
//!
//! A chain is identified by a SHA-256 digest over every certificate's DER
//! bytes in presentation order. Each certificate is framed by its big-endian
//! `u32` length, so two chains hash equally only if they hold the same
//! certificates in the same order.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use rustls::pki_types::CertificateDer;
use sha2::{Digest, Sha256};

/// Ordered sequence of certificates, leaf first.
///
/// Cheap to clone: the certificates are shared.
#[derive(Clone, PartialEq, Eq)]
pub struct CertificateChain {
    certs: Arc<[CertificateDer<'static>]>,
}

impl CertificateChain {
    /// Build a chain from certificates in presentation order (leaf first).
    pub fn new(certs: Vec<CertificateDer<'static>>) -> Self {
        Self {
            certs: certs.into(),
        }
    }

    /// Build a chain from the pieces rustls hands to a server verifier.
    pub fn from_presented(
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
    ) -> Self {
        let mut certs = Vec::with_capacity(1 + intermediates.len());
        certs.push(end_entity.clone().into_owned());
        certs.extend(intermediates.iter().map(|c| c.clone().into_owned()));
        Self::new(certs)
    }

    /// Build a chain from raw DER blobs.
    pub fn from_der<I, B>(certs: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Vec<u8>>,
    {
        Self::new(
            certs
                .into_iter()
                .map(|der| CertificateDer::from(der.into()))
                .collect(),
        )
    }

    /// The end-entity certificate, if the chain is non-empty.
    pub fn leaf(&self) -> Option<&CertificateDer<'static>> {
        self.certs.first()
    }

    /// Everything after the leaf.
    pub fn intermediates(&self) -> &[CertificateDer<'static>] {
        self.certs.get(1..).unwrap_or(&[])
    }

    pub fn certificates(&self) -> &[CertificateDer<'static>] {
        &self.certs
    }

    pub fn len(&self) -> usize {
        self.certs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.certs.is_empty()
    }

    /// Identity used for memorization and lookup.
    pub fn hash(&self) -> ChainHash {
        let mut hasher = Sha256::new();
        for cert in self.certs.iter() {
            let der = cert.as_ref();
            hasher.update((der.len() as u32).to_be_bytes());
            hasher.update(der);
        }
        ChainHash(hasher.finalize().into())
    }
}

impl fmt::Debug for CertificateChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CertificateChain")
            .field("len", &self.certs.len())
            .field("hash", &self.hash())
            .finish()
    }
}

/// SHA-256 identity of a [`CertificateChain`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChainHash([u8; 32]);

impl ChainHash {
    pub const LEN: usize = 32;

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl fmt::Display for ChainHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ChainHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChainHash({})", self.to_hex())
    }
}

/// Error returned when parsing a [`ChainHash`] from hex.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid chain hash: expected 64 hex characters")]
pub struct ParseChainHashError;

impl FromStr for ChainHash {
    type Err = ParseChainHashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.len() != ChainHash::LEN * 2 || !s.is_ascii() {
            return Err(ParseChainHashError);
        }
        let mut bytes = [0u8; 32];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16)
                .map_err(|_| ParseChainHashError)?;
        }
        Ok(Self(bytes))
    }
}

/// Key-exchange / authentication family reported for a handshake
/// (e.g. `"RSA"`, `"ECDSA"`).
///
/// Passed through to elementary checks untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AuthType(String);

impl AuthType {
    /// Used when the TLS stack does not report a key-exchange family.
    pub const GENERIC: &'static str = "GENERIC";

    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for AuthType {
    fn default() -> Self {
        Self::new(Self::GENERIC)
    }
}

impl fmt::Display for AuthType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AuthType {
    fn from(tag: &str) -> Self {
        Self::new(tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        let a = CertificateChain::from_der([b"leaf".to_vec(), b"ca".to_vec()]);
        let b = CertificateChain::from_der([b"leaf".to_vec(), b"ca".to_vec()]);
        assert_eq!(a.hash(), b.hash());
    }

    #[test]
    fn hash_is_order_sensitive() {
        let a = CertificateChain::from_der([
            b"leaf".to_vec(),
            b"intermediate".to_vec(),
            b"ca".to_vec(),
        ]);
        let b = CertificateChain::from_der([
            b"leaf".to_vec(),
            b"ca".to_vec(),
            b"intermediate".to_vec(),
        ]);
        assert_ne!(a.hash(), b.hash());
    }

    #[test]
    fn hash_frames_certificate_boundaries() {
        let split = CertificateChain::from_der([b"ab".to_vec(), b"c".to_vec()]);
        let joined = CertificateChain::from_der([b"a".to_vec(), b"bc".to_vec()]);
        assert_ne!(split.hash(), joined.hash());
    }

    #[test]
    fn hash_hex_roundtrip() {
        let hash = CertificateChain::from_der([b"leaf".to_vec()]).hash();
        let parsed: ChainHash = hash.to_hex().parse().unwrap();
        assert_eq!(parsed, hash);
        assert!("zz".parse::<ChainHash>().is_err());
        assert!("g".repeat(64).parse::<ChainHash>().is_err());
    }

    #[test]
    fn leaf_and_intermediates() {
        let chain = CertificateChain::from_der([b"leaf".to_vec(), b"ca".to_vec()]);
        assert_eq!(chain.leaf().unwrap().as_ref(), b"leaf");
        assert_eq!(chain.intermediates().len(), 1);

        let empty = CertificateChain::new(Vec::new());
        assert!(empty.leaf().is_none());
        assert!(empty.intermediates().is_empty());
    }

    #[test]
    fn auth_type_defaults_to_generic() {
        assert_eq!(AuthType::default().as_str(), "GENERIC");
        assert_eq!(AuthType::from("RSA").to_string(), "RSA");
    }
}
