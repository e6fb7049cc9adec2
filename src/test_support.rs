// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Certificate fixtures and stub checks shared by unit tests.

use std::sync::{Arc, Mutex};

use rcgen::{
    BasicConstraints, CertificateParams, DistinguishedName, DnType, IsCa, KeyPair,
    KeyUsagePurpose,
};
use rustls::pki_types::CertificateDer;

use crate::chain::{AuthType, CertificateChain};
use crate::error::TrustError;
use crate::trust::{DecisionRequest, TrustCheck};

pub(crate) struct TestCa {
    pub cert: rcgen::Certificate,
    pub key: KeyPair,
    pub der: CertificateDer<'static>,
}

pub(crate) fn make_ca(common_name: &str) -> TestCa {
    let key = KeyPair::generate().unwrap();
    let mut params = CertificateParams::new(Vec::<String>::new()).unwrap();
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, common_name);
    params.distinguished_name = dn;
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    params.key_usages = vec![
        KeyUsagePurpose::KeyCertSign,
        KeyUsagePurpose::CrlSign,
        KeyUsagePurpose::DigitalSignature,
    ];
    let cert = params.self_signed(&key).unwrap();
    let der = cert.der().clone();
    TestCa { cert, key, der }
}

/// End-entity chain `[leaf]` issued by `ca` for `host`.
pub(crate) fn issue_leaf(ca: &TestCa, host: &str) -> CertificateChain {
    let key = KeyPair::generate().unwrap();
    let params = CertificateParams::new(vec![host.to_string()]).unwrap();
    let leaf = params.signed_by(&key, &ca.cert, &ca.key).unwrap();
    CertificateChain::new(vec![leaf.der().clone()])
}

/// Like [`issue_leaf`], with the leaf valid from `not_before` to
/// `not_after` as `(year, month, day)`.
pub(crate) fn issue_leaf_valid_between(
    ca: &TestCa,
    host: &str,
    not_before: (i32, u8, u8),
    not_after: (i32, u8, u8),
) -> CertificateChain {
    let key = KeyPair::generate().unwrap();
    let mut params = CertificateParams::new(vec![host.to_string()]).unwrap();
    params.not_before = rcgen::date_time_ymd(not_before.0, not_before.1, not_before.2);
    params.not_after = rcgen::date_time_ymd(not_after.0, not_after.1, not_after.2);
    let leaf = params.signed_by(&key, &ca.cert, &ca.key).unwrap();
    CertificateChain::new(vec![leaf.der().clone()])
}

/// A self-signed end-entity certificate for `host`.
pub(crate) fn self_signed(host: &str) -> CertificateChain {
    let certified = rcgen::generate_simple_self_signed([host.to_string()]).unwrap();
    CertificateChain::new(vec![certified.cert.der().clone()])
}

/// PEM encoding of a single DER certificate.
pub(crate) fn to_pem(der: &CertificateDer<'_>) -> String {
    pem::encode(&pem::Pem::new("CERTIFICATE", der.as_ref().to_vec()))
}

#[derive(Debug, Clone, Copy)]
enum Outcome {
    Accept,
    Reject,
    Decide,
}

#[derive(Debug, Default)]
struct StubState {
    calls: usize,
    last_auth_type: Option<String>,
}

/// A check with a fixed outcome that records its invocations.
#[derive(Debug, Clone)]
pub(crate) struct StubCheck {
    name: String,
    outcome: Outcome,
    state: Arc<Mutex<StubState>>,
}

impl StubCheck {
    fn with(name: &str, outcome: Outcome) -> Self {
        Self {
            name: name.to_string(),
            outcome,
            state: Arc::default(),
        }
    }

    pub fn accept(name: &str) -> Self {
        Self::with(name, Outcome::Accept)
    }

    pub fn reject(name: &str) -> Self {
        Self::with(name, Outcome::Reject)
    }

    pub fn decide(name: &str) -> Self {
        Self::with(name, Outcome::Decide)
    }

    pub fn calls(&self) -> usize {
        self.state.lock().unwrap().calls
    }

    pub fn last_auth_type(&self) -> Option<String> {
        self.state.lock().unwrap().last_auth_type.clone()
    }
}

impl TrustCheck for StubCheck {
    fn name(&self) -> &str {
        &self.name
    }

    fn check_trusted(&self, chain: &CertificateChain, auth_type: &AuthType) -> Result<(), TrustError> {
        {
            let mut state = self.state.lock().unwrap();
            state.calls += 1;
            state.last_auth_type = Some(auth_type.as_str().to_string());
        }
        match self.outcome {
            Outcome::Accept => Ok(()),
            Outcome::Reject => Err(TrustError::untrusted(&self.name, "stub rejection")),
            Outcome::Decide => Err(TrustError::DecisionRequired(DecisionRequest::new(
                chain.clone(),
                "stub decision",
            ))),
        }
    }
}
