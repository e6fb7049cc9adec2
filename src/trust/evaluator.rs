// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Composite trust evaluation over an immutable AND/OR tree.

use std::sync::Arc;

use super::{TrustCheck, TrustCheckRef};
use crate::chain::{AuthType, CertificateChain};
use crate::error::{TrustError, TrustRejected};

/// Node of a trust policy tree.
#[derive(Debug, Clone)]
pub enum TrustNode {
    Leaf(TrustCheckRef),
    /// Satisfied iff every child is; an empty `All` is satisfied.
    All(Vec<TrustNode>),
    /// Satisfied iff some child is; an empty `Any` is not.
    Any(Vec<TrustNode>),
}

impl Default for TrustNode {
    fn default() -> Self {
        TrustNode::All(Vec::new())
    }
}

impl TrustNode {
    pub fn leaf(check: impl TrustCheck + 'static) -> Self {
        TrustNode::Leaf(Arc::new(check))
    }

    pub fn all(children: impl IntoIterator<Item = TrustNode>) -> Self {
        TrustNode::All(children.into_iter().collect())
    }

    pub fn any(children: impl IntoIterator<Item = TrustNode>) -> Self {
        TrustNode::Any(children.into_iter().collect())
    }

    /// Number of elementary checks in this subtree.
    pub fn leaf_count(&self) -> usize {
        match self {
            TrustNode::Leaf(_) => 1,
            TrustNode::All(children) | TrustNode::Any(children) => {
                children.iter().map(TrustNode::leaf_count).sum()
            }
        }
    }

    /// Evaluate this subtree.
    ///
    /// Returns whether it is satisfied; leaf rejections are appended to
    /// `causes`. Only `DecisionRequired` is returned as an error.
    fn evaluate(
        &self,
        chain: &CertificateChain,
        auth_type: &AuthType,
        causes: &mut Vec<TrustError>,
    ) -> Result<bool, TrustError> {
        match self {
            TrustNode::Leaf(check) => match check.check_trusted(chain, auth_type) {
                Ok(()) => Ok(true),
                Err(e @ TrustError::DecisionRequired(_)) => Err(e),
                // A nested evaluator used as a leaf: keep its leaf causes.
                Err(TrustError::Rejected(rejected)) => {
                    causes.extend(rejected.causes);
                    Ok(false)
                }
                Err(e) => {
                    tracing::trace!(check = check.name(), error = %e, "Trust check rejected chain");
                    causes.push(e);
                    Ok(false)
                }
            },
            TrustNode::All(children) => {
                for child in children {
                    if !child.evaluate(chain, auth_type, causes)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            TrustNode::Any(children) => {
                for child in children {
                    if child.evaluate(chain, auth_type, causes)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
        }
    }
}

/// Evaluates a [`TrustNode`] tree as a single [`TrustCheck`].
///
/// The default evaluator has no checks and rejects every chain.
#[derive(Debug, Clone)]
pub struct CompositeTrustEvaluator {
    name: String,
    root: TrustNode,
    leaves: usize,
}

impl Default for CompositeTrustEvaluator {
    fn default() -> Self {
        Self::new(TrustNode::default())
    }
}

impl CompositeTrustEvaluator {
    pub const DEFAULT_NAME: &'static str = "trust-policy";

    pub fn new(root: TrustNode) -> Self {
        let leaves = root.leaf_count();
        Self {
            name: Self::DEFAULT_NAME.to_string(),
            root,
            leaves,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn root(&self) -> &TrustNode {
        &self.root
    }

    /// Evaluate the policy against `chain`.
    ///
    /// # Errors
    /// - `TrustError::DecisionRequired` as soon as a memorizing leaf asks
    ///   for a decision
    /// - `TrustError::Rejected` with every collected leaf cause otherwise
    pub fn check_trusted(
        &self,
        chain: &CertificateChain,
        auth_type: &AuthType,
    ) -> Result<(), TrustError> {
        let hash = chain.hash();

        if self.leaves == 0 {
            tracing::debug!(chain_hash = %hash, policy = %self.name, "No trust checks configured, rejecting");
            return Err(TrustError::Rejected(TrustRejected::new(
                chain.clone(),
                vec![TrustError::untrusted(
                    &self.name,
                    "no trust checks configured",
                )],
            )));
        }

        let mut causes = Vec::new();
        match self.root.evaluate(chain, auth_type, &mut causes) {
            Ok(true) => {
                tracing::debug!(chain_hash = %hash, policy = %self.name, "Certificate chain accepted");
                Ok(())
            }
            Ok(false) => {
                tracing::debug!(
                    chain_hash = %hash,
                    policy = %self.name,
                    causes = causes.len(),
                    "Certificate chain rejected"
                );
                if causes.is_empty() {
                    causes.push(TrustError::untrusted(&self.name, "no trust check accepted the chain"));
                }
                Err(TrustError::Rejected(TrustRejected::new(chain.clone(), causes)))
            }
            Err(e) => {
                tracing::debug!(chain_hash = %hash, policy = %self.name, "Trust decision required");
                Err(e)
            }
        }
    }
}

impl TrustCheck for CompositeTrustEvaluator {
    fn name(&self) -> &str {
        &self.name
    }

    fn check_trusted(
        &self,
        chain: &CertificateChain,
        auth_type: &AuthType,
    ) -> Result<(), TrustError> {
        CompositeTrustEvaluator::check_trusted(self, chain, auth_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TrustErrorKind;
    use crate::test_support::{self, StubCheck};
    use crate::trust::{CaTrustCheck, DenyAllCheck};

    fn sample_chain() -> CertificateChain {
        CertificateChain::from_der([b"leaf".to_vec()])
    }

    fn eval(root: TrustNode) -> Result<(), TrustError> {
        CompositeTrustEvaluator::new(root).check_trusted(&sample_chain(), &AuthType::from("RSA"))
    }

    #[test]
    fn default_evaluator_rejects_everything() {
        let evaluator = CompositeTrustEvaluator::default();
        let err = evaluator
            .check_trusted(&sample_chain(), &AuthType::default())
            .unwrap_err();
        assert_eq!(err.kind(), TrustErrorKind::Untrusted);
        assert!(err.to_string().contains("no trust checks configured"));
    }

    #[test]
    fn leafless_trees_reject() {
        assert!(eval(TrustNode::all([])).is_err());
        assert!(eval(TrustNode::any([])).is_err());
        assert!(eval(TrustNode::any([TrustNode::all([])])).is_err());
    }

    #[test]
    fn all_short_circuits_on_first_rejection() {
        let later = StubCheck::accept("later");
        let root = TrustNode::all([
            TrustNode::leaf(StubCheck::reject("first")),
            TrustNode::leaf(later.clone()),
        ]);
        let err = eval(root).unwrap_err();
        assert_eq!(later.calls(), 0);
        match err {
            TrustError::Rejected(rejected) => {
                assert_eq!(rejected.rejecting_checks(), vec!["first"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn all_rejects_if_any_child_rejects() {
        let root = TrustNode::all([
            TrustNode::leaf(StubCheck::accept("a")),
            TrustNode::leaf(StubCheck::accept("b")),
            TrustNode::leaf(StubCheck::reject("c")),
        ]);
        assert!(eval(root).is_err());

        let root = TrustNode::all([
            TrustNode::leaf(StubCheck::accept("a")),
            TrustNode::leaf(StubCheck::accept("b")),
        ]);
        assert!(eval(root).is_ok());
    }

    #[test]
    fn any_short_circuits_on_first_acceptance() {
        let later = StubCheck::reject("later");
        let root = TrustNode::any([
            TrustNode::leaf(StubCheck::accept("first")),
            TrustNode::leaf(later.clone()),
        ]);
        assert!(eval(root).is_ok());
        assert_eq!(later.calls(), 0);
    }

    #[test]
    fn any_accepts_if_some_child_accepts() {
        let root = TrustNode::any([
            TrustNode::leaf(StubCheck::reject("a")),
            TrustNode::leaf(StubCheck::reject("b")),
            TrustNode::leaf(StubCheck::accept("c")),
        ]);
        assert!(eval(root).is_ok());
    }

    #[test]
    fn rejection_collects_every_evaluated_cause() {
        let root = TrustNode::any([
            TrustNode::leaf(StubCheck::reject("a")),
            TrustNode::all([
                TrustNode::leaf(StubCheck::accept("b")),
                TrustNode::leaf(StubCheck::reject("c")),
            ]),
        ]);
        match eval(root).unwrap_err() {
            TrustError::Rejected(rejected) => {
                assert_eq!(rejected.rejecting_checks(), vec!["a", "c"]);
                assert_eq!(rejected.chain, sample_chain());
                assert_eq!(rejected.chain_hash, sample_chain().hash());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn decision_required_propagates_through_nodes() {
        let root = TrustNode::any([
            TrustNode::leaf(StubCheck::reject("roots")),
            TrustNode::all([TrustNode::leaf(StubCheck::decide("memorize"))]),
        ]);
        let err = eval(root).unwrap_err();
        assert_eq!(err.kind(), TrustErrorKind::DecisionRequired);
        assert_eq!(err.decision_request().unwrap().chain(), &sample_chain());
    }

    #[test]
    fn decision_required_stops_evaluation() {
        let later = StubCheck::accept("later");
        let root = TrustNode::any([
            TrustNode::leaf(StubCheck::decide("memorize")),
            TrustNode::leaf(later.clone()),
        ]);
        assert!(matches!(eval(root), Err(TrustError::DecisionRequired(_))));
        assert_eq!(later.calls(), 0);
    }

    #[test]
    fn accepting_sibling_preempts_decision() {
        let memo = StubCheck::decide("memorize");
        let root = TrustNode::any([
            TrustNode::leaf(StubCheck::accept("roots")),
            TrustNode::leaf(memo.clone()),
        ]);
        assert!(eval(root).is_ok());
        assert_eq!(memo.calls(), 0);
    }

    #[test]
    fn rejecting_and_sibling_preempts_decision() {
        let memo = StubCheck::decide("memorize");
        let root = TrustNode::all([
            TrustNode::leaf(StubCheck::reject("pinned")),
            TrustNode::leaf(memo.clone()),
        ]);
        assert!(matches!(eval(root), Err(TrustError::Rejected(_))));
        assert_eq!(memo.calls(), 0);
    }

    #[test]
    fn nested_evaluator_is_a_check() {
        let inner = CompositeTrustEvaluator::new(TrustNode::all([
            TrustNode::leaf(StubCheck::reject("inner")),
        ]))
        .with_name("inner-policy");
        let outer = TrustNode::any([
            TrustNode::leaf(inner),
            TrustNode::leaf(StubCheck::reject("outer")),
        ]);
        match eval(outer).unwrap_err() {
            TrustError::Rejected(rejected) => {
                assert_eq!(rejected.rejecting_checks(), vec!["inner", "outer"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn auth_type_reaches_leaves_unchanged() {
        let check = StubCheck::accept("a");
        let evaluator = CompositeTrustEvaluator::new(TrustNode::leaf(check.clone()));
        evaluator
            .check_trusted(&sample_chain(), &AuthType::from("ECDHE_ECDSA"))
            .unwrap();
        assert_eq!(check.last_auth_type().as_deref(), Some("ECDHE_ECDSA"));
    }

    #[test]
    fn scenario_a_deny_all_rejects() {
        let evaluator =
            CompositeTrustEvaluator::new(TrustNode::any([TrustNode::leaf(DenyAllCheck::new())]));
        let ca = test_support::make_ca("CA A");
        for chain in [sample_chain(), test_support::issue_leaf(&ca, "example.test")] {
            assert!(evaluator.check_trusted(&chain, &AuthType::default()).is_err());
        }
    }

    #[test]
    fn scenario_b_pinned_ca() {
        let ca_x = test_support::make_ca("CA X");
        let ca_y = test_support::make_ca("CA Y");
        let check = CaTrustCheck::from_der("ca-x", [ca_x.der.clone()]).unwrap();
        let evaluator = CompositeTrustEvaluator::new(TrustNode::all([TrustNode::leaf(check)]));

        let good = test_support::issue_leaf(&ca_x, "example.test");
        evaluator.check_trusted(&good, &AuthType::default()).unwrap();

        let bad = test_support::issue_leaf(&ca_y, "example.test");
        match evaluator.check_trusted(&bad, &AuthType::default()).unwrap_err() {
            TrustError::Rejected(rejected) => {
                assert_eq!(rejected.rejecting_checks(), vec!["ca-x"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
