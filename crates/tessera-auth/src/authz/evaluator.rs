//! The pluggable policy evaluation contract.

use serde::{Deserialize, Serialize};

use super::document::PermissionDocument;

/// The request being decided.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationInput {
    /// Subject identifier.
    pub subject_id: String,
    /// Requested action.
    pub action: String,
    /// Requested resource path.
    pub resource: String,
}

/// Raw outcome of evaluating one query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The query produced no results at all.
    NoResults,
    /// Results exist but the query expression is undefined for this input.
    Undefined,
    /// The query evaluated to a boolean.
    Value(bool),
}

impl Decision {
    /// Only an explicit `true` allows. Everything else fails closed.
    #[must_use]
    pub fn is_allowed(self) -> bool {
        matches!(self, Self::Value(true))
    }

    /// Label used in decision metrics and logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoResults => "no_results",
            Self::Undefined => "undefined",
            Self::Value(true) => "allow",
            Self::Value(false) => "deny",
        }
    }
}

/// Failures of the evaluation engine itself, as opposed to a deny.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EvaluationError {
    /// The rule set is malformed.
    #[error("invalid rule set: {0}")]
    InvalidRuleSet(String),

    /// Evaluation failed for this input.
    #[error("evaluation failed: {0}")]
    Evaluation(String),
}

/// A rule engine answering a named query over a permission document.
///
/// The rule set and query names are fixed when the evaluator is built.
/// Evaluation is CPU-bound and synchronous.
pub trait PolicyEvaluator: Send + Sync {
    /// Evaluates `query` for `input` with `document` as data.
    fn evaluate(
        &self,
        query: &str,
        document: &PermissionDocument,
        input: &EvaluationInput,
    ) -> Result<Decision, EvaluationError>;
}
