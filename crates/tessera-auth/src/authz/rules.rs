//! Declarative JSON rule sets.
//!
//! A rule set is an ordered list of rules, each bound to a query name. For a
//! query, the first rule whose conditions all hold decides:
//!
//! ```json
//! {
//!   "rules": [
//!     { "name": "explicit-deny", "query": "authz.allow", "effect": "deny",
//!       "when": [{ "type": "denied" }] },
//!     { "name": "granted", "query": "authz.allow", "effect": "allow",
//!       "when": [{ "type": "granted" }] }
//!   ]
//! }
//! ```
//!
//! A query with no rules yields [`Decision::NoResults`]; a query whose rules
//! all fail to match yields [`Decision::Undefined`].

use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::document::{PermissionDocument, PermissionGrant};
use super::evaluator::{Decision, EvaluationError, EvaluationInput, PolicyEvaluator};
use super::pattern;

/// Default query entry point.
pub const DEFAULT_QUERY: &str = "authz.allow";

/// Outcome a rule produces when it matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    /// Decide `true`.
    Allow,
    /// Decide `false`.
    Deny,
}

/// A predicate over the input and the permission document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Condition {
    /// An allowing grant covers the request.
    Granted,
    /// An explicit deny grant covers the request.
    Denied,
    /// The requested action is one of `actions`.
    ActionIn {
        /// Accepted actions.
        actions: Vec<String>,
    },
    /// The requested resource path matches `pattern`.
    ResourceMatches {
        /// Regex over the requested path.
        pattern: String,
    },
    /// The subject is one of `subjects`.
    SubjectIn {
        /// Accepted subject identifiers.
        subjects: Vec<String>,
    },
    /// A grant covering the request carries `key = value`.
    Metadata {
        /// Metadata key.
        key: String,
        /// Required value.
        value: String,
    },
    /// Negation.
    Not {
        /// Negated condition.
        condition: Box<Condition>,
    },
    /// Disjunction.
    Any {
        /// Alternatives.
        conditions: Vec<Condition>,
    },
}

/// One rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// Rule name for logs.
    pub name: String,
    /// Query this rule answers.
    pub query: String,
    /// Outcome when all conditions hold.
    pub effect: Effect,
    /// Conditions, all of which must hold. Empty always matches.
    #[serde(default)]
    pub when: Vec<Condition>,
}

/// An ordered rule list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSet {
    /// Rules in evaluation order.
    pub rules: Vec<Rule>,
}

impl RuleSet {
    /// The built-in set: explicit denies win, then grants allow.
    #[must_use]
    pub fn builtin(query: &str) -> Self {
        Self {
            rules: vec![
                Rule {
                    name: "explicit-deny".into(),
                    query: query.into(),
                    effect: Effect::Deny,
                    when: vec![Condition::Denied],
                },
                Rule {
                    name: "granted".into(),
                    query: query.into(),
                    effect: Effect::Allow,
                    when: vec![Condition::Granted],
                },
            ],
        }
    }

    /// Parses a rule set from JSON.
    pub fn from_json(json: &str) -> Result<Self, EvaluationError> {
        serde_json::from_str(json).map_err(|e| EvaluationError::InvalidRuleSet(e.to_string()))
    }

    /// Reads and parses a rule set file.
    pub fn from_path(path: &Path) -> Result<Self, EvaluationError> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            EvaluationError::InvalidRuleSet(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json(&json)
    }
}

/// A condition with its regexes compiled.
#[derive(Debug)]
enum Compiled {
    Granted,
    Denied,
    ActionIn(Vec<String>),
    ResourceMatches(Regex),
    SubjectIn(Vec<String>),
    Metadata { key: String, value: String },
    Not(Box<Compiled>),
    Any(Vec<Compiled>),
}

impl Compiled {
    fn build(condition: &Condition) -> Result<Self, EvaluationError> {
        Ok(match condition {
            Condition::Granted => Self::Granted,
            Condition::Denied => Self::Denied,
            Condition::ActionIn { actions } => Self::ActionIn(actions.clone()),
            Condition::ResourceMatches { pattern } => {
                Self::ResourceMatches(Regex::new(pattern).map_err(|e| {
                    EvaluationError::InvalidRuleSet(format!("bad pattern {pattern:?}: {e}"))
                })?)
            }
            Condition::SubjectIn { subjects } => Self::SubjectIn(subjects.clone()),
            Condition::Metadata { key, value } => Self::Metadata {
                key: key.clone(),
                value: value.clone(),
            },
            Condition::Not { condition } => Self::Not(Box::new(Self::build(condition)?)),
            Condition::Any { conditions } => Self::Any(
                conditions
                    .iter()
                    .map(Self::build)
                    .collect::<Result<_, _>>()?,
            ),
        })
    }

    fn holds(&self, request: &Request<'_>) -> bool {
        match self {
            Self::Granted => request.covering().any(|g| g.allowed),
            Self::Denied => request.covering().any(|g| !g.allowed),
            Self::ActionIn(actions) => actions.iter().any(|a| a == &request.input.action),
            Self::ResourceMatches(re) => re.is_match(&request.input.resource),
            Self::SubjectIn(subjects) => subjects.iter().any(|s| s == &request.input.subject_id),
            Self::Metadata { key, value } => request
                .covering()
                .any(|g| g.metadata.get(key).is_some_and(|v| v == value)),
            Self::Not(inner) => !inner.holds(request),
            Self::Any(alternatives) => alternatives.iter().any(|c| c.holds(request)),
        }
    }
}

#[derive(Debug)]
struct CompiledRule {
    name: String,
    query: String,
    effect: Effect,
    when: Vec<Compiled>,
}

/// Per-call view: the input, the document and the request's path pattern.
struct Request<'a> {
    input: &'a EvaluationInput,
    document: &'a PermissionDocument,
    resource: Regex,
}

impl Request<'_> {
    /// Grants naming the requested action (or `*`) whose resource template
    /// matches the requested path.
    fn covering(&self) -> impl Iterator<Item = &PermissionGrant> {
        self.document.grants().filter(|g| {
            g.covers_action(&self.input.action) && self.resource.is_match(&g.resource)
        })
    }
}

/// [`PolicyEvaluator`] over a [`RuleSet`].
#[derive(Debug)]
pub struct RuleSetEvaluator {
    rules: Vec<CompiledRule>,
}

impl RuleSetEvaluator {
    /// Validates and compiles `rule_set`.
    ///
    /// # Errors
    /// Returns `InvalidRuleSet` on an empty rule or query name or a bad
    /// pattern.
    pub fn new(rule_set: &RuleSet) -> Result<Self, EvaluationError> {
        let rules = rule_set
            .rules
            .iter()
            .map(|rule| {
                if rule.name.trim().is_empty() || rule.query.trim().is_empty() {
                    return Err(EvaluationError::InvalidRuleSet(
                        "rule name and query must not be empty".into(),
                    ));
                }
                Ok(CompiledRule {
                    name: rule.name.clone(),
                    query: rule.query.clone(),
                    effect: rule.effect,
                    when: rule
                        .when
                        .iter()
                        .map(Compiled::build)
                        .collect::<Result<_, _>>()?,
                })
            })
            .collect::<Result<_, _>>()?;
        Ok(Self { rules })
    }

    /// Evaluator for [`RuleSet::builtin`].
    pub fn builtin(query: &str) -> Result<Self, EvaluationError> {
        Self::new(&RuleSet::builtin(query))
    }

    /// Names of all queries with at least one rule.
    pub fn queries(&self) -> impl Iterator<Item = &str> {
        let mut seen: Vec<&str> = Vec::new();
        for rule in &self.rules {
            if !seen.contains(&rule.query.as_str()) {
                seen.push(&rule.query);
            }
        }
        seen.into_iter()
    }
}

impl PolicyEvaluator for RuleSetEvaluator {
    fn evaluate(
        &self,
        query: &str,
        document: &PermissionDocument,
        input: &EvaluationInput,
    ) -> Result<Decision, EvaluationError> {
        let mut rules = self.rules.iter().filter(|r| r.query == query).peekable();
        if rules.peek().is_none() {
            return Ok(Decision::NoResults);
        }

        let resource = pattern::request_matcher(&input.resource).map_err(|e| {
            EvaluationError::Evaluation(format!("resource {:?} is not matchable: {e}", input.resource))
        })?;
        let request = Request {
            input,
            document,
            resource,
        };

        for rule in rules {
            if rule.when.iter().all(|c| c.holds(&request)) {
                tracing::trace!(rule = %rule.name, effect = ?rule.effect, "rule matched");
                return Ok(Decision::Value(rule.effect == Effect::Allow));
            }
        }
        Ok(Decision::Undefined)
    }
}
