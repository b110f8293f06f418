//! Authorization: permission documents, policy evaluation and administration.
//!
//! - [`document`]: the per-subject [`PermissionDocument`]
//! - [`evaluator`]: the [`PolicyEvaluator`] seam
//! - [`rules`]: the built-in declarative [`RuleSetEvaluator`]
//! - [`pattern`]: resource-path normalization
//! - [`service`]: the [`Authorizer`] decision point
//! - [`matches`]: catalog reads and action/path resolution
//! - [`admin`]: policy and role-link mutations

pub mod admin;
pub mod document;
pub mod evaluator;
pub mod matches;
pub mod pattern;
pub mod rules;
pub mod service;

pub use admin::AccessAdmin;
pub use document::{PermissionDocument, PermissionGrant};
pub use evaluator::{Decision, EvaluationError, EvaluationInput, PolicyEvaluator};
pub use matches::{DEFAULT_RESOURCE_TTL, ResourceDirectory, match_filter};
pub use rules::{Condition, DEFAULT_QUERY, Effect, Rule, RuleSet, RuleSetEvaluator};
pub use service::{Authorizer, DEFAULT_PERMISSION_TTL};
