//! Policy and role-link storage trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::AuthResult;

/// An access policy bound to one catalog resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    /// Policy identifier.
    pub id: Uuid,

    /// Unique policy name.
    pub name: String,

    /// Catalog resource the policy applies to.
    pub resource_id: Uuid,

    /// `false` makes this a deny policy.
    pub allowed: bool,

    /// When the policy was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Input for policy creation.
///
/// When `resource_id` is `None` the pair `action` + `resource` is resolved
/// against the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPolicy {
    /// Unique policy name.
    pub name: String,

    /// Action name, or `*`.
    pub action: String,

    /// Resource path as a human would type it (UUIDs and `*` allowed).
    pub resource: String,

    /// Explicit catalog resource ID, skipping resolution.
    pub resource_id: Option<Uuid>,

    /// `false` creates a deny policy.
    pub allowed: bool,
}

/// Storage operations for policies and role links.
///
/// Roles are identified by name.
#[async_trait]
pub trait AccessStore: Send + Sync {
    /// Persist a new policy.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` if the name is taken.
    async fn insert_policy(&self, policy: &Policy) -> AuthResult<()>;

    /// Attach a policy to a role. Linking twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the policy doesn't exist.
    async fn link_policy(&self, role: &str, policy_id: &Uuid) -> AuthResult<()>;

    /// Detach a policy from a role. Unlinking a missing link is a no-op.
    async fn unlink_policy(&self, role: &str, policy_id: &Uuid) -> AuthResult<()>;

    /// Grant a role to a subject. Linking twice is a no-op.
    async fn link_role(&self, subject_id: &str, role: &str) -> AuthResult<()>;

    /// Revoke a role from a subject. Unlinking a missing link is a no-op.
    async fn unlink_role(&self, subject_id: &str, role: &str) -> AuthResult<()>;

    /// Subjects currently holding `role`.
    async fn subjects_for_role(&self, role: &str) -> AuthResult<Vec<String>>;
}
