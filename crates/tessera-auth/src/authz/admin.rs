//! Policy and role-link administration.
//!
//! Every link change drops the cached permission documents of the subjects
//! it affects. The drop is fire-and-forget: a failure is logged and counted
//! but never fails or rolls back the mutation itself.

use std::sync::Arc;

use time::OffsetDateTime;
use tracing::instrument;
use uuid::Uuid;

use super::matches::ResourceDirectory;
use super::service::Authorizer;
use crate::AuthResult;
use crate::context::OperationContext;
use crate::error::AuthError;
use crate::storage::{AccessStore, NewPolicy, Policy};
use crate::telemetry::{DynTelemetry, observe};

/// Administrative operations on policies and roles.
pub struct AccessAdmin {
    access: Arc<dyn AccessStore>,
    directory: Arc<ResourceDirectory>,
    authorizer: Arc<Authorizer>,
    telemetry: DynTelemetry,
}

impl AccessAdmin {
    /// Creates the admin service.
    #[must_use]
    pub fn new(
        access: Arc<dyn AccessStore>,
        directory: Arc<ResourceDirectory>,
        authorizer: Arc<Authorizer>,
        telemetry: DynTelemetry,
    ) -> Self {
        Self {
            access,
            directory,
            authorizer,
            telemetry,
        }
    }

    /// Creates a policy, resolving its resource when no ID is given.
    ///
    /// # Errors
    /// - `Validation` for an empty name or action.
    /// - `NotFound` / `AmbiguousResource` from resource resolution, or
    ///   `NotFound` when an explicit resource ID does not exist.
    /// - `Conflict` when the name is taken.
    #[instrument(skip(self, ctx, policy), fields(name = %policy.name))]
    pub async fn create_policy(&self, ctx: &OperationContext, policy: NewPolicy) -> AuthResult<Policy> {
        let result = self.create_policy_inner(ctx, policy).await;
        observe(self.telemetry.as_ref(), "create_policy", result)
    }

    async fn create_policy_inner(&self, ctx: &OperationContext, new: NewPolicy) -> AuthResult<Policy> {
        if new.name.trim().is_empty() {
            return Err(AuthError::validation("policy name must not be empty"));
        }
        if new.action.trim().is_empty() {
            return Err(AuthError::validation("policy action must not be empty"));
        }

        let resource_id = match new.resource_id {
            Some(id) => self.directory.get_resource(ctx, &id).await?.id,
            None => {
                if new.resource.trim().is_empty() {
                    return Err(AuthError::validation(
                        "either resource or resource_id is required",
                    ));
                }
                self.directory
                    .resolve_resource_id(ctx, &new.action, &new.resource)
                    .await?
            }
        };

        let policy = Policy {
            id: Uuid::new_v4(),
            name: new.name.trim().to_string(),
            resource_id,
            allowed: new.allowed,
            created_at: OffsetDateTime::now_utc(),
        };
        ctx.run(self.access.insert_policy(&policy)).await??;
        tracing::info!(policy_id = %policy.id, resource_id = %resource_id, "policy created");
        Ok(policy)
    }

    /// Attaches a policy to a role and invalidates the role's subjects.
    #[instrument(skip(self, ctx))]
    pub async fn link_policy(&self, ctx: &OperationContext, role: &str, policy_id: &Uuid) -> AuthResult<()> {
        let result: AuthResult<_> = async {
            require_role(role)?;
            ctx.run(self.access.link_policy(role, policy_id)).await??;
            self.invalidate_role(ctx, role).await;
            Ok(())
        }
        .await;
        observe(self.telemetry.as_ref(), "link_policy", result)
    }

    /// Detaches a policy from a role and invalidates the role's subjects.
    #[instrument(skip(self, ctx))]
    pub async fn unlink_policy(
        &self,
        ctx: &OperationContext,
        role: &str,
        policy_id: &Uuid,
    ) -> AuthResult<()> {
        let result: AuthResult<_> = async {
            require_role(role)?;
            ctx.run(self.access.unlink_policy(role, policy_id)).await??;
            self.invalidate_role(ctx, role).await;
            Ok(())
        }
        .await;
        observe(self.telemetry.as_ref(), "unlink_policy", result)
    }

    /// Grants a role to a subject and invalidates that subject.
    #[instrument(skip(self, ctx))]
    pub async fn link_role(&self, ctx: &OperationContext, subject_id: &str, role: &str) -> AuthResult<()> {
        let result: AuthResult<_> = async {
            require_subject(subject_id)?;
            require_role(role)?;
            ctx.run(self.access.link_role(subject_id, role)).await??;
            self.invalidate_subject(ctx, subject_id).await;
            Ok(())
        }
        .await;
        observe(self.telemetry.as_ref(), "link_role", result)
    }

    /// Revokes a role from a subject and invalidates that subject.
    #[instrument(skip(self, ctx))]
    pub async fn unlink_role(&self, ctx: &OperationContext, subject_id: &str, role: &str) -> AuthResult<()> {
        let result: AuthResult<_> = async {
            require_subject(subject_id)?;
            require_role(role)?;
            ctx.run(self.access.unlink_role(subject_id, role)).await??;
            self.invalidate_subject(ctx, subject_id).await;
            Ok(())
        }
        .await;
        observe(self.telemetry.as_ref(), "unlink_role", result)
    }

    async fn invalidate_role(&self, ctx: &OperationContext, role: &str) {
        let subjects = match ctx.run(self.access.subjects_for_role(role)).await {
            Ok(Ok(subjects)) => subjects,
            Ok(Err(e)) | Err(e) => {
                tracing::warn!(role, error = %e, "cannot list role members for invalidation");
                self.telemetry.record_error("invalidate", &e);
                return;
            }
        };
        for subject_id in &subjects {
            self.invalidate_subject(ctx, subject_id).await;
        }
    }

    async fn invalidate_subject(&self, ctx: &OperationContext, subject_id: &str) {
        if let Err(e) = self.authorizer.invalidate(ctx, subject_id).await {
            tracing::warn!(subject_id, error = %e, "permission cache invalidation failed");
            self.telemetry.record_error("invalidate", &e);
        }
    }
}

fn require_role(role: &str) -> AuthResult<()> {
    if role.trim().is_empty() {
        return Err(AuthError::validation("role must not be empty"));
    }
    Ok(())
}

fn require_subject(subject_id: &str) -> AuthResult<()> {
    if subject_id.trim().is_empty() {
        return Err(AuthError::InvalidSubject);
    }
    Ok(())
}
