//! Liveness of the external collaborators.

use std::time::{Duration, Instant};

use serde::Serialize;

use crate::cache::KeyValueStore;
use crate::context::OperationContext;
use crate::storage::SubjectStore;

/// Result of probing one collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentHealth {
    pub healthy: bool,
    /// Backend label, e.g. `redis` or `local` for the cache.
    pub backend: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(rename = "responseTimeMs")]
    pub response_time_ms: u64,
}

impl ComponentHealth {
    fn from_check<E: std::fmt::Display>(
        backend: &str,
        outcome: Result<(), E>,
        elapsed: Duration,
    ) -> Self {
        Self {
            healthy: outcome.is_ok(),
            backend: backend.to_string(),
            message: outcome.err().map(|e| e.to_string()),
            response_time_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

/// Aggregate health of the core's collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    /// `true` only when every component is healthy.
    pub healthy: bool,
    pub cache: ComponentHealth,
    pub subjects: ComponentHealth,
}

/// Checks the cache and the subject store concurrently.
///
/// Both checks always run to completion; one failing does not skip the
/// other.
pub async fn check(
    ctx: &OperationContext,
    cache: &dyn KeyValueStore,
    subjects: &dyn SubjectStore,
) -> HealthReport {
    let cache_check = async {
        let started = Instant::now();
        let outcome = match ctx.run(cache.ping()).await {
            Ok(inner) => inner.map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        ComponentHealth::from_check(cache.mode(), outcome, started.elapsed())
    };
    let subjects_check = async {
        let started = Instant::now();
        let outcome = match ctx.run(subjects.ping()).await {
            Ok(inner) => inner.map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        ComponentHealth::from_check("subjects", outcome, started.elapsed())
    };

    let (cache, subjects) = tokio::join!(cache_check, subjects_check);
    let healthy = cache.healthy & subjects.healthy;
    if !healthy {
        tracing::warn!(
            cache = cache.healthy,
            subjects = subjects.healthy,
            "health check failed"
        );
    }
    HealthReport {
        healthy,
        cache,
        subjects,
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use uuid::Uuid;

    use super::*;
    use crate::AuthResult;
    use crate::authz::PermissionDocument;
    use crate::cache::LocalStore;
    use crate::error::AuthError;
    use crate::storage::{NewSubject, Subject, SubjectUpdate};
    use crate::testutil::FailingStore;

    struct Subjects {
        up: bool,
    }

    #[async_trait]
    impl SubjectStore for Subjects {
        async fn load_permission_document(&self, _subject_id: &str) -> AuthResult<PermissionDocument> {
            Ok(PermissionDocument::new())
        }

        async fn find_by_id(&self, _id: &Uuid) -> AuthResult<Option<Subject>> {
            Ok(None)
        }

        async fn find_by_email(&self, _email: &str) -> AuthResult<Option<Subject>> {
            Ok(None)
        }

        async fn insert(&self, _subject: NewSubject) -> AuthResult<Subject> {
            Err(AuthError::internal("unused"))
        }

        async fn update_by_id(&self, _id: &Uuid, _update: SubjectUpdate) -> AuthResult<Subject> {
            Err(AuthError::internal("unused"))
        }

        async fn ping(&self) -> AuthResult<()> {
            if self.up {
                Ok(())
            } else {
                Err(AuthError::dependency("connection refused"))
            }
        }
    }

    #[tokio::test]
    async fn test_all_healthy() {
        let report = check(
            &OperationContext::new(),
            &LocalStore::new(),
            &Subjects { up: true },
        )
        .await;
        assert!(report.healthy);
        assert_eq!(report.cache.backend, "local");
        assert!(report.cache.message.is_none());
    }

    #[tokio::test]
    async fn test_each_component_checked_independently() {
        let failing = FailingStore::default();
        let report = check(&OperationContext::new(), &failing, &Subjects { up: false }).await;
        assert!(!report.healthy);
        assert!(!report.cache.healthy);
        assert!(!report.subjects.healthy);
        assert_eq!(failing.calls(), 1);
        assert!(report.subjects.message.unwrap().contains("connection refused"));
    }

    #[tokio::test]
    async fn test_one_failure_makes_report_unhealthy() {
        let report = check(
            &OperationContext::new(),
            &FailingStore::default(),
            &Subjects { up: true },
        )
        .await;
        assert!(!report.healthy);
        assert!(report.subjects.healthy);
    }
}
