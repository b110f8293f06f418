//! Access decisions.
//!
//! [`Authorizer::authorize`] answers "may subject S perform action A on
//! resource R". The subject's permission document is read through the
//! cache-aside primitive and handed to the [`PolicyEvaluator`] together with
//! the request. Anything but an explicit `true` is [`AuthError::Unauthorized`].

use std::sync::Arc;
use std::time::Duration;

use tracing::instrument;

use super::document::PermissionDocument;
use super::evaluator::{EvaluationInput, PolicyEvaluator};
use crate::AuthResult;
use crate::cache::{CacheAside, MessagePack, keys};
use crate::context::OperationContext;
use crate::error::AuthError;
use crate::storage::SubjectStore;
use crate::telemetry::{Counter, DynTelemetry, observe};

/// Default TTL for cached permission documents.
pub const DEFAULT_PERMISSION_TTL: Duration = Duration::from_secs(600);

/// Policy enforcement point.
pub struct Authorizer {
    subjects: Arc<dyn SubjectStore>,
    evaluator: Arc<dyn PolicyEvaluator>,
    query: String,
    cache: Option<CacheAside>,
    permission_ttl: Duration,
    telemetry: DynTelemetry,
}

impl Authorizer {
    /// Creates an authorizer that reads documents straight from `subjects`.
    #[must_use]
    pub fn new(
        subjects: Arc<dyn SubjectStore>,
        evaluator: Arc<dyn PolicyEvaluator>,
        query: impl Into<String>,
        telemetry: DynTelemetry,
    ) -> Self {
        Self {
            subjects,
            evaluator,
            query: query.into(),
            cache: None,
            permission_ttl: DEFAULT_PERMISSION_TTL,
            telemetry,
        }
    }

    /// Reads documents through `cache`, storing them for `ttl`.
    #[must_use]
    pub fn with_cache(mut self, cache: CacheAside, ttl: Duration) -> Self {
        self.cache = Some(cache);
        self.permission_ttl = ttl;
        self
    }

    /// The query entry point evaluated for every decision.
    #[must_use]
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Returns `Ok(())` when the request is allowed.
    ///
    /// # Errors
    /// - `InvalidSubject` for an empty subject.
    /// - `Unauthorized` when the rules deny, produce nothing, or are undefined.
    /// - `Internal` when the rule engine fails.
    /// - Store errors unchanged (usually `Dependency`).
    #[instrument(skip(self, ctx), fields(query = %self.query))]
    pub async fn authorize(
        &self,
        ctx: &OperationContext,
        subject_id: &str,
        action: &str,
        resource: &str,
    ) -> AuthResult<()> {
        let result = self.decide(ctx, subject_id, action, resource).await;
        observe(self.telemetry.as_ref(), "authorize", result)
    }

    async fn decide(
        &self,
        ctx: &OperationContext,
        subject_id: &str,
        action: &str,
        resource: &str,
    ) -> AuthResult<()> {
        if subject_id.trim().is_empty() {
            return Err(AuthError::InvalidSubject);
        }

        let document = self.permission_document(ctx, subject_id).await?;
        let input = EvaluationInput {
            subject_id: subject_id.to_string(),
            action: action.to_string(),
            resource: resource.to_string(),
        };

        let decision = self
            .evaluator
            .evaluate(&self.query, &document, &input)
            .map_err(|e| AuthError::internal(format!("policy evaluation failed: {e}")))?;

        let allowed = decision.is_allowed();
        self.telemetry.increment(
            Counter::AuthzDecision,
            if allowed { "allow" } else { "deny" },
        );
        tracing::debug!(decision = decision.as_str(), "authorization decided");

        if allowed {
            Ok(())
        } else {
            Err(AuthError::Unauthorized)
        }
    }

    /// Loads the subject's document, through the cache when configured.
    pub async fn permission_document(
        &self,
        ctx: &OperationContext,
        subject_id: &str,
    ) -> AuthResult<PermissionDocument> {
        let subjects = &self.subjects;
        let load = move || async move { subjects.load_permission_document(subject_id).await };
        match &self.cache {
            Some(cache) => {
                cache
                    .fetch(
                        ctx,
                        &keys::authz_key(subject_id),
                        &MessagePack,
                        self.permission_ttl,
                        load,
                    )
                    .await
            }
            None => ctx.run(load()).await?,
        }
    }

    /// Drops the subject's cached document so the next decision reloads it.
    ///
    /// A no-op when caching is disabled.
    #[instrument(skip(self, ctx))]
    pub async fn invalidate(&self, ctx: &OperationContext, subject_id: &str) -> AuthResult<()> {
        match &self.cache {
            Some(cache) => cache.remove(ctx, &keys::authz_key(subject_id)).await,
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use uuid::Uuid;

    use super::*;
    use crate::authz::document::PermissionGrant;
    use crate::authz::evaluator::{Decision, EvaluationError};
    use crate::authz::rules::{DEFAULT_QUERY, RuleSetEvaluator};
    use crate::cache::{DEFAULT_QUERY_TIMEOUT, LocalStore};
    use crate::storage::{NewSubject, Subject, SubjectUpdate};
    use crate::testutil::{FailingStore, RecordingTelemetry};

    /// Subject store that only serves permission documents.
    #[derive(Default)]
    struct Documents {
        grants: Mutex<Vec<PermissionGrant>>,
        loads: AtomicUsize,
        fail: bool,
    }

    impl Documents {
        fn with(grants: Vec<PermissionGrant>) -> Self {
            Self {
                grants: Mutex::new(grants),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl SubjectStore for Documents {
        async fn load_permission_document(&self, _id: &str) -> AuthResult<PermissionDocument> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(AuthError::dependency("database unreachable"));
            }
            Ok(PermissionDocument::from_grants(
                self.grants.lock().unwrap().clone(),
            ))
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
            Ok(())
        }
    }

    struct Broken;

    impl PolicyEvaluator for Broken {
        fn evaluate(
            &self,
            _query: &str,
            _document: &PermissionDocument,
            _input: &EvaluationInput,
        ) -> Result<Decision, EvaluationError> {
            Err(EvaluationError::Evaluation("panic in rule".into()))
        }
    }

    struct Fixture {
        authorizer: Authorizer,
        documents: Arc<Documents>,
        telemetry: Arc<RecordingTelemetry>,
    }

    fn fixture(documents: Documents, cached: bool) -> Fixture {
        let documents = Arc::new(documents);
        let telemetry = Arc::new(RecordingTelemetry::default());
        let evaluator = Arc::new(RuleSetEvaluator::builtin(DEFAULT_QUERY).unwrap());
        let mut authorizer =
            Authorizer::new(documents.clone(), evaluator, DEFAULT_QUERY, telemetry.clone());
        if cached {
            let cache = CacheAside::new(
                Arc::new(LocalStore::new()),
                telemetry.clone(),
                DEFAULT_QUERY_TIMEOUT,
            );
            authorizer = authorizer.with_cache(cache, DEFAULT_PERMISSION_TTL);
        }
        Fixture {
            authorizer,
            documents,
            telemetry,
        }
    }

    fn reader_grants() -> Vec<PermissionGrant> {
        vec![PermissionGrant::allow("read", "/users/{user_id}")]
    }

    #[tokio::test]
    async fn test_allowed_request() {
        let f = fixture(Documents::with(reader_grants()), true);
        let ctx = OperationContext::new();
        f.authorizer
            .authorize(&ctx, "s-1", "read", "/users/*")
            .await
            .unwrap();
        assert_eq!(f.telemetry.count_labeled(Counter::AuthzDecision, "allow"), 1);
    }

    #[tokio::test]
    async fn test_empty_subject_rejected() {
        let f = fixture(Documents::default(), true);
        let result = f
            .authorizer
            .authorize(&OperationContext::new(), "", "read", "/users/*")
            .await;
        assert!(matches!(result, Err(AuthError::InvalidSubject)));
        assert_eq!(f.documents.loads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_document_always_unauthorized() {
        let f = fixture(Documents::default(), false);
        let ctx = OperationContext::new();
        for (action, resource) in [("read", "/users/*"), ("*", "/"), ("write", "")] {
            let result = f.authorizer.authorize(&ctx, "s-1", action, resource).await;
            assert!(matches!(result, Err(AuthError::Unauthorized)), "{action} {resource}");
        }
        assert_eq!(f.telemetry.errors().len(), 3);
    }

    #[tokio::test]
    async fn test_document_cached_between_calls() {
        let f = fixture(Documents::with(reader_grants()), true);
        let ctx = OperationContext::new();
        for _ in 0..3 {
            f.authorizer
                .authorize(&ctx, "s-1", "read", "/users/*")
                .await
                .unwrap();
        }
        assert_eq!(f.documents.loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_uncached_reads_every_time() {
        let f = fixture(Documents::with(reader_grants()), false);
        let ctx = OperationContext::new();
        for _ in 0..2 {
            f.authorizer
                .authorize(&ctx, "s-1", "read", "/users/*")
                .await
                .unwrap();
        }
        assert_eq!(f.documents.loads.load(Ordering::SeqCst), 2);
        f.authorizer.invalidate(&ctx, "s-1").await.unwrap();
    }

    #[tokio::test]
    async fn test_invalidate_forces_fresh_load() {
        let f = fixture(Documents::with(reader_grants()), true);
        let ctx = OperationContext::new();
        f.authorizer
            .authorize(&ctx, "s-1", "read", "/users/*")
            .await
            .unwrap();

        f.documents.grants.lock().unwrap().clear();
        // Stale until invalidated.
        f.authorizer
            .authorize(&ctx, "s-1", "read", "/users/*")
            .await
            .unwrap();

        f.authorizer.invalidate(&ctx, "s-1").await.unwrap();
        let result = f.authorizer.authorize(&ctx, "s-1", "read", "/users/*").await;
        assert!(matches!(result, Err(AuthError::Unauthorized)));
        assert_eq!(f.documents.loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_regex_syntax_in_resource_is_unauthorized() {
        let f = fixture(
            Documents::with(vec![PermissionGrant::allow("delete", "/public/notes")]),
            false,
        );
        let ctx = OperationContext::new();
        for resource in [".*", "/admin/.*|/public/notes", "/public/(notes)?"] {
            let result = f.authorizer.authorize(&ctx, "s-1", "delete", resource).await;
            assert!(matches!(result, Err(AuthError::Unauthorized)), "{resource}");
        }
        f.authorizer
            .authorize(&ctx, "s-1", "delete", "/public/notes")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_engine_error_is_internal() {
        let documents = Arc::new(Documents::with(reader_grants()));
        let telemetry = Arc::new(RecordingTelemetry::default());
        let authorizer = Authorizer::new(documents, Arc::new(Broken), DEFAULT_QUERY, telemetry.clone());

        let result = authorizer
            .authorize(&OperationContext::new(), "s-1", "read", "/users/*")
            .await;
        assert!(matches!(result, Err(AuthError::Internal { .. })));
        assert_eq!(telemetry.errors(), vec![("authorize", "internal".to_string())]);
    }

    #[tokio::test]
    async fn test_store_error_propagates() {
        let documents = Documents {
            fail: true,
            ..Documents::default()
        };
        let f = fixture(documents, true);
        let result = f
            .authorizer
            .authorize(&OperationContext::new(), "s-1", "read", "/users/*")
            .await;
        assert!(matches!(result, Err(AuthError::Dependency { .. })));
    }

    #[tokio::test]
    async fn test_cache_outage_still_decides() {
        let documents = Arc::new(Documents::with(reader_grants()));
        let telemetry = Arc::new(RecordingTelemetry::default());
        let cache = CacheAside::new(
            Arc::new(FailingStore::default()),
            telemetry.clone(),
            DEFAULT_QUERY_TIMEOUT,
        );
        let authorizer = Authorizer::new(
            documents,
            Arc::new(RuleSetEvaluator::builtin(DEFAULT_QUERY).unwrap()),
            DEFAULT_QUERY,
            telemetry,
        )
        .with_cache(cache, DEFAULT_PERMISSION_TTL);

        authorizer
            .authorize(&OperationContext::new(), "s-1", "read", "/users/*")
            .await
            .unwrap();
    }
}
