//! Wires the services together from a [`TesseraConfig`].

use std::sync::Arc;

use crate::AuthResult;
use crate::authz::{AccessAdmin, Authorizer, PolicyEvaluator, ResourceDirectory, RuleSet, RuleSetEvaluator};
use crate::cache::{CacheAside, DynKeyValueStore, LocalStore, create_store};
use crate::config::TesseraConfig;
use crate::context::OperationContext;
use crate::crypto::PasswordHasher;
use crate::error::AuthError;
use crate::health::{self, HealthReport};
use crate::mail::MailDispatch;
use crate::storage::{AccessStore, ResourceCatalog, SubjectStore};
use crate::telemetry::DynTelemetry;
use crate::token::{JwtService, KeyRing, SessionService};

/// External collaborators the services are built on.
pub struct Collaborators {
    pub subjects: Arc<dyn SubjectStore>,
    pub catalog: Arc<dyn ResourceCatalog>,
    pub access: Arc<dyn AccessStore>,
    pub mail: Arc<dyn MailDispatch>,
    pub telemetry: DynTelemetry,
}

/// Every public service, sharing one cache and one key ring.
pub struct Services {
    pub authorizer: Arc<Authorizer>,
    pub directory: Arc<ResourceDirectory>,
    pub admin: AccessAdmin,
    pub sessions: SessionService,
    cache_store: DynKeyValueStore,
    subjects: Arc<dyn SubjectStore>,
}

impl Services {
    /// Builds the services.
    ///
    /// A Redis backend that cannot be reached degrades to the local store;
    /// an unreadable key or rule file fails.
    ///
    /// # Errors
    /// `Validation` for an invalid configuration, key file or rule set.
    pub async fn build(config: &TesseraConfig, deps: Collaborators) -> AuthResult<Self> {
        config
            .validate()
            .map_err(|e| AuthError::validation(e.to_string()))?;

        let evaluator: Arc<dyn PolicyEvaluator> = Arc::new(load_evaluator(config)?);
        let mut authorizer = Authorizer::new(
            deps.subjects.clone(),
            evaluator,
            config.authz.query.clone(),
            deps.telemetry.clone(),
        );
        let mut directory = ResourceDirectory::new(deps.catalog.clone(), deps.telemetry.clone());

        let cache_store: DynKeyValueStore = if config.cache.enabled {
            let store = create_store(&config.cache).await;
            let cache = CacheAside::new(store.clone(), deps.telemetry.clone(), config.cache.query_timeout);
            authorizer = authorizer.with_cache(cache.clone(), config.cache.permission_ttl);
            directory = directory.with_cache(cache, config.cache.resource_ttl);
            store
        } else {
            tracing::info!("cache disabled, reading straight from the stores");
            Arc::new(LocalStore::new())
        };
        let authorizer = Arc::new(authorizer);
        let directory = Arc::new(directory);

        let admin = AccessAdmin::new(
            deps.access.clone(),
            directory.clone(),
            authorizer.clone(),
            deps.telemetry.clone(),
        );

        let keys = KeyRing::from_settings(&config.signing)?;
        let jwt = Arc::new(JwtService::from_settings(&config.tokens, keys));
        let hasher = PasswordHasher::new(config.password.work_factor, config.password.memory_kib)?;
        let sessions = SessionService::new(
            deps.subjects.clone(),
            deps.mail.clone(),
            jwt,
            hasher,
            deps.telemetry.clone(),
        )
        .with_token_settings(config.tokens.clone())
        .with_mail_settings(config.mail.clone());

        tracing::info!(
            cache = cache_store.mode(),
            query = authorizer.query(),
            "services ready"
        );
        Ok(Self {
            authorizer,
            directory,
            admin,
            sessions,
            cache_store,
            subjects: deps.subjects,
        })
    }

    /// Checks the cache backend and the subject store.
    pub async fn health(&self, ctx: &OperationContext) -> HealthReport {
        health::check(ctx, self.cache_store.as_ref(), self.subjects.as_ref()).await
    }
}

fn load_evaluator(config: &TesseraConfig) -> AuthResult<RuleSetEvaluator> {
    let rule_set = match &config.authz.rules_path {
        Some(path) => {
            tracing::info!(path = %path.display(), "loading authorization rules");
            RuleSet::from_path(path).map_err(|e| AuthError::validation(e.to_string()))?
        }
        None => RuleSet::builtin(&config.authz.query),
    };
    RuleSetEvaluator::new(&rule_set).map_err(|e| AuthError::validation(e.to_string()))
}
