//! # tessera-auth
//!
//! Identity and access-control core for multi-tenant services.
//!
//! This crate provides:
//! - A cache-aside read primitive over Redis or an in-process store
//! - Policy-based authorization over per-subject permission documents
//! - Signed session tokens: issue, verify, refresh and email verification
//! - Argon2 password hashing and AES-GCM field encryption
//!
//! ## Modules
//!
//! - [`cache`] - Cache-aside primitive, key/value backends and codecs
//! - [`authz`] - Authorizer, rule evaluation, resource matching, administration
//! - [`token`] - Signing keys, token verification and session flows
//! - [`crypto`] - Password hashing and field encryption
//! - [`storage`] - Collaborator traits for subjects, resources and policies
//! - [`mail`] - Verification mail rendering and the dispatch trait
//! - [`health`] - Collaborator liveness checks
//! - [`bootstrap`] - Builds every service from configuration
//! - [`config`] - Configuration sections and loading
//! - [`context`] - Cancellation and deadlines
//! - [`telemetry`] - Injected counters and error reporting
//! - [`observability`] - `tracing` subscriber setup

pub mod authz;
pub mod bootstrap;
pub mod cache;
pub mod config;
pub mod context;
pub mod crypto;
pub mod error;
pub mod health;
pub mod mail;
pub mod observability;
pub mod storage;
pub mod telemetry;
pub mod token;

#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

pub use bootstrap::{Collaborators, Services};
pub use config::{ConfigError, TesseraConfig};
pub use context::OperationContext;
pub use error::{AuthError, ErrorCategory, TokenError};

/// Type alias for authentication/authorization results.
pub type AuthResult<T> = Result<T, AuthError>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use tessera_auth::prelude::*;
/// ```
pub mod prelude {
    pub use crate::AuthResult;
    pub use crate::authz::{
        AccessAdmin, Authorizer, Decision, PermissionDocument, PermissionGrant, PolicyEvaluator,
        ResourceDirectory, RuleSet, RuleSetEvaluator,
    };
    pub use crate::bootstrap::{Collaborators, Services};
    pub use crate::cache::{CacheAside, Codec, Json, KeyValueStore, LocalStore, MessagePack};
    pub use crate::config::{ConfigError, TesseraConfig};
    pub use crate::context::OperationContext;
    pub use crate::crypto::{FieldCipher, PasswordHasher};
    pub use crate::error::{AuthError, ErrorCategory, TokenError};
    pub use crate::mail::{MailDispatch, RenderedMessage};
    pub use crate::storage::{
        AccessStore, FieldUpdate, NewPolicy, NewSubject, Paginator, Policy, Resource,
        ResourceCatalog, ResourceFilter, Subject, SubjectStore, SubjectUpdate,
    };
    pub use crate::telemetry::{Counter, DynTelemetry, MetricsTelemetry, NoopTelemetry, TelemetrySink};
    pub use crate::token::{
        JwtService, KeyRing, ProfileUpdate, SessionService, SigningAlgorithm, SigningKeyPair,
        TokenClaims, TokenPair, TokenType, VerificationOutcome,
    };
}
