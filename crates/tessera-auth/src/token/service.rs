//! Session flows built on top of [`JwtService`].
//!
//! Accounts start disabled and are enabled by the email-verification
//! exchange. Sign-in failures never reveal whether the email exists, the
//! password was wrong, or the account is still disabled.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

use super::claims::{TokenClaims, TokenType};
use super::jwt::{IssuedToken, JwtService};
use crate::AuthResult;
use crate::config::{MailSettings, TokenSettings};
use crate::context::OperationContext;
use crate::crypto::PasswordHasher;
use crate::error::{AuthError, TokenError};
use crate::mail::{MailDispatch, render_verification};
use crate::storage::{FieldUpdate, NewSubject, Subject, SubjectStore, SubjectUpdate};
use crate::telemetry::{Counter, DynTelemetry, observe};

/// Tokens returned by a successful sign-in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    /// Short-lived access token.
    pub access_token: String,
    /// Refresh token for minting new access tokens.
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: u64,
}

/// Result of the email-verification exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationOutcome {
    /// The account was disabled and is now enabled.
    Verified,
    /// The account was already enabled; nothing changed.
    AlreadyVerified,
}

/// Caller-facing partial profile update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    /// New sign-in email.
    pub email: FieldUpdate<String>,
    /// New clear-text password. Hashed before it reaches the store.
    pub password: FieldUpdate<String>,
    /// New disabled flag.
    pub disabled: FieldUpdate<bool>,
}

impl ProfileUpdate {
    /// Returns `true` when no field changes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.email.is_unchanged() && self.password.is_unchanged() && self.disabled.is_unchanged()
    }
}

/// Registration, sign-in and token exchanges.
pub struct SessionService {
    subjects: Arc<dyn SubjectStore>,
    mail: Arc<dyn MailDispatch>,
    jwt: Arc<JwtService>,
    hasher: PasswordHasher,
    tokens: TokenSettings,
    mail_settings: MailSettings,
    telemetry: DynTelemetry,
}

impl SessionService {
    /// Creates the service with default token lifetimes and mail settings.
    #[must_use]
    pub fn new(
        subjects: Arc<dyn SubjectStore>,
        mail: Arc<dyn MailDispatch>,
        jwt: Arc<JwtService>,
        hasher: PasswordHasher,
        telemetry: DynTelemetry,
    ) -> Self {
        Self {
            subjects,
            mail,
            jwt,
            hasher,
            tokens: TokenSettings::default(),
            mail_settings: MailSettings::default(),
            telemetry,
        }
    }

    /// Overrides token lifetimes.
    #[must_use]
    pub fn with_token_settings(mut self, tokens: TokenSettings) -> Self {
        self.tokens = tokens;
        self
    }

    /// Overrides verification mail settings.
    #[must_use]
    pub fn with_mail_settings(mut self, mail_settings: MailSettings) -> Self {
        self.mail_settings = mail_settings;
        self
    }

    /// The underlying token service.
    #[must_use]
    pub fn jwt(&self) -> &JwtService {
        &self.jwt
    }

    /// Creates a disabled account and sends its verification mail.
    ///
    /// # Errors
    /// - `Validation` for a malformed email or unusable password.
    /// - `Conflict` when the email is taken.
    /// - Mail dispatch errors unchanged; the account exists at that point
    ///   and [`Self::resend_verification`] recovers.
    #[instrument(skip(self, ctx, password))]
    pub async fn register(&self, ctx: &OperationContext, email: &str, password: &str) -> AuthResult<Subject> {
        let result: AuthResult<_> = async {
            let email = normalize_email(email)?;
            let password_hash = self.hasher.hash(password)?;

            if ctx.run(self.subjects.find_by_email(&email)).await??.is_some() {
                return Err(AuthError::conflict("email is already registered"));
            }
            let subject = ctx
                .run(self.subjects.insert(NewSubject {
                    email,
                    password_hash,
                    disabled: true,
                }))
                .await??;
            tracing::info!(subject_id = %subject.id, "subject registered");

            self.send_verification(ctx, &subject).await?;
            Ok(subject)
        }
        .await;
        observe(self.telemetry.as_ref(), "register", result)
    }

    /// Exchanges credentials for an access and refresh token.
    ///
    /// # Errors
    /// `Unauthorized` for an unknown email, a wrong password or a disabled
    /// account alike.
    #[instrument(skip(self, ctx, password))]
    pub async fn login(&self, ctx: &OperationContext, email: &str, password: &str) -> AuthResult<TokenPair> {
        let result: AuthResult<_> = async {
            let Ok(email) = normalize_email(email) else {
                self.hasher.verify_absent(password);
                return Err(AuthError::Unauthorized);
            };
            let Some(subject) = ctx.run(self.subjects.find_by_email(&email)).await?? else {
                tracing::debug!("login for unknown email");
                self.hasher.verify_absent(password);
                return Err(AuthError::Unauthorized);
            };

            let matches = self
                .hasher
                .verify(password, &subject.password_hash)
                .map_err(|e| AuthError::internal(format!("stored password hash unusable: {e}")))?;
            if !matches {
                tracing::debug!(subject_id = %subject.id, "login with wrong password");
                return Err(AuthError::Unauthorized);
            }
            if subject.disabled {
                tracing::debug!(subject_id = %subject.id, "login for disabled subject");
                return Err(AuthError::Unauthorized);
            }

            let sub = subject.id.to_string();
            let access = self.issue(&sub, Some(&subject.email), TokenType::Access)?;
            let refresh = self.issue(&sub, Some(&subject.email), TokenType::Refresh)?;
            Ok(TokenPair {
                access_token: access.token,
                refresh_token: refresh.token,
                expires_in: self.tokens.access_token_lifetime.as_secs(),
            })
        }
        .await;
        observe(self.telemetry.as_ref(), "login", result)
    }

    /// Exchanges a refresh token for a new access token.
    ///
    /// The refresh token itself stays valid until it expires.
    ///
    /// # Errors
    /// `Token(WrongType)` unless the token is a refresh token with a
    /// non-empty `jti`; other `Token` errors from verification.
    #[instrument(skip(self, ctx, token))]
    pub async fn refresh(&self, ctx: &OperationContext, token: &str) -> AuthResult<IssuedToken> {
        let result: AuthResult<_> = async {
            ctx.check()?;
            let claims = self.verify(token)?;
            if !claims.is_refresh() {
                return Err(self.reject(TokenError::WrongType {
                    expected: TokenType::Refresh.as_str(),
                }));
            }
            self.issue(&claims.sub, claims.email.as_deref(), TokenType::Access)
        }
        .await;
        observe(self.telemetry.as_ref(), "refresh", result)
    }

    /// Re-sends the verification mail for a disabled account.
    ///
    /// Unknown and already-enabled accounts succeed without sending.
    #[instrument(skip(self, ctx))]
    pub async fn resend_verification(&self, ctx: &OperationContext, email: &str) -> AuthResult<()> {
        let result: AuthResult<_> = async {
            let email = normalize_email(email)?;
            match ctx.run(self.subjects.find_by_email(&email)).await?? {
                Some(subject) if subject.disabled => self.send_verification(ctx, &subject).await,
                Some(_) => {
                    tracing::debug!("verification resend for enabled subject");
                    Ok(())
                }
                None => {
                    tracing::debug!("verification resend for unknown email");
                    Ok(())
                }
            }
        }
        .await;
        observe(self.telemetry.as_ref(), "resend_verification", result)
    }

    /// Enables the account named by an email-verification token.
    ///
    /// # Errors
    /// - `Token` errors from verification, `Token(WrongType)` for other types.
    /// - `NotFound` when the subject does not exist.
    /// - `Unauthorized` when the token's email no longer matches the account.
    #[instrument(skip(self, ctx, token))]
    pub async fn verify_email(&self, ctx: &OperationContext, token: &str) -> AuthResult<VerificationOutcome> {
        let result: AuthResult<_> = async {
            ctx.check()?;
            let claims = self.verify(token)?;
            if claims.token_type != TokenType::EmailVerification {
                return Err(self.reject(TokenError::WrongType {
                    expected: TokenType::EmailVerification.as_str(),
                }));
            }

            let id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::not_found("subject"))?;
            let subject = ctx
                .run(self.subjects.find_by_id(&id))
                .await??
                .ok_or_else(|| AuthError::not_found("subject"))?;

            if claims.email.as_deref() != Some(subject.email.as_str()) {
                tracing::debug!(subject_id = %id, "verification token for a previous email");
                return Err(AuthError::Unauthorized);
            }
            if !subject.disabled {
                return Ok(VerificationOutcome::AlreadyVerified);
            }

            let update = SubjectUpdate {
                disabled: FieldUpdate::SetTo(false),
                ..SubjectUpdate::default()
            };
            ctx.run(self.subjects.update_by_id(&id, update)).await??;
            tracing::info!(subject_id = %id, "email verified");
            Ok(VerificationOutcome::Verified)
        }
        .await;
        observe(self.telemetry.as_ref(), "verify_email", result)
    }

    /// Applies a partial profile update.
    ///
    /// # Errors
    /// - `Validation` when nothing changes or a new value is malformed.
    /// - `NotFound` / `Conflict` from the store.
    #[instrument(skip(self, ctx, update))]
    pub async fn update_subject(
        &self,
        ctx: &OperationContext,
        id: &Uuid,
        update: ProfileUpdate,
    ) -> AuthResult<Subject> {
        let result: AuthResult<_> = async {
            if update.is_empty() {
                return Err(AuthError::validation("update changes no fields"));
            }
            let stored = SubjectUpdate {
                email: update.email.try_map(|email| normalize_email(&email))?,
                password_hash: update.password.try_map(|password| self.hasher.hash(&password))?,
                disabled: update.disabled,
            };
            let subject = ctx.run(self.subjects.update_by_id(id, stored)).await??;
            tracing::info!(subject_id = %id, "subject updated");
            Ok(subject)
        }
        .await;
        observe(self.telemetry.as_ref(), "update_subject", result)
    }

    async fn send_verification(&self, ctx: &OperationContext, subject: &Subject) -> AuthResult<()> {
        let issued = self.issue(
            &subject.id.to_string(),
            Some(&subject.email),
            TokenType::EmailVerification,
        )?;
        let message = render_verification(&self.mail_settings, &subject.email, &issued.token);
        ctx.run(self.mail.enqueue(&message)).await??;
        tracing::debug!(subject_id = %subject.id, "verification mail queued");
        Ok(())
    }

    fn issue(&self, subject: &str, email: Option<&str>, token_type: TokenType) -> AuthResult<IssuedToken> {
        let lifetime = match token_type {
            TokenType::Access => self.tokens.access_token_lifetime,
            TokenType::Refresh => self.tokens.refresh_token_lifetime,
            TokenType::EmailVerification => self.tokens.email_verification_lifetime,
        };
        let issued = self.jwt.issue(subject, email, token_type, lifetime)?;
        self.telemetry.increment(Counter::TokenIssued, token_type.as_str());
        Ok(issued)
    }

    fn verify(&self, token: &str) -> AuthResult<TokenClaims> {
        self.jwt.verify(token).map_err(|e| self.reject(e))
    }

    fn reject(&self, error: TokenError) -> AuthError {
        self.telemetry.increment(Counter::TokenRejected, error.code());
        AuthError::Token(error)
    }
}

/// Trims and lowercases an email address, rejecting obviously bad input.
fn normalize_email(email: &str) -> AuthResult<String> {
    let email = email.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if !valid {
        return Err(AuthError::validation("invalid email address"));
    }
    Ok(email)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use time::OffsetDateTime;

    use super::*;
    use crate::authz::PermissionDocument;
    use crate::mail::RenderedMessage;
    use crate::testutil::RecordingTelemetry;
    use crate::token::keys::{KeyRing, SigningKeyPair};

    #[derive(Default)]
    struct Subjects {
        rows: Mutex<Vec<Subject>>,
    }

    #[async_trait]
    impl SubjectStore for Subjects {
        async fn load_permission_document(&self, _subject_id: &str) -> AuthResult<PermissionDocument> {
            Ok(PermissionDocument::new())
        }

        async fn find_by_id(&self, id: &Uuid) -> AuthResult<Option<Subject>> {
            Ok(self.rows.lock().unwrap().iter().find(|s| &s.id == id).cloned())
        }

        async fn find_by_email(&self, email: &str) -> AuthResult<Option<Subject>> {
            Ok(self.rows.lock().unwrap().iter().find(|s| s.email == email).cloned())
        }

        async fn insert(&self, new: NewSubject) -> AuthResult<Subject> {
            let subject = Subject {
                id: Uuid::new_v4(),
                email: new.email,
                password_hash: new.password_hash,
                disabled: new.disabled,
                created_at: OffsetDateTime::now_utc(),
            };
            self.rows.lock().unwrap().push(subject.clone());
            Ok(subject)
        }

        async fn update_by_id(&self, id: &Uuid, update: SubjectUpdate) -> AuthResult<Subject> {
            let mut rows = self.rows.lock().unwrap();
            let subject = rows
                .iter_mut()
                .find(|s| &s.id == id)
                .ok_or_else(|| AuthError::not_found("subject"))?;
            update.apply(subject);
            Ok(subject.clone())
        }

        async fn ping(&self) -> AuthResult<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct Outbox {
        sent: Mutex<Vec<RenderedMessage>>,
        broken: bool,
    }

    impl Outbox {
        fn last_token(&self) -> String {
            let sent = self.sent.lock().unwrap();
            let body = &sent.last().unwrap().body;
            let start = body.find("token=").unwrap() + "token=".len();
            body[start..].split_whitespace().next().unwrap().to_string()
        }
    }

    #[async_trait]
    impl MailDispatch for Outbox {
        async fn enqueue(&self, message: &RenderedMessage) -> AuthResult<()> {
            if self.broken {
                return Err(AuthError::dependency("mail queue unavailable"));
            }
            self.sent.lock().unwrap().push(message.clone());
            Ok(())
        }
    }

    struct Fixture {
        service: SessionService,
        subjects: Arc<Subjects>,
        outbox: Arc<Outbox>,
        telemetry: Arc<RecordingTelemetry>,
    }

    fn fixture_with(outbox: Outbox) -> Fixture {
        let subjects = Arc::new(Subjects::default());
        let outbox = Arc::new(outbox);
        let telemetry = Arc::new(RecordingTelemetry::default());
        let settings = TokenSettings::default();
        let jwt = Arc::new(JwtService::from_settings(
            &settings,
            KeyRing::new(SigningKeyPair::generate_ec().unwrap()),
        ));
        let service = SessionService::new(
            subjects.clone(),
            outbox.clone(),
            jwt,
            PasswordHasher::new(1, 1024).unwrap(),
            telemetry.clone(),
        )
        .with_token_settings(settings);
        Fixture {
            service,
            subjects,
            outbox,
            telemetry,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(Outbox::default())
    }

    async fn registered(f: &Fixture) -> Subject {
        f.service
            .register(&OperationContext::new(), " Ada@Example.com ", "correct horse")
            .await
            .unwrap()
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email(" A@B.io ").unwrap(), "a@b.io");
        for bad in ["", "no-at", "@b.io", "a@", "a@b@c", "a b@c.io"] {
            assert!(normalize_email(bad).is_err(), "{bad:?} accepted");
        }
    }

    #[tokio::test]
    async fn test_register_creates_disabled_subject_and_sends_mail() {
        let f = fixture();
        let subject = registered(&f).await;
        assert!(subject.disabled);
        assert_eq!(subject.email, "ada@example.com");
        assert!(subject.password_hash.starts_with("$argon2id$"));

        let sent = f.outbox.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "ada@example.com");
        assert_eq!(f.telemetry.count_labeled(Counter::TokenIssued, "email_verification"), 1);
    }

    #[tokio::test]
    async fn test_register_duplicate_email() {
        let f = fixture();
        registered(&f).await;
        let result = f
            .service
            .register(&OperationContext::new(), "ada@example.com", "other")
            .await;
        assert!(matches!(result, Err(AuthError::Conflict { .. })));
    }

    #[tokio::test]
    async fn test_register_surfaces_mail_failure() {
        let f = fixture_with(Outbox {
            broken: true,
            ..Outbox::default()
        });
        let result = f
            .service
            .register(&OperationContext::new(), "ada@example.com", "pw")
            .await;
        assert!(matches!(result, Err(AuthError::Dependency { .. })));
        assert_eq!(f.subjects.rows.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_login_requires_verified_account() {
        let f = fixture();
        let ctx = OperationContext::new();
        registered(&f).await;

        let result = f.service.login(&ctx, "ada@example.com", "correct horse").await;
        assert!(matches!(result, Err(AuthError::Unauthorized)));

        let token = f.outbox.last_token();
        assert_eq!(
            f.service.verify_email(&ctx, &token).await.unwrap(),
            VerificationOutcome::Verified
        );

        let pair = f
            .service
            .login(&ctx, "ADA@example.com", "correct horse")
            .await
            .unwrap();
        assert_eq!(pair.expires_in, 900);
        let claims = f.service.jwt().verify(&pair.access_token).unwrap();
        assert_eq!(claims.token_type, TokenType::Access);
    }

    #[tokio::test]
    async fn test_login_failures_are_indistinguishable() {
        let f = fixture();
        let ctx = OperationContext::new();
        registered(&f).await;
        f.subjects.rows.lock().unwrap()[0].disabled = false;

        for (email, password) in [
            ("nobody@example.com", "correct horse"),
            ("ada@example.com", "wrong"),
            ("not an email", "x"),
        ] {
            let err = f.service.login(&ctx, email, password).await.unwrap_err();
            assert_eq!(err.to_string(), AuthError::Unauthorized.to_string());
        }
    }

    #[tokio::test]
    async fn test_unknown_email_spends_hash_work() {
        let f = fixture();
        let ctx = OperationContext::new();
        assert!(!f.service.hasher.has_decoy());
        let err = f.service.login(&ctx, "nobody@example.com", "x").await.unwrap_err();
        assert!(matches!(err, AuthError::Unauthorized));
        assert!(f.service.hasher.has_decoy());
    }

    #[tokio::test]
    async fn test_refresh_exchange() {
        let f = fixture();
        let ctx = OperationContext::new();
        registered(&f).await;
        f.subjects.rows.lock().unwrap()[0].disabled = false;
        let pair = f.service.login(&ctx, "ada@example.com", "correct horse").await.unwrap();

        let access = f.service.refresh(&ctx, &pair.refresh_token).await.unwrap();
        assert_eq!(access.claims.token_type, TokenType::Access);
        assert_eq!(access.claims.email.as_deref(), Some("ada@example.com"));

        let err = f.service.refresh(&ctx, &pair.access_token).await.unwrap_err();
        assert!(matches!(
            err,
            AuthError::Token(TokenError::WrongType { expected: "refresh" })
        ));
        assert_eq!(f.telemetry.count_labeled(Counter::TokenRejected, "wrong_type"), 1);
    }

    #[tokio::test]
    async fn test_refresh_type_without_jti_rejected() {
        let f = fixture();
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let token = f
            .service
            .jwt()
            .sign(&serde_json::json!({
                "sub": "s-1",
                "iss": f.service.jwt().issuer(),
                "aud": "tessera",
                "token_type": "refresh",
                "iat": now,
                "exp": now + 60,
            }))
            .unwrap();
        let err = f.service.refresh(&OperationContext::new(), &token).await.unwrap_err();
        assert!(matches!(err, AuthError::Token(TokenError::WrongType { .. })));
    }

    #[tokio::test]
    async fn test_verify_email_is_idempotent() {
        let f = fixture();
        let ctx = OperationContext::new();
        registered(&f).await;
        let token = f.outbox.last_token();

        assert_eq!(
            f.service.verify_email(&ctx, &token).await.unwrap(),
            VerificationOutcome::Verified
        );
        let before = f.subjects.rows.lock().unwrap()[0].clone();
        assert_eq!(
            f.service.verify_email(&ctx, &token).await.unwrap(),
            VerificationOutcome::AlreadyVerified
        );
        assert_eq!(f.subjects.rows.lock().unwrap()[0], before);
    }

    #[tokio::test]
    async fn test_verify_email_unknown_subject_is_not_found() {
        let f = fixture();
        let issued = f
            .service
            .jwt()
            .issue(
                &Uuid::new_v4().to_string(),
                Some("ghost@example.com"),
                TokenType::EmailVerification,
                Duration::from_secs(60),
            )
            .unwrap();
        let result = f.service.verify_email(&OperationContext::new(), &issued.token).await;
        assert!(matches!(result, Err(AuthError::NotFound { entity: "subject" })));
    }

    #[tokio::test]
    async fn test_verify_email_rejects_other_token_types() {
        let f = fixture();
        let subject = registered(&f).await;
        let issued = f
            .service
            .jwt()
            .issue(
                &subject.id.to_string(),
                Some(&subject.email),
                TokenType::Access,
                Duration::from_secs(60),
            )
            .unwrap();
        let result = f.service.verify_email(&OperationContext::new(), &issued.token).await;
        assert!(matches!(result, Err(AuthError::Token(TokenError::WrongType { .. }))));
    }

    #[tokio::test]
    async fn test_verify_email_after_email_change() {
        let f = fixture();
        let ctx = OperationContext::new();
        let subject = registered(&f).await;
        let token = f.outbox.last_token();

        f.service
            .update_subject(
                &ctx,
                &subject.id,
                ProfileUpdate {
                    email: FieldUpdate::SetTo("new@example.com".into()),
                    ..ProfileUpdate::default()
                },
            )
            .await
            .unwrap();
        assert!(matches!(
            f.service.verify_email(&ctx, &token).await,
            Err(AuthError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn test_resend_verification() {
        let f = fixture();
        let ctx = OperationContext::new();
        registered(&f).await;

        f.service.resend_verification(&ctx, "ada@example.com").await.unwrap();
        f.service.resend_verification(&ctx, "nobody@example.com").await.unwrap();
        assert_eq!(f.outbox.sent.lock().unwrap().len(), 2);

        f.subjects.rows.lock().unwrap()[0].disabled = false;
        f.service.resend_verification(&ctx, "ada@example.com").await.unwrap();
        assert_eq!(f.outbox.sent.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_update_subject() {
        let f = fixture();
        let ctx = OperationContext::new();
        let subject = registered(&f).await;

        let empty = f.service.update_subject(&ctx, &subject.id, ProfileUpdate::default()).await;
        assert!(matches!(empty, Err(AuthError::Validation { .. })));

        let updated = f
            .service
            .update_subject(
                &ctx,
                &subject.id,
                ProfileUpdate {
                    password: FieldUpdate::SetTo("new password".into()),
                    disabled: FieldUpdate::SetTo(false),
                    ..ProfileUpdate::default()
                },
            )
            .await
            .unwrap();
        assert_ne!(updated.password_hash, subject.password_hash);
        assert!(!updated.disabled);
        f.service
            .login(&ctx, "ada@example.com", "new password")
            .await
            .unwrap();

        let missing = f
            .service
            .update_subject(
                &ctx,
                &Uuid::new_v4(),
                ProfileUpdate {
                    disabled: FieldUpdate::SetTo(true),
                    ..ProfileUpdate::default()
                },
            )
            .await;
        assert!(matches!(missing, Err(AuthError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_cancelled_context() {
        let f = fixture();
        let ctx = OperationContext::new();
        ctx.cancel();
        let result = f.service.refresh(&ctx, "a.b.c").await;
        assert!(matches!(result, Err(AuthError::Cancelled)));
    }
}
