//! Token signing and verification.
//!
//! Tokens are compact JWS strings with `{alg, kid}` in the header.
//! Verification runs these steps in order and stops at the first failure:
//!
//! 1. the header must carry a `kid` ([`TokenError::Unverifiable`])
//! 2. the `kid` must name the verification key ([`TokenError::SignatureInvalid`])
//! 3. the signature must verify ([`TokenError::SignatureInvalid`])
//! 4. `exp` must not have passed and `iat` must not be in the future
//!    ([`TokenError::Expired`], [`TokenError::UsedBeforeIssued`])
//! 5. `token_type` and `sub` must be present ([`TokenError::Malformed`])

use std::time::Duration;

use jsonwebtoken::{Header, Validation, decode, decode_header, encode};
use time::OffsetDateTime;
use uuid::Uuid;

use super::claims::{RawClaims, TokenClaims, TokenType};
use super::keys::{KeyRing, VerificationKey};
use crate::AuthResult;
use crate::config::TokenSettings;
use crate::error::{AuthError, TokenError};

/// Smallest lifetime a token may be issued with.
pub const MIN_LIFETIME: Duration = Duration::from_secs(1);

/// A freshly signed token and the claims inside it.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// Compact token string.
    pub token: String,
    /// The signed claims.
    pub claims: TokenClaims,
}

/// Issues and verifies session tokens.
///
/// Thread-safe; share it behind an `Arc`.
#[derive(Debug)]
pub struct JwtService {
    keys: KeyRing,
    issuer: String,
    audience: String,
    leeway: Duration,
}

impl JwtService {
    /// Creates a service signing with the ring's current key.
    #[must_use]
    pub fn new(keys: KeyRing, issuer: impl Into<String>, audience: impl Into<String>) -> Self {
        Self {
            keys,
            issuer: issuer.into(),
            audience: audience.into(),
            leeway: Duration::ZERO,
        }
    }

    /// Creates a service from token settings.
    #[must_use]
    pub fn from_settings(settings: &TokenSettings, keys: KeyRing) -> Self {
        Self::new(keys, settings.issuer.clone(), settings.audience.clone())
            .with_leeway(settings.leeway)
    }

    /// Sets the clock skew tolerated on `exp` and `iat`.
    #[must_use]
    pub fn with_leeway(mut self, leeway: Duration) -> Self {
        self.leeway = leeway;
        self
    }

    /// The issuer claim value.
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// The key ring.
    #[must_use]
    pub fn keys(&self) -> &KeyRing {
        &self.keys
    }

    /// Signs a new token.
    ///
    /// Refresh tokens get a random `jti`; other types carry none.
    ///
    /// # Errors
    /// `Validation` for an empty subject or issuer, or a lifetime under one
    /// second.
    pub fn issue(
        &self,
        subject: &str,
        email: Option<&str>,
        token_type: TokenType,
        lifetime: Duration,
    ) -> AuthResult<IssuedToken> {
        if subject.trim().is_empty() {
            return Err(AuthError::validation("token subject must not be empty"));
        }
        if self.issuer.trim().is_empty() {
            return Err(AuthError::validation("token issuer must not be empty"));
        }
        if lifetime < MIN_LIFETIME {
            return Err(AuthError::validation(format!(
                "token lifetime must be at least {}s",
                MIN_LIFETIME.as_secs()
            )));
        }
        let lifetime_secs = i64::try_from(lifetime.as_secs())
            .map_err(|_| AuthError::validation("token lifetime is too large"))?;

        let now = OffsetDateTime::now_utc().unix_timestamp();
        let claims = TokenClaims {
            sub: subject.to_string(),
            email: email.map(str::to_string),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            jti: (token_type == TokenType::Refresh).then(|| Uuid::new_v4().to_string()),
            token_type,
            iat: now,
            exp: now.saturating_add(lifetime_secs),
        };
        let token = self.sign(&claims)?;
        Ok(IssuedToken { token, claims })
    }

    /// Signs arbitrary claims with the current key.
    pub(crate) fn sign<T: serde::Serialize>(&self, claims: &T) -> AuthResult<String> {
        let key = self.keys.signing_key();
        let mut header = Header::new(key.algorithm().to_jwt_algorithm());
        header.kid = Some(key.kid().to_string());
        encode(&header, claims, key.encoding_key())
            .map_err(|e| AuthError::internal(format!("failed to sign token: {e}")))
    }

    /// Verifies a token against whichever ring key its `kid` names.
    ///
    /// # Errors
    /// A [`TokenError`] describing the first failed check. A `kid` the ring
    /// does not know is [`TokenError::Unverifiable`].
    pub fn verify(&self, token: &str) -> Result<TokenClaims, TokenError> {
        let header = decode_header(token).map_err(|e| TokenError::malformed(e.to_string()))?;
        let kid = header
            .kid
            .ok_or_else(|| TokenError::unverifiable("token header has no key id"))?;
        let key = self
            .keys
            .find(&kid)
            .ok_or_else(|| TokenError::unverifiable(format!("unknown key id {kid}")))?;

        let claims = verify_with_key(token, key, self.leeway)?;
        if claims.iss != self.issuer {
            return Err(TokenError::malformed("unexpected issuer"));
        }
        if claims.aud != self.audience {
            return Err(TokenError::malformed("unexpected audience"));
        }
        Ok(claims)
    }
}

/// Verifies `token` against one specific public key.
///
/// # Errors
/// A [`TokenError`] describing the first failed check.
pub fn verify_with_key(
    token: &str,
    key: &VerificationKey,
    leeway: Duration,
) -> Result<TokenClaims, TokenError> {
    let header = decode_header(token).map_err(|e| TokenError::malformed(e.to_string()))?;
    let kid = header
        .kid
        .ok_or_else(|| TokenError::unverifiable("token header has no key id"))?;
    if kid != key.kid() {
        return Err(TokenError::SignatureInvalid);
    }

    // Time and claim checks are done below so each failure maps to its own kind.
    let mut validation = Validation::new(key.algorithm().to_jwt_algorithm());
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    let raw = decode::<RawClaims>(token, key.decoding_key(), &validation)?.claims;

    let leeway = i64::try_from(leeway.as_secs()).unwrap_or(i64::MAX);
    let now = OffsetDateTime::now_utc().unix_timestamp();
    let exp = raw.exp.ok_or_else(|| TokenError::malformed("missing exp claim"))?;
    if exp.saturating_add(leeway) < now {
        return Err(TokenError::Expired);
    }
    let iat = raw.iat.ok_or_else(|| TokenError::malformed("missing iat claim"))?;
    if iat > now.saturating_add(leeway) {
        return Err(TokenError::UsedBeforeIssued);
    }

    let token_type = raw
        .token_type
        .as_deref()
        .ok_or_else(|| TokenError::malformed("missing token_type claim"))
        .and_then(|t| {
            TokenType::parse(t).ok_or_else(|| TokenError::malformed(format!("unknown token type {t}")))
        })?;
    let sub = raw
        .sub
        .filter(|s| !s.is_empty())
        .ok_or_else(|| TokenError::malformed("missing sub claim"))?;

    Ok(TokenClaims {
        sub,
        email: raw.email,
        iss: raw.iss.unwrap_or_default(),
        aud: raw.aud.unwrap_or_default(),
        jti: raw.jti,
        token_type,
        iat,
        exp,
    })
}
