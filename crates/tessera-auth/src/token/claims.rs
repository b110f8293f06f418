//! Session token claims.

use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Purpose of a token. Each exchange accepts exactly one type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    /// Short-lived bearer token for API calls.
    Access,
    /// Long-lived token exchanged for new access tokens.
    Refresh,
    /// Single-purpose token proving control of an email address.
    EmailVerification,
}

impl TokenType {
    /// Wire name of the type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
            Self::EmailVerification => "email_verification",
        }
    }

    /// Parses a wire name.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "access" => Some(Self::Access),
            "refresh" => Some(Self::Refresh),
            "email_verification" => Some(Self::EmailVerification),
            _ => None,
        }
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Claims carried by every session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject identifier.
    pub sub: String,

    /// Email address the token was minted for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Issuer.
    pub iss: String,

    /// Audience.
    pub aud: String,

    /// Token ID. Present on refresh tokens only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,

    /// Token purpose.
    pub token_type: TokenType,

    /// Issued at (Unix timestamp).
    pub iat: i64,

    /// Expiration time (Unix timestamp).
    pub exp: i64,
}

impl TokenClaims {
    /// Expiration as a timestamp.
    #[must_use]
    pub fn expires_at(&self) -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(self.exp).unwrap_or(OffsetDateTime::UNIX_EPOCH)
    }

    /// `true` for a refresh token carrying a non-empty `jti`.
    #[must_use]
    pub fn is_refresh(&self) -> bool {
        self.token_type == TokenType::Refresh && self.jti.as_deref().is_some_and(|j| !j.is_empty())
    }
}

/// Claims as they arrive off the wire, before required fields are checked.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct RawClaims {
    pub sub: Option<String>,
    pub email: Option<String>,
    pub iss: Option<String>,
    pub aud: Option<String>,
    pub jti: Option<String>,
    pub token_type: Option<String>,
    pub iat: Option<i64>,
    pub exp: Option<i64>,
}
