//! Error types for the identity and access-control core.
//!
//! [`AuthError`] is the error every public operation returns. Token failures
//! are grouped under [`TokenError`] so callers can tell an expired session
//! from a forged one without string matching.

use std::fmt;

/// Errors that can occur while authenticating or authorizing a request.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Malformed or missing input. Never retried.
    #[error("Validation error: {message}")]
    Validation {
        /// Description of what is wrong with the input.
        message: String,
    },

    /// The subject identifier on the request is empty or unusable.
    #[error("Invalid subject")]
    InvalidSubject,

    /// The requested entity does not exist.
    #[error("{entity} not found")]
    NotFound {
        /// Kind of entity that was looked up ("subject", "resource", ...).
        entity: &'static str,
    },

    /// An action/resource pair resolved to more than one catalog entry.
    #[error("Ambiguous resource: {matches} resources match")]
    AmbiguousResource {
        /// Number of distinct matches.
        matches: usize,
    },

    /// Fail-closed access decision. Deliberately carries no detail about
    /// whether a rule denied the request or no rule matched it.
    #[error("Unauthorized")]
    Unauthorized,

    /// Uniqueness violation reported by the authoritative store.
    #[error("Conflict: {message}")]
    Conflict {
        /// Description of the conflicting value.
        message: String,
    },

    /// A presented token failed verification.
    #[error(transparent)]
    Token(#[from] TokenError),

    /// A collaborator (cache or authoritative store) failed in transport.
    #[error("Dependency error: {message}")]
    Dependency {
        /// Description of the failure.
        message: String,
    },

    /// An unexpected internal failure, including rule-engine errors.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the failure.
        message: String,
    },

    /// The caller cancelled the operation.
    #[error("Operation cancelled")]
    Cancelled,

    /// The caller's deadline elapsed before the operation completed.
    #[error("Deadline exceeded")]
    DeadlineExceeded,
}

impl AuthError {
    /// Creates a new `Validation` error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates a new `NotFound` error.
    #[must_use]
    pub fn not_found(entity: &'static str) -> Self {
        Self::NotFound { entity }
    }

    /// Creates a new `Conflict` error.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Creates a new `Dependency` error.
    #[must_use]
    pub fn dependency(message: impl Into<String>) -> Self {
        Self::Dependency {
            message: message.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if the caller is at fault (4xx category).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. }
                | Self::InvalidSubject
                | Self::NotFound { .. }
                | Self::AmbiguousResource { .. }
                | Self::Unauthorized
                | Self::Conflict { .. }
                | Self::Token(_)
        )
    }

    /// Returns `true` if this is a server-side failure (5xx category).
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        matches!(self, Self::Dependency { .. } | Self::Internal { .. })
    }

    /// Returns `true` if this is a token-related error.
    #[must_use]
    pub fn is_token_error(&self) -> bool {
        matches!(self, Self::Token(_))
    }

    /// Returns `true` if the operation was aborted by the caller.
    #[must_use]
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled | Self::DeadlineExceeded)
    }

    /// Returns the error category for logging/monitoring purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation { .. } | Self::InvalidSubject => ErrorCategory::Validation,
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::AmbiguousResource { .. } | Self::Conflict { .. } => ErrorCategory::Conflict,
            Self::Unauthorized => ErrorCategory::Authorization,
            Self::Token(_) => ErrorCategory::Token,
            Self::Dependency { .. } => ErrorCategory::Dependency,
            Self::Internal { .. } => ErrorCategory::Internal,
            Self::Cancelled | Self::DeadlineExceeded => ErrorCategory::Cancelled,
        }
    }
}

/// Categories of errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Malformed or missing input.
    Validation,
    /// Missing subject or resource.
    NotFound,
    /// Fail-closed access decisions.
    Authorization,
    /// Uniqueness or ambiguity violations.
    Conflict,
    /// Token verification failures.
    Token,
    /// Cache or store transport failures.
    Dependency,
    /// Internal failures.
    Internal,
    /// Caller cancellation or deadline.
    Cancelled,
}

impl ErrorCategory {
    /// Returns the category name used as a metrics label.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::NotFound => "not_found",
            Self::Authorization => "authorization",
            Self::Conflict => "conflict",
            Self::Token => "token",
            Self::Dependency => "dependency",
            Self::Internal => "internal",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reasons a presented token is rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    /// The token is not a well-formed signed claims set.
    #[error("Malformed token: {message}")]
    Malformed {
        /// Description of the structural problem.
        message: String,
    },

    /// The signature does not match the selected key.
    #[error("Invalid token signature")]
    SignatureInvalid,

    /// `exp` is in the past.
    #[error("Token expired")]
    Expired,

    /// `iat` is in the future.
    #[error("Token used before issued")]
    UsedBeforeIssued,

    /// No key can verify the token (missing or unknown `kid`, bad key).
    #[error("Token unverifiable: {message}")]
    Unverifiable {
        /// Description of why no key applies.
        message: String,
    },

    /// The token verified but is of the wrong purpose for this exchange.
    #[error("Wrong token type: expected {expected}")]
    WrongType {
        /// The type the exchange requires.
        expected: &'static str,
    },
}

impl TokenError {
    /// Creates a new `Malformed` error.
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }

    /// Creates a new `Unverifiable` error.
    #[must_use]
    pub fn unverifiable(message: impl Into<String>) -> Self {
        Self::Unverifiable {
            message: message.into(),
        }
    }

    /// Short machine-readable code for the failure mode.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Malformed { .. } => "malformed",
            Self::SignatureInvalid => "signature_invalid",
            Self::Expired => "expired",
            Self::UsedBeforeIssued => "used_before_issued",
            Self::Unverifiable { .. } => "unverifiable",
            Self::WrongType { .. } => "wrong_type",
        }
    }
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::ImmatureSignature => Self::UsedBeforeIssued,
            ErrorKind::InvalidSignature => Self::SignatureInvalid,
            ErrorKind::InvalidRsaKey(_)
            | ErrorKind::InvalidEcdsaKey
            | ErrorKind::InvalidKeyFormat
            | ErrorKind::InvalidAlgorithm
            | ErrorKind::MissingAlgorithm => Self::unverifiable(err.to_string()),
            _ => Self::malformed(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            AuthError::validation("email is required").to_string(),
            "Validation error: email is required"
        );
        assert_eq!(AuthError::not_found("resource").to_string(), "resource not found");
        assert_eq!(AuthError::Unauthorized.to_string(), "Unauthorized");
        assert_eq!(
            AuthError::from(TokenError::Expired).to_string(),
            "Token expired"
        );
    }

    #[test]
    fn test_error_predicates() {
        let err = AuthError::validation("bad");
        assert!(err.is_client_error());
        assert!(!err.is_server_error());

        let err = AuthError::dependency("redis down");
        assert!(!err.is_client_error());
        assert!(err.is_server_error());

        let err = AuthError::from(TokenError::SignatureInvalid);
        assert!(err.is_token_error());
        assert!(err.is_client_error());

        assert!(AuthError::Cancelled.is_cancellation());
        assert!(AuthError::DeadlineExceeded.is_cancellation());
    }

    #[test]
    fn test_error_category() {
        assert_eq!(AuthError::InvalidSubject.category(), ErrorCategory::Validation);
        assert_eq!(
            AuthError::AmbiguousResource { matches: 2 }.category(),
            ErrorCategory::Conflict
        );
        assert_eq!(AuthError::Unauthorized.category(), ErrorCategory::Authorization);
        assert_eq!(
            AuthError::internal("engine").category(),
            ErrorCategory::Internal
        );
        assert_eq!(ErrorCategory::NotFound.to_string(), "not_found");
    }

    #[test]
    fn test_token_error_codes() {
        assert_eq!(TokenError::malformed("x").code(), "malformed");
        assert_eq!(TokenError::UsedBeforeIssued.code(), "used_before_issued");
        assert_eq!(
            TokenError::WrongType { expected: "refresh" }.to_string(),
            "Wrong token type: expected refresh"
        );
    }
}
