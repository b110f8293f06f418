//! Session tokens.
//!
//! - [`claims`]: token types and claim sets
//! - [`keys`]: signing key pairs, `kid` derivation and the key ring
//! - [`jwt`]: signing and verification
//! - [`service`]: registration, sign-in and token exchanges

pub mod claims;
pub mod jwt;
pub mod keys;
pub mod service;

pub use claims::{TokenClaims, TokenType};
pub use jwt::{IssuedToken, JwtService, MIN_LIFETIME, verify_with_key};
pub use keys::{Jwk, Jwks, KeyRing, SigningAlgorithm, SigningKeyPair, VerificationKey, derive_kid};
pub use service::{ProfileUpdate, SessionService, TokenPair, VerificationOutcome};
