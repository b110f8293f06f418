//! Signing key material.
//!
//! Every key is identified by a `kid` derived from its public half: the
//! first 16 bytes of SHA-256 over the RSA modulus or the EC x-coordinate,
//! hex encoded. The same public key therefore always gets the same `kid`,
//! whether it was generated here or loaded from PEM, and a [`KeyRing`] can
//! keep retired keys around for verification while signing with the
//! current one.
//!
//! Supported algorithms:
//!
//! - **RS256**: RSA with SHA-256
//! - **RS384**: RSA with SHA-384
//! - **ES384**: ECDSA with the P-384 curve

use std::fmt;
use std::path::Path;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use elliptic_curve::sec1::ToEncodedPoint;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey};
use p384::{PublicKey as EcPublicKey, SecretKey as EcSecretKey};
use rand::rngs::OsRng;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::AuthResult;
use crate::config::SigningSettings;
use crate::error::AuthError;

const RSA_BITS: usize = 2048;
const KID_BYTES: usize = 16;

/// Supported signing algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SigningAlgorithm {
    /// RSA with SHA-256.
    RS256,
    /// RSA with SHA-384.
    RS384,
    /// ECDSA with P-384.
    ES384,
}

impl SigningAlgorithm {
    /// Converts to the `jsonwebtoken` algorithm.
    #[must_use]
    pub fn to_jwt_algorithm(self) -> Algorithm {
        match self {
            Self::RS256 => Algorithm::RS256,
            Self::RS384 => Algorithm::RS384,
            Self::ES384 => Algorithm::ES384,
        }
    }

    /// Name as used in JWK and JWT headers.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RS256 => "RS256",
            Self::RS384 => "RS384",
            Self::ES384 => "ES384",
        }
    }

    /// Returns `true` for RSA-based algorithms.
    #[must_use]
    pub fn is_rsa(&self) -> bool {
        matches!(self, Self::RS256 | Self::RS384)
    }

    /// Returns `true` for EC-based algorithms.
    #[must_use]
    pub fn is_ec(&self) -> bool {
        matches!(self, Self::ES384)
    }
}

impl fmt::Display for SigningAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Public key components kept for JWK export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublicKeyData {
    /// RSA modulus and exponent, big-endian.
    Rsa { n: Vec<u8>, e: Vec<u8> },
    /// Uncompressed EC point coordinates.
    Ec { x: Vec<u8>, y: Vec<u8> },
}

/// Derives the key identifier from public key bytes.
#[must_use]
pub fn derive_kid(public_bytes: &[u8]) -> String {
    let digest = Sha256::digest(public_bytes);
    hex::encode(&digest[..KID_BYTES])
}

/// The public half of a signing key.
#[derive(Clone)]
pub struct VerificationKey {
    kid: String,
    algorithm: SigningAlgorithm,
    decoding_key: DecodingKey,
    public: PublicKeyData,
    public_pem: String,
}

impl fmt::Debug for VerificationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerificationKey")
            .field("kid", &self.kid)
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

impl VerificationKey {
    /// Loads an SPKI public key PEM.
    ///
    /// # Errors
    /// `Validation` when the PEM does not hold a key for `algorithm`.
    pub fn from_public_pem(algorithm: SigningAlgorithm, pem: &str) -> AuthResult<Self> {
        if algorithm.is_rsa() {
            let public = RsaPublicKey::from_public_key_pem(pem)
                .map_err(|e| AuthError::validation(format!("invalid RSA public key: {e}")))?;
            rsa_verification_key(algorithm, &public)
        } else {
            let public = EcPublicKey::from_public_key_pem(pem)
                .map_err(|e| AuthError::validation(format!("invalid EC public key: {e}")))?;
            ec_verification_key(&public)
        }
    }

    /// Key identifier.
    #[must_use]
    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// Algorithm the key verifies.
    #[must_use]
    pub fn algorithm(&self) -> SigningAlgorithm {
        self.algorithm
    }

    /// SPKI PEM of the key, suitable for [`Self::from_public_pem`].
    #[must_use]
    pub fn public_pem(&self) -> &str {
        &self.public_pem
    }

    /// Public key components.
    #[must_use]
    pub fn public_data(&self) -> &PublicKeyData {
        &self.public
    }

    pub(crate) fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }

    /// Exports the key as a JWK.
    #[must_use]
    pub fn to_jwk(&self) -> Jwk {
        let (kty, crv, n, e, x, y) = match &self.public {
            PublicKeyData::Rsa { n, e } => ("RSA", None, Some(n), Some(e), None, None),
            PublicKeyData::Ec { x, y } => ("EC", Some("P-384"), None, None, Some(x), Some(y)),
        };
        let b64 = |bytes: Option<&Vec<u8>>| bytes.map(|b| URL_SAFE_NO_PAD.encode(b));
        Jwk {
            kty: kty.to_string(),
            kid: self.kid.clone(),
            use_: "sig".to_string(),
            alg: self.algorithm.as_str().to_string(),
            n: b64(n),
            e: b64(e),
            crv: crv.map(str::to_string),
            x: b64(x),
            y: b64(y),
        }
    }
}

fn rsa_verification_key(
    algorithm: SigningAlgorithm,
    public: &RsaPublicKey,
) -> AuthResult<VerificationKey> {
    let n = public.n().to_bytes_be();
    let e = public.e().to_bytes_be();
    let decoding_key =
        DecodingKey::from_rsa_components(&URL_SAFE_NO_PAD.encode(&n), &URL_SAFE_NO_PAD.encode(&e))
            .map_err(|e| AuthError::internal(format!("RSA decoding key: {e}")))?;
    let public_pem = public
        .to_public_key_pem(LineEnding::LF)
        .map_err(|e| AuthError::internal(format!("RSA public key export: {e}")))?;

    Ok(VerificationKey {
        kid: derive_kid(&n),
        algorithm,
        decoding_key,
        public: PublicKeyData::Rsa { n, e },
        public_pem,
    })
}

fn ec_verification_key(public: &EcPublicKey) -> AuthResult<VerificationKey> {
    let point = public.to_encoded_point(false);
    let x = point
        .x()
        .ok_or_else(|| AuthError::internal("EC public key is missing the x coordinate"))?;
    let y = point
        .y()
        .ok_or_else(|| AuthError::internal("EC public key is missing the y coordinate"))?;

    let decoding_key = DecodingKey::from_ec_components(
        &URL_SAFE_NO_PAD.encode(&x[..]),
        &URL_SAFE_NO_PAD.encode(&y[..]),
    )
    .map_err(|e| AuthError::internal(format!("EC decoding key: {e}")))?;
    let public_pem = public
        .to_public_key_pem(LineEnding::LF)
        .map_err(|e| AuthError::internal(format!("EC public key export: {e}")))?;

    Ok(VerificationKey {
        kid: derive_kid(&x[..]),
        algorithm: SigningAlgorithm::ES384,
        decoding_key,
        public: PublicKeyData::Ec {
            x: x.to_vec(),
            y: y.to_vec(),
        },
        public_pem,
    })
}

/// A private signing key with its public half.
pub struct SigningKeyPair {
    encoding_key: EncodingKey,
    verification: VerificationKey,
}

impl fmt::Debug for SigningKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKeyPair")
            .field("kid", &self.verification.kid)
            .field("algorithm", &self.verification.algorithm)
            .finish_non_exhaustive()
    }
}

impl SigningKeyPair {
    /// Generates a 2048-bit RSA key pair.
    ///
    /// # Errors
    /// `Validation` when `algorithm` is not RSA-based.
    pub fn generate_rsa(algorithm: SigningAlgorithm) -> AuthResult<Self> {
        if !algorithm.is_rsa() {
            return Err(AuthError::validation(format!(
                "algorithm {algorithm} is not RSA-based"
            )));
        }
        let private = RsaPrivateKey::new(&mut OsRng, RSA_BITS)
            .map_err(|e| AuthError::internal(format!("RSA key generation failed: {e}")))?;
        Self::from_rsa(algorithm, &private)
    }

    /// Generates a P-384 key pair.
    pub fn generate_ec() -> AuthResult<Self> {
        Self::from_ec(&EcSecretKey::random(&mut OsRng))
    }

    /// Generates a key pair for `algorithm`.
    pub fn generate(algorithm: SigningAlgorithm) -> AuthResult<Self> {
        if algorithm.is_rsa() {
            Self::generate_rsa(algorithm)
        } else {
            Self::generate_ec()
        }
    }

    /// Loads a private key PEM.
    ///
    /// RSA keys may be PKCS#8 or PKCS#1; EC keys may be PKCS#8 or SEC1.
    ///
    /// # Errors
    /// `Validation` when the PEM does not hold a key for `algorithm`.
    pub fn from_private_pem(algorithm: SigningAlgorithm, pem: &str) -> AuthResult<Self> {
        if algorithm.is_rsa() {
            let private = RsaPrivateKey::from_pkcs8_pem(pem)
                .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
                .map_err(|e| AuthError::validation(format!("invalid RSA private key: {e}")))?;
            Self::from_rsa(algorithm, &private)
        } else {
            let secret = EcSecretKey::from_pkcs8_pem(pem)
                .or_else(|_| EcSecretKey::from_sec1_pem(pem))
                .map_err(|e| AuthError::validation(format!("invalid EC private key: {e}")))?;
            Self::from_ec(&secret)
        }
    }

    fn from_rsa(algorithm: SigningAlgorithm, private: &RsaPrivateKey) -> AuthResult<Self> {
        let private_pem = private
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| AuthError::internal(format!("RSA private key export: {e}")))?;
        let encoding_key = EncodingKey::from_rsa_pem(private_pem.as_bytes())
            .map_err(|e| AuthError::internal(format!("RSA encoding key: {e}")))?;
        let verification = rsa_verification_key(algorithm, &private.to_public_key())?;
        Ok(Self {
            encoding_key,
            verification,
        })
    }

    fn from_ec(secret: &EcSecretKey) -> AuthResult<Self> {
        // jsonwebtoken only accepts PKCS#8 for EC keys.
        let private_pem = secret
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| AuthError::internal(format!("EC private key export: {e}")))?;
        let encoding_key = EncodingKey::from_ec_pem(private_pem.as_bytes())
            .map_err(|e| AuthError::internal(format!("EC encoding key: {e}")))?;
        let verification = ec_verification_key(&secret.public_key())?;
        Ok(Self {
            encoding_key,
            verification,
        })
    }

    /// Key identifier.
    #[must_use]
    pub fn kid(&self) -> &str {
        &self.verification.kid
    }

    /// Signing algorithm.
    #[must_use]
    pub fn algorithm(&self) -> SigningAlgorithm {
        self.verification.algorithm
    }

    /// The public half.
    #[must_use]
    pub fn verification_key(&self) -> &VerificationKey {
        &self.verification
    }

    pub(crate) fn encoding_key(&self) -> &EncodingKey {
        &self.encoding_key
    }
}

/// JSON Web Key Set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Jwks {
    /// The keys in this set.
    pub keys: Vec<Jwk>,
}

/// JSON Web Key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Jwk {
    /// Key type ("RSA" or "EC").
    pub kty: String,

    /// Key ID.
    pub kid: String,

    /// Key use ("sig" for signing).
    #[serde(rename = "use")]
    pub use_: String,

    /// Algorithm.
    pub alg: String,

    /// RSA modulus (base64url encoded).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,

    /// RSA exponent (base64url encoded).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,

    /// EC curve name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crv: Option<String>,

    /// EC x coordinate (base64url encoded).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,

    /// EC y coordinate (base64url encoded).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,
}

/// The current signing key plus retired public keys still accepted for
/// verification.
#[derive(Debug)]
pub struct KeyRing {
    current: SigningKeyPair,
    previous: Vec<VerificationKey>,
}

impl KeyRing {
    /// Creates a ring holding only `current`.
    #[must_use]
    pub fn new(current: SigningKeyPair) -> Self {
        Self {
            current,
            previous: Vec::new(),
        }
    }

    /// Adds a retired key. Keys whose `kid` is already present are ignored.
    #[must_use]
    pub fn with_previous(mut self, key: VerificationKey) -> Self {
        if self.find(key.kid()).is_none() {
            self.previous.push(key);
        }
        self
    }

    /// Builds the ring from configuration.
    ///
    /// Without a private key path a fresh key pair is generated, so tokens
    /// do not survive a restart.
    ///
    /// # Errors
    /// Fails when a configured key file cannot be read or parsed.
    pub fn from_settings(settings: &SigningSettings) -> AuthResult<Self> {
        let current = match &settings.private_key_path {
            Some(path) => SigningKeyPair::from_private_pem(settings.algorithm, &read_pem(path)?)?,
            None => {
                tracing::warn!(
                    algorithm = %settings.algorithm,
                    "no signing key configured, generating an ephemeral key pair"
                );
                SigningKeyPair::generate(settings.algorithm)?
            }
        };
        tracing::info!(kid = current.kid(), algorithm = %current.algorithm(), "signing key loaded");

        let mut ring = Self::new(current);
        for path in &settings.previous_public_keys {
            let key = VerificationKey::from_public_pem(settings.algorithm, &read_pem(path)?)?;
            tracing::debug!(kid = key.kid(), path = %path.display(), "previous key loaded");
            ring = ring.with_previous(key);
        }
        Ok(ring)
    }

    /// The key new tokens are signed with.
    #[must_use]
    pub fn signing_key(&self) -> &SigningKeyPair {
        &self.current
    }

    /// Finds the verification key for `kid`.
    #[must_use]
    pub fn find(&self, kid: &str) -> Option<&VerificationKey> {
        std::iter::once(self.current.verification_key())
            .chain(self.previous.iter())
            .find(|key| key.kid() == kid)
    }

    /// Number of keys accepted for verification.
    #[must_use]
    pub fn len(&self) -> usize {
        1 + self.previous.len()
    }

    /// A ring always holds the current key.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Exports every verification key.
    #[must_use]
    pub fn jwks(&self) -> Jwks {
        Jwks {
            keys: std::iter::once(self.current.verification_key())
                .chain(self.previous.iter())
                .map(VerificationKey::to_jwk)
                .collect(),
        }
    }
}

fn read_pem(path: &Path) -> AuthResult<String> {
    std::fs::read_to_string(path)
        .map_err(|e| AuthError::validation(format!("cannot read key file {}: {e}", path.display())))
}
