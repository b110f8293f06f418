//! Configuration for the identity and access-control core.
//!
//! All sections default sensibly so an empty file is a valid configuration
//! for local development.
//!
//! # Example (TOML)
//!
//! ```toml
//! [tokens]
//! issuer = "https://auth.example.com"
//! access_token_lifetime = "15m"
//!
//! [cache]
//! enabled = true
//! query_timeout = "50ms"
//!
//! [cache.redis]
//! enabled = true
//! url = "redis://localhost:6379"
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::crypto::password::{MAX_WORK_FACTOR, MIN_WORK_FACTOR};
use crate::token::MIN_LIFETIME;
use crate::token::keys::SigningAlgorithm;

/// Errors raised while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration sources could not be read or merged.
    #[error("Failed to load configuration: {0}")]
    Load(String),

    /// A value is out of range or inconsistent.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct TesseraConfig {
    /// Token issuance settings.
    pub tokens: TokenSettings,

    /// Signing key material locations.
    pub signing: SigningSettings,

    /// Password hashing parameters.
    pub password: PasswordSettings,

    /// Cache-aside settings.
    pub cache: CacheSettings,

    /// Authorization rule set settings.
    pub authz: AuthzSettings,

    /// Verification mail settings.
    pub mail: MailSettings,

    /// Logging settings.
    pub logging: LoggingSettings,
}

impl TesseraConfig {
    /// Checks value ranges and cross-field consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.tokens.validate()?;
        self.password.validate()?;
        self.cache.validate()?;
        if self.authz.query.trim().is_empty() {
            return Err(ConfigError::Invalid("authz.query must not be empty".into()));
        }
        if !self.mail.verification_url.contains("{token}") {
            return Err(ConfigError::Invalid(
                "mail.verification_url must contain a {token} placeholder".into(),
            ));
        }
        Ok(())
    }
}

/// Token issuance settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TokenSettings {
    /// Issuer claim value (`iss`).
    pub issuer: String,

    /// Audience claim value (`aud`).
    pub audience: String,

    /// Access token lifetime.
    #[serde(with = "humantime_serde")]
    pub access_token_lifetime: Duration,

    /// Refresh token lifetime.
    #[serde(with = "humantime_serde")]
    pub refresh_token_lifetime: Duration,

    /// Email-verification token lifetime.
    #[serde(with = "humantime_serde")]
    pub email_verification_lifetime: Duration,

    /// Clock skew tolerated when checking `exp` and `iat`.
    #[serde(with = "humantime_serde")]
    pub leeway: Duration,
}

impl Default for TokenSettings {
    fn default() -> Self {
        Self {
            issuer: "http://localhost:8080".to_string(),
            audience: "tessera".to_string(),
            access_token_lifetime: Duration::from_secs(15 * 60),
            refresh_token_lifetime: Duration::from_secs(30 * 24 * 3600),
            email_verification_lifetime: Duration::from_secs(24 * 3600),
            leeway: Duration::from_secs(30),
        }
    }
}

impl TokenSettings {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.issuer.trim().is_empty() {
            return Err(ConfigError::Invalid("tokens.issuer must not be empty".into()));
        }
        for (name, lifetime) in [
            ("access_token_lifetime", self.access_token_lifetime),
            ("refresh_token_lifetime", self.refresh_token_lifetime),
            ("email_verification_lifetime", self.email_verification_lifetime),
        ] {
            if lifetime < MIN_LIFETIME {
                return Err(ConfigError::Invalid(format!(
                    "tokens.{name} must be at least {}s",
                    MIN_LIFETIME.as_secs()
                )));
            }
        }
        Ok(())
    }
}

/// Signing key material locations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SigningSettings {
    /// Signing algorithm.
    pub algorithm: SigningAlgorithm,

    /// PEM file holding the current private key. When unset a key pair is
    /// generated at startup (development only).
    pub private_key_path: Option<PathBuf>,

    /// PEM files of retired public keys still accepted for verification.
    pub previous_public_keys: Vec<PathBuf>,
}

impl Default for SigningSettings {
    fn default() -> Self {
        Self {
            algorithm: SigningAlgorithm::RS256,
            private_key_path: None,
            previous_public_keys: Vec::new(),
        }
    }
}

/// Password hashing parameters.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PasswordSettings {
    /// Argon2 time cost (iterations).
    pub work_factor: u32,

    /// Argon2 memory cost in KiB.
    pub memory_kib: u32,
}

impl Default for PasswordSettings {
    fn default() -> Self {
        Self {
            work_factor: 3,
            memory_kib: 19 * 1024,
        }
    }
}

impl PasswordSettings {
    fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_WORK_FACTOR..=MAX_WORK_FACTOR).contains(&self.work_factor) {
            return Err(ConfigError::Invalid(format!(
                "password.work_factor must be within {MIN_WORK_FACTOR}..={MAX_WORK_FACTOR}"
            )));
        }
        Ok(())
    }
}

/// Cache-aside settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheSettings {
    /// When disabled, reads go straight to the authoritative store.
    pub enabled: bool,

    /// Upper bound for a single cache call. Keep well under request deadlines.
    #[serde(with = "humantime_serde")]
    pub query_timeout: Duration,

    /// TTL for cached permission documents (a backstop; invalidation is explicit).
    #[serde(with = "humantime_serde")]
    pub permission_ttl: Duration,

    /// TTL for cached resource catalog reads.
    #[serde(with = "humantime_serde")]
    pub resource_ttl: Duration,

    /// Redis backend. When disabled an in-process store is used.
    pub redis: RedisSettings,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            query_timeout: Duration::from_millis(50),
            permission_ttl: Duration::from_secs(600),
            resource_ttl: Duration::from_secs(300),
            redis: RedisSettings::default(),
        }
    }
}

impl CacheSettings {
    fn validate(&self) -> Result<(), ConfigError> {
        if !self.enabled {
            return Ok(());
        }
        if self.query_timeout.is_zero() {
            return Err(ConfigError::Invalid("cache.query_timeout must be > 0".into()));
        }
        if self.permission_ttl.is_zero() || self.resource_ttl.is_zero() {
            return Err(ConfigError::Invalid("cache TTLs must be > 0".into()));
        }
        if self.redis.enabled && self.redis.pool_size == 0 {
            return Err(ConfigError::Invalid("cache.redis.pool_size must be > 0".into()));
        }
        Ok(())
    }
}

/// Redis connection settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RedisSettings {
    /// Use Redis (gracefully degrades to the local store without it).
    pub enabled: bool,

    /// Redis connection URL (e.g., "redis://localhost:6379").
    pub url: String,

    /// Connection pool size.
    pub pool_size: usize,

    /// Pool wait/create/recycle timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for RedisSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            url: "redis://localhost:6379".to_string(),
            pool_size: 10,
            timeout_ms: 5000,
        }
    }
}

/// Authorization rule set settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthzSettings {
    /// Query entry point evaluated for every decision.
    pub query: String,

    /// JSON rule set file. When unset the built-in grant-based rule set is used.
    pub rules_path: Option<PathBuf>,
}

impl Default for AuthzSettings {
    fn default() -> Self {
        Self {
            query: "authz.allow".to_string(),
            rules_path: None,
        }
    }
}

/// Verification mail settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MailSettings {
    /// Sender address.
    pub from: String,

    /// Subject line of the verification mail.
    pub verification_subject: String,

    /// Link embedded in the mail; `{token}` is replaced with the token.
    pub verification_url: String,
}

impl Default for MailSettings {
    fn default() -> Self {
        Self {
            from: "no-reply@localhost".to_string(),
            verification_subject: "Verify your email address".to_string(),
            verification_url: "http://localhost:8080/verify-email?token={token}".to_string(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default level filter, overridden by `RUST_LOG`.
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

pub mod loader {
    use std::path::PathBuf;

    use config::{Config, Environment, File};

    use super::{ConfigError, TesseraConfig};

    /// Loads configuration from an optional TOML file plus
    /// `TESSERA__SECTION__KEY` environment overrides, then validates it.
    pub fn load_config(path: Option<&str>) -> Result<TesseraConfig, ConfigError> {
        // A missing .env file is normal outside development.
        let _ = dotenvy::dotenv();

        let mut builder = Config::builder();
        let file = PathBuf::from(path.unwrap_or("tessera.toml"));
        if file.exists() {
            builder = builder.add_source(File::from(file));
        } else if path.is_some() {
            return Err(ConfigError::Load(format!(
                "configuration file {} does not exist",
                file.display()
            )));
        }
        builder = builder.add_source(
            Environment::with_prefix("TESSERA")
                .try_parsing(true)
                .separator("__"),
        );

        let cfg = builder
            .build()
            .map_err(|e| ConfigError::Load(format!("config build error: {e}")))?;
        let merged: TesseraConfig = cfg
            .try_deserialize()
            .map_err(|e| ConfigError::Load(format!("config deserialize error: {e}")))?;
        merged.validate()?;
        Ok(merged)
    }
}
