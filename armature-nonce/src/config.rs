use crate::error::{NonceError, Result};
use crate::render::DEFAULT_REFERER_FIELD;
use crate::source::StaticSecret;
use crate::token::{DEFAULT_TOKEN_LENGTH, TokenCodec};
use base64::{Engine, engine::general_purpose::STANDARD};
use std::env;
use std::str::FromStr;
use tracing::warn;

/// One day, in seconds
pub const DEFAULT_LIFETIME: u64 = 86_400;

/// Nonce configuration
#[derive(Clone)]
pub struct NonceConfig {
    /// Secret key for token derivation (must be at least 32 bytes)
    pub secret: Vec<u8>,

    /// Total token validity in seconds
    pub lifetime: u64,

    /// Number of hex characters per token
    pub token_length: usize,

    /// Form field name for the referer marker
    pub referer_field: String,
}

impl NonceConfig {
    /// Create a new nonce configuration
    pub fn new(secret: Vec<u8>) -> Result<Self> {
        if secret.len() < StaticSecret::MIN_LENGTH {
            return Err(NonceError::configuration(format!(
                "Secret key must be at least {} bytes",
                StaticSecret::MIN_LENGTH
            )));
        }

        Ok(Self {
            secret,
            lifetime: DEFAULT_LIFETIME,
            token_length: DEFAULT_TOKEN_LENGTH,
            referer_field: DEFAULT_REFERER_FIELD.to_string(),
        })
    }

    /// Generate a secret key
    pub fn generate_secret() -> Vec<u8> {
        use rand::Rng;
        let mut rng = rand::thread_rng();
        (0..StaticSecret::MIN_LENGTH).map(|_| rng.r#gen()).collect()
    }

    /// Load configuration from `ARMATURE_NONCE_*` environment variables.
    ///
    /// - `ARMATURE_NONCE_SECRET` - base64 encoded secret (generated when unset)
    /// - `ARMATURE_NONCE_LIFETIME` - lifetime in seconds
    /// - `ARMATURE_NONCE_TOKEN_LENGTH` - hex characters per token
    /// - `ARMATURE_NONCE_REFERER_FIELD` - referer field name
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an environment-like lookup function
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let secret = match lookup("ARMATURE_NONCE_SECRET") {
            Some(encoded) => STANDARD.decode(encoded.trim())?,
            None => {
                warn!("ARMATURE_NONCE_SECRET is not set, generating an ephemeral secret");
                Self::generate_secret()
            }
        };

        let mut config = Self::new(secret)?;

        if let Some(lifetime) = parse_var(&lookup, "ARMATURE_NONCE_LIFETIME")? {
            config.lifetime = lifetime;
        }

        if let Some(token_length) = parse_var(&lookup, "ARMATURE_NONCE_TOKEN_LENGTH")? {
            config.token_length = token_length;
        }

        if let Some(field) = lookup("ARMATURE_NONCE_REFERER_FIELD") {
            config.referer_field = field;
        }

        config.validate()?;
        Ok(config)
    }

    /// Set token lifetime
    pub fn with_lifetime(mut self, lifetime_seconds: u64) -> Self {
        self.lifetime = lifetime_seconds;
        self
    }

    /// Set token length
    pub fn with_token_length(mut self, token_length: usize) -> Self {
        self.token_length = token_length;
        self
    }

    /// Set referer field name
    pub fn with_referer_field(mut self, name: impl Into<String>) -> Self {
        self.referer_field = name.into();
        self
    }

    /// Check every setting
    pub fn validate(&self) -> Result<()> {
        validate_lifetime(self.lifetime)?;
        TokenCodec::new(self.token_length)?;

        if self.referer_field.is_empty() {
            return Err(NonceError::configuration("Referer field name must not be empty"));
        }

        Ok(())
    }

    /// Secret source over the configured key
    pub fn secret_source(&self) -> Result<StaticSecret> {
        StaticSecret::new(self.secret.clone())
    }
}

impl Default for NonceConfig {
    fn default() -> Self {
        Self {
            secret: Self::generate_secret(),
            lifetime: DEFAULT_LIFETIME,
            token_length: DEFAULT_TOKEN_LENGTH,
            referer_field: DEFAULT_REFERER_FIELD.to_string(),
        }
    }
}

impl std::fmt::Debug for NonceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NonceConfig")
            .field("secret", &"[redacted]")
            .field("lifetime", &self.lifetime)
            .field("token_length", &self.token_length)
            .field("referer_field", &self.referer_field)
            .finish()
    }
}

pub(crate) fn validate_lifetime(lifetime: u64) -> Result<()> {
    if lifetime == 0 {
        return Err(NonceError::configuration("Lifetime must be a positive number of seconds"));
    }
    Ok(())
}

fn parse_var<F, T>(lookup: &F, key: &str) -> Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|e| NonceError::configuration(format!("Invalid {}: {}", key, e)))
        })
        .transpose()
}
