//! Stateful nonce manager bound to one action and one request field.

use crate::age::NonceAge;
use crate::config::{DEFAULT_LIFETIME, NonceConfig, validate_lifetime};
use crate::error::{NonceError, Result};
use crate::render::{FieldRenderer, HiddenInputRenderer, QueryUrlRenderer, UrlRenderer};
use crate::source::{
    Clock, DefaultLifetimeRegistry, NoParameters, NoopLifetimeRegistry, ParameterSource,
    SecretSource, SystemClock,
};
use crate::token::TokenCodec;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Nonce manager
///
/// Issues tokens for its action, embeds them into form fields and URLs, and
/// classifies presented tokens. Each instance keeps the last token, field and
/// URL it produced or received, so one instance serves one request context at
/// a time.
pub struct NonceManager {
    action: String,
    binding_name: String,
    lifetime: u64,
    token: String,
    field: String,
    url: String,
    codec: TokenCodec,
    clock: Arc<dyn Clock>,
    secret: Arc<dyn SecretSource>,
    parameters: Arc<dyn ParameterSource>,
    registry: Arc<dyn DefaultLifetimeRegistry>,
    field_renderer: Arc<dyn FieldRenderer>,
    url_renderer: Arc<dyn UrlRenderer>,
}

impl NonceManager {
    /// Create a new nonce manager builder
    pub fn builder() -> NonceManagerBuilder {
        NonceManagerBuilder::new()
    }

    /// Create a manager with the system clock and no request parameters.
    ///
    /// When `lifetime` is given it is also registered as the default lifetime.
    pub fn new(
        action: impl Into<String>,
        binding_name: impl Into<String>,
        lifetime: Option<u64>,
        secret: Arc<dyn SecretSource>,
    ) -> Result<Self> {
        let mut builder = Self::builder()
            .action(action)
            .binding_name(binding_name)
            .secret(secret);
        if let Some(lifetime) = lifetime {
            builder = builder.lifetime(lifetime);
        }
        builder.build()
    }

    /// Create a manager from a [`NonceConfig`]
    pub fn from_config(
        config: &NonceConfig,
        action: impl Into<String>,
        binding_name: impl Into<String>,
    ) -> Result<Self> {
        NonceManagerBuilder::from_config(config)?
            .action(action)
            .binding_name(binding_name)
            .build()
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn set_action(&mut self, action: impl Into<String>) {
        self.action = action.into();
    }

    /// Name under which the token travels in request parameters
    pub fn binding_name(&self) -> &str {
        &self.binding_name
    }

    pub fn set_binding_name(&mut self, binding_name: impl Into<String>) {
        self.binding_name = binding_name.into();
    }

    /// Lifetime in seconds
    pub fn lifetime(&self) -> u64 {
        self.lifetime
    }

    /// Replace the lifetime and register it as the default lifetime.
    ///
    /// The registry is notified on every call.
    pub fn set_lifetime(&mut self, lifetime: u64) -> Result<()> {
        validate_lifetime(lifetime)?;
        debug!(action = %self.action, lifetime, "Setting nonce lifetime");
        self.lifetime = lifetime;
        self.registry.set_default(lifetime);
        Ok(())
    }

    /// Last issued or presented token
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn set_token(&mut self, token: impl Into<String>) {
        self.token = token.into();
    }

    /// Last rendered form field
    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn set_field(&mut self, field: impl Into<String>) {
        self.field = field.into();
    }

    /// Last rendered URL
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn set_url(&mut self, url: impl Into<String>) {
        self.url = url.into();
    }

    /// Swap the parameters of the inbound request
    pub fn set_parameters(&mut self, parameters: Arc<dyn ParameterSource>) {
        self.parameters = parameters;
    }

    /// Issue a token for the current tick
    pub fn issue(&mut self) -> Result<String> {
        let now = self.clock.now()?;
        let secret = self.secret()?;
        let tick = TokenCodec::current_tick(self.lifetime, now);

        self.token = self.codec.derive(&secret, &self.action, tick);
        debug!(action = %self.action, tick, "Issued nonce");

        Ok(self.token.clone())
    }

    /// Issue a token and render it as a form fragment
    pub fn create_field(&mut self, include_referer: bool) -> Result<String> {
        let token = self.issue()?;
        self.field = self
            .field_renderer
            .render_field(&self.binding_name, &token, include_referer);
        Ok(self.field.clone())
    }

    /// Issue a token and append it to `base_url`
    pub fn create_url(&mut self, base_url: &str) -> Result<String> {
        let token = self.issue()?;
        self.url = self
            .url_renderer
            .render_url(base_url, &self.binding_name, &token)?;
        Ok(self.url.clone())
    }

    /// Pass/fail view of [`NonceManager::age`]
    pub fn verify(&mut self, candidate: Option<&str>) -> Result<bool> {
        self.age(candidate).map(bool::from)
    }

    /// Classify a token.
    ///
    /// Without an explicit candidate the token is read from the request
    /// parameters under the binding name; a missing parameter verifies as an
    /// empty token. Malformed input is never an error.
    pub fn age(&mut self, candidate: Option<&str>) -> Result<NonceAge> {
        let now = self.clock.now()?;
        let secret = self.secret()?;
        self.token = self.resolve_candidate(candidate)?;

        let age = self
            .codec
            .verify(&self.token, &secret, &self.action, self.lifetime, now);

        match age {
            NonceAge::Invalid => warn!(
                action = %self.action,
                binding_name = %self.binding_name,
                "Nonce verification failed"
            ),
            NonceAge::Stale => debug!(action = %self.action, "Nonce verified in previous tick"),
            NonceAge::Fresh => trace!(action = %self.action, "Nonce verified"),
        }

        Ok(age)
    }

    fn resolve_candidate(&self, candidate: Option<&str>) -> Result<String> {
        if let Some(candidate) = candidate {
            return Ok(candidate.to_string());
        }

        let value = self.parameters.lookup(&self.binding_name)?;
        trace!(
            binding_name = %self.binding_name,
            present = value.is_some(),
            "Reading nonce from request parameters"
        );
        Ok(value.as_deref().map(sanitize_parameter).unwrap_or_default())
    }

    fn secret(&self) -> Result<Vec<u8>> {
        let secret = self.secret.secret()?;
        if secret.is_empty() {
            return Err(NonceError::collaborator("Secret source returned an empty key"));
        }
        Ok(secret)
    }
}

impl fmt::Debug for NonceManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NonceManager")
            .field("action", &self.action)
            .field("binding_name", &self.binding_name)
            .field("lifetime", &self.lifetime)
            .field("codec", &self.codec)
            .finish_non_exhaustive()
    }
}

/// Strip control characters and surrounding whitespace from a request value
fn sanitize_parameter(raw: &str) -> String {
    let cleaned: String = raw.chars().filter(|c| !c.is_control()).collect();
    cleaned.trim().to_string()
}

/// Builder for creating a NonceManager
pub struct NonceManagerBuilder {
    action: Option<String>,
    binding_name: Option<String>,
    lifetime: Option<u64>,
    token_length: Option<usize>,
    clock: Arc<dyn Clock>,
    secret: Option<Arc<dyn SecretSource>>,
    parameters: Arc<dyn ParameterSource>,
    registry: Arc<dyn DefaultLifetimeRegistry>,
    field_renderer: Arc<dyn FieldRenderer>,
    url_renderer: Arc<dyn UrlRenderer>,
}

impl NonceManagerBuilder {
    /// Create a new builder with default collaborators
    pub fn new() -> Self {
        Self {
            action: None,
            binding_name: None,
            lifetime: None,
            token_length: None,
            clock: Arc::new(SystemClock),
            secret: None,
            parameters: Arc::new(NoParameters),
            registry: Arc::new(NoopLifetimeRegistry),
            field_renderer: Arc::new(HiddenInputRenderer::new()),
            url_renderer: Arc::new(QueryUrlRenderer),
        }
    }

    /// Builder preset with the lifetime, token length, secret and referer
    /// field of `config`
    pub fn from_config(config: &NonceConfig) -> Result<Self> {
        config.validate()?;
        let renderer = HiddenInputRenderer::new().with_referer_field(config.referer_field.clone());

        Ok(Self::new()
            .lifetime(config.lifetime)
            .token_length(config.token_length)
            .secret(Arc::new(config.secret_source()?))
            .field_renderer(Arc::new(renderer)))
    }

    pub fn action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn binding_name(mut self, binding_name: impl Into<String>) -> Self {
        self.binding_name = Some(binding_name.into());
        self
    }

    /// Set the lifetime; it is registered as the default lifetime on build
    pub fn lifetime(mut self, lifetime: u64) -> Self {
        self.lifetime = Some(lifetime);
        self
    }

    pub fn token_length(mut self, token_length: usize) -> Self {
        self.token_length = Some(token_length);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn secret(mut self, secret: Arc<dyn SecretSource>) -> Self {
        self.secret = Some(secret);
        self
    }

    pub fn parameters(mut self, parameters: Arc<dyn ParameterSource>) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn registry(mut self, registry: Arc<dyn DefaultLifetimeRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn field_renderer(mut self, renderer: Arc<dyn FieldRenderer>) -> Self {
        self.field_renderer = renderer;
        self
    }

    pub fn url_renderer(mut self, renderer: Arc<dyn UrlRenderer>) -> Self {
        self.url_renderer = renderer;
        self
    }

    /// Build the manager
    pub fn build(self) -> Result<NonceManager> {
        let action = self.action.unwrap_or_default();
        if action.is_empty() {
            return Err(NonceError::configuration("Action must not be empty"));
        }

        let binding_name = self.binding_name.unwrap_or_default();
        if binding_name.is_empty() {
            return Err(NonceError::configuration("Binding name must not be empty"));
        }

        let secret = self
            .secret
            .ok_or_else(|| NonceError::configuration("A secret source is required"))?;

        let codec = match self.token_length {
            Some(length) => TokenCodec::new(length)?,
            None => TokenCodec::default(),
        };

        let mut manager = NonceManager {
            action,
            binding_name,
            lifetime: DEFAULT_LIFETIME,
            token: String::new(),
            field: String::new(),
            url: String::new(),
            codec,
            clock: self.clock,
            secret,
            parameters: self.parameters,
            registry: self.registry,
            field_renderer: self.field_renderer,
            url_renderer: self.url_renderer,
        };

        if let Some(lifetime) = self.lifetime {
            manager.set_lifetime(lifetime)?;
        }

        debug!(
            action = %manager.action,
            binding_name = %manager.binding_name,
            lifetime = manager.lifetime,
            "Creating nonce manager"
        );

        Ok(manager)
    }
}

impl Default for NonceManagerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
